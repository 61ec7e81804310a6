//! Invoice records and the draft builder used to create or rewrite them
use crate::calculator::{self, LineInput, Totals};
use crate::error::InvoiceError;
use crate::lifecycle::InvoiceStatus;
use crate::types::{Money, TimeStamp};
use chrono::Utc;
use rust_decimal::Decimal;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    #[n(0)]
    Part,
    #[n(1)]
    Labor,
}

/// Stored header. Totals are always derived from the items written with it.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct InvoiceHeader {
    #[n(0)]
    pub id: String, // bech32 "inv_" id
    #[n(1)]
    pub invoice_number: String,
    #[n(2)]
    pub status: InvoiceStatus,
    #[n(3)]
    pub customer_id: String,
    #[n(4)]
    pub vehicle_id: Option<String>,
    #[n(5)]
    pub notes: Option<String>,
    #[n(6)]
    pub subtotal_ht: Money,
    #[n(7)]
    pub vat_total: Money,
    #[n(8)]
    pub total_ttc: Money,
    #[n(9)]
    pub issued_at: Option<TimeStamp<Utc>>,
    #[n(10)]
    pub paid_at: Option<TimeStamp<Utc>>,
    #[n(11)]
    pub due_at: Option<TimeStamp<Utc>>,
    #[n(12)]
    pub created_by_id: String,
    #[n(13)]
    pub group_id: Option<String>,
    #[n(14)]
    pub created_at: TimeStamp<Utc>,
    #[n(15)]
    pub updated_at: TimeStamp<Utc>,
    #[n(16)]
    pub item_count: u32, // number of rows under this id in the items tree
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct InvoiceItem {
    #[n(0)]
    pub kind: LineKind,
    #[n(1)]
    pub part_id: Option<String>,
    #[n(2)]
    pub description: String,
    #[n(3)]
    #[cbor(with = "crate::types::decimal")]
    pub quantity: Decimal,
    #[n(4)]
    #[cbor(with = "crate::types::decimal")]
    pub unit_price_ht: Decimal,
    #[n(5)]
    #[cbor(with = "crate::types::decimal")]
    pub vat_rate: Decimal,
    #[n(6)]
    pub line_total_ht: Money,
    #[n(7)]
    pub line_total_ttc: Money,
    #[n(8)]
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub header: InvoiceHeader,
    pub items: Vec<InvoiceItem>, // ordered by position
}

/// One submitted line, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInput {
    pub kind: LineKind,
    pub part_id: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price_ht: Decimal,
    pub vat_rate: Decimal,
}

/// Header and items submitted by a client, for creation or a full rewrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceDraft {
    pub invoice_number: Option<String>,
    pub customer_id: Option<String>,
    pub vehicle_id: Option<String>,
    pub notes: Option<String>,
    pub due_at: Option<TimeStamp<Utc>>,
    pub items: Vec<ItemInput>,
}

/// A validated draft with positions assigned and totals computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedInvoice {
    pub invoice_number: Option<String>,
    pub customer_id: String,
    pub vehicle_id: Option<String>,
    pub notes: Option<String>,
    pub due_at: Option<TimeStamp<Utc>>,
    pub items: Vec<InvoiceItem>,
    pub totals: Totals,
}

const MIN_QUANTITY: Decimal = Decimal::from_parts(1, 0, 0, false, 2); // 0.01

impl ItemInput {
    pub fn part(
        part_id: &str,
        description: &str,
        quantity: Decimal,
        unit_price_ht: Decimal,
        vat_rate: Decimal,
    ) -> Self {
        Self {
            kind: LineKind::Part,
            part_id: Some(part_id.to_string()),
            description: description.to_string(),
            quantity,
            unit_price_ht,
            vat_rate,
        }
    }
    pub fn labor(
        description: &str,
        quantity: Decimal,
        unit_price_ht: Decimal,
        vat_rate: Decimal,
    ) -> Self {
        Self {
            kind: LineKind::Labor,
            part_id: None,
            description: description.to_string(),
            quantity,
            unit_price_ht,
            vat_rate,
        }
    }
    fn line_input(&self) -> LineInput {
        LineInput::new(self.quantity, self.unit_price_ht, self.vat_rate)
    }
    fn validate(&self, index: usize) -> Result<(), InvoiceError> {
        let line = index + 1;
        let invalid = |msg: &str| Err(InvoiceError::Validation(format!("ligne {line}: {msg}")));

        if self.description.trim().is_empty() {
            return invalid("description requise");
        }
        if self.quantity < MIN_QUANTITY {
            return invalid("quantité > 0");
        }
        if self.unit_price_ht < Decimal::ZERO {
            return invalid("prix ≥ 0");
        }
        if self.vat_rate < Decimal::ZERO || self.vat_rate > Decimal::ONE_HUNDRED {
            return invalid("taux de TVA entre 0 et 100");
        }
        match (self.kind, self.part_id.as_deref()) {
            (LineKind::Labor, Some(_)) => invalid("une ligne de main d'œuvre ne référence pas de pièce"),
            (LineKind::Part, Some(id)) if id.trim().is_empty() => invalid("référence de pièce vide"),
            _ => Ok(()),
        }
    }
}

impl InvoiceDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_invoice_number(mut self, number: &str) -> Self {
        self.invoice_number = Some(number.to_string());
        self
    }
    pub fn set_customer(mut self, customer_id: &str) -> Self {
        self.customer_id = Some(customer_id.to_string());
        self
    }
    pub fn set_vehicle(mut self, vehicle_id: &str) -> Self {
        self.vehicle_id = Some(vehicle_id.to_string());
        self
    }
    pub fn set_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }
    pub fn set_due_at(mut self, due_at: TimeStamp<Utc>) -> Self {
        self.due_at = Some(due_at);
        self
    }
    pub fn add_item(mut self, item: ItemInput) -> Self {
        self.items.push(item);
        self
    }

    /// Validates every field, assigns positions in submission order and
    /// computes line and document totals. Nothing is persisted here.
    pub fn validate_and_finalise(&self) -> Result<PreparedInvoice, InvoiceError> {
        let customer_id = match self.customer_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(InvoiceError::Validation("client requis".into())),
        };
        if matches!(self.invoice_number.as_deref(), Some(n) if n.trim().is_empty()) {
            return Err(InvoiceError::Validation("numéro requis".into()));
        }
        if self.items.is_empty() {
            return Err(InvoiceError::Validation("au moins une ligne requise".into()));
        }
        for (index, item) in self.items.iter().enumerate() {
            item.validate(index)?;
        }

        let lines: Vec<LineInput> = self.items.iter().map(ItemInput::line_input).collect();
        let totals = calculator::compute_totals(&lines)?;

        let mut items = Vec::with_capacity(lines.len());
        for (position, (input, line)) in self.items.iter().zip(&lines).enumerate() {
            let amounts = calculator::line_amounts(line)?;
            items.push(InvoiceItem {
                kind: input.kind,
                part_id: input.part_id.clone(),
                description: input.description.trim().to_string(),
                quantity: input.quantity,
                unit_price_ht: input.unit_price_ht,
                vat_rate: input.vat_rate,
                line_total_ht: amounts.total_ht,
                line_total_ttc: amounts.total_ttc,
                position: position as u32,
            });
        }

        tracing::debug!(
            subtotal_ht = %totals.subtotal_ht,
            vat_total = %totals.vat_total,
            total_ttc = %totals.total_ttc,
            "computed invoice totals"
        );

        Ok(PreparedInvoice {
            invoice_number: self.invoice_number.as_deref().map(|n| n.trim().to_string()),
            customer_id,
            vehicle_id: self.vehicle_id.clone().filter(|v| !v.trim().is_empty()),
            notes: self.notes.clone(),
            due_at: self.due_at.clone(),
            items,
            totals,
        })
    }
}

impl InvoiceItem {
    /// Turns a stored line back into input, e.g. to duplicate an invoice.
    pub fn to_input(&self) -> ItemInput {
        ItemInput {
            kind: self.kind,
            part_id: self.part_id.clone(),
            description: self.description.clone(),
            quantity: self.quantity,
            unit_price_ht: self.unit_price_ht,
            vat_rate: self.vat_rate,
        }
    }
}

impl Invoice {
    pub fn id(&self) -> &str {
        &self.header.id
    }
    pub fn status(&self) -> InvoiceStatus {
        self.header.status
    }
    pub fn totals(&self) -> Totals {
        Totals {
            subtotal_ht: self.header.subtotal_ht,
            vat_total: self.header.vat_total,
            total_ttc: self.header.total_ttc,
        }
    }

    /// Recomputes the document totals from the stored lines.
    pub fn recompute_totals(&self) -> Result<Totals, InvoiceError> {
        let lines: Vec<LineInput> = self
            .items
            .iter()
            .map(|item| LineInput::new(item.quantity, item.unit_price_ht, item.vat_rate))
            .collect();
        calculator::compute_totals(&lines)
    }

    /// Draft carrying the same customer, vehicle, notes and lines.
    pub fn to_draft(&self) -> InvoiceDraft {
        InvoiceDraft {
            invoice_number: None,
            customer_id: Some(self.header.customer_id.clone()),
            vehicle_id: self.header.vehicle_id.clone(),
            notes: self.header.notes.clone(),
            due_at: None,
            items: self.items.iter().map(InvoiceItem::to_input).collect(),
        }
    }

    /// SHA-256 over the CBOR encoding of header and items; changes whenever
    /// anything stored changes.
    pub fn fingerprint(&self) -> Result<String, InvoiceError> {
        let mut contents = minicbor::to_vec(&self.header)?;
        for item in &self.items {
            contents.extend(minicbor::to_vec(item)?);
        }
        Ok(sha256::digest(contents.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn brake_job() -> InvoiceDraft {
        InvoiceDraft::new()
            .set_customer("cust_1")
            .add_item(ItemInput::part("part_pads", "Plaquettes AV", dec!(1), dec!(52.00), dec!(20)))
            .add_item(ItemInput::labor("Main d'œuvre", dec!(2), dec!(45.00), dec!(20)))
    }

    #[test]
    fn positions_follow_submission_order() {
        let prepared = brake_job().validate_and_finalise().unwrap();

        let positions: Vec<u32> = prepared.items.iter().map(|i| i.position).collect();
        assert_eq!(positions, vec![0, 1]);
        assert_eq!(prepared.items[1].line_total_ttc.amount(), dec!(108.00));
        assert_eq!(prepared.totals.total_ttc.amount(), dec!(170.40));
    }

    #[test]
    fn rejects_missing_customer_and_empty_lines() {
        let no_customer = InvoiceDraft::new()
            .add_item(ItemInput::labor("Diagnostic", dec!(1), dec!(40), dec!(20)));
        assert!(matches!(
            no_customer.validate_and_finalise(),
            Err(InvoiceError::Validation(_))
        ));

        let no_items = InvoiceDraft::new().set_customer("cust_1");
        assert!(no_items.validate_and_finalise().is_err());
    }

    #[test]
    fn rejects_out_of_range_lines() {
        let cases = [
            ItemInput::labor("", dec!(1), dec!(10), dec!(20)),
            ItemInput::labor("Vidange", dec!(0), dec!(10), dec!(20)),
            ItemInput::labor("Vidange", dec!(1), dec!(-1), dec!(20)),
            ItemInput::labor("Vidange", dec!(1), dec!(10), dec!(100.5)),
            ItemInput {
                part_id: Some("part_x".into()),
                ..ItemInput::labor("Vidange", dec!(1), dec!(10), dec!(20))
            },
        ];

        for item in cases {
            let draft = InvoiceDraft::new().set_customer("cust_1").add_item(item.clone());
            assert!(draft.validate_and_finalise().is_err(), "{item:?} accepted");
        }
    }

    #[test]
    fn oversized_amounts_are_a_validation_error() {
        let quadrillion = Decimal::from(10i64.pow(15));
        let draft = InvoiceDraft::new()
            .set_customer("cust_1")
            .add_item(ItemInput::labor("Forfait", quadrillion, quadrillion, dec!(20)));

        assert!(matches!(
            draft.validate_and_finalise(),
            Err(InvoiceError::Validation(_))
        ));
    }

    #[test]
    fn free_labour_line_is_valid() {
        let draft = InvoiceDraft::new()
            .set_customer("cust_1")
            .add_item(ItemInput::labor("Contrôle offert", dec!(1), dec!(0), dec!(20)));

        let prepared = draft.validate_and_finalise().unwrap();
        assert_eq!(prepared.totals.total_ttc, Money::ZERO);
    }
}
