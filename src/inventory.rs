//! Parts consumed by invoice lines
use crate::error::InvoiceError;
use crate::invoice::{InvoiceItem, LineKind};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Part {
    #[n(0)]
    pub id: String, // bech32 "part_" id
    #[n(1)]
    pub reference: String,
    #[n(2)]
    pub name: String,
    #[n(3)]
    #[cbor(with = "crate::types::decimal")]
    pub stock_qty: Decimal,
    #[n(4)]
    #[cbor(with = "crate::types::decimal")]
    pub unit_price_ht: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockMove {
    Consume,
    Restore,
}

impl Part {
    pub fn new(
        reference: &str,
        name: &str,
        stock_qty: Decimal,
        unit_price_ht: Decimal,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            id: crate::utils::new_part_id()?,
            reference: reference.to_string(),
            name: name.to_string(),
            stock_qty,
            unit_price_ht,
        })
    }

    pub fn stock_after(
        &self,
        movement: StockMove,
        quantity: Decimal,
    ) -> Result<Decimal, InvoiceError> {
        let remaining = match movement {
            StockMove::Consume => self.stock_qty.checked_sub(quantity),
            StockMove::Restore => self.stock_qty.checked_add(quantity),
        };
        remaining.ok_or_else(|| quantity_overflow(&self.id))
    }
}

/// Total quantity per referenced part across the PART lines.
pub fn part_quantities(
    items: &[InvoiceItem],
) -> Result<BTreeMap<String, Decimal>, InvoiceError> {
    let mut quantities = BTreeMap::new();

    for item in items.iter().filter(|item| item.kind == LineKind::Part) {
        if let Some(part_id) = &item.part_id {
            let total = quantities.entry(part_id.clone()).or_insert(Decimal::ZERO);
            *total = total
                .checked_add(item.quantity)
                .ok_or_else(|| quantity_overflow(part_id))?;
        }
    }

    Ok(quantities)
}

fn quantity_overflow(part_id: &str) -> InvoiceError {
    InvoiceError::Validation(format!("quantité trop élevée pour la pièce {part_id}"))
}
