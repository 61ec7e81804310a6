//! Line and document totals (HT, VAT, TTC)
//!
//! All arithmetic is done on `Decimal` without intermediate rounding, so the
//! document totals are the exact sums of the line amounts and recomputing from
//! the same inputs always produces the same values.
use crate::error::InvoiceError;
use crate::types::Money;
use rust_decimal::Decimal;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// The numeric part of a line, already validated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineInput {
    pub quantity: Decimal,
    pub unit_price_ht: Decimal,
    pub vat_rate: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    pub total_ht: Money,
    pub vat: Money,
    pub total_ttc: Money,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub subtotal_ht: Money,
    pub vat_total: Money,
    pub total_ttc: Money,
}

impl LineInput {
    pub fn new(quantity: Decimal, unit_price_ht: Decimal, vat_rate: Decimal) -> Self {
        Self {
            quantity,
            unit_price_ht,
            vat_rate,
        }
    }
}

fn overflow() -> InvoiceError {
    InvoiceError::Validation("montant trop élevé".into())
}

/// Fails instead of overflowing `Decimal` on very large quantities or prices.
pub fn line_amounts(line: &LineInput) -> Result<LineAmounts, InvoiceError> {
    let total_ht = line
        .quantity
        .checked_mul(line.unit_price_ht)
        .ok_or_else(overflow)?;
    let vat = total_ht
        .checked_mul(line.vat_rate)
        .and_then(|vat| vat.checked_div(HUNDRED))
        .ok_or_else(overflow)?;
    let total_ttc = total_ht.checked_add(vat).ok_or_else(overflow)?;

    Ok(LineAmounts {
        total_ht: Money::new(total_ht),
        vat: Money::new(vat),
        total_ttc: Money::new(total_ttc),
    })
}

pub fn compute_totals<'a, I>(lines: I) -> Result<Totals, InvoiceError>
where
    I: IntoIterator<Item = &'a LineInput>,
{
    let mut subtotal_ht = Money::ZERO;
    let mut vat_total = Money::ZERO;

    for line in lines {
        let amounts = line_amounts(line)?;
        subtotal_ht = subtotal_ht
            .checked_add(amounts.total_ht)
            .ok_or_else(overflow)?;
        vat_total = vat_total.checked_add(amounts.vat).ok_or_else(overflow)?;
    }

    Ok(Totals {
        subtotal_ht,
        vat_total,
        total_ttc: subtotal_ht.checked_add(vat_total).ok_or_else(overflow)?,
    })
}
