//! Invoice status machine
//!
//! ```text
//! DRAFT --> ISSUED --> PAID
//!   |         |
//!   +---------+--> CANCELED
//! ```
//!
//! `PAID` and `CANCELED` are terminal. An issued invoice may be reverted to
//! `DRAFT`, which does not give stock back.
use crate::config::StockPolicy;
use crate::error::InvoiceError;
use std::fmt;
use std::str::FromStr;

#[derive(
    minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub enum InvoiceStatus {
    #[n(0)]
    Draft,
    #[n(1)]
    Issued,
    #[n(2)]
    Paid,
    #[n(3)]
    Canceled,
}

/// Side effects the caller must apply together with the status flip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transition {
    pub stamp_issued_at: bool,
    pub stamp_paid_at: bool,
    pub decrement_stock: bool,
    pub restore_stock: bool,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 4] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Issued,
        InvoiceStatus::Paid,
        InvoiceStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Issued => "ISSUED",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Canceled => "CANCELED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Canceled)
    }

    /// Header and items may only be rewritten before the invoice is settled.
    pub fn ensure_editable(&self) -> Result<(), InvoiceError> {
        if self.is_terminal() {
            return Err(InvoiceError::ImmutableInvoice(*self));
        }
        Ok(())
    }

    pub fn ensure_deletable(&self) -> Result<(), InvoiceError> {
        match self {
            InvoiceStatus::Draft | InvoiceStatus::Canceled => Ok(()),
            InvoiceStatus::Paid => Err(InvoiceError::CannotDeletePaidInvoice),
            InvoiceStatus::Issued => Err(InvoiceError::CannotDeleteIssuedInvoice),
        }
    }

    /// Checks `self -> to` against the transition table and returns the
    /// effects to apply.
    pub fn transition_to(
        &self,
        to: InvoiceStatus,
        stock_policy: StockPolicy,
    ) -> Result<Transition, InvoiceError> {
        use InvoiceStatus::*;

        let transition = match (self, to) {
            (Draft, Issued) => Transition {
                stamp_issued_at: true,
                decrement_stock: true,
                ..Default::default()
            },
            (Draft, Canceled) | (Draft, Draft) | (Issued, Draft) => Transition::default(),
            (Issued, Paid) => Transition {
                stamp_paid_at: true,
                ..Default::default()
            },
            (Issued, Canceled) => Transition {
                restore_stock: stock_policy == StockPolicy::Restore,
                ..Default::default()
            },
            (from, to) => return Err(InvoiceError::InvalidTransition { from: *from, to }),
        };

        Ok(transition)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = InvoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(InvoiceStatus::Draft),
            "ISSUED" => Ok(InvoiceStatus::Issued),
            "PAID" => Ok(InvoiceStatus::Paid),
            "CANCELED" | "CANCELLED" => Ok(InvoiceStatus::Canceled),
            other => Err(InvoiceError::Validation(format!("statut inconnu: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use InvoiceStatus::*;

    #[test]
    fn draft_cannot_skip_to_paid() {
        let err = Draft.transition_to(Paid, StockPolicy::Keep).unwrap_err();
        assert!(matches!(
            err,
            InvoiceError::InvalidTransition {
                from: Draft,
                to: Paid
            }
        ));
    }

    #[test]
    fn issuing_stamps_and_consumes_stock() {
        let t = Draft.transition_to(Issued, StockPolicy::Keep).unwrap();
        assert!(t.stamp_issued_at && t.decrement_stock);
        assert!(!t.stamp_paid_at && !t.restore_stock);
    }

    #[test]
    fn cancel_restores_stock_only_under_restore_policy() {
        let keep = Issued.transition_to(Canceled, StockPolicy::Keep).unwrap();
        let restore = Issued.transition_to(Canceled, StockPolicy::Restore).unwrap();

        assert!(!keep.restore_stock);
        assert!(restore.restore_stock);
        // a draft never consumed anything
        assert!(
            !Draft
                .transition_to(Canceled, StockPolicy::Restore)
                .unwrap()
                .restore_stock
        );
    }

    #[test]
    fn terminal_states_reject_everything() {
        for from in [Paid, Canceled] {
            for to in InvoiceStatus::ALL {
                assert!(from.transition_to(to, StockPolicy::Keep).is_err());
            }
        }
    }

    #[test]
    fn parses_wire_names() {
        assert_eq!("issued".parse::<InvoiceStatus>().unwrap(), Issued);
        assert_eq!("CANCELED".parse::<InvoiceStatus>().unwrap(), Canceled);
        assert!("ARCHIVED".parse::<InvoiceStatus>().is_err());
    }
}
