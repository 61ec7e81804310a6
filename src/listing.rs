//! Visible invoices and their summary counters
use crate::invoice::InvoiceHeader;
use crate::lifecycle::InvoiceStatus;
use crate::types::Money;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceStats {
    pub total: usize,
    pub draft: usize,
    pub issued: usize,
    pub paid: usize,
    pub canceled: usize,
    pub total_paid: Money,    // TTC of paid invoices
    pub total_pending: Money, // TTC of issued, unpaid invoices
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceListing {
    pub invoices: Vec<InvoiceHeader>, // newest first
    pub stats: InvoiceStats,
}

impl InvoiceStats {
    /// Amount sums saturate at `Decimal::MAX` rather than overflow.
    pub fn from_headers(headers: &[InvoiceHeader]) -> Self {
        let mut stats = InvoiceStats {
            total: headers.len(),
            ..Default::default()
        };

        for header in headers {
            match header.status {
                InvoiceStatus::Draft => stats.draft += 1,
                InvoiceStatus::Issued => {
                    stats.issued += 1;
                    stats.total_pending = stats.total_pending.saturating_add(header.total_ttc);
                }
                InvoiceStatus::Paid => {
                    stats.paid += 1;
                    stats.total_paid = stats.total_paid.saturating_add(header.total_ttc);
                }
                InvoiceStatus::Canceled => stats.canceled += 1,
            }
        }

        stats
    }
}

impl InvoiceListing {
    pub fn new(mut invoices: Vec<InvoiceHeader>) -> Self {
        invoices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let stats = InvoiceStats::from_headers(&invoices);

        Self { invoices, stats }
    }
}
