//! Signals emitted after a mutation has been committed
use crate::lifecycle::InvoiceStatus;

/// Cache scopes that a presentation layer keys its data on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTag {
    Invoices,
    Dashboard,
    Parts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Created,
    Updated,
    StatusChanged {
        from: InvoiceStatus,
        to: InvoiceStatus,
    },
    Deleted,
    Duplicated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationEvent {
    pub invoice_id: String,
    pub invoice_number: String,
    pub kind: MutationKind,
    pub tags: Vec<CacheTag>,
    /// `Invoice::fingerprint` after the write, `None` once deleted.
    pub revision: Option<String>,
}

impl CacheTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTag::Invoices => "invoices",
            CacheTag::Dashboard => "dashboard",
            CacheTag::Parts => "parts",
        }
    }
}

impl MutationEvent {
    pub fn new(
        invoice_id: &str,
        invoice_number: &str,
        kind: MutationKind,
        touched_stock: bool,
        revision: Option<String>,
    ) -> Self {
        let mut tags = vec![CacheTag::Invoices, CacheTag::Dashboard];
        if touched_stock {
            tags.push(CacheTag::Parts);
        }

        Self {
            invoice_id: invoice_id.to_string(),
            invoice_number: invoice_number.to_string(),
            kind,
            tags,
            revision,
        }
    }
}

/// Invalidation callback, run once per committed mutation.
pub trait InvalidationHook: Send + Sync {
    fn invalidate(&self, event: &MutationEvent);
}

impl<F> InvalidationHook for F
where
    F: Fn(&MutationEvent) + Send + Sync,
{
    fn invalidate(&self, event: &MutationEvent) {
        self(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_changes_add_parts_tag() {
        let plain = MutationEvent::new("inv_1", "FAC-2026-0001", MutationKind::Updated, false, None);
        let issued = MutationEvent::new(
            "inv_1",
            "FAC-2026-0001",
            MutationKind::StatusChanged {
                from: InvoiceStatus::Draft,
                to: InvoiceStatus::Issued,
            },
            true,
            None,
        );

        assert_eq!(plain.tags, vec![CacheTag::Invoices, CacheTag::Dashboard]);
        assert!(issued.tags.contains(&CacheTag::Parts));
        assert_eq!(CacheTag::Dashboard.as_str(), "dashboard");
    }
}
