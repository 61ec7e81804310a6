//! Human-readable invoice numbers: `<prefix>-<year>-<sequence>`
use crate::error::InvoiceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceNumber {
    pub prefix: String,
    pub year: i32,
    pub sequence: u64,
}

impl InvoiceNumber {
    pub fn new(prefix: &str, year: i32, sequence: u64) -> Self {
        Self {
            prefix: prefix.to_string(),
            year,
            sequence,
        }
    }

    /// Formats with the sequence zero-padded to `width` digits. Larger
    /// sequences are written in full.
    pub fn format(&self, width: usize) -> String {
        format!(
            "{}-{}-{:0width$}",
            self.prefix,
            self.year,
            self.sequence,
            width = width
        )
    }

    pub fn parse(raw: &str) -> Result<Self, InvoiceError> {
        let invalid = || InvoiceError::Validation(format!("numéro de facture mal formé: {raw}"));

        let mut parts = raw.rsplitn(3, '-');
        let sequence = parts.next().ok_or_else(invalid)?;
        let year = parts.next().ok_or_else(invalid)?;
        let prefix = parts.next().ok_or_else(invalid)?;

        if prefix.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            prefix: prefix.to_string(),
            year: year.parse().map_err(|_| invalid())?,
            sequence: sequence.parse().map_err(|_| invalid())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_sequence_to_width() {
        assert_eq!(InvoiceNumber::new("FAC", 2026, 7).format(4), "FAC-2026-0007");
        assert_eq!(InvoiceNumber::new("FAC", 2026, 12345).format(4), "FAC-2026-12345");
    }

    #[test]
    fn parse_accepts_dashed_prefix() {
        let number = InvoiceNumber::parse("GG-FAC-2025-0042").unwrap();
        assert_eq!(number, InvoiceNumber::new("GG-FAC", 2025, 42));
    }

    #[test]
    fn parse_rejects_free_text() {
        assert!(InvoiceNumber::parse("facture 12").is_err());
        assert!(InvoiceNumber::parse("-2025-0001").is_err());
    }
}
