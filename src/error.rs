//! Error taxonomy for invoice operations
use crate::lifecycle::InvoiceStatus;

#[derive(thiserror::Error, Debug)]
pub enum InvoiceError {
    #[error("Accès refusé à cette facture")]
    Forbidden,
    #[error("Facture introuvable: {0}")]
    NotFound(String),
    #[error("Transition de statut impossible: {from} -> {to}")]
    InvalidTransition {
        from: InvoiceStatus,
        to: InvoiceStatus,
    },
    #[error("Impossible de modifier une facture payée ou annulée (statut {0}). Créez un avoir.")]
    ImmutableInvoice(InvoiceStatus),
    #[error("Impossible de supprimer une facture payée.")]
    CannotDeletePaidInvoice,
    #[error("Impossible de supprimer une facture émise. Annulez-la d'abord.")]
    CannotDeleteIssuedInvoice,
    #[error("Données invalides: {0}")]
    Validation(String),
    #[error("Le numéro de facture {0} est déjà utilisé")]
    DuplicateInvoiceNumber(String),
    #[error("Pièce inconnue: {0}")]
    UnknownPart(String),
    #[error("Stock insuffisant pour la pièce {part_id}: {available} disponible(s), {requested} demandé(s)")]
    InsufficientStock {
        part_id: String,
        available: rust_decimal::Decimal,
        requested: rust_decimal::Decimal,
    },
    #[error("Erreur de stockage: {0}")]
    Storage(#[from] sled::Error),
    #[error("Erreur d'encodage: {0}")]
    Encoding(String),
    #[error("Configuration invalide: {0}")]
    Config(#[from] ::config::ConfigError),
}

impl InvoiceError {
    /// Stable code for callers that map errors onto responses.
    pub fn kind(&self) -> &'static str {
        match self {
            InvoiceError::Forbidden => "forbidden",
            InvoiceError::NotFound(_) => "not_found",
            InvoiceError::InvalidTransition { .. } => "invalid_transition",
            InvoiceError::ImmutableInvoice(_) => "immutable_invoice",
            InvoiceError::CannotDeletePaidInvoice => "cannot_delete_paid_invoice",
            InvoiceError::CannotDeleteIssuedInvoice => "cannot_delete_issued_invoice",
            InvoiceError::Validation(_) => "validation",
            InvoiceError::DuplicateInvoiceNumber(_) => "duplicate_invoice_number",
            InvoiceError::UnknownPart(_) => "unknown_part",
            InvoiceError::InsufficientStock { .. } => "insufficient_stock",
            InvoiceError::Storage(_) => "storage",
            InvoiceError::Encoding(_) => "encoding",
            InvoiceError::Config(_) => "config",
        }
    }
}

impl From<minicbor::decode::Error> for InvoiceError {
    fn from(value: minicbor::decode::Error) -> Self {
        InvoiceError::Encoding(value.to_string())
    }
}

impl<E: std::fmt::Display> From<minicbor::encode::Error<E>> for InvoiceError {
    fn from(value: minicbor::encode::Error<E>) -> Self {
        InvoiceError::Encoding(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_messages_state_corrective_action() {
        assert!(
            InvoiceError::CannotDeleteIssuedInvoice
                .to_string()
                .contains("Annulez")
        );
        assert!(
            InvoiceError::ImmutableInvoice(InvoiceStatus::Paid)
                .to_string()
                .contains("avoir")
        );
    }
}
