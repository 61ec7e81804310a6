//! Runtime policy for the invoice service
use crate::error::InvoiceError;
use ::config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// What happens to consumed stock when an issued invoice is canceled.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StockPolicy {
    #[default]
    Keep,
    Restore,
}

/// What members of an invoice's group may do with it.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupAccess {
    #[default]
    ReadWrite,
    ReadOnly,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct InvoiceConfig {
    pub number_prefix: String,
    pub number_width: usize,
    pub stock_policy: StockPolicy,
    pub group_access: GroupAccess,
    pub allow_negative_stock: bool,
    /// Due date offset applied on issuance, if any.
    pub payment_terms_days: Option<i64>,
}

impl Default for InvoiceConfig {
    fn default() -> Self {
        Self {
            number_prefix: "FAC".to_string(),
            number_width: 4,
            stock_policy: StockPolicy::Keep,
            group_access: GroupAccess::ReadWrite,
            allow_negative_stock: true,
            payment_terms_days: None,
        }
    }
}

impl InvoiceConfig {
    /// Reads `invoicing.toml` (optional) then `INVOICING__*` variables.
    pub fn load() -> Result<Self, InvoiceError> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("invoicing").required(false))
            .add_source(Environment::with_prefix("INVOICING").separator("__"))
            .build()?;

        let loaded: InvoiceConfig = config.try_deserialize()?;
        loaded.validate()?;

        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), InvoiceError> {
        let invalid = |msg: &str| Err(InvoiceError::Config(ConfigError::Message(msg.into())));

        if self.number_prefix.trim().is_empty() {
            return invalid("number_prefix ne peut pas être vide");
        }
        if self.number_width == 0 || self.number_width > 12 {
            return invalid("number_width doit être compris entre 1 et 12");
        }
        if matches!(self.payment_terms_days, Some(days) if days < 0) {
            return invalid("payment_terms_days doit être positif");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_current_behaviour() {
        let config = InvoiceConfig::default();

        assert_eq!(config.number_prefix, "FAC");
        assert_eq!(config.number_width, 4);
        assert_eq!(config.stock_policy, StockPolicy::Keep);
        assert_eq!(config.group_access, GroupAccess::ReadWrite);
        assert!(config.allow_negative_stock);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_source_falls_back_to_defaults() {
        let config: InvoiceConfig = Config::builder()
            .set_override("stock_policy", "restore")
            .unwrap()
            .set_override("payment_terms_days", 30i64)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.stock_policy, StockPolicy::Restore);
        assert_eq!(config.payment_terms_days, Some(30));
        assert_eq!(config.number_prefix, "FAC");
    }

    #[test]
    fn rejects_empty_prefix() {
        let config = InvoiceConfig {
            number_prefix: " ".into(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(InvoiceError::Config(_))));
    }

    // The only test in this binary that touches INVOICING__* variables.
    #[test]
    fn load_reads_prefixed_environment() {
        unsafe {
            std::env::set_var("INVOICING__NUMBER_PREFIX", "GAR");
            std::env::set_var("INVOICING__STOCK_POLICY", "restore");
        }
        let loaded = InvoiceConfig::load();
        unsafe {
            std::env::remove_var("INVOICING__NUMBER_PREFIX");
            std::env::remove_var("INVOICING__STOCK_POLICY");
        }

        let config = loaded.unwrap();
        assert_eq!(config.number_prefix, "GAR");
        assert_eq!(config.stock_policy, StockPolicy::Restore);
        assert_eq!(config.number_width, 4);
    }
}
