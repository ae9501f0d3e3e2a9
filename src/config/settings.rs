//! Application settings loaded from config.toml
//!
//! Every section is optional; missing values fall back to the defaults the back
//! office has always used (a 1000-cheque batch cap, a 10.0 settlement tolerance,
//! 10 MiB proof documents).

use crate::core::print::PrintLayout;
use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Cheque book settings
    pub cheques: ChequeConfig,
    /// Settlement engine settings
    pub settlement: SettlementConfig,
    /// Proof document validation settings
    pub documents: DocumentConfig,
    /// Safes to seed on start-up
    pub safes: Vec<SafeConfig>,
    /// Default print layout, used until an operator saves one
    pub print: PrintLayout,
}

/// Cheque book settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChequeConfig {
    /// Maximum number of cheques a single batch may create
    pub batch_limit: u64,
}

impl Default for ChequeConfig {
    fn default() -> Self {
        Self { batch_limit: 1000 }
    }
}

/// Settlement engine settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Largest difference between a manually picked cheque and the overspend that
    /// still counts as a match
    pub tolerance: Decimal,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            tolerance: dec!(10.0),
        }
    }
}

/// Proof document validation settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Largest accepted document, in bytes
    pub max_size_bytes: u64,
    /// Accepted MIME subtypes or extensions (e.g. `"pdf"`, `"jpeg"`)
    pub allowed_types: Vec<String>,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 10 * 1024 * 1024,
            allowed_types: ["jpeg", "png", "gif", "webp", "pdf"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Configuration for a single safe
#[derive(Debug, Clone, Deserialize)]
pub struct SafeConfig {
    /// Name of the safe
    pub name: String,
    /// Opening balance
    #[serde(default)]
    pub initial_balance: Decimal,
}

/// Loads application settings from a TOML file
///
/// # Errors
/// Returns `Error::Config` if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Attempting to load configuration from: {path_ref:?}");
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {path_ref:?}: {e}"),
    })?;

    parse_config(&contents)
}

/// Parses application settings from TOML text
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads ./config.toml, or the defaults when the file does not exist
pub fn load_default_config() -> Result<AppConfig> {
    let path = Path::new("config.toml");
    if path.exists() {
        load_config(path)
    } else {
        info!("No config.toml found, using default settings.");
        Ok(AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [cheques]
            batch_limit = 250

            [settlement]
            tolerance = 5.5

            [documents]
            max_size_bytes = 2048
            allowed_types = ["pdf"]

            [[safes]]
            name = "Head Office"
            initial_balance = 1500

            [[safes]]
            name = "Warehouse"

            [print]
            font_size = 14

            [print.fields.amount]
            x = 120.0
            y = 40.5
        "#;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.cheques.batch_limit, 250);
        assert_eq!(config.settlement.tolerance, dec!(5.5));
        assert_eq!(config.documents.max_size_bytes, 2048);
        assert_eq!(config.documents.allowed_types, vec!["pdf".to_string()]);
        assert_eq!(config.safes.len(), 2);
        assert_eq!(config.safes[0].initial_balance, dec!(1500));
        assert_eq!(config.safes[1].initial_balance, Decimal::ZERO);
        assert_eq!(config.print.font_size, 14);
        assert!(config.print.fields.contains_key("amount"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.cheques.batch_limit, 1000);
        assert_eq!(config.settlement.tolerance, dec!(10));
        assert_eq!(config.documents.max_size_bytes, 10 * 1024 * 1024);
        assert_eq!(config.documents.allowed_types.len(), 5);
        assert!(config.safes.is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = parse_config("[cheques]\nbatch_limit = \"many\"");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
