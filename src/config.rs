//! Issuance configuration.
//!
//! Validity periods and the entropy provider's per-call limit can be tuned from
//! a JSON file; everything else that must be bit-exact (key size, serial width,
//! signature scheme) is a constant.

use crate::entropy::DEFAULT_MAX_BYTES_PER_CALL;
use crate::error::{PkiError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// RSA modulus size for every generated key.
pub const KEY_BITS: usize = 2048;

/// Number of random bytes behind each certificate serial number.
pub const SERIAL_NUMBER_LEN: usize = 20;

/// Seconds in a day, used for validity arithmetic.
pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Default root CA lifetime: 20 years.
pub const DEFAULT_CA_VALIDITY_DAYS: u32 = 20 * 365;

/// Default leaf certificate lifetime: 2 years.
pub const DEFAULT_LEAF_VALIDITY_DAYS: u32 = 2 * 365;

/// Entropy provider settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntropyConfig {
    /// Hard limit on bytes per provider call.
    pub max_bytes_per_call: usize,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            max_bytes_per_call: DEFAULT_MAX_BYTES_PER_CALL,
        }
    }
}

/// Settings for a signing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuanceConfig {
    pub ca_validity_days: u32,
    pub leaf_validity_days: u32,
    pub entropy: EntropyConfig,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            ca_validity_days: DEFAULT_CA_VALIDITY_DAYS,
            leaf_validity_days: DEFAULT_LEAF_VALIDITY_DAYS,
            entropy: EntropyConfig::default(),
        }
    }
}

impl IssuanceConfig {
    /// Parse and validate a JSON document. Missing fields take their defaults.
    ///
    /// # Example
    ///
    /// ```
    /// use kmspki::config::IssuanceConfig;
    ///
    /// let config = IssuanceConfig::from_json(r#"{"leaf_validity_days": 90}"#).unwrap();
    /// assert_eq!(config.leaf_validity_days, 90);
    /// assert_eq!(config.ca_validity_days, 7300);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: IssuanceConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ca_validity_days == 0 {
            return Err(PkiError::ConfigError(
                "ca_validity_days must be greater than zero".to_string(),
            ));
        }
        if self.leaf_validity_days == 0 {
            return Err(PkiError::ConfigError(
                "leaf_validity_days must be greater than zero".to_string(),
            ));
        }
        if self.entropy.max_bytes_per_call == 0 {
            return Err(PkiError::ConfigError(
                "entropy.max_bytes_per_call must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn ca_validity(&self) -> Duration {
        days(self.ca_validity_days)
    }

    pub fn leaf_validity(&self) -> Duration {
        days(self.leaf_validity_days)
    }
}

/// A whole number of days as a `Duration`.
pub fn days(days: u32) -> Duration {
    Duration::from_secs(u64::from(days) * SECONDS_PER_DAY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = IssuanceConfig::default();
        assert_eq!(config.ca_validity_days, 7300);
        assert_eq!(config.leaf_validity_days, 730);
        assert_eq!(config.entropy.max_bytes_per_call, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_durations() {
        let config = IssuanceConfig::default();
        assert_eq!(config.ca_validity().as_secs(), 20 * 365 * 86400);
        assert_eq!(config.leaf_validity().as_secs(), 2 * 365 * 86400);
    }

    #[test]
    fn test_from_json_partial() {
        let config = IssuanceConfig::from_json(r#"{"entropy": {"max_bytes_per_call": 512}}"#).unwrap();
        assert_eq!(config.entropy.max_bytes_per_call, 512);
        assert_eq!(config.ca_validity_days, DEFAULT_CA_VALIDITY_DAYS);
    }

    #[test]
    fn test_from_json_rejects_zero() {
        let result = IssuanceConfig::from_json(r#"{"leaf_validity_days": 0}"#);
        match result {
            Err(PkiError::ConfigError(msg)) => assert!(msg.contains("leaf_validity_days")),
            _ => panic!("Expected ConfigError"),
        }

        let result = IssuanceConfig::from_json(r#"{"entropy": {"max_bytes_per_call": 0}}"#);
        assert!(matches!(result, Err(PkiError::ConfigError(_))));
    }

    #[test]
    fn test_from_json_invalid() {
        let result = IssuanceConfig::from_json("not json");
        assert!(matches!(result, Err(PkiError::JsonError(_))));
    }

    #[test]
    fn test_load_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"ca_validity_days": 3650}}"#).unwrap();

        let config = IssuanceConfig::load(file.path()).unwrap();
        assert_eq!(config.ca_validity_days, 3650);
    }

    #[test]
    fn test_load_missing_file() {
        let result = IssuanceConfig::load(Path::new("/nonexistent/kmspki.json"));
        assert!(matches!(result, Err(PkiError::StorageError(_))));
    }
}
