//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FULFIL_DATABASE_PATH=/var/lib/fulfil/fulfil.db                     │
//! │     FULFIL_BASE_FEE_CENTS=2500                                         │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/fulfil/engine.toml (Linux)                               │
//! │     ~/Library/Application Support/za.fulfil.fulfil/engine.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     R20.00 base fee, R7.00/km, 15% VAT, 70% driver share               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # engine.toml
//! [database]
//! path = "/var/lib/fulfil/fulfil.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [fees]
//! hub_lat = -25.1530
//! hub_lng = 29.0500
//! base_fee_cents = 2000
//! per_km_fee_cents = 700
//! vat_bps = 1500
//!
//! [wallet]
//! driver_share_bps = 7000
//! withdrawal_fee_bps = 300
//! min_withdrawal_cents = 1501
//!
//! [retry]
//! max_attempts = 5
//! initial_backoff_ms = 20
//! max_backoff_ms = 500
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use fulfil_core::fees::{DEFAULT_BASE_FEE_CENTS, DEFAULT_HUB, DEFAULT_PER_KM_FEE_CENTS};
use fulfil_core::validation::{validate_coordinates, validate_rate};
use fulfil_core::{
    Coordinates, FeeSchedule, Money, Rate, WalletPolicy, DEFAULT_VAT_BPS, DRIVER_SHARE_BPS,
    MIN_WITHDRAWAL_CENTS, WITHDRAWAL_FEE_BPS,
};
use fulfil_db::DbConfig;

use crate::error::{EngineResult, FulfilmentError};
use crate::retry::RetryPolicy;

/// Path value selecting an in-memory database.
pub const MEMORY_DATABASE: &str = ":memory:";

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file, or `:memory:`. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits on a locked database before giving up.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    5_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

impl DatabaseSettings {
    /// The configured path, falling back to `<data dir>/fulfil.db`.
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .or_else(default_database_path)
            .unwrap_or_else(|| PathBuf::from("fulfil.db"))
    }
}

// =============================================================================
// Fee Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSettings {
    #[serde(default = "default_hub_lat")]
    pub hub_lat: f64,

    #[serde(default = "default_hub_lng")]
    pub hub_lng: f64,

    #[serde(default = "default_base_fee")]
    pub base_fee_cents: i64,

    #[serde(default = "default_per_km_fee")]
    pub per_km_fee_cents: i64,

    #[serde(default = "default_vat")]
    pub vat_bps: u32,
}

fn default_hub_lat() -> f64 {
    DEFAULT_HUB.lat
}
fn default_hub_lng() -> f64 {
    DEFAULT_HUB.lng
}
fn default_base_fee() -> i64 {
    DEFAULT_BASE_FEE_CENTS
}
fn default_per_km_fee() -> i64 {
    DEFAULT_PER_KM_FEE_CENTS
}
fn default_vat() -> u32 {
    DEFAULT_VAT_BPS
}

impl Default for FeeSettings {
    fn default() -> Self {
        FeeSettings {
            hub_lat: default_hub_lat(),
            hub_lng: default_hub_lng(),
            base_fee_cents: default_base_fee(),
            per_km_fee_cents: default_per_km_fee(),
            vat_bps: default_vat(),
        }
    }
}

// =============================================================================
// Wallet Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSettings {
    #[serde(default = "default_driver_share")]
    pub driver_share_bps: u32,

    #[serde(default = "default_withdrawal_fee")]
    pub withdrawal_fee_bps: u32,

    #[serde(default = "default_min_withdrawal")]
    pub min_withdrawal_cents: i64,
}

fn default_driver_share() -> u32 {
    DRIVER_SHARE_BPS
}
fn default_withdrawal_fee() -> u32 {
    WITHDRAWAL_FEE_BPS
}
fn default_min_withdrawal() -> i64 {
    MIN_WITHDRAWAL_CENTS
}

impl Default for WalletSettings {
    fn default() -> Self {
        WalletSettings {
            driver_share_bps: default_driver_share(),
            withdrawal_fee_bps: default_withdrawal_fee(),
            min_withdrawal_cents: default_min_withdrawal(),
        }
    }
}

// =============================================================================
// Retry Settings
// =============================================================================

/// Bounded exponential backoff for persistence conflicts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total tries including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}
fn default_initial_backoff() -> u64 {
    20
}
fn default_max_backoff() -> u64 {
    500
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

// =============================================================================
// Main Engine Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub fees: FeeSettings,

    #[serde(default)]
    pub wallet: WalletSettings,

    #[serde(default)]
    pub retry: RetrySettings,
}

impl EngineConfig {
    /// Defaults with an in-memory database.
    pub fn in_memory() -> Self {
        let mut config = Self::default();
        config.database.path = Some(PathBuf::from(MEMORY_DATABASE));
        config
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (engine.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> EngineResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Rejects settings that would break money or lifecycle rules.
    pub fn validate(&self) -> EngineResult<()> {
        if self.database.max_connections == 0 {
            return Err(FulfilmentError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        validate_coordinates(self.hub())
            .map_err(|e| FulfilmentError::Config(format!("fees: {}", e)))?;

        if self.fees.base_fee_cents < 0 || self.fees.per_km_fee_cents < 0 {
            return Err(FulfilmentError::Config("fees must not be negative".into()));
        }

        for (field, bps) in [
            ("fees.vat_bps", self.fees.vat_bps),
            ("wallet.driver_share_bps", self.wallet.driver_share_bps),
            ("wallet.withdrawal_fee_bps", self.wallet.withdrawal_fee_bps),
        ] {
            validate_rate(field, Rate::from_bps(bps))
                .map_err(|e| FulfilmentError::Config(e.to_string()))?;
        }

        if self.wallet.min_withdrawal_cents <= 0 {
            return Err(FulfilmentError::Config(
                "wallet.min_withdrawal_cents must be positive".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(FulfilmentError::Config(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(FulfilmentError::Config(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_ms".into(),
            ));
        }

        Ok(())
    }

    /// Applies `FULFIL_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup.
    ///
    /// Unparseable values are logged and skipped.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("FULFIL_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        override_parsed(&lookup, "FULFIL_MAX_CONNECTIONS", &mut self.database.max_connections);
        override_parsed(&lookup, "FULFIL_BUSY_TIMEOUT_MS", &mut self.database.busy_timeout_ms);
        override_parsed(&lookup, "FULFIL_HUB_LAT", &mut self.fees.hub_lat);
        override_parsed(&lookup, "FULFIL_HUB_LNG", &mut self.fees.hub_lng);
        override_parsed(&lookup, "FULFIL_BASE_FEE_CENTS", &mut self.fees.base_fee_cents);
        override_parsed(&lookup, "FULFIL_PER_KM_FEE_CENTS", &mut self.fees.per_km_fee_cents);
        override_parsed(&lookup, "FULFIL_VAT_BPS", &mut self.fees.vat_bps);
        override_parsed(&lookup, "FULFIL_DRIVER_SHARE_BPS", &mut self.wallet.driver_share_bps);
        override_parsed(&lookup, "FULFIL_WITHDRAWAL_FEE_BPS", &mut self.wallet.withdrawal_fee_bps);
        override_parsed(&lookup, "FULFIL_MIN_WITHDRAWAL_CENTS", &mut self.wallet.min_withdrawal_cents);
        override_parsed(&lookup, "FULFIL_RETRY_MAX_ATTEMPTS", &mut self.retry.max_attempts);
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("za", "fulfil", "fulfil")
            .map(|dirs| dirs.config_dir().join("engine.toml"))
    }

    // =========================================================================
    // Derived Settings
    // =========================================================================

    pub fn hub(&self) -> Coordinates {
        Coordinates::new(self.fees.hub_lat, self.fees.hub_lng)
    }

    pub fn db_config(&self) -> DbConfig {
        let path = self.database.resolved_path();
        if path.as_os_str() == MEMORY_DATABASE {
            return DbConfig::in_memory();
        }

        DbConfig::new(path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }

    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule {
            hub: self.hub(),
            base_fee: Money::from_cents(self.fees.base_fee_cents),
            per_km_fee: Money::from_cents(self.fees.per_km_fee_cents),
        }
    }

    pub fn vat_rate(&self) -> Rate {
        Rate::from_bps(self.fees.vat_bps)
    }

    pub fn wallet_policy(&self) -> WalletPolicy {
        WalletPolicy {
            driver_share: Rate::from_bps(self.wallet.driver_share_bps),
            withdrawal_fee: Rate::from_bps(self.wallet.withdrawal_fee_bps),
            min_withdrawal: Money::from_cents(self.wallet.min_withdrawal_cents),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
        }
    }
}

fn default_database_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("za", "fulfil", "fulfil")
        .map(|dirs| dirs.data_dir().join("fulfil.db"))
}

fn override_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) {
    if let Some(raw) = lookup(key) {
        match raw.parse() {
            Ok(value) => *target = value,
            Err(_) => warn!(key, value = %raw, "Ignoring unparseable override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_business_rules() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());

        let fees = config.fee_schedule();
        assert_eq!(fees.base_fee, Money::from_cents(2_000));
        assert_eq!(fees.per_km_fee, Money::from_cents(700));
        assert_eq!(config.vat_rate(), Rate::from_bps(1_500));
        assert_eq!(config.wallet_policy(), WalletPolicy::default());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            [fees]
            base_fee_cents = 2500

            [retry]
            max_attempts = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.fees.base_fee_cents, 2_500);
        assert_eq!(config.fees.per_km_fee_cents, 700);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.wallet.min_withdrawal_cents, 1_501);
    }

    #[test]
    fn test_overrides_apply_and_skip_garbage() {
        let vars: HashMap<&str, &str> = [
            ("FULFIL_DATABASE_PATH", ":memory:"),
            ("FULFIL_PER_KM_FEE_CENTS", "800"),
            ("FULFIL_VAT_BPS", "fifteen"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.fees.per_km_fee_cents, 800);
        assert_eq!(config.fees.vat_bps, 1_500);
        assert!(config.db_config().is_in_memory());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.wallet.driver_share_bps = 12_000;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.fees.hub_lat = 123.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.wallet.min_withdrawal_cents = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&EngineConfig::default()).unwrap();
        assert!(toml_str.contains("[fees]"));
        assert!(toml_str.contains("[wallet]"));
    }
}
