//! # Terminal Configuration
//!
//! Settings for one cashier terminal.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     CAJA_DB_PATH=/srv/caja/caja.db                                      │
//! │     CAJA_NOTIFY_URL=https://admin.example.hn/cierre                     │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     ~/.config/pos/caja.toml (Linux)                                     │
//! │     ~/Library/Application Support/hn.caja.pos/caja.toml (macOS)         │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! │     America/Tegucigalpa (UTC-6), 8 s backend deadline                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [business]
//! timezone = "America/Tegucigalpa"
//! utc_offset_minutes = -360
//!
//! [database]
//! path = "/srv/caja/caja.db"
//! max_connections = 5
//!
//! [backend]
//! timeout_ms = 8000
//!
//! [invoicing]
//! max_attempts = 1000
//!
//! [notify]
//! endpoint = "https://admin.example.hn/cierre"
//! admin_email = "gerencia@example.hn"
//! timeout_ms = 5000
//! queue_capacity = 64
//! ```

use caja_core::day_range::BusinessTimezone;
use caja_core::DEFAULT_MAX_ATTEMPTS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ServiceError, ServiceResult};

// =============================================================================
// Business Settings
// =============================================================================

/// The store's civil timezone. Business days are computed in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessSettings {
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Offset from UTC in minutes (west is negative).
    #[serde(default = "default_utc_offset")]
    pub utc_offset_minutes: i32,
}

fn default_timezone() -> String {
    "America/Tegucigalpa".to_string()
}

fn default_utc_offset() -> i32 {
    -360
}

impl Default for BusinessSettings {
    fn default() -> Self {
        BusinessSettings {
            timezone: default_timezone(),
            utc_offset_minutes: default_utc_offset(),
        }
    }
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file shared by the store's terminals.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("hn", "caja", "pos")
        .map(|dirs| dirs.data_dir().join("caja.db"))
        .unwrap_or_else(|| PathBuf::from("caja.db"))
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Backend & Invoicing Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Deadline for each store read or write (milliseconds).
    #[serde(default = "default_backend_timeout")]
    pub timeout_ms: u64,
}

fn default_backend_timeout() -> u64 {
    8000
}

impl Default for BackendSettings {
    fn default() -> Self {
        BackendSettings {
            timeout_ms: default_backend_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoicingSettings {
    /// Taken numbers tolerated in one allocation before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

impl Default for InvoicingSettings {
    fn default() -> Self {
        InvoicingSettings {
            max_attempts: default_max_attempts(),
        }
    }
}

// =============================================================================
// Notification Settings
// =============================================================================

/// Close-summary notification. Disabled when `endpoint` is unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifySettings {
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Recipient forwarded as the `admin` parameter.
    #[serde(default)]
    pub admin_email: String,

    #[serde(default = "default_notify_timeout")]
    pub timeout_ms: u64,

    /// Pending notifications beyond this are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_notify_timeout() -> u64 {
    5000
}

fn default_queue_capacity() -> usize {
    64
}

impl Default for NotifySettings {
    fn default() -> Self {
        NotifySettings {
            endpoint: None,
            admin_email: String::new(),
            timeout_ms: default_notify_timeout(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete terminal configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CajaConfig {
    #[serde(default)]
    pub business: BusinessSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub backend: BackendSettings,

    #[serde(default)]
    pub invoicing: InvoicingSettings,

    #[serde(default)]
    pub notify: NotifySettings,
}

impl CajaConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (caja.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ServiceResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading terminal config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load terminal config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ServiceResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ServiceError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Terminal config saved");
        Ok(())
    }

    pub fn validate(&self) -> ServiceResult<()> {
        self.business_timezone()?;

        if self.database.max_connections == 0 {
            return Err(ServiceError::Config("max_connections must be greater than 0".into()));
        }
        if self.backend.timeout_ms == 0 {
            return Err(ServiceError::Config("backend timeout_ms must be greater than 0".into()));
        }
        if self.invoicing.max_attempts == 0 {
            return Err(ServiceError::Config("max_attempts must be greater than 0".into()));
        }
        if self.notify.timeout_ms == 0 || self.notify.queue_capacity == 0 {
            return Err(ServiceError::Config(
                "notify timeout_ms and queue_capacity must be greater than 0".into(),
            ));
        }

        if let Some(ref endpoint) = self.notify.endpoint {
            let url = Url::parse(endpoint)?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ServiceError::Config(format!(
                    "Notification endpoint must be http:// or https://, got: {}",
                    endpoint
                )));
            }
        }

        Ok(())
    }

    /// Applies `CAJA_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("CAJA_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(url) = lookup("CAJA_NOTIFY_URL") {
            debug!(url = %url, "Overriding notification endpoint from environment");
            self.notify.endpoint = Some(url).filter(|u| !u.is_empty());
        }

        if let Some(admin) = lookup("CAJA_NOTIFY_ADMIN") {
            self.notify.admin_email = admin;
        }

        if let Some(offset) = lookup("CAJA_TZ_OFFSET_MINUTES") {
            match offset.parse::<i32>() {
                Ok(minutes) => self.business.utc_offset_minutes = minutes,
                Err(_) => warn!(value = %offset, "Ignoring invalid CAJA_TZ_OFFSET_MINUTES"),
            }
        }

        if let Some(timeout) = lookup("CAJA_BACKEND_TIMEOUT_MS") {
            match timeout.parse::<u64>() {
                Ok(ms) => self.backend.timeout_ms = ms,
                Err(_) => warn!(value = %timeout, "Ignoring invalid CAJA_BACKEND_TIMEOUT_MS"),
            }
        }

        if let Some(attempts) = lookup("CAJA_MAX_INVOICE_ATTEMPTS") {
            match attempts.parse::<u32>() {
                Ok(n) => self.invoicing.max_attempts = n,
                Err(_) => warn!(value = %attempts, "Ignoring invalid CAJA_MAX_INVOICE_ATTEMPTS"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("hn", "caja", "pos").map(|dirs| dirs.config_dir().join("caja.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn business_timezone(&self) -> ServiceResult<BusinessTimezone> {
        BusinessTimezone::new(self.business.timezone.clone(), self.business.utc_offset_minutes)
            .map_err(|e| ServiceError::Config(format!("[business] {}", e)))
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend.timeout_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify.timeout_ms)
    }

    /// Parsed endpoint, `None` when notifications are off.
    pub fn notify_endpoint(&self) -> ServiceResult<Option<Url>> {
        self.notify
            .endpoint
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(ServiceError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = CajaConfig::default();
        assert_eq!(config.business.utc_offset_minutes, -360);
        assert_eq!(config.backend_timeout(), Duration::from_secs(8));
        assert_eq!(config.invoicing.max_attempts, 1000);
        assert!(config.notify.endpoint.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: CajaConfig = toml::from_str(
            r#"
            [notify]
            endpoint = "https://admin.example.hn/cierre"
            admin_email = "gerencia@example.hn"
            "#,
        )
        .unwrap();

        assert_eq!(config.notify.timeout_ms, 5000);
        assert_eq!(config.notify.queue_capacity, 64);
        assert_eq!(config.business.timezone, "America/Tegucigalpa");
        assert_eq!(
            config.notify_endpoint().unwrap().map(|u| u.host_str().map(String::from)),
            Some(Some("admin.example.hn".to_string()))
        );
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("caja.toml");

        let mut config = CajaConfig::default();
        config.database.path = dir.path().join("caja.db");
        config.backend.timeout_ms = 2500;
        config.save(Some(path.clone())).unwrap();

        let loaded = CajaConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.backend.timeout_ms, 2500);
        assert_eq!(loaded.database.path, dir.path().join("caja.db"));
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caja.toml");
        std::fs::write(&path, "[backend]\ntimeout_ms = \"soon\"\n").unwrap();

        let err = CajaConfig::load(Some(path.clone())).unwrap_err();
        assert!(err.is_config_error());

        let config = CajaConfig::load_or_default(Some(path));
        assert_eq!(config.backend.timeout_ms, 8000);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CAJA_DB_PATH", "/tmp/otra.db"),
            ("CAJA_NOTIFY_URL", "http://10.0.0.5/cierre"),
            ("CAJA_TZ_OFFSET_MINUTES", "-300"),
            ("CAJA_BACKEND_TIMEOUT_MS", "not-a-number"),
            ("CAJA_MAX_INVOICE_ATTEMPTS", "50"),
        ]);

        let mut config = CajaConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/tmp/otra.db"));
        assert_eq!(config.notify.endpoint.as_deref(), Some("http://10.0.0.5/cierre"));
        assert_eq!(config.business.utc_offset_minutes, -300);
        assert_eq!(config.backend.timeout_ms, 8000);
        assert_eq!(config.invoicing.max_attempts, 50);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = CajaConfig::default();
        config.notify.endpoint = Some("ftp://admin.example.hn".into());
        assert!(config.validate().unwrap_err().is_config_error());

        let mut config = CajaConfig::default();
        config.invoicing.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = CajaConfig::default();
        config.business.utc_offset_minutes = 24 * 60;
        assert!(config.validate().unwrap_err().is_config_error());
    }

    #[test]
    fn test_huge_offset_override_is_a_config_error() {
        let mut config = CajaConfig::default();
        config.apply_overrides(|key| (key == "CAJA_TZ_OFFSET_MINUTES").then(|| "40000000".to_string()));
        assert_eq!(config.business.utc_offset_minutes, 40_000_000);

        let err = config.validate().unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("utc_offset_minutes"));
    }
}
