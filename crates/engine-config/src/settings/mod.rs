use crate::error::SettingsError;
use engine_core::{cb::CircuitBreaker, retry::RetryPolicy, throttle::ThrottleSettings};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info};

pub mod env;
pub mod gateway;
mod throttle;

pub use gateway::GatewaySettings;

const CONFIG_DIR: &str = "shopshift";
const CONFIG_FILE: &str = "shopshift.toml";

/// Tunables of the migration engine. Every field has a working default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationSettings {
    /// Page size controller of the fetch and write loops.
    #[serde(deserialize_with = "throttle::page_size")]
    pub batch: ThrottleSettings,
    pub assets: AssetSettings,
    pub coordinator: CoordinatorSettings,
    /// Retry policy for persisting run totals.
    pub totals_retry: RetrySettings,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            batch: ThrottleSettings::page_size(),
            assets: AssetSettings::default(),
            coordinator: CoordinatorSettings::default(),
            totals_retry: RetrySettings::default(),
        }
    }
}

impl MigrationSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        throttle::validate("batch", &self.batch)?;
        self.assets.validate()?;
        if self.totals_retry.max_attempts == 0 {
            return Err(SettingsError::invalid(
                "totals_retry.max_attempts",
                "at least one attempt is required",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    /// Number of assets sent together in one download request.
    pub workload_size: usize,
    /// Identifiers requested per identifier page.
    pub id_page_size: u64,
    /// An asset is dropped once its error count exceeds this value.
    pub error_threshold: u32,
    /// Byte size controller of a single download request.
    #[serde(deserialize_with = "throttle::transfer_chunk")]
    pub transfer: ThrottleSettings,
    /// Consecutive unanswered download requests before the phase gives up.
    pub transport_failure_threshold: u32,
    pub transport_retry_base_ms: u64,
    pub transport_retry_max_ms: u64,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            workload_size: 5,
            id_page_size: 100,
            error_threshold: 3,
            transfer: ThrottleSettings::transfer_chunk(),
            transport_failure_threshold: 5,
            transport_retry_base_ms: 500,
            transport_retry_max_ms: 10_000,
        }
    }
}

impl AssetSettings {
    pub fn transport_breaker(&self) -> CircuitBreaker {
        CircuitBreaker::new(
            self.transport_failure_threshold,
            Duration::from_millis(self.transport_retry_base_ms),
            Duration::from_millis(self.transport_retry_max_ms),
        )
    }

    fn validate(&self) -> Result<(), SettingsError> {
        throttle::validate("assets.transfer", &self.transfer)?;
        if self.workload_size == 0 {
            return Err(SettingsError::invalid(
                "assets.workload_size",
                "must be positive",
            ));
        }
        if self.id_page_size == 0 {
            return Err(SettingsError::invalid(
                "assets.id_page_size",
                "must be positive",
            ));
        }
        if self.transport_failure_threshold == 0 {
            return Err(SettingsError::invalid(
                "assets.transport_failure_threshold",
                "must be positive",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSettings {
    /// How long a permission request listens for a denial.
    pub wait_window_ms: u64,
    /// Directory holding one socket per running context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_dir: Option<PathBuf>,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            wait_window_ms: 100,
            socket_dir: None,
        }
    }
}

impl CoordinatorSettings {
    pub fn wait_window(&self) -> Duration {
        Duration::from_millis(self.wait_window_ms)
    }

    /// Configured socket directory, else `shopshift` under the user's runtime
    /// directory, else under the temp directory.
    pub fn socket_dir(&self) -> PathBuf {
        self.socket_dir.clone().unwrap_or_else(|| {
            dirs::runtime_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(CONFIG_DIR)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

/// Root of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopshiftConfig {
    pub migration: MigrationSettings,
    pub gateway: GatewaySettings,
}

impl ShopshiftConfig {
    /// `<config dir>/shopshift/shopshift.toml`, when the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Loads settings from `path`, or from the default location when it exists.
    /// Without either, defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => path,
                None => {
                    debug!("No settings file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = std::fs::read_to_string(&path).map_err(|source| SettingsError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::parse(&content, &path)?;
        info!(path = %path.display(), "Loaded settings");
        Ok(config)
    }

    pub fn parse(content: &str, origin: &Path) -> Result<Self, SettingsError> {
        toml::from_str(content).map_err(|source| SettingsError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.migration.validate()?;
        self.gateway.validate()
    }

    pub fn to_toml_string(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let settings = MigrationSettings::default();
        assert_eq!(settings.batch.default_size, 50);
        assert_eq!(settings.batch.increment, 5);
        assert_eq!(settings.batch.floor(), 5);
        assert_eq!(settings.assets.workload_size, 5);
        assert_eq!(settings.assets.id_page_size, 100);
        assert_eq!(settings.assets.error_threshold, 3);
        assert_eq!(settings.assets.transfer.default_size, 8_000_000);
        assert_eq!(settings.assets.transfer.increment, 250_000);
        assert_eq!(settings.coordinator.wait_window(), Duration::from_millis(100));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn partial_tables_keep_their_own_defaults() {
        let config = ShopshiftConfig::parse(
            r#"
            [migration.batch]
            default_size = 80

            [migration.assets.transfer]
            increment = 100000
            "#,
            Path::new("inline"),
        )
        .unwrap();

        assert_eq!(config.migration.batch.default_size, 80);
        assert_eq!(config.migration.batch.increment, 5);
        assert_eq!(config.migration.assets.transfer.default_size, 8_000_000);
        assert_eq!(config.migration.assets.transfer.increment, 100_000);
        assert_eq!(config.migration.assets.workload_size, 5);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[gateway]\nbase_url = \"https://shop.example\"\n\n[migration.coordinator]\nwait_window_ms = 250"
        )
        .unwrap();

        let config = ShopshiftConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.gateway.base_url, "https://shop.example");
        assert_eq!(config.migration.coordinator.wait_window_ms, 250);
    }

    #[test]
    fn socket_dir_defaults_under_a_shopshift_directory() {
        let settings = CoordinatorSettings::default();
        assert!(settings.socket_dir().ends_with("shopshift"));

        let settings = CoordinatorSettings {
            socket_dir: Some(PathBuf::from("/run/shared/shopshift-ctx")),
            ..CoordinatorSettings::default()
        };
        assert_eq!(settings.socket_dir(), PathBuf::from("/run/shared/shopshift-ctx"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ShopshiftConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
    }

    #[test]
    fn unknown_throttle_key_is_rejected() {
        let err = ShopshiftConfig::parse(
            "[migration.batch]\nstep = 3\n",
            Path::new("inline"),
        )
        .unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn validation_catches_unusable_values() {
        let mut settings = MigrationSettings::default();
        settings.batch.increment = 0;
        assert!(settings.validate().is_err());

        let mut settings = MigrationSettings::default();
        settings.assets.transfer.max_size = Some(1_000);
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid { field: "assets.transfer", .. })
        ));

        let mut settings = MigrationSettings::default();
        settings.assets.workload_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rendered_settings_parse_back() {
        let config = ShopshiftConfig::default();
        let rendered = config.to_toml_string().unwrap();
        let parsed = ShopshiftConfig::parse(&rendered, Path::new("rendered")).unwrap();
        assert_eq!(parsed, config);
    }
}
