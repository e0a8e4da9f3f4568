use crate::error::SettingsError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the remote migration API lives and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub base_url: String,
    /// Bearer token sent with every request.
    pub access_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            access_token: None,
            timeout_secs: 60,
        }
    }
}

impl GatewaySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SettingsError::invalid(
                "gateway.base_url",
                format!("'{url}' is not an http(s) URL"),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(SettingsError::invalid(
                "gateway.timeout_secs",
                "must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_urls() {
        let settings = GatewaySettings {
            base_url: "ftp://shop".into(),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
        assert!(GatewaySettings::default().validate().is_ok());
    }
}
