use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Connection profile of the legacy shop. Credentials stay opaque and are
/// forwarded to the remote side untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationProfile {
    pub profile: String,
    pub gateway: String,
    #[serde(default)]
    pub credential_fields: Map<String, Value>,
}

impl MigrationProfile {
    pub fn new(profile: impl Into<String>, gateway: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            gateway: gateway.into(),
            credential_fields: Map::new(),
        }
    }
}
