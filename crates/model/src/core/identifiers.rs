use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

/// Identifier of a migration run as known by the remote side.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Arc<str>);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }

    /// Fresh random run id, used when the caller does not bring one.
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identifies one execution context (a worker instance) on a broadcast channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(uuid::Uuid);

impl ContextId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_is_a_plain_json_string() {
        let id = RunId::new("run-42");
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json, serde_json::json!("run-42"));

        let back: RunId = serde_json::from_value(json).unwrap();
        assert_eq!(back, id);
        assert_eq!(back.as_str(), "run-42");
    }

    #[test]
    fn context_ids_are_unique() {
        assert_ne!(ContextId::generate(), ContextId::generate());
    }
}
