use crate::core::identifiers::ContextId;
use serde::{Deserialize, Serialize};

/// Messages exchanged between sibling execution contexts to keep a single
/// migration running at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BroadcastMessage {
    /// A context asks whether anybody else is migrating.
    MigrationWanted,
    /// Answer from a context that is currently migrating.
    MigrationDenied,
    /// A context came up.
    Initialized,
}

/// Wire frame of the coordination channel. The origin lets a context skip
/// its own broadcasts on channels that echo to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastEnvelope {
    pub origin: ContextId,
    pub migration_message: BroadcastMessage,
}

impl BroadcastEnvelope {
    pub fn new(origin: ContextId, migration_message: BroadcastMessage) -> Self {
        Self {
            origin,
            migration_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_wire_names() {
        let env = BroadcastEnvelope::new(ContextId::generate(), BroadcastMessage::MigrationWanted);
        let json = serde_json::to_value(env).unwrap();
        assert_eq!(json["migrationMessage"], "migrationWanted");
    }
}
