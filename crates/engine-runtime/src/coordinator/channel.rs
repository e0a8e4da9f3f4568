use crate::error::CoordinatorError;
use async_trait::async_trait;
use model::broadcast::BroadcastEnvelope;
use tokio::sync::broadcast;
use tracing::warn;

/// Receiving half of a broadcast channel.
#[async_trait]
pub trait BroadcastSubscription: Send {
    /// Next envelope, or `None` once the channel is gone.
    async fn recv(&mut self) -> Option<BroadcastEnvelope>;
}

/// Fan-out channel shared by all contexts of one user.
pub trait BroadcastChannel: Send + Sync {
    fn post(&self, envelope: BroadcastEnvelope) -> Result<(), CoordinatorError>;

    fn subscribe(&self) -> Box<dyn BroadcastSubscription>;
}

/// In-process channel connecting workers that live in the same runtime.
/// Every subscriber, the sender included, receives every envelope.
#[derive(Clone, Debug)]
pub struct LocalBroadcastHub {
    sender: broadcast::Sender<BroadcastEnvelope>,
}

impl LocalBroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LocalBroadcastHub {
    fn default() -> Self {
        Self::new(64)
    }
}

impl BroadcastChannel for LocalBroadcastHub {
    fn post(&self, envelope: BroadcastEnvelope) -> Result<(), CoordinatorError> {
        self.sender
            .send(envelope)
            .map(|_| ())
            .map_err(|_| CoordinatorError::NoListeners)
    }

    fn subscribe(&self) -> Box<dyn BroadcastSubscription> {
        Box::new(LocalSubscription {
            receiver: self.sender.subscribe(),
        })
    }
}

struct LocalSubscription {
    receiver: broadcast::Receiver<BroadcastEnvelope>,
}

#[async_trait]
impl BroadcastSubscription for LocalSubscription {
    async fn recv(&mut self) -> Option<BroadcastEnvelope> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Broadcast subscriber lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{broadcast::BroadcastMessage, core::identifiers::ContextId};

    #[tokio::test]
    async fn every_subscriber_sees_every_post() {
        let hub = LocalBroadcastHub::default();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        let origin = ContextId::generate();

        hub.post(BroadcastEnvelope::new(origin, BroadcastMessage::Initialized))
            .unwrap();

        assert_eq!(a.recv().await.unwrap().origin, origin);
        assert_eq!(
            b.recv().await.unwrap().migration_message,
            BroadcastMessage::Initialized
        );
    }

    #[test]
    fn posting_without_subscribers_fails() {
        let hub = LocalBroadcastHub::default();
        let result = hub.post(BroadcastEnvelope::new(
            ContextId::generate(),
            BroadcastMessage::MigrationWanted,
        ));
        assert!(matches!(result, Err(CoordinatorError::NoListeners)));
    }
}
