use super::{
    MigrationLock,
    channel::{BroadcastChannel, BroadcastSubscription},
};
use async_trait::async_trait;
use model::{
    broadcast::{BroadcastEnvelope, BroadcastMessage},
    core::identifiers::ContextId,
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct LockFlags {
    /// This context is migrating and denies every request.
    migrating: AtomicBool,
    /// Flipped on every observed denial. A requester compares it against
    /// the value it saw before asking.
    response_flag: AtomicBool,
}

/// [`MigrationLock`] over a broadcast channel.
///
/// A requester announces `MigrationWanted` and listens for a fixed window;
/// any migrating context answers `MigrationDenied`. Two contexts that ask
/// within the same window, before either started, can both be granted.
/// An odd number of denials is required to block, so two migrating
/// contexts answering the same request cancel each other out.
pub struct BroadcastCoordinator {
    origin: ContextId,
    channel: Arc<dyn BroadcastChannel>,
    flags: Arc<LockFlags>,
    wait_window: Duration,
    listener: JoinHandle<()>,
}

impl BroadcastCoordinator {
    /// Subscribes to `channel`, spawns the listener and announces this context.
    /// Must be called from within a Tokio runtime.
    pub fn new(channel: Arc<dyn BroadcastChannel>, wait_window: Duration) -> Self {
        let origin = ContextId::generate();
        let flags = Arc::new(LockFlags::default());
        let subscription = channel.subscribe();

        let listener = tokio::spawn(listen(
            origin,
            subscription,
            channel.clone(),
            flags.clone(),
        ));

        let coordinator = Self {
            origin,
            channel,
            flags,
            wait_window,
            listener,
        };
        coordinator.post(BroadcastMessage::Initialized);
        coordinator
    }

    pub fn context_id(&self) -> ContextId {
        self.origin
    }

    pub fn is_migrating(&self) -> bool {
        self.flags.migrating.load(Ordering::SeqCst)
    }

    fn post(&self, message: BroadcastMessage) {
        if let Err(e) = self
            .channel
            .post(BroadcastEnvelope::new(self.origin, message))
        {
            warn!(context = %self.origin, ?message, error = %e, "Failed to broadcast");
        }
    }
}

#[async_trait]
impl MigrationLock for BroadcastCoordinator {
    async fn request_permission(&self) -> bool {
        let before = self.flags.response_flag.load(Ordering::SeqCst);
        self.post(BroadcastMessage::MigrationWanted);

        tokio::time::sleep(self.wait_window).await;

        let granted = self.flags.response_flag.load(Ordering::SeqCst) == before;
        debug!(context = %self.origin, granted, "Migration permission requested");
        granted
    }

    fn announce_start(&self) {
        self.flags.migrating.store(true, Ordering::SeqCst);
        info!(context = %self.origin, "Context started migrating");
    }

    fn announce_stop(&self) {
        self.flags.migrating.store(false, Ordering::SeqCst);
        info!(context = %self.origin, "Context stopped migrating");
    }
}

impl Drop for BroadcastCoordinator {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn listen(
    origin: ContextId,
    mut subscription: Box<dyn BroadcastSubscription>,
    channel: Arc<dyn BroadcastChannel>,
    flags: Arc<LockFlags>,
) {
    while let Some(envelope) = subscription.recv().await {
        if envelope.origin == origin {
            continue;
        }

        match envelope.migration_message {
            BroadcastMessage::MigrationWanted => {
                if flags.migrating.load(Ordering::SeqCst) {
                    debug!(context = %origin, requester = %envelope.origin, "Denying migration request");
                    if let Err(e) = channel.post(BroadcastEnvelope::new(
                        origin,
                        BroadcastMessage::MigrationDenied,
                    )) {
                        warn!(context = %origin, error = %e, "Failed to send denial");
                    }
                }
            }
            BroadcastMessage::MigrationDenied => {
                flags.response_flag.fetch_xor(true, Ordering::SeqCst);
            }
            BroadcastMessage::Initialized => {
                debug!(context = %origin, peer = %envelope.origin, "Peer context initialized");
            }
        }
    }

    debug!(context = %origin, "Broadcast channel closed, listener stopped");
}
