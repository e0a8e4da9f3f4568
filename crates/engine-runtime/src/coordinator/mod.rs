use async_trait::async_trait;

pub mod broadcast;
pub mod channel;
#[cfg(unix)]
pub mod socket;

/// Soft mutual exclusion between sibling execution contexts.
#[async_trait]
pub trait MigrationLock: Send + Sync {
    /// Asks the other contexts whether one of them is migrating.
    /// Returns true when nobody objected.
    async fn request_permission(&self) -> bool;

    /// Marks this context as migrating. Later requests from others get denied.
    fn announce_start(&self);

    fn announce_stop(&self);
}
