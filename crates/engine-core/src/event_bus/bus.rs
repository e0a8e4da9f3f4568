use model::events::Event;
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::Arc,
};
use tokio::sync::RwLock;
use tracing::debug;

/// Callback registered for one event type.
pub type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Registry with exactly one slot per event type.
///
/// Subscribing replaces whatever was registered for that type before.
/// Publishing calls the registered callback inline, so callbacks observe
/// events in the order the emitting component produced them. Callbacks run
/// without the registry lock held.
#[derive(Clone, Default)]
pub struct EventBus {
    // Map of Event TypeID -> Callback<E>
    slots: Arc<RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for `E`. Returns true when a previous callback was replaced.
    pub async fn subscribe<E>(&self, callback: Callback<E>) -> bool
    where
        E: Event,
    {
        let replaced = self
            .slots
            .write()
            .await
            .insert(TypeId::of::<E>(), Box::new(callback))
            .is_some();

        debug!(
            event_type = std::any::type_name::<E>(),
            replaced, "Subscribed to event"
        );
        replaced
    }

    /// Convenience wrapper around [`EventBus::subscribe`] for plain closures.
    pub async fn subscribe_fn<E, F>(&self, f: F) -> bool
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.subscribe::<E>(Arc::new(f)).await
    }

    /// Empties the slot for `E`. Returns true when something was registered.
    pub async fn unsubscribe<E>(&self) -> bool
    where
        E: Event,
    {
        let removed = self
            .slots
            .write()
            .await
            .remove(&TypeId::of::<E>())
            .is_some();

        if removed {
            debug!(
                event_type = std::any::type_name::<E>(),
                "Unsubscribed from event"
            );
        }
        removed
    }

    /// Fills or clears the slot for `E` depending on `callback`.
    pub async fn replace<E>(&self, callback: Option<Callback<E>>)
    where
        E: Event,
    {
        match callback {
            Some(cb) => {
                self.subscribe(cb).await;
            }
            None => {
                self.unsubscribe::<E>().await;
            }
        }
    }

    pub async fn publish<E>(&self, event: &E)
    where
        E: Event,
    {
        let callback = {
            let slots = self.slots.read().await;
            slots
                .get(&TypeId::of::<E>())
                .and_then(|boxed| boxed.downcast_ref::<Callback<E>>())
                .cloned()
        };

        match callback {
            Some(cb) => cb(event),
            None => debug!(
                event_type = event.event_type(),
                "No subscriber for event"
            ),
        }
    }

    pub async fn is_subscribed<E>(&self) -> bool
    where
        E: Event,
    {
        self.slots.read().await.contains_key(&TypeId::of::<E>())
    }

    pub async fn clear(&self) {
        self.slots.write().await.clear();
        debug!("Cleared all subscriptions from EventBus");
    }
}
