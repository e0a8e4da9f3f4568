pub mod cb;
pub mod error;
pub mod event_bus;
pub mod gateway;
pub mod metrics;
pub mod retry;
pub mod throttle;
