pub mod assets;
pub mod broadcast;
pub mod core;
pub mod events;
pub mod migration;
