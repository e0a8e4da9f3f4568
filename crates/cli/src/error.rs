use engine_config::error::SettingsError;
use engine_core::error::GatewayError;
use engine_runtime::error::{CoordinatorError, StartError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read input file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("Failed to parse the selection file as JSON: {0}")]
    SelectionParse(serde_json::Error),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(serde_json::Error),

    #[error("Failed to set up the migration gateway: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Failed to join the coordination channel: {0}")]
    Coordinator(#[from] CoordinatorError),

    #[error("Migration did not start: {0}")]
    Start(#[from] StartError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Shutdown requested")]
    ShutdownRequested,
}
