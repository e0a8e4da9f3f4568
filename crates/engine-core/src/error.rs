use model::migration::errors::MigrationErrorRecord;
use thiserror::Error;

/// Failure of a single remote operation.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// No response reached the client.
    #[error("No response from server: {0}")]
    Transport(String),

    /// The server answered with an error payload.
    #[error("Server rejected the request (status {status:?}) with {} error(s)", errors.len())]
    Remote {
        status: Option<u16>,
        errors: Vec<MigrationErrorRecord>,
    },

    /// The server answered, but the payload could not be read.
    #[error("Malformed server response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// True when there was a response the latency of which is meaningful.
    pub fn has_response(&self) -> bool {
        matches!(self, GatewayError::Remote { .. })
    }

    /// Structured descriptors carried by the failure, empty for transport problems.
    pub fn into_records(self) -> Vec<MigrationErrorRecord> {
        match self {
            GatewayError::Remote { errors, .. } => errors,
            _ => Vec::new(),
        }
    }
}
