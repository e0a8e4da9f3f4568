use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Phase of a migration run. Serialized with the numeric codes the admin UI uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum MigrationStatus {
    Waiting,
    FetchData,
    WriteData,
    DownloadData,
    Finished,
}

#[derive(Debug, Error)]
#[error("Unknown migration status code: {0}")]
pub struct UnknownStatusCode(pub i8);

impl MigrationStatus {
    pub fn code(self) -> i8 {
        match self {
            MigrationStatus::Waiting => -1,
            MigrationStatus::FetchData => 0,
            MigrationStatus::WriteData => 1,
            MigrationStatus::DownloadData => 2,
            MigrationStatus::Finished => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStatus::Waiting => "Waiting",
            MigrationStatus::FetchData => "FetchData",
            MigrationStatus::WriteData => "WriteData",
            MigrationStatus::DownloadData => "DownloadData",
            MigrationStatus::Finished => "Finished",
        }
    }

    /// Whether `next` is a legal forward transition from `self`.
    ///
    /// DownloadData is optional, so WriteData may jump straight to Finished.
    /// Finished and Waiting both accept the start of a fresh run.
    pub fn can_advance_to(self, next: MigrationStatus) -> bool {
        use MigrationStatus::*;
        matches!(
            (self, next),
            (Waiting | Finished, FetchData)
                | (FetchData, WriteData)
                | (WriteData, DownloadData | Finished)
                | (DownloadData, Finished)
        )
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<MigrationStatus> for i8 {
    fn from(status: MigrationStatus) -> Self {
        status.code()
    }
}

impl TryFrom<i8> for MigrationStatus {
    type Error = UnknownStatusCode;

    fn try_from(code: i8) -> Result<Self, Self::Error> {
        match code {
            -1 => Ok(MigrationStatus::Waiting),
            0 => Ok(MigrationStatus::FetchData),
            1 => Ok(MigrationStatus::WriteData),
            2 => Ok(MigrationStatus::DownloadData),
            3 => Ok(MigrationStatus::Finished),
            other => Err(UnknownStatusCode(other)),
        }
    }
}
