//! Local backup archives.
//!
//! An archive is a zip file holding a `data.json` manifest with every table's
//! rows plus a `photos/` directory with the medicine photos those rows
//! reference.
//!
//! ```text
//! medkit_backup_1717171717171.zip
//! ├── data.json      {version, exportedAt, tables, assetPaths}
//! └── photos/
//!     ├── aspirin.jpg
//!     └── syrup.png
//! ```

mod archive;
mod exporter;
mod importer;
mod manifest;

pub use archive::*;
pub use exporter::*;
pub use importer::*;
pub use manifest::*;

use thiserror::Error;

use crate::db::DbError;
use crate::notification::PlatformError;

/// Backup and restore errors.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Manifest error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Notification error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Unsupported archive version: {0}")]
    UnsupportedVersion(u32),

    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

pub type BackupResult<T> = Result<T, BackupError>;

impl From<tokio::task::JoinError> for BackupError {
    fn from(e: tokio::task::JoinError) -> Self {
        BackupError::Task(e.to_string())
    }
}
