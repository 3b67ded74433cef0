//! Offset-table persistence.
//!
//! G10 writes mark the table dirty; the dispatcher writes it through
//! the [`OffsetStore`] on the next idle pass, and init loads it back.
//! The file format is TOML, same as the rest of the configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use arbor_common::consts::{AXIS_COUNT, COORD_SYSTEM_COUNT};

/// The persisted table: `[coord_system][axis]`, mm.
pub type OffsetTable = [[f64; AXIS_COUNT]; COORD_SYSTEM_COUNT];

/// Offset persistence error.
#[derive(Debug, Error)]
pub enum PersistError {
    /// File I/O error.
    #[error("offset store I/O error: {0}")]
    Io(String),
    /// Serialization/deserialization error.
    #[error("offset store format error: {0}")]
    Format(String),
}

/// Persistent backing for the work-offset table.
pub trait OffsetStore {
    /// Load the stored table; `None` when nothing was stored yet.
    fn load(&self) -> Result<Option<OffsetTable>, PersistError>;
    /// Write the whole table through.
    fn save(&mut self, table: &OffsetTable) -> Result<(), PersistError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct OffsetsFile {
    offsets: OffsetTable,
}

/// TOML-file offset store.
#[derive(Debug)]
pub struct TomlOffsetStore {
    path: PathBuf,
}

impl TomlOffsetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl OffsetStore for TomlOffsetStore {
    fn load(&self) -> Result<Option<OffsetTable>, PersistError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| PersistError::Io(format!("read {}: {e}", self.path.display())))?;
        let file: OffsetsFile =
            toml::from_str(&text).map_err(|e| PersistError::Format(e.to_string()))?;
        Ok(Some(file.offsets))
    }

    fn save(&mut self, table: &OffsetTable) -> Result<(), PersistError> {
        let text = toml::to_string(&OffsetsFile { offsets: *table })
            .map_err(|e| PersistError::Format(e.to_string()))?;
        std::fs::write(&self.path, text)
            .map_err(|e| PersistError::Io(format!("write {}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), "offset table persisted");
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
