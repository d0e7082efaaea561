//! Persistence for per-symbol backfill cursors.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::debug;

use crate::models::cursor::BackfillCursor;

#[derive(Debug, Error)]
pub enum CursorStoreError {
    #[error("cursor I/O failed for {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("corrupt cursor file {path:?}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("symbol {0:?} can't be used as a cursor key")]
    InvalidSymbol(String),
}

/// Load, save and clear cursors keyed by symbol.
pub trait CursorStore: Send + Sync {
    fn load(&self, symbol: &str) -> Result<Option<BackfillCursor>, CursorStoreError>;

    fn save(&self, cursor: &BackfillCursor) -> Result<(), CursorStoreError>;

    /// Returns whether a cursor was removed.
    fn clear(&self, symbol: &str) -> Result<bool, CursorStoreError>;
}

/// One `<SYMBOL>.json` file per symbol in a directory.
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    dir: PathBuf,
}

impl FileCursorStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> Result<PathBuf, CursorStoreError> {
        let valid = !symbol.is_empty()
            && symbol
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(CursorStoreError::InvalidSymbol(symbol.to_string()));
        }
        Ok(self.dir.join(format!("{symbol}.json")))
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> CursorStoreError + '_ {
    move |source| CursorStoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl CursorStore for FileCursorStore {
    fn load(&self, symbol: &str) -> Result<Option<BackfillCursor>, CursorStoreError> {
        let path = self.path_for(symbol)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path)(e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| CursorStoreError::Json { path, source })
    }

    fn save(&self, cursor: &BackfillCursor) -> Result<(), CursorStoreError> {
        let path = self.path_for(&cursor.symbol)?;
        fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;

        let json = serde_json::to_vec_pretty(cursor).map_err(|source| CursorStoreError::Json {
            path: path.clone(),
            source,
        })?;
        // readers only ever see a complete file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_error(&tmp))?;
        fs::rename(&tmp, &path).map_err(io_error(&path))?;

        debug!(symbol = %cursor.symbol, start_ms = cursor.start_ms, path = %path.display(), "cursor saved");
        Ok(())
    }

    fn clear(&self, symbol: &str) -> Result<bool, CursorStoreError> {
        let path = self.path_for(symbol)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path)(e)),
        }
    }
}
