// crates/opsgate-reliability/src/persistence.rs
// ============================================================================
// Module: Atomic Persistence Helpers
// Description: Write-whole-file-then-rename snapshot persistence.
// Purpose: Give every component that serializes its state to disk (retry
//          queue, review queue, action queue, response cache) one shared,
//          crash-safe write primitive.
// Dependencies: serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! A snapshot write never leaves a half-written file observable at its
//! final path: the new content is written to a sibling `.tmp` file first,
//! then renamed into place, so readers only ever see a complete file.

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

/// Errors raised while persisting or restoring a snapshot.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Serializing the snapshot to JSON failed.
    #[error("failed to serialize snapshot: {0}")]
    Serialize(String),
    /// A filesystem operation failed.
    #[error("filesystem error at {path}: {source}")]
    Io {
        /// Path the failing operation targeted.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Deserializing a loaded snapshot failed.
    #[error("failed to parse snapshot: {0}")]
    Parse(String),
}

/// Writes `value` to `path` atomically: serialize, write to `path.tmp`,
/// then rename over `path`.
///
/// # Errors
///
/// Returns [`PersistenceError`] if serialization or either filesystem
/// operation fails. A failure here never partially overwrites an existing
/// snapshot at `path`.
pub async fn write_snapshot<T: Serialize + Sync>(
    path: &Path,
    value: &T,
) -> Result<(), PersistenceError> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|err| PersistenceError::Serialize(err.to_string()))?;
    let tmp_path = path.with_extension("tmp");
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| PersistenceError::Io {
                path: parent.display().to_string(),
                source,
            })?;
    }
    tokio::fs::write(&tmp_path, &bytes)
        .await
        .map_err(|source| PersistenceError::Io {
            path: tmp_path.display().to_string(),
            source,
        })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|source| PersistenceError::Io {
            path: path.display().to_string(),
            source,
        })?;
    Ok(())
}

/// Loads a snapshot previously written by [`write_snapshot`]. Returns
/// `Ok(None)` if `path` does not exist yet, so callers can distinguish
/// "nothing persisted" from a parse failure.
///
/// # Errors
///
/// Returns [`PersistenceError`] if the file exists but cannot be read or
/// parsed.
pub async fn load_snapshot<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<Option<T>, PersistenceError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| PersistenceError::Parse(err.to_string())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(PersistenceError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions and debug output.
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )]

    use serde::Deserialize;
    use serde::Serialize;
    use tempfile::tempdir;

    use super::load_snapshot;
    use super::write_snapshot;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Snapshot {
        counter: u32,
    }

    #[tokio::test]
    async fn round_trips_through_write_and_load() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        write_snapshot(&path, &Snapshot { counter: 7 })
            .await
            .expect("write");
        let loaded: Option<Snapshot> = load_snapshot(&path).await.expect("load");
        assert_eq!(loaded, Some(Snapshot { counter: 7 }));
    }

    #[tokio::test]
    async fn load_missing_file_returns_none() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("missing.json");
        let loaded: Option<Snapshot> = load_snapshot(&path).await.expect("load");
        assert_eq!(loaded, None);
    }

    #[tokio::test]
    async fn no_tmp_file_left_behind_after_write() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        write_snapshot(&path, &Snapshot { counter: 1 })
            .await
            .expect("write");
        assert!(!path.with_extension("tmp").exists());
    }
}
