// LogWatch - app/session.rs
//
// Persisted watcher state: per-file read positions and match counts saved
// between runs so tailing resumes where it left off.
//
// Design principles:
// - State is saved atomically (write→temp, rename→final) so a crash during
//   save never corrupts the previous good file.
// - Load problems are not fatal: a corrupt or incompatible file is logged
//   and the run starts fresh.
// - Older files stored `files` as a plain list of paths; those load as
//   zeroed entries.
// - The indexed file set is the key set of `files`.

use crate::core::model::FileState;
use crate::util::constants::SESSION_FILE_NAME;
use crate::util::error::SessionError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Version stamp for forward-compatibility checks.
///
/// Files written before the stamp existed carry no version and are read as
/// this version.
pub const SESSION_VERSION: u32 = 1;

// =============================================================================
// On-disk data structures
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    /// Schema version; must equal `SESSION_VERSION` to be accepted.
    #[serde(default = "current_version")]
    pub version: u32,

    /// Per-file cursor and count, keyed by path.
    #[serde(default, deserialize_with = "deserialize_files")]
    pub files: BTreeMap<PathBuf, FileState>,
}

fn current_version() -> u32 {
    SESSION_VERSION
}

impl SessionData {
    pub fn new(files: BTreeMap<PathBuf, FileState>) -> Self {
        Self {
            version: SESSION_VERSION,
            files,
        }
    }

    /// Paths of every persisted file, sorted.
    pub fn indexed_files(&self) -> Vec<PathBuf> {
        self.files.keys().cloned().collect()
    }
}

impl Default for SessionData {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}

/// Accepted shapes of the `files` field.
#[derive(Deserialize)]
#[serde(untagged)]
enum PersistedFiles {
    Current(BTreeMap<PathBuf, FileState>),
    Legacy(Vec<PathBuf>),
}

fn deserialize_files<'de, D>(deserializer: D) -> Result<BTreeMap<PathBuf, FileState>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match PersistedFiles::deserialize(deserializer)? {
        PersistedFiles::Current(files) => files,
        PersistedFiles::Legacy(paths) => {
            tracing::info!(files = paths.len(), "Migrating legacy file list");
            paths
                .into_iter()
                .map(|p| (p, FileState::default()))
                .collect()
        }
    })
}

// =============================================================================
// I/O helpers
// =============================================================================

/// Resolve the state file path from the platform data directory.
pub fn session_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SESSION_FILE_NAME)
}

/// Save `data` to `path` atomically (write temp → rename).
///
/// Creates parent directories as needed.
pub fn save(data: &SessionData, path: &Path) -> Result<(), SessionError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SessionError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let json = serde_json::to_string_pretty(data).map_err(|e| SessionError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json.as_bytes()).map_err(|e| SessionError::Io {
        path: tmp.clone(),
        source: e,
    })?;

    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        SessionError::Io {
            path: path.to_path_buf(),
            source: e,
        }
    })?;

    tracing::debug!(path = %path.display(), files = data.files.len(), "State saved");
    Ok(())
}

/// Load and validate state from `path`.
///
/// Returns `None` on any problem (missing file, malformed JSON, version
/// mismatch); the caller starts fresh.
pub fn load(path: &Path) -> Option<SessionData> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(path = %path.display(), error = %e, "Cannot read state file");
            }
        })
        .ok()?;

    let data: SessionData = serde_json::from_str(&content)
        .map_err(|e| {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "State file is malformed; starting fresh"
            );
        })
        .ok()?;

    if data.version != SESSION_VERSION {
        tracing::warn!(
            found = data.version,
            expected = SESSION_VERSION,
            "State file version mismatch; starting fresh"
        );
        return None;
    }

    tracing::info!(path = %path.display(), files = data.files.len(), "State file loaded");
    Some(data)
}

// =============================================================================
// Unit tests
// =============================================================================
