//! Cookie cache persistence
//!
//! One JSON file holding an array of per-account entries, upserted by
//! username. The in-memory state is the source of truth; every mutation
//! rewrites the whole file atomically (temp file + rename, 0600). A
//! tokio Mutex serializes writers so concurrent saves for different
//! accounts cannot interleave half-written files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// One account's cached session, as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieEntry {
    pub username: String,
    pub password: String,
    pub email: String,
    pub twofa: String,
    pub cookies: Vec<String>,
}

/// The cookie cache file manager.
pub struct CookieCache {
    path: PathBuf,
    state: Mutex<Vec<CookieEntry>>,
}

impl CookieCache {
    /// Load the cache from `path`. A missing file is a cold start: the
    /// cache begins empty and the file is created as `[]`.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading cookie cache: {e}")))?;
            let entries: Vec<CookieEntry> = serde_json::from_str(&contents)
                .map_err(|e| Error::CacheParse(format!("parsing cookie cache: {e}")))?;
            info!(path = %path.display(), entries = entries.len(), "loaded cookie cache");
            entries
        } else {
            info!(path = %path.display(), "cookie cache not found, starting empty");
            let entries = Vec::new();
            write_atomic(&path, &entries).await?;
            entries
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Cookie set for `username`, or `None` if absent or empty.
    pub async fn get(&self, username: &str) -> Option<Vec<String>> {
        let state = self.state.lock().await;
        state
            .iter()
            .find(|e| e.username == username)
            .map(|e| e.cookies.clone())
            .filter(|c| !c.is_empty())
    }

    /// Insert or replace the entry for `entry.username` and rewrite the
    /// file.
    pub async fn upsert(&self, entry: CookieEntry) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.iter_mut().find(|e| e.username == entry.username) {
            Some(existing) => *existing = entry,
            None => state.push(entry),
        }
        write_atomic(&self.path, &state).await?;
        debug!(path = %self.path.display(), entries = state.len(), "persisted cookie cache");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Atomic whole-file write: temp file in the same directory, then
/// rename over the target. 0600 on unix since entries carry passwords.
async fn write_atomic(path: &Path, entries: &[CookieEntry]) -> Result<()> {
    let json = serde_json::to_string_pretty(entries)
        .map_err(|e| Error::CacheParse(format!("serializing cookie cache: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("cookie cache path has no parent directory".into()))?;
    let tmp_path = dir.join(format!(".cookies.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp cookie cache: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting cookie cache permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp cookie cache: {e}")))?;

    Ok(())
}
