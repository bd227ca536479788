use crate::error::PersistenceError;
use crate::models::Snapshot;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Durable JSON snapshot of every group.
///
/// Opening a `Database` takes an exclusive advisory lock on `<snapshot>.lock`
/// that is held until the value is dropped, so only one writer at a time can
/// own a snapshot file.
pub struct Database {
    path: PathBuf,
    _lock: File,
}

impl Database {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let lock_path = lock_path(&path);
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(PersistenceError::io(&lock_path))?;
        lock.try_lock_exclusive()
            .map_err(|_| PersistenceError::Locked(path.clone()))?;
        debug!(path = %path.display(), "snapshot lock acquired");
        Ok(Self { path, _lock: lock })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Load the snapshot, or an empty one when nothing was saved yet
    pub async fn load(&self) -> Result<Snapshot, PersistenceError> {
        let json = match fs::read(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no snapshot found, starting empty");
                return Ok(Snapshot::new());
            }
            Err(e) => return Err(PersistenceError::io(&self.path)(e)),
        };
        let snapshot: Snapshot = serde_json::from_slice(&json)?;
        info!(path = %self.path.display(), groups = snapshot.len(), "snapshot loaded");
        Ok(snapshot)
    }

    /// Serialized form of `snapshot`, byte-for-byte what `save` writes.
    pub fn snapshot_bytes(snapshot: &Snapshot) -> Result<Vec<u8>, PersistenceError> {
        Ok(serde_json::to_vec_pretty(snapshot)?)
    }

    /// Writes the snapshot to a temporary sibling, syncs it and renames it
    /// over the live file. Returns the bytes written.
    pub async fn save(&self, snapshot: &Snapshot) -> Result<Vec<u8>, PersistenceError> {
        let bytes = Self::snapshot_bytes(snapshot)?;
        let tmp_path = self.temp_path();

        if let Err(e) = write_synced(&tmp_path, &bytes).await {
            discard(&tmp_path).await;
            return Err(e);
        }
        if let Err(e) = fs::rename(&tmp_path, &self.path).await {
            discard(&tmp_path).await;
            return Err(PersistenceError::io(&self.path)(e));
        }
        // The rename itself only survives a crash once the directory is flushed
        sync_dir(parent_dir(&self.path)).await?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "snapshot saved");
        Ok(bytes)
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()))
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

// Directory holding `path`; a bare file name lives in the working directory
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> Result<(), PersistenceError> {
    let handle = fs::File::open(dir).await.map_err(PersistenceError::io(dir))?;
    handle.sync_all().await.map_err(PersistenceError::io(dir))
}

// Directories cannot be opened for syncing here; rename durability is left to the OS
#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> Result<(), PersistenceError> {
    Ok(())
}

async fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let mut file = fs::File::create(path)
        .await
        .map_err(PersistenceError::io(path))?;
    file.write_all(bytes).await.map_err(PersistenceError::io(path))?;
    file.sync_all().await.map_err(PersistenceError::io(path))?;
    Ok(())
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "could not remove temporary snapshot");
        }
    }
}
