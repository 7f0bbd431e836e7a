// # File Tracked Store
//
// JSON-file implementation of TrackedStore. Survives daemon restarts
// and crashes, so a restarted run picks up the remote identifiers it
// recorded earlier instead of creating duplicate resources.
//
// Durability strategy:
// - every mutation writes through immediately (tmp file + rename)
// - the previous good file is kept as `<path>.backup` before each
//   rename
// - a file that fails to parse on open falls back to the backup; if
//   that also fails, the store starts empty
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "records": {
//     "www.example.com:A": {
//       "id": 42,
//       "domain": "example.com",
//       "hostname": "www.example.com",
//       "last_synced": "2025-01-09T12:00:00Z"
//     }
//   },
//   "groups": {
//     "web": { "id": "sg-123", "last_synced": "2025-01-09T12:00:00Z" }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::traits::state_store::{TrackedGroup, TrackedRecord, TrackedStore, TrackedStoreFactory};
use crate::Error;

/// Bumped if the on-disk layout ever changes
const STATE_FILE_VERSION: &str = "1.0";

/// Everything the store persists, serialized as-is
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Snapshot {
    version: String,
    #[serde(default)]
    records: HashMap<String, TrackedRecord>,
    #[serde(default)]
    groups: HashMap<String, TrackedGroup>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: STATE_FILE_VERSION.to_string(),
            records: HashMap::new(),
            groups: HashMap::new(),
        }
    }
}

/// File-backed tracked store with crash recovery
#[derive(Debug)]
pub struct FileTrackedStore {
    path: PathBuf,
    snapshot: Arc<RwLock<Snapshot>>,
}

fn store_err(context: &str, path: &Path, err: impl std::fmt::Display) -> Error {
    Error::state_store(format!("{} {}: {}", context, path.display(), err))
}

impl FileTrackedStore {
    /// Open a store at `path`, creating parent directories as needed
    /// and recovering from the backup if the file is corrupted
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| store_err("failed to create state directory for", &path, e))?;
        }

        let snapshot = Self::open_with_recovery(&path).await?;
        debug!(
            records = snapshot.records.len(),
            groups = snapshot.groups.len(),
            "tracked state loaded"
        );

        Ok(Self {
            path,
            snapshot: Arc::new(RwLock::new(snapshot)),
        })
    }

    async fn open_with_recovery(path: &Path) -> Result<Snapshot, Error> {
        if !path.exists() {
            return Ok(Snapshot::default());
        }

        match Self::parse_file(path).await {
            Ok(snapshot) => Ok(snapshot),
            // Read failures propagate; only parse failures recover
            Err(e @ Error::StateStore(_)) => Err(e),
            Err(parse_err) => {
                warn!(
                    "state file {} is unreadable ({}), trying backup",
                    path.display(),
                    parse_err
                );

                let backup = backup_path(path);
                if !backup.exists() {
                    warn!("no backup present, starting with empty tracked state");
                    return Ok(Snapshot::default());
                }

                match Self::parse_file(&backup).await {
                    Ok(snapshot) => {
                        // Put the good copy back in place for the next open
                        if let Err(e) = fs::copy(&backup, path).await {
                            warn!("could not restore state file from backup: {}", e);
                        }
                        Ok(snapshot)
                    }
                    Err(e) => {
                        warn!("backup is also unreadable ({}), starting empty", e);
                        Ok(Snapshot::default())
                    }
                }
            }
        }
    }

    /// Read and parse one state file. I/O failures are `StateStore`
    /// errors; parse failures are `Json` so recovery can tell
    /// corruption apart from a missing or unreadable file.
    async fn parse_file(path: &Path) -> Result<Snapshot, Error> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| store_err("failed to read state file", path, e))?;

        let snapshot: Snapshot = serde_json::from_str(&content)?;

        if snapshot.version != STATE_FILE_VERSION {
            warn!(
                "state file version {} differs from expected {}, loading anyway",
                snapshot.version, STATE_FILE_VERSION
            );
        }

        Ok(snapshot)
    }

    /// Persist the current snapshot: serialize, write to a temp file,
    /// back up the previous file, then rename over it
    async fn persist(&self) -> Result<(), Error> {
        let json = {
            let snapshot = self.snapshot.read().await;
            serde_json::to_string_pretty(&*snapshot)?
        };

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json.as_bytes())
            .await
            .map_err(|e| store_err("failed to write temp state file", &tmp, e))?;

        if self.path.exists()
            && let Err(e) = fs::copy(&self.path, backup_path(&self.path)).await
        {
            warn!("could not back up previous state file: {}", e);
        }

        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| store_err("failed to replace state file", &self.path, e))?;

        Ok(())
    }

    /// Force an immediate write to disk
    pub async fn sync(&self) -> Result<(), Error> {
        self.persist().await
    }

    #[cfg(test)]
    fn backup_file(&self) -> PathBuf {
        backup_path(&self.path)
    }
}

fn backup_path(path: &Path) -> PathBuf {
    path.with_extension("backup")
}

#[async_trait]
impl TrackedStore for FileTrackedStore {
    async fn get_record(&self, name: &str) -> Result<Option<TrackedRecord>, Error> {
        Ok(self.snapshot.read().await.records.get(name).cloned())
    }

    async fn set_record(&self, name: &str, record: &TrackedRecord) -> Result<(), Error> {
        self.snapshot
            .write()
            .await
            .records
            .insert(name.to_string(), record.clone());
        self.persist().await
    }

    async fn delete_record(&self, name: &str) -> Result<(), Error> {
        self.snapshot.write().await.records.remove(name);
        self.persist().await
    }

    async fn list_records(&self) -> Result<Vec<String>, Error> {
        Ok(self.snapshot.read().await.records.keys().cloned().collect())
    }

    async fn get_group(&self, name: &str) -> Result<Option<TrackedGroup>, Error> {
        Ok(self.snapshot.read().await.groups.get(name).cloned())
    }

    async fn set_group(&self, name: &str, group: &TrackedGroup) -> Result<(), Error> {
        self.snapshot
            .write()
            .await
            .groups
            .insert(name.to_string(), group.clone());
        self.persist().await
    }

    async fn delete_group(&self, name: &str) -> Result<(), Error> {
        self.snapshot.write().await.groups.remove(name);
        self.persist().await
    }

    async fn list_groups(&self) -> Result<Vec<String>, Error> {
        Ok(self.snapshot.read().await.groups.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Mutations write through, so there is nothing buffered;
        // persisting once more costs little and covers external
        // deletion of the file while running
        self.persist().await
    }
}

/// Factory for file tracked stores
pub struct FileTrackedStoreFactory;

#[async_trait]
impl TrackedStoreFactory for FileTrackedStoreFactory {
    async fn create(&self, config: &serde_json::Value) -> Result<Box<dyn TrackedStore>, Error> {
        let path = config
            .get("path")
            .and_then(|p| p.as_str())
            .ok_or_else(|| Error::config("File state store requires a 'path' setting"))?;

        Ok(Box::new(FileTrackedStore::new(path).await?))
    }
}
