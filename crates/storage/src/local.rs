//! Filesystem-backed object store.
//!
//! Each key maps to a file under `root`; `/` in the key becomes a directory
//! separator. Listing order is lexicographic by key, matching S3. Uploads are
//! written under `{root}/.tmp/` first, outside the key namespace, and renamed
//! into place.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::{persist_scratch, scratch_file_in, RemoteObject, StorageError, StorageGateway};

/// Directory under the root holding in-flight uploads. Never listed.
const SCRATCH_DIR: &str = ".tmp";

/// A local directory used as a bucket.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to its backing file, rejecting keys that would escape
    /// the root.
    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && !key.ends_with('/')
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
            && relative.components().next() != Some(Component::Normal(SCRATCH_DIR.as_ref()));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Copy `src` into a fresh scratch file in `scratch_dir`, then rename it
    /// over `dest`.
    async fn copy_atomically(src: &Path, scratch_dir: &Path, dest: &Path) -> Result<(), StorageError> {
        for dir in [Some(scratch_dir), dest.parent()].into_iter().flatten() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StorageError::io(dir, e))?;
        }
        let scratch = scratch_file_in(scratch_dir)?;
        tokio::fs::copy(src, &scratch)
            .await
            .map_err(|e| StorageError::io(src, e))?;
        persist_scratch(scratch, dest)
    }
}

#[async_trait]
impl StorageGateway for LocalStorage {
    async fn put(&self, local_path: &Path, key: &str) -> Result<(), StorageError> {
        let dest = self.object_path(key)?;
        Self::copy_atomically(local_path, &self.root.join(SCRATCH_DIR), &dest).await?;
        tracing::debug!(key, backend = "local", "Stored object");
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>, StorageError> {
        let mut objects = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::io(&dir, e)),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::io(&dir, e))?
            {
                let path = entry.path();
                let metadata = entry
                    .metadata()
                    .await
                    .map_err(|e| StorageError::io(&path, e))?;
                if metadata.is_dir() {
                    if path != self.root.join(SCRATCH_DIR) {
                        pending.push(path);
                    }
                    continue;
                }
                let Some(key) = key_for(&self.root, &path) else {
                    continue;
                };
                if !key.starts_with(prefix) {
                    continue;
                }
                objects.push(RemoteObject {
                    key,
                    size: metadata.len(),
                });
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn get(&self, key: &str, dest: &Path) -> Result<(), StorageError> {
        let src = self.object_path(key)?;
        if !tokio::fs::try_exists(&src)
            .await
            .map_err(|e| StorageError::io(&src, e))?
        {
            return Err(StorageError::NotFound(key.to_string()));
        }
        let scratch_dir = dest.parent().unwrap_or_else(|| Path::new("."));
        Self::copy_atomically(&src, scratch_dir, dest).await
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

/// Rebuild the `/`-separated key of a file under `root`.
fn key_for(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}
