//! Cooperative byte store over `tokio::fs`.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::fs;

use super::{file_name_matches, not_found_as_none, ByteStore, StoredFile};

/// Cooperative model: the task yields while the read/write is in flight so
/// other tasks on the same thread keep running.
#[derive(Debug, Default, Clone, Copy)]
pub struct AsyncFileStore;

#[async_trait]
impl ByteStore for AsyncFileStore {
    async fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        not_found_as_none(fs::read(path).await)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, data).await
    }

    async fn delete(&self, path: &Path) -> io::Result<bool> {
        Ok(not_found_as_none(fs::remove_file(path).await)?.is_some())
    }

    async fn list(&self, dir: &Path, prefix: &str) -> io::Result<Vec<StoredFile>> {
        let Some(mut entries) = not_found_as_none(fs::read_dir(dir).await)? else {
            return Ok(Vec::new());
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !file_name_matches(&path, prefix) {
                continue;
            }
            let Some(metadata) = not_found_as_none(entry.metadata().await)? else {
                continue;
            };
            if metadata.is_file() {
                files.push(StoredFile {
                    path,
                    modified: metadata.modified()?,
                });
            }
        }
        Ok(files)
    }

    async fn create_dir(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir).await
    }
}
