//! Blocking byte store over `std::fs`.

use std::fs;
use std::io;
use std::path::Path;

use async_trait::async_trait;

use super::{file_name_matches, not_found_as_none, ByteStore, StoredFile};

/// Synchronous model: each call blocks the current thread until the system
/// call returns.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockingFileStore;

#[async_trait]
impl ByteStore for BlockingFileStore {
    async fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        not_found_as_none(fs::read(path))
    }

    async fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)
    }

    async fn delete(&self, path: &Path) -> io::Result<bool> {
        Ok(not_found_as_none(fs::remove_file(path))?.is_some())
    }

    async fn list(&self, dir: &Path, prefix: &str) -> io::Result<Vec<StoredFile>> {
        let Some(entries) = not_found_as_none(fs::read_dir(dir))? else {
            return Ok(Vec::new());
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !file_name_matches(&path, prefix) {
                continue;
            }
            // The file may vanish between listing and stat
            let Some(metadata) = not_found_as_none(entry.metadata())? else {
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
        fs::create_dir_all(dir)
    }
}
