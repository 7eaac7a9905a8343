//! Byte Store Module
//!
//! Raw file I/O capability injected into the file-backed adapters. The
//! blocking store runs each system call inline on the calling thread; the
//! tokio store suspends at the call and resumes when the I/O completes.
//! Adapter logic is identical over either.

mod blocking;
mod tokio_fs;

use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;

pub use blocking::BlockingFileStore;
pub use tokio_fs::AsyncFileStore;

/// A file found by [`ByteStore::list`].
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Read/write/delete/list by path.
#[async_trait]
pub trait ByteStore: Send + Sync + Debug {
    /// Reads a whole file; `None` if it does not exist.
    async fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>>;

    /// Replaces a whole file, creating parent directories as needed.
    async fn write(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Removes a file; `false` if it did not exist.
    async fn delete(&self, path: &Path) -> io::Result<bool>;

    /// Regular files directly under `dir` whose name starts with `prefix`.
    async fn list(&self, dir: &Path, prefix: &str) -> io::Result<Vec<StoredFile>>;

    /// Creates a directory and its parents.
    async fn create_dir(&self, dir: &Path) -> io::Result<()>;
}

/// Maps a missing file to `None`.
fn not_found_as_none<T>(result: io::Result<T>) -> io::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

fn file_name_matches(path: &Path, prefix: &str) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn stores() -> Vec<Arc<dyn ByteStore>> {
        vec![Arc::new(BlockingFileStore), Arc::new(AsyncFileStore)]
    }

    #[tokio::test]
    async fn test_read_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        for store in stores() {
            let read = store.read(&dir.path().join("absent")).await.unwrap();
            assert!(read.is_none(), "{store:?}");
        }
    }

    #[tokio::test]
    async fn test_write_creates_parents_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        for (i, store) in stores().into_iter().enumerate() {
            let path = dir.path().join(format!("nested{i}/deeper/file"));
            store.write(&path, b"payload").await.unwrap();
            assert_eq!(store.read(&path).await.unwrap().unwrap(), b"payload");
        }
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        for store in stores() {
            let path = dir.path().join("victim");
            store.write(&path, b"x").await.unwrap();
            assert!(store.delete(&path).await.unwrap());
            assert!(!store.delete(&path).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_list_filters_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        for store in stores() {
            store.write(&dir.path().join("a_1"), b"1").await.unwrap();
            store.write(&dir.path().join("a_2"), b"2").await.unwrap();
            store.write(&dir.path().join("b_1"), b"3").await.unwrap();
            store.create_dir(&dir.path().join("a_dir")).await.unwrap();

            let mut names: Vec<_> = store
                .list(dir.path(), "a_")
                .await
                .unwrap()
                .into_iter()
                .map(|file| file.path.file_name().unwrap().to_string_lossy().into_owned())
                .collect();
            names.sort();
            assert_eq!(names, vec!["a_1", "a_2"]);
        }
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        for store in stores() {
            let files = store.list(&dir.path().join("nope"), "").await.unwrap();
            assert!(files.is_empty());
        }
    }
}
