use std::{
    ffi::OsStr,
    fmt::Display,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::TryFutureExt as _;
use tokio::{fs, io::AsyncWriteExt as _, task::spawn_blocking};
use tracing::{debug, error};

use super::{
    Store, StoreInfo, ValidPath,
    error::{StoreError, StoreResult},
};

//from std
fn rsplit_file_at_dot(file: &OsStr) -> (Option<&OsStr>, Option<&OsStr>) {
    if file.as_encoded_bytes() == b".." {
        return (Some(file), None);
    }

    // The unsafety here stems from converting between &OsStr and &[u8]
    // and back. This is safe to do because (1) we only look at ASCII
    // contents of the encoding and (2) new &OsStr values are produced
    // only from ASCII-bounded slices of existing &OsStr values.
    let mut iter = file.as_encoded_bytes().rsplitn(2, |b| *b == b'.');
    let after = iter.next();
    let before = iter.next();
    if before == Some(b"") {
        (Some(file), None)
    } else {
        unsafe {
            (
                before.map(|s| OsStr::from_encoded_bytes_unchecked(s)),
                after.map(|s| OsStr::from_encoded_bytes_unchecked(s)),
            )
        }
    }
}

const MAX_SAME_FILES: usize = 100;

/// Finds free name, result is only valid while store lock is held by adding (n) suffix before extension: cover.jpg -> cover(1).jpg
fn find_unique_path(path: &Path) -> StoreResult<PathBuf> {
    let (base_path, ext) = rsplit_file_at_dot(path.as_os_str());
    let new_path = match (base_path, ext) {
        (Some(base_path), Some(_)) => base_path,
        _ => path.as_os_str(),
    };

    for i in 1..=MAX_SAME_FILES {
        let mut new_path = new_path.to_os_string();
        new_path.push(format!("({i})"));
        if let Some(ext) = ext {
            new_path.push(".");
            new_path.push(ext);
        }
        let new_path = PathBuf::from(new_path);
        if !new_path.exists() {
            return Ok(new_path);
        }
    }

    Err(StoreError::PathConflict)
}

fn unique_path_sync(final_path: PathBuf) -> StoreResult<(PathBuf, PathBuf)> {
    if final_path.is_dir() {
        return Err(StoreError::InvalidPath);
    }
    let res_path = if final_path.exists() {
        find_unique_path(&final_path)?
    } else {
        if let Some(parent_dir) = final_path.parent() {
            if !parent_dir.exists() {
                std::fs::create_dir_all(parent_dir)?;
            }
        }
        final_path
    };
    let id = uuid::Uuid::new_v4().to_string();
    let temp_path = res_path.with_extension(format!("{id}.tmp"));
    Ok((res_path, temp_path))
}

async fn unique_path(root: &Path, path: &str) -> StoreResult<(PathBuf, PathBuf)> {
    let path = root.join(path);
    spawn_blocking(|| unique_path_sync(path)).await?
}

async fn cleanup<E: Display>(path: &Path, error: E) -> Result<(), E> {
    error!("Failed to store file to tmp path {path:?}: {error}");
    fs::remove_file(path)
        .await
        .map_err(|e| error!("Failed to remove file {path:?}: {e}"))
        .ok();
    Err(error)
}

struct FileStoreInner {
    root: PathBuf,
    // held from choosing final name until file is renamed to it
    lock: tokio::sync::Mutex<()>,
}

/// Stores files in a directory, never overwrites existing file
#[derive(Clone)]
pub struct FileStore {
    inner: Arc<FileStoreInner>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(FileStoreInner {
                root: root.into(),
                lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    fn relative_path(&self, path: &Path) -> StoreResult<ValidPath> {
        let relative = path
            .strip_prefix(&self.inner.root)
            .map_err(|_| StoreError::InvalidPath)?;
        let relative = relative.to_str().ok_or(StoreError::InvalidPath)?;
        // store uses / separator in paths
        ValidPath::new(relative.replace(std::path::MAIN_SEPARATOR, "/"))
    }
}

impl Store for FileStore {
    async fn store_data(&self, path: &ValidPath, data: &[u8]) -> StoreResult<StoreInfo> {
        let final_path = {
            let _lock = self.inner.lock.lock().await;
            let (final_path, tmp_path) = unique_path(&self.inner.root, path.as_ref()).await?;
            let mut tmp_file = fs::File::create(&tmp_path).await?;
            tmp_file
                .write_all(data)
                .or_else(|e| cleanup(&tmp_path, e))
                .await?;
            tmp_file.flush().or_else(|e| cleanup(&tmp_path, e)).await?;
            drop(tmp_file);
            fs::rename(&tmp_path, &final_path)
                .or_else(|e| cleanup(&tmp_path, e))
                .await?;
            final_path
        };
        debug!("Stored {} bytes to {final_path:?}", data.len());
        let final_path = self.relative_path(&final_path)?;
        Ok(StoreInfo {
            final_path,
            size: data.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tracing_test::traced_test;

    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 3)]
    async fn test_store() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let content = b"neco tady je";
        let store = FileStore::new(tmp_dir.path());
        let store2 = store.clone();
        // test to move store to other thread
        let path = ValidPath::new("books/cover.jpg").unwrap();
        let path2 = path.clone();
        let handle = tokio::spawn(async move { store2.store_data(&path2, content).await });
        let res = handle.await.unwrap().unwrap();
        assert_eq!(res.size, 12);
        assert_eq!(res.final_path.as_ref(), "books/cover.jpg");
        assert_eq!(
            fs::read(store.root().join("books/cover.jpg")).await.unwrap(),
            content
        );

        let res2 = store.store_data(&path, b"other").await.unwrap();
        assert_eq!(res2.final_path.as_ref(), "books/cover(1).jpg");
        assert_eq!(res2.size, 5);
        assert_eq!(
            fs::read(store.root().join("books/cover.jpg")).await.unwrap(),
            content
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[traced_test]
    async fn test_concurrent_same_name() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp_dir.path());
        let path = ValidPath::new("books/cover.jpg").unwrap();

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let store = store.clone();
                let path = path.clone();
                tokio::spawn(async move {
                    let content = vec![i; 64];
                    let info = store.store_data(&path, &content).await.unwrap();
                    (info.final_path, content)
                })
            })
            .collect();

        let mut final_paths = HashSet::new();
        for handle in handles {
            let (final_path, content) = handle.await.unwrap();
            // each upload keeps its own content
            let stored = fs::read(store.root().join(final_path.as_ref())).await.unwrap();
            assert_eq!(stored, content);
            final_paths.insert(String::from(final_path));
        }
        assert_eq!(final_paths.len(), 8);
        assert!(final_paths.contains("books/cover.jpg"));
        assert!(final_paths.contains("books/cover(7).jpg"));

        let mut files = 0;
        let mut dir = fs::read_dir(store.root().join("books")).await.unwrap();
        while let Some(entry) = dir.next_entry().await.unwrap() {
            assert!(!entry.file_name().to_string_lossy().ends_with(".tmp"));
            files += 1;
        }
        assert_eq!(files, 8);
    }
}
