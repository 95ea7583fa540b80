//! Object storage backends.
//!
//! File content never touches the database: an [`ObjectStore`] keeps the
//! bytes and hands back a public URL plus an opaque object id that is later
//! used to destroy the object.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::warn;
use uuid::Uuid;

use super::cloudinary::CloudinaryStore;
use crate::config::{StorageBackend, StorageConfig};
use crate::{CumulusError, Result};

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// URL the client fetches the content from.
    pub url: String,
    /// Backend handle passed to [`ObjectStore::destroy`].
    pub object_id: String,
}

/// A place to keep file content.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `content` and return where it can be fetched.
    async fn upload(&self, content: Vec<u8>, original_name: &str) -> Result<StoredObject>;

    /// Remove a stored object. Removing a missing object is not an error.
    async fn destroy(&self, object_id: &str) -> Result<()>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Build the object store selected by `config`.
pub fn build_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    match config.backend {
        StorageBackend::Local => Ok(Arc::new(LocalObjectStore::new(
            &config.local_path,
            &config.public_base_url,
        )?)),
        StorageBackend::Cloudinary => Ok(Arc::new(CloudinaryStore::new(config.cloudinary.clone())?)),
    }
}

/// Upper bound on destroy calls in flight at once.
pub const DESTROY_CONCURRENCY: usize = 8;

/// Destroy objects, at most [`DESTROY_CONCURRENCY`] at a time. Failures are
/// logged and counted, never retried.
pub async fn destroy_best_effort(store: &dyn ObjectStore, object_ids: &[String]) -> usize {
    let results: Vec<(String, Result<()>)> = stream::iter(object_ids.iter().cloned())
        .map(|object_id: String| async move {
            let result = store.destroy(&object_id).await;
            (object_id, result)
        })
        .buffer_unordered(DESTROY_CONCURRENCY)
        .collect()
        .await;

    let mut failed = 0;
    for (object_id, result) in results {
        if let Err(e) = result {
            failed += 1;
            warn!(
                backend = store.backend_name(),
                object_id = %object_id,
                "Failed to destroy stored object: {}",
                e
            );
        }
    }
    failed
}

/// Filesystem-backed object store.
///
/// Objects are stored in a sharded directory structure:
/// ```text
/// {base_path}/
/// ├── ab/
/// │   └── ab12cd34-5678-90ab-cdef-123456789012.pdf
/// └── cd/
///     └── cd90ab12-3456-7890-abcd-ef1234567890.bin
/// ```
/// and served at `{public_base_url}/{shard}/{name}`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    /// Create a store rooted at `base_path`, creating the directory if needed.
    pub fn new(base_path: impl Into<PathBuf>, public_base_url: &str) -> Result<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;

        Ok(Self {
            base_path,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Full path of a stored object.
    pub fn object_path(&self, object_id: &str) -> PathBuf {
        self.base_path.join(Self::shard(object_id)).join(object_id)
    }

    fn shard(object_id: &str) -> &str {
        object_id.get(..2).unwrap_or(object_id)
    }

    /// Generate a new UUID-based object id keeping the original extension.
    fn generate_object_id(original_name: &str) -> String {
        let ext = Path::new(original_name)
            .extension()
            .and_then(|s| s.to_str())
            .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_else(|| "bin".to_string());
        format!("{}.{ext}", Uuid::new_v4())
    }

    fn check_object_id(object_id: &str) -> Result<()> {
        if object_id.is_empty()
            || object_id.contains(['/', '\\'])
            || object_id.starts_with('.')
        {
            return Err(CumulusError::Storage(format!("invalid object id: {object_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(&self, content: Vec<u8>, original_name: &str) -> Result<StoredObject> {
        let object_id = Self::generate_object_id(original_name);
        let path = self.object_path(&object_id);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;

        Ok(StoredObject {
            url: format!(
                "{}/{}/{}",
                self.public_base_url,
                Self::shard(&object_id),
                object_id
            ),
            object_id,
        })
    }

    async fn destroy(&self, object_id: &str) -> Result<()> {
        Self::check_object_id(object_id)?;
        match tokio::fs::remove_file(self.object_path(object_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn create_store() -> (LocalObjectStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp.path(), "http://localhost:5000/objects/").unwrap();
        (store, temp)
    }

    #[tokio::test]
    async fn test_upload_writes_sharded_object() {
        let (store, _temp) = create_store();

        let stored = store.upload(b"hello".to_vec(), "Report.PDF").await.unwrap();
        assert!(stored.object_id.ends_with(".pdf"));

        let shard = &stored.object_id[..2];
        assert_eq!(
            stored.url,
            format!("http://localhost:5000/objects/{shard}/{}", stored.object_id)
        );

        let path = store.object_path(&stored.object_id);
        assert!(path.starts_with(store.base_path().join(shard)));
        assert_eq!(std::fs::read(path).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_upload_without_extension() {
        let (store, _temp) = create_store();
        let stored = store.upload(Vec::new(), "Makefile").await.unwrap();
        assert!(stored.object_id.ends_with(".bin"));
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let (store, _temp) = create_store();
        let stored = store.upload(b"x".to_vec(), "a.txt").await.unwrap();

        store.destroy(&stored.object_id).await.unwrap();
        assert!(!store.object_path(&stored.object_id).exists());
        store.destroy(&stored.object_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_destroy_rejects_traversal() {
        let (store, _temp) = create_store();
        assert!(store.destroy("../etc/passwd").await.is_err());
        assert!(store.destroy("").await.is_err());
        assert!(store.destroy("..").await.is_err());
    }

    #[tokio::test]
    async fn test_destroy_best_effort_counts_failures() {
        let (store, _temp) = create_store();
        let stored = store.upload(b"x".to_vec(), "a.txt").await.unwrap();

        let ids = vec![stored.object_id.clone(), "../bad".to_string()];
        assert_eq!(destroy_best_effort(&store, &ids).await, 1);
        assert!(!store.object_path(&stored.object_id).exists());
    }

    /// Records how many destroys run at once.
    #[derive(Default)]
    struct CountingStore {
        attempts: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ObjectStore for CountingStore {
        async fn upload(&self, _content: Vec<u8>, _original_name: &str) -> Result<StoredObject> {
            unreachable!("not used")
        }

        async fn destroy(&self, object_id: &str) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if object_id.starts_with("bad") {
                Err(CumulusError::Storage("remote refused".to_string()))
            } else {
                Ok(())
            }
        }

        fn backend_name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_destroy_best_effort_bounds_concurrency() {
        let store = CountingStore::default();
        let ids: Vec<String> = (0..60)
            .map(|i| if i % 10 == 0 { format!("bad-{i}") } else { format!("obj-{i}") })
            .collect();

        let failed = destroy_best_effort(&store, &ids).await;

        assert_eq!(failed, 6);
        assert_eq!(store.attempts.load(Ordering::SeqCst), 60);
        let peak = store.peak.load(Ordering::SeqCst);
        assert!(peak <= DESTROY_CONCURRENCY, "{peak} destroys ran at once");
        assert!(peak > 1);
    }

    #[test]
    fn test_backend_name() {
        let (store, _temp) = create_store();
        assert_eq!(store.backend_name(), "local");
    }
}
