//! Record Stores
//!
//! In-memory and file-backed persistence for usage records, keyed by user id.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::error::{QuotaError, QuotaResult};
use super::record::UsageRecord;

/// Longest accepted user id
pub const MAX_USER_ID_LEN: usize = 128;

/// Persistence for per-user usage records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load a user's record, `None` for a first-time user
    async fn load(&self, user_id: &str) -> QuotaResult<Option<UsageRecord>>;

    /// Replace a user's record
    async fn save(&self, user_id: &str, record: &UsageRecord) -> QuotaResult<()>;
}

/// Check that a user id is usable as a store key
pub fn validate_user_id(user_id: &str) -> QuotaResult<()> {
    let valid_chars = user_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));

    if user_id.is_empty()
        || user_id.len() > MAX_USER_ID_LEN
        || !valid_chars
        || user_id == "."
        || user_id == ".."
    {
        return Err(QuotaError::InvalidUserId(user_id.to_string()));
    }
    Ok(())
}

/// In-memory record store
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<RwLock<HashMap<String, UsageRecord>>>,
}

impl MemoryRecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn load(&self, user_id: &str) -> QuotaResult<Option<UsageRecord>> {
        validate_user_id(user_id)?;
        Ok(self.records.read().await.get(user_id).cloned())
    }

    async fn save(&self, user_id: &str, record: &UsageRecord) -> QuotaResult<()> {
        validate_user_id(user_id)?;
        self.records
            .write()
            .await
            .insert(user_id.to_string(), record.clone());
        Ok(())
    }
}

/// One JSON document per user under a directory
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    dir: PathBuf,
}

impl FileRecordStore {
    /// Store records under `dir` (created on first save)
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Directory holding the records
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a user's record
    pub fn record_path(&self, user_id: &str) -> QuotaResult<PathBuf> {
        validate_user_id(user_id)?;
        Ok(self.dir.join(format!("{}.json", user_id)))
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn load(&self, user_id: &str) -> QuotaResult<Option<UsageRecord>> {
        let path = self.record_path(user_id)?;

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No usage record at {:?}", path);
                return Ok(None);
            }
            Err(source) => return Err(QuotaError::Io { path, source }),
        };

        let record = serde_json::from_str(&content)
            .map_err(|e| QuotaError::corrupt(user_id, format!("{} ({:?})", e, path)))?;
        Ok(Some(record))
    }

    async fn save(&self, user_id: &str, record: &UsageRecord) -> QuotaResult<()> {
        let path = self.record_path(user_id)?;
        let json = serde_json::to_vec_pretty(record)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| QuotaError::Io {
                path: self.dir.clone(),
                source,
            })?;

        // Write aside, then rename over the old record
        let tmp_path = self.dir.join(format!(".{}.json.tmp", user_id));
        tokio::fs::write(&tmp_path, &json)
            .await
            .map_err(|source| QuotaError::Io {
                path: tmp_path.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|source| QuotaError::Io { path, source })?;

        tracing::debug!(user_id, "Saved usage record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::record::UsageEvent;
    use chrono::DateTime;
    use tempfile::TempDir;

    fn sample_record() -> UsageRecord {
        UsageRecord {
            events: vec![UsageEvent::new(
                DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
                3,
            )],
            cooldown_until: DateTime::from_timestamp(1_700_007_200, 0),
        }
    }

    #[test]
    fn test_validate_user_id() {
        assert!(validate_user_id("user-123").is_ok());
        assert!(validate_user_id("a.b_c@example.com").is_ok());
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id(".").is_err());
        assert!(validate_user_id("..").is_err());
        assert!(validate_user_id("../etc/passwd").is_err());
        assert!(validate_user_id("has space").is_err());
        assert!(validate_user_id(&"x".repeat(MAX_USER_ID_LEN + 1)).is_err());
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryRecordStore::new();
        assert!(store.load("user-1").await.unwrap().is_none());

        store.save("user-1", &sample_record()).await.unwrap();
        assert_eq!(store.load("user-1").await.unwrap(), Some(sample_record()));
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_memory_store_rejects_bad_id() {
        let store = MemoryRecordStore::new();
        let err = store.save("", &UsageRecord::new()).await.unwrap_err();
        assert!(matches!(err, QuotaError::InvalidUserId(_)));
    }

    #[tokio::test]
    async fn test_file_store_missing_record() {
        let dir = TempDir::new().unwrap();
        let store = FileRecordStore::new(dir.path().join("records"));
        assert!(store.load("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileRecordStore::new(dir.path().join("records"));

        store.save("user-1", &sample_record()).await.unwrap();
        let loaded = store.load("user-1").await.unwrap();
        assert_eq!(loaded, Some(sample_record()));

        // Overwrite replaces the record and leaves no temp file behind
        store.save("user-1", &UsageRecord::new()).await.unwrap();
        assert_eq!(store.load("user-1").await.unwrap(), Some(UsageRecord::new()));
        assert!(!dir.path().join("records/.user-1.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_record() {
        let dir = TempDir::new().unwrap();
        let store = FileRecordStore::new(dir.path());
        std::fs::write(dir.path().join("user-1.json"), "{ not json").unwrap();

        let err = store.load("user-1").await.unwrap_err();
        assert!(err.is_corrupt());
    }

    #[tokio::test]
    async fn test_file_store_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let store = FileRecordStore::new(dir.path());
        let err = store.load("../outside").await.unwrap_err();
        assert!(matches!(err, QuotaError::InvalidUserId(_)));
    }
}
