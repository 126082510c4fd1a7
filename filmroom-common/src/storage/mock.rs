use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::storage::{check_path, FileStore, StorageError};

/// Keeps files in memory. Used by tests and when no storage root is configured.
#[derive(Default)]
pub struct MockFileStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, container: &str, path: &str) -> bool {
        self.files
            .lock()
            .map(|files| files.contains_key(&Self::key(container, path)))
            .unwrap_or(false)
    }

    fn key(container: &str, path: &str) -> String {
        format!("{container}/{path}")
    }

    fn url(container: &str, path: &str) -> String {
        format!("mock://{container}/{path}")
    }
}

#[async_trait]
impl FileStore for MockFileStore {
    async fn save_file(
        &self,
        container: &str,
        subfolder: &str,
        name: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        let path = format!("{subfolder}/{name}");
        check_path(container)?;
        check_path(&path)?;

        let mut files = self
            .files
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        files.insert(Self::key(container, &path), bytes.to_vec());

        Ok(Self::url(container, &path))
    }

    async fn file_url(&self, container: &str, path: &str) -> Result<Option<String>, StorageError> {
        check_path(container)?;
        check_path(path)?;

        let files = self
            .files
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        Ok(files
            .contains_key(&Self::key(container, path))
            .then(|| Self::url(container, path)))
    }

    async fn delete_file(&self, container: &str, path: &str) -> Result<(), StorageError> {
        check_path(container)?;
        check_path(path)?;

        let mut files = self
            .files
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        files.remove(&Self::key(container, path));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_store() {
        let store = MockFileStore::new();

        let url = store
            .save_file("drills", "owner", "drill_1_abcdef.mp4", b"drill")
            .await
            .unwrap();
        assert_eq!(url, "mock://drills/owner/drill_1_abcdef.mp4");
        assert!(store.contains("drills", "owner/drill_1_abcdef.mp4"));

        assert_eq!(
            store
                .file_url("drills", "owner/drill_1_abcdef.mp4")
                .await
                .unwrap(),
            Some(url)
        );
        assert_eq!(
            store.file_url("videos", "owner/drill_1_abcdef.mp4").await.unwrap(),
            None
        );

        store
            .delete_file("drills", "owner/drill_1_abcdef.mp4")
            .await
            .unwrap();
        assert!(!store.contains("drills", "owner/drill_1_abcdef.mp4"));
    }
}
