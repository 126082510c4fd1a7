use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::storage::{check_path, FileStore, StorageError};

/// Stores files on local disk under `root` and serves them from `public_base_url`.
pub struct LocalFileStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn full_path(&self, container: &str, path: &str) -> Result<PathBuf, StorageError> {
        check_path(container)?;
        check_path(path)?;

        let mut full_path = self.root.join(container);
        full_path.extend(path.split('/'));

        Ok(full_path)
    }

    fn url(&self, container: &str, path: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, container, path)
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn save_file(
        &self,
        container: &str,
        subfolder: &str,
        name: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        let path = format!("{subfolder}/{name}");
        let full_path = self.full_path(container, &path)?;

        if let Some(dir) = full_path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        tokio::fs::write(&full_path, bytes).await?;

        Ok(self.url(container, &path))
    }

    async fn file_url(&self, container: &str, path: &str) -> Result<Option<String>, StorageError> {
        let full_path = self.full_path(container, path)?;

        if tokio::fs::try_exists(&full_path).await? {
            Ok(Some(self.url(container, path)))
        } else {
            Ok(None)
        }
    }

    async fn delete_file(&self, container: &str, path: &str) -> Result<(), StorageError> {
        let full_path = self.full_path(container, path)?;

        match tokio::fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::threadrand::SecureRng;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("filmroom-storage-test-{:x}", SecureRng::next_u128()))
    }

    #[tokio::test]
    async fn test_save_resolve_delete() {
        let root = temp_root();
        let store = LocalFileStore::new(&root, "http://localhost:9000/data/");

        let url = store
            .save_file("videos", "student-1/raw", "video_1_abcdef.mp4", b"frames")
            .await
            .unwrap();
        assert_eq!(
            url,
            "http://localhost:9000/data/videos/student-1/raw/video_1_abcdef.mp4"
        );

        let on_disk = tokio::fs::read(root.join("videos/student-1/raw/video_1_abcdef.mp4"))
            .await
            .unwrap();
        assert_eq!(on_disk, b"frames");

        let resolved = store
            .file_url("videos", "student-1/raw/video_1_abcdef.mp4")
            .await
            .unwrap();
        assert_eq!(resolved, Some(url));

        store
            .delete_file("videos", "student-1/raw/video_1_abcdef.mp4")
            .await
            .unwrap();

        let resolved = store
            .file_url("videos", "student-1/raw/video_1_abcdef.mp4")
            .await
            .unwrap();
        assert_eq!(resolved, None);

        // Deleting again is fine
        store
            .delete_file("videos", "student-1/raw/video_1_abcdef.mp4")
            .await
            .unwrap();

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let store = LocalFileStore::new(temp_root(), "/data");

        assert!(matches!(
            store.save_file("videos", "..", "x.mp4", b"x").await,
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            store.file_url("videos", "../../etc/passwd").await,
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            store.delete_file("..", "x.mp4").await,
            Err(StorageError::InvalidPath(_))
        ));
    }
}
