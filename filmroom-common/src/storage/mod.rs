pub mod local;
pub mod mock;

use async_trait::async_trait;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::threadrand::SecureRng;

pub const VIDEO_CONTAINER: &str = "videos";
pub const DRILL_CONTAINER: &str = "drills";

pub const ALLOWED_UPLOAD_EXTENSIONS: [&str; 3] = [".mp4", ".mov", ".avi"];

const RANDOM_SUFFIX_LENGTH: usize = 6;

#[derive(Debug)]
pub enum StorageError {
    InvalidPath(String),
    Unavailable(String),
    Io(std::io::Error),
}

impl std::error::Error for StorageError {}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::InvalidPath(p) => write!(f, "StorageError: Invalid path: {p}"),
            StorageError::Unavailable(e) => write!(f, "StorageError: Store unavailable: {e}"),
            StorageError::Io(e) => write!(f, "StorageError: I/O failure: {e}"),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(error: std::io::Error) -> Self {
        StorageError::Io(error)
    }
}

/// Where uploaded files live. Paths are `/`-separated and relative to a container.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Stores `bytes` as `{container}/{subfolder}/{name}` and returns the public URL.
    async fn save_file(
        &self,
        container: &str,
        subfolder: &str,
        name: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError>;

    /// Returns `None` when no file is stored at `path`.
    async fn file_url(&self, container: &str, path: &str) -> Result<Option<String>, StorageError>;

    /// Deleting a file that does not exist is not an error.
    async fn delete_file(&self, container: &str, path: &str) -> Result<(), StorageError>;
}

pub type FileStorage = Box<dyn FileStore>;

/// Returns the lower-cased extension of `original_name` (including the dot) if uploads of that
/// type are accepted.
pub fn upload_extension(original_name: &str) -> Option<&'static str> {
    let (stem, ext) = original_name.rsplit_once('.')?;

    if stem.is_empty() {
        return None;
    }

    let ext = format!(".{}", ext.to_ascii_lowercase());
    ALLOWED_UPLOAD_EXTENSIONS
        .iter()
        .find(|allowed| **allowed == ext)
        .copied()
}

/// Generates a stored file name such as `video_1718000000000_a1B2c3.mp4`.
pub fn generate_file_name(prefix: &str, extension: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();

    format!(
        "{prefix}_{millis}_{}{extension}",
        SecureRng::alphanumeric(RANDOM_SUFFIX_LENGTH)
    )
}

pub(crate) fn check_path(path: &str) -> Result<(), StorageError> {
    let is_valid = !path.is_empty()
        && !path.contains('\\')
        && path
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != "..");

    if is_valid {
        Ok(())
    } else {
        Err(StorageError::InvalidPath(String::from(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_extension() {
        assert_eq!(upload_extension("serve.mp4"), Some(".mp4"));
        assert_eq!(upload_extension("Serve.Final.MOV"), Some(".mov"));
        assert_eq!(upload_extension("rally.avi"), Some(".avi"));

        assert_eq!(upload_extension("notes.txt"), None);
        assert_eq!(upload_extension("mp4"), None);
        assert_eq!(upload_extension(".mp4"), None);
        assert_eq!(upload_extension("video.mp4.exe"), None);
    }

    #[test]
    fn test_generate_file_name() {
        let name = generate_file_name("video", ".mp4");

        assert!(name.starts_with("video_"));
        assert!(name.ends_with(".mp4"));

        let middle = &name["video_".len()..name.len() - ".mp4".len()];
        let (millis, suffix) = middle.split_once('_').unwrap();
        assert!(millis.parse::<u128>().is_ok());
        assert_eq!(suffix.len(), RANDOM_SUFFIX_LENGTH);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));

        assert_ne!(name, generate_file_name("video", ".mp4"));
    }

    #[test]
    fn test_check_path() {
        assert!(check_path("abc/raw/video.mp4").is_ok());
        assert!(check_path("video.mp4").is_ok());

        assert!(check_path("").is_err());
        assert!(check_path("/etc/passwd").is_err());
        assert!(check_path("abc/../../etc").is_err());
        assert!(check_path("abc//video.mp4").is_err());
        assert!(check_path("abc\\video.mp4").is_err());
    }
}
