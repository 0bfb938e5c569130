// src/services/file_storage.rs
//! Local disk blob storage for uploaded documents.

use async_trait::async_trait;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use super::traits::FileStorageService;
use crate::error::{InsightError, InsightResult};

const URL_SCHEME: &str = "file://";

/// Stores files under `<root>/<project_id>/<uuid>-<name>`.
pub struct LocalFileStorageService {
    root: PathBuf,
}

impl LocalFileStorageService {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Keep only characters that are safe in a single path component.
    fn sanitize(name: &str) -> String {
        let cleaned: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        match cleaned.trim_start_matches('.') {
            "" => "file".to_string(),
            rest => rest.to_string(),
        }
    }

    /// Resolve a storage URL back to a path inside `root`.
    fn path_for(&self, storage_url: &str) -> Option<PathBuf> {
        let path = PathBuf::from(storage_url.strip_prefix(URL_SCHEME)?);
        if path.starts_with(&self.root) && !path.components().any(|c| c.as_os_str() == "..") {
            Some(path)
        } else {
            None
        }
    }
}

#[async_trait]
impl FileStorageService for LocalFileStorageService {
    async fn store_file(&self, project_id: &str, file_name: &str, data: &[u8]) -> InsightResult<String> {
        let dir = self.root.join(Self::sanitize(project_id));
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| InsightError::StorageUpload(format!("failed to create {}: {}", dir.display(), e)))?;

        let path = dir.join(format!("{}-{}", Uuid::new_v4(), Self::sanitize(file_name)));
        fs::write(&path, data)
            .await
            .map_err(|e| InsightError::StorageUpload(format!("failed to write {}: {}", file_name, e)))?;

        debug!("Stored {} ({} bytes) at {}", file_name, data.len(), path.display());
        Ok(format!("{}{}", URL_SCHEME, path.display()))
    }

    async fn delete_file(&self, storage_url: &str) -> InsightResult<()> {
        let Some(path) = self.path_for(storage_url) else {
            warn!("Ignoring delete for foreign storage URL {}", storage_url);
            return Ok(());
        };
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(InsightError::StorageUpload(format!(
                "failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn file_exists(&self, storage_url: &str) -> bool {
        match self.path_for(storage_url) {
            Some(path) => fs::try_exists(path).await.unwrap_or(false),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_and_deletes_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorageService::new(dir.path());

        let url = storage
            .store_file("project-1", "../Brand Plan.pdf", b"%PDF")
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("Brand_Plan.pdf"));
        assert!(storage.file_exists(&url).await);

        storage.delete_file(&url).await.unwrap();
        assert!(!storage.file_exists(&url).await);
        // Deleting twice is fine
        storage.delete_file(&url).await.unwrap();
    }

    #[tokio::test]
    async fn refuses_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorageService::new(dir.path());
        assert!(!storage.file_exists("file:///etc/passwd").await);
        storage.delete_file("file:///etc/passwd").await.unwrap();
    }
}
