//! Local-disk file storage.
//!
//! Files are content-addressed: the blake3 hash of the bytes names the file,
//! so uploading the same bytes twice is a no-op that returns the same URL.
//!
//! ```text
//! {root}/{category}/{hh}/{hash}.{ext}
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use quire_doc::LocalFile;
use quire_types::{UploadCategory, extension_for_mime};

use crate::collab::FileStorage;
use crate::config::UploadsConfig;
use crate::error::StorageResult;

/// Content-addressed file storage under a local directory.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
    public_base_url: String,
    categories: UploadsConfig,
}

impl LocalFileStorage {
    /// Store under `root`, serving URLs as `file://` paths.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let public_base_url = format!("file://{}", root.display());
        Self {
            root,
            public_base_url,
            categories: UploadsConfig::default(),
        }
    }

    /// Serve URLs from `base` instead of `file://`.
    pub fn with_public_base_url(mut self, base: impl Into<String>) -> Self {
        self.public_base_url = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Override per-category directory names.
    pub fn with_categories(mut self, categories: UploadsConfig) -> Self {
        self.categories = categories;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn relative_path(&self, file: &LocalFile, category: UploadCategory) -> String {
        let hash = blake3::hash(&file.data);
        let hex = hex::encode(hash.as_bytes());
        let ext = extension_for_mime(&file.mime)
            .map(str::to_string)
            .or_else(|| {
                Path::new(&file.name)
                    .extension()
                    .map(|e| e.to_string_lossy().to_lowercase())
            })
            .unwrap_or_else(|| "bin".to_string());
        format!("{}/{}/{}.{}", self.categories.dir_for(category), &hex[..2], hex, ext)
    }

    /// Where a URL handed out by this storage lives on disk.
    pub fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let rel = url.strip_prefix(&self.public_base_url)?.trim_start_matches('/');
        if rel.split('/').any(|c| c == ".." || c.is_empty()) {
            return None;
        }
        Some(self.root.join(rel))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    #[tracing::instrument(skip(self, file), fields(name = %file.name, size = file.size()))]
    async fn upload(&self, file: &LocalFile, category: UploadCategory) -> StorageResult<String> {
        let rel = self.relative_path(file, category);
        let path = self.root.join(&rel);

        if tokio::fs::try_exists(&path).await? {
            tracing::debug!(path = %path.display(), "already stored");
        } else {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            // Content-hash paths only ever hold complete files. Each upload
            // gets its own temp file; concurrent uploads of the same bytes race
            // to the same final path.
            let tmp = path.with_extension(format!("{}.part", uuid::Uuid::new_v4().simple()));
            tokio::fs::write(&tmp, &file.data).await?;
            if let Err(e) = tokio::fs::rename(&tmp, &path).await {
                let _ = tokio::fs::remove_file(&tmp).await;
                if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    return Err(e.into());
                }
                tracing::debug!(path = %path.display(), "stored concurrently");
            } else {
                tracing::debug!(path = %path.display(), "stored");
            }
        }

        Ok(format!("{}/{}", self.public_base_url, rel))
    }
}
