//! Configuration module for repository backend selection
//!
//! A repository is identified by a URL whose scheme picks the storage
//! backend. This module parses those URLs into a [`RepositoryConfig`] and
//! opens the matching [`Repository`].

use serde::{Deserialize, Serialize};

use crate::repository::{DiskRepository, Repository};
use crate::{RepositoryError, Result};

/// Enumeration of known storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Local filesystem storage
    Disk,
    /// Amazon S3 object storage
    S3,
    /// Google Cloud Storage
    Gcs,
}

impl StorageBackend {
    /// URL scheme selecting this backend
    pub fn scheme(&self) -> &'static str {
        match self {
            StorageBackend::Disk => "file",
            StorageBackend::S3 => "s3",
            StorageBackend::Gcs => "gs",
        }
    }

    /// Whether a backend implementation is compiled into this crate
    pub fn is_available(&self) -> bool {
        matches!(self, StorageBackend::Disk)
    }
}

/// Configuration structure for a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// The storage backend to use
    pub backend: StorageBackend,
    /// Root location: a directory for disk, `bucket[/prefix]` for object stores
    pub root: String,
}

impl RepositoryConfig {
    /// Create a configuration for a disk repository rooted at `root`
    pub fn disk(root: impl Into<String>) -> Self {
        RepositoryConfig {
            backend: StorageBackend::Disk,
            root: root.into(),
        }
    }

    /// Parse a repository URL
    ///
    /// Supports formats:
    /// - `file:///absolute/path` for disk storage
    /// - `/local/path` or `relative/path` for disk storage
    /// - `s3://bucket/prefix` and `gs://bucket/prefix` for object stores
    pub fn from_url(url: &str) -> Result<Self> {
        let Some((scheme, rest)) = url.split_once("://") else {
            return Ok(RepositoryConfig::disk(url));
        };

        let backend = match scheme {
            "file" => StorageBackend::Disk,
            "s3" => StorageBackend::S3,
            "gs" => StorageBackend::Gcs,
            other => {
                return Err(RepositoryError::config(format!(
                    "Unknown repository backend: {other}"
                )))
            }
        };

        if backend != StorageBackend::Disk && rest.split('/').next().unwrap_or("").is_empty() {
            return Err(RepositoryError::config(format!(
                "Invalid {scheme} URL: missing bucket name"
            )));
        }

        let config = RepositoryConfig {
            backend,
            root: rest.to_string(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration back into a URL
    pub fn url(&self) -> String {
        format!("{}://{}", self.backend.scheme(), self.root)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.root.trim().is_empty() {
            return Err(RepositoryError::config(format!(
                "{} repository requires a root location",
                self.backend.scheme()
            )));
        }
        Ok(())
    }

    /// Open the repository described by this configuration
    pub fn open(&self) -> Result<Box<dyn Repository>> {
        self.validate()?;
        match self.backend {
            StorageBackend::Disk => Ok(Box::new(DiskRepository::new(&self.root)?)),
            StorageBackend::S3 | StorageBackend::Gcs => Err(RepositoryError::config(format!(
                "{}:// repositories are not supported by this build",
                self.backend.scheme()
            ))),
        }
    }
}
