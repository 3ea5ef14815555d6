//! Storage namespaces.
//!
//! A [`Namespace`] is a location in either the local filesystem or an S3
//! bucket, addressed by a root string from configuration:
//!
//! - `/data/lake`, `./lake` or `file:///data/lake` for local storage
//! - `s3://bucket/prefix` or `s3a://bucket/prefix` for S3
//!
//! The engine reads and writes through URLs produced here, so both sides
//! agree on where a table lives.

use std::sync::Arc;

use futures::TryStreamExt;
use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path;
use url::Url;

use crate::config::StorageCredentials;
use crate::error::{Error, Result};

/// A prefix inside an object store.
#[derive(Clone)]
pub struct Namespace {
    store: Arc<dyn ObjectStore>,
    store_url: Url,
    prefix: Path,
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace")
            .field("url", &self.url())
            .finish_non_exhaustive()
    }
}

impl Namespace {
    /// Opens the namespace addressed by `root`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the root cannot be parsed or uses an
    /// unsupported scheme, and [`Error::Storage`] if the backend cannot be
    /// constructed.
    pub fn open(root: &str, credentials: &StorageCredentials) -> Result<Self> {
        let root = root.trim();
        if !root.contains("://") {
            return Self::local(std::path::Path::new(root));
        }

        let url = Url::parse(root)
            .map_err(|e| Error::configuration(format!("invalid storage root '{root}': {e}")))?;
        match url.scheme() {
            "file" => {
                let path = url.to_file_path().map_err(|()| {
                    Error::configuration(format!("invalid file root '{root}'"))
                })?;
                Self::local(&path)
            }
            "s3" | "s3a" => Self::s3(&url, credentials),
            other => Err(Error::configuration(format!(
                "unsupported storage scheme '{other}' in '{root}'"
            ))),
        }
    }

    fn local(root: &std::path::Path) -> Result<Self> {
        let absolute = std::path::absolute(root).map_err(|e| {
            Error::configuration(format!("invalid local root '{}': {e}", root.display()))
        })?;
        let prefix = Path::from_absolute_path(&absolute).map_err(|e| {
            Error::configuration(format!("invalid local root '{}': {e}", absolute.display()))
        })?;
        let store_url = Url::parse("file:///")
            .map_err(|e| Error::configuration(format!("invalid store url: {e}")))?;

        Ok(Self {
            store: Arc::new(LocalFileSystem::new()),
            store_url,
            prefix,
        })
    }

    fn s3(url: &Url, credentials: &StorageCredentials) -> Result<Self> {
        let bucket = url
            .host_str()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| Error::configuration(format!("missing bucket in '{url}'")))?;

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
        if let Some(key) = &credentials.aws_access_key_id {
            builder = builder.with_access_key_id(key.expose());
        }
        if let Some(secret) = &credentials.aws_secret_access_key {
            builder = builder.with_secret_access_key(secret.expose());
        }
        if let Some(region) = &credentials.region {
            builder = builder.with_region(region);
        }
        let store = builder
            .build()
            .map_err(|e| Error::storage_with_source(format!("failed to open bucket {bucket}"), e))?;

        // s3a is the Hadoop spelling of the same scheme.
        let store_url = Url::parse(&format!("s3://{bucket}/"))
            .map_err(|e| Error::configuration(format!("invalid bucket '{bucket}': {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            store_url,
            prefix: Path::from(url.path()),
        })
    }

    /// Returns the namespace for a sub-path, e.g. `song-data` or `song`.
    #[must_use]
    pub fn child(&self, segment: &str) -> Self {
        let prefix = segment
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.prefix.clone(), |path, part| path.child(part));
        Self {
            store: Arc::clone(&self.store),
            store_url: self.store_url.clone(),
            prefix,
        }
    }

    /// Returns the URL of the object store root (`file:///` or `s3://bucket/`).
    #[must_use]
    pub const fn store_url(&self) -> &Url {
        &self.store_url
    }

    /// Returns the backing object store.
    #[must_use]
    pub fn object_store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    /// Returns the directory URL of this namespace, with a trailing slash.
    #[must_use]
    pub fn url(&self) -> String {
        self.object_url(&self.prefix)
            .map_or_else(|| self.store_url.to_string(), |u| format!("{u}/"))
    }

    fn object_url(&self, location: &Path) -> Option<String> {
        let location = location.as_ref();
        (!location.is_empty()).then(|| format!("{}{location}", self.store_url))
    }

    /// Lists the URLs of all files below this namespace with the given
    /// extension, in lexicographic order.
    ///
    /// A namespace that does not exist lists as empty. Hidden and marker
    /// files (names starting with `.` or `_`) are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if listing fails.
    pub async fn list_files(&self, extension: &str) -> Result<Vec<String>> {
        let mut files: Vec<String> = self
            .list_objects()
            .await?
            .into_iter()
            .filter(|location| {
                let hidden = location
                    .filename()
                    .is_some_and(|name| name.starts_with('.') || name.starts_with('_'));
                !hidden && location.extension() == Some(extension)
            })
            .filter_map(|location| self.object_url(&location))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Deletes every object below this namespace and returns how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if listing or deletion fails.
    pub async fn clear(&self) -> Result<usize> {
        let objects = self.list_objects().await?;
        for location in &objects {
            match self.store.delete(location).await {
                Ok(()) | Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => {
                    return Err(Error::storage_with_source(
                        format!("failed to delete {location}"),
                        e,
                    ));
                }
            }
        }
        Ok(objects.len())
    }

    async fn list_objects(&self) -> Result<Vec<Path>> {
        let listed = self
            .store
            .list(Some(&self.prefix))
            .map_ok(|meta| meta.location)
            .try_collect::<Vec<_>>()
            .await;
        match listed {
            Ok(locations) => Ok(locations),
            Err(object_store::Error::NotFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(Error::storage_with_source(
                format!("failed to list {}", self.url()),
                e,
            )),
        }
    }
}
