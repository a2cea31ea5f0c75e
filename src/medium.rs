//! The storage medium behind the record store.
//!
//! The contract is deliberately small: read the full collection document,
//! write the full collection document. [`FileMedium`] backs local
//! development, [`HttpBlobMedium`] backs deployments with a remote blob
//! object, and [`MemoryMedium`] backs tests. The store is the only component
//! that should call these directly.

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

/// The medium itself could not be read or written. Distinct from "no
/// document yet", which is a normal first-run condition.
#[derive(Debug, Error)]
pub enum MediumError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("blob request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("blob endpoint returned status {0}")]
    Status(reqwest::StatusCode),
}

#[async_trait]
pub trait Medium: Send + Sync {
    /// Reads the whole collection document. `None` means the document does
    /// not exist yet; the store initializes it as an empty collection.
    async fn read_document(&self) -> Result<Option<Vec<u8>>, MediumError>;

    /// Replaces the whole collection document. Implementations must swap the
    /// new document in atomically so readers never observe a partial write.
    async fn write_document(&self, bytes: &[u8]) -> Result<(), MediumError>;
}

/// Local JSON file, the development backend.
pub struct FileMedium {
    path: PathBuf,
}

impl FileMedium {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Medium for FileMedium {
    async fn read_document(&self) -> Result<Option<Vec<u8>>, MediumError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MediumError::Io(e)),
        }
    }

    async fn write_document(&self, bytes: &[u8]) -> Result<(), MediumError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        // Write a sibling temp file and rename it over the target. The
        // rename is the atomic swap: a concurrent reader sees the old
        // document or the new one, never a truncated write.
        let mut tmp = self.path.as_os_str().to_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        log::debug!("wrote {} bytes to {:?}", bytes.len(), self.path);
        Ok(())
    }
}

/// Remote blob object reached over HTTP with a bearer token.
///
/// GET fetches the document (404 means it does not exist yet), PUT replaces
/// it wholesale. The blob service's whole-object PUT gives last-writer-wins
/// semantics; coordination across replicas is out of scope.
pub struct HttpBlobMedium {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl HttpBlobMedium {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl Medium for HttpBlobMedium {
    async fn read_document(&self) -> Result<Option<Vec<u8>>, MediumError> {
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(MediumError::Status(response.status()));
        }
        Ok(Some(response.bytes().await?.to_vec()))
    }

    async fn write_document(&self, bytes: &[u8]) -> Result<(), MediumError> {
        let response = self
            .client
            .put(&self.url)
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(bytes.to_vec())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MediumError::Status(response.status()));
        }
        log::debug!("uploaded {} bytes to blob storage", bytes.len());
        Ok(())
    }
}

/// Keeps the document in process memory. Intended for tests.
#[derive(Default)]
pub struct MemoryMedium {
    document: Mutex<Option<Vec<u8>>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Medium for MemoryMedium {
    async fn read_document(&self) -> Result<Option<Vec<u8>>, MediumError> {
        Ok(self.document.lock().await.clone())
    }

    async fn write_document(&self, bytes: &[u8]) -> Result<(), MediumError> {
        *self.document.lock().await = Some(bytes.to_vec());
        Ok(())
    }
}

/// Picks the backend the way the server process does: the blob endpoint when
/// `NPC_BLOB_URL` and `NPC_BLOB_TOKEN` are both set, otherwise a local file
/// at `data/npcs.json`.
pub fn from_env() -> Arc<dyn Medium> {
    match (env::var("NPC_BLOB_URL"), env::var("NPC_BLOB_TOKEN")) {
        (Ok(url), Ok(token)) => {
            log::info!("using blob storage at {}", url);
            Arc::new(HttpBlobMedium::new(url, token))
        }
        _ => {
            log::info!("using local file storage at data/npcs.json");
            Arc::new(FileMedium::new("data/npcs.json"))
        }
    }
}
