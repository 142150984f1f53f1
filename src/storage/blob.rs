//! Opaque blob storage for persistent stages.
//!
//! A blob store maps an (owner, stage) pair to a byte string. Stores do no
//! locking of their own: two writers of the same key race and the last
//! write wins.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::storage::errors::StorageResult;
use crate::storage::types::{OwnerId, StageId};

/// Keyed storage of stage blobs.
pub trait BlobStore: Send + Sync {
    /// Write the blob for a key, replacing any previous one.
    fn put(&self, owner: &OwnerId, stage: &StageId, bytes: &[u8]) -> StorageResult<()>;

    /// Read the blob for a key; `None` if nothing was stored yet.
    fn get(&self, owner: &OwnerId, stage: &StageId) -> StorageResult<Option<Vec<u8>>>;
}

/// Shared handle to a blob store implementation.
pub type SharedBlobStore = Arc<dyn BlobStore>;

/// Blob store kept in process memory.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<(OwnerId, StageId), Vec<u8>>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// number of stored blobs
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, owner: &OwnerId, stage: &StageId, bytes: &[u8]) -> StorageResult<()> {
        self.blobs
            .write()
            .insert((owner.clone(), stage.clone()), bytes.to_vec());
        Ok(())
    }

    fn get(&self, owner: &OwnerId, stage: &StageId) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.blobs.read().get(&(owner.clone(), stage.clone())).cloned())
    }
}

/// Blob store writing one file per stage under `<root>/<owner>/<stage>`.
#[derive(Debug, Clone)]
pub struct DirBlobStore {
    root: PathBuf,
}

impl DirBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, owner: &OwnerId, stage: &StageId) -> PathBuf {
        self.root.join(owner.as_str()).join(stage.as_str())
    }
}

impl BlobStore for DirBlobStore {
    fn put(&self, owner: &OwnerId, stage: &StageId, bytes: &[u8]) -> StorageResult<()> {
        let dir = self.root.join(owner.as_str());
        fs::create_dir_all(&dir)?;
        fs::write(self.blob_path(owner, stage), bytes)?;
        Ok(())
    }

    fn get(&self, owner: &OwnerId, stage: &StageId) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(self.blob_path(owner, stage)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
