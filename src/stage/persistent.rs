//! Staging areas that survive between requests.

use std::ops::{Deref, DerefMut};

use crate::stage::area::StagingArea;
use crate::stage::codec;
use crate::stage::errors::{StageError, StageResult};
use crate::storage::{OwnerId, SharedBlobStore, SharedLog, StageId};

/// A staging area identified by (owner, stage id) and kept in a blob store.
///
/// Derefs to [`StagingArea`], so staging, rebasing and committing work the
/// same as on a plain stage. Nothing is locked: two handles for the same
/// key overwrite each other's stored state, last write wins.
pub struct PersistentStagingArea {
    owner: OwnerId,
    stage_id: StageId,
    stage: StagingArea,
    store: SharedBlobStore,
}

impl PersistentStagingArea {
    /// Create an empty persistent stage without reading stored state.
    pub fn new(
        owner: impl Into<String>,
        stage_id: impl Into<String>,
        log: SharedLog,
        store: SharedBlobStore,
    ) -> StageResult<Self> {
        let owner = OwnerId::new(owner).map_err(|source| StageError::Identity {
            field: "owner",
            source,
        })?;
        let stage_id = StageId::new(stage_id).map_err(|source| StageError::Identity {
            field: "stage id",
            source,
        })?;

        Ok(Self {
            owner,
            stage_id,
            stage: StagingArea::new(log),
            store,
        })
    }

    /// Open the stage of an owner, restoring whatever was stored for it.
    pub fn instance_for(
        owner: impl Into<String>,
        stage_id: impl Into<String>,
        log: SharedLog,
        store: SharedBlobStore,
    ) -> StageResult<Self> {
        let mut stage = Self::new(owner, stage_id, log, store)?;
        stage.restore();
        Ok(stage)
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn stage_id(&self) -> &StageId {
        &self.stage_id
    }

    /// Write the staged components to the blob store.
    ///
    /// Returns false when the store cannot be written.
    pub fn store(&self) -> bool {
        let bytes = codec::encode(self.stage.iter());
        match self.store.put(&self.owner, &self.stage_id, &bytes) {
            Ok(()) => {
                tracing::debug!(
                    owner = %self.owner,
                    stage = %self.stage_id,
                    bytes = bytes.len(),
                    "stored stage"
                );
                true
            }
            Err(e) => {
                tracing::warn!(owner = %self.owner, stage = %self.stage_id, error = %e, "failed to store stage");
                false
            }
        }
    }

    /// Replace the staged content with the stored state.
    ///
    /// Missing, unreadable or corrupt state leaves the stage empty.
    pub fn restore(&mut self) {
        self.stage.clear();

        let bytes = match self.store.get(&self.owner, &self.stage_id) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(owner = %self.owner, stage = %self.stage_id, error = %e, "failed to read stored stage");
                return;
            }
        };

        match codec::decode(&bytes) {
            Ok(components) => {
                tracing::debug!(
                    owner = %self.owner,
                    stage = %self.stage_id,
                    components = components.len(),
                    "restored stage"
                );
                self.stage.replace_components(components);
            }
            Err(e) => {
                tracing::warn!(owner = %self.owner, stage = %self.stage_id, error = %e, "discarding corrupt stored stage");
            }
        }
    }

    /// Drop all staged edits and store the empty stage.
    pub fn discard(&mut self) -> bool {
        self.stage.clear();
        self.store()
    }
}

impl Deref for PersistentStagingArea {
    type Target = StagingArea;

    fn deref(&self) -> &StagingArea {
        &self.stage
    }
}

impl DerefMut for PersistentStagingArea {
    fn deref_mut(&mut self) -> &mut StagingArea {
        &mut self.stage
    }
}

impl std::fmt::Debug for PersistentStagingArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStagingArea")
            .field("owner", &self.owner)
            .field("stage_id", &self.stage_id)
            .field("stage", &self.stage)
            .finish()
    }
}
