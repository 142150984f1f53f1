//! Git-backed blob store for persistent stages.
//!
//! Every stage gets its own branch (`stages/{owner}/{stage}`). Storing a
//! stage writes a commit on that branch whose tree holds a single
//! `stage.bin` blob, so older stored states stay reachable in the branch
//! history. Restoring reads the blob at the branch tip.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use git2::{BranchType, ErrorCode, FileMode, ObjectType, Oid, Repository, Sort};
use parking_lot::Mutex;

use crate::storage::blob::BlobStore;
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::types::{GitSignature, OwnerId, StageBranch, StageId};

/// name of the blob inside each stage commit
const STAGE_FILE: &str = "stage.bin";

/// information about one stored state of a stage
#[derive(Debug, Clone)]
pub struct StageCommit {
    pub id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl StageCommit {
    fn from_git2(commit: &git2::Commit<'_>) -> Self {
        let timestamp = Utc
            .timestamp_opt(commit.time().seconds(), 0)
            .single()
            .unwrap_or_else(Utc::now);

        Self {
            id: commit.id().to_string(),
            message: commit.message().unwrap_or("").to_string(),
            timestamp,
        }
    }

    /// short form of the commit ID
    pub fn short(&self) -> &str {
        &self.id[..7.min(self.id.len())]
    }
}

/// Blob store keeping stages as branches of a bare git repository.
///
/// Clone this to share across threads - it uses Arc internally.
#[derive(Clone)]
pub struct GitBlobStore {
    inner: Arc<GitBlobStoreInner>,
}

struct GitBlobStoreInner {
    repo: Mutex<Repository>,
    path: PathBuf,
    signature: GitSignature,
}

impl GitBlobStore {
    /// Open an existing repository or initialize a bare one.
    pub fn open_or_init(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let repo = match Repository::open(path) {
            Ok(repo) => repo,
            Err(_) => Repository::init_bare(path)?,
        };

        Ok(Self {
            inner: Arc::new(GitBlobStoreInner {
                repo: Mutex::new(repo),
                path: path.to_path_buf(),
                signature: GitSignature::amos(),
            }),
        })
    }

    /// Get the repository path.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Execute a function with exclusive access to the repository.
    fn with_repo<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Repository) -> StorageResult<T>,
    {
        let repo = self.inner.repo.lock();
        f(&repo)
    }

    /// resolve a stage branch to its tip, `None` if the stage was never stored
    fn resolve(repo: &Repository, branch: &StageBranch) -> StorageResult<Option<Oid>> {
        match repo.find_reference(&branch.as_ref_path()) {
            Ok(reference) => {
                let commit = reference
                    .peel_to_commit()
                    .map_err(|_| StorageError::RefNotFound(branch.to_string()))?;
                Ok(Some(commit.id()))
            }
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List all stages that have been stored at least once.
    pub fn list_stages(&self) -> StorageResult<Vec<(OwnerId, StageId)>> {
        self.with_repo(|repo| {
            let mut result = Vec::new();
            for branch in repo.branches(Some(BranchType::Local))? {
                let (branch, _) = branch?;
                if let Some(name) = branch.name()? {
                    if let Some(key) = StageBranch::parse(name) {
                        result.push(key);
                    }
                }
            }
            result.sort();
            Ok(result)
        })
    }

    /// Stored states of a stage, most recent first.
    pub fn history(
        &self,
        owner: &OwnerId,
        stage: &StageId,
        limit: Option<usize>,
    ) -> StorageResult<Vec<StageCommit>> {
        let branch = StageBranch::for_stage(owner, stage);
        self.with_repo(|repo| {
            let tip = match Self::resolve(repo, &branch)? {
                Some(tip) => tip,
                None => return Ok(Vec::new()),
            };

            let mut walk = repo.revwalk()?;
            walk.push(tip)?;
            walk.set_sorting(Sort::TIME)?;

            let mut commits = Vec::new();
            for oid in walk.take(limit.unwrap_or(usize::MAX)) {
                let commit = repo.find_commit(oid?)?;
                commits.push(StageCommit::from_git2(&commit));
            }
            Ok(commits)
        })
    }
}

impl BlobStore for GitBlobStore {
    fn put(&self, owner: &OwnerId, stage: &StageId, bytes: &[u8]) -> StorageResult<()> {
        let branch = StageBranch::for_stage(owner, stage);
        self.with_repo(|repo| {
            let blob = repo.blob(bytes)?;

            let mut builder = repo.treebuilder(None)?;
            builder.insert(STAGE_FILE, blob, FileMode::Blob.into())?;
            let tree = repo.find_tree(builder.write()?)?;

            // the ref update requires the current tip as first parent
            let parents: Vec<git2::Commit<'_>> = Self::resolve(repo, &branch)?
                .map(|tip| repo.find_commit(tip))
                .transpose()?
                .into_iter()
                .collect();
            let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();

            let sig = self.inner.signature.to_git2_signature()?;
            let message = format!("[amos] store stage {}/{} ({} bytes)", owner, stage, bytes.len());
            repo.commit(
                Some(&branch.as_ref_path()),
                &sig,
                &sig,
                &message,
                &tree,
                &parent_refs,
            )?;

            Ok(())
        })
    }

    fn get(&self, owner: &OwnerId, stage: &StageId) -> StorageResult<Option<Vec<u8>>> {
        let branch = StageBranch::for_stage(owner, stage);
        self.with_repo(|repo| {
            let tip = match Self::resolve(repo, &branch)? {
                Some(tip) => tip,
                None => return Ok(None),
            };

            let tree = repo.find_commit(tip)?.tree()?;
            let entry = tree.get_name(STAGE_FILE).ok_or_else(|| StorageError::CorruptedData {
                path: PathBuf::from(branch.as_str()).join(STAGE_FILE),
                reason: "stage commit has no stage blob".to_string(),
            })?;

            if entry.kind() != Some(ObjectType::Blob) {
                return Err(StorageError::UnexpectedEntryType {
                    path: PathBuf::from(branch.as_str()).join(STAGE_FILE),
                    expected: "blob (file)".to_string(),
                    found: format!("{:?}", entry.kind()),
                });
            }

            let blob = repo.find_blob(entry.id())?;
            Ok(Some(blob.content().to_vec()))
        })
    }
}

impl std::fmt::Debug for GitBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitBlobStore")
            .field("path", &self.inner.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, GitBlobStore) {
        let dir = TempDir::new().unwrap();
        let store = GitBlobStore::open_or_init(dir.path().join("stages.git")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_missing_stage_is_none() {
        let (_dir, store) = setup();
        let owner = OwnerId::new("42").unwrap();
        let stage = StageId::new("sess").unwrap();

        assert_eq!(store.get(&owner, &stage).unwrap(), None);
        assert!(store.history(&owner, &stage, None).unwrap().is_empty());
    }

    #[test]
    fn test_put_get_keeps_history() {
        let (_dir, store) = setup();
        let owner = OwnerId::new("42").unwrap();
        let stage = StageId::new("sess").unwrap();

        store.put(&owner, &stage, b"first").unwrap();
        store.put(&owner, &stage, b"second").unwrap();

        assert_eq!(store.get(&owner, &stage).unwrap(), Some(b"second".to_vec()));

        let history = store.history(&owner, &stage, None).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].message.contains("42/sess"));
        assert_eq!(history[0].short().len(), 7);
    }

    #[test]
    fn test_stages_are_isolated_and_listed() {
        let (dir, store) = setup();
        let alice = OwnerId::new("alice").unwrap();
        let bob = OwnerId::new("bob").unwrap();
        let stage = StageId::new("sess").unwrap();

        store.put(&alice, &stage, b"a").unwrap();
        store.put(&bob, &stage, b"b").unwrap();

        assert_eq!(store.get(&alice, &stage).unwrap(), Some(b"a".to_vec()));
        assert_eq!(store.get(&bob, &stage).unwrap(), Some(b"b".to_vec()));
        assert_eq!(
            store.list_stages().unwrap(),
            vec![(alice.clone(), stage.clone()), (bob, stage.clone())]
        );

        // reopening sees the same data
        drop(store);
        let store = GitBlobStore::open_or_init(dir.path().join("stages.git")).unwrap();
        assert_eq!(store.get(&alice, &stage).unwrap(), Some(b"a".to_vec()));
    }
}
