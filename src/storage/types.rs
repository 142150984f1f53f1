//! core type-safe names and identifiers for the storage layer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Seconds since the unix epoch, the resolution the log works in.
pub type Timestamp = i64;

/// current time as a log timestamp
pub fn now() -> Timestamp {
    chrono::Utc::now().timestamp()
}

/// Validate a key used as a path segment or ref component.
///
/// Valid keys:
/// - 1-128 characters
/// - Alphanumeric, underscores, hyphens only
fn validate_key(key: &str) -> Result<(), InvalidNameError> {
    if key.is_empty() {
        return Err(InvalidNameError::Empty);
    }

    if key.len() > 128 {
        return Err(InvalidNameError::TooLong(key.len()));
    }

    for (i, c) in key.chars().enumerate() {
        if !c.is_ascii_alphanumeric() && c != '_' && c != '-' {
            return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
        }
    }

    Ok(())
}

/// Owner of a persistent stage (usually a user id).
///
/// Owner ids end up in file paths and git ref names, so they carry the same
/// restrictions as other keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidNameError> {
        let id = id.into();
        validate_key(&id)?;
        Ok(Self(id))
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for OwnerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Name of a persistent stage within one owner's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StageId(String);

impl StageId {
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidNameError> {
        let id = id.into();
        validate_key(&id)?;
        Ok(Self(id))
    }

    /// Generate a new ULID-based stage id.
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string().to_lowercase())
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for StageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A git branch holding the stored states of one persistent stage.
///
/// Format: `stages/{owner}/{stage}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StageBranch(String);

impl StageBranch {
    /// prefix shared by all stage branches
    pub const PREFIX: &'static str = "stages/";

    /// branch for the given stage
    pub fn for_stage(owner: &OwnerId, stage: &StageId) -> Self {
        Self(format!("{}{}/{}", Self::PREFIX, owner, stage))
    }

    /// parse a branch short name back into its owner and stage
    pub fn parse(name: &str) -> Option<(OwnerId, StageId)> {
        let rest = name.strip_prefix(Self::PREFIX)?;
        let (owner, stage) = rest.split_once('/')?;
        Some((OwnerId::new(owner).ok()?, StageId::new(stage).ok()?))
    }

    /// get the full ref path (e.g., "refs/heads/stages/42/abc")
    pub fn as_ref_path(&self) -> String {
        format!("refs/heads/{}", self.0)
    }

    /// get the short name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// git signature (author/committer info)
#[derive(Debug, Clone)]
pub struct GitSignature {
    pub name: String,
    pub email: String,
}

impl GitSignature {
    /// create a new signature
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// default signature for stage snapshots
    pub fn amos() -> Self {
        Self::new("AMOS", "amos@localhost")
    }

    /// convert to git2::Signature
    pub(crate) fn to_git2_signature(&self) -> Result<git2::Signature<'static>, git2::Error> {
        git2::Signature::now(&self.name, &self.email)
    }
}

impl Default for GitSignature {
    fn default() -> Self {
        Self::amos()
    }
}

/// error type for invalid owner and stage names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidNameError {
    Empty,
    TooLong(usize),
    InvalidCharacter { char: char, position: usize },
}

impl fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "name cannot be empty"),
            Self::TooLong(len) => write!(f, "name too long: {} characters", len),
            Self::InvalidCharacter { char, position } => {
                write!(f, "invalid character '{}' at position {}", char, position)
            }
        }
    }
}

impl std::error::Error for InvalidNameError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_id_valid() {
        assert!(OwnerId::new("42").is_ok());
        assert!(OwnerId::new("user_42").is_ok());
        assert!(OwnerId::new("user-42").is_ok());
    }

    #[test]
    fn test_owner_id_invalid() {
        assert_eq!(OwnerId::new(""), Err(InvalidNameError::Empty));
        assert!(OwnerId::new("a/b").is_err());
        assert!(OwnerId::new("..").is_err());
        assert!(OwnerId::new("a".repeat(129)).is_err());
    }

    #[test]
    fn test_stage_id_generate() {
        let a = StageId::generate();
        let b = StageId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 26);
        assert!(StageId::new(a.as_str()).is_ok());
    }

    #[test]
    fn test_stage_branch_roundtrip() {
        let owner = OwnerId::new("42").unwrap();
        let stage = StageId::new("sess1").unwrap();
        let branch = StageBranch::for_stage(&owner, &stage);

        assert_eq!(branch.as_str(), "stages/42/sess1");
        assert_eq!(branch.as_ref_path(), "refs/heads/stages/42/sess1");
        assert_eq!(StageBranch::parse(branch.as_str()), Some((owner, stage)));
        assert_eq!(StageBranch::parse("main"), None);
    }
}
