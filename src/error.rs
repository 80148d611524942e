//! Vault error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the vault core.
///
/// Recoverable per-file problems (unreadable subtrees, malformed
/// frontmatter, failed snapshot writes) never reach this type; they are
/// logged and degraded where they happen.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The configured vault root does not exist.
    #[error("vault path does not exist: {0}")]
    VaultMissing(PathBuf),

    /// A path resolved outside the vault root (read or write).
    #[error("path escapes vault boundary: {input} (resolved to {resolved})")]
    OutsideVault {
        input: String,
        resolved: PathBuf,
        root: PathBuf,
    },

    /// No document could be resolved for the given name.
    #[error("document not found: {0}")]
    NotFound(String),

    /// A continuation token could not be decoded or has an unknown version.
    #[error("invalid continuation token: {0}")]
    InvalidContinuationToken(String),

    /// `collect_context` was asked for topic scope without a topic.
    #[error("topic parameter is required for collect_context when scope='topic'")]
    TopicRequired,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Frontmatter could not be serialized back to YAML.
    #[error("frontmatter serialization failed: {0}")]
    Frontmatter(#[from] serde_yaml::Error),
}

impl VaultError {
    /// True for boundary violations, which callers must keep distinct from
    /// "not found".
    pub fn is_boundary_violation(&self) -> bool {
        matches!(self, VaultError::OutsideVault { .. })
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;
