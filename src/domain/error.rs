use thiserror::Error;

/// Single error type for the engine, covering both the original store/parse/
/// embedding failure modes and the error *kinds* named by the error handling
/// design: `NotAGitRepo`, `IndexMissingOrIncompatible`, `LanguageNotAvailable`,
/// `ParseFailure`, `StorageBackendUnavailable`, `DsrConflict`, `MissingDsr`,
/// `WorkerFailure`, `ValidationError`.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    /// `rev-parse --show-toplevel` failed; fatal to the calling operation.
    #[error("not a git repository: {0}")]
    NotAGitRepo(String),

    /// `meta.json` absent or `index_schema_version` mismatched.
    #[error("index missing or incompatible: {0}")]
    IndexMissingOrIncompatible(String),

    /// Requested language partition absent.
    #[error("language not available: {0}")]
    LanguageNotAvailable(String),

    /// Both native and fallback AST-graph backends failed to load.
    #[error("storage backend unavailable: {0}")]
    StorageBackendUnavailable(String),

    /// Existing DSR differs byte-for-byte from the newly computed canonical form.
    #[error("DSR conflict for commit {commit}: on-disk content differs from recomputed canonical form")]
    DsrConflict { commit: String },

    /// Symbol-evolution query encountered a commit without a DSR.
    #[error("missing DSR(s): {0:?}")]
    MissingDsr(Vec<String>),

    /// A worker reported an error for a single file; the file is skipped.
    #[error("worker failure on {file}: {reason}")]
    WorkerFailure { file: String, reason: String },

    /// Input failed schema constraints, surfaced before any side effect.
    #[error("validation error: {0}")]
    ValidationError(String),
}

impl DomainError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::EmbeddingError(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn not_a_git_repo(msg: impl Into<String>) -> Self {
        Self::NotAGitRepo(msg.into())
    }

    pub fn index_missing_or_incompatible(msg: impl Into<String>) -> Self {
        Self::IndexMissingOrIncompatible(msg.into())
    }

    pub fn language_not_available(msg: impl Into<String>) -> Self {
        Self::LanguageNotAvailable(msg.into())
    }

    pub fn storage_backend_unavailable(msg: impl Into<String>) -> Self {
        Self::StorageBackendUnavailable(msg.into())
    }

    pub fn dsr_conflict(commit: impl Into<String>) -> Self {
        Self::DsrConflict { commit: commit.into() }
    }

    pub fn missing_dsr(commits: Vec<String>) -> Self {
        Self::MissingDsr(commits)
    }

    pub fn worker_failure(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WorkerFailure { file: file.into(), reason: reason.into() }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Self::StorageError(_))
    }

    /// The `reason:<snake_code>` discriminant used in `{ok:false, reason, message?}`
    /// query-result envelopes (§6).
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::ParseError(_) => "parse_failure",
            Self::EmbeddingError(_) => "embedding_error",
            Self::StorageError(_) => "storage_error",
            Self::NotFound(_) => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::InvalidInput(_) => "invalid_input",
            Self::IoError(_) => "io_error",
            Self::Internal(_) => "internal_error",
            Self::NotAGitRepo(_) => "not_a_git_repo",
            Self::IndexMissingOrIncompatible(_) => "index_missing_or_incompatible",
            Self::LanguageNotAvailable(_) => "language_not_available",
            Self::StorageBackendUnavailable(_) => "storage_backend_unavailable",
            Self::DsrConflict { .. } => "dsr_conflict",
            Self::MissingDsr(_) => "missing_dsr",
            Self::WorkerFailure { .. } => "worker_failure",
            Self::ValidationError(_) => "validation_error",
        }
    }

    /// CLI exit-code family for this error (§6): 1 for validation/internal, 2
    /// for business-logic errors such as an incompatible index.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::IndexMissingOrIncompatible(_)
            | Self::MissingDsr(_)
            | Self::DsrConflict { .. }
            | Self::LanguageNotAvailable(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_are_stable_snake_case() {
        assert_eq!(DomainError::not_a_git_repo("x").reason_code(), "not_a_git_repo");
        assert_eq!(
            DomainError::dsr_conflict("abc123").reason_code(),
            "dsr_conflict"
        );
        assert_eq!(DomainError::missing_dsr(vec![]).reason_code(), "missing_dsr");
    }

    #[test]
    fn exit_codes_distinguish_business_logic_from_internal() {
        assert_eq!(DomainError::index_missing_or_incompatible("x").exit_code(), 2);
        assert_eq!(DomainError::internal("x").exit_code(), 1);
    }
}
