//! Domain errors for the GainIt planning core.

use thiserror::Error;
use uuid::Uuid;

/// Format a cycle path as a human-readable string: `A -> B -> C -> A`.
fn format_cycle_path(path: &[Uuid]) -> String {
    path.iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Coarse error classification surfaced to callers alongside the message.
///
/// The upstream web layer maps these onto HTTP responses; the core never
/// leaks store internals or stack traces through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Referenced entity does not exist or belongs to another project.
    NotFound,
    /// A domain invariant would be violated (cycle, blocked completion, ...).
    InvalidOperation,
    /// Malformed input rejected before any mutation.
    Validation,
    /// Actor lacks permission; policy itself is enforced by the caller.
    Unauthorized,
    /// Optimistic concurrency token mismatch; the caller should retry.
    Conflict,
    /// AI planning provider failure or timeout.
    Provider,
    /// Backing store failure.
    Storage,
}

/// Domain-level errors for the planning core.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Milestone not found: {0}")]
    MilestoneNotFound(Uuid),

    #[error("Subtask not found: {0}")]
    SubtaskNotFound(Uuid),

    #[error("Reference not found: {0}")]
    ReferenceNotFound(Uuid),

    #[error("Dependency not found: {task_id} -> {depends_on}")]
    DependencyNotFound { task_id: Uuid, depends_on: Uuid },

    #[error("Task cannot depend on itself: {0}")]
    SelfDependency(Uuid),

    #[error("Dependency would create a cycle: {}", format_cycle_path(.0))]
    DependencyCycle(Vec<Uuid>),

    #[error("Cannot complete blocked task {0}")]
    TaskBlocked(Uuid),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Concurrency conflict: {entity} {id} was modified, retry")]
    ConcurrencyConflict { entity: &'static str, id: Uuid },

    #[error("Planning provider error: {0}")]
    ProviderError(String),

    #[error("Planning provider timed out after {0}s")]
    ProviderTimeout(u64),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl DomainError {
    /// Classify this error per the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TaskNotFound(_)
            | Self::MilestoneNotFound(_)
            | Self::SubtaskNotFound(_)
            | Self::ReferenceNotFound(_)
            | Self::DependencyNotFound { .. } => ErrorKind::NotFound,
            Self::SelfDependency(_)
            | Self::DependencyCycle(_)
            | Self::TaskBlocked(_)
            | Self::InvalidStateTransition { .. }
            | Self::InvalidOperation(_) => ErrorKind::InvalidOperation,
            Self::ValidationFailed(_) => ErrorKind::Validation,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::ConcurrencyConflict { .. } => ErrorKind::Conflict,
            Self::ProviderError(_) | Self::ProviderTimeout(_) => ErrorKind::Provider,
            Self::DatabaseError(_) | Self::SerializationError(_) => ErrorKind::Storage,
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
