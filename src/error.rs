use thiserror::Error;
use uuid::Uuid;

/// Discriminator for [`StoreError`], so callers can branch on the failure class
/// without matching every payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    StoreFailure,
    ConcurrencyConflict,
    RegistrationFailure,
    CommandRejected,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Event store operation failed{}: {source}", fmt_aggregate(.aggregate_id))]
    StoreFailure {
        aggregate_id: Option<Uuid>,
        #[source]
        source: anyhow::Error,
    },

    #[error("Concurrency conflict for aggregate {aggregate_id}: version {attempted_version} rejected")]
    ConcurrencyConflict {
        aggregate_id: Uuid,
        attempted_version: u64,
    },

    #[error("Registration failed for {capability}: {reason}")]
    RegistrationFailure { capability: String, reason: String },

    #[error("Command rejected for aggregate {aggregate_id}: {reason}")]
    CommandRejected { aggregate_id: Uuid, reason: String },
}

fn fmt_aggregate(aggregate_id: &Option<Uuid>) -> String {
    match aggregate_id {
        Some(id) => format!(" for aggregate {id}"),
        None => String::new(),
    }
}

impl StoreError {
    pub fn store_failure(aggregate_id: Option<Uuid>, source: impl Into<anyhow::Error>) -> Self {
        Self::StoreFailure {
            aggregate_id,
            source: source.into(),
        }
    }

    pub fn registration(capability: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RegistrationFailure {
            capability: capability.into(),
            reason: reason.into(),
        }
    }

    pub fn rejected(aggregate_id: Uuid, reason: impl Into<String>) -> Self {
        Self::CommandRejected {
            aggregate_id,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StoreFailure { .. } => ErrorKind::StoreFailure,
            Self::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            Self::RegistrationFailure { .. } => ErrorKind::RegistrationFailure,
            Self::CommandRejected { .. } => ErrorKind::CommandRejected,
        }
    }

    /// A concurrency conflict is a specialised store failure.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::StoreFailure | ErrorKind::ConcurrencyConflict
        )
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::ConcurrencyConflict
    }

    /// The aggregate the failure relates to, when one is known.
    pub fn aggregate_id(&self) -> Option<Uuid> {
        match self {
            Self::StoreFailure { aggregate_id, .. } => *aggregate_id,
            Self::ConcurrencyConflict { aggregate_id, .. }
            | Self::CommandRejected { aggregate_id, .. } => Some(*aggregate_id),
            Self::RegistrationFailure { .. } => None,
        }
    }
}

// Result alias within the library
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
