use thiserror::Error;

/// The error taxonomy shared by every crate in the workspace.
///
/// Variants are kinds, not call sites: callers match on the kind to decide
/// policy (retry, surface, swallow) and use [`DomainError::message_key`] to
/// pick the user-facing message. Carried fields are diagnostic only.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Malformed input: bad duration string, empty content, invalid pattern.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// An entity lookup failed.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// A conditional update lost the race: the entity transitioned underneath
    /// this operation. Expected under concurrency; callers may retry once.
    #[error("{entity} {id} changed state concurrently")]
    StaleState { entity: &'static str, id: String },

    /// A domain precondition does not hold (banned creator, cooldown not met,
    /// season not joinable). `key` is the stable message key for rendering.
    #[error("precondition violated: {key}")]
    PreconditionViolated { key: &'static str },

    /// The durable job store rejected a schedule or cancel operation.
    #[error("scheduler rejected {job_id}: {reason}")]
    Scheduler { job_id: String, reason: String },

    /// Downstream notification delivery failed. Never fatal.
    #[error("notification delivery failed: {reason}")]
    Notification { reason: String },

    /// Unexpected failure. Surfaced to users as a generic quotable code.
    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl DomainError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn stale(entity: &'static str, id: impl Into<String>) -> Self {
        Self::StaleState {
            entity,
            id: id.into(),
        }
    }

    pub fn precondition(key: &'static str) -> Self {
        Self::PreconditionViolated { key }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// Whether this is the expected concurrent-transition outcome.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleState { .. })
    }

    /// Stable key the message renderer uses to pick user-facing copy.
    ///
    /// Precondition violations carry their own specific key; the remaining
    /// kinds map to one key each.
    pub fn message_key(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "invalid-input",
            Self::NotFound { .. } => "not-found",
            Self::StaleState { .. } => "state-changed",
            Self::PreconditionViolated { key } => key,
            Self::Scheduler { .. } => "scheduler-unavailable",
            Self::Notification { .. } => "delivery-failed",
            Self::Internal { .. } => "internal-error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_key_is_surfaced_verbatim() {
        let err = DomainError::precondition("return-cooldown");
        assert_eq!(err.message_key(), "return-cooldown");
        assert_eq!(err.to_string(), "precondition violated: return-cooldown");
    }

    #[test]
    fn stale_state_is_the_only_stale_kind() {
        assert!(DomainError::stale("turn", "t1").is_stale());
        assert!(!DomainError::not_found("turn", "t1").is_stale());
        assert!(!DomainError::internal("boom").is_stale());
    }
}
