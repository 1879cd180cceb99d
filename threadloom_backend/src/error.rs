use std::fmt;

/// Errors surfaced by the threading engine and the comment write path.
///
/// Repository code works in `anyhow::Result`; domain failures raised inside a
/// repository closure travel through `anyhow` and are recovered here by
/// downcasting, so callers always see the original variant.
#[derive(Debug, thiserror::Error)]
pub enum ThreadError {
    /// User input violates a structural rule. The message is user-facing.
    #[error("{0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: i64 },

    /// Stored aggregates or parent links are inconsistent. Always a bug.
    #[error("consistency violation: {0}")]
    Consistency(String),

    #[error(transparent)]
    Internal(anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Discussion,
    Comment,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Discussion => f.write_str("discussion"),
            Entity::Comment => f.write_str("comment"),
        }
    }
}

impl ThreadError {
    pub fn validation(message: impl Into<String>) -> Self {
        ThreadError::Validation(message.into())
    }

    pub fn discussion_not_found(id: i64) -> Self {
        ThreadError::NotFound {
            entity: Entity::Discussion,
            id,
        }
    }

    pub fn comment_not_found(id: i64) -> Self {
        ThreadError::NotFound {
            entity: Entity::Comment,
            id,
        }
    }
}

impl From<anyhow::Error> for ThreadError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ThreadError>() {
            Ok(domain) => domain,
            Err(other) => ThreadError::Internal(other),
        }
    }
}

impl From<rusqlite::Error> for ThreadError {
    fn from(err: rusqlite::Error) -> Self {
        ThreadError::Internal(err.into())
    }
}
