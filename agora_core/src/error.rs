//! Error types for the domain store and content engine.

use thiserror::Error;

/// Entity collections held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Community,
    Post,
    Comment,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::User => "user",
            EntityKind::Community => "community",
            EntityKind::Post => "post",
            EntityKind::Comment => "comment",
        };
        write!(f, "{}", name)
    }
}

/// Errors returned by store operations and request validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Duplicate identifier on create
    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: EntityKind, id: String },
    
    /// Reference to an unknown identifier
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },
    
    /// Request rejected before touching the store
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl StoreError {
    pub fn already_exists(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::AlreadyExists { kind, id: id.into() }
    }
    
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }
    
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }
}
