//! Validation Module - Request Checks Before Store Mutation
//! ========================================================
//!
//! Every inbound request is validated before the engine touches the store,
//! so a rejected request never leaves a partial write behind.
//!
//! Rules:
//! - Identifiers that name an entity must be non-empty
//! - Usernames and community names must be non-empty
//! - A comment's parent id may be empty (root comment), but never equal
//!   to the comment's own id
//!
//! Usage:
//! ```ignore
//! use agora_core::validation::validate_request;
//!
//! validate_request(&request)?;
//! engine.apply(request)
//! ```

use crate::error::StoreError;
use agora_env::DomainRequest;

// =============================================================================
// FIELD CHECKS
// =============================================================================

fn require(field: &'static str, value: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::invalid(format!("{} must not be empty", field)));
    }
    Ok(())
}

// =============================================================================
// REQUEST VALIDATION
// =============================================================================

/// Validates a request's fields. Does not consult the store.
pub fn validate_request(request: &DomainRequest) -> Result<(), StoreError> {
    match request {
        DomainRequest::RegisterUser(msg) => {
            require("user id", &msg.user_id)?;
            require("username", &msg.username)
        }
        DomainRequest::CreateCommunity(msg) => {
            require("community id", &msg.id)?;
            require("community name", &msg.name)?;
            require("creator id", &msg.creator_id)
        }
        DomainRequest::CreatePost(msg) => {
            require("post id", &msg.id)?;
            require("community id", &msg.community_id)?;
            require("author id", &msg.author_id)
        }
        DomainRequest::CastVote(msg) => {
            require("target id", &msg.target_id)?;
            require("user id", &msg.user_id)
        }
        DomainRequest::CreateComment(msg) => {
            require("comment id", &msg.id)?;
            require("post id", &msg.post_id)?;
            require("author id", &msg.author_id)?;
            if msg.parent_id == msg.id {
                return Err(StoreError::invalid("comment cannot reply to itself"));
            }
            Ok(())
        }
        DomainRequest::JoinCommunity(msg) => {
            require("community id", &msg.community_id)?;
            require("user id", &msg.user_id)
        }
        DomainRequest::Ping => Ok(()),
    }
}

// =============================================================================
// TESTS
// =============================================================================
