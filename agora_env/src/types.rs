//! Domain message vocabulary exchanged with the content engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a fresh opaque entity identifier.
pub fn new_entity_id() -> String {
    Uuid::new_v4().to_string()
}

/// Register a new user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterUser {
    pub user_id: String,
    pub username: String,
    pub password: String,
}

/// Create a community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCommunity {
    pub id: String,
    pub name: String,
    pub description: String,
    pub creator_id: String,
}

/// Create a post inside a community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePost {
    pub id: String,
    pub community_id: String,
    pub author_id: String,
    pub title: String,
    pub content: String,
    /// Unix seconds
    pub created_at: i64,
    pub is_repost: bool,
}

/// Cast an up/down vote on a post or comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastVote {
    pub target_id: String,
    pub user_id: String,
    pub is_upvote: bool,
}

/// Create a comment on a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateComment {
    pub id: String,
    pub post_id: String,
    /// Empty for a root-level comment
    pub parent_id: String,
    pub author_id: String,
    pub content: String,
    /// Unix seconds
    pub created_at: i64,
}

/// Join a community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinCommunity {
    pub community_id: String,
    pub user_id: String,
}

/// Every request the content engine understands.
///
/// Adding a request kind means adding a variant here and a handler branch
/// in the engine; the match there is exhaustive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainRequest {
    RegisterUser(RegisterUser),
    CreateCommunity(CreateCommunity),
    CreatePost(CreatePost),
    CastVote(CastVote),
    CreateComment(CreateComment),
    JoinCommunity(JoinCommunity),
    /// Liveness probe
    Ping,
}

impl DomainRequest {
    /// Returns the request kind name (for logging).
    pub fn kind(&self) -> &'static str {
        match self {
            DomainRequest::RegisterUser(_) => "register_user",
            DomainRequest::CreateCommunity(_) => "create_community",
            DomainRequest::CreatePost(_) => "create_post",
            DomainRequest::CastVote(_) => "cast_vote",
            DomainRequest::CreateComment(_) => "create_comment",
            DomainRequest::JoinCommunity(_) => "join_community",
            DomainRequest::Ping => "ping",
        }
    }
}

/// The engine's answer to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainReply {
    Success { message: String },
    Error { error: String },
}

impl DomainReply {
    /// Creates a success reply.
    pub fn success(message: impl Into<String>) -> Self {
        Self::Success { message: message.into() }
    }
    
    /// Creates an error reply from anything displayable.
    pub fn error(error: impl std::fmt::Display) -> Self {
        Self::Error { error: error.to_string() }
    }
    
    /// Returns true for a success reply.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
    
    /// Converts into `Ok(message)` / `Err(error)`.
    pub fn into_result(self) -> Result<String, String> {
        match self {
            Self::Success { message } => Ok(message),
            Self::Error { error } => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_request_kind_names() {
        let join = DomainRequest::JoinCommunity(JoinCommunity {
            community_id: "c1".to_string(),
            user_id: "u1".to_string(),
        });
        assert_eq!(join.kind(), "join_community");
        assert_eq!(DomainRequest::Ping.kind(), "ping");
    }
    
    #[test]
    fn test_request_wire_tag() {
        let vote = DomainRequest::CastVote(CastVote {
            target_id: "p1".to_string(),
            user_id: "u1".to_string(),
            is_upvote: true,
        });
        let json = serde_json::to_value(&vote).unwrap();
        assert_eq!(json["type"], "cast_vote");
        assert_eq!(json["is_upvote"], true);
    }
    
    #[test]
    fn test_reply_into_result() {
        assert_eq!(DomainReply::success("ok").into_result(), Ok("ok".to_string()));
        assert_eq!(
            DomainReply::error("post not found: p9").into_result(),
            Err("post not found: p9".to_string())
        );
        assert!(!DomainReply::error("x").is_success());
    }
    
    #[test]
    fn test_entity_ids_unique() {
        assert_ne!(new_entity_id(), new_entity_id());
    }
}
