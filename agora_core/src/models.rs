//! Domain entities owned by the store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A registered user. Append-only: there is no update or delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password: String,
    /// Unix seconds
    pub created_at: i64,
}

/// A community that users join and post into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    pub id: String,
    pub name: String,
    pub description: String,
    pub creator_id: String,
    /// User ids. The creator is not a member until it joins.
    pub members: BTreeSet<String>,
    /// Unix seconds
    pub created_at: i64,
}

impl Community {
    /// Creates a community with an empty membership set.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        creator_id: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            creator_id: creator_id.into(),
            members: BTreeSet::new(),
            created_at,
        }
    }
    
    /// Returns true if `user_id` is a member.
    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.contains(user_id)
    }
}

/// A post inside a community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub community_id: String,
    pub author_id: String,
    pub title: String,
    pub content: String,
    /// Unix seconds
    pub created_at: i64,
    pub is_repost: bool,
    /// Signed popularity score, no floor or ceiling
    pub karma: i64,
}

/// A comment on a post, optionally nested under another comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    /// Empty for a root-level comment
    pub parent_id: String,
    pub author_id: String,
    pub content: String,
    /// Unix seconds
    pub created_at: i64,
}

impl Comment {
    /// Returns true if this comment replies directly to the post.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_empty()
    }
}
