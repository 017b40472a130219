//! Domain Store - owns users, communities, posts, comments and the vote ledger.
//!
//! Every collection sits behind its own `RwLock` so that reads of one
//! collection never contend with writes to another. Operations that touch
//! two collections take the locks in one fixed global order:
//!
//! ```text
//! users → communities → posts → comments → votes
//! ```

use crate::error::{EntityKind, StoreError};
use crate::models::{Comment, Community, Post, User};

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Synchronous CRUD contract over the domain state.
///
/// The content engine is the only writer; getters hand out owned copies.
pub trait DomainStore: Send + Sync + 'static {
    fn create_user(&self, user: User) -> Result<(), StoreError>;
    fn get_user(&self, id: &str) -> Result<User, StoreError>;

    /// Inserts with an empty membership set, whatever `members` holds.
    fn create_community(&self, community: Community) -> Result<(), StoreError>;
    fn get_community(&self, id: &str) -> Result<Community, StoreError>;
    /// Idempotent: joining twice leaves a single membership.
    ///
    /// Returns the member count after the join.
    fn join_community(&self, community_id: &str, user_id: &str) -> Result<usize, StoreError>;
    /// Idempotent: leaving as a non-member is a no-op success.
    fn leave_community(&self, community_id: &str, user_id: &str) -> Result<(), StoreError>;

    /// Inserts with karma reset to zero.
    fn create_post(&self, post: Post) -> Result<(), StoreError>;
    fn get_post(&self, id: &str) -> Result<Post, StoreError>;
    /// Posts of a community in creation order.
    fn get_community_posts(&self, community_id: &str) -> Result<Vec<Post>, StoreError>;

    fn create_comment(&self, comment: Comment) -> Result<(), StoreError>;
    fn get_comment(&self, id: &str) -> Result<Comment, StoreError>;
    /// Comments of a post in creation order.
    fn get_post_comments(&self, post_id: &str) -> Result<Vec<Comment>, StoreError>;

    /// Records (or overwrites) the ledger entry for `(target_id, user_id)`.
    ///
    /// If `target_id` is a post, its karma moves by one unit on every call,
    /// even when the same voter repeats or flips an earlier vote.
    fn vote(&self, target_id: &str, user_id: &str, is_upvote: bool) -> Result<(), StoreError>;
    /// Reads a ledger entry.
    fn vote_of(&self, target_id: &str, user_id: &str) -> Option<bool>;
}

/// Insertion-ordered table keyed by entity id.
#[derive(Debug)]
struct Table<T> {
    index: HashMap<String, usize>,
    rows: Vec<T>,
}

impl<T> Table<T> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            rows: Vec::new(),
        }
    }

    fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&i| &self.rows[i])
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        match self.index.get(id) {
            Some(&i) => Some(&mut self.rows[i]),
            None => None,
        }
    }

    fn insert(&mut self, id: String, row: T) {
        self.index.insert(id, self.rows.len());
        self.rows.push(row);
    }

    fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.iter()
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}

/// In-memory store. State is lost on restart.
pub struct MemoryStore {
    users: RwLock<HashMap<String, User>>,
    communities: RwLock<HashMap<String, Community>>,
    posts: RwLock<Table<Post>>,
    comments: RwLock<Table<Comment>>,
    /// target id -> voter id -> is_upvote
    votes: RwLock<HashMap<String, HashMap<String, bool>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            communities: RwLock::new(HashMap::new()),
            posts: RwLock::new(Table::new()),
            comments: RwLock::new(Table::new()),
            votes: RwLock::new(HashMap::new()),
        }
    }

    /// Returns (users, communities, posts, comments) counts.
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        (
            read(&self.users).len(),
            read(&self.communities).len(),
            read(&self.posts).len(),
            read(&self.comments).len(),
        )
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// A panicked writer cannot leave a half-applied entry behind (every write
// is a single insert/update), so poisoned locks are recovered.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DomainStore for MemoryStore {
    fn create_user(&self, user: User) -> Result<(), StoreError> {
        let mut users = write(&self.users);
        if users.contains_key(&user.id) {
            return Err(StoreError::already_exists(EntityKind::User, user.id));
        }
        users.insert(user.id.clone(), user);
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<User, StoreError> {
        read(&self.users)
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityKind::User, id))
    }

    fn create_community(&self, mut community: Community) -> Result<(), StoreError> {
        let mut communities = write(&self.communities);
        if communities.contains_key(&community.id) {
            return Err(StoreError::already_exists(EntityKind::Community, community.id));
        }
        community.members.clear();
        communities.insert(community.id.clone(), community);
        Ok(())
    }

    fn get_community(&self, id: &str) -> Result<Community, StoreError> {
        read(&self.communities)
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityKind::Community, id))
    }

    fn join_community(&self, community_id: &str, user_id: &str) -> Result<usize, StoreError> {
        let mut communities = write(&self.communities);
        let community = communities
            .get_mut(community_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Community, community_id))?;
        community.members.insert(user_id.to_string());
        Ok(community.members.len())
    }

    fn leave_community(&self, community_id: &str, user_id: &str) -> Result<(), StoreError> {
        let mut communities = write(&self.communities);
        let community = communities
            .get_mut(community_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Community, community_id))?;
        community.members.remove(user_id);
        Ok(())
    }

    fn create_post(&self, mut post: Post) -> Result<(), StoreError> {
        let mut posts = write(&self.posts);
        if posts.contains(&post.id) {
            return Err(StoreError::already_exists(EntityKind::Post, post.id));
        }
        post.karma = 0;
        posts.insert(post.id.clone(), post);
        Ok(())
    }

    fn get_post(&self, id: &str) -> Result<Post, StoreError> {
        read(&self.posts)
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityKind::Post, id))
    }

    fn get_community_posts(&self, community_id: &str) -> Result<Vec<Post>, StoreError> {
        Ok(read(&self.posts)
            .iter()
            .filter(|post| post.community_id == community_id)
            .cloned()
            .collect())
    }

    fn create_comment(&self, comment: Comment) -> Result<(), StoreError> {
        // posts before comments
        let posts = read(&self.posts);
        let mut comments = write(&self.comments);

        if comments.contains(&comment.id) {
            return Err(StoreError::already_exists(EntityKind::Comment, comment.id));
        }
        if !posts.contains(&comment.post_id) {
            return Err(StoreError::not_found(EntityKind::Post, comment.post_id));
        }
        if !comment.is_root() && !comments.contains(&comment.parent_id) {
            return Err(StoreError::not_found(EntityKind::Comment, comment.parent_id));
        }

        comments.insert(comment.id.clone(), comment);
        Ok(())
    }

    fn get_comment(&self, id: &str) -> Result<Comment, StoreError> {
        read(&self.comments)
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(EntityKind::Comment, id))
    }

    fn get_post_comments(&self, post_id: &str) -> Result<Vec<Comment>, StoreError> {
        Ok(read(&self.comments)
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect())
    }

    fn vote(&self, target_id: &str, user_id: &str, is_upvote: bool) -> Result<(), StoreError> {
        // posts before votes
        let mut posts = write(&self.posts);
        let mut votes = write(&self.votes);

        votes
            .entry(target_id.to_string())
            .or_default()
            .insert(user_id.to_string(), is_upvote);

        if let Some(post) = posts.get_mut(target_id) {
            post.karma += if is_upvote { 1 } else { -1 };
        }
        Ok(())
    }

    fn vote_of(&self, target_id: &str, user_id: &str) -> Option<bool> {
        read(&self.votes)
            .get(target_id)
            .and_then(|voters| voters.get(user_id))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn user(id: &str, name: &str) -> User {
        User {
            id: id.to_string(),
            username: name.to_string(),
            password: "hunter2".to_string(),
            created_at: 1_700_000_000,
        }
    }

    fn post(id: &str, community_id: &str) -> Post {
        Post {
            id: id.to_string(),
            community_id: community_id.to_string(),
            author_id: "u1".to_string(),
            title: format!("title {}", id),
            content: "body".to_string(),
            created_at: 1_700_000_000,
            is_repost: false,
            karma: 0,
        }
    }

    fn comment(id: &str, post_id: &str, parent_id: &str) -> Comment {
        Comment {
            id: id.to_string(),
            post_id: post_id.to_string(),
            parent_id: parent_id.to_string(),
            author_id: "u1".to_string(),
            content: "first".to_string(),
            created_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_duplicate_user_keeps_first() {
        let store = MemoryStore::new();
        store.create_user(user("u1", "alice")).unwrap();

        let err = store.create_user(user("u1", "mallory")).unwrap_err();
        assert_eq!(err, StoreError::already_exists(EntityKind::User, "u1"));
        assert_eq!(store.get_user("u1").unwrap().username, "alice");
    }

    #[test]
    fn test_missing_entities_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(store.get_user("nope"), Err(StoreError::NotFound { kind: EntityKind::User, .. })));
        assert!(matches!(store.get_community("nope"), Err(StoreError::NotFound { kind: EntityKind::Community, .. })));
        assert!(matches!(store.get_post("nope"), Err(StoreError::NotFound { kind: EntityKind::Post, .. })));
        assert!(matches!(store.get_comment("nope"), Err(StoreError::NotFound { kind: EntityKind::Comment, .. })));
    }

    #[test]
    fn test_creator_not_auto_joined() {
        let store = MemoryStore::new();
        store.create_user(user("u1", "alice")).unwrap();
        store
            .create_community(Community::new("c1", "rust", "crabs", "u1", 0))
            .unwrap();

        assert!(store.get_community("c1").unwrap().members.is_empty());

        store.join_community("c1", "u1").unwrap();
        let community = store.get_community("c1").unwrap();
        assert!(community.is_member("u1"));
        assert_eq!(community.members.len(), 1);
    }

    #[test]
    fn test_create_community_ignores_supplied_members() {
        let store = MemoryStore::new();
        let mut community = Community::new("c1", "rust", "crabs", "u1", 0);
        community.members.insert("u1".to_string());
        store.create_community(community).unwrap();

        assert!(store.get_community("c1").unwrap().members.is_empty());
    }

    #[test]
    fn test_join_leave_idempotent() {
        let store = MemoryStore::new();
        store
            .create_community(Community::new("c1", "rust", "crabs", "u1", 0))
            .unwrap();

        assert_eq!(store.join_community("c1", "u2").unwrap(), 1);
        assert_eq!(store.join_community("c1", "u2").unwrap(), 1);
        assert_eq!(store.join_community("c1", "u3").unwrap(), 2);
        assert_eq!(store.get_community("c1").unwrap().members.len(), 2);

        store.leave_community("c1", "u4").unwrap();
        store.leave_community("c1", "u3").unwrap();
        store.leave_community("c1", "u2").unwrap();
        store.leave_community("c1", "u2").unwrap();
        assert!(store.get_community("c1").unwrap().members.is_empty());
    }

    #[test]
    fn test_join_leave_unknown_community() {
        let store = MemoryStore::new();
        assert_eq!(
            store.join_community("c404", "u1"),
            Err(StoreError::not_found(EntityKind::Community, "c404"))
        );
        assert_eq!(
            store.leave_community("c404", "u1"),
            Err(StoreError::not_found(EntityKind::Community, "c404"))
        );
    }

    #[test]
    fn test_post_karma_starts_at_zero() {
        let store = MemoryStore::new();
        let mut p = post("p1", "c1");
        p.karma = 42;
        store.create_post(p).unwrap();
        assert_eq!(store.get_post("p1").unwrap().karma, 0);
    }

    #[test]
    fn test_vote_flip_accumulates() {
        let store = MemoryStore::new();
        store.create_post(post("p1", "c1")).unwrap();

        store.vote("p1", "voterA", true).unwrap();
        assert_eq!(store.get_post("p1").unwrap().karma, 1);

        // ledger flips to downvote, karma moves one unit (not two)
        store.vote("p1", "voterA", false).unwrap();
        assert_eq!(store.get_post("p1").unwrap().karma, 0);
        assert_eq!(store.vote_of("p1", "voterA"), Some(false));

        // repeated upvotes from the same voter keep counting
        store.vote("p1", "voterA", true).unwrap();
        store.vote("p1", "voterA", true).unwrap();
        assert_eq!(store.get_post("p1").unwrap().karma, 2);
    }

    #[test]
    fn test_vote_on_non_post_target() {
        let store = MemoryStore::new();
        store.vote("comment-9", "u1", false).unwrap();
        assert_eq!(store.vote_of("comment-9", "u1"), Some(false));
        assert_eq!(store.vote_of("comment-9", "u2"), None);
    }

    #[test]
    fn test_community_posts_in_creation_order() {
        let store = MemoryStore::new();
        for id in ["p3", "p1", "x9", "p2"] {
            let community = if id == "x9" { "other" } else { "c1" };
            store.create_post(post(id, community)).unwrap();
        }

        let ids: Vec<String> = store
            .get_community_posts("c1")
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["p3", "p1", "p2"]);
        assert!(store.get_community_posts("empty").unwrap().is_empty());
    }

    #[test]
    fn test_comment_existence_checks() {
        let store = MemoryStore::new();
        assert_eq!(
            store.create_comment(comment("k1", "p1", "")),
            Err(StoreError::not_found(EntityKind::Post, "p1"))
        );

        store.create_post(post("p1", "c1")).unwrap();
        store.create_comment(comment("k1", "p1", "")).unwrap();
        assert_eq!(
            store.create_comment(comment("k2", "p1", "k404")),
            Err(StoreError::not_found(EntityKind::Comment, "k404"))
        );
        store.create_comment(comment("k2", "p1", "k1")).unwrap();
        assert_eq!(
            store.create_comment(comment("k1", "p1", "")),
            Err(StoreError::already_exists(EntityKind::Comment, "k1"))
        );

        let thread = store.get_post_comments("p1").unwrap();
        assert_eq!(thread.len(), 2);
        assert!(thread[0].is_root());
        assert_eq!(thread[1].parent_id, "k1");
    }

    #[test]
    fn test_concurrent_votes_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        store.create_post(post("p1", "c1")).unwrap();

        let workers: Vec<_> = (0..8)
            .map(|w| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        store.vote("p1", &format!("v{}-{}", w, i), true).unwrap();
                        let _ = store.get_post("p1");
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(store.get_post("p1").unwrap().karma, 2000);
    }

    proptest! {
        #[test]
        fn prop_second_create_is_rejected(id in "[a-z0-9]{1,12}", first in "[a-z]{1,8}", second in "[a-z]{1,8}") {
            let store = MemoryStore::new();
            store.create_user(user(&id, &first)).unwrap();
            prop_assert_eq!(
                store.create_user(user(&id, &second)),
                Err(StoreError::already_exists(EntityKind::User, id.clone()))
            );
            prop_assert_eq!(store.get_user(&id).unwrap().username, first);

            store.create_post(post(&id, "c1")).unwrap();
            prop_assert!(store.create_post(post(&id, "c2")).is_err());
            prop_assert_eq!(store.get_post(&id).unwrap().community_id, "c1");
        }

        #[test]
        fn prop_karma_is_net_call_count(votes in proptest::collection::vec(any::<bool>(), 0..64)) {
            let store = MemoryStore::new();
            store.create_post(post("p1", "c1")).unwrap();
            for up in &votes {
                store.vote("p1", "same-voter", *up).unwrap();
            }
            let expected: i64 = votes.iter().map(|&up| if up { 1 } else { -1 }).sum();
            prop_assert_eq!(store.get_post("p1").unwrap().karma, expected);
        }
    }
}
