//! Process-local store. Nothing here survives a restart.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{seed, Store, StoreError};
use crate::db::models::{
    Comment, NewComment, NewPost, Post, PostQuery, Vote, VoteOutcome, VoteRequest, VoteTarget,
};
use crate::session::SessionToken;

#[derive(Default)]
struct Tables {
    posts: Vec<Post>,
    comments: Vec<Comment>,
    votes: HashMap<(SessionToken, VoteTarget), Vote>,
}

impl Tables {
    fn score(&self, target: &VoteTarget) -> i64 {
        self.votes
            .values()
            .filter(|v| &v.target == target)
            .map(|v| v.direction.weight())
            .sum()
    }

    fn has_post(&self, id: &str) -> bool {
        self.posts.iter().any(|p| p.id == id)
    }

    fn has_comment(&self, id: &str) -> bool {
        self.comments.iter().any(|c| c.id == id)
    }

    /// Copy of a stored post with its derived fields filled in.
    fn materialize_post(&self, post: &Post) -> Post {
        let mut post = post.clone();
        post.score = self.score(&VoteTarget::Post(post.id.clone()));
        post.comment_count = self
            .comments
            .iter()
            .filter(|c| c.post_id == post.id)
            .count() as i64;
        post
    }

    fn materialize_comment(&self, comment: &Comment) -> Comment {
        let mut comment = comment.clone();
        comment.score = self.score(&VoteTarget::Comment(comment.id.clone()));
        comment
    }
}

pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    /// A store pre-loaded with the fallback feed.
    pub fn seeded() -> Self {
        let (posts, comments) = seed::fallback_feed(Utc::now());
        Self {
            tables: RwLock::new(Tables {
                posts,
                comments,
                votes: HashMap::new(),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert_post(&self, post: &NewPost) -> Result<Post, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.has_post(&post.id) {
            return Err(StoreError::Conflict(format!("post {} already exists", post.id)));
        }

        let stored = Post {
            id: post.id.clone(),
            content: post.content.clone(),
            title: None,
            category: None,
            reply: None,
            session_token: post.session_token.clone(),
            score: 0,
            comment_count: 0,
            created_at: post.created_at,
        };
        tables.posts.push(stored.clone());
        Ok(stored)
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .iter()
            .find(|p| p.id == id)
            .map(|p| tables.materialize_post(p)))
    }

    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>, StoreError> {
        let tables = self.tables.read().await;
        let mut posts: Vec<Post> = tables
            .posts
            .iter()
            .map(|p| tables.materialize_post(p))
            .collect();
        posts.sort_by(|a, b| query.sort.compare(a, b));

        Ok(posts
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn attach_reply(&self, post_id: &str, reply: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let post = tables
            .posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or_else(|| StoreError::NotFound(format!("post {}", post_id)))?;
        post.reply = Some(reply.to_string());
        Ok(())
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.has_post(&comment.post_id) {
            return Err(StoreError::NotFound(format!("post {}", comment.post_id)));
        }
        if tables.has_comment(&comment.id) {
            return Err(StoreError::Conflict(format!(
                "comment {} already exists",
                comment.id
            )));
        }

        let stored = Comment {
            id: comment.id.clone(),
            post_id: comment.post_id.clone(),
            content: comment.content.clone(),
            authorship: comment.authorship,
            session_token: comment.session_token.clone(),
            score: 0,
            created_at: comment.created_at,
        };
        tables.comments.push(stored.clone());
        Ok(stored)
    }

    async fn list_comments(&self, post_id: &str) -> Result<Vec<Comment>, StoreError> {
        let tables = self.tables.read().await;
        let mut comments: Vec<Comment> = tables
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .map(|c| tables.materialize_comment(c))
            .collect();
        comments.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(comments)
    }

    async fn cast_vote(&self, request: &VoteRequest) -> Result<VoteOutcome, StoreError> {
        // The write lock makes read-then-write one step for every caller.
        let mut tables = self.tables.write().await;

        let exists = match &request.target {
            VoteTarget::Post(id) => tables.has_post(id),
            VoteTarget::Comment(id) => tables.has_comment(id),
        };
        if !exists {
            return Err(StoreError::NotFound(format!(
                "{} {}",
                request.target.kind(),
                request.target.id()
            )));
        }

        let key = (request.session_token.clone(), request.target.clone());
        let (vote, previous) = match tables.votes.entry(key) {
            Entry::Vacant(slot) => {
                let vote = Vote {
                    id: request.id.clone(),
                    target: request.target.clone(),
                    direction: request.direction,
                    session_token: request.session_token.clone(),
                    created_at: request.cast_at,
                    updated_at: request.cast_at,
                };
                slot.insert(vote.clone());
                (vote, None)
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                let previous = existing.direction;
                if previous != request.direction {
                    existing.direction = request.direction;
                    existing.updated_at = request.cast_at;
                }
                (existing.clone(), Some(previous))
            }
        };

        let score = tables.score(&request.target);
        Ok(VoteOutcome {
            vote,
            previous,
            score,
        })
    }
}
