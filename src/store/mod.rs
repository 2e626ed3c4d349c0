//! Storage boundary for posts, comments and votes.
//!
//! The feed service only ever talks to [`Store`]. Which implementation sits
//! behind it is decided once, at start-up, by [`open`].

pub mod memory;
mod seed;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::ErrorCode;
use thiserror::Error;

use crate::config::{Config, StoreBackend};
use crate::db::models::{Comment, NewComment, NewPost, Post, PostQuery, VoteOutcome, VoteRequest};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[source] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => StoreError::Conflict(e.to_string()),
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                StoreError::Unavailable(e.to_string())
            }
            _ => StoreError::Sql(e),
        }
    }
}

/// Data persistence contract for the feed.
#[async_trait]
pub trait Store: Send + Sync {
    /// Short name of the backend, for health reporting.
    fn backend(&self) -> &'static str;

    async fn insert_post(&self, post: &NewPost) -> Result<Post, StoreError>;

    async fn get_post(&self, id: &str) -> Result<Option<Post>, StoreError>;

    /// One window of the feed, in the query's sort order.
    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>, StoreError>;

    /// Set the generated reply on an existing post.
    async fn attach_reply(&self, post_id: &str, reply: &str) -> Result<(), StoreError>;

    /// Fails with `NotFound` if the post does not exist.
    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment, StoreError>;

    /// Comments on a post, oldest first.
    async fn list_comments(&self, post_id: &str) -> Result<Vec<Comment>, StoreError>;

    /// Record a session's vote on a target as a single atomic step.
    ///
    /// Inserts a row if the session has none for the target, flips it in
    /// place if it points the other way and leaves it untouched if it already
    /// points the requested way. Never leaves two rows for one
    /// (session, target) pair.
    async fn cast_vote(&self, vote: &VoteRequest) -> Result<VoteOutcome, StoreError>;
}

/// Pick the store for this process.
///
/// A durable store that cannot be opened is not fatal: the process serves
/// the in-memory fallback data instead.
pub fn open(config: &Config) -> Arc<dyn Store> {
    match config.storage.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory store");
            Arc::new(MemoryStore::seeded())
        }
        StoreBackend::Sqlite => {
            let path = config.db_path();
            match SqliteStore::open(&path) {
                Ok(store) => {
                    tracing::info!("Using SQLite store at {}", path.display());
                    Arc::new(store)
                }
                Err(e) => {
                    tracing::warn!(
                        "SQLite store at {} unavailable ({:#}), falling back to in-memory data",
                        path.display(),
                        e
                    );
                    Arc::new(MemoryStore::seeded())
                }
            }
        }
    }
}
