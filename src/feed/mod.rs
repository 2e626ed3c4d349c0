//! Feed & vote service: the operations callers see.
//!
//! Reads degrade: a store failure on a read path is logged and answered with
//! an empty result. Writes never degrade: a failed write is an error.

pub mod validate;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::{Config, FeedConfig};
use crate::db;
use crate::db::models::{
    Authorship, Comment, NewComment, NewPost, Post, PostQuery, SortOrder, VoteDirection,
    VoteOutcome, VoteRequest, VoteTarget,
};
use crate::error::{AppError, AppResult};
use crate::replies::{CannedReplies, ReplyComposer};
use crate::session::SessionToken;
use crate::store::{Store, StoreError};

const VOTE_ATTEMPTS: usize = 3;

/// One page of the feed.
///
/// `has_more` is a guess: it is true whenever the page came back full, so
/// the next page may still turn out empty.
#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    pub posts: Vec<Post>,
    pub page: u32,
    pub page_size: u32,
    pub has_more: bool,
}

#[derive(Clone)]
pub struct FeedService {
    store: Arc<dyn Store>,
    limits: FeedConfig,
    replies: Option<Arc<dyn ReplyComposer>>,
    reply_delay: Duration,
}

impl FeedService {
    pub fn new(store: Arc<dyn Store>, limits: FeedConfig) -> Self {
        Self {
            store,
            limits,
            replies: None,
            reply_delay: Duration::ZERO,
        }
    }

    pub fn from_config(store: Arc<dyn Store>, config: &Config) -> Self {
        let service = Self::new(store, config.feed.clone());
        if config.replies.enabled {
            service.with_replies(
                Arc::new(CannedReplies),
                Duration::from_millis(config.replies.delay_ms),
            )
        } else {
            service
        }
    }

    pub fn with_replies(mut self, composer: Arc<dyn ReplyComposer>, delay: Duration) -> Self {
        self.replies = Some(composer);
        self.reply_delay = delay;
        self
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// The `page`-th window of the feed (1-indexed).
    pub async fn list(
        &self,
        sort: SortOrder,
        page: u32,
        page_size: Option<u32>,
    ) -> AppResult<FeedPage> {
        validate::page(page)?;
        let page_size = page_size
            .unwrap_or(self.limits.page_size)
            .clamp(1, self.limits.max_page_size.max(1));

        let query = PostQuery {
            sort,
            offset: u64::from(page - 1) * u64::from(page_size),
            limit: u64::from(page_size),
        };

        let posts = match self.store.list_posts(&query).await {
            Ok(posts) => posts,
            Err(e) => {
                tracing::warn!("Feed read failed, serving empty page: {}", e);
                Vec::new()
            }
        };

        Ok(FeedPage {
            has_more: posts.len() == page_size as usize,
            posts,
            page,
            page_size,
        })
    }

    pub async fn get(&self, id: &str) -> AppResult<Post> {
        self.store
            .get_post(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {}", id)))
    }

    /// Publish a letter. The stored content is exactly `content`.
    pub async fn create(&self, content: &str, session: &SessionToken) -> AppResult<Post> {
        validate::content(content, self.limits.max_post_chars, "Letter")?;

        let new_post = NewPost {
            id: uuid::Uuid::now_v7().to_string(),
            content: content.to_string(),
            session_token: session.clone(),
            created_at: db::now(),
        };
        let post = self.store.insert_post(&new_post).await?;
        tracing::info!(post_id = %post.id, "Letter published");

        self.schedule_reply(&post);
        Ok(post)
    }

    /// Cast, re-assert or switch `session`'s vote on `target`.
    ///
    /// Voting the same way twice changes nothing; voting the other way flips
    /// the existing vote.
    pub async fn vote(
        &self,
        target: VoteTarget,
        direction: VoteDirection,
        session: &SessionToken,
    ) -> AppResult<VoteOutcome> {
        let request = VoteRequest {
            id: uuid::Uuid::now_v7().to_string(),
            target,
            direction,
            session_token: session.clone(),
            cast_at: db::now(),
        };

        let mut attempt = 1;
        loop {
            match self.store.cast_vote(&request).await {
                Ok(outcome) => {
                    tracing::debug!(
                        target_kind = request.target.kind(),
                        target_id = request.target.id(),
                        delta = outcome.score_delta(),
                        score = outcome.score,
                        "Vote recorded"
                    );
                    return Ok(outcome);
                }
                Err(StoreError::Conflict(msg)) if attempt < VOTE_ATTEMPTS => {
                    tracing::debug!(attempt, "Vote raced another writer, retrying: {}", msg);
                    attempt += 1;
                }
                Err(StoreError::Conflict(msg)) => {
                    return Err(AppError::StorageUnavailable(format!(
                        "vote kept conflicting after {} attempts: {}",
                        VOTE_ATTEMPTS, msg
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Comments on a post, oldest first. Unknown posts have no comments.
    pub async fn list_comments(&self, post_id: &str) -> Vec<Comment> {
        match self.store.list_comments(post_id).await {
            Ok(comments) => comments,
            Err(e) => {
                tracing::warn!(post_id, "Comment read failed, serving none: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn add_comment(
        &self,
        post_id: &str,
        content: &str,
        authorship: Authorship,
        session: &SessionToken,
    ) -> AppResult<Comment> {
        validate::content(content, self.limits.max_comment_chars, "Comment")?;

        let new_comment = NewComment {
            id: uuid::Uuid::now_v7().to_string(),
            post_id: post_id.to_string(),
            content: content.to_string(),
            authorship,
            session_token: match authorship {
                Authorship::Human => Some(session.clone()),
                Authorship::Generated => None,
            },
            created_at: db::now(),
        };
        let comment = self.store.insert_comment(&new_comment).await?;
        tracing::info!(post_id, comment_id = %comment.id, "Comment added");
        Ok(comment)
    }

    fn schedule_reply(&self, post: &Post) {
        let Some(composer) = &self.replies else {
            return;
        };
        let Some(reply) = composer.compose(post) else {
            return;
        };

        let store = Arc::clone(&self.store);
        let delay = self.reply_delay;
        let post_id = post.id.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match store.attach_reply(&post_id, &reply).await {
                Ok(()) => tracing::debug!(post_id = %post_id, "Reply attached"),
                Err(e) => tracing::warn!(post_id = %post_id, "Could not attach reply: {}", e),
            }
        });
    }
}
