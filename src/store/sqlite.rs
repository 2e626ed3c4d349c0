//! Durable store on SQLite.
//!
//! Scores are computed from vote rows on every read rather than kept as a
//! counter, so there is no second number that can drift.

use std::path::Path;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};

use super::{Store, StoreError};
use crate::db::models::{
    Authorship, Comment, NewComment, NewPost, Post, PostQuery, SortOrder, Vote, VoteDirection,
    VoteOutcome, VoteRequest, VoteTarget,
};
use crate::db::{self, format_timestamp, parse_timestamp};
use crate::session::SessionToken;
use crate::state::DbPool;

const POST_SELECT: &str = "
    SELECT p.id, p.content, p.title, p.category, p.reply, p.session_token, p.created_at,
           COALESCE((SELECT SUM(CASE WHEN v.is_upvote THEN 1 ELSE -1 END)
                     FROM votes v WHERE v.post_id = p.id), 0) AS score,
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count
    FROM posts p";

const COMMENT_SELECT: &str = "
    SELECT c.id, c.post_id, c.content, c.is_generated, c.session_token, c.created_at,
           COALESCE((SELECT SUM(CASE WHEN v.is_upvote THEN 1 ELSE -1 END)
                     FROM votes v WHERE v.comment_id = c.id), 0) AS score
    FROM comments c";

/// Statements for one kind of vote target.
struct VoteSql {
    target_exists: &'static str,
    find: &'static str,
    upsert: &'static str,
    score: &'static str,
}

const POST_VOTES: VoteSql = VoteSql {
    target_exists: "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
    find: "SELECT id, is_upvote, created_at, updated_at FROM votes
           WHERE session_token = ?1 AND post_id = ?2 AND comment_id IS NULL",
    upsert: "INSERT INTO votes (id, post_id, comment_id, is_upvote, session_token, created_at, updated_at)
             VALUES (?1, ?2, NULL, ?3, ?4, ?5, ?5)
             ON CONFLICT (session_token, post_id) WHERE comment_id IS NULL
             DO UPDATE SET is_upvote = excluded.is_upvote, updated_at = excluded.updated_at",
    score: "SELECT COALESCE(SUM(CASE WHEN is_upvote THEN 1 ELSE -1 END), 0)
            FROM votes WHERE post_id = ?1",
};

const COMMENT_VOTES: VoteSql = VoteSql {
    target_exists: "SELECT EXISTS(SELECT 1 FROM comments WHERE id = ?1)",
    find: "SELECT id, is_upvote, created_at, updated_at FROM votes
           WHERE session_token = ?1 AND comment_id = ?2 AND post_id IS NULL",
    upsert: "INSERT INTO votes (id, post_id, comment_id, is_upvote, session_token, created_at, updated_at)
             VALUES (?1, NULL, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT (session_token, comment_id) WHERE post_id IS NULL
             DO UPDATE SET is_upvote = excluded.is_upvote, updated_at = excluded.updated_at",
    score: "SELECT COALESCE(SUM(CASE WHEN is_upvote THEN 1 ELSE -1 END), 0)
            FROM votes WHERE comment_id = ?1",
};

impl VoteSql {
    fn for_target(target: &VoteTarget) -> &'static VoteSql {
        match target {
            VoteTarget::Post(_) => &POST_VOTES,
            VoteTarget::Comment(_) => &COMMENT_VOTES,
        }
    }
}

fn order_clause(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::Newest => "p.created_at DESC, p.id DESC",
        SortOrder::TopRated => "score DESC, p.created_at DESC, p.id DESC",
    }
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    let created_at: String = row.get(6)?;
    Ok(Post {
        id: row.get(0)?,
        content: row.get(1)?,
        title: row.get(2)?,
        category: row.get(3)?,
        reply: row.get(4)?,
        session_token: SessionToken::new(row.get::<_, String>(5)?),
        created_at: parse_timestamp(6, &created_at)?,
        score: row.get(7)?,
        comment_count: row.get(8)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    let is_generated: bool = row.get(3)?;
    let created_at: String = row.get(5)?;
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        content: row.get(2)?,
        authorship: if is_generated {
            Authorship::Generated
        } else {
            Authorship::Human
        },
        session_token: row.get::<_, Option<String>>(4)?.map(SessionToken::new),
        created_at: parse_timestamp(5, &created_at)?,
        score: row.get(6)?,
    })
}

pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) and migrate the database at `path`.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let pool = db::create_pool(path)?;
        db::run_migrations(&pool)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn insert_post(&self, post: &NewPost) -> Result<Post, StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO posts (id, content, session_token, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                post.id,
                post.content,
                post.session_token.as_str(),
                format_timestamp(&post.created_at)
            ],
        )?;

        Ok(Post {
            id: post.id.clone(),
            content: post.content.clone(),
            title: None,
            category: None,
            reply: None,
            session_token: post.session_token.clone(),
            score: 0,
            comment_count: 0,
            created_at: post.created_at,
        })
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>, StoreError> {
        let conn = self.pool.get()?;
        let post = conn
            .query_row(
                &format!("{} WHERE p.id = ?1", POST_SELECT),
                params![id],
                post_from_row,
            )
            .optional()?;
        Ok(post)
    }

    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>, StoreError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "{} ORDER BY {} LIMIT ?1 OFFSET ?2",
            POST_SELECT,
            order_clause(query.sort)
        );
        let mut stmt = conn.prepare(&sql)?;
        let posts = stmt
            .query_map(
                params![query.limit as i64, query.offset as i64],
                post_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    async fn attach_reply(&self, post_id: &str, reply: &str) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE posts SET reply = ?2 WHERE id = ?1",
            params![post_id, reply],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(format!("post {}", post_id)));
        }
        Ok(())
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment, StoreError> {
        let conn = self.pool.get()?;

        let post_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
            params![comment.post_id],
            |r| r.get(0),
        )?;
        if !post_exists {
            return Err(StoreError::NotFound(format!("post {}", comment.post_id)));
        }

        conn.execute(
            "INSERT INTO comments (id, post_id, content, is_generated, session_token, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                comment.id,
                comment.post_id,
                comment.content,
                comment.authorship.is_generated(),
                comment.session_token.as_ref().map(|t| t.as_str()),
                format_timestamp(&comment.created_at)
            ],
        )?;

        Ok(Comment {
            id: comment.id.clone(),
            post_id: comment.post_id.clone(),
            content: comment.content.clone(),
            authorship: comment.authorship,
            session_token: comment.session_token.clone(),
            score: 0,
            created_at: comment.created_at,
        })
    }

    async fn list_comments(&self, post_id: &str) -> Result<Vec<Comment>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE c.post_id = ?1 ORDER BY c.created_at ASC, c.id ASC",
            COMMENT_SELECT
        ))?;
        let comments = stmt
            .query_map(params![post_id], comment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    async fn cast_vote(&self, request: &VoteRequest) -> Result<VoteOutcome, StoreError> {
        let sql = VoteSql::for_target(&request.target);
        let target_id = request.target.id();
        let session = request.session_token.as_str();

        let mut conn = self.pool.get()?;
        // Write lock from the first read to commit.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists: bool = tx.query_row(sql.target_exists, params![target_id], |r| r.get(0))?;
        if !exists {
            return Err(StoreError::NotFound(format!(
                "{} {}",
                request.target.kind(),
                target_id
            )));
        }

        let find = |tx: &rusqlite::Transaction<'_>| {
            tx.query_row(sql.find, params![session, target_id], |row| {
                let created_at: String = row.get(2)?;
                let updated_at: String = row.get(3)?;
                Ok(Vote {
                    id: row.get(0)?,
                    target: request.target.clone(),
                    direction: VoteDirection::from_is_upvote(row.get(1)?),
                    session_token: request.session_token.clone(),
                    created_at: parse_timestamp(2, &created_at)?,
                    updated_at: parse_timestamp(3, &updated_at)?,
                })
            })
            .optional()
        };

        let previous = find(&tx)?.map(|v| v.direction);

        // Same direction again is a re-assert: nothing to write.
        if previous != Some(request.direction) {
            tx.execute(
                sql.upsert,
                params![
                    request.id,
                    target_id,
                    request.direction.is_upvote(),
                    session,
                    format_timestamp(&request.cast_at)
                ],
            )?;
        }

        let vote = find(&tx)?.ok_or_else(|| {
            StoreError::Unavailable(format!("vote on {} vanished mid-transaction", target_id))
        })?;
        let score: i64 = tx.query_row(sql.score, params![target_id], |r| r.get(0))?;
        tx.commit()?;

        Ok(VoteOutcome {
            vote,
            previous,
            score,
        })
    }
}
