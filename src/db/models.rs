use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionToken;

/// An anonymously written letter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: String,
    pub content: String,
    pub title: Option<String>,
    pub category: Option<String>,
    /// Simulated reply, attached some time after creation (or never).
    pub reply: Option<String>,
    #[serde(skip_serializing)]
    pub session_token: SessionToken,
    /// Up-votes minus down-votes, derived from vote rows.
    pub score: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Authorship {
    Human,
    Generated,
}

impl Authorship {
    pub fn is_generated(self) -> bool {
        matches!(self, Authorship::Generated)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub content: String,
    pub authorship: Authorship,
    /// Generated comments have no session behind them.
    #[serde(skip_serializing)]
    pub session_token: Option<SessionToken>,
    pub score: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn from_is_upvote(is_upvote: bool) -> Self {
        if is_upvote {
            VoteDirection::Up
        } else {
            VoteDirection::Down
        }
    }

    pub fn is_upvote(self) -> bool {
        matches!(self, VoteDirection::Up)
    }

    /// Contribution of one vote in this direction to a score.
    pub fn weight(self) -> i64 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }
}

/// What a vote is cast on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum VoteTarget {
    Post(String),
    Comment(String),
}

impl VoteTarget {
    pub fn id(&self) -> &str {
        match self {
            VoteTarget::Post(id) | VoteTarget::Comment(id) => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            VoteTarget::Post(_) => "post",
            VoteTarget::Comment(_) => "comment",
        }
    }
}

/// A session's current stance on a target. At most one exists per
/// (session, target) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vote {
    pub id: String,
    pub target: VoteTarget,
    pub direction: VoteDirection,
    #[serde(skip_serializing)]
    pub session_token: SessionToken,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of casting a vote: the row as it stands afterwards, the direction
/// it held before (if any) and the target's score afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteOutcome {
    pub vote: Vote,
    pub previous: Option<VoteDirection>,
    pub score: i64,
}

impl VoteOutcome {
    /// How much this call moved the target's score.
    pub fn score_delta(&self) -> i64 {
        match self.previous {
            None => self.vote.direction.weight(),
            Some(prev) if prev == self.vote.direction => 0,
            Some(_) => 2 * self.vote.direction.weight(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    #[serde(alias = "votes", alias = "top")]
    TopRated,
}

impl SortOrder {
    /// Total order over posts for this sort. Ties on the primary key fall
    /// back to recency, then to id, so offsets stay stable between requests.
    pub fn compare(self, a: &Post, b: &Post) -> Ordering {
        let newest = b
            .created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id));
        match self {
            SortOrder::Newest => newest,
            SortOrder::TopRated => b.score.cmp(&a.score).then(newest),
        }
    }
}

/// Window over the post feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostQuery {
    pub sort: SortOrder,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub id: String,
    pub content: String,
    pub session_token: SessionToken,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub id: String,
    pub post_id: String,
    pub content: String,
    pub authorship: Authorship,
    pub session_token: Option<SessionToken>,
    pub created_at: DateTime<Utc>,
}

/// A vote to record. `id` is only used if no row exists yet for the
/// (session, target) pair.
#[derive(Debug, Clone)]
pub struct VoteRequest {
    pub id: String,
    pub target: VoteTarget,
    pub direction: VoteDirection,
    pub session_token: SessionToken,
    pub cast_at: DateTime<Utc>,
}
