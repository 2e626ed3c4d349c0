use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::db::models::{Authorship, Comment, VoteOutcome, VoteTarget};
use crate::error::AppResult;
use crate::extractors::AppJson;
use crate::routes::posts::VoteRequestBody;
use crate::session::Session;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/posts/{id}/comments",
            get(list_comments).post(create_comment),
        )
        .route("/api/comments/{id}/votes", post(vote_on_comment))
}

async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Json<Vec<Comment>> {
    Json(state.feed.list_comments(&post_id).await)
}

// Comments over HTTP are always written by people.
async fn create_comment(
    State(state): State<AppState>,
    Session(session): Session,
    Path(post_id): Path<String>,
    AppJson(body): AppJson<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let comment = state
        .feed
        .add_comment(&post_id, &body.content, Authorship::Human, &session)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn vote_on_comment(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<String>,
    AppJson(body): AppJson<VoteRequestBody>,
) -> AppResult<Json<VoteOutcome>> {
    let outcome = state
        .feed
        .vote(VoteTarget::Comment(id), body.direction, &session)
        .await?;
    Ok(Json(outcome))
}
