use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::db::models::{Post, SortOrder, VoteDirection, VoteOutcome, VoteTarget};
use crate::error::AppResult;
use crate::extractors::{AppJson, AppQuery};
use crate::feed::FeedPage;
use crate::session::Session;
use crate::state::AppState;

// --- Requests ---

#[derive(Deserialize)]
pub struct FeedQuery {
    #[serde(default)]
    pub sort: SortOrder,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
}

#[derive(Deserialize)]
pub struct VoteRequestBody {
    pub direction: VoteDirection,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/posts/{id}", get(get_post))
        .route("/api/posts/{id}/votes", post(vote_on_post))
}

// --- Handlers ---

async fn list_posts(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<FeedQuery>,
) -> AppResult<Json<FeedPage>> {
    let page = state
        .feed
        .list(query.sort, query.page.unwrap_or(1), query.page_size)
        .await?;
    Ok(Json(page))
}

async fn create_post(
    State(state): State<AppState>,
    Session(session): Session,
    AppJson(body): AppJson<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<Post>)> {
    let post = state.feed.create(&body.content, &session).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn get_post(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Post>> {
    Ok(Json(state.feed.get(&id).await?))
}

async fn vote_on_post(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<String>,
    AppJson(body): AppJson<VoteRequestBody>,
) -> AppResult<Json<VoteOutcome>> {
    let outcome = state
        .feed
        .vote(VoteTarget::Post(id), body.direction, &session)
        .await?;
    Ok(Json(outcome))
}
