use axum::extract::{FromRequest, FromRequestParts, Query};
use axum::Json;

use crate::error::AppError;

/// `Json` whose rejections come back as JSON validation errors.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `Query` whose rejections come back as JSON validation errors.
#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);
