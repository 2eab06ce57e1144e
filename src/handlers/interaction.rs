use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{directory::BlogReadParams, identity::BlogId},
    services::engagement::EngagementService,
    utils::jwt::Claims,
};

/// Toggle Like on a blog.
pub async fn toggle_like(
    State(engagement): State<EngagementService>,
    Extension(claims): Extension<Claims>,
    Path(blog_id): Path<BlogId>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let liked = engagement.toggle_like(blog_id, user_id).await?;

    Ok(Json(serde_json::json!({ "liked_by_user": liked })))
}

/// Whether the caller currently likes the blog.
pub async fn is_liked(
    State(engagement): State<EngagementService>,
    Extension(claims): Extension<Claims>,
    Path(blog_id): Path<BlogId>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let result = engagement.is_liked(blog_id, user_id).await?;

    Ok(Json(serde_json::json!({ "result": result })))
}

/// Get a blog; counts a read unless `mode=edit`.
pub async fn read_blog(
    State(engagement): State<EngagementService>,
    Path(blog_id): Path<BlogId>,
    Query(params): Query<BlogReadParams>,
) -> Result<impl IntoResponse, AppError> {
    let editing = params.mode.as_deref() == Some("edit");

    let blog = engagement.record_read(blog_id, editing).await?;

    Ok(Json(blog))
}
