use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        comment::{CommentListParams, CreateCommentRequest, CreatedComment},
        identity::{BlogId, CommentId},
    },
    services::comments::{CommentService, CreateComment},
    utils::jwt::Claims,
};

/// Create a comment on a blog, or a reply when `replying_to` is set.
pub async fn create_comment(
    State(comments): State<CommentService>,
    Extension(claims): Extension<Claims>,
    Path(blog_id): Path<BlogId>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user_id = claims.user_id()?;

    let node = comments
        .create_comment(CreateComment {
            blog_id,
            author_id: user_id,
            body: payload.comment,
            blog_author_id: payload.blog_author,
            replying_to: payload.replying_to,
            in_flight_notification_id: payload.notification_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(CreatedComment::from(node))))
}

/// List top-level comments of a blog (newest first, 5 per page).
pub async fn list_comments(
    State(comments): State<CommentService>,
    Path(blog_id): Path<BlogId>,
    Query(params): Query<CommentListParams>,
) -> Result<impl IntoResponse, AppError> {
    let list = comments
        .list_comments(blog_id, params.skip.unwrap_or(0))
        .await?;

    Ok(Json(list))
}

/// List direct replies of a comment (newest first, 5 per page).
pub async fn list_replies(
    State(comments): State<CommentService>,
    Path(comment_id): Path<CommentId>,
    Query(params): Query<CommentListParams>,
) -> Result<impl IntoResponse, AppError> {
    let list = comments
        .list_replies(comment_id, params.skip.unwrap_or(0))
        .await?;

    Ok(Json(list))
}

/// Delete a comment together with all its replies.
/// Requires: Login + (Comment author OR Blog author).
pub async fn delete_comment(
    State(comments): State<CommentService>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<CommentId>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    comments.delete_comment(comment_id, user_id).await?;

    Ok(Json(serde_json::json!({ "status": "done" })))
}
