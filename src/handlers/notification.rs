use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::notification::{
        FeedFilter, NOTIFICATION_PAGE_SIZE, NotificationCountParams, NotificationListParams,
    },
    services::fanout::{NotificationFanOut, feed_skip},
    utils::jwt::Claims,
};

/// List the caller's notifications. The returned page is marked seen.
pub async fn list_notifications(
    State(fanout): State<NotificationFanOut>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<NotificationListParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let filter = FeedFilter::parse(params.filter.as_deref()).map_err(AppError::BadRequest)?;
    let skip = feed_skip(
        params.page.unwrap_or(1),
        params.deleted_doc_count.unwrap_or(0),
    );

    let records = fanout
        .list_feed(user_id, filter, skip, NOTIFICATION_PAGE_SIZE)
        .await?;

    Ok(Json(records))
}

/// Whether the caller has anything unseen.
pub async fn has_unseen(
    State(fanout): State<NotificationFanOut>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let available = fanout.has_unseen(user_id).await?;

    Ok(Json(serde_json::json!({ "new_notification_available": available })))
}

/// Total notifications for the caller under a filter, for page math.
pub async fn count_notifications(
    State(fanout): State<NotificationFanOut>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<NotificationCountParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let filter = FeedFilter::parse(params.filter.as_deref()).map_err(AppError::BadRequest)?;

    let total = fanout.count_feed(user_id, filter).await?;

    Ok(Json(serde_json::json!({ "total_docs": total })))
}
