// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{comment, interaction, notification},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Public reads: blog fetch, comment and reply listings.
/// * Protected writes and the caller's own feed sit behind the bearer check.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let blog_routes = Router::new()
        .route("/{blog_id}", get(interaction::read_blog))
        .route("/{blog_id}/comments", get(comment::list_comments))
        // Protected blog routes
        .merge(
            Router::new()
                .route("/{blog_id}/comments", post(comment::create_comment))
                .route("/{blog_id}/like", post(interaction::toggle_like))
                .route("/{blog_id}/liked", get(interaction::is_liked))
                .layer(auth.clone()),
        );

    let comment_routes = Router::new()
        .route("/{comment_id}/replies", get(comment::list_replies))
        .merge(
            Router::new()
                .route("/{comment_id}", delete(comment::delete_comment))
                .layer(auth.clone()),
        );

    let notification_routes = Router::new()
        .route("/", get(notification::list_notifications))
        .route("/unseen", get(notification::has_unseen))
        .route("/count", get(notification::count_notifications))
        .layer(auth);

    Router::new()
        .nest("/api/blogs", blog_routes)
        .nest("/api/comments", comment_routes)
        .nest("/api/notifications", notification_routes)
        // Global Middleware (outermost first)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
