pub mod auth;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod replies;
pub mod validate;


use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};

use crate::auth::AppState;

/// All API routes. Every request passes through [`middleware::identify`],
/// so handlers always find an [`auth::Identity`] extension.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/messages", post(messages::create_message))
        .route(
            "/messages/{message_id}",
            get(messages::get_message).delete(messages::delete_message),
        )
        .route("/messages/{message_id}/replies", get(messages::get_replies))
        .route("/replies", post(replies::create_reply))
        .route("/replies/{reply_id}", delete(replies::delete_reply))
        .route("/notifications", get(notifications::list_notifications))
        .route(
            "/notifications/{notification_id}/read",
            post(notifications::mark_read),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::identify,
        ))
        .with_state(state)
}
