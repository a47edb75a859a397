//! Route table. Everything except `/metrics` sits behind the auth gate; the
//! gate itself lets the allow-listed account routes through.

use axum::routing::{get, post};
use axum::{middleware, Router};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::auth::auth_gate;
use crate::handlers::{self, dialogs, messages, user};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let gated = Router::new()
        .route("/user/register", post(user::register))
        .route("/register", post(user::register))
        .route("/user/verify", get(user::verify))
        .route("/user/login", post(user::login))
        .route("/login", post(user::login))
        .route("/user/me", get(user::me))
        .route("/user/search", get(user::search))
        .route("/user/{id}", get(user::show).delete(user::delete))
        .route("/dialogs", get(dialogs::list).post(dialogs::create))
        .route("/dialogs/{id}/read", post(dialogs::mark_read))
        .route("/dialogs/{id}/live", get(dialogs::live))
        .route("/messages", get(messages::list_by_dialog).post(messages::create))
        .route("/messages/sent", get(messages::list_sent))
        .route("/messages/{id}/read", post(messages::mark_read))
        .route("/messages/{id}/attachments", post(messages::attach))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_gate));

    Router::new()
        .route("/metrics", get(handlers::metrics))
        .merge(gated)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CorsLayer::permissive()),
        )
}
