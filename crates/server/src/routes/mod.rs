use axum::{
    Router,
    http::{Request, header::HeaderName},
    middleware,
    routing::get,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::{DefaultOnFailure, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, field};

use crate::{AppState, auth::require_user, realtime};

pub mod boards;
pub mod cards;
pub mod checklist;
pub mod comments;
pub mod health;

pub fn router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            let request_id = request
                .extensions()
                .get::<RequestId>()
                .and_then(|id| id.header_value().to_str().ok());
            let span = tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = field::Empty
            );
            if let Some(request_id) = request_id {
                span.record("request_id", field::display(request_id));
            }
            span
        })
        .on_response(DefaultOnResponse::new().level(Level::INFO))
        .on_failure(DefaultOnFailure::new().level(Level::ERROR));

    // The WebSocket endpoint authenticates on its own: browsers cannot set
    // headers on an upgrade request, so it also accepts `?token=`.
    let public = Router::<AppState>::new()
        .route("/health", get(health::health_check))
        .merge(realtime::router());

    let protected = Router::<AppState>::new()
        .merge(boards::router())
        .merge(cards::router())
        .merge(checklist::router())
        .merge(comments::router())
        .layer(middleware::from_fn_with_state(state.clone(), require_user));

    Router::<AppState>::new()
        .nest("/api", public.merge(protected))
        .layer(CorsLayer::permissive())
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            "x-request-id",
        )))
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static("x-request-id"),
            MakeRequestUuid {},
        ))
        .with_state(state)
}
