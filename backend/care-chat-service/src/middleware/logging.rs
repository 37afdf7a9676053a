use axum::http::{Request, Response};
use axum::Router;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{field, Level, Span};

/// Span field filled in by the auth extractor once the caller is known.
pub const USER_ID_FIELD: &str = "user_id";

/// One `http` span per request carrying method, path and the authenticated
/// user, closed by a response line with status and latency. Server errors are
/// logged at error level.
pub fn add_tracing<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &Request<_>| {
                tracing::span!(
                    Level::INFO,
                    "http",
                    method = %req.method(),
                    uri = %req.uri().path(),
                    user_id = field::Empty,
                )
            })
            .on_response(|res: &Response<_>, latency: Duration, _span: &Span| {
                let status = res.status();
                let elapsed_ms = latency.as_millis() as u64;
                if status.is_server_error() {
                    tracing::error!(status = %status, elapsed_ms, "response");
                } else {
                    tracing::info!(status = %status, elapsed_ms, "response");
                }
            }),
    )
}

/// Attach the authenticated caller to the current request span.
pub fn record_user(user_id: i64) {
    Span::current().record(USER_ID_FIELD, user_id);
}
