pub mod auth;
pub mod error_handling;
pub mod logging;

use axum::Router;
use tower_http::cors::CorsLayer;

/// Apply default middleware layers (CORS, request logging).
pub fn with_defaults<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    logging::add_tracing(router.layer(CorsLayer::permissive()))
}
