//! Real-time messaging core for the care platform: live sessions, message
//! routing and durable conversation state.

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod websocket;

pub use routes::build_router;
