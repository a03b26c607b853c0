//! HTTP surface: health check, script download, restore triggers.

mod auth;
mod errors;
mod handlers;
mod router;
mod state;

pub use router::ApiServer;
