//! HTTP API: routing, handlers, middleware, error mapping.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;
