//! API Module
//!
//! HTTP handlers and routing for the operational surface.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Component statistics
//! - `GET /tasks/:id` - Task status lookup

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use handlers::*;
pub use middleware::{client_ip, rate_limit_key};
pub use routes::create_router;
