//! API Module
//!
//! HTTP handlers and routing over the cache manager.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /cache/:key` - Retrieve a value by key
//! - `GET /cache/:key/exists` - Presence check
//! - `PUT /cache` - Store a key-value pair
//! - `DELETE /cache/:key` - Delete a key
//! - `DELETE /cache` - Clear the cache
//! - `POST /cache/mget` - Retrieve several keys
//! - `POST /cache/mset` - Store several pairs
//! - `POST /cache/mdel` - Delete several keys

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
