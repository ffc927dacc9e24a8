//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response bodies
//!
//! # API Structure
//!
//! The gateway exposes a single path-routed endpoint. The request path, minus its leading
//! `/`, is the object name; the method picks the operation:
//!
//! - `GET /standards...` returns a presigned upload URL for the object name itself
//! - `GET /gallery...` lists the caller's gallery keys as a JSON array
//! - `POST`/`PUT` returns a presigned upload URL under `{code}/{category}/`
//! - `DELETE` removes the object stored at the object name
//!
//! Every request must carry a non-empty `code` header. `GET /healthz` is answered before
//! that check.

pub mod handlers;
pub mod models;
