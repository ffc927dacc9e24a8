//! HTTP request handlers.
//!
//! - [`objects`]: the object dispatcher behind every path
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`], which converts to a status code and a plain-text
//! body. Storage failure details are logged and never returned.

pub mod objects;
