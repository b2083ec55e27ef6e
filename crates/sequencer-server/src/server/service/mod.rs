//! HTTP service implementation.
//!
//! ## Structure
//!
//! - [`handler`] - Routes, shared state and request handlers.
//! - [`error`] - [`error::ApiError`] and its mapping onto HTTP responses.

pub mod error;
pub mod handler;
