//! Server-side components of the sequencer HTTP service.
//!
//! ## Submodules
//!
//! - [`config`] - CLI and environment configuration.
//! - [`service`] - Routes, handlers and error mapping.
//! - [`telemetry`] - Console logging and optional OpenTelemetry export.
//!
//! These components are wired together in the binary's `main.rs`.

pub mod config;
pub mod service;
pub mod telemetry;
