//! HTTP server for the companion chat.
//!
//! - [`api`]: Routes, request validation and the streamed chat response

pub mod api;
