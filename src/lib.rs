//! joi-companion: streaming chat relay for a companion persona.
//!
//! A browser posts a message; the server forwards it to Gemini together with
//! a fixed persona prompt and streams the reply back as plain text, so the
//! API key never leaves the server.

pub mod config;
pub mod metrics;
pub mod provider;
pub mod relay;
pub mod server;
