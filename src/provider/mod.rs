//! Upstream text-generation providers.
//!
//! The relay only sees the [`ChatProvider`] capability: open a streaming
//! completion for a prepared [`ProviderRequest`] and yield [`StreamChunk`]s.
//!
//! - [`gemini`]: Google Gemini `streamGenerateContent` over HTTPS
//! - [`sse`]: Server-Sent Events framing for provider response bodies

pub mod gemini;
pub mod sse;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Api(String),

    #[error("malformed chunk: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Role of a conversation turn in the provider's content model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// One turn of content sent upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

/// Generation parameters, passed to the provider opaquely.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f64,
    pub thinking_budget: i32,
}

/// A fully prepared upstream request.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub model: String,
    pub api_key: String,
    pub turns: Vec<Turn>,
    pub params: GenerationParams,
}

impl ProviderRequest {
    /// Build a request from scratch for a single message.
    ///
    /// The persona goes out as a `user` turn ahead of the message, not as a
    /// system instruction.
    pub fn for_message(
        model: &str,
        api_key: &str,
        persona: &str,
        message: &str,
        params: GenerationParams,
    ) -> Self {
        Self {
            model: model.to_string(),
            api_key: api_key.to_string(),
            turns: vec![
                Turn {
                    role: Role::User,
                    text: persona.to_string(),
                },
                Turn {
                    role: Role::User,
                    text: message.to_string(),
                },
            ],
            params,
        }
    }
}

/// One decoded chunk of a provider stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamChunk {
    /// Text content, or `None` for metadata-only chunks.
    pub text: Option<String>,
}

impl StreamChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    pub fn empty() -> Self {
        Self { text: None }
    }
}

pub type ChunkStream = BoxStream<'static, Result<StreamChunk, ProviderError>>;

/// Streaming text-completion capability.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &'static str;

    /// Open a streaming completion.
    async fn stream(&self, request: ProviderRequest) -> Result<ChunkStream, ProviderError>;
}

/// Whether a provider client could be constructed at startup.
#[derive(Clone)]
pub enum ProviderHandle {
    Available(Arc<dyn ChatProvider>),
    Unavailable(String),
}

impl ProviderHandle {
    pub fn is_available(&self) -> bool {
        matches!(self, ProviderHandle::Available(_))
    }
}

impl std::fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderHandle::Available(p) => f.debug_tuple("Available").field(&p.name()).finish(),
            ProviderHandle::Unavailable(reason) => {
                f.debug_tuple("Unavailable").field(reason).finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_sends_persona_as_user_turn() {
        let params = GenerationParams {
            temperature: 1.1,
            thinking_budget: 512,
        };
        let req = ProviderRequest::for_message("m", "k", "be kind", "hi there", params);

        assert_eq!(req.turns.len(), 2);
        assert_eq!(req.turns[0].role, Role::User);
        assert_eq!(req.turns[0].text, "be kind");
        assert_eq!(req.turns[1].role, Role::User);
        assert_eq!(req.turns[1].text, "hi there");
    }

    #[test]
    fn test_status_error_message_includes_code() {
        let err = ProviderError::Status {
            status: 403,
            body: "denied".to_string(),
        };
        assert_eq!(err.to_string(), "upstream returned 403: denied");
    }
}
