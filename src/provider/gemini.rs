//! Google Gemini streaming provider.
//!
//! Calls `models/{model}:streamGenerateContent?alt=sse` and turns each SSE
//! event into a [`StreamChunk`]. Reading is pull-driven: the upstream body is
//! only polled when the consumer asks for the next chunk, and dropping the
//! stream drops the HTTP response.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::sse::SseDecoder;
use super::{ChatProvider, ChunkStream, ProviderError, ProviderHandle, ProviderRequest, StreamChunk};
use crate::config::ProviderConfig;

// ─── Wire Types ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f64,
    pub thinking_config: ThinkingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    pub thinking_budget: i32,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl From<&ProviderRequest> for GenerateContentRequest {
    fn from(req: &ProviderRequest) -> Self {
        Self {
            contents: req
                .turns
                .iter()
                .map(|turn| Content {
                    role: Some(turn.role.as_str().to_string()),
                    parts: vec![Part {
                        text: Some(turn.text.clone()),
                        thought: None,
                    }],
                })
                .collect(),
            generation_config: GenerationConfig {
                temperature: req.params.temperature,
                thinking_config: ThinkingConfig {
                    thinking_budget: req.params.thinking_budget,
                },
            },
        }
    }
}

impl GenerateContentResponse {
    /// Visible text of the first candidate; thought parts are excluded.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter(|p| !p.thought.unwrap_or(false))
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Decode one SSE data payload.
pub fn decode_chunk(data: &str) -> Result<StreamChunk, ProviderError> {
    let resp: GenerateContentResponse = serde_json::from_str(data)?;
    if let Some(err) = resp.error {
        let mut msg = err.message;
        if let Some(status) = err.status {
            msg = format!("{status}: {msg}");
        }
        if let Some(code) = err.code {
            msg = format!("{code} {msg}");
        }
        return Err(ProviderError::Api(msg));
    }
    Ok(StreamChunk { text: resp.text() })
}

// ─── Provider ──────────────────────────────────────────────────────────────

pub struct GeminiProvider {
    client: reqwest::Client,
    api_base: String,
}

impl GeminiProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Build the provider, reporting unavailability instead of failing.
    pub fn connect(config: &ProviderConfig) -> ProviderHandle {
        match Self::new(config) {
            Ok(provider) => ProviderHandle::Available(std::sync::Arc::new(provider)),
            Err(e) => ProviderHandle::Unavailable(e.to_string()),
        }
    }

    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{model}:streamGenerateContent?alt=sse",
            self.api_base
        )
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkStream, ProviderError> {
        let url = self.stream_url(&request.model);
        let body = GenerateContentRequest::from(&request);

        debug!(url = %url, turns = body.contents.len(), "Opening Gemini stream");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &request.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => format!("failed to read error body: {e}"),
            };
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(sse_chunks(response.bytes_stream().boxed()))
    }
}

struct BodyState {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<StreamChunk, ProviderError>>,
    finished: bool,
}

/// Turn a raw SSE response body into decoded chunks.
fn sse_chunks(body: BoxStream<'static, reqwest::Result<Bytes>>) -> ChunkStream {
    let state = BodyState {
        body,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match st.body.next().await {
                Some(Ok(bytes)) => {
                    for data in st.decoder.push(&bytes) {
                        st.pending.push_back(decode_chunk(&data));
                    }
                }
                Some(Err(e)) => {
                    st.pending.push_back(Err(ProviderError::Http(e)));
                    st.finished = true;
                }
                None => {
                    if let Some(data) = st.decoder.finish() {
                        st.pending.push_back(decode_chunk(&data));
                    }
                    st.finished = true;
                }
            }
        }
    })
    .boxed()
}
