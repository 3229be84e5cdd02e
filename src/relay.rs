//! Upstream stream relay.
//!
//! Turns one user message into a finite sequence of text fragments:
//!   NOT_STARTED → STREAMING → COMPLETE | FAILED
//!
//! Every failure ends the sequence with a human-readable fragment instead of
//! an error, so the HTTP layer never sees a fault once streaming has begun.
//! The provider is driven from a spawned task feeding a bounded channel; when
//! the consumer goes away the task stops and drops the upstream stream.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::metrics::Metrics;
use crate::provider::{GenerationParams, ProviderError, ProviderHandle, ProviderRequest};

/// Fragment emitted when no provider client could be built.
pub const CLIENT_UNAVAILABLE: &str = "Error: Gemini client not available on server.";

/// Fragments buffered between the relay task and the HTTP body.
const CHANNEL_CAPACITY: usize = 32;

/// Fragment emitted when the credential is missing.
pub fn missing_credential_message(env_name: &str) -> String {
    format!("Error: {env_name} not set in environment.")
}

/// Trailing fragment appended when the upstream stream fails.
pub fn stream_error_fragment(err: &ProviderError) -> String {
    format!("\n\n[Stream error: {err}]")
}

pub type FragmentStream = ReceiverStream<String>;

/// How a relay run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Provider stream ended cleanly.
    Complete,
    /// Provider failed while opening or mid-stream.
    Failed,
    ClientUnavailable,
    MissingCredential,
    /// Consumer disconnected before the provider finished.
    Cancelled,
}

impl RelayOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayOutcome::Complete => "complete",
            RelayOutcome::Failed => "failed",
            RelayOutcome::ClientUnavailable => "client_unavailable",
            RelayOutcome::MissingCredential => "missing_credential",
            RelayOutcome::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RelayOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Injected relay configuration.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub persona: String,
    pub model: String,
    pub params: GenerationParams,
    /// Provider API key, `None` when absent from the environment.
    pub credential: Option<String>,
    /// Name of the environment variable the credential comes from.
    pub credential_env: String,
}

impl RelaySettings {
    pub fn from_config(config: &Config, credential: Option<String>) -> Self {
        Self {
            persona: config.persona.prompt.clone(),
            model: config.provider.model.clone(),
            params: GenerationParams {
                temperature: config.provider.temperature,
                thinking_budget: config.provider.thinking_budget,
            },
            credential,
            credential_env: config.provider.api_key_env.clone(),
        }
    }
}

/// The relay. Cheap to clone; holds no per-request state.
#[derive(Clone)]
pub struct Relay {
    provider: ProviderHandle,
    settings: Arc<RelaySettings>,
    metrics: Metrics,
}

impl Relay {
    pub fn new(provider: ProviderHandle, settings: RelaySettings, metrics: Metrics) -> Self {
        Self {
            provider,
            settings: Arc::new(settings),
            metrics,
        }
    }

    pub fn provider_available(&self) -> bool {
        self.provider.is_available()
    }

    pub fn credential_configured(&self) -> bool {
        self.settings.credential.is_some()
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// Start relaying `message`, returning its fragment stream.
    ///
    /// `message` must already be validated non-empty.
    pub fn open(&self, request_id: String, message: String) -> FragmentStream {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let relay = self.clone();

        tokio::spawn(async move {
            let (outcome, fragments) = relay.run(&request_id, &message, &tx).await;
            relay.metrics.record_outcome(outcome);

            match outcome {
                RelayOutcome::Complete | RelayOutcome::Cancelled => {
                    info!(request_id, fragments, outcome = %outcome, "Relay finished")
                }
                _ => warn!(request_id, fragments, outcome = %outcome, "Relay finished"),
            }
        });

        ReceiverStream::new(rx)
    }

    async fn run(
        &self,
        request_id: &str,
        message: &str,
        tx: &mpsc::Sender<String>,
    ) -> (RelayOutcome, usize) {
        let provider = match &self.provider {
            ProviderHandle::Available(provider) => provider.clone(),
            ProviderHandle::Unavailable(reason) => {
                warn!(request_id, reason = %reason, "Provider client unavailable");
                let _ = tx.send(CLIENT_UNAVAILABLE.to_string()).await;
                return (RelayOutcome::ClientUnavailable, 0);
            }
        };

        let Some(api_key) = self.settings.credential.as_deref() else {
            let _ = tx
                .send(missing_credential_message(&self.settings.credential_env))
                .await;
            return (RelayOutcome::MissingCredential, 0);
        };

        let request = ProviderRequest::for_message(
            &self.settings.model,
            api_key,
            &self.settings.persona,
            message,
            self.settings.params,
        );

        debug!(request_id, provider = provider.name(), model = %request.model, "Relay streaming");

        let mut upstream = tokio::select! {
            _ = tx.closed() => return (RelayOutcome::Cancelled, 0),
            opened = provider.stream(request) => match opened {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = tx.send(stream_error_fragment(&e)).await;
                    return (RelayOutcome::Failed, 0);
                }
            },
        };

        let mut fragments = 0;
        loop {
            let item = tokio::select! {
                _ = tx.closed() => return (RelayOutcome::Cancelled, fragments),
                item = upstream.next() => item,
            };

            match item {
                None => return (RelayOutcome::Complete, fragments),
                Some(Ok(chunk)) => {
                    let Some(text) = chunk.text.filter(|t| !t.is_empty()) else {
                        continue;
                    };
                    if tx.send(text).await.is_err() {
                        return (RelayOutcome::Cancelled, fragments);
                    }
                    fragments += 1;
                    self.metrics.record_fragment();
                }
                Some(Err(e)) => {
                    let _ = tx.send(stream_error_fragment(&e)).await;
                    return (RelayOutcome::Failed, fragments);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_messages() {
        assert_eq!(
            missing_credential_message("GEMINI_API_KEY"),
            "Error: GEMINI_API_KEY not set in environment."
        );
        let err = ProviderError::Api("boom".to_string());
        assert_eq!(stream_error_fragment(&err), "\n\n[Stream error: boom]");
    }

    #[tokio::test]
    async fn test_unavailable_client_yields_single_fragment() {
        let relay = Relay::new(
            ProviderHandle::Unavailable("tls backend missing".to_string()),
            RelaySettings::from_config(&Config::default(), Some("key".to_string())),
            Metrics::new().unwrap(),
        );

        let fragments: Vec<String> = relay.open("t".to_string(), "hi".to_string()).collect().await;
        assert_eq!(fragments, vec![CLIENT_UNAVAILABLE.to_string()]);
        assert!(!relay.provider_available());
    }
}
