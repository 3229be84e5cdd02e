//! Shared test fixtures: a scripted provider standing in for Gemini.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::Notify;

use joi_companion::config::Config;
use joi_companion::metrics::Metrics;
use joi_companion::provider::{
    ChatProvider, ChunkStream, ProviderError, ProviderHandle, ProviderRequest, StreamChunk,
};
use joi_companion::relay::{Relay, RelaySettings};
use joi_companion::server::api::AppState;

/// One step of a scripted upstream stream.
#[derive(Clone)]
pub enum Step {
    Text(String),
    /// Metadata-only chunk with no text.
    Empty,
    Fail(String),
    /// Pause until the gate is notified.
    Wait(Arc<Notify>),
}

pub fn text(s: &str) -> Step {
    Step::Text(s.to_string())
}

/// Provider that replays a fixed script and records every request.
pub struct ScriptedProvider {
    script: Vec<Step>,
    open_error: Option<String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script,
            open_error: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing_to_open(message: &str) -> Arc<Self> {
        Arc::new(Self {
            script: Vec::new(),
            open_error: Some(message.to_string()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkStream, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        if let Some(message) = &self.open_error {
            return Err(ProviderError::Api(message.clone()));
        }

        // Echo the user's message when the script is empty.
        let script = if self.script.is_empty() {
            vec![Step::Text(format!("echo: {}", request.turns[1].text))]
        } else {
            self.script.clone()
        };

        let chunks = stream::unfold(script.into_iter(), |mut steps| async move {
            loop {
                match steps.next() {
                    None => return None,
                    Some(Step::Text(t)) => return Some((Ok(StreamChunk::text(t)), steps)),
                    Some(Step::Empty) => return Some((Ok(StreamChunk::empty()), steps)),
                    Some(Step::Fail(m)) => return Some((Err(ProviderError::Api(m)), steps)),
                    Some(Step::Wait(gate)) => gate.notified().await,
                }
            }
        });

        Ok(chunks.boxed())
    }
}

pub fn settings(credential: Option<&str>) -> RelaySettings {
    RelaySettings::from_config(&Config::default(), credential.map(str::to_string))
}

pub fn relay_with(provider: Arc<ScriptedProvider>, credential: Option<&str>) -> Relay {
    Relay::new(
        ProviderHandle::Available(provider),
        settings(credential),
        Metrics::new().unwrap(),
    )
}

pub fn app_state(provider: ProviderHandle, credential: Option<&str>) -> Arc<AppState> {
    let metrics = Metrics::new().unwrap();
    Arc::new(AppState {
        relay: Relay::new(provider, settings(credential), metrics.clone()),
        metrics,
        start_time: Instant::now(),
    })
}
