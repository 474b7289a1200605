use crate::types::{PipelineState, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Pulls the readable text of an article behind a URL.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn fetch_article(&self, url: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressLevel {
    Info,
    Warning,
    Error,
    Success,
}

/// One step-level status line emitted while a run progresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub state: PipelineState,
    pub level: ProgressLevel,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(state: PipelineState, level: ProgressLevel, message: impl Into<String>) -> Self {
        Self {
            state,
            level,
            message: message.into(),
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.state, self.message)
    }
}

/// Receives progress events so a front-end can render them.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Forwards progress to the tracing subscriber.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn emit(&self, event: ProgressEvent) {
        match event.level {
            ProgressLevel::Info | ProgressLevel::Success => info!(state = %event.state, "{}", event.message),
            ProgressLevel::Warning => warn!(state = %event.state, "{}", event.message),
            ProgressLevel::Error => error!(state = %event.state, "{}", event.message),
        }
    }
}

impl ProgressSink for mpsc::UnboundedSender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        // A dropped receiver only means nobody is watching.
        let _ = self.send(event);
    }
}

/// Keeps every event in memory, in order.
#[derive(Default)]
pub struct ProgressLog {
    events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events().into_iter().map(|event| event.message).collect()
    }
}

impl ProgressSink for ProgressLog {
    fn emit(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
