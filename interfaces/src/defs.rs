use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A short subject string that drives generation.
pub type Topic = String;

/// A human-readable headline candidate.
pub type Title = String;

/// Lower-cases `title` and drops every character outside `[a-z0-9]`.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Canonical dedupe key derived from a title.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedTitle(String);

impl NormalizedTitle {
    pub fn new(title: &str) -> Self {
        Self(normalize_title(title))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NormalizedTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedTitle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// What a title is generated from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Seed {
    Topic(Topic),
    Content(String),
}

impl Seed {
    pub fn text(&self) -> &str {
        match self {
            Seed::Topic(topic) => topic,
            Seed::Content(content) => content,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerStatus {
    Posted,
    Failed,
}

impl LedgerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerStatus::Posted => "posted",
            LedgerStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "posted" => Ok(LedgerStatus::Posted),
            "failed" => Ok(LedgerStatus::Failed),
            other => Err(format!("unknown ledger status '{}'", other)),
        }
    }
}

/// One row of the dedupe ledger. Entries are append-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub title: NormalizedTitle,
    pub status: LedgerStatus,
}

/// What the publishing API hands back for an accepted post.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub post_id: String,
    pub url: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("{0}")]
    Fatal(String),

    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),
}

impl ServiceError {
    /// Whether another attempt could plausibly succeed. Rate limits are not
    /// retried; callers substitute or give up instead.
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Transient(_))
    }
}

// Object style note:
// Implementations of these traits wrap one external dependency each and are
// invoked strictly one at a time by the content pipeline. Retrying transient
// failures is the implementation's job; the pipeline treats any error it
// receives as final for that step.

#[async_trait]
pub trait TrendsSource: Send + Sync {
    fn source_name(&self) -> String;

    /// Candidate topics in the order the source ranks them.
    async fn fetch_candidates(&self) -> Result<Vec<Topic>, ServiceError>;
}

#[async_trait]
pub trait TitleGenerationService: Send + Sync {
    /// Suggest one title for `seed`, steering away from `exclude`.
    async fn suggest_title(
        &self,
        seed: &Seed,
        exclude: &BTreeSet<NormalizedTitle>,
    ) -> Result<Title, ServiceError>;
}

#[async_trait]
pub trait BodyGenerationService: Send + Sync {
    /// Write the HTML body for `title`, optionally expanding `source_content`.
    async fn write_body(
        &self,
        title: &str,
        source_content: Option<&str>,
    ) -> Result<String, ServiceError>;
}

#[async_trait]
pub trait ImageGenerationService: Send + Sync {
    /// Returns the URL of the generated image.
    async fn generate_image(&self, prompt: &str) -> Result<String, ServiceError>;
}

#[async_trait]
pub trait PublishService: Send + Sync {
    async fn publish(
        &self,
        title: &str,
        body: &str,
        target_id: &str,
    ) -> Result<PublishReceipt, ServiceError>;
}
