use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// Use the interfaces crate for core types
pub use interfaces::defs::{
    normalize_title, LedgerEntry, LedgerStatus, NormalizedTitle, PublishReceipt, Seed, ServiceError, Title,
    Topic,
};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_content_size_mb: usize,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Auto-Blogger/1.0".to_string(),
            timeout_seconds: 60,
            max_retries: 3,
            retry_delay_seconds: 2,
            max_content_size_mb: 10,
            max_redirects: 5,
        }
    }
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            delay: Duration::from_secs(self.retry_delay_seconds),
        }
    }
}

/// Fixed number of attempts with a fixed pause between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// What to do when the header image cannot be generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImagePolicy {
    /// Fail body generation, discarding the written text.
    #[default]
    Required,
    /// Publish the text without an image.
    BestEffort,
}

impl FromStr for ImagePolicy {
    type Err = BloggerError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "required" => Ok(ImagePolicy::Required),
            "best-effort" | "best_effort" | "besteffort" => Ok(ImagePolicy::BestEffort),
            other => Err(BloggerError::General(format!(
                "Unknown image policy '{}' (expected 'required' or 'best-effort')",
                other
            ))),
        }
    }
}

impl fmt::Display for ImagePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImagePolicy::Required => f.write_str("required"),
            ImagePolicy::BestEffort => f.write_str("best-effort"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_title_attempts: u32,
    pub recent_topic_limit: u32,
    pub stop_keywords: Vec<String>,
    /// Length of the content prefix used to label a from-content run.
    pub topic_prefix_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_title_attempts: crate::titles::DEFAULT_MAX_ATTEMPTS,
            recent_topic_limit: 5,
            stop_keywords: vec!["news".to_string()],
            topic_prefix_chars: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub image_model: String,
    pub image_size: String,
    pub title_max_tokens: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-3.5-turbo".to_string(),
            image_model: "dall-e-3".to_string(),
            image_size: "1024x1024".to_string(),
            title_max_tokens: 150,
        }
    }
}

/// Everything a run needs, gathered once in `main` and passed down.
#[derive(Debug, Clone)]
pub struct BloggerConfig {
    pub blog_id: Option<String>,
    pub token_json: Option<String>,
    pub database_path: PathBuf,
    pub trends_geo: String,
    pub image_policy: ImagePolicy,
    pub openai: OpenAiConfig,
    pub fetch: FetchConfig,
    pub pipeline: PipelineConfig,
}

impl Default for BloggerConfig {
    fn default() -> Self {
        Self {
            blog_id: None,
            token_json: None,
            database_path: PathBuf::from("data/blogs.db"),
            trends_geo: "IN".to_string(),
            image_policy: ImagePolicy::Required,
            openai: OpenAiConfig::default(),
            fetch: FetchConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl BloggerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable lookup. Blank values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        config.blog_id = get("BLOGGER_BLOG_ID");
        config.token_json = get("GCP_TOKEN_JSON");
        if let Some(path) = get("DATABASE_NAME") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(geo) = get("TRENDS_GEO") {
            config.trends_geo = geo;
        }
        if let Some(policy) = get("IMAGE_POLICY") {
            config.image_policy = policy.parse()?;
        }

        config.openai.api_key = get("OPENAI_API_KEY");
        if let Some(base_url) = get("OPENAI_BASE_URL") {
            config.openai.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(model) = get("OPENAI_CHAT_MODEL") {
            config.openai.chat_model = model;
        }
        if let Some(model) = get("OPENAI_IMAGE_MODEL") {
            config.openai.image_model = model;
        }

        Ok(config)
    }

    pub fn require_blog_id(&self) -> Result<&str> {
        self.blog_id
            .as_deref()
            .ok_or_else(|| BloggerError::ConfigurationMissing("BLOGGER_BLOG_ID".to_string()))
    }

    pub fn require_token_json(&self) -> Result<&str> {
        self.token_json
            .as_deref()
            .ok_or_else(|| BloggerError::ConfigurationMissing("GCP_TOKEN_JSON".to_string()))
    }
}

/// Where a run is in the publish workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    PreparingContent,
    SelectingTopic,
    GeneratingTitle,
    GeneratingBody,
    Publishing,
    Recording,
    Done,
    Aborted,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::PreparingContent => "preparing-content",
            PipelineState::SelectingTopic => "selecting-topic",
            PipelineState::GeneratingTitle => "generating-title",
            PipelineState::GeneratingBody => "generating-body",
            PipelineState::Publishing => "publishing",
            PipelineState::Recording => "recording",
            PipelineState::Done => "done",
            PipelineState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BloggerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}: {message}")]
    HttpStatus { status: u16, url: String, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Rate limited by {url}")]
    RateLimited { url: String },

    #[error("Content size exceeds limit: {size_mb}MB")]
    ContentTooLarge { size_mb: usize },

    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("General error: {0}")]
    General(String),
}

impl BloggerError {
    /// Network hiccups and server-side errors; worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            BloggerError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            BloggerError::HttpStatus { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            BloggerError::Service(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<BloggerError> for ServiceError {
    fn from(error: BloggerError) -> Self {
        match error {
            BloggerError::RateLimited { url } => ServiceError::RateLimited(url),
            BloggerError::ConfigurationMissing(name) => ServiceError::ConfigurationMissing(name),
            BloggerError::Service(inner) => inner,
            other if other.is_transient() => ServiceError::Transient(other.to_string()),
            other => ServiceError::Fatal(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, BloggerError>;
