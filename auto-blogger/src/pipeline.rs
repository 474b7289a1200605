use crate::body::IllustratedBodyWriter;
use crate::llm_adapter::OpenAiAdapter;
use crate::parser::is_url;
use crate::publisher::BloggerPublisher;
use crate::selector::{Selection, TopicSelector};
use crate::sources::GoogleTrendsSource;
use crate::titles::{TitleFailure, TitleGenerator, UniqueTitle};
use crate::traits::{ArticleSource, ProgressEvent, ProgressLevel, ProgressSink};
use crate::types::{
    BloggerConfig, BloggerError, LedgerStatus, NormalizedTitle, PipelineConfig, PipelineState, PublishReceipt,
    Result, Seed, Title, Topic,
};
use crate::Fetcher;
use interfaces::baseline::candidates_or_fallback;
use interfaces::defs::{BodyGenerationService, PublishService, TitleGenerationService, TrendsSource};
use interfaces::DedupeLedger;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// The external collaborators a run talks to.
pub struct Services {
    pub trends: Arc<dyn TrendsSource>,
    pub titles: Arc<dyn TitleGenerationService>,
    pub bodies: Arc<dyn BodyGenerationService>,
    pub publisher: Arc<dyn PublishService>,
    pub articles: Arc<dyn ArticleSource>,
}

impl Services {
    /// Wires the live HTTP-backed services. Missing credentials fail here,
    /// before any request is made.
    pub fn from_config(config: &BloggerConfig) -> Result<Self> {
        let fetcher = Arc::new(Fetcher::new(config.fetch.clone())?);
        let openai = Arc::new(OpenAiAdapter::new(config.openai.clone(), &config.fetch)?);
        let publisher = BloggerPublisher::new(config.require_token_json()?, &config.fetch)?;
        info!("Using text generation adapter: {}", openai.adapter_name());

        Ok(Self {
            trends: Arc::new(GoogleTrendsSource::new(fetcher.clone(), config.trends_geo.clone())),
            titles: openai.clone(),
            bodies: Arc::new(IllustratedBodyWriter::new(openai.clone(), openai, config.image_policy)),
            publisher: Arc::new(publisher),
            articles: fetcher,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunRequest {
    /// Pick a trending topic and write about it.
    FromTopic,
    /// Expand supplied text, or the article behind a supplied URL.
    FromContent {
        content: String,
        custom_title: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPost {
    pub title: Title,
    pub key: NormalizedTitle,
    pub receipt: PublishReceipt,
    /// False when the post went out but this run wrote no ledger entry,
    /// either because the write failed or another writer got there first.
    pub recorded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbortReason {
    #[error("Error fetching trending topics: {0}")]
    TrendsUnavailable(String),

    #[error("No trending topics found")]
    NoTrendingTopics,

    #[error("No relevant trending topics after filtering")]
    NoSuitableTopic,

    #[error("Failed to fetch content from URL {url}: {reason}")]
    ContentFetch { url: String, reason: String },

    #[error("No content to process")]
    EmptyContent,

    #[error("Blog with title '{title}' (normalized: '{key}') already exists. Skipping.")]
    DuplicateTitle { title: Title, key: NormalizedTitle },

    #[error(transparent)]
    TitleGeneration(#[from] TitleFailure),

    #[error("Failed to generate blog content for '{title}': {reason}")]
    BodyGeneration { title: Title, reason: String },

    #[error("Failed to post blog with title '{title}': {reason}")]
    PublishFailed { title: Title, reason: String },
}

impl AbortReason {
    /// Skips that leave nothing to fix are not failures.
    pub fn is_failure(&self) -> bool {
        !matches!(
            self,
            AbortReason::NoTrendingTopics | AbortReason::NoSuitableTopic | AbortReason::DuplicateTitle { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Done(PublishedPost),
    Aborted {
        /// The state the run was in when it stopped.
        state: PipelineState,
        reason: AbortReason,
    },
}

impl PipelineOutcome {
    pub fn is_failure(&self) -> bool {
        match self {
            PipelineOutcome::Done(_) => false,
            PipelineOutcome::Aborted { reason, .. } => reason.is_failure(),
        }
    }

    pub fn published(&self) -> Option<&PublishedPost> {
        match self {
            PipelineOutcome::Done(post) => Some(post),
            PipelineOutcome::Aborted { .. } => None,
        }
    }
}

struct Abort {
    state: PipelineState,
    reason: AbortReason,
}

impl Abort {
    fn new(state: PipelineState, reason: AbortReason) -> Self {
        Self { state, reason }
    }
}

type Step<T> = std::result::Result<T, Abort>;

fn emit(progress: &dyn ProgressSink, state: PipelineState, level: ProgressLevel, message: impl Into<String>) {
    progress.emit(ProgressEvent::new(state, level, message));
}

/// Topic or content in, one draft post and one ledger entry out.
pub struct ContentPipeline {
    config: PipelineConfig,
    blog_id: String,
    ledger: DedupeLedger,
    services: Services,
    selector: TopicSelector,
}

impl ContentPipeline {
    pub fn new(
        config: PipelineConfig,
        blog_id: Option<&str>,
        ledger: DedupeLedger,
        services: Services,
    ) -> Result<Self> {
        let blog_id = blog_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| BloggerError::ConfigurationMissing("BLOGGER_BLOG_ID".to_string()))?
            .to_string();
        let selector = TopicSelector::new(&config.stop_keywords);

        Ok(Self {
            config,
            blog_id,
            ledger,
            services,
            selector,
        })
    }

    pub fn ledger(&self) -> &DedupeLedger {
        &self.ledger
    }

    /// Runs one request to completion. `Err` is reserved for a ledger that
    /// cannot be initialized; every other stop is reported in the outcome.
    pub async fn run(&self, request: RunRequest, progress: &dyn ProgressSink) -> Result<PipelineOutcome> {
        let run_id = Uuid::new_v4();
        let first_state = match request {
            RunRequest::FromTopic => PipelineState::SelectingTopic,
            RunRequest::FromContent { .. } => PipelineState::PreparingContent,
        };

        async move {
            emit(progress, first_state, ProgressLevel::Info, "Initializing...");
            self.ledger.initialize().await?;

            let outcome = match self.run_steps(request, progress).await {
                Ok(post) => {
                    info!("Successfully posted blog with title: {}", post.title);
                    emit(
                        progress,
                        PipelineState::Done,
                        ProgressLevel::Success,
                        format!("Successfully posted blog with title: {}", post.title),
                    );
                    PipelineOutcome::Done(post)
                }
                Err(Abort { state, reason }) => {
                    let level = if reason.is_failure() {
                        error!(%state, "Run aborted: {}", reason);
                        ProgressLevel::Error
                    } else {
                        info!(%state, "Run stopped: {}", reason);
                        ProgressLevel::Info
                    };
                    emit(progress, PipelineState::Aborted, level, reason.to_string());
                    PipelineOutcome::Aborted { state, reason }
                }
            };
            Ok::<_, BloggerError>(outcome)
        }
        .instrument(info_span!("pipeline_run", %run_id))
        .await
    }

    async fn run_steps(&self, request: RunRequest, progress: &dyn ProgressSink) -> Step<PublishedPost> {
        let existing = self.ledger.all_titles().await;

        let (title, source_content) = match request {
            RunRequest::FromTopic => {
                let topic = self.select_topic(progress).await?;
                emit(
                    progress,
                    PipelineState::SelectingTopic,
                    ProgressLevel::Info,
                    format!("Processing topic: {}", topic),
                );
                let unique = self.generate_title(&Seed::Topic(topic), &existing, progress).await?;
                (unique.title, None)
            }
            RunRequest::FromContent { content, custom_title } => {
                let content = self.prepare_content(content, progress).await?;
                let label: String = content.chars().take(self.config.topic_prefix_chars).collect();
                emit(
                    progress,
                    PipelineState::PreparingContent,
                    ProgressLevel::Info,
                    format!("Processing content: {}", label),
                );

                match custom_title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
                    Some(title) => {
                        emit(
                            progress,
                            PipelineState::GeneratingTitle,
                            ProgressLevel::Info,
                            format!("Using provided custom title: {}", title),
                        );
                        let key = NormalizedTitle::new(&title);
                        if self.ledger.exists(&key).await {
                            return Err(Abort::new(
                                PipelineState::GeneratingTitle,
                                AbortReason::DuplicateTitle { title, key },
                            ));
                        }
                        (title, Some(content))
                    }
                    None => {
                        emit(
                            progress,
                            PipelineState::GeneratingTitle,
                            ProgressLevel::Info,
                            "Generating attractive title from provided content...",
                        );
                        let seed = Seed::Content(content.clone());
                        let unique = self.generate_title(&seed, &existing, progress).await?;
                        (unique.title, Some(content))
                    }
                }
            }
        };

        let body = self.generate_body(&title, source_content.as_deref(), progress).await?;
        self.publish(title, body, progress).await
    }

    async fn select_topic(&self, progress: &dyn ProgressSink) -> Step<Topic> {
        let state = PipelineState::SelectingTopic;
        emit(
            progress,
            state,
            ProgressLevel::Info,
            format!("Fetching trending topics from {}...", self.services.trends.source_name()),
        );

        let candidates = match candidates_or_fallback(self.services.trends.as_ref()).await {
            Ok((candidates, false)) => candidates,
            Ok((candidates, true)) => {
                emit(
                    progress,
                    state,
                    ProgressLevel::Warning,
                    "Rate limit hit for trending topics. Using fallback keywords.",
                );
                candidates
            }
            Err(e) => return Err(Abort::new(state, AbortReason::TrendsUnavailable(e.to_string()))),
        };

        if candidates.is_empty() {
            return Err(Abort::new(state, AbortReason::NoTrendingTopics));
        }

        let recent = self.ledger.recent_topics(self.config.recent_topic_limit).await;
        info!("Recent topics: {:?}", recent);

        match self.selector.select(&candidates, &recent) {
            Some(Selection::Fresh(topic)) => Ok(topic),
            Some(Selection::Fallback(topic)) => {
                emit(
                    progress,
                    state,
                    ProgressLevel::Warning,
                    "All trending topics are similar to recently posted ones. Selecting the first available topic.",
                );
                Ok(topic)
            }
            None => Err(Abort::new(state, AbortReason::NoSuitableTopic)),
        }
    }

    async fn prepare_content(&self, content: String, progress: &dyn ProgressSink) -> Step<String> {
        let state = PipelineState::PreparingContent;

        let content = if is_url(&content) {
            let url = content.trim().to_string();
            emit(progress, state, ProgressLevel::Info, format!("Fetching content from URL: {}", url));
            match self.services.articles.fetch_article(&url).await {
                Ok(text) if !text.trim().is_empty() => {
                    emit(progress, state, ProgressLevel::Info, "Content fetched successfully.");
                    text
                }
                Ok(_) => {
                    return Err(Abort::new(
                        state,
                        AbortReason::ContentFetch {
                            url,
                            reason: "page has no readable text".to_string(),
                        },
                    ))
                }
                Err(e) => {
                    return Err(Abort::new(
                        state,
                        AbortReason::ContentFetch {
                            url,
                            reason: e.to_string(),
                        },
                    ))
                }
            }
        } else {
            content
        };

        if content.trim().is_empty() {
            return Err(Abort::new(state, AbortReason::EmptyContent));
        }
        Ok(content)
    }

    async fn generate_title(
        &self,
        seed: &Seed,
        existing: &BTreeSet<NormalizedTitle>,
        progress: &dyn ProgressSink,
    ) -> Step<UniqueTitle> {
        TitleGenerator::new(self.services.titles.as_ref(), &self.ledger)
            .generate_unique_title(seed, existing, self.config.max_title_attempts, progress)
            .await
            .map_err(|failure| Abort::new(PipelineState::GeneratingTitle, failure.into()))
    }

    async fn generate_body(
        &self,
        title: &str,
        source_content: Option<&str>,
        progress: &dyn ProgressSink,
    ) -> Step<String> {
        let state = PipelineState::GeneratingBody;
        emit(
            progress,
            state,
            ProgressLevel::Info,
            format!("Generating blog content for '{}'...", title),
        );

        self.services
            .bodies
            .write_body(title, source_content)
            .await
            .map_err(|e| {
                Abort::new(
                    state,
                    AbortReason::BodyGeneration {
                        title: title.to_string(),
                        reason: e.to_string(),
                    },
                )
            })
    }

    async fn publish(&self, title: Title, body: String, progress: &dyn ProgressSink) -> Step<PublishedPost> {
        let key = NormalizedTitle::new(&title);

        // The ledger may have changed while the body was being written.
        if self.ledger.exists(&key).await {
            return Err(Abort::new(
                PipelineState::Publishing,
                AbortReason::DuplicateTitle { title, key },
            ));
        }

        emit(
            progress,
            PipelineState::Publishing,
            ProgressLevel::Info,
            "Content generated. Posting to Blogger...",
        );

        match self.services.publisher.publish(&title, &body, &self.blog_id).await {
            Ok(receipt) => {
                let recorded = self.record(&key, LedgerStatus::Posted, progress).await;
                Ok(PublishedPost {
                    title,
                    key,
                    receipt,
                    recorded,
                })
            }
            Err(e) => {
                self.record(&key, LedgerStatus::Failed, progress).await;
                Err(Abort::new(
                    PipelineState::Publishing,
                    AbortReason::PublishFailed {
                        title,
                        reason: e.to_string(),
                    },
                ))
            }
        }
    }

    async fn record(&self, key: &NormalizedTitle, status: LedgerStatus, progress: &dyn ProgressSink) -> bool {
        emit(
            progress,
            PipelineState::Recording,
            ProgressLevel::Info,
            format!("Recording '{}' as {}", key, status),
        );

        match self.ledger.add(key, status).await {
            Ok(inserted) => inserted,
            Err(e) => {
                error!("Failed to record '{}' as {}: {}", key, status, e);
                emit(
                    progress,
                    PipelineState::Recording,
                    ProgressLevel::Error,
                    format!("Failed to record '{}' in the ledger: {}", key, e),
                );
                false
            }
        }
    }
}
