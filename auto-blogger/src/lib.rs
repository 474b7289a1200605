pub mod types;
pub mod retry;
pub mod fetcher;
pub mod parser;
pub mod sources;
pub mod traits;
pub mod llm_adapter;
pub mod body;
pub mod publisher;
pub mod selector;
pub mod titles;
pub mod pipeline;

pub use types::*;
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use sources::GoogleTrendsSource;
pub use llm_adapter::OpenAiAdapter;
pub use body::IllustratedBodyWriter;
pub use publisher::BloggerPublisher;
pub use selector::{Selection, TopicSelector};
pub use titles::{TitleFailure, TitleGenerator, UniqueTitle};
pub use traits::{ArticleSource, LogProgress, ProgressEvent, ProgressLevel, ProgressLog, ProgressSink};
pub use pipeline::{AbortReason, ContentPipeline, PipelineOutcome, PublishedPost, RunRequest, Services};
pub use interfaces::DedupeLedger;
