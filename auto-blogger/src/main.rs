use anyhow::{bail, Context};
use auto_blogger::parser::is_url;
use auto_blogger::{
    BloggerConfig, ContentPipeline, DedupeLedger, Fetcher, GoogleTrendsSource, ImagePolicy, PipelineOutcome,
    LogProgress, ProgressEvent, ProgressLevel, ProgressSink, RunRequest, Selection, Services, TopicSelector,
};
use clap::{Args, Parser, Subcommand};
use interfaces::baseline::candidates_or_fallback;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Writes and publishes draft blog posts from trends or your own content")]
struct Cli {
    /// Ledger database path (overrides DATABASE_NAME)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Target blog (overrides BLOGGER_BLOG_ID)
    #[arg(long, global = true)]
    blog_id: Option<String>,

    /// Trends region code (overrides TRENDS_GEO)
    #[arg(long, global = true)]
    geo: Option<String>,

    /// `required` or `best-effort` (overrides IMAGE_POLICY)
    #[arg(long, global = true)]
    image_policy: Option<ImagePolicy>,

    /// Send progress to the log instead of stdout, for scheduled runs
    #[arg(long, global = true)]
    log_progress: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the ledger if it does not exist
    Init,
    /// List recorded titles, newest first
    History {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: u32,
    },
    /// Show trending topics and which one would be picked next
    Trending,
    /// Publish a post about a trending topic
    Post,
    /// Publish a post expanded from supplied content
    Content {
        #[command(flatten)]
        source: ContentSource,

        /// Use this title instead of generating one
        #[arg(long)]
        title: Option<String>,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct ContentSource {
    /// Raw text to expand
    #[arg(long)]
    text: Option<String>,

    /// Article to fetch and expand
    #[arg(long)]
    url: Option<String>,

    /// File whose contents are expanded
    #[arg(long)]
    file: Option<PathBuf>,
}

impl ContentSource {
    async fn load(self) -> anyhow::Result<String> {
        if let Some(text) = self.text {
            return Ok(text);
        }
        if let Some(url) = self.url {
            if !is_url(&url) {
                bail!("--url must start with http:// or https://, got '{}'", url);
            }
            return Ok(url);
        }
        if let Some(path) = self.file {
            return tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()));
        }
        bail!("one of --text, --url or --file is required")
    }
}

/// Prints progress lines for an interactive run.
struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn emit(&self, event: ProgressEvent) {
        let marker = match event.level {
            ProgressLevel::Info => " ",
            ProgressLevel::Success => "+",
            ProgressLevel::Warning => "!",
            ProgressLevel::Error => "x",
        };
        println!("{} {}", marker, event);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut config = BloggerConfig::from_env()?;
    if let Some(database) = cli.database {
        config.database_path = database;
    }
    if let Some(blog_id) = cli.blog_id {
        config.blog_id = Some(blog_id);
    }
    if let Some(geo) = cli.geo {
        config.trends_geo = geo;
    }
    if let Some(policy) = cli.image_policy {
        config.image_policy = policy;
    }

    let ledger = DedupeLedger::new(&config.database_path);
    let progress: &dyn ProgressSink = if cli.log_progress { &LogProgress } else { &ConsoleProgress };

    match cli.command {
        Command::Init => {
            ledger.initialize().await?;
            let count = ledger.count().await?;
            println!("Ledger ready at {} ({} entries)", ledger.path().display(), count);
            Ok(ExitCode::SUCCESS)
        }
        Command::History { limit } => {
            ledger.initialize().await?;
            let entries = ledger.entries(limit).await?;
            if entries.is_empty() {
                println!("No posts recorded yet.");
            }
            for entry in entries {
                println!("{:>6}  {:<6}  {}", entry.id, entry.status.as_str(), entry.title);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Trending => show_trending(&config, &ledger).await,
        Command::Post => run_pipeline(&config, ledger, RunRequest::FromTopic, progress).await,
        Command::Content { source, title } => {
            let content = source.load().await?;
            let request = RunRequest::FromContent {
                content,
                custom_title: title,
            };
            run_pipeline(&config, ledger, request, progress).await
        }
    }
}

async fn show_trending(config: &BloggerConfig, ledger: &DedupeLedger) -> anyhow::Result<ExitCode> {
    let fetcher = Arc::new(Fetcher::new(config.fetch.clone())?);
    let source = GoogleTrendsSource::new(fetcher, config.trends_geo.clone());
    info!("Fetching trending topics from {}", source.feed_url());

    let (topics, used_fallback) = candidates_or_fallback(&source).await?;
    if used_fallback {
        println!("Trends source is rate limited; showing fallback keywords.");
    }
    if topics.is_empty() {
        println!("No trending topics found.");
        return Ok(ExitCode::SUCCESS);
    }
    for topic in &topics {
        println!("  {}", topic);
    }

    ledger.initialize().await?;
    let recent = ledger.recent_topics(config.pipeline.recent_topic_limit).await;
    match TopicSelector::new(&config.pipeline.stop_keywords).select(&topics, &recent) {
        Some(Selection::Fresh(topic)) => println!("Next topic: {}", topic),
        Some(Selection::Fallback(topic)) => println!("Next topic: {} (all candidates overlap recent posts)", topic),
        None => println!("No relevant trending topics after filtering."),
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_pipeline(
    config: &BloggerConfig,
    ledger: DedupeLedger,
    request: RunRequest,
    progress: &dyn ProgressSink,
) -> anyhow::Result<ExitCode> {
    let blog_id = config.require_blog_id()?;
    let services = Services::from_config(config)?;
    let pipeline = ContentPipeline::new(config.pipeline.clone(), Some(blog_id), ledger, services)?;

    let outcome = pipeline.run(request, progress).await?;
    match &outcome {
        PipelineOutcome::Done(post) => {
            println!("Draft created: {} (post id {})", post.title, post.receipt.post_id);
            if let Some(url) = &post.receipt.url {
                println!("  {}", url);
            }
            if !post.recorded {
                warn!("'{}' was published but this run did not record it in the ledger", post.key);
            }
        }
        PipelineOutcome::Aborted { state, reason } => {
            println!("Stopped during {}: {}", state, reason);
        }
    }

    Ok(if outcome.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
