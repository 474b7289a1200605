#![allow(dead_code)]

use async_trait::async_trait;
use auto_blogger::{ArticleSource, BloggerError, PipelineConfig, Result, Services};
use interfaces::defs::{
    BodyGenerationService, PublishReceipt, PublishService, Seed, ServiceError, TitleGenerationService,
    TrendsSource,
};
use interfaces::{DedupeLedger, LedgerStatus, NormalizedTitle, Title, Topic};
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use tempfile::TempDir;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// A ledger in its own temp directory; keep the `TempDir` alive.
pub async fn temp_ledger() -> (TempDir, DedupeLedger) {
    let dir = tempfile::tempdir().expect("temp dir");
    let ledger = DedupeLedger::new(dir.path().join("data").join("blogs.db"));
    ledger.initialize().await.expect("ledger init");
    (dir, ledger)
}

pub async fn seed_ledger(ledger: &DedupeLedger, titles: &[&str]) {
    for title in titles {
        ledger
            .add(&NormalizedTitle::new(title), LedgerStatus::Posted)
            .await
            .expect("seed ledger");
    }
}

pub fn fast_config() -> PipelineConfig {
    PipelineConfig::default()
}

/// Hands out scripted titles in order, repeating the last one.
pub struct ScriptedTitles {
    script: Mutex<VecDeque<std::result::Result<Title, ServiceError>>>,
    last: Mutex<Option<Title>>,
    calls: AtomicUsize,
    seen_seeds: Mutex<Vec<Seed>>,
    seen_excludes: Mutex<Vec<BTreeSet<NormalizedTitle>>>,
}

impl ScriptedTitles {
    pub fn new(script: Vec<std::result::Result<&str, ServiceError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().map(|r| r.map(str::to_string)).collect()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            seen_seeds: Mutex::new(Vec::new()),
            seen_excludes: Mutex::new(Vec::new()),
        }
    }

    pub fn always(title: &str) -> Self {
        Self::new(vec![Ok(title)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seeds(&self) -> Vec<Seed> {
        self.seen_seeds.lock().unwrap().clone()
    }

    pub fn excludes(&self) -> Vec<BTreeSet<NormalizedTitle>> {
        self.seen_excludes.lock().unwrap().clone()
    }
}

#[async_trait]
impl TitleGenerationService for ScriptedTitles {
    async fn suggest_title(
        &self,
        seed: &Seed,
        exclude: &BTreeSet<NormalizedTitle>,
    ) -> std::result::Result<Title, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_seeds.lock().unwrap().push(seed.clone());
        self.seen_excludes.lock().unwrap().push(exclude.clone());

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(title)) => {
                *self.last.lock().unwrap() = Some(title.clone());
                Ok(title)
            }
            Some(Err(e)) => Err(e),
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| ServiceError::Fatal("script exhausted".to_string())),
        }
    }
}

pub struct StaticTrends {
    result: Mutex<Option<std::result::Result<Vec<Topic>, ServiceError>>>,
}

impl StaticTrends {
    pub fn topics(topics: &[&str]) -> Self {
        Self {
            result: Mutex::new(Some(Ok(topics.iter().map(|t| t.to_string()).collect()))),
        }
    }

    pub fn failing(error: ServiceError) -> Self {
        Self {
            result: Mutex::new(Some(Err(error))),
        }
    }
}

#[async_trait]
impl TrendsSource for StaticTrends {
    fn source_name(&self) -> String {
        "static trends".to_string()
    }

    async fn fetch_candidates(&self) -> std::result::Result<Vec<Topic>, ServiceError> {
        self.result
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Returns a fixed body and remembers what it was asked to write.
#[derive(Default)]
pub struct FixedBody {
    fail: bool,
    calls: Mutex<Vec<(Title, Option<String>)>>,
    /// Written to the ledger mid-generation, as a concurrent run would.
    race_with: Option<(DedupeLedger, String)>,
}

impl FixedBody {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn racing(ledger: DedupeLedger, title: &str) -> Self {
        Self {
            race_with: Some((ledger, title.to_string())),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(Title, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BodyGenerationService for FixedBody {
    async fn write_body(&self, title: &str, source_content: Option<&str>) -> std::result::Result<String, ServiceError> {
        self.calls
            .lock()
            .unwrap()
            .push((title.to_string(), source_content.map(str::to_string)));

        if let Some((ledger, other)) = &self.race_with {
            ledger
                .add(&NormalizedTitle::new(other), LedgerStatus::Posted)
                .await
                .map_err(|e| ServiceError::Fatal(e.to_string()))?;
        }
        if self.fail {
            return Err(ServiceError::Transient("model overloaded".to_string()));
        }
        Ok(format!("<h2>{}</h2><p>Body</p>", title))
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    fail: bool,
    posts: Mutex<Vec<(Title, String, String)>>,
    /// Recorded in the ledger while the post is going out.
    race_with: Option<(DedupeLedger, String)>,
}

impl RecordingPublisher {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn racing(ledger: DedupeLedger, title: &str) -> Self {
        Self {
            race_with: Some((ledger, title.to_string())),
            ..Self::default()
        }
    }

    pub fn posts(&self) -> Vec<(Title, String, String)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PublishService for RecordingPublisher {
    async fn publish(
        &self,
        title: &str,
        body: &str,
        target_id: &str,
    ) -> std::result::Result<PublishReceipt, ServiceError> {
        if let Some((ledger, other)) = &self.race_with {
            ledger
                .add(&NormalizedTitle::new(other), LedgerStatus::Posted)
                .await
                .map_err(|e| ServiceError::Fatal(e.to_string()))?;
        }
        if self.fail {
            return Err(ServiceError::Fatal("HTTP 403 from blogger".to_string()));
        }
        let mut posts = self.posts.lock().unwrap();
        posts.push((title.to_string(), body.to_string(), target_id.to_string()));
        Ok(PublishReceipt {
            post_id: format!("post-{}", posts.len()),
            url: Some(format!("https://example.blogspot.com/{}", posts.len())),
            status: Some("DRAFT".to_string()),
        })
    }
}

pub struct StaticArticles {
    text: Option<String>,
    requested: Mutex<Vec<String>>,
}

impl StaticArticles {
    pub fn returning(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            text: None,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArticleSource for StaticArticles {
    async fn fetch_article(&self, url: &str) -> Result<String> {
        self.requested.lock().unwrap().push(url.to_string());
        self.text.clone().ok_or_else(|| BloggerError::HttpStatus {
            status: 404,
            url: url.to_string(),
            message: "not found".to_string(),
        })
    }
}

/// Shared handles to every double so tests can inspect them after a run.
pub struct Doubles {
    pub trends: Arc<StaticTrends>,
    pub titles: Arc<ScriptedTitles>,
    pub bodies: Arc<FixedBody>,
    pub publisher: Arc<RecordingPublisher>,
    pub articles: Arc<StaticArticles>,
}

impl Doubles {
    pub fn new(trends: StaticTrends, titles: ScriptedTitles) -> Self {
        Self {
            trends: Arc::new(trends),
            titles: Arc::new(titles),
            bodies: Arc::new(FixedBody::ok()),
            publisher: Arc::new(RecordingPublisher::ok()),
            articles: Arc::new(StaticArticles::returning("Fetched article text about tools.")),
        }
    }

    pub fn with_bodies(mut self, bodies: FixedBody) -> Self {
        self.bodies = Arc::new(bodies);
        self
    }

    pub fn with_publisher(mut self, publisher: RecordingPublisher) -> Self {
        self.publisher = Arc::new(publisher);
        self
    }

    pub fn with_articles(mut self, articles: StaticArticles) -> Self {
        self.articles = Arc::new(articles);
        self
    }

    pub fn services(&self) -> Services {
        Services {
            trends: self.trends.clone(),
            titles: self.titles.clone(),
            bodies: self.bodies.clone(),
            publisher: self.publisher.clone(),
            articles: self.articles.clone(),
        }
    }
}
