use crate::parser::extract_main_content;
use crate::retry::with_fixed_retry;
use crate::traits::ArticleSource;
use crate::types::{BloggerError, FetchConfig, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

/// Turns a non-2xx response into an error that carries the status and a
/// short excerpt of the body.
pub(crate) async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    let message: String = body.chars().take(300).collect();
    Err(BloggerError::HttpStatus {
        status: status.as_u16(),
        url,
        message: if message.is_empty() {
            status.canonical_reason().unwrap_or("Unknown").to_string()
        } else {
            message
        },
    })
}

const BYTES_PER_MB: usize = 1024 * 1024;

/// Rejects bodies larger than `max_mb`, whether the size came from a
/// `Content-Length` header or from the body that was actually read.
fn check_size(bytes: usize, max_mb: usize) -> Result<()> {
    if bytes > max_mb.saturating_mul(BYTES_PER_MB) {
        return Err(BloggerError::ContentTooLarge {
            size_mb: bytes.div_ceil(BYTES_PER_MB),
        });
    }
    Ok(())
}

pub(crate) fn build_client(config: &FetchConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_seconds))
        .gzip(true)
        .deflate(true)
        .brotli(true)
        .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
        .build()?;
    Ok(client)
}

/// Plain GET fetcher for feeds and article pages.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self { client, config })
    }

    /// Fetches `url` as text, retrying transient failures. A 429 surfaces as
    /// [`BloggerError::RateLimited`] without further attempts.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let parsed = Url::parse(url)?;
        let policy = self.config.retry_policy();
        let label = format!("fetch {}", parsed);
        let parsed = &parsed;
        with_fixed_retry(&policy, &label, move || self.fetch_once(parsed)).await
    }

    async fn fetch_once(&self, url: &Url) -> Result<String> {
        let start_time = Instant::now();
        debug!("Fetching {}", url);

        let response = self.client.get(url.clone()).send().await?;
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(BloggerError::RateLimited { url: url.to_string() });
        }
        let response = ensure_success(response).await?;

        if let Some(content_length) = response.content_length() {
            let content_length = usize::try_from(content_length).unwrap_or(usize::MAX);
            check_size(content_length, self.config.max_content_size_mb)?;
        }

        // Chunked responses carry no length up front.
        let content = response.text().await?;
        check_size(content.len(), self.config.max_content_size_mb)?;
        info!(
            "Fetched {} ({} bytes in {}ms)",
            url,
            content.len(),
            start_time.elapsed().as_millis()
        );
        Ok(content)
    }
}

#[async_trait]
impl ArticleSource for Fetcher {
    async fn fetch_article(&self, url: &str) -> Result<String> {
        let html = self.fetch_text(url).await?;
        let text = extract_main_content(&html);
        debug!("Extracted {} characters of article text from {}", text.len(), url);
        Ok(text)
    }
}
