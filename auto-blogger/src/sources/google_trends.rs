use crate::parser::FeedParser;
use crate::types::{ServiceError, Topic};
use crate::Fetcher;
use async_trait::async_trait;
use interfaces::defs::TrendsSource;
use std::sync::Arc;
use tracing::info;

const TRENDS_RSS_URL: &str = "https://trends.google.com/trending/rss";

/// Daily search trends from the public Google Trends RSS feed.
pub struct GoogleTrendsSource {
    fetcher: Arc<Fetcher>,
    url: String,
    geo: String,
}

impl GoogleTrendsSource {
    pub fn new(fetcher: Arc<Fetcher>, geo: impl Into<String>) -> Self {
        let geo = geo.into();
        Self {
            fetcher,
            url: format!("{}?geo={}", TRENDS_RSS_URL, geo),
            geo,
        }
    }

    /// Point the source at a different feed, e.g. a mirror.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn feed_url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TrendsSource for GoogleTrendsSource {
    fn source_name(&self) -> String {
        format!("Google Trends ({})", self.geo)
    }

    async fn fetch_candidates(&self) -> Result<Vec<Topic>, ServiceError> {
        let content = self.fetcher.fetch_text(&self.url).await?;
        let topics = FeedParser::new().parse_topics(&content)?;
        info!("{} returned {} candidate topics", self.source_name(), topics.len());
        Ok(topics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FetchConfig;

    #[test]
    fn builds_the_regional_feed_url() {
        let fetcher = Arc::new(Fetcher::new(FetchConfig::default()).unwrap());
        let source = GoogleTrendsSource::new(fetcher, "US");
        assert_eq!(source.feed_url(), "https://trends.google.com/trending/rss?geo=US");
        assert_eq!(source.source_name(), "Google Trends (US)");

        let source = source.with_url("http://localhost:9000/trends.xml");
        assert_eq!(source.feed_url(), "http://localhost:9000/trends.xml");
    }
}
