use crate::types::{BloggerError, Result, Topic};
use feed_rs::parser;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info};

/// Turns trends feeds into candidate topics, dropping repeats across calls.
pub struct FeedParser {
    seen_topics: HashSet<String>,
}

impl FeedParser {
    pub fn new() -> Self {
        Self {
            seen_topics: HashSet::new(),
        }
    }

    pub fn parse_topics(&mut self, content: &str) -> Result<Vec<Topic>> {
        debug!("Parsing trends feed ({} bytes)", content.len());

        let feed = parser::parse(content.as_bytes())
            .map_err(|e| BloggerError::Parse(format!("Failed to parse feed: {}", e)))?;

        let mut topics = Vec::new();
        for entry in feed.entries {
            let Some(title) = entry.title.map(|t| t.content) else {
                continue;
            };
            let topic = title.split_whitespace().collect::<Vec<_>>().join(" ");
            if topic.is_empty() {
                continue;
            }
            if !self.seen_topics.insert(topic.to_lowercase()) {
                debug!("Skipping duplicate topic: {}", topic);
                continue;
            }
            topics.push(topic);
        }

        info!("Parsed trends feed with {} topics", topics.len());
        Ok(topics)
    }
}

impl Default for FeedParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether supplied content should be fetched rather than used verbatim.
pub fn is_url(content: &str) -> bool {
    let content = content.trim();
    content.starts_with("http://") || content.starts_with("https://")
}

/// Extracts the readable text of an HTML page, preferring the usual article
/// containers and skipping script and style contents.
pub fn extract_main_content(html: &str) -> String {
    let document = Html::parse_document(html);

    let content_selectors = [
        "article",
        "main",
        "[role='main']",
        ".post-content",
        ".entry-content",
        ".content",
        "#content",
    ];

    for selector_str in content_selectors {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let text = visible_text(element);
                if text.len() > 100 {
                    return text;
                }
            }
        }
    }

    match Selector::parse("body").ok().and_then(|sel| document.select(&sel).next()) {
        Some(body) => visible_text(body),
        None => visible_text(document.root_element()),
    }
}

fn visible_text(element: ElementRef) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|el| matches!(el.name(), "script" | "style" | "noscript" | "nav" | "footer"))
                .unwrap_or(false)
        });
        if !hidden {
            parts.push(&**text);
        }
    }

    parts
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRENDS_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:ht="https://trends.google.com/trending/rss">
  <channel>
    <title>Daily Search Trends</title>
    <link>https://trends.google.com/trending/rss?geo=IN</link>
    <description>Recent searches</description>
    <item>
      <title>AI tools   guide</title>
      <ht:approx_traffic>2000+</ht:approx_traffic>
    </item>
    <item>
      <title>Cricket news today</title>
    </item>
    <item>
      <title>ai TOOLS guide</title>
    </item>
    <item>
      <title>Crypto basics</title>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_topics_in_feed_order_without_duplicates() {
        let mut parser = FeedParser::new();
        let topics = parser.parse_topics(TRENDS_FEED).unwrap();
        assert_eq!(topics, vec!["AI tools guide", "Cricket news today", "Crypto basics"]);

        // Already seen on the first pass.
        assert!(parser.parse_topics(TRENDS_FEED).unwrap().is_empty());
    }

    #[test]
    fn rejects_non_feed_content() {
        let mut parser = FeedParser::new();
        assert!(matches!(parser.parse_topics("<html>nope</html>"), Err(BloggerError::Parse(_))));
    }

    #[test]
    fn recognizes_urls() {
        assert!(is_url("https://example.com/post"));
        assert!(is_url("  http://example.com"));
        assert!(!is_url("Paste of a post about https://example.com"));
        assert!(!is_url("ftp://example.com"));
    }

    #[test]
    fn extracts_article_text_and_skips_scripts() {
        let html = r#"<html><head><title>T</title><style>p { color: red; }</style></head>
            <body><nav>Home | About</nav>
            <article><h1>Automation</h1><script>var tracking = 1;</script>
            <p>Workflow automation lets small teams connect their tools together and
            remove the repetitive copy and paste work that eats up every afternoon.</p></article>
            <footer>Copyright</footer></body></html>"#;

        let text = extract_main_content(html);
        assert!(text.starts_with("Automation Workflow automation"));
        assert!(!text.contains("tracking"));
        assert!(!text.contains("Copyright"));
    }

    #[test]
    fn falls_back_to_body_text() {
        let html = "<html><body><div>Short page</div><script>x()</script></body></html>";
        assert_eq!(extract_main_content(html), "Short page");
    }
}
