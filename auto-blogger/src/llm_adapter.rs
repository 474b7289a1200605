use crate::fetcher::{build_client, ensure_success};
use crate::retry::with_fixed_retry;
use crate::types::{
    BloggerError, FetchConfig, NormalizedTitle, OpenAiConfig, Result, RetryPolicy, Seed, ServiceError, Title,
};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use interfaces::defs::{ImageGenerationService, TitleGenerationService};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    quality: &'a str,
    n: u32,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

/// Client for an OpenAI-compatible chat and image API.
pub struct OpenAiAdapter {
    client: Client,
    config: OpenAiConfig,
    api_key: String,
    retry: RetryPolicy,
}

impl OpenAiAdapter {
    pub fn new(config: OpenAiConfig, fetch_config: &FetchConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| BloggerError::ConfigurationMissing("OPENAI_API_KEY".to_string()))?;
        let client = build_client(fetch_config)?;

        info!("OpenAI adapter initialized (chat model {})", config.chat_model);
        Ok(Self {
            client,
            config,
            api_key,
            retry: fetch_config.retry_policy(),
        })
    }

    pub fn adapter_name(&self) -> String {
        format!("OpenAI ({})", self.config.chat_model)
    }

    /// Sends one user prompt and returns the reply text, retrying transient
    /// failures.
    pub async fn complete(&self, label: &str, prompt: &str, max_tokens: Option<u32>) -> Result<String> {
        with_fixed_retry(&self.retry, label, move || self.chat_once(prompt, max_tokens)).await
    }

    async fn chat_once(&self, prompt: &str, max_tokens: Option<u32>) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.chat_model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response: ChatResponse = ensure_success(response).await?.json().await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| BloggerError::Parse("Chat completion returned no content".to_string()))
    }

    async fn image_once(&self, prompt: &str) -> Result<String> {
        let request = ImageRequest {
            model: &self.config.image_model,
            prompt,
            size: &self.config.image_size,
            quality: "standard",
            n: 1,
        };

        let response = self
            .client
            .post(format!("{}/images/generations", self.config.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response: ImageResponse = ensure_success(response).await?.json().await?;

        response
            .data
            .into_iter()
            .next()
            .and_then(|image| image.url)
            .ok_or_else(|| BloggerError::Parse("Image generation returned no URL".to_string()))
    }
}

#[async_trait]
impl TitleGenerationService for OpenAiAdapter {
    async fn suggest_title(&self, seed: &Seed, exclude: &BTreeSet<NormalizedTitle>) -> std::result::Result<Title, ServiceError> {
        let prompt = title_prompt(seed.text(), exclude, Local::now().date_naive());
        let raw = self
            .complete("title generation", &prompt, Some(self.config.title_max_tokens))
            .await?;
        let title = first_title_line(&raw, seed.text());
        info!("Generated attractive title: {}", title);
        Ok(title)
    }
}

#[async_trait]
impl ImageGenerationService for OpenAiAdapter {
    async fn generate_image(&self, prompt: &str) -> std::result::Result<String, ServiceError> {
        debug!("Requesting image for prompt: {}", prompt);
        let url = with_fixed_retry(&self.retry, "image generation", move || self.image_once(prompt)).await?;
        Ok(url)
    }
}

/// "June 05, 2025" style date used in prompts.
pub fn prompt_date(date: NaiveDate) -> String {
    date.format("%B %d, %Y").to_string()
}

pub fn title_prompt(seed: &str, exclude: &BTreeSet<NormalizedTitle>, today: NaiveDate) -> String {
    let mut prompt = format!(
        "Generate 5 highly attractive, clickbait-style, and SEO-friendly blog post titles based on the following topic: \"{}\". \
         Today's date is {}. The titles should be concise, engaging, and make readers want to click immediately. \
         Provide only the titles, one per line, without any additional text or numbering.",
        seed,
        prompt_date(today)
    );
    if !exclude.is_empty() {
        let avoid: Vec<&str> = exclude.iter().map(|t| t.as_str()).collect();
        prompt.push_str("\nAvoid generating titles similar to or containing keywords from: ");
        prompt.push_str(&avoid.join(", "));
    }
    prompt
}

/// Picks the first non-empty line of a title listing and strips any leading
/// "1." style numbering. Falls back to `fallback` for an empty reply.
pub fn first_title_line(raw: &str, fallback: &str) -> String {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or(fallback);
    strip_numbering(line).trim().to_string()
}

fn strip_numbering(mut line: &str) -> &str {
    loop {
        let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return line;
        }
        match line[digits..].strip_prefix('.') {
            Some(rest) => line = rest.trim_start(),
            None => return line,
        }
    }
}
