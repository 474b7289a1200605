use crate::llm_adapter::{prompt_date, OpenAiAdapter};
use crate::types::{ImagePolicy, ServiceError};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use interfaces::defs::{BodyGenerationService, ImageGenerationService};
use std::sync::Arc;
use tracing::{info, warn};

const POST_REQUIREMENTS: &str = "The post should be in HTML format, suitable for a blog.
It should be written in a human-like, engaging, and first-person style, as if a person is writing it.
It should include:
- An engaging intro
- Use of headings (h2, h3) and paragraphs (<p>)
- Bullet points (<ul><li>) and examples
- A call to action at the end.
- Absolutely do NOT include any personal information, email addresses, or names.";

pub fn body_prompt(title: &str, source_content: Option<&str>, today: NaiveDate) -> String {
    match source_content {
        None => format!(
            "Write a 1000-word SEO blog post titled: \"{}\". Today's date is {}.\n{}",
            title,
            prompt_date(today),
            POST_REQUIREMENTS
        ),
        Some(content) => format!(
            "Rewrite and expand the following content into a 1000-word SEO blog post titled: \"{}\". Today's date is {}.\n{}\n\nOriginal Content to Expand/Rewrite:\n{}",
            title,
            prompt_date(today),
            POST_REQUIREMENTS,
            content
        ),
    }
}

pub fn image_prompt(title: &str) -> String {
    format!("A relevant image for a blog post titled: {}", title)
}

/// Prepends the header image to `body`, or applies `policy` when the image
/// could not be produced.
pub fn attach_image(
    body: String,
    title: &str,
    image: Result<String, ServiceError>,
    policy: ImagePolicy,
) -> Result<String, ServiceError> {
    match image {
        Ok(url) => Ok(format!(
            "<img src=\"{}\" alt=\"{}\" style=\"width:100%; max-width:600px; height:auto;\"><br>{}",
            url,
            title.replace('"', "&quot;"),
            body
        )),
        Err(e) => match policy {
            ImagePolicy::Required => Err(e),
            ImagePolicy::BestEffort => {
                warn!("Image generation failed for '{}', posting without image: {}", title, e);
                Ok(body)
            }
        },
    }
}

/// Writes the post text with the chat model, then puts a generated image on
/// top of it.
pub struct IllustratedBodyWriter {
    text: Arc<OpenAiAdapter>,
    images: Arc<dyn ImageGenerationService>,
    image_policy: ImagePolicy,
}

impl IllustratedBodyWriter {
    pub fn new(text: Arc<OpenAiAdapter>, images: Arc<dyn ImageGenerationService>, image_policy: ImagePolicy) -> Self {
        Self {
            text,
            images,
            image_policy,
        }
    }
}

#[async_trait]
impl BodyGenerationService for IllustratedBodyWriter {
    async fn write_body(&self, title: &str, source_content: Option<&str>) -> Result<String, ServiceError> {
        let prompt = body_prompt(title, source_content, Local::now().date_naive());
        let body = self.text.complete("body generation", &prompt, None).await?;
        info!("Generated {} characters of body text for '{}'", body.len(), title);

        let image = self.images.generate_image(&image_prompt(title)).await;
        attach_image(body, title, image, self.image_policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 9).unwrap()
    }

    #[test]
    fn prompt_switches_on_source_content() {
        let fresh = body_prompt("AI Tools", None, date());
        assert!(fresh.starts_with("Write a 1000-word SEO blog post titled: \"AI Tools\". Today's date is January 09, 2025."));
        assert!(!fresh.contains("Original Content"));

        let rewrite = body_prompt("AI Tools", Some("My notes on tools"), date());
        assert!(rewrite.starts_with("Rewrite and expand"));
        assert!(rewrite.ends_with("Original Content to Expand/Rewrite:\nMy notes on tools"));
    }

    #[test]
    fn image_goes_on_top_of_the_body() {
        let html = attach_image(
            "<p>Hello</p>".to_string(),
            "Say \"Hi\"",
            Ok("https://img.example/1.png".to_string()),
            ImagePolicy::Required,
        )
        .unwrap();
        assert_eq!(
            html,
            "<img src=\"https://img.example/1.png\" alt=\"Say &quot;Hi&quot;\" style=\"width:100%; max-width:600px; height:auto;\"><br><p>Hello</p>"
        );
    }

    #[test]
    fn required_image_failure_fails_the_body() {
        let result = attach_image(
            "<p>Hello</p>".to_string(),
            "T",
            Err(ServiceError::Transient("image service down".to_string())),
            ImagePolicy::Required,
        );
        assert!(matches!(result, Err(ServiceError::Transient(_))));
    }

    #[test]
    fn best_effort_image_failure_keeps_the_text() {
        let result = attach_image(
            "<p>Hello</p>".to_string(),
            "T",
            Err(ServiceError::Fatal("content policy".to_string())),
            ImagePolicy::BestEffort,
        );
        assert_eq!(result.unwrap(), "<p>Hello</p>");
    }
}
