use crate::fetcher::{build_client, ensure_success};
use crate::retry::with_fixed_retry;
use crate::types::{BloggerError, FetchConfig, PublishReceipt, Result, RetryPolicy, ServiceError};
use async_trait::async_trait;
use interfaces::defs::PublishService;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const BLOGGER_API_BASE: &str = "https://www.googleapis.com/blogger/v3";

/// Stored "authorized user" credentials, as written by Google's OAuth
/// installed-app flow.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl AuthorizedUser {
    pub fn from_json(json: &str) -> Result<Self> {
        let user: AuthorizedUser = serde_json::from_str(json)?;
        if user.refresh_token.trim().is_empty() {
            return Err(BloggerError::ConfigurationMissing(
                "refresh_token in GCP_TOKEN_JSON".to_string(),
            ));
        }
        Ok(user)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct NewPost<'a> {
    kind: &'a str,
    title: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct PostResource {
    id: String,
    url: Option<String>,
    status: Option<String>,
}

/// Creates draft posts through the Blogger v3 API.
pub struct BloggerPublisher {
    client: Client,
    credentials: AuthorizedUser,
    api_base: String,
    retry: RetryPolicy,
}

impl BloggerPublisher {
    pub fn new(token_json: &str, fetch_config: &FetchConfig) -> Result<Self> {
        let credentials = AuthorizedUser::from_json(token_json)?;
        let client = build_client(fetch_config)?;
        Ok(Self {
            client,
            credentials,
            api_base: BLOGGER_API_BASE.to_string(),
            retry: fetch_config.retry_policy(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    async fn access_token(&self) -> Result<String> {
        let token_uri = self.credentials.token_uri.as_deref().unwrap_or(GOOGLE_TOKEN_URI);
        let response = self
            .client
            .post(token_uri)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;
        let tokens: TokenResponse = ensure_success(response).await?.json().await?;
        debug!("Refreshed Blogger access token");
        Ok(tokens.access_token)
    }

    async fn insert_post(&self, title: &str, body: &str, blog_id: &str) -> Result<PublishReceipt> {
        let access_token = self.access_token().await?;
        let post = NewPost {
            kind: "blogger#post",
            title,
            content: body,
        };

        let response = self
            .client
            .post(format!("{}/blogs/{}/posts/", self.api_base, blog_id))
            .query(&[("isDraft", "true")])
            .bearer_auth(access_token)
            .json(&post)
            .send()
            .await?;
        let resource: PostResource = ensure_success(response).await?.json().await?;

        Ok(PublishReceipt {
            post_id: resource.id,
            url: resource.url,
            status: resource.status,
        })
    }
}

#[async_trait]
impl PublishService for BloggerPublisher {
    async fn publish(&self, title: &str, body: &str, target_id: &str) -> std::result::Result<PublishReceipt, ServiceError> {
        let receipt = with_fixed_retry(&self.retry, "publish to Blogger", move || {
            self.insert_post(title, body, target_id)
        })
        .await?;
        info!("Successfully posted blog: {} (post id {})", title, receipt.post_id);
        Ok(receipt)
    }
}
