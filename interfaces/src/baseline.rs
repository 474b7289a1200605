use async_trait::async_trait;
use tracing::warn;

use crate::defs::{ServiceError, Topic, TrendsSource};

/// Topics used when the live trends source refuses to answer.
pub const FALLBACK_TOPICS: [&str; 5] = [
    "AI Automation",
    "Data Science Trends",
    "Machine Learning Applications",
    "n8n Workflows",
    "Future of AI",
];

pub fn fallback_topics() -> Vec<Topic> {
    FALLBACK_TOPICS.iter().map(|topic| topic.to_string()).collect()
}

/// Candidates from `source`, or the fallback list when it is rate limited.
/// The flag is set when the fallback was used.
pub async fn candidates_or_fallback(source: &dyn TrendsSource) -> Result<(Vec<Topic>, bool), ServiceError> {
    match source.fetch_candidates().await {
        Ok(topics) => Ok((topics, false)),
        Err(ServiceError::RateLimited(reason)) => {
            warn!("Rate limit hit for {} ({}). Using fallback keywords.", source.source_name(), reason);
            Ok((fallback_topics(), true))
        }
        Err(e) => Err(e),
    }
}

/// A trends source that always answers with the fixed fallback list.
pub struct BaselineTrends;

#[async_trait]
impl TrendsSource for BaselineTrends {
    fn source_name(&self) -> String {
        "Baseline topics".to_string()
    }

    async fn fetch_candidates(&self) -> Result<Vec<Topic>, ServiceError> {
        Ok(fallback_topics())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn baseline_answers_with_fallback_topics() {
        let topics = BaselineTrends.fetch_candidates().await.unwrap();
        assert_eq!(topics.len(), 5);
        assert_eq!(topics[0], "AI Automation");
        assert_eq!(topics, fallback_topics());
    }

    struct Refusing(fn() -> ServiceError);

    #[async_trait]
    impl TrendsSource for Refusing {
        fn source_name(&self) -> String {
            "refusing".to_string()
        }

        async fn fetch_candidates(&self) -> Result<Vec<Topic>, ServiceError> {
            Err((self.0)())
        }
    }

    #[tokio::test]
    async fn rate_limits_fall_back_and_other_errors_pass_through() {
        let limited = Refusing(|| ServiceError::RateLimited("trends".to_string()));
        let (topics, used_fallback) = candidates_or_fallback(&limited).await.unwrap();
        assert!(used_fallback);
        assert_eq!(topics, fallback_topics());

        let (topics, used_fallback) = candidates_or_fallback(&BaselineTrends).await.unwrap();
        assert!(!used_fallback);
        assert_eq!(topics.len(), 5);

        let broken = Refusing(|| ServiceError::Fatal("bad feed".to_string()));
        assert!(matches!(candidates_or_fallback(&broken).await, Err(ServiceError::Fatal(_))));
    }
}
