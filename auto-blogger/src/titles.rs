use crate::traits::{ProgressEvent, ProgressLevel, ProgressSink};
use crate::types::{NormalizedTitle, PipelineState, Seed, ServiceError, Title};
use interfaces::defs::TitleGenerationService;
use interfaces::DedupeLedger;
use std::collections::BTreeSet;
use tracing::{error, info, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// A title the ledger has never seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueTitle {
    pub title: Title,
    pub key: NormalizedTitle,
    /// Attempt on which it was found, starting at 1.
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TitleFailure {
    #[error("Could not generate a unique title after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("Title generation failed on attempt {attempt}: {reason}")]
    Service { attempt: u32, reason: String },
}

enum TitleAttempt {
    Unique(Title, NormalizedTitle),
    Duplicate(Title, NormalizedTitle),
    Failed(ServiceError),
}

/// Asks the title service for suggestions until one is absent from the ledger.
pub struct TitleGenerator<'a> {
    service: &'a dyn TitleGenerationService,
    ledger: &'a DedupeLedger,
}

impl<'a> TitleGenerator<'a> {
    pub fn new(service: &'a dyn TitleGenerationService, ledger: &'a DedupeLedger) -> Self {
        Self { service, ledger }
    }

    async fn attempt(&self, seed: &Seed, exclude: &BTreeSet<NormalizedTitle>) -> TitleAttempt {
        match self.service.suggest_title(seed, exclude).await {
            Ok(title) => {
                let key = NormalizedTitle::new(&title);
                if self.ledger.exists(&key).await {
                    TitleAttempt::Duplicate(title, key)
                } else {
                    TitleAttempt::Unique(title, key)
                }
            }
            Err(e) => TitleAttempt::Failed(e),
        }
    }

    /// Duplicates are added to a local exclusion set seeded from `existing`
    /// and fed back to the service. A service error ends the search at once.
    pub async fn generate_unique_title(
        &self,
        seed: &Seed,
        existing: &BTreeSet<NormalizedTitle>,
        max_attempts: u32,
        progress: &dyn ProgressSink,
    ) -> Result<UniqueTitle, TitleFailure> {
        let mut exclude = existing.clone();

        for attempt in 1..=max_attempts {
            progress.emit(ProgressEvent::new(
                PipelineState::GeneratingTitle,
                ProgressLevel::Info,
                format!("Attempt {}/{} to generate unique title...", attempt, max_attempts),
            ));

            match self.attempt(seed, &exclude).await {
                TitleAttempt::Unique(title, key) => {
                    info!("Generated unique title on attempt {}: {}", attempt, title);
                    progress.emit(ProgressEvent::new(
                        PipelineState::GeneratingTitle,
                        ProgressLevel::Success,
                        format!("Generated unique title: {}", title),
                    ));
                    return Ok(UniqueTitle {
                        title,
                        key,
                        attempts: attempt,
                    });
                }
                TitleAttempt::Duplicate(title, key) => {
                    warn!("Generated title '{}' ({}) already exists", title, key);
                    progress.emit(ProgressEvent::new(
                        PipelineState::GeneratingTitle,
                        ProgressLevel::Warning,
                        format!("Generated title '{}' already exists. Retrying...", title),
                    ));
                    exclude.insert(key);
                }
                TitleAttempt::Failed(e) => {
                    error!("Failed to generate title for '{}' (attempt {}): {}", seed_label(seed), attempt, e);
                    let failure = TitleFailure::Service {
                        attempt,
                        reason: e.to_string(),
                    };
                    progress.emit(ProgressEvent::new(
                        PipelineState::GeneratingTitle,
                        ProgressLevel::Error,
                        failure.to_string(),
                    ));
                    return Err(failure);
                }
            }
        }

        let failure = TitleFailure::Exhausted { attempts: max_attempts };
        error!("{}", failure);
        progress.emit(ProgressEvent::new(
            PipelineState::GeneratingTitle,
            ProgressLevel::Error,
            failure.to_string(),
        ));
        Err(failure)
    }
}

fn seed_label(seed: &Seed) -> String {
    match seed {
        Seed::Topic(topic) => topic.clone(),
        Seed::Content(content) => {
            let prefix: String = content.chars().take(50).collect();
            format!("content \"{}\"", prefix)
        }
    }
}
