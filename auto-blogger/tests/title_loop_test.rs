mod common;

use auto_blogger::{ProgressLog, TitleFailure, TitleGenerator};
use common::{init_tracing, seed_ledger, temp_ledger, ScriptedTitles};
use interfaces::{NormalizedTitle, Seed, ServiceError};
use std::collections::BTreeSet;

fn seed() -> Seed {
    Seed::Topic("AI tools".to_string())
}

#[tokio::test]
async fn test_first_unique_title_is_returned() {
    init_tracing();
    let (_dir, ledger) = temp_ledger().await;
    let titles = ScriptedTitles::always("10 AI Tools You Need");
    let progress = ProgressLog::new();

    let unique = TitleGenerator::new(&titles, &ledger)
        .generate_unique_title(&seed(), &BTreeSet::new(), 5, &progress)
        .await
        .unwrap();

    assert_eq!(unique.title, "10 AI Tools You Need");
    assert_eq!(unique.key.as_str(), "10aitoolsyouneed");
    assert_eq!(unique.attempts, 1);
    assert_eq!(titles.calls(), 1);
    assert_eq!(progress.messages()[0], "Attempt 1/5 to generate unique title...");
}

#[tokio::test]
async fn test_constant_duplicate_exhausts_attempts() {
    init_tracing();
    let (_dir, ledger) = temp_ledger().await;
    seed_ledger(&ledger, &["AI Tools!"]).await;
    let existing = ledger.all_titles().await;
    let titles = ScriptedTitles::always("ai tools");

    let result = TitleGenerator::new(&titles, &ledger)
        .generate_unique_title(&seed(), &existing, 5, &ProgressLog::new())
        .await;

    assert_eq!(result, Err(TitleFailure::Exhausted { attempts: 5 }));
    assert_eq!(titles.calls(), 5);
}

#[tokio::test]
async fn test_service_error_stops_immediately() {
    init_tracing();
    let (_dir, ledger) = temp_ledger().await;
    let titles = ScriptedTitles::new(vec![
        Err(ServiceError::Fatal("invalid api key".to_string())),
        Ok("Never Asked For"),
    ]);

    let result = TitleGenerator::new(&titles, &ledger)
        .generate_unique_title(&seed(), &BTreeSet::new(), 5, &ProgressLog::new())
        .await;

    assert!(matches!(result, Err(TitleFailure::Service { attempt: 1, .. })));
    assert_eq!(titles.calls(), 1);
}

#[tokio::test]
async fn test_duplicates_grow_the_exclusion_set() {
    init_tracing();
    let (_dir, ledger) = temp_ledger().await;
    seed_ledger(&ledger, &["Old Post", "Taken One", "Taken Two"]).await;
    let existing: BTreeSet<NormalizedTitle> = [NormalizedTitle::new("Old Post")].into_iter().collect();
    let titles = ScriptedTitles::new(vec![Ok("Taken One"), Ok("Taken-Two"), Ok("Brand New Angle")]);

    let unique = TitleGenerator::new(&titles, &ledger)
        .generate_unique_title(&seed(), &existing, 5, &ProgressLog::new())
        .await
        .unwrap();

    assert_eq!(unique.title, "Brand New Angle");
    assert_eq!(unique.attempts, 3);

    let excludes = titles.excludes();
    assert_eq!(excludes.len(), 3);
    assert_eq!(excludes[0].len(), 1);
    assert!(excludes[1].contains(&NormalizedTitle::new("Taken One")));
    assert_eq!(excludes[2].len(), 3);
    assert!(excludes[2].contains(&NormalizedTitle::new("taken two")));
}

#[tokio::test]
async fn test_zero_attempts_never_calls_the_service() {
    init_tracing();
    let (_dir, ledger) = temp_ledger().await;
    let titles = ScriptedTitles::always("Anything");

    let result = TitleGenerator::new(&titles, &ledger)
        .generate_unique_title(&seed(), &BTreeSet::new(), 0, &ProgressLog::new())
        .await;

    assert_eq!(result, Err(TitleFailure::Exhausted { attempts: 0 }));
    assert_eq!(titles.calls(), 0);
}
