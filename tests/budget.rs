//! Budget accounting: monotonicity, enforcement, admission, persistence.

mod common;

use std::sync::Arc;

use huddle::budget::{TokenBudget, TokenBudgetTracker};
use huddle::store::InMemoryStore;

async fn tracker() -> (TokenBudgetTracker, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let tracker = TokenBudgetTracker::load(store.clone()).await.unwrap();
    (tracker, store)
}

#[tokio::test]
async fn usage_accumulates_across_calls() {
    let (tracker, _store) = tracker().await;
    tracker.record_usage("openai", "gpt-4o", 10, 5).await.unwrap();
    tracker.record_usage("openai", "gpt-4o", 7, 3).await.unwrap();
    tracker
        .record_usage("openai", "gpt-4o-mini", 1, 1)
        .await
        .unwrap();

    let report = tracker.usage_report().await;
    assert_eq!(report["lifetime"]["openai"]["gpt-4o"]["prompt_tokens"], 17);
    assert_eq!(
        report["lifetime"]["openai"]["gpt-4o"]["completion_tokens"],
        8
    );
    assert_eq!(report["lifetime"]["openai"]["gpt-4o"]["total_tokens"], 25);
    assert_eq!(report["daily"]["openai"]["gpt-4o"], 25);
    assert_eq!(report["daily"]["openai"]["gpt-4o-mini"], 2);
    assert_eq!(report["monthly"]["openai"]["gpt-4o"], 25);
}

#[tokio::test]
async fn unconstrained_usage_is_always_within_budget() {
    let (tracker, _store) = tracker().await;
    let status = tracker
        .record_usage("openai", "gpt-4o", 1_000_000, 1_000_000)
        .await
        .unwrap();
    assert!(status.within_budget);
    assert!(status.reason.is_none());

    let admission = tracker.check_admission("openai", "gpt-4o").await;
    assert!(admission.allowed);
}

#[tokio::test]
async fn provider_daily_limit_is_enforced_with_reason() {
    let (tracker, _store) = tracker().await;
    tracker
        .set_provider_budget("openai", TokenBudget::daily(100))
        .await
        .unwrap();

    let status = tracker.record_usage("openai", "gpt-4o", 60, 39).await.unwrap();
    assert!(status.within_budget);

    // One more token tips the aggregate to the limit.
    let status = tracker.record_usage("openai", "gpt-4o", 1, 0).await.unwrap();
    assert!(!status.within_budget);
    let reason = status.reason.unwrap();
    assert!(reason.contains("openai"), "reason was: {reason}");
    assert!(reason.contains("daily"), "reason was: {reason}");
}

#[tokio::test]
async fn provider_budget_aggregates_across_models() {
    let (tracker, _store) = tracker().await;
    tracker
        .set_provider_budget("openai", TokenBudget::daily(100))
        .await
        .unwrap();

    tracker.record_usage("openai", "gpt-4o", 50, 0).await.unwrap();
    let status = tracker
        .record_usage("openai", "gpt-4o-mini", 50, 0)
        .await
        .unwrap();
    assert!(!status.within_budget);
}

#[tokio::test]
async fn model_budget_is_checked_in_addition_to_provider() {
    let (tracker, _store) = tracker().await;
    tracker
        .set_provider_budget("openai", TokenBudget::daily(10_000))
        .await
        .unwrap();
    tracker
        .set_model_budget("openai", "gpt-4o", TokenBudget::daily(50))
        .await
        .unwrap();

    let status = tracker.record_usage("openai", "gpt-4o", 50, 0).await.unwrap();
    assert!(!status.within_budget);
    let reason = status.reason.unwrap();
    assert!(reason.contains("gpt-4o"), "reason was: {reason}");
    assert!(reason.contains("daily"), "reason was: {reason}");

    // A sibling model under the same provider is still fine.
    let status = tracker
        .record_usage("openai", "gpt-4o-mini", 10, 0)
        .await
        .unwrap();
    assert!(status.within_budget);
}

#[tokio::test]
async fn admission_refused_once_saturated() {
    let (tracker, _store) = tracker().await;
    tracker
        .set_provider_budget("openai", TokenBudget::daily(100))
        .await
        .unwrap();

    let admission = tracker.check_admission("openai", "gpt-4o").await;
    assert!(admission.allowed);

    tracker.record_usage("openai", "gpt-4o", 100, 0).await.unwrap();

    let admission = tracker.check_admission("openai", "gpt-4o").await;
    assert!(!admission.allowed);
    let reason = admission.reason.unwrap();
    assert!(reason.contains("openai"));
    assert!(reason.contains("daily"));
}

#[tokio::test]
async fn monthly_limit_is_reported_as_monthly() {
    let (tracker, _store) = tracker().await;
    tracker
        .set_provider_budget("openai", TokenBudget::monthly(100))
        .await
        .unwrap();

    let status = tracker.record_usage("openai", "gpt-4o", 100, 0).await.unwrap();
    assert!(!status.within_budget);
    assert!(status.reason.unwrap().contains("monthly"));
}

#[tokio::test]
async fn budget_state_survives_restart() {
    let store = Arc::new(InMemoryStore::new());
    {
        let tracker = TokenBudgetTracker::load(store.clone()).await.unwrap();
        tracker
            .set_provider_budget("openai", TokenBudget::daily(100))
            .await
            .unwrap();
        tracker.record_usage("openai", "gpt-4o", 100, 0).await.unwrap();
    }

    // A fresh tracker over the same store picks up budgets, usage, and
    // markers.
    let tracker = TokenBudgetTracker::load(store).await.unwrap();
    let admission = tracker.check_admission("openai", "gpt-4o").await;
    assert!(!admission.allowed);

    let report = tracker.usage_report().await;
    assert_eq!(report["daily"]["openai"]["gpt-4o"], 100);
    assert_eq!(report["provider_budgets"]["openai"]["daily_limit"], 100);
}
