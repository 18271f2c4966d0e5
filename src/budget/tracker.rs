use std::sync::Arc;

use chrono::Utc;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::store::{Store, StoreError};

use super::usage::{TokenBudget, UsageCounter, UsageWindows, Window};

/// Errors surfaced by budget bookkeeping.
#[derive(Debug, Error, Diagnostic)]
pub enum BudgetError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

/// Read-only pre-flight verdict from [`TokenBudgetTracker::check_admission`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    /// Human-readable refusal reason naming the offending scope and window.
    pub reason: Option<String>,
}

/// Post-call verdict from [`TokenBudgetTracker::record_usage`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BudgetStatus {
    pub within_budget: bool,
    pub reason: Option<String>,
}

/// Serde shape of the tracker state persisted through the [`Store`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedBudgetState {
    pub windows: UsageWindows,
    /// Lifetime counters per provider, per model.
    #[serde(default)]
    pub lifetime: FxHashMap<String, FxHashMap<String, UsageCounter>>,
    #[serde(default)]
    pub provider_budgets: FxHashMap<String, TokenBudget>,
    #[serde(default)]
    pub model_budgets: FxHashMap<String, FxHashMap<String, TokenBudget>>,
}

/// Rolling token accounting shared by every bot-response unit.
///
/// Budgets exist at provider scope and at (provider, model) scope; the model
/// budget is checked first, then the provider aggregate. Windows reset
/// lazily: the first call after midnight (or after the 1st of a month)
/// clears the corresponding usage map before counting anything new.
///
/// All internal state sits behind one async mutex held across the
/// read-modify-write and the store save, so concurrent units cannot
/// interleave a counter update or observe a half-applied reset.
pub struct TokenBudgetTracker {
    inner: Mutex<PersistedBudgetState>,
    store: Arc<dyn Store>,
}

impl TokenBudgetTracker {
    /// Load persisted budgets and windows; starts fresh when the store has
    /// none.
    pub async fn load(store: Arc<dyn Store>) -> Result<Self, BudgetError> {
        let state = store.load_budget_state().await?.unwrap_or_default();
        Ok(Self {
            inner: Mutex::new(state),
            store,
        })
    }

    /// Pre-flight check against usage already recorded. Does not count
    /// anything and does not persist; rolled-over reset markers reach the
    /// store with the next mutating call.
    pub async fn check_admission(&self, provider: &str, model: &str) -> Admission {
        let mut inner = self.inner.lock().await;
        inner.windows.roll(Utc::now());
        match violation(&inner, provider, model) {
            Some(reason) => Admission {
                allowed: false,
                reason: Some(reason),
            },
            None => Admission {
                allowed: true,
                reason: None,
            },
        }
    }

    /// Count a completed generation call, then re-evaluate both budget
    /// scopes against the incremented usage.
    ///
    /// The tokens are counted unconditionally: by the time this runs the
    /// cost is already incurred. An at-or-over-limit verdict tells the
    /// caller to suppress further dependent work, not to roll anything back.
    pub async fn record_usage(
        &self,
        provider: &str,
        model: &str,
        prompt_tokens: u64,
        completion_tokens: u64,
    ) -> Result<BudgetStatus, BudgetError> {
        let mut inner = self.inner.lock().await;
        inner.windows.roll(Utc::now());
        inner
            .windows
            .record(provider, model, prompt_tokens + completion_tokens);
        inner
            .lifetime
            .entry(provider.to_string())
            .or_default()
            .entry(model.to_string())
            .or_default()
            .add(prompt_tokens, completion_tokens);
        let verdict = violation(&inner, provider, model);
        self.store.save_budget_state(&inner).await?;
        Ok(BudgetStatus {
            within_budget: verdict.is_none(),
            reason: verdict,
        })
    }

    /// Set (or replace) the budget for every model of a provider combined.
    pub async fn set_provider_budget(
        &self,
        provider: &str,
        budget: TokenBudget,
    ) -> Result<(), BudgetError> {
        let mut inner = self.inner.lock().await;
        inner.provider_budgets.insert(provider.to_string(), budget);
        self.store.save_budget_state(&inner).await?;
        Ok(())
    }

    /// Set (or replace) the budget for one model, checked in addition to
    /// the provider budget.
    pub async fn set_model_budget(
        &self,
        provider: &str,
        model: &str,
        budget: TokenBudget,
    ) -> Result<(), BudgetError> {
        let mut inner = self.inner.lock().await;
        inner
            .model_budgets
            .entry(provider.to_string())
            .or_default()
            .insert(model.to_string(), budget);
        self.store.save_budget_state(&inner).await?;
        Ok(())
    }

    /// Full accounting snapshot: lifetime counters, window maps, reset
    /// markers and configured budgets.
    pub async fn usage_report(&self) -> serde_json::Value {
        let inner = self.inner.lock().await;
        json!({
            "lifetime": inner.lifetime,
            "daily": inner.windows.daily,
            "monthly": inner.windows.monthly,
            "daily_reset": inner.windows.daily_reset,
            "monthly_reset": inner.windows.monthly_reset,
            "provider_budgets": inner.provider_budgets,
            "model_budgets": inner.model_budgets,
        })
    }
}

/// Refusal reason for the tightest violated scope, model scope first.
fn violation(state: &PersistedBudgetState, provider: &str, model: &str) -> Option<String> {
    if let Some(budget) = state
        .model_budgets
        .get(provider)
        .and_then(|models| models.get(model))
    {
        let daily = state.windows.model_usage(Window::Daily, provider, model);
        let monthly = state.windows.model_usage(Window::Monthly, provider, model);
        if let Some(window) = budget.violation(daily, monthly) {
            let used = match window {
                Window::Daily => daily,
                Window::Monthly => monthly,
            };
            let limit = budget.limit(window).unwrap_or(0);
            return Some(format!(
                "model {model} ({provider}): {window} limit of {limit} tokens reached ({used} used)"
            ));
        }
    }

    if let Some(budget) = state.provider_budgets.get(provider) {
        let daily = state.windows.provider_usage(Window::Daily, provider);
        let monthly = state.windows.provider_usage(Window::Monthly, provider);
        if let Some(window) = budget.violation(daily, monthly) {
            let used = match window {
                Window::Daily => daily,
                Window::Monthly => monthly,
            };
            let limit = budget.limit(window).unwrap_or(0);
            return Some(format!(
                "provider {provider}: {window} limit of {limit} tokens reached ({used} used)"
            ));
        }
    }

    None
}
