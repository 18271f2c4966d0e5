use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Lifetime token counters for one (provider, model) pair.
///
/// Counters are monotone: nothing ever subtracts from them, including the
/// window resets, which only touch [`UsageWindows`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounter {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl UsageCounter {
    pub(crate) fn add(&mut self, prompt: u64, completion: u64) {
        self.prompt_tokens += prompt;
        self.completion_tokens += completion;
        self.total_tokens += prompt + completion;
    }
}

/// Optional caps on window usage; `None` means unconstrained at that scope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudget {
    pub daily_limit: Option<u64>,
    pub monthly_limit: Option<u64>,
}

impl TokenBudget {
    #[must_use]
    pub fn new(daily_limit: Option<u64>, monthly_limit: Option<u64>) -> Self {
        Self {
            daily_limit,
            monthly_limit,
        }
    }

    #[must_use]
    pub fn daily(limit: u64) -> Self {
        Self::new(Some(limit), None)
    }

    #[must_use]
    pub fn monthly(limit: u64) -> Self {
        Self::new(None, Some(limit))
    }

    /// The first window whose limit the given usage has reached, if any.
    /// Usage at exactly the limit counts as a violation.
    pub(crate) fn violation(&self, daily_usage: u64, monthly_usage: u64) -> Option<Window> {
        if let Some(limit) = self.daily_limit {
            if daily_usage >= limit {
                return Some(Window::Daily);
            }
        }
        if let Some(limit) = self.monthly_limit {
            if monthly_usage >= limit {
                return Some(Window::Monthly);
            }
        }
        None
    }

    pub(crate) fn limit(&self, window: Window) -> Option<u64> {
        match window {
            Window::Daily => self.daily_limit,
            Window::Monthly => self.monthly_limit,
        }
    }
}

/// The two rolling accounting windows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Window {
    Daily,
    Monthly,
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Monthly => write!(f, "monthly"),
        }
    }
}

/// provider -> model -> tokens consumed inside the current window.
pub type WindowUsage = FxHashMap<String, FxHashMap<String, u64>>;

/// Rolling daily/monthly usage with lazy reset markers.
///
/// There are no timers: callers pass the current wall-clock time into
/// [`roll`](UsageWindows::roll) before reading or writing, and any window
/// the clock has moved past is cleared in full.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UsageWindows {
    pub daily: WindowUsage,
    pub monthly: WindowUsage,
    /// The date the daily window covers.
    pub daily_reset: NaiveDate,
    /// First day of the month the monthly window covers.
    pub monthly_reset: NaiveDate,
}

impl UsageWindows {
    #[must_use]
    pub fn starting(now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        Self {
            daily: WindowUsage::default(),
            monthly: WindowUsage::default(),
            daily_reset: today,
            monthly_reset: month_start(today),
        }
    }

    /// Clear any window the wall clock has moved past and advance its
    /// marker. Returns true if anything was cleared.
    pub fn roll(&mut self, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        let mut rolled = false;
        if today > self.daily_reset {
            self.daily.clear();
            self.daily_reset = today;
            rolled = true;
        }
        let start = month_start(today);
        if start > self.monthly_reset {
            self.monthly.clear();
            self.monthly_reset = start;
            rolled = true;
        }
        rolled
    }

    /// Count tokens against both windows.
    pub fn record(&mut self, provider: &str, model: &str, tokens: u64) {
        for window in [&mut self.daily, &mut self.monthly] {
            *window
                .entry(provider.to_string())
                .or_default()
                .entry(model.to_string())
                .or_default() += tokens;
        }
    }

    /// Tokens the given model has consumed in the window.
    #[must_use]
    pub fn model_usage(&self, window: Window, provider: &str, model: &str) -> u64 {
        self.map(window)
            .get(provider)
            .and_then(|models| models.get(model))
            .copied()
            .unwrap_or(0)
    }

    /// Tokens the provider has consumed in the window, aggregated over all
    /// of its models.
    #[must_use]
    pub fn provider_usage(&self, window: Window, provider: &str) -> u64 {
        self.map(window)
            .get(provider)
            .map_or(0, |models| models.values().sum())
    }

    fn map(&self, window: Window) -> &WindowUsage {
        match window {
            Window::Daily => &self.daily,
            Window::Monthly => &self.monthly,
        }
    }
}

impl Default for UsageWindows {
    fn default() -> Self {
        Self::starting(Utc::now())
    }
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}
