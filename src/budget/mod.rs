/*!
Token budget accounting for the metered generation resource.

The [`TokenBudgetTracker`] meters every generation call against rolling
daily and monthly windows, at provider scope and per (provider, model).
Windows reset lazily on the first call past a boundary; all state survives
restart through the configured [`Store`](crate::store::Store).
*/

mod tracker;
mod usage;

pub use tracker::{Admission, BudgetError, BudgetStatus, PersistedBudgetState, TokenBudgetTracker};
pub use usage::{TokenBudget, UsageCounter, UsageWindows, Window, WindowUsage};
