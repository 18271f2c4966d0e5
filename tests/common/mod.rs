//! Shared helpers for the integration suites.
//!
//! Not every suite uses every helper.
#![allow(dead_code)]

pub mod fixtures;

use std::time::Duration;

/// Poll `cond` every few milliseconds until it holds or the deadline
/// passes. Returns whether the condition was met.
pub async fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    loop {
        if cond() {
            return true;
        }
        if start.elapsed() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Standard deadline for waiting on detached bot units.
pub const UNIT_DEADLINE: Duration = Duration::from_secs(2);

/// Long enough for a detached unit to have run if it was ever going to.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(150)).await;
}
