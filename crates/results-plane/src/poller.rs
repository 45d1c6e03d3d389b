//! Deadline-bounded existence polling.
//!
//! A check runs at `t = 0, interval, 2*interval, ...` while the elapsed time
//! is below the deadline. Transport errors from a check are logged and read
//! as "not yet"; only the deadline ends a poll. Time comes from tokio, so a
//! paused runtime drives these loops without real sleeping.

use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::telemetry::{POLL_ATTEMPTS, POLL_TIMEOUTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PollProfile { pub max_wait_secs: u64, pub interval_secs: u64 }

impl PollProfile {
    pub const CLEANED_CSV: Self = Self::new(700, 2);
    pub const METADATA: Self = Self::new(700, 2);
    /// Applied to each visualization summary separately.
    pub const VISUALIZATION_SUMMARY: Self = Self::new(110, 1);
    /// One deadline shared by all six ML paths.
    pub const ML_BATCH: Self = Self::new(35, 1);

    pub const fn new(max_wait_secs: u64, interval_secs: u64) -> Self { Self { max_wait_secs, interval_secs } }
    pub fn max_wait(&self) -> Duration { Duration::from_secs(self.max_wait_secs) }
    // a zero interval would spin; floor it
    pub fn interval(&self) -> Duration { Duration::from_secs(self.interval_secs).max(Duration::from_millis(1)) }
}

/// Poll `check` until it reports `true` or the profile deadline passes.
pub async fn poll<F, Fut>(kind: &'static str, profile: PollProfile, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    let start = Instant::now();
    let mut attempts = 0u64;
    while start.elapsed() < profile.max_wait() {
        attempts += 1;
        POLL_ATTEMPTS.with_label_values(&[kind]).inc();
        match check().await {
            Ok(true) => {
                debug!(kind, attempts, elapsed_secs=start.elapsed().as_secs(), "poll.found");
                return true;
            }
            Ok(false) => {}
            Err(e) => warn!(kind, attempts, error=%e, "poll.transient_error"),
        }
        tokio::time::sleep(profile.interval()).await;
    }
    POLL_TIMEOUTS.with_label_values(&[kind]).inc();
    warn!(kind, attempts, max_wait_secs=profile.max_wait_secs, "poll.timeout");
    false
}

/// Poll `count` independent targets under one shared deadline.
///
/// `check(i)` is called only for targets not yet seen; a target observed once
/// stays found. Stops early when every target has been seen. Returns, per
/// target in target order, the zero-based tick on which it was first seen.
pub async fn poll_all<F, Fut>(kind: &'static str, profile: PollProfile, count: usize, mut check: F) -> Vec<Option<u64>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    let start = Instant::now();
    let mut seen_at: Vec<Option<u64>> = vec![None; count];
    let mut tick = 0u64;
    while start.elapsed() < profile.max_wait() {
        for (i, slot) in seen_at.iter_mut().enumerate() {
            if slot.is_some() { continue; }
            POLL_ATTEMPTS.with_label_values(&[kind]).inc();
            match check(i).await {
                Ok(true) => *slot = Some(tick),
                Ok(false) => {}
                Err(e) => warn!(kind, target=i, error=%e, "poll.transient_error"),
            }
        }
        tick += 1;
        if seen_at.iter().all(Option::is_some) {
            debug!(kind, ticks=tick, "poll.all_found");
            return seen_at;
        }
        tokio::time::sleep(profile.interval()).await;
    }
    if !seen_at.iter().all(Option::is_some) { POLL_TIMEOUTS.with_label_values(&[kind]).inc(); }
    debug!(kind, ticks=tick, found=seen_at.iter().flatten().count(), "poll.batch_deadline");
    seen_at
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Number of checks a poll that never succeeds will make.
    fn max_attempts(profile: PollProfile) -> u64 {
        (profile.max_wait().as_millis() as u64).div_ceil(profile.interval().as_millis() as u64)
    }
    use std::sync::atomic::{AtomicU64, Ordering};

    #[tokio::test(start_paused = true)]
    async fn never_true_exhausts_bounded_attempts() {
        let calls = AtomicU64::new(0);
        let profile = PollProfile::new(10, 2);
        let started = Instant::now();
        let ok = poll("test", profile, || { calls.fetch_add(1, Ordering::SeqCst); async { anyhow::Ok(false) } }).await;
        assert!(!ok);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(max_attempts(profile), 5);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_first_success() {
        let calls = AtomicU64::new(0);
        let started = Instant::now();
        let ok = poll("test", PollProfile::CLEANED_CSV, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { anyhow::Ok(n == 3) }
        }).await;
        assert!(ok);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_do_not_abort() {
        let calls = AtomicU64::new(0);
        let ok = poll("test", PollProfile::new(20, 1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { if n < 4 { Err(anyhow::anyhow!("connection reset")) } else { Ok(true) } }
        }).await;
        assert!(ok);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn full_profile_attempt_counts() {
        assert_eq!(max_attempts(PollProfile::CLEANED_CSV), 350);
        let calls = AtomicU64::new(0);
        assert!(!poll("test", PollProfile::VISUALIZATION_SUMMARY, || { calls.fetch_add(1, Ordering::SeqCst); async { anyhow::Ok(false) } }).await);
        assert_eq!(calls.load(Ordering::SeqCst), 110);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_accumulates_and_never_rechecks() {
        let checks: Vec<AtomicU64> = (0..3).map(|_| AtomicU64::new(0)).collect();
        let started = Instant::now();
        // target i becomes visible on tick i+1, then flickers away again
        let found = poll_all("test", PollProfile::ML_BATCH, 3, |i| {
            let n = checks[i].fetch_add(1, Ordering::SeqCst) + 1;
            async move { anyhow::Ok(n == (i as u64) + 1) }
        }).await;
        assert_eq!(found, vec![Some(0), Some(1), Some(2)]);
        assert_eq!(checks.iter().map(|c| c.load(Ordering::SeqCst)).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn batch_runs_to_deadline_when_partial() {
        let ticks = AtomicU64::new(0);
        let found = poll_all("test", PollProfile::new(5, 1), 2, |i| {
            if i == 1 { ticks.fetch_add(1, Ordering::SeqCst); }
            async move { if i == 0 { Ok(true) } else { Err(anyhow::anyhow!("503")) } }
        }).await;
        assert_eq!(found, vec![Some(0), None]);
        assert_eq!(ticks.load(Ordering::SeqCst), 5);
    }
}
