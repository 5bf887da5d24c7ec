//! Admission control.
//!
//! Two policies with different failure modes:
//! - [`PerClientWindow`] rejects: a client over its sliding-window limit gets
//!   `RateLimited` immediately and nothing is executed.
//! - [`GlobalPacing`] suspends: every caller is delayed until the shared
//!   spacing has elapsed since the previous admitted call.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::cache::Sweep;
use crate::error::RateLimited;

/// Longest window a [`PerClientWindow`] accepts.
pub const MAX_CLIENT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Sliding-window limiter keyed by client identity.
pub struct PerClientWindow {
    limit: usize,
    window: Duration,
    clients: DashMap<String, VecDeque<Instant>>,
}

impl PerClientWindow {
    /// `limit` is clamped to at least 1, `window` to [`MAX_CLIENT_WINDOW`].
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window: window.min(MAX_CLIENT_WINDOW),
            clients: DashMap::new(),
        }
    }

    pub fn per_minute(limit: usize) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn check(&self, client: &str) -> Result<(), RateLimited> {
        self.check_at(client, Instant::now())
    }

    /// Admit iff fewer than `limit` requests from `client` fall inside
    /// `(now - window, now]`. A rejected call leaves the window untouched.
    pub fn check_at(&self, client: &str, now: Instant) -> Result<(), RateLimited> {
        let mut entry = self.clients.entry(client.to_string()).or_default();
        let stamps = entry.value_mut();

        let in_window = stamps
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < self.window)
            .count();

        if in_window >= self.limit {
            let oldest = stamps
                .iter()
                .find(|t| now.saturating_duration_since(**t) < self.window)
                .copied()
                .unwrap_or(now);
            let retry_after = oldest
                .checked_add(self.window)
                .map_or(self.window, |end| end.saturating_duration_since(now));
            debug!(target: "ratelimit", in_window, limit = self.limit, "client rejected");
            return Err(RateLimited { retry_after });
        }

        while stamps
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= self.window)
        {
            stamps.pop_front();
        }
        stamps.push_back(now);
        Ok(())
    }

    /// Requests from `client` currently counted in the window.
    pub fn in_window(&self, client: &str) -> usize {
        let now = Instant::now();
        self.clients
            .get(client)
            .map(|s| {
                s.iter()
                    .filter(|t| now.saturating_duration_since(**t) < self.window)
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    /// Drop expired timestamps and forget clients with nothing left in the window.
    pub fn prune_idle(&self) -> usize {
        let now = Instant::now();
        let before = self.clients.len();
        self.clients.retain(|_, stamps| {
            stamps.retain(|t| now.saturating_duration_since(*t) < self.window);
            !stamps.is_empty()
        });
        before - self.clients.len()
    }
}

impl Sweep for PerClientWindow {
    fn sweep(&self) -> usize {
        self.prune_idle()
    }

    fn label(&self) -> &'static str {
        "client_windows"
    }
}

/// Process-wide spacing between consecutive calls to one upstream.
///
/// The lock is held across the wait, so admissions are serialized in lock
/// order. A waiter dropped mid-sleep releases the lock without touching
/// `last`.
pub struct GlobalPacing {
    spacing: Duration,
    last: Mutex<Option<Instant>>,
}

impl GlobalPacing {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            last: Mutex::new(None),
        }
    }

    /// `rate` calls per minute, clamped to at least 1.
    pub fn per_minute(rate: u32) -> Self {
        Self::new(Duration::from_secs(60) / rate.max(1))
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Wait until the call may proceed and record it as the latest admission.
    pub async fn acquire(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.spacing;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub async fn last_call(&self) -> Option<Instant> {
        *self.last.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_window_is_clamped() {
        let rl = PerClientWindow::new(1, Duration::from_secs(u64::MAX));
        let now = Instant::now();
        assert!(rl.check_at("a", now).is_ok());
        let err = rl.check_at("a", now).unwrap_err();
        assert_eq!(err.retry_after, MAX_CLIENT_WINDOW);
    }

    #[test]
    fn per_client_counts_are_independent() {
        let rl = PerClientWindow::new(2, Duration::from_secs(60));
        let now = Instant::now();
        assert!(rl.check_at("a", now).is_ok());
        assert!(rl.check_at("a", now).is_ok());
        assert!(rl.check_at("a", now).is_err());
        assert!(rl.check_at("b", now).is_ok());
    }

    #[test]
    fn rejection_does_not_consume_capacity() {
        let rl = PerClientWindow::new(1, Duration::from_secs(10));
        let t0 = Instant::now();
        rl.check_at("c", t0).unwrap();
        for s in 1..5 {
            let err = rl.check_at("c", t0 + Duration::from_secs(s)).unwrap_err();
            assert_eq!(err.retry_after, Duration::from_secs(10 - s));
        }
        assert!(rl.check_at("c", t0 + Duration::from_secs(10)).is_ok());
    }

    #[test]
    fn zero_limit_is_clamped() {
        let rl = PerClientWindow::new(0, Duration::from_secs(1));
        assert_eq!(rl.limit(), 1);
        assert!(rl.check("x").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn prune_forgets_idle_clients() {
        let rl = PerClientWindow::new(5, Duration::from_secs(60));
        rl.check("idle").unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        rl.check("active").unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(rl.sweep(), 1);
        assert_eq!(rl.tracked_clients(), 1);
        assert_eq!(rl.in_window("active"), 1);
    }

    #[test]
    fn per_minute_spacing() {
        assert_eq!(GlobalPacing::per_minute(10).spacing(), Duration::from_secs(6));
        assert_eq!(GlobalPacing::per_minute(0).spacing(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn first_call_is_immediate_then_spaced() {
        let p = GlobalPacing::new(Duration::from_secs(6));
        let t0 = Instant::now();
        p.acquire().await;
        assert_eq!(t0.elapsed(), Duration::ZERO);
        p.acquire().await;
        assert!(t0.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_waiter_leaves_no_trace() {
        let p = GlobalPacing::new(Duration::from_secs(6));
        p.acquire().await;
        let first = p.last_call().await;

        let res = tokio::time::timeout(Duration::from_secs(1), p.acquire()).await;
        assert!(res.is_err());
        assert_eq!(p.last_call().await, first);
    }
}
