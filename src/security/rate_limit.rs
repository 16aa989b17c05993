//! Per-client fixed-window request throttle.
//!
//! Each client identity owns one window: a start timestamp and a request
//! count. The first request after a window has expired opens a fresh one.
//! Windows live in a `DashMap`, so the expiry check and the increment for one
//! key happen under that key's shard lock while other clients proceed in
//! parallel. Nothing here touches I/O.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::config::RateLimitConfig;

/// Quota applied to every client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleSettings {
    pub window_ms: u64,
    pub max_requests: u32,
}

impl From<&RateLimitConfig> for ThrottleSettings {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            window_ms: config.window_ms,
            max_requests: config.max_requests,
        }
    }
}

/// Result of counting one request against a client's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the client's current window closes.
    pub reset_after: Duration,
}

#[derive(Debug, Clone, Copy)]
struct ThrottleWindow {
    count: u32,
    started_at: u64,
}

impl ThrottleWindow {
    fn is_expired(&self, now: u64, window_ms: u64) -> bool {
        now.saturating_sub(self.started_at) >= window_ms
    }
}

/// Fixed-window throttle keyed by client identity.
pub struct ClientThrottle {
    windows: DashMap<String, ThrottleWindow>,
    settings: ArcSwap<ThrottleSettings>,
    clock: Arc<dyn Clock>,
}

impl ClientThrottle {
    pub fn new(settings: ThrottleSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            settings: ArcSwap::from_pointee(settings),
            clock,
        }
    }

    /// Count one request for `client` and report whether it is within quota.
    pub fn admit(&self, client: &str) -> bool {
        self.check(client).allowed
    }

    /// Count one request for `client` and return the full decision.
    ///
    /// Rejected requests still count; the counter saturates instead of wrapping.
    pub fn check(&self, client: &str) -> ThrottleDecision {
        let settings = **self.settings.load();
        let now = self.clock.now_millis();

        let mut window = self
            .windows
            .entry(client.to_owned())
            .or_insert(ThrottleWindow { count: 0, started_at: now });

        if window.is_expired(now, settings.window_ms) {
            window.count = 0;
            window.started_at = now;
        }
        window.count = window.count.saturating_add(1);

        let closes_at = window.started_at.saturating_add(settings.window_ms);
        ThrottleDecision {
            allowed: window.count <= settings.max_requests,
            limit: settings.max_requests,
            remaining: settings.max_requests.saturating_sub(window.count),
            reset_after: Duration::from_millis(closes_at.saturating_sub(now)),
        }
    }

    /// Replace the quota. Open windows keep their counts.
    pub fn reconfigure(&self, settings: ThrottleSettings) {
        self.settings.store(Arc::new(settings));
        tracing::info!(
            window_ms = settings.window_ms,
            max_requests = settings.max_requests,
            "Throttle quota updated"
        );
    }

    pub fn settings(&self) -> ThrottleSettings {
        **self.settings.load()
    }

    /// Drop every window that has expired. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let window_ms = self.settings.load().window_ms;
        let now = self.clock.now_millis();
        let before = self.windows.len();
        self.windows.retain(|_, window| !window.is_expired(now, window_ms));
        before.saturating_sub(self.windows.len())
    }

    /// Number of tracked clients.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

/// Periodically purge expired windows until shutdown is signalled.
pub fn spawn_sweeper(
    throttle: Arc<ClientThrottle>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let purged = throttle.purge_expired();
                    if purged > 0 {
                        tracing::debug!(
                            purged,
                            tracked = throttle.tracked_clients(),
                            "Purged expired throttle windows"
                        );
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
        tracing::debug!("Throttle sweeper stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn throttle(max_requests: u32, window_ms: u64) -> (ClientThrottle, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let throttle = ClientThrottle::new(
            ThrottleSettings { window_ms, max_requests },
            clock.clone(),
        );
        (throttle, clock)
    }

    #[test]
    fn nth_request_passes_and_next_is_rejected() {
        let (throttle, _) = throttle(20, 900_000);
        for i in 1..=20 {
            assert!(throttle.admit("10.0.0.1"), "request {i} should pass");
        }
        assert!(!throttle.admit("10.0.0.1"));
    }

    #[test]
    fn clients_are_counted_separately() {
        let (throttle, _) = throttle(1, 1_000);
        assert!(throttle.admit("a"));
        assert!(!throttle.admit("a"));
        assert!(throttle.admit("b"));
    }

    #[test]
    fn expired_window_starts_over() {
        let (throttle, clock) = throttle(2, 1_000);
        assert!(throttle.admit("a"));
        assert!(throttle.admit("a"));
        assert!(!throttle.admit("a"));

        clock.advance(999);
        assert!(!throttle.admit("a"));

        clock.advance(1);
        let decision = throttle.check("a");
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
        assert_eq!(decision.reset_after, Duration::from_millis(1_000));
    }

    #[test]
    fn decision_reports_remaining_and_reset() {
        let (throttle, clock) = throttle(3, 10_000);
        let first = throttle.check("a");
        assert_eq!(first.limit, 3);
        assert_eq!(first.remaining, 2);

        clock.advance(4_000);
        throttle.check("a");
        let third = throttle.check("a");
        assert!(third.allowed);
        assert_eq!(third.remaining, 0);
        assert_eq!(third.reset_after, Duration::from_millis(6_000));

        let fourth = throttle.check("a");
        assert!(!fourth.allowed);
        assert_eq!(fourth.remaining, 0);
    }

    #[test]
    fn count_saturates_instead_of_wrapping() {
        let (throttle, _) = throttle(u32::MAX, 1_000);
        throttle.windows.insert(
            "a".into(),
            ThrottleWindow { count: u32::MAX, started_at: 1_000_000 },
        );
        let decision = throttle.check("a");
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert_eq!(throttle.windows.get("a").unwrap().count, u32::MAX);
    }

    #[test]
    fn purge_drops_only_stale_windows() {
        let (throttle, clock) = throttle(5, 1_000);
        throttle.admit("old");
        clock.advance(600);
        throttle.admit("fresh");
        clock.advance(500);

        assert_eq!(throttle.purge_expired(), 1);
        assert_eq!(throttle.tracked_clients(), 1);
        assert!(throttle.windows.contains_key("fresh"));
    }

    #[test]
    fn reconfigure_applies_to_open_windows() {
        let (throttle, _) = throttle(5, 1_000);
        for _ in 0..3 {
            assert!(throttle.admit("a"));
        }
        throttle.reconfigure(ThrottleSettings { window_ms: 1_000, max_requests: 3 });
        assert!(!throttle.admit("a"));
        assert_eq!(throttle.settings().max_requests, 3);
    }

    #[test]
    fn concurrent_callers_never_exceed_quota() {
        let (throttle, _) = throttle(50, 60_000);
        let throttle = Arc::new(throttle);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let throttle = throttle.clone();
                std::thread::spawn(move || (0..25).filter(|_| throttle.admit("shared")).count())
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
    }

    #[tokio::test]
    async fn sweeper_stops_on_shutdown() {
        let (throttle, _) = throttle(5, 1_000);
        let (tx, rx) = broadcast::channel(1);
        let handle = spawn_sweeper(Arc::new(throttle), Duration::from_millis(10), rx);
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop")
            .unwrap();
    }
}
