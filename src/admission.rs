//! Admission control: per-client sliding-window rate limiting.
//!
//! Each client identity owns an ordered window of request timestamps.
//! Admission prunes entries older than the full window, then applies two
//! coupled ceilings: a short-horizon burst ceiling and the full-window
//! requests-per-minute ceiling. A background sweep evicts windows for
//! clients with no recent activity to bound memory.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Full sliding window covered by the rpm ceiling.
const WINDOW: Duration = Duration::from_secs(60);

/// Short horizon covered by the burst ceiling.
const BURST_WINDOW: Duration = Duration::from_secs(10);

/// Cadence of the idle-client eviction sweep.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Request admitted; the timestamp was recorded.
    Admitted,
    /// Request rejected by a ceiling.
    Rejected {
        /// Seconds until the rejecting window frees a slot.
        retry_after: u64,
    },
}

impl Admission {
    /// Whether the request was admitted.
    #[must_use]
    pub fn is_admitted(self) -> bool {
        matches!(self, Self::Admitted)
    }
}

/// Per-client request timestamp window.
#[derive(Debug)]
struct ClientWindow {
    hits: VecDeque<Instant>,
    last_seen: Instant,
}

impl ClientWindow {
    fn new() -> Self {
        Self {
            hits: VecDeque::new(),
            last_seen: Instant::now(),
        }
    }
}

/// Sliding-window rate limiter keyed by client identity.
///
/// The outer map lock is held only to look up or insert a client entry;
/// window mutation happens under a per-client lock so concurrent checks
/// for the same identity serialize and never double-admit past a ceiling.
#[derive(Debug)]
pub struct RateLimiter {
    rpm_ceiling: u32,
    burst_ceiling: u32,
    window: Duration,
    burst_window: Duration,
    clients: Mutex<HashMap<String, Arc<Mutex<ClientWindow>>>>,
}

impl RateLimiter {
    /// Construct with the standard 60-second window and 10-second burst
    /// horizon.
    #[must_use]
    pub fn new(rpm_ceiling: u32, burst_ceiling: u32) -> Self {
        Self::with_windows(rpm_ceiling, burst_ceiling, WINDOW, BURST_WINDOW)
    }

    /// Construct with explicit window durations.
    ///
    /// Primarily useful in tests that cannot wait out real windows.
    #[must_use]
    pub fn with_windows(
        rpm_ceiling: u32,
        burst_ceiling: u32,
        window: Duration,
        burst_window: Duration,
    ) -> Self {
        Self {
            rpm_ceiling,
            burst_ceiling,
            window,
            burst_window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Check and record one request for `client_id`.
    ///
    /// Prunes timestamps older than the full window, rejects when the
    /// burst-window count or the full-window count has reached its
    /// ceiling, otherwise records the current instant and admits.
    pub fn admit(&self, client_id: &str) -> Admission {
        let entry = {
            let mut clients = self
                .clients
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                clients
                    .entry(client_id.to_owned())
                    .or_insert_with(|| Arc::new(Mutex::new(ClientWindow::new()))),
            )
        };

        let mut window = entry.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        window.last_seen = now;

        // Drop timestamps that have left the full window.
        while let Some(front) = window.hits.front() {
            if now.duration_since(*front) >= self.window {
                window.hits.pop_front();
            } else {
                break;
            }
        }

        let burst_count = window
            .hits
            .iter()
            .rev()
            .take_while(|hit| now.duration_since(**hit) < self.burst_window)
            .count();

        if burst_count >= self.burst_ceiling as usize {
            let oldest_in_burst = window.hits.len() - burst_count;
            let retry_after = window
                .hits
                .get(oldest_in_burst)
                .map_or(1, |hit| retry_hint(*hit, self.burst_window, now));
            return Admission::Rejected { retry_after };
        }

        if window.hits.len() >= self.rpm_ceiling as usize {
            let retry_after = window
                .hits
                .front()
                .map_or(1, |hit| retry_hint(*hit, self.window, now));
            return Admission::Rejected { retry_after };
        }

        window.hits.push_back(now);
        Admission::Admitted
    }

    /// Number of client identities currently tracked.
    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Evict windows for clients idle longer than `idle`, returning the
    /// number of evicted identities.
    pub fn sweep_idle(&self, idle: Duration) -> usize {
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = clients.len();
        clients.retain(|_, entry| {
            let window = entry.lock().unwrap_or_else(PoisonError::into_inner);
            window.last_seen.elapsed() < idle
        });
        before - clients.len()
    }
}

/// Seconds until `hit` ages out of a window, rounded up, at least 1.
fn retry_hint(hit: Instant, window: Duration, now: Instant) -> u64 {
    let elapsed = now.duration_since(hit);
    let remaining = window.saturating_sub(elapsed);
    let mut secs = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        secs += 1;
    }
    secs.max(1)
}

/// Spawn the idle-client eviction background task.
///
/// The task runs every five minutes. On each tick it evicts windows for
/// clients with no activity in the last `idle` duration.
#[must_use]
pub fn spawn_sweep_task(
    limiter: Arc<RateLimiter>,
    idle: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("rate window sweep shutting down");
                    break;
                }
                _ = interval.tick() => {
                    let evicted = limiter.sweep_idle(idle);
                    if evicted > 0 {
                        info!(evicted, tracked = limiter.tracked_clients(), "evicted idle rate windows");
                    }
                }
            }
        }
    })
}
