use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStatus {
    pub limit: usize,
    pub used: usize,
    pub reset_at: Option<DateTime<Utc>>,
}

/// Sliding-window rate limiter shared by all callers of one adapter.
///
/// The window holds the start timestamps of the last `window` of calls.
/// When the next call would exceed `capacity`, the caller sleeps until the
/// oldest in-window timestamp ages out. Waiters go through a fair queue, so
/// progression is FIFO.
pub struct SlidingWindowLimiter {
    capacity: usize,
    window: Duration,
    turn: Mutex<()>,
    starts: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            window,
            turn: Mutex::new(()),
            starts: Mutex::new(VecDeque::new()),
        }
    }

    /// Capacity per 60-second window, the provider default shape.
    pub fn per_minute(capacity: usize) -> Self {
        Self::new(capacity, Duration::from_secs(60))
    }

    /// Reserve one call slot, sleeping as long as the window is full.
    pub async fn acquire(&self) {
        // tokio mutexes queue waiters fairly; holding `turn` for the whole
        // wait keeps overtaking callers out.
        let _turn = self.turn.lock().await;
        loop {
            let wait = {
                let mut starts = self.starts.lock().await;
                let now = Instant::now();
                Self::evict(&mut starts, self.window, now);
                if starts.len() < self.capacity {
                    starts.push_back(now);
                    return;
                }
                *starts.front().expect("window full implies non-empty") + self.window - now
            };
            tokio::time::sleep(wait).await;
        }
    }

    pub async fn status(&self) -> RateLimitStatus {
        let mut starts = self.starts.lock().await;
        let now = Instant::now();
        Self::evict(&mut starts, self.window, now);
        let reset_at = starts.front().map(|oldest| {
            let remaining = (*oldest + self.window).saturating_duration_since(now);
            Utc::now() + chrono::Duration::from_std(remaining).unwrap_or_default()
        });
        RateLimitStatus {
            limit: self.capacity,
            used: starts.len(),
            reset_at,
        }
    }

    fn evict(starts: &mut VecDeque<Instant>, window: Duration, now: Instant) {
        while let Some(front) = starts.front() {
            if *front + window <= now {
                starts.pop_front();
            } else {
                break;
            }
        }
    }
}
