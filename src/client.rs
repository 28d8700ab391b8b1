//! HTTP client construction and request pacing
//!
//! Two kinds of upstream calls exist: short-timeout best-effort probes to
//! local tuner devices, and longer guide/lineup requests. Both use clients
//! built here. `WindowPacer` spaces successive guide windows apart so the
//! cloud service is not hammered.

use std::time::{Duration, Instant};

use tokio::time::sleep;

use crate::error::Result;

/// Default timeout for guide and lineup requests, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default timeout for per-device discovery probes, in seconds
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

/// Build a reqwest client with the given request timeout.
pub fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;
    Ok(client)
}

/// Paces guide-window requests a minimum interval apart
///
/// The pacer only counts successful windows: fallback attempts within one
/// window are not delayed, so a 403 storm is resolved as fast as the
/// rotation allows. Waiting happens at an `.await`, so dropping the fetch
/// future cancels the wait immediately.
pub struct WindowPacer {
    /// Minimum interval between successful windows
    min_interval: Duration,
    /// When the previous window completed, if any
    last_window: Option<Instant>,
}

impl WindowPacer {
    /// Create a pacer with the given minimum interval between windows.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_window: None,
        }
    }

    /// Wait until the minimum interval since the previous window has
    /// elapsed. The first call never waits.
    pub async fn acquire(&mut self) {
        if let Some(last) = self.last_window {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        self.last_window = Some(Instant::now());
    }

    /// Get the minimum interval between windows
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}
