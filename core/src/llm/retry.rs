//! Rate-limit aware failure classification.
//!
//! Quota windows are one minute long. The first rate-limit error inside a
//! window waits out the rest of the window and remembers how far into the
//! window it was; the next consecutive one waits that remembered offset and
//! resets the tracking.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{error, warn};

use super::backend::ModelError;

pub const DEFAULT_WINDOW_SECS: u64 = 60;

/// Source of "seconds elapsed in the current window"
pub trait WindowClock: Send + Sync {
    fn elapsed_in_window(&self, window_secs: u64) -> u64;
}

/// Wall clock: offset into the current minute (for a 60s window)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemWindowClock;

impl WindowClock for SystemWindowClock {
    fn elapsed_in_window(&self, window_secs: u64) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        now % window_secs.max(1)
    }
}

/// Coarse class of a backend status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    ResourceExhausted,
    BadRequest,
    ServiceUnavailable,
    Other,
}

impl StatusClass {
    pub fn from_code(code: u16) -> Self {
        match code {
            429 => Self::ResourceExhausted,
            400 => Self::BadRequest,
            503 => Self::ServiceUnavailable,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-issue the same request after waiting
    Retry(Duration),
    /// Abort the turn
    Fatal,
}

pub struct RetryPolicy {
    clock: Arc<dyn WindowClock>,
    window_secs: u64,
    pending_wait_secs: u64,
}

impl RetryPolicy {
    pub fn new(clock: Arc<dyn WindowClock>, window_secs: u64) -> Self {
        Self {
            clock,
            window_secs: window_secs.max(1),
            pending_wait_secs: 0,
        }
    }

    /// Offset remembered from the first rate-limit error of the window (0 = none)
    pub fn pending_wait_secs(&self) -> u64 {
        self.pending_wait_secs
    }

    pub fn reset(&mut self) {
        self.pending_wait_secs = 0;
    }

    pub fn classify(&mut self, err: &ModelError) -> RetryDecision {
        let Some(code) = err.status else {
            error!(target: "retry_policy", error = %err, "Model error without status code");
            return RetryDecision::Fatal;
        };

        match StatusClass::from_code(code) {
            StatusClass::ResourceExhausted => {
                let wait = if self.pending_wait_secs == 0 {
                    let elapsed = self.clock.elapsed_in_window(self.window_secs) % self.window_secs;
                    self.pending_wait_secs = elapsed;
                    self.window_secs - elapsed
                } else {
                    let wait = self.pending_wait_secs;
                    self.pending_wait_secs = 0;
                    wait
                };
                warn!(target: "retry_policy", wait_secs = wait, "Resource exhausted, please wait {} seconds to continue", wait);
                RetryDecision::Retry(Duration::from_secs(wait))
            }
            class => {
                error!(target: "retry_policy", status = code, ?class, error = %err, "Fatal model error");
                RetryDecision::Fatal
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Arc::new(SystemWindowClock), DEFAULT_WINDOW_SECS)
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("window_secs", &self.window_secs)
            .field("pending_wait_secs", &self.pending_wait_secs)
            .finish()
    }
}
