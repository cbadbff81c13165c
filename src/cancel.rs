//! Cooperative cancellation for long-running transfers
//!
//! A [`CancelToken`] is checked between I/O steps. It trips when the user
//! interrupts (Ctrl-C) or when its deadline passes.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Exit code used when a second interrupt forces an immediate exit
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Why a token stopped the operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupted {
    #[error("operation cancelled")]
    Cancelled,
    #[error("operation deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug, Default)]
struct Shared {
    cancelled: AtomicBool,
    signals: AtomicU8,
}

/// Cloneable cancellation flag with an optional deadline
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    shared: Arc<Shared>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of this token that also expires after `timeout`
    ///
    /// The cancel flag stays shared with `self`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            shared: Arc::clone(&self.shared),
            deadline: Some(match self.deadline {
                Some(existing) if existing < deadline => existing,
                _ => deadline,
            }),
        }
    }

    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, if one is set
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Fail if cancelled or past the deadline
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Interrupted::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Route Ctrl-C to this token
    ///
    /// The first interrupt cancels the token so in-flight work can unwind
    /// and release temporary files. A second interrupt exits immediately.
    /// Must be called at most once per process.
    pub fn install_ctrlc(&self) -> Result<(), ctrlc::Error> {
        let shared = Arc::clone(&self.shared);
        ctrlc::set_handler(move || {
            let count = shared.signals.fetch_add(1, Ordering::SeqCst);
            match count {
                0 => {
                    shared.cancelled.store(true, Ordering::SeqCst);
                    eprintln!("\nInterrupted, cleaning up...");
                }
                1 => {
                    eprintln!("\nReceived second interrupt, exiting immediately");
                    std::process::exit(EXIT_CODE_INTERRUPTED);
                }
                _ => {}
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_token_passes() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());
        assert!(token.remaining().is_none());
    }

    #[test]
    fn test_cancel_is_shared_across_clones() {
        let token = CancelToken::new();
        let clone = token.with_timeout(Duration::from_secs(60));
        token.cancel();
        assert_eq!(clone.check(), Err(Interrupted::Cancelled));
    }

    #[test]
    fn test_deadline() {
        let token = CancelToken::new().with_timeout(Duration::ZERO);
        assert_eq!(token.check(), Err(Interrupted::DeadlineExceeded));
    }

    #[test]
    fn test_with_timeout_keeps_earlier_deadline() {
        let short = CancelToken::new().with_timeout(Duration::from_secs(1));
        let longer = short.with_timeout(Duration::from_secs(3600));
        assert_eq!(short.deadline(), longer.deadline());
    }
}
