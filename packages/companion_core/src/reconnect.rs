//! Fixed-delay reconnect loop for clients.
//!
//! There is no backoff growth and no attempt limit. The loop stops when an
//! attempt finishes cleanly or when its cancellation token fires.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// An attempt returned `Ok`; the conversation ended on purpose.
    Finished { attempts: u64 },
    Cancelled { attempts: u64 },
}

pub struct Reconnector {
    delay: Duration,
    cancel: CancellationToken,
}

impl Reconnector {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            cancel: CancellationToken::new(),
        }
    }

    /// Handle that stops the loop from anywhere (Ctrl-C, `/quit`, stdin EOF).
    pub fn handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Call `attempt` until it returns `Ok` or the loop is cancelled.
    ///
    /// `attempt` receives the 1-based attempt number. An in-flight attempt is
    /// dropped when the token fires.
    pub async fn run<F, Fut, E>(&self, mut attempt: F) -> ReconnectOutcome
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let mut attempts = 0u64;
        loop {
            if self.cancel.is_cancelled() {
                return ReconnectOutcome::Cancelled { attempts };
            }
            attempts += 1;

            tokio::select! {
                result = attempt(attempts) => match result {
                    Ok(()) => return ReconnectOutcome::Finished { attempts },
                    Err(e) => warn!(attempt = attempts, error = %e, "connection attempt ended"),
                },
                _ = self.cancel.cancelled() => return ReconnectOutcome::Cancelled { attempts },
            }

            info!(delay_secs = self.delay.as_secs_f32(), "reconnecting");
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = self.cancel.cancelled() => return ReconnectOutcome::Cancelled { attempts },
            }
        }
    }
}
