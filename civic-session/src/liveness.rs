use std::sync::Arc;
use std::time::Duration;

use civic_api::ChatBackend;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::identity::IdentityResolver;
use crate::store::SessionStore;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// One-shot signal that the client must be torn down and relaunched.
///
/// Cloned handles share the latch. [`trigger`](Self::trigger) flips it with a
/// single atomic check-and-set and reports whether this call was the one that
/// fired it.
#[derive(Debug, Clone)]
pub struct ResetLatch {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ResetLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl ResetLatch {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|fired| !std::mem::replace(fired, true))
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the latch has fired.
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

/// Result of a single liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessCheck {
    NoCredential,
    Valid,
    /// `reset` is true only for the check that fired the reset.
    Invalid { reset: bool },
}

/// Re-validates the stored credential on a fixed interval and fires the
/// reset latch the first time it is found invalid.
///
/// There is no backoff and no warning before the reset. A failed check
/// (transport error included) counts as invalid.
pub struct LivenessPoller<B, S> {
    backend: Arc<B>,
    identity: IdentityResolver<S>,
    latch: ResetLatch,
    interval: Duration,
}

impl<B, S> LivenessPoller<B, S>
where
    B: ChatBackend + 'static,
    S: SessionStore + 'static,
{
    pub fn new(backend: Arc<B>, store: Arc<S>, latch: ResetLatch) -> Self {
        Self {
            backend,
            identity: IdentityResolver::new(store),
            latch,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub async fn check(&self) -> LivenessCheck {
        let Some(token) = self.identity.credential() else {
            return LivenessCheck::NoCredential;
        };

        let valid = match self.backend.validate_token(&token).await {
            Ok(valid) => valid,
            Err(e) => {
                debug!(error = %e, "Token validation failed");
                false
            }
        };
        if valid {
            return LivenessCheck::Valid;
        }

        let reset = self.latch.trigger();
        if reset {
            warn!("Credential is no longer valid, resetting client");
            self.identity.sign_out();
        }
        LivenessCheck::Invalid { reset }
    }

    /// Polls until the credential disappears or the reset fires.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the first check is one
        // interval after start.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match self.check().await {
                LivenessCheck::Valid => {}
                LivenessCheck::NoCredential => {
                    debug!("Credential removed, liveness polling stopped");
                    break;
                }
                LivenessCheck::Invalid { .. } => break,
            }
        }
    }

    /// Spawns [`run`](Self::run). Returns `None`, starting nothing, when no
    /// credential is stored.
    pub fn spawn(self) -> Option<JoinHandle<()>> {
        self.identity.credential()?;
        debug!(interval_ms = self.interval.as_millis() as u64, "Starting liveness polling");
        Some(tokio::spawn(self.run()))
    }
}
