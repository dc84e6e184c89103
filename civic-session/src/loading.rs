use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Visible progress of a send cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoadingState {
    #[default]
    Idle,
    Processing,
    Thinking,
    Generating,
    Done,
}

impl LoadingState {
    /// True when a new send may start.
    pub fn is_settled(&self) -> bool {
        matches!(self, LoadingState::Idle | LoadingState::Done)
    }

    pub fn label(&self) -> Option<&'static str> {
        match self {
            LoadingState::Processing => Some("Processing Message"),
            LoadingState::Thinking => Some("Thinking & Reasoning"),
            LoadingState::Generating => Some("Generating Response"),
            LoadingState::Idle | LoadingState::Done => None,
        }
    }
}

/// Offsets from send start at which the cosmetic phases begin, plus the
/// minimum time before `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadingSchedule {
    pub thinking_at: Duration,
    pub generating_at: Duration,
    pub floor: Duration,
}

impl Default for LoadingSchedule {
    fn default() -> Self {
        Self {
            thinking_at: Duration::from_millis(300),
            generating_at: Duration::from_millis(600),
            floor: Duration::from_millis(900),
        }
    }
}

/// Owns the current [`LoadingState`] and publishes every change.
#[derive(Debug)]
pub struct LoadingMachine {
    tx: watch::Sender<LoadingState>,
    schedule: LoadingSchedule,
}

impl Default for LoadingMachine {
    fn default() -> Self {
        Self::new(LoadingSchedule::default())
    }
}

impl LoadingMachine {
    pub fn new(schedule: LoadingSchedule) -> Self {
        let (tx, _) = watch::channel(LoadingState::Idle);
        Self { tx, schedule }
    }

    pub fn state(&self) -> LoadingState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoadingState> {
        self.tx.subscribe()
    }

    pub fn schedule(&self) -> LoadingSchedule {
        self.schedule
    }

    /// Starts a cycle if none is in flight.
    ///
    /// The settled-to-`Processing` transition is a single check-and-set, so
    /// two racing callers cannot both start.
    pub fn begin(&self) -> Option<SendCycle<'_>> {
        let started = self.tx.send_if_modified(|state| {
            if state.is_settled() {
                *state = LoadingState::Processing;
                true
            } else {
                false
            }
        });
        started.then(|| {
            debug!("Send cycle started");
            SendCycle {
                machine: self,
                started_at: Instant::now(),
            }
        })
    }

    /// Moves forward to `next` only while a cycle is still in flight.
    fn advance(&self, next: LoadingState) {
        self.tx.send_if_modified(|state| {
            if !state.is_settled() && *state < next {
                *state = next;
                true
            } else {
                false
            }
        });
    }

    /// Resets to `Idle`. Has no effect while a cycle is in flight.
    pub fn reset(&self) {
        self.tx.send_if_modified(|state| {
            if *state == LoadingState::Done {
                *state = LoadingState::Idle;
                true
            } else {
                false
            }
        });
    }
}

/// One in-flight send. Settles the machine to `Done` when dropped, so an
/// abandoned send never leaves it stuck.
#[derive(Debug)]
pub struct SendCycle<'a> {
    machine: &'a LoadingMachine,
    started_at: Instant,
}

impl SendCycle<'_> {
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// The cosmetic phase chain: fixed offsets from send start, ending at the
    /// floor.
    async fn phases(&self) {
        let schedule = self.machine.schedule;
        sleep_until(self.started_at + schedule.thinking_at).await;
        self.machine.advance(LoadingState::Thinking);
        sleep_until(self.started_at + schedule.generating_at).await;
        self.machine.advance(LoadingState::Generating);
        sleep_until(self.started_at + schedule.floor).await;
    }

    /// Drives `reply` alongside the phase chain and resolves at the later of
    /// the reply and the floor. The phases fire on schedule even when the
    /// reply is already in.
    pub async fn run<F: Future>(&self, reply: F) -> F::Output {
        let (output, ()) = tokio::join!(reply, self.phases());
        output
    }

    /// Ends the cycle. Dropping the cycle publishes `Done`.
    pub fn finish(self) {}
}

impl Drop for SendCycle<'_> {
    fn drop(&mut self) {
        self.machine.tx.send_replace(LoadingState::Done);
        debug!(
            elapsed_ms = self.started_at.elapsed().as_millis() as u64,
            "Send cycle done"
        );
    }
}
