//! Shared status snapshot between the worker thread and observers.

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// Progress value meaning "busy, but no meaningful percentage".
pub const INDETERMINATE: f32 = -1.0;

/// Terminal result of a transcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The output file was written.
    Success,
    /// The transcode failed; the message describes why.
    Failed(String),
    /// The transcode was cancelled before completion.
    Cancelled,
}

#[derive(Debug)]
struct StatusState {
    message: String,
    progress: f32,
    outcome: Option<Outcome>,
    version: u64,
}

/// Status triple shared between the worker and any number of observers.
///
/// One mutex guards the message, the progress value and the outcome, so an
/// observer always reads a consistent triple. The worker updates in a fixed
/// order: a new step first publishes its message with the progress cleared
/// to [`INDETERMINATE`], then progress values follow. Every update bumps a
/// version counter and wakes [`wait_for_change`](StatusBoard::wait_for_change).
#[derive(Debug)]
pub struct StatusBoard {
    state: Mutex<StatusState>,
    changed: Condvar,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    /// Create a board in the idle state.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StatusState {
                message: "Idle".into(),
                progress: INDETERMINATE,
                outcome: None,
                version: 0,
            }),
            changed: Condvar::new(),
        }
    }

    /// Publish the start of a new step: message set, progress cleared.
    pub fn begin_step(&self, message: impl Into<String>) {
        let mut state = self.state.lock();
        state.message = message.into();
        state.progress = INDETERMINATE;
        state.version += 1;
        drop(state);
        self.changed.notify_all();
    }

    /// Publish a progress value in [0, 1] for the current step.
    pub fn set_progress(&self, progress: f32) {
        let mut state = self.state.lock();
        state.progress = progress;
        state.version += 1;
        drop(state);
        self.changed.notify_all();
    }

    /// Clear the outcome at the start of a run.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.message = "Starting...".into();
        state.progress = INDETERMINATE;
        state.outcome = None;
        state.version += 1;
        drop(state);
        self.changed.notify_all();
    }

    /// Publish the terminal outcome together with its closing message.
    pub fn finish(&self, outcome: Outcome, message: impl Into<String>) {
        let mut state = self.state.lock();
        state.message = message.into();
        state.progress = INDETERMINATE;
        state.outcome = Some(outcome);
        state.version += 1;
        drop(state);
        self.changed.notify_all();
    }

    /// Human-readable description of the current step.
    pub fn message(&self) -> String {
        self.state.lock().message.clone()
    }

    /// Progress of the current step in [0, 1], or [`INDETERMINATE`].
    pub fn progress(&self) -> f32 {
        self.state.lock().progress
    }

    /// Terminal outcome, or `None` while the transcode is still running.
    pub fn outcome(&self) -> Option<Outcome> {
        self.state.lock().outcome.clone()
    }

    /// Consistent (message, progress, outcome) snapshot.
    pub fn snapshot(&self) -> (String, f32, Option<Outcome>) {
        let state = self.state.lock();
        (state.message.clone(), state.progress, state.outcome.clone())
    }

    /// Block until any field changes or the timeout elapses.
    ///
    /// Returns false on timeout.
    pub fn wait_for_change(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        let seen = state.version;
        !self
            .changed
            .wait_while_for(&mut state, |state| state.version == seen, timeout)
            .timed_out()
    }
}
