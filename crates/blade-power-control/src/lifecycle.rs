//! Power executor state machine.
//!
//! This module defines the phases a power change moves through and the
//! transitions allowed between them.
//!
//! # State Machine
//!
//! ```text
//!     ┌──────────┐
//!     │   Idle   │
//!     └────┬─────┘
//!          │ (spawn submission)
//!          ▼
//!     ┌────────────┐
//!     │ Submitting │
//!     └────┬───────┘
//!          │ (start polling)
//!          ▼
//!     ┌──────────┐
//!     │ Polling  │──────────────┬───────────────┬──────────────┐
//!     └────┬─────┘              │               │              │
//!          │ (done)             │ (bound hit)   │ (error)      │ (cancel)
//!          ▼                    ▼               ▼              ▼
//!     ┌──────────┐        ┌──────────┐     ┌──────────┐   ┌───────────┐
//!     │   Done   │        │ TimedOut │     │  Failed  │   │ Cancelled │
//!     └──────────┘        └──────────┘     └──────────┘   └───────────┘
//! ```

use std::fmt;

use crate::error::{PowerError, Result};

/// Phase of a power change execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutorPhase {
    /// Orchestrator reset, nothing started.
    Idle,
    /// The desired state is being submitted concurrently.
    Submitting,
    /// Task status is being checked at fixed intervals.
    Polling,
    /// The change is confirmed, already in effect, or the task ended.
    Done,
    /// The iteration bound was reached before completion.
    TimedOut,
    /// Submission or polling failed.
    Failed,
    /// The caller cancelled the execution.
    Cancelled,
}

impl fmt::Display for ExecutorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Validates a phase transition and returns the target phase if valid.
///
/// # Errors
///
/// Returns `PowerError::Internal` if the transition is not allowed.
pub fn validate_transition(from: ExecutorPhase, to: ExecutorPhase) -> Result<ExecutorPhase> {
    if is_valid_transition(from, to) {
        Ok(to)
    } else {
        Err(PowerError::Internal(format!(
            "invalid executor transition from {from} to {to}"
        )))
    }
}

/// Check if a phase transition is valid according to the state machine.
#[must_use]
pub const fn is_valid_transition(from: ExecutorPhase, to: ExecutorPhase) -> bool {
    use ExecutorPhase::{Cancelled, Done, Failed, Idle, Polling, Submitting, TimedOut};

    matches!(
        (from, to),
        (Idle, Submitting)
            | (Submitting, Polling)
            | (Polling, Done | TimedOut | Failed | Cancelled)
    )
}

/// Returns the list of valid target phases from the given phase.
#[must_use]
pub fn valid_transitions_from(phase: ExecutorPhase) -> Vec<ExecutorPhase> {
    use ExecutorPhase::{Cancelled, Done, Failed, Idle, Polling, Submitting, TimedOut};

    match phase {
        Idle => vec![Submitting],
        Submitting => vec![Polling],
        Polling => vec![Done, TimedOut, Failed, Cancelled],
        Done | TimedOut | Failed | Cancelled => vec![],
    }
}

/// Returns true if the execution has ended.
#[must_use]
pub const fn is_terminal(phase: ExecutorPhase) -> bool {
    matches!(
        phase,
        ExecutorPhase::Done
            | ExecutorPhase::TimedOut
            | ExecutorPhase::Failed
            | ExecutorPhase::Cancelled
    )
}
