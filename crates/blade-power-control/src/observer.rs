//! Progress reporting for power executions.
//!
//! The executor reports what it observes through a [`PowerObserver`]. The
//! default [`TracingObserver`] turns events into log lines; callers can plug
//! in their own observer to drive a progress display.

use blade_power_core::PowerState;

use crate::types::PowerOutcome;

/// Something the executor observed while driving a power change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerEvent {
    /// The appliance accepted the change and returned a task.
    Submitted {
        /// Requested power state.
        target: PowerState,
        /// URI of the task tracking the change.
        task_uri: String,
    },
    /// A task status check returned a task.
    Progress {
        /// Requested power state.
        target: PowerState,
        /// Completion percentage.
        percent: u32,
        /// Status message reported by the appliance.
        status: String,
    },
    /// A status check ran before any task was known.
    Waiting {
        /// Requested power state.
        target: PowerState,
    },
    /// The iteration bound was reached without completion.
    TimedOut {
        /// Requested power state.
        target: PowerState,
        /// Name of the hardware.
        hardware: String,
        /// Number of status checks performed.
        iterations: u32,
    },
    /// The execution finished.
    Finished {
        /// Requested power state.
        target: PowerState,
        /// How it ended.
        outcome: PowerOutcome,
    },
}

/// Receives events from the power executor.
pub trait PowerObserver: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &PowerEvent);
}

/// Observer that logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PowerObserver for TracingObserver {
    fn on_event(&self, event: &PowerEvent) {
        match event {
            PowerEvent::Submitted { target, task_uri } => {
                tracing::debug!(desired = %target, task_uri = %task_uri, "Power state change submitted");
            }
            PowerEvent::Progress {
                target,
                percent,
                status,
            } => {
                tracing::info!(desired = %target, percent, status = %status, "Working on power state");
            }
            PowerEvent::Waiting { target } => {
                tracing::info!(desired = %target, "Working on power state");
            }
            PowerEvent::TimedOut {
                target,
                hardware,
                iterations,
            } => {
                tracing::warn!(
                    desired = %target,
                    hardware = %hardware,
                    iterations,
                    "Power state change timed out"
                );
            }
            PowerEvent::Finished { target, outcome } => {
                tracing::info!(desired = %target, outcome = ?outcome, "Power task execution completed");
            }
        }
    }
}
