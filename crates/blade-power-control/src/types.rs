//! Request and result types for power operations.

use std::fmt;

use blade_power_core::{PowerControl, PowerState, TaskHandle};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{PowerError, Result};

/// HTTP method of a call to the appliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestMethod {
    /// `GET`
    Get,
    /// `PUT`
    Put,
}

impl RestMethod {
    /// The method name as sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
        }
    }
}

impl fmt::Display for RestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RestMethod> for reqwest::Method {
    fn from(method: RestMethod) -> Self {
        match method {
            RestMethod::Get => Self::GET,
            RestMethod::Put => Self::PUT,
        }
    }
}

/// Body of `PUT <hardware-uri>/powerState`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerRequest {
    /// Requested power state.
    pub power_state: PowerState,
    /// How the transition is carried out.
    pub power_control: PowerControl,
}

impl PowerRequest {
    /// Request `target` with a momentary press, the only control the
    /// executor uses.
    #[must_use]
    pub const fn momentary_press(target: PowerState) -> Self {
        Self {
            power_state: target,
            power_control: PowerControl::MomentaryPress,
        }
    }
}

/// Result of submitting a desired power state.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The blade was already in the requested state; nothing was sent.
    AlreadySatisfied,
    /// The change was accepted and is tracked by this task.
    Submitted(TaskHandle),
    /// The change could not be submitted.
    Failed(PowerError),
    /// The task was reset before the change was sent; nothing was sent.
    Superseded,
}

/// How a power change attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerOutcome {
    /// The blade was already in the requested state.
    AlreadySatisfied,
    /// The appliance reported the task as completed.
    Completed,
    /// The appliance reported the task as failed.
    TaskFailed,
    /// The iteration bound was reached before the task completed.
    TimedOut,
}

impl PowerOutcome {
    /// Returns true if the requested state is known to be in effect.
    #[must_use]
    pub const fn is_confirmed(self) -> bool {
        matches!(self, Self::AlreadySatisfied | Self::Completed)
    }
}

/// Summary of a finished power change attempt.
#[derive(Debug, Clone, Serialize)]
pub struct PowerReport {
    /// Requested power state.
    pub target: PowerState,
    /// How the attempt ended.
    pub outcome: PowerOutcome,
    /// Number of task status checks performed.
    pub iterations: u32,
    /// Last known state of the remote task, if one was submitted.
    pub task: Option<TaskHandle>,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
    /// When the attempt finished.
    pub finished_at: DateTime<Utc>,
}

impl PowerReport {
    /// Convert unconfirmed outcomes into errors.
    ///
    /// # Errors
    ///
    /// Returns `PowerError::Timeout` for [`PowerOutcome::TimedOut`] and
    /// `PowerError::TaskFailed` for [`PowerOutcome::TaskFailed`].
    pub fn into_result(self) -> Result<Self> {
        match self.outcome {
            PowerOutcome::AlreadySatisfied | PowerOutcome::Completed => Ok(self),
            PowerOutcome::TimedOut => Err(PowerError::Timeout {
                iterations: self.iterations,
            }),
            PowerOutcome::TaskFailed => {
                let task = self.task.unwrap_or_default();
                Err(PowerError::TaskFailed {
                    uri: task.uri,
                    state: task.task_state,
                    status: task.task_status,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: PowerOutcome, task: Option<TaskHandle>) -> PowerReport {
        let now = Utc::now();
        PowerReport {
            target: PowerState::Off,
            outcome,
            iterations: 3,
            task,
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn power_request_body() {
        let body = serde_json::to_value(PowerRequest::momentary_press(PowerState::Off)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"powerState": "Off", "powerControl": "MomentaryPress"})
        );
    }

    #[test]
    fn confirmed_outcomes() {
        assert!(PowerOutcome::AlreadySatisfied.is_confirmed());
        assert!(PowerOutcome::Completed.is_confirmed());
        assert!(!PowerOutcome::TimedOut.is_confirmed());
        assert!(!PowerOutcome::TaskFailed.is_confirmed());
    }

    #[test]
    fn timed_out_report_into_error() {
        let result = report(PowerOutcome::TimedOut, None).into_result();
        assert!(matches!(result, Err(PowerError::Timeout { iterations: 3 })));
    }

    #[test]
    fn failed_task_report_into_error() {
        let task = TaskHandle {
            uri: "/rest/tasks/9".to_string(),
            task_state: "Error".to_string(),
            task_status: "Unable to power off".to_string(),
            ..TaskHandle::default()
        };
        match report(PowerOutcome::TaskFailed, Some(task)).into_result() {
            Err(PowerError::TaskFailed { uri, state, .. }) => {
                assert_eq!(uri, "/rest/tasks/9");
                assert_eq!(state, "Error");
            }
            other => panic!("expected TaskFailed, got {other:?}"),
        }
    }

    #[test]
    fn completed_report_is_ok() {
        assert!(report(PowerOutcome::Completed, None).into_result().is_ok());
    }

    #[test]
    fn reqwest_method_mapping() {
        assert_eq!(reqwest::Method::from(RestMethod::Put), reqwest::Method::PUT);
        assert_eq!(RestMethod::Get.to_string(), "GET");
    }
}
