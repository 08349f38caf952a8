//! Remote task handles.
//!
//! A power change is carried out asynchronously by the appliance, which
//! answers the request with a task resource. The handle is refreshed by
//! fetching that resource until its state reaches [`TASK_COMPLETED`].

use serde::{Deserialize, Serialize};

/// Task state reported once the appliance has finished the operation.
pub const TASK_COMPLETED: &str = "Completed";

/// A reference to an asynchronous operation tracked by the appliance.
///
/// An empty `uri` means no task has been submitted yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskHandle {
    /// URI of the task resource.
    pub uri: String,
    /// Display name of the task.
    pub name: String,
    /// User or service that owns the task.
    pub owner: String,
    /// Lifecycle state, e.g. `Running` or `Completed`.
    pub task_state: String,
    /// Human-readable status message.
    pub task_status: String,
    /// Completion percentage reported by the appliance.
    pub computed_percent_complete: u32,
}

impl TaskHandle {
    /// Returns true if a task has been recorded.
    #[must_use]
    pub fn exists(&self) -> bool {
        !self.uri.is_empty()
    }

    /// Returns true if the task state matches [`TASK_COMPLETED`], ignoring case.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.task_state.eq_ignore_ascii_case(TASK_COMPLETED)
    }

    /// Classify the task state.
    #[must_use]
    pub fn lifecycle(&self) -> TaskLifecycle {
        TaskLifecycle::classify(&self.task_state)
    }

    /// Merge a decoded response into this handle.
    ///
    /// Fields missing from the response keep their previous value, so a
    /// refresh that omits the URI still leaves the task trackable.
    pub fn apply(&mut self, update: TaskUpdate) {
        if let Some(uri) = update.uri {
            self.uri = uri;
        }
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(owner) = update.owner {
            self.owner = owner;
        }
        if let Some(task_state) = update.task_state {
            self.task_state = task_state;
        }
        if let Some(task_status) = update.task_status {
            self.task_status = task_status;
        }
        if let Some(percent) = update.computed_percent_complete {
            self.computed_percent_complete = percent;
        }
    }
}

/// A partially populated task resource as decoded from a response body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    /// URI of the task resource.
    pub uri: Option<String>,
    /// Display name of the task.
    pub name: Option<String>,
    /// Owner of the task.
    pub owner: Option<String>,
    /// Lifecycle state.
    pub task_state: Option<String>,
    /// Status message.
    pub task_status: Option<String>,
    /// Completion percentage.
    pub computed_percent_complete: Option<u32>,
}

/// Coarse classification of a task state string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskLifecycle {
    /// Accepted or still executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Ended without completing (error, killed, terminated, interrupted).
    Failed,
    /// Empty or unrecognized state.
    Unknown,
}

impl TaskLifecycle {
    /// Classify a task state string, ignoring case.
    #[must_use]
    pub fn classify(state: &str) -> Self {
        const RUNNING: [&str; 6] = ["New", "Pending", "Starting", "Running", "Stopping", "Suspended"];
        const FAILED: [&str; 4] = ["Error", "Killed", "Terminated", "Interrupted"];

        let is_one_of = |names: &[&str]| names.iter().any(|n| state.eq_ignore_ascii_case(n));

        if state.eq_ignore_ascii_case(TASK_COMPLETED) {
            Self::Completed
        } else if is_one_of(&FAILED) {
            Self::Failed
        } else if is_one_of(&RUNNING) {
            Self::Running
        } else {
            Self::Unknown
        }
    }

    /// Returns true if the task will not make further progress.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_handle_is_empty() {
        let task = TaskHandle::default();
        assert!(!task.exists());
        assert!(!task.is_completed());
        assert_eq!(task.lifecycle(), TaskLifecycle::Unknown);
    }

    #[test]
    fn completion_ignores_case() {
        let mut task = TaskHandle {
            uri: "/rest/tasks/1".to_string(),
            ..TaskHandle::default()
        };
        for state in ["Completed", "COMPLETED", "completed"] {
            task.task_state = state.to_string();
            assert!(task.is_completed(), "state {state}");
        }
        task.task_state = "Running".to_string();
        assert!(!task.is_completed());
    }

    #[test]
    fn decode_from_appliance_json() {
        let json = r#"{
            "type": "TaskResourceV2",
            "uri": "/rest/tasks/AB12",
            "name": "Power off",
            "owner": "Administrator",
            "taskState": "Running",
            "taskStatus": "Powering off server",
            "computedPercentComplete": 40
        }"#;

        let task: TaskHandle = serde_json::from_str(json).unwrap();
        assert_eq!(task.uri, "/rest/tasks/AB12");
        assert_eq!(task.owner, "Administrator");
        assert_eq!(task.computed_percent_complete, 40);
        assert_eq!(task.lifecycle(), TaskLifecycle::Running);
    }

    #[test]
    fn apply_keeps_missing_fields() {
        let mut task = TaskHandle {
            uri: "/rest/tasks/AB12".to_string(),
            name: "Power off".to_string(),
            task_state: "Running".to_string(),
            computed_percent_complete: 40,
            ..TaskHandle::default()
        };

        let update: TaskUpdate =
            serde_json::from_str(r#"{"taskState":"Completed","computedPercentComplete":100}"#)
                .unwrap();
        task.apply(update);

        assert_eq!(task.uri, "/rest/tasks/AB12");
        assert_eq!(task.name, "Power off");
        assert!(task.is_completed());
        assert_eq!(task.computed_percent_complete, 100);
    }

    #[test]
    fn lifecycle_classification() {
        assert_eq!(TaskLifecycle::classify("completed"), TaskLifecycle::Completed);
        assert_eq!(TaskLifecycle::classify("Error"), TaskLifecycle::Failed);
        assert_eq!(TaskLifecycle::classify("KILLED"), TaskLifecycle::Failed);
        assert_eq!(TaskLifecycle::classify("pending"), TaskLifecycle::Running);
        assert_eq!(TaskLifecycle::classify("Warning"), TaskLifecycle::Unknown);
        assert!(TaskLifecycle::Failed.is_terminal());
        assert!(!TaskLifecycle::Running.is_terminal());
    }
}
