//! Power task orchestration.
//!
//! A [`PowerTask`] holds everything known about one power change attempt on
//! one blade: the latest hardware description, the observed power state, the
//! remote task tracking the change, and whether the attempt is done.
//!
//! The state is shared between the submission (which runs as a spawned task)
//! and the executor's polling loop, so it lives behind a mutex. The lock is
//! never held across a remote call. Every write that follows a remote call is
//! tagged with the attempt it belongs to and dropped if the task was reset in
//! the meantime.

use std::sync::Arc;

use blade_power_core::{PowerState, ServerHardware, TaskHandle, TaskUpdate};
use parking_lot::Mutex;

use crate::client::HardwareClient;
use crate::config::PowerTaskConfig;
use crate::error::{PowerError, Result};
use crate::types::{PowerRequest, RestMethod, SubmitOutcome};

#[derive(Debug, Clone, Default)]
struct TaskState {
    hardware: ServerHardware,
    state: PowerState,
    done: bool,
    task: TaskHandle,
    attempt: u64,
}

/// A point-in-time copy of a power task's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerTaskSnapshot {
    /// Latest hardware description.
    pub hardware: ServerHardware,
    /// Last observed power state.
    pub state: PowerState,
    /// Whether the current attempt is finished.
    pub done: bool,
    /// Current remote task; empty if none was submitted.
    pub task: TaskHandle,
}

/// Per-blade power change state and the operations that drive it.
pub struct PowerTask<C: HardwareClient> {
    client: Arc<C>,
    shared: Arc<Mutex<TaskState>>,
    config: PowerTaskConfig,
}

impl<C: HardwareClient> Clone for PowerTask<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            shared: Arc::clone(&self.shared),
            config: self.config,
        }
    }
}

impl<C: HardwareClient> PowerTask<C> {
    /// Create a power task for `hardware`.
    #[must_use]
    pub fn new(client: Arc<C>, hardware: ServerHardware, config: PowerTaskConfig) -> Self {
        Self {
            client,
            shared: Arc::new(Mutex::new(TaskState {
                hardware,
                ..TaskState::default()
            })),
            config,
        }
    }

    /// Create with default timing (36 checks, 10 seconds apart).
    #[must_use]
    pub fn with_defaults(client: Arc<C>, hardware: ServerHardware) -> Self {
        Self::new(client, hardware, PowerTaskConfig::default())
    }

    /// Get the timing configuration.
    #[must_use]
    pub const fn config(&self) -> &PowerTaskConfig {
        &self.config
    }

    /// Last observed power state.
    #[must_use]
    pub fn state(&self) -> PowerState {
        self.shared.lock().state
    }

    /// Whether the current attempt is finished.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.shared.lock().done
    }

    /// Current remote task; empty if none was submitted.
    #[must_use]
    pub fn current_task(&self) -> TaskHandle {
        self.shared.lock().task.clone()
    }

    /// Latest hardware description.
    #[must_use]
    pub fn hardware(&self) -> ServerHardware {
        self.shared.lock().hardware.clone()
    }

    /// Copy the whole state under a single lock.
    #[must_use]
    pub fn snapshot(&self) -> PowerTaskSnapshot {
        let state = self.shared.lock();
        PowerTaskSnapshot {
            hardware: state.hardware.clone(),
            state: state.state,
            done: state.done,
            task: state.task.clone(),
        }
    }

    /// Clear the attempt: state `Unknown`, not done, no task.
    ///
    /// Must be called before each new attempt so a completion flag from a
    /// previous attempt cannot leak into the next one. Results of remote
    /// calls started before the reset are discarded.
    pub fn reset_task(&self) {
        let mut state = self.shared.lock();
        state.state = PowerState::Unknown;
        state.done = false;
        state.task = TaskHandle::default();
        state.attempt += 1;
    }

    /// Mark the current attempt as finished.
    pub(crate) fn mark_done(&self) {
        self.shared.lock().done = true;
    }

    fn attempt(&self) -> u64 {
        self.shared.lock().attempt
    }

    fn is_current(&self, attempt: u64) -> bool {
        self.shared.lock().attempt == attempt
    }

    /// Apply `f` if no reset happened since `attempt` was read.
    fn with_current<R>(&self, attempt: u64, f: impl FnOnce(&mut TaskState) -> R) -> Option<R> {
        let mut state = self.shared.lock();
        if state.attempt == attempt {
            Some(f(&mut state))
        } else {
            tracing::debug!(
                attempt,
                current = state.attempt,
                "Discarding result from a superseded power attempt"
            );
            None
        }
    }

    /// Fetch the hardware and classify its power state.
    ///
    /// On success the observed state and the hardware description are
    /// replaced with the fresh values.
    ///
    /// # Errors
    ///
    /// Returns `PowerError::MissingHardwareReference` if the hardware has no
    /// URI (the observed state is set to `Unknown` first). Transport and
    /// decode failures from the lookup are returned unchanged.
    pub async fn query_current_state(&self) -> Result<PowerState> {
        self.query_current_state_for(self.attempt()).await
    }

    async fn query_current_state_for(&self, attempt: u64) -> Result<PowerState> {
        let uri = {
            let mut state = self.shared.lock();
            if !state.hardware.has_reference() {
                if state.attempt == attempt {
                    state.state = PowerState::Unknown;
                }
                return Err(PowerError::MissingHardwareReference);
            }
            state.hardware.uri.clone()
        };

        let hardware = self.client.get_hardware(&uri).await?;
        tracing::debug!(uri = %uri, hardware = ?hardware, "Fetched server hardware");

        let observed = PowerState::classify(&hardware.power_state);

        self.with_current(attempt, |state| {
            state.state = observed;
            state.hardware = hardware;
        });

        Ok(observed)
    }

    /// Submit `target` unless the blade is already in that state.
    ///
    /// This never returns an error: the outcome reports what happened so it
    /// can be handed back from a spawned task. A failed change request or an
    /// undecodable response marks the attempt done; a failed state query
    /// leaves it untouched. No change is sent once the task has been reset
    /// after the submission started.
    pub async fn submit_desired_state(&self, target: PowerState) -> SubmitOutcome {
        let attempt = self.attempt();

        let observed = match self.query_current_state_for(attempt).await {
            Ok(observed) => observed,
            Err(e) => {
                tracing::error!(error = %e, "Error getting current power state");
                return SubmitOutcome::Failed(e);
            }
        };

        if observed == target {
            tracing::info!(state = %observed, "Desired power state already set");
            self.with_current(attempt, |state| state.done = true);
            return SubmitOutcome::AlreadySatisfied;
        }

        if !self.is_current(attempt) {
            tracing::debug!(desired = %target, "Power task was reset, not sending power state request");
            return SubmitOutcome::Superseded;
        }

        let hardware = self.hardware();
        let uri = hardware.power_state_uri();
        tracing::info!(
            desired = %target,
            hardware = %hardware.name,
            serial_number = %hardware.serial_number,
            "Powering server"
        );

        let outcome = self.send_power_request(&uri, target).await;
        match &outcome {
            Ok(task) => {
                self.with_current(attempt, |state| state.task = task.clone());
            }
            Err(e) => {
                tracing::error!(uri = %uri, error = %e, "Error with power state request");
                self.with_current(attempt, |state| state.done = true);
            }
        }

        match outcome {
            Ok(task) => SubmitOutcome::Submitted(task),
            Err(e) => SubmitOutcome::Failed(e),
        }
    }

    async fn send_power_request(&self, uri: &str, target: PowerState) -> Result<TaskHandle> {
        let body = serde_json::to_value(PowerRequest::momentary_press(target))
            .map_err(|e| PowerError::Internal(format!("failed to encode power request: {e}")))?;
        tracing::debug!(uri = %uri, body = %body, "Sending power state request");

        let data = self.client.rest_call(RestMethod::Put, uri, Some(body)).await?;
        tracing::debug!(uri = %uri, response = %data, "Power state request accepted");

        let update: TaskUpdate = serde_json::from_str(&data).map_err(|e| PowerError::decode(uri, e))?;
        let mut task = TaskHandle::default();
        task.apply(update);
        Ok(task)
    }

    /// Refresh the current remote task.
    ///
    /// Returns `Ok(None)` without any remote call when no task has been
    /// recorded yet. Otherwise fetches the task URI, merges the response into
    /// the stored handle, and returns the refreshed handle.
    ///
    /// # Errors
    ///
    /// Transport and decode failures are returned to the caller.
    pub async fn query_task_status(&self) -> Result<Option<TaskHandle>> {
        let (uri, attempt) = {
            let state = self.shared.lock();
            (state.task.uri.clone(), state.attempt)
        };

        if uri.is_empty() {
            tracing::debug!("No task submitted yet, nothing to poll");
            return Ok(None);
        }

        let data = self.client.rest_call(RestMethod::Get, &uri, None).await?;
        tracing::debug!(uri = %uri, response = %data, "Fetched task status");

        let update: TaskUpdate = serde_json::from_str(&data).map_err(|e| PowerError::decode(&uri, e))?;

        Ok(self.with_current(attempt, |state| {
            state.task.apply(update);
            state.task.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockHardwareClient;

    const BLADE: &str = "/rest/server-hardware/30373237";
    const POWER_URI: &str = "/rest/server-hardware/30373237/powerState";
    const TASK: &str = "/rest/tasks/AB12";

    fn blade(power_state: &str) -> ServerHardware {
        ServerHardware {
            uri: BLADE.to_string(),
            name: "Encl1, bay 3".to_string(),
            serial_number: "SGH100X6J1".to_string(),
            power_state: power_state.to_string(),
        }
    }

    fn setup(power_state: &str) -> (PowerTask<MockHardwareClient>, Arc<MockHardwareClient>) {
        let client = Arc::new(MockHardwareClient::with_hardware(blade(power_state)));
        let task = PowerTask::new(
            Arc::clone(&client),
            ServerHardware::from_uri(BLADE),
            PowerTaskConfig::new(3, 1),
        );
        (task, client)
    }

    fn task_json(state: &str, percent: u32) -> String {
        format!(
            r#"{{"uri":"{TASK}","name":"Power off","owner":"Administrator","taskState":"{state}","taskStatus":"Powering off","computedPercentComplete":{percent}}}"#
        )
    }

    #[tokio::test]
    async fn query_current_state_updates_hardware() {
        let (task, _client) = setup("on");

        let state = task.query_current_state().await.unwrap();

        assert_eq!(state, PowerState::On);
        assert_eq!(task.state(), PowerState::On);
        assert_eq!(task.hardware().name, "Encl1, bay 3");
    }

    #[tokio::test]
    async fn query_current_state_without_uri() {
        let client = Arc::new(MockHardwareClient::new());
        let task = PowerTask::with_defaults(Arc::clone(&client), ServerHardware::default());

        let result = task.query_current_state().await;

        assert!(matches!(result, Err(PowerError::MissingHardwareReference)));
        assert_eq!(task.state(), PowerState::Unknown);
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn query_current_state_propagates_transport_error() {
        let (task, client) = setup("On");
        client.fail(RestMethod::Get, BLADE, "connection refused");

        let result = task.query_current_state().await;

        assert!(matches!(result, Err(PowerError::Transport { .. })));
        assert_eq!(task.state(), PowerState::Unknown);
    }

    #[tokio::test]
    async fn query_current_state_unknown_power_string() {
        let (task, _client) = setup("PoweringOff");

        assert_eq!(task.query_current_state().await.unwrap(), PowerState::Unknown);
    }

    #[tokio::test]
    async fn submit_already_satisfied_makes_no_change_call() {
        let (task, client) = setup("Off");

        let outcome = task.submit_desired_state(PowerState::Off).await;

        assert!(matches!(outcome, SubmitOutcome::AlreadySatisfied));
        assert!(task.is_done());
        assert!(!task.current_task().exists());
        assert_eq!(client.method_count(RestMethod::Put), 0);
    }

    #[tokio::test]
    async fn submit_sends_one_momentary_press() {
        let (task, client) = setup("On");
        client.respond(RestMethod::Put, POWER_URI, task_json("Running", 0));

        let outcome = task.submit_desired_state(PowerState::Off).await;

        let SubmitOutcome::Submitted(handle) = outcome else {
            panic!("expected Submitted, got {outcome:?}");
        };
        assert_eq!(handle.uri, TASK);
        assert_eq!(task.current_task(), handle);
        assert!(!task.is_done());

        let puts: Vec<_> = client
            .calls()
            .into_iter()
            .filter(|c| c.method == RestMethod::Put)
            .collect();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].uri, POWER_URI);
        assert_eq!(
            puts[0].body,
            Some(serde_json::json!({"powerState": "Off", "powerControl": "MomentaryPress"}))
        );
    }

    #[tokio::test]
    async fn submit_transport_failure_marks_done() {
        let (task, client) = setup("Off");
        client.fail(RestMethod::Put, POWER_URI, "appliance unavailable");

        let outcome = task.submit_desired_state(PowerState::On).await;

        assert!(matches!(
            outcome,
            SubmitOutcome::Failed(PowerError::Transport { .. })
        ));
        assert!(task.is_done());
        assert!(!task.current_task().exists());
    }

    #[tokio::test]
    async fn submit_decode_failure_marks_done() {
        let (task, client) = setup("Off");
        client.respond(RestMethod::Put, POWER_URI, "<html>gateway timeout</html>");

        let outcome = task.submit_desired_state(PowerState::On).await;

        assert!(matches!(outcome, SubmitOutcome::Failed(PowerError::Decode { .. })));
        assert!(task.is_done());
    }

    #[tokio::test]
    async fn submit_query_failure_sends_nothing() {
        let client = Arc::new(MockHardwareClient::new());
        let task = PowerTask::with_defaults(Arc::clone(&client), ServerHardware::default());

        let outcome = task.submit_desired_state(PowerState::On).await;

        assert!(matches!(
            outcome,
            SubmitOutcome::Failed(PowerError::MissingHardwareReference)
        ));
        assert!(!task.is_done());
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn query_task_status_without_task_is_noop() {
        let (task, client) = setup("On");

        assert!(task.query_task_status().await.unwrap().is_none());
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn query_task_status_merges_response() {
        let (task, client) = setup("On");
        client.respond(RestMethod::Put, POWER_URI, task_json("Running", 0));
        client.respond(
            RestMethod::Get,
            TASK,
            r#"{"taskState":"Completed","computedPercentComplete":100}"#,
        );
        task.submit_desired_state(PowerState::Off).await;

        let handle = task.query_task_status().await.unwrap().unwrap();

        assert_eq!(handle.uri, TASK);
        assert_eq!(handle.owner, "Administrator");
        assert!(handle.is_completed());
        assert_eq!(handle.computed_percent_complete, 100);
        assert_eq!(task.current_task(), handle);
    }

    #[tokio::test]
    async fn query_task_status_propagates_errors() {
        let (task, client) = setup("On");
        client.respond(RestMethod::Put, POWER_URI, task_json("Running", 0));
        task.submit_desired_state(PowerState::Off).await;

        client.fail(RestMethod::Get, TASK, "connection reset");
        assert!(matches!(
            task.query_task_status().await,
            Err(PowerError::Transport { .. })
        ));

        let (task, client) = setup("On");
        client.respond(RestMethod::Put, POWER_URI, task_json("Running", 0));
        client.respond(RestMethod::Get, TASK, "not json");
        task.submit_desired_state(PowerState::Off).await;
        assert!(matches!(
            task.query_task_status().await,
            Err(PowerError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn reset_task_restores_initial_state() {
        let (task, client) = setup("On");
        client.respond(RestMethod::Put, POWER_URI, task_json("Running", 10));
        task.submit_desired_state(PowerState::Off).await;
        task.mark_done();

        task.reset_task();

        let snapshot = task.snapshot();
        assert_eq!(snapshot.state, PowerState::Unknown);
        assert!(!snapshot.done);
        assert_eq!(snapshot.task, TaskHandle::default());
        // Hardware reference survives the reset
        assert_eq!(snapshot.hardware.uri, BLADE);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_discards_in_flight_submission() {
        let (task, client) = setup("On");
        client.respond(RestMethod::Put, POWER_URI, task_json("Running", 0));
        client.set_latency(std::time::Duration::from_millis(500));

        let submitter = task.clone();
        let handle = tokio::spawn(async move { submitter.submit_desired_state(PowerState::Off).await });

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        task.reset_task();

        let outcome = handle.await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Superseded));
        assert_eq!(client.method_count(RestMethod::Put), 0);
        // The stale query result did not leak into the new attempt
        assert!(!task.current_task().exists());
        assert_eq!(task.state(), PowerState::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_after_query_discards_state_write() {
        let (task, client) = setup("Off");
        client.set_latency(std::time::Duration::from_millis(500));

        let submitter = task.clone();
        let handle = tokio::spawn(async move { submitter.submit_desired_state(PowerState::Off).await });

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        task.reset_task();

        // The query belongs to the attempt the submission started in
        assert!(matches!(handle.await.unwrap(), SubmitOutcome::AlreadySatisfied));
        assert!(!task.is_done());
        assert_eq!(task.state(), PowerState::Unknown);
    }
}
