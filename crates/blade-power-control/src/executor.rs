//! Submit-and-poll power executor.
//!
//! The executor resets a [`PowerTask`], submits the desired power state on a
//! spawned task, and polls the resulting remote task at fixed intervals until
//! it completes, fails, or the iteration bound is reached.
//!
//! The submission reports back through its `JoinHandle`, so a failed request
//! surfaces as an error from [`PowerExecutor::execute`] instead of being
//! mistaken for completion. A timeout is reported as
//! [`PowerOutcome::TimedOut`]; use [`PowerReport::into_result`] to treat it as
//! an error. A submission still running when polling ends is aborted.

use std::sync::Arc;
use std::time::Duration;

use blade_power_core::{PowerState, TaskHandle, TaskLifecycle};
use chrono::Utc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::client::HardwareClient;
use crate::error::{PowerError, Result};
use crate::lifecycle::{self, ExecutorPhase};
use crate::observer::{PowerEvent, PowerObserver, TracingObserver};
use crate::orchestrator::PowerTask;
use crate::types::{PowerOutcome, PowerReport, SubmitOutcome};

/// Drives a [`PowerTask`] through one power change.
pub struct PowerExecutor<C: HardwareClient + 'static> {
    task: PowerTask<C>,
    observer: Arc<dyn PowerObserver>,
}

/// The spawned submission and what it reported.
struct Submission {
    handle: Option<JoinHandle<SubmitOutcome>>,
    already_satisfied: bool,
}

impl Submission {
    fn is_pending(&self) -> bool {
        self.handle.is_some()
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn join_submission(
    handle: &mut Option<JoinHandle<SubmitOutcome>>,
) -> std::result::Result<SubmitOutcome, JoinError> {
    match handle {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// Tracks the executor phase and rejects invalid transitions.
struct PhaseTracker(ExecutorPhase);

impl PhaseTracker {
    fn advance(&mut self, to: ExecutorPhase) -> Result<()> {
        let from = self.0;
        self.0 = lifecycle::validate_transition(from, to)?;
        tracing::debug!(from = %from, to = %to, "Power executor phase change");
        Ok(())
    }
}

struct Polled {
    iterations: u32,
    task_failed: bool,
}

impl<C: HardwareClient + 'static> PowerExecutor<C> {
    /// Create an executor that logs progress through `tracing`.
    #[must_use]
    pub fn new(task: PowerTask<C>) -> Self {
        Self::with_observer(task, Arc::new(TracingObserver))
    }

    /// Create an executor reporting progress to `observer`.
    #[must_use]
    pub fn with_observer(task: PowerTask<C>, observer: Arc<dyn PowerObserver>) -> Self {
        Self { task, observer }
    }

    /// Get the underlying power task.
    #[must_use]
    pub const fn task(&self) -> &PowerTask<C> {
        &self.task
    }

    /// Set the blade to `target` and wait for the change to finish.
    ///
    /// # Errors
    ///
    /// See [`PowerExecutor::execute_with_cancel`].
    pub async fn execute(&self, target: PowerState) -> Result<PowerReport> {
        self.execute_with_cancel(target, CancellationToken::new())
            .await
    }

    /// Set the blade to `target`, waiting until the change completes, the
    /// iteration bound is reached, or `cancel` fires.
    ///
    /// Polling time is bounded by `max_iterations * wait_time` plus the
    /// latency of the remote calls.
    ///
    /// # Errors
    ///
    /// - `PowerError::Submission` if the change could not be submitted
    /// - `PowerError::Transport` / `PowerError::Decode` if a task status check
    ///   fails
    /// - `PowerError::Cancelled` if `cancel` fires first
    pub async fn execute_with_cancel(
        &self,
        target: PowerState,
        cancel: CancellationToken,
    ) -> Result<PowerReport> {
        let started_at = Utc::now();
        let mut phase = PhaseTracker(ExecutorPhase::Idle);

        self.task.reset_task();

        let submitter = self.task.clone();
        let mut submission = Submission {
            handle: Some(tokio::spawn(async move {
                submitter.submit_desired_state(target).await
            })),
            already_satisfied: false,
        };
        phase.advance(ExecutorPhase::Submitting)?;

        // Give the submission a chance to run before the first check.
        tokio::task::yield_now().await;
        phase.advance(ExecutorPhase::Polling)?;

        let polled = match self.poll(target, &mut submission, &cancel).await {
            Ok(polled) => polled,
            Err(e) => {
                submission.abort();
                return Err(self.fail(&mut phase, e));
            }
        };

        // The loop can see `done` before the submission result has been joined.
        if let Some(handle) = submission.handle.take() {
            if self.task.is_done() || handle.is_finished() {
                let joined = handle.await;
                if let Err(e) = self.absorb(target, &mut submission, joined) {
                    return Err(self.fail(&mut phase, e));
                }
            } else {
                tracing::debug!(desired = %target, "Aborting power state submission still in flight");
                handle.abort();
            }
        }

        let outcome = if polled.task_failed {
            PowerOutcome::TaskFailed
        } else if self.task.is_done() {
            if submission.already_satisfied {
                PowerOutcome::AlreadySatisfied
            } else {
                PowerOutcome::Completed
            }
        } else {
            PowerOutcome::TimedOut
        };

        if outcome == PowerOutcome::TimedOut {
            phase.advance(ExecutorPhase::TimedOut)?;
            self.observer.on_event(&PowerEvent::TimedOut {
                target,
                hardware: self.task.hardware().name,
                iterations: polled.iterations,
            });
        } else {
            phase.advance(ExecutorPhase::Done)?;
        }

        self.observer
            .on_event(&PowerEvent::Finished { target, outcome });

        let task = self.task.current_task();
        Ok(PowerReport {
            target,
            outcome,
            iterations: polled.iterations,
            task: task.exists().then_some(task),
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn poll(
        &self,
        target: PowerState,
        submission: &mut Submission,
        cancel: &CancellationToken,
    ) -> Result<Polled> {
        let config = *self.task.config();
        let mut polled = Polled {
            iterations: 0,
            task_failed: false,
        };

        while !self.task.is_done() && polled.iterations < config.max_iterations {
            let task = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(PowerError::Cancelled),
                task = self.task.query_task_status() => task?,
            };
            polled.iterations += 1;

            match task.filter(TaskHandle::exists) {
                Some(task) => {
                    let lifecycle = task.lifecycle();
                    if lifecycle == TaskLifecycle::Failed {
                        tracing::error!(
                            task_uri = %task.uri,
                            task_state = %task.task_state,
                            status = %task.task_status,
                            "Power task failed"
                        );
                        polled.task_failed = true;
                    }
                    if lifecycle.is_terminal() {
                        self.task.mark_done();
                    }
                    self.observer.on_event(&PowerEvent::Progress {
                        target,
                        percent: task.computed_percent_complete,
                        status: task.task_status,
                    });
                }
                None => self.observer.on_event(&PowerEvent::Waiting { target }),
            }

            if !self.task.is_done() {
                self.wait(target, config.wait_time(), submission, cancel)
                    .await?;
            }
        }

        Ok(polled)
    }

    /// Sleep for `wait_time`, handling the submission result if it arrives.
    ///
    /// Returns early only if the submission leaves the attempt done.
    async fn wait(
        &self,
        target: PowerState,
        wait_time: Duration,
        submission: &mut Submission,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let sleep = tokio::time::sleep(wait_time);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(PowerError::Cancelled),
                joined = join_submission(&mut submission.handle), if submission.is_pending() => {
                    submission.handle = None;
                    self.absorb(target, submission, joined)?;
                    if self.task.is_done() {
                        return Ok(());
                    }
                }
                () = &mut sleep => return Ok(()),
            }
        }
    }

    fn absorb(
        &self,
        target: PowerState,
        submission: &mut Submission,
        joined: std::result::Result<SubmitOutcome, JoinError>,
    ) -> Result<()> {
        match joined {
            Ok(SubmitOutcome::AlreadySatisfied) => {
                submission.already_satisfied = true;
                Ok(())
            }
            Ok(SubmitOutcome::Submitted(task)) => {
                self.observer.on_event(&PowerEvent::Submitted {
                    target,
                    task_uri: task.uri,
                });
                Ok(())
            }
            Ok(SubmitOutcome::Failed(e)) => Err(PowerError::Submission(Box::new(e))),
            Ok(SubmitOutcome::Superseded) => Err(PowerError::Cancelled),
            Err(e) => Err(PowerError::Internal(format!(
                "power state submission did not finish: {e}"
            ))),
        }
    }

    fn fail(&self, phase: &mut PhaseTracker, error: PowerError) -> PowerError {
        let to = if matches!(error, PowerError::Cancelled) {
            ExecutorPhase::Cancelled
        } else {
            ExecutorPhase::Failed
        };
        if let Err(e) = phase.advance(to) {
            tracing::error!(error = %e, "Unexpected power executor phase");
        }
        tracing::error!(
            hardware = %self.task.hardware().name,
            error = %error,
            "Power task execution failed"
        );
        error
    }
}
