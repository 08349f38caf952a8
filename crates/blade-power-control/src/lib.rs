//! Power control for blades behind a management appliance.
//!
//! Changing a blade's power state is asynchronous on the appliance: the
//! request returns a task resource that must be polled until it completes.
//! This crate submits the change and polls the task with a bounded number of
//! fixed-interval checks.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       PowerExecutor                         │
//! │  ┌─────────────────────┐      ┌──────────────────────────┐  │
//! │  │  spawned submission │      │  bounded poll loop       │  │
//! │  │  (query + PUT)      │      │  (task status + sleep)   │  │
//! │  └─────────────────────┘      └──────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!                │ shared state (hardware, state, done, task)
//!                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         PowerTask                           │
//! └─────────────────────────────────────────────────────────────┘
//!                │
//!                ▼
//!        ┌────────────────┐        ┌──────────────────────┐
//!        │ HardwareClient │ ─────▶ │ appliance REST API   │
//!        └────────────────┘        └──────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use blade_power_control::{
//!     ClientConfig, HttpHardwareClient, PowerExecutor, PowerState, PowerTask, ServerHardware,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new("https://oneview.example.com").with_session_token("token");
//! let client = Arc::new(HttpHardwareClient::new(&config)?);
//!
//! let blade = ServerHardware::from_uri("/rest/server-hardware/30373237");
//! let executor = PowerExecutor::new(PowerTask::with_defaults(client, blade));
//!
//! let report = executor.execute(PowerState::Off).await?.into_result()?;
//! println!("{:?} after {} checks", report.outcome, report.iterations);
//! # Ok(())
//! # }
//! ```
//!
//! # Phases
//!
//! An execution moves `Idle` → `Submitting` → `Polling` and ends in `Done`,
//! `TimedOut`, `Failed`, or `Cancelled`. See the [`lifecycle`] module.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod observer;
pub mod orchestrator;
pub mod types;

pub use client::{HardwareClient, HttpHardwareClient};
pub use config::{ClientConfig, PowerTaskConfig};
pub use error::{PowerError, Result};
pub use executor::PowerExecutor;
pub use lifecycle::ExecutorPhase;
pub use observer::{PowerEvent, PowerObserver, TracingObserver};
pub use orchestrator::{PowerTask, PowerTaskSnapshot};
pub use types::{PowerOutcome, PowerReport, PowerRequest, RestMethod, SubmitOutcome};

#[cfg(any(test, feature = "test-utils"))]
pub use client::mock::MockHardwareClient;

// Re-export commonly used types from core for convenience
pub use blade_power_core::{PowerControl, PowerState, ServerHardware, TaskHandle, TaskLifecycle};
