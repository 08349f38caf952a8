//! Core types for blade-power.
//!
//! This crate provides the vocabulary shared by every blade-power crate:
//!
//! - **Power vocabulary**: [`PowerState`] and [`PowerControl`], closed enums
//!   with total, case-insensitive classification of remote strings
//! - **Tasks**: [`TaskHandle`], a reference to an asynchronous operation
//!   tracked by the management appliance, and its [`TaskLifecycle`]
//! - **Hardware**: [`ServerHardware`], the blade as reported by the appliance
//!
//! # Example
//!
//! ```
//! use blade_power_core::{PowerControl, PowerState};
//!
//! // Remote values are matched case-insensitively
//! assert_eq!(PowerState::classify("off"), PowerState::Off);
//!
//! // Anything else is Unknown (and logged as a warning)
//! assert_eq!(PowerState::classify("PoweringOn"), PowerState::Unknown);
//!
//! assert_eq!(PowerControl::MomentaryPress.as_str(), "MomentaryPress");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod hardware;
pub mod power;
pub mod task;

pub use error::{CoreError, Result};
pub use hardware::ServerHardware;
pub use power::{PowerControl, PowerState};
pub use task::{TaskHandle, TaskLifecycle, TaskUpdate, TASK_COMPLETED};
