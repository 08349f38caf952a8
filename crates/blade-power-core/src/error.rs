//! Common error types for blade-power.
//!
//! Classification of remote strings never fails; these errors only come from
//! strict parsing of user-supplied names.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur when parsing power vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The name is not a known power state.
    #[error("unknown power state: {0}")]
    UnknownPowerState(String),

    /// The name is not a known power control action.
    #[error("unknown power control: {0}")]
    UnknownPowerControl(String),
}
