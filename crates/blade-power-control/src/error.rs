//! Error types for power control.
//!
//! This module defines all errors that can occur while querying hardware,
//! submitting power changes, and polling the resulting tasks.

use thiserror::Error;

use crate::types::RestMethod;

/// A result type using `PowerError`.
pub type Result<T> = std::result::Result<T, PowerError>;

/// Errors that can occur in power control operations.
#[derive(Debug, Error)]
pub enum PowerError {
    /// The hardware has no URI, so it cannot be queried or changed.
    #[error("can't manage power on a blade without a hardware reference")]
    MissingHardwareReference,

    /// A remote call failed or the appliance rejected it.
    #[error("{method} {uri} failed: {message}")]
    Transport {
        /// HTTP method of the failed call.
        method: RestMethod,
        /// URI of the failed call.
        uri: String,
        /// Status code, if the appliance answered.
        status: Option<u16>,
        /// Description of the failure.
        message: String,
    },

    /// A response body could not be decoded.
    #[error("failed to decode response from {uri}: {message}")]
    Decode {
        /// URI the response came from.
        uri: String,
        /// Decoder error message.
        message: String,
    },

    /// The task did not complete within the allowed number of checks.
    #[error("power task did not complete after {iterations} checks")]
    Timeout {
        /// Number of status checks performed.
        iterations: u32,
    },

    /// The appliance reported the task as failed.
    #[error("power task {uri} ended in state {state}: {status}")]
    TaskFailed {
        /// URI of the task.
        uri: String,
        /// Final task state.
        state: String,
        /// Final status message.
        status: String,
    },

    /// The power change could not be submitted.
    #[error("power state submission failed: {0}")]
    Submission(#[source] Box<PowerError>),

    /// The operation was cancelled by the caller.
    #[error("power task cancelled")]
    Cancelled,

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PowerError {
    /// Build a transport error for a call that got no usable answer.
    pub fn transport(method: RestMethod, uri: &str, message: impl Into<String>) -> Self {
        Self::Transport {
            method,
            uri: uri.to_string(),
            status: None,
            message: message.into(),
        }
    }

    /// Build a decode error for a response from `uri`.
    pub fn decode(uri: &str, error: impl std::fmt::Display) -> Self {
        Self::Decode {
            uri: uri.to_string(),
            message: error.to_string(),
        }
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Transport { status, .. } => !matches!(status, Some(code) if *code < 500),
            Self::Timeout { .. } => true,
            Self::Submission(inner) => inner.is_retriable(),
            _ => false,
        }
    }
}
