//! Power state and power control vocabulary.
//!
//! The management appliance reports power as free-form strings such as
//! `"On"`, `"off"` or `"PoweringOn"`. [`PowerState::classify`] folds any of
//! them into a closed set; [`PowerControl`] names the way a transition is
//! requested and renders the exact strings the appliance expects.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Observed power state of a blade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum PowerState {
    /// The blade is powered on.
    On,
    /// The blade is powered off.
    Off,
    /// The state is transitional or not recognized.
    #[default]
    Unknown,
}

impl PowerState {
    /// Wire representation used by the appliance.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::On => "On",
            Self::Off => "Off",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Case-insensitive comparison against a remote power string.
    #[must_use]
    pub fn matches(self, value: &str) -> bool {
        value.eq_ignore_ascii_case(self.as_str())
    }

    /// Classify a remote power string.
    ///
    /// Only `On` and `Off` are recognized (case-insensitively). Every other
    /// value, including transitional states like `PoweringOff`, becomes
    /// [`PowerState::Unknown`] and is logged as a warning.
    #[must_use]
    pub fn classify(value: &str) -> Self {
        if Self::Off.matches(value) {
            Self::Off
        } else if Self::On.matches(value) {
            Self::On
        } else {
            tracing::warn!(power_state = %value, "Unrecognized power state, treating as unknown");
            Self::Unknown
        }
    }

    /// Returns true if the state is `On` or `Off`.
    #[must_use]
    pub const fn is_known(self) -> bool {
        matches!(self, Self::On | Self::Off)
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PowerState {
    type Err = CoreError;

    /// Strict parsing for user input; unlike [`PowerState::classify`] this
    /// rejects unrecognized names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::On, Self::Off, Self::Unknown]
            .into_iter()
            .find(|state| state.matches(s))
            .ok_or_else(|| CoreError::UnknownPowerState(s.to_string()))
    }
}

impl From<String> for PowerState {
    fn from(value: String) -> Self {
        Self::classify(&value)
    }
}

impl From<PowerState> for &'static str {
    fn from(state: PowerState) -> Self {
        state.as_str()
    }
}

/// How a power transition is requested from the appliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerControl {
    /// Hard reset: power is removed immediately and restored after about
    /// six seconds.
    ColdBoot,
    /// Power on, or a normal (soft) power off, depending on the requested
    /// power state.
    MomentaryPress,
    /// Orderly reset of the device.
    Reset,
}

impl PowerControl {
    /// Wire representation used by the appliance.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ColdBoot => "ColdBoot",
            Self::MomentaryPress => "MomentaryPress",
            Self::Reset => "Reset",
        }
    }
}

impl fmt::Display for PowerControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PowerControl {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::ColdBoot, Self::MomentaryPress, Self::Reset]
            .into_iter()
            .find(|control| s.eq_ignore_ascii_case(control.as_str()))
            .ok_or_else(|| CoreError::UnknownPowerControl(s.to_string()))
    }
}
