//! This module contains types relevant to the HCS command set.

use core::fmt;

use strum_macros::{AsRefStr, EnumIter, EnumString, IntoStaticStr};

/// Every product model this driver accepts. Parsed from the `GMOD` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr, EnumIter)]
pub enum ProductModel {
    /// 1-18 V, 0-10 A.
    #[strum(serialize = "HCS-3102")]
    Hcs3102,
    /// 1-36 V, 0-5 A.
    #[strum(serialize = "HCS-3014")]
    Hcs3014,
    /// 1-60 V, 0-2.5 A.
    #[strum(serialize = "HCS-3204")]
    Hcs3204,
}

/// The only firmware revision whose command set has been verified.
pub const SUPPORTED_VERSION: &str = "REV3.3";

/// Represents the two possible power supply control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// Constant voltage regulation mode.
    Cv,
    /// Constant current regulation mode.
    Cc,
}

impl TryFrom<u16> for ControlMode {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ControlMode::Cv),
            1 => Ok(ControlMode::Cc),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMode::Cv => f.write_str("CV"),
            ControlMode::Cc => f.write_str("CC"),
        }
    }
}

/// Used to be less ambiguous and whether something is on or off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum State {
    /// Disabled.
    #[default]
    Off,
    /// Enabled.
    On,
}

impl From<State> for bool {
    fn from(value: State) -> Self {
        match value {
            State::Off => false,
            State::On => true,
        }
    }
}

impl From<bool> for State {
    fn from(value: bool) -> Self {
        match value {
            true => State::On,
            false => State::Off,
        }
    }
}

/// The output flag as it travels on the wire: `1` means the output is held off.
///
/// Convert to and from [`State`] right at the wire, so nothing else has to think in inverted terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, EnumIter)]
pub enum OutputSuppression {
    #[strum(serialize = "0")]
    Released,
    #[strum(serialize = "1")]
    Suppressed,
}

impl OutputSuppression {
    /// The single digit sent to the PSU.
    pub fn token(self) -> &'static str {
        self.into()
    }
}

impl From<State> for OutputSuppression {
    fn from(value: State) -> Self {
        match value {
            State::On => OutputSuppression::Released,
            State::Off => OutputSuppression::Suppressed,
        }
    }
}

impl From<OutputSuppression> for State {
    fn from(value: OutputSuppression) -> Self {
        match value {
            OutputSuppression::Released => State::On,
            OutputSuppression::Suppressed => State::Off,
        }
    }
}

/// Status reported by `GERR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, EnumIter)]
pub enum ErrorState {
    #[strum(serialize = "000")]
    NoError,
    #[strum(serialize = "001")]
    OverVoltage,
    #[strum(serialize = "002")]
    OverTemperature,
    /// Seems to be reported when both of the above apply.
    #[strum(serialize = "003")]
    Overload,
}

impl fmt::Display for ErrorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorState::NoError => "none",
            ErrorState::OverVoltage => "over voltage",
            ErrorState::OverTemperature => "over temperature",
            ErrorState::Overload => "overload",
        })
    }
}

/// A voltage/current pair, as used for maximums, targets and preset memories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Setpoint {
    pub voltage_mv: u32,
    pub current_ma: u32,
}

impl Setpoint {
    pub const fn new(voltage_mv: u32, current_ma: u32) -> Self {
        Self {
            voltage_mv,
            current_ma,
        }
    }
}

/// Live values from the front panel display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub voltage_mv: u32,
    pub current_ma: u32,
    pub mode: ControlMode,
}

/// Protection thresholds. These are independent of the target setpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Limits {
    pub over_voltage_mv: u32,
    pub over_current_ma: u32,
}

/// Formats a milli-unit value as `05.25` style units with two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Milli(pub u32);

impl fmt::Display for Milli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hundredths = self.0 / 10;
        write!(f, "{:02}.{:02}", hundredths / 100, hundredths % 100)
    }
}
