//! Fixed-point scaling of wire fields.
//!
//! Voltage set/get fields are always in deci-volts. Current set/get fields depend on the model family:
//! centi-amps for every supported HCS model, deci-amps for anything else. Display fields (measured values)
//! are always in hundredths, whatever the family.

use core::str::FromStr;

use crate::types::ProductModel;

/// Millivolts per count of a voltage set/get field.
const MV_PER_VOLTAGE_COUNT: u32 = 100;

/// Milli-units per count of a display field.
const MILLI_PER_DISPLAY_COUNT: u32 = 10;

/// Divisor that turns a raw current field into amps. Fixed for the life of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CurrentScale {
    /// Raw current is in deci-amps.
    ///
    /// No supported model uses this. It is what the vendor's own tooling picks for models outside the
    /// HCS-3xxx list.
    Deci = 10,
    /// Raw current is in centi-amps.
    Centi = 100,
}

impl CurrentScale {
    /// Pick the scale for a model as reported by `GMOD`.
    pub fn for_model(model: &str) -> Self {
        match ProductModel::from_str(model) {
            Ok(model) => model.current_scale(),
            Err(_) => Self::Deci,
        }
    }

    #[inline]
    pub const fn divisor(self) -> u32 {
        self as u32
    }

    #[inline]
    const fn milliamps_per_count(self) -> u32 {
        1000 / self.divisor()
    }

    /// Convert a raw current field to milliamps.
    #[inline]
    pub const fn raw_to_current_ma(self, raw: u16) -> u32 {
        raw as u32 * self.milliamps_per_count()
    }

    /// Convert milliamps to a raw current field, truncating any remainder.
    #[inline]
    pub const fn current_ma_to_raw(self, current_ma: u32) -> u32 {
        current_ma / self.milliamps_per_count()
    }
}

impl ProductModel {
    /// Current field scale for this model.
    pub const fn current_scale(&self) -> CurrentScale {
        match self {
            ProductModel::Hcs3102 | ProductModel::Hcs3014 | ProductModel::Hcs3204 => CurrentScale::Centi,
        }
    }
}

/// Convert a raw voltage field (deci-volts) to millivolts.
#[inline]
pub const fn raw_to_voltage_mv(raw: u16) -> u32 {
    raw as u32 * MV_PER_VOLTAGE_COUNT
}

/// Convert millivolts to a raw voltage field, truncating any remainder.
#[inline]
pub const fn voltage_mv_to_raw(voltage_mv: u32) -> u32 {
    voltage_mv / MV_PER_VOLTAGE_COUNT
}

/// Convert a raw display field (hundredths) to milli-units.
#[inline]
pub const fn display_raw_to_milli(raw: u16) -> u32 {
    raw as u32 * MILLI_PER_DISPLAY_COUNT
}
