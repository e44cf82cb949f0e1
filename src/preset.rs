use strum::EnumCount;
use strum_macros::{EnumCount as EnumCountMacro, EnumIter};

use crate::{
    error::EncodeError,
    scaling::{CurrentScale, raw_to_voltage_mv, voltage_mv_to_raw},
    transaction::{Command, Verb},
    types::Setpoint,
};

/// Width of each voltage and current field in `GETM`/`PROM`.
pub const PRESET_FIELD_WIDTH: usize = 3;

/// Digit group widths of a `GETM` reply: voltage and current for each memory in turn.
pub const PRESET_GROUP_WIDTHS: [usize; 2 * PresetIndex::COUNT] = [PRESET_FIELD_WIDTH; 2 * PresetIndex::COUNT];

/// This enum represents all possible preset memories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumCountMacro, EnumIter)]
#[repr(u8)]
pub enum PresetIndex {
    Memory0 = 0,
    Memory1 = 1,
    Memory2 = 2,
}

impl PresetIndex {
    /// The single digit sent with `RUNM`.
    pub fn token(self) -> &'static str {
        match self {
            PresetIndex::Memory0 => "0",
            PresetIndex::Memory1 => "1",
            PresetIndex::Memory2 => "2",
        }
    }
}

impl TryFrom<u32> for PresetIndex {
    type Error = EncodeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        use PresetIndex as PI;
        match value {
            0 => Ok(PI::Memory0),
            1 => Ok(PI::Memory1),
            2 => Ok(PI::Memory2),
            _ => Err(EncodeError::InvalidRange),
        }
    }
}

/// The three preset memories, always read and written together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresetMemories(pub [Setpoint; PresetIndex::COUNT]);

impl PresetMemories {
    pub fn get(&self, index: PresetIndex) -> Setpoint {
        self.0[index as usize]
    }

    pub fn set(&mut self, index: PresetIndex, setpoint: Setpoint) {
        self.0[index as usize] = setpoint;
    }

    /// Build from the six raw digit groups of a `GETM` reply.
    pub fn from_raw(raw: [u16; 2 * PresetIndex::COUNT], scale: CurrentScale) -> Self {
        let mut memories = Self::default();
        for (setpoint, pair) in memories.0.iter_mut().zip(raw.chunks_exact(2)) {
            *setpoint = Setpoint::new(raw_to_voltage_mv(pair[0]), scale.raw_to_current_ma(pair[1]));
        }
        memories
    }

    /// Generate the `PROM` command that stores these memories.
    pub fn to_command(&self, scale: CurrentScale) -> Result<Command, EncodeError> {
        let mut command = Command::new(Verb::Prom);
        for setpoint in &self.0 {
            command = command
                .with_field(voltage_mv_to_raw(setpoint.voltage_mv), PRESET_FIELD_WIDTH)?
                .with_field(scale.current_ma_to_raw(setpoint.current_ma), PRESET_FIELD_WIDTH)?;
        }
        Ok(command)
    }
}
