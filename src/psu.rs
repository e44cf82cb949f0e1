use core::str::FromStr;

use fugit::MillisDurationU32;
use log::{debug, warn};

use crate::{
    error::{Error, ProtocolError, Result},
    parser::{parse_digit_groups, parse_token, to_line},
    preset::{PRESET_GROUP_WIDTHS, PresetIndex, PresetMemories},
    scaling::{CurrentScale, display_raw_to_milli, raw_to_voltage_mv, voltage_mv_to_raw},
    transaction::{Command, Line, Verb, execute_data, execute_no_data},
    transport::Transport,
    types::{
        ControlMode, ErrorState, Limits, Measurement, OutputSuppression, ProductModel, SUPPORTED_VERSION,
        Setpoint, State,
    },
};

/// Width of the voltage and current fields in set/get commands.
const FIELD_WIDTH: usize = 3;

/// Width of the voltage and current fields in `GETD`.
const DISPLAY_FIELD_WIDTH: usize = 4;

/// Base timeout while reading or writing the preset memories, which the PSU is slow to answer.
pub const PRESET_TIMEOUT: MillisDurationU32 = MillisDurationU32::millis(500);

/// A connected HCS power supply.
///
/// Create one with [`HcsPsu::connect`] on any [`Transport`], or with `HcsPsu::open` on a serial port name
/// when the `std` feature is enabled.
///
/// For its methods, "set" means to write a configuration and "get" means to read one back, or to read a
/// live measurement. Voltages are in millivolts and currents in milliamps throughout.
pub struct HcsPsu<T: Transport> {
    transport: T,
    model: Option<Line>,
    version: Option<Line>,
    scale: CurrentScale,
}

impl<T: Transport> HcsPsu<T> {
    /// Take ownership of `transport` and check the PSU on the other end is one we support.
    pub fn connect(mut transport: T) -> Result<Self, T::Error> {
        transport.clear().map_err(Error::SerialError)?;

        let mut psu = Self {
            transport,
            model: None,
            version: None,
            scale: CurrentScale::Centi,
        };

        let model = to_line(psu.model()?);
        let version = to_line(psu.version()?);
        if ProductModel::from_str(&model).is_err() || version.as_str() != SUPPORTED_VERSION {
            warn!("Rejecting {model} running {version}");
            return Err(Error::UnsupportedDevice { model, version });
        }

        psu.scale = CurrentScale::for_model(&model);
        debug!("Connected to {model} {version}, current scale 1/{}", psu.scale.divisor());
        Ok(psu)
    }

    /// Give the transport back.
    pub fn disconnect(self) -> T {
        self.transport
    }

    /// Product model, queried once per connection.
    pub fn model(&mut self) -> Result<&str, T::Error> {
        let model = match self.model.take() {
            Some(model) => model,
            None => self.get_model()?,
        };
        Ok(self.model.insert(model).as_str())
    }

    /// Firmware revision, queried once per connection.
    pub fn version(&mut self) -> Result<&str, T::Error> {
        let version = match self.version.take() {
            Some(version) => version,
            None => self.get_version()?,
        };
        Ok(self.version.insert(version).as_str())
    }

    /// Current field scale selected for this model.
    pub fn current_scale(&self) -> CurrentScale {
        self.scale
    }

    /// Query the product model, bypassing the cache.
    pub fn get_model(&mut self) -> Result<Line, T::Error> {
        self.transact_data(&Command::new(Verb::Gmod))
    }

    /// Query the firmware revision, bypassing the cache.
    pub fn get_version(&mut self) -> Result<Line, T::Error> {
        self.transact_data(&Command::new(Verb::Gver))
    }

    /// Return which protection, if any, has tripped.
    pub fn get_error_state(&mut self) -> Result<ErrorState, T::Error> {
        self.transact_token(&Command::new(Verb::Gerr))
    }

    /// The highest voltage and current this PSU can be set to.
    pub fn get_maximum_voltage_and_current(&mut self) -> Result<Setpoint, T::Error> {
        self.get_setpoint(Verb::Gmax)
    }

    /// The voltage and current the PSU is regulating to.
    pub fn get_target_voltage_and_current(&mut self) -> Result<Setpoint, T::Error> {
        self.get_setpoint(Verb::Gets)
    }

    /// Measured output voltage and current, and whether the PSU is in CV or CC mode.
    pub fn get_display_voltage_current_and_mode(&mut self) -> Result<Measurement, T::Error> {
        let payload = self.transact_data(&Command::new(Verb::Getd))?;
        let [voltage, current, mode] =
            parse_digit_groups(&payload, [DISPLAY_FIELD_WIDTH, DISPLAY_FIELD_WIDTH, 1])?;
        let mode = ControlMode::try_from(mode).map_err(|_| ProtocolError::UnexpectedResponse(payload))?;
        Ok(Measurement {
            voltage_mv: display_raw_to_milli(voltage),
            current_ma: display_raw_to_milli(current),
            mode,
        })
    }

    /// Set the output target voltage.
    pub fn set_target_voltage(&mut self, voltage_mv: u32) -> Result<(), T::Error> {
        let command = Command::new(Verb::Volt).with_field(voltage_mv_to_raw(voltage_mv), FIELD_WIDTH)?;
        self.transact_no_data(&command)
    }

    /// Set the output target current.
    pub fn set_target_current(&mut self, current_ma: u32) -> Result<(), T::Error> {
        let command =
            Command::new(Verb::Curr).with_field(self.scale.current_ma_to_raw(current_ma), FIELD_WIDTH)?;
        self.transact_no_data(&command)
    }

    /// Set target voltage, target current and output state in a single command.
    pub fn set_target_voltage_current_and_output_enabled(
        &mut self,
        voltage_mv: u32,
        current_ma: u32,
        enabled: impl Into<State>,
    ) -> Result<(), T::Error> {
        let suppression = OutputSuppression::from(enabled.into());
        let command = Command::new(Verb::Sevc)
            .with_field(voltage_mv_to_raw(voltage_mv), FIELD_WIDTH)?
            .with_field(self.scale.current_ma_to_raw(current_ma), FIELD_WIDTH)?
            .with_token(suppression.token())?;
        self.transact_no_data(&command)
    }

    /// Read all three preset memories.
    pub fn get_preset_memories(&mut self) -> Result<PresetMemories, T::Error> {
        let command = Command::new(Verb::Getm);
        let raw = self.with_timeout(PRESET_TIMEOUT, |psu| {
            let payload = psu.transact_data(&command)?;
            Ok(parse_digit_groups(&payload, PRESET_GROUP_WIDTHS)?)
        })?;
        Ok(PresetMemories::from_raw(raw, self.scale))
    }

    /// Store all three preset memories.
    pub fn set_preset_memories(&mut self, memories: &PresetMemories) -> Result<(), T::Error> {
        let command = memories.to_command(self.scale)?;
        self.with_timeout(PRESET_TIMEOUT, |psu| psu.transact_no_data(&command))
    }

    /// Switch to the setpoint stored in a preset memory.
    pub fn run_preset_memory(&mut self, index: PresetIndex) -> Result<(), T::Error> {
        let command = Command::new(Verb::Runm).with_token(index.token())?;
        self.transact_no_data(&command)
    }

    /// Enter (`true`) or leave (`false`) a remote control session.
    pub fn set_session_state(&mut self, active: bool) -> Result<(), T::Error> {
        let verb = if active { Verb::Sess } else { Verb::Ends };
        self.transact_no_data(&Command::new(verb))
    }

    /// Read whether the output is enabled or disabled.
    pub fn get_output_power_enabled(&mut self) -> Result<State, T::Error> {
        let suppression: OutputSuppression = self.transact_token(&Command::new(Verb::Gout))?;
        Ok(suppression.into())
    }

    /// Enable/disable the output.
    pub fn set_output_power_enabled(&mut self, enabled: impl Into<State>) -> Result<(), T::Error> {
        let suppression = OutputSuppression::from(enabled.into());
        let command = Command::new(Verb::Sout).with_token(suppression.token())?;
        self.transact_no_data(&command)
    }

    /// Get the over-voltage protection level.
    pub fn get_over_voltage_limit(&mut self) -> Result<u32, T::Error> {
        let [voltage] = self.transact_digits(&Command::new(Verb::Govp), [FIELD_WIDTH])?;
        Ok(raw_to_voltage_mv(voltage))
    }

    /// Set the over-voltage protection level.
    pub fn set_over_voltage_limit(&mut self, voltage_mv: u32) -> Result<(), T::Error> {
        let command = Command::new(Verb::Sovp).with_field(voltage_mv_to_raw(voltage_mv), FIELD_WIDTH)?;
        self.transact_no_data(&command)
    }

    /// Get the over-current protection level.
    pub fn get_over_current_limit(&mut self) -> Result<u32, T::Error> {
        let [current] = self.transact_digits(&Command::new(Verb::Gocp), [FIELD_WIDTH])?;
        Ok(self.scale.raw_to_current_ma(current))
    }

    /// Set the over-current protection level.
    pub fn set_over_current_limit(&mut self, current_ma: u32) -> Result<(), T::Error> {
        let command =
            Command::new(Verb::Socp).with_field(self.scale.current_ma_to_raw(current_ma), FIELD_WIDTH)?;
        self.transact_no_data(&command)
    }

    /// Get both protection levels.
    pub fn get_limits(&mut self) -> Result<Limits, T::Error> {
        Ok(Limits {
            over_voltage_mv: self.get_over_voltage_limit()?,
            over_current_ma: self.get_over_current_limit()?,
        })
    }

    /// Set both protection levels, voltage first.
    pub fn set_limits(&mut self, limits: Limits) -> Result<(), T::Error> {
        self.set_over_voltage_limit(limits.over_voltage_mv)?;
        self.set_over_current_limit(limits.over_current_ma)
    }

    fn get_setpoint(&mut self, verb: Verb) -> Result<Setpoint, T::Error> {
        let [voltage, current] = self.transact_digits(&Command::new(verb), [FIELD_WIDTH, FIELD_WIDTH])?;
        Ok(Setpoint::new(raw_to_voltage_mv(voltage), self.scale.raw_to_current_ma(current)))
    }

    /// Run `transaction` with the base read timeout temporarily set to `timeout`.
    ///
    /// The previous timeout is put back whether or not the transaction succeeds.
    fn with_timeout<R>(
        &mut self,
        timeout: MillisDurationU32,
        transaction: impl FnOnce(&mut Self) -> Result<R, T::Error>,
    ) -> Result<R, T::Error> {
        let previous = self.transport.timeout();
        debug!("Read timeout {} ms -> {} ms", previous.to_millis(), timeout.to_millis());
        self.transport.set_timeout(timeout).map_err(Error::SerialError)?;

        let result = transaction(self);

        let restored = self.transport.set_timeout(previous).map_err(Error::SerialError);
        if let (Err(_), Err(e)) = (&result, &restored) {
            warn!("Failed to restore read timeout of {} ms: {e:?}", previous.to_millis());
        }
        let value = result?;
        restored?;
        Ok(value)
    }

    /// Run a command that answers with a bare `OK`.
    pub fn transact_no_data(&mut self, command: &Command) -> Result<(), T::Error> {
        execute_no_data(&mut self.transport, command)
    }

    /// Run a command that answers with one data line.
    pub fn transact_data(&mut self, command: &Command) -> Result<Line, T::Error> {
        execute_data(&mut self.transport, command)
    }

    /// Run a command whose data line is a run of fixed-width numeric fields.
    pub fn transact_digits<const N: usize>(
        &mut self,
        command: &Command,
        widths: [usize; N],
    ) -> Result<[u16; N], T::Error> {
        let payload = self.transact_data(command)?;
        Ok(parse_digit_groups(&payload, widths)?)
    }

    /// Run a command whose data line is a status token.
    pub fn transact_token<E: FromStr>(&mut self, command: &Command) -> Result<E, T::Error> {
        let payload = self.transact_data(command)?;
        Ok(parse_token(&payload)?)
    }
}
