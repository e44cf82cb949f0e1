//! Periodic monitoring of a connected PSU.

use core::fmt;
use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};

use chrono::{DateTime, Local};
use fugit::Duration as FugitDuration;
use log::debug;

use crate::{
    error::{Error, Result},
    psu::HcsPsu,
    transport::Transport,
    types::{Measurement, Milli, Setpoint},
};

/// Longest single sleep between checks of the stop flag.
const STOP_POLL: Duration = Duration::from_millis(50);

/// One round of readings taken by [`HcsPsu::watch`].
#[derive(Debug, Clone, Copy)]
pub struct WatchSample {
    pub timestamp: DateTime<Local>,
    pub maximum: Setpoint,
    pub target: Setpoint,
    pub display: Measurement,
}

impl fmt::Display for WatchSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} mode: {} voltage: {}V / {}V (max {}V) current: {}A / {}A (max {}A)",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.display.mode,
            Milli(self.display.voltage_mv),
            Milli(self.target.voltage_mv),
            Milli(self.maximum.voltage_mv),
            Milli(self.display.current_ma),
            Milli(self.target.current_ma),
            Milli(self.maximum.current_ma),
        )
    }
}

impl<T: Transport> HcsPsu<T> {
    /// Print a sample line to stdout every `interval` until `stop` is set.
    pub fn watch(&mut self, interval: FugitDuration<u32, 1, 1>, stop: &AtomicBool) -> Result<(), T::Error> {
        self.watch_with(interval, stop, |sample| println!("{sample}"))
    }

    /// Take a sample every `interval` and hand it to `report`, until `stop` is set.
    ///
    /// Samples are aligned to wall-clock multiples of `interval` rather than spaced from the previous one,
    /// so they do not drift. `stop` is only looked at between samples; a transaction in progress always runs
    /// to completion. Any error ends the loop.
    pub fn watch_with(
        &mut self,
        interval: FugitDuration<u32, 1, 1>,
        stop: &AtomicBool,
        mut report: impl FnMut(&WatchSample),
    ) -> Result<(), T::Error> {
        let interval_ms = u64::from(interval.to_millis());
        if interval_ms == 0 {
            return Err(Error::InvalidRange);
        }

        while !stop.load(Ordering::Relaxed) {
            let maximum = self.get_maximum_voltage_and_current()?;
            let target = self.get_target_voltage_and_current()?;
            let display = self.get_display_voltage_current_and_mode()?;
            report(&WatchSample {
                timestamp: Local::now(),
                maximum,
                target,
                display,
            });

            sleep_until_boundary(interval_ms, stop);
        }
        debug!("Watch stopped");
        Ok(())
    }
}

/// Sleep until the next wall-clock multiple of `interval_ms`, waking early if `stop` gets set.
fn sleep_until_boundary(interval_ms: u64, stop: &AtomicBool) {
    let mut remaining = Duration::from_millis(until_boundary_ms(now_ms(&Local::now()), interval_ms));
    while !remaining.is_zero() && !stop.load(Ordering::Relaxed) {
        let step = remaining.min(STOP_POLL);
        thread::sleep(step);
        remaining -= step;
    }
}

/// Milliseconds since the Unix epoch, clamped to zero for clocks set before it.
fn now_ms(now: &DateTime<Local>) -> u64 {
    u64::try_from(now.timestamp_millis()).unwrap_or_default()
}

fn until_boundary_ms(now_ms: u64, interval_ms: u64) -> u64 {
    interval_ms - now_ms % interval_ms
}
