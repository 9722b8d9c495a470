/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

//! Stream start / stop sequencing

#[cfg(feature = "rttdebug")]
use panic_rtt_core::rprintln;

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::blocking::i2c;
use embedded_hal::digital::v2::OutputPin;

use crate::controls::ControlStore;
use crate::modes::MODE_COMMON;
use crate::power::PowerRail;
use crate::table::RegOp;
use crate::{Daxc02, Register, RESET_REG_MASTER_MODE, RESET_REG_STREAM_OFF};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StreamState {
    Stopped,
    Starting,
    Streaming,
}

impl<I2C, CommE, D, R, RST> Daxc02<I2C, D, R, RST>
where
    I2C: i2c::Write<Error = CommE> + i2c::WriteRead<Error = CommE>,
    D: DelayMs<u32> + DelayUs<u32>,
    R: PowerRail,
    RST: OutputPin,
{
    pub fn stream_state(&self) -> StreamState {
        self.stream
    }

    /// Configure the bridge and the sensor for the active mode and start streaming.
    ///
    /// Bridge and table failures abort the start. When override is enabled,
    /// gain, frame rate and exposure are re-applied from `controls`;
    /// failures there are only logged.
    ///
    /// A failure before the first sensor register is written (unknown mode,
    /// bridge setup) leaves the stream state as it was, so a repeated start
    /// on a streaming device still reports `Streaming`. Once the sensor
    /// tables have begun, any failure leaves the state `Stopped`.
    /// Callers must not overlap start and stop requests.
    pub fn start_stream<S: ControlStore>(
        &mut self,
        controls: &S,
    ) -> Result<(), crate::Error<CommE>> {
        #[cfg(feature = "rttdebug")]
        rprintln!("starting stream in mode {}", self.mode);

        let previous = self.stream;
        self.stream = StreamState::Starting;

        let prepared = self
            .sensor_mode()
            .map(|mode| mode.table)
            .and_then(|table| self.setup_bridge().map(|_| table));
        let mode_table = match prepared {
            Ok(table) => table,
            Err(e) => {
                self.stream = previous;
                return Err(e);
            }
        };

        let res = self.configure_sensor(mode_table, controls);
        self.stream = match res {
            Ok(()) => StreamState::Streaming,
            Err(_) => StreamState::Stopped,
        };
        res
    }

    fn configure_sensor<S: ControlStore>(
        &mut self,
        mode_table: &[RegOp],
        controls: &S,
    ) -> Result<(), crate::Error<CommE>> {
        self.write_table(MODE_COMMON)?;
        self.write_table(mode_table)?;

        if self.override_enable {
            self.apply_overrides(controls);
        }

        self.write_reg(Register::ResetRegister as u16, RESET_REG_MASTER_MODE)
    }

    /// Best-effort re-application of the current gain, frame rate and exposure.
    /// Frame rate goes before exposure so the new frame length is in place first.
    fn apply_overrides<S: ControlStore>(&mut self, controls: &S) {
        let overrides = match controls.overrides() {
            Some(overrides) => overrides,
            None => {
                #[cfg(feature = "rttdebug")]
                rprintln!("failed to get overrides");
                return;
            }
        };

        if self.set_gain(overrides.gain).is_err() {
            #[cfg(feature = "rttdebug")]
            rprintln!("error gain override");
        }
        if self.set_frame_rate(overrides.frame_rate).is_err() {
            #[cfg(feature = "rttdebug")]
            rprintln!("error frame length override");
        }
        if self.set_exposure(overrides.exposure).is_err() {
            #[cfg(feature = "rttdebug")]
            rprintln!("error exposure override");
        }
    }

    /// Stop streaming. The sensor stays powered and configured.
    pub fn stop_stream(&mut self) -> Result<(), crate::Error<CommE>> {
        #[cfg(feature = "rttdebug")]
        rprintln!("ending stream");

        self.write_reg(Register::ResetRegister as u16, RESET_REG_STREAM_OFF)?;
        self.stream = StreamState::Stopped;
        Ok(())
    }
}
