/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/
#![no_std]

//! Configuration driver for the Nova Dynamics DAX-C02 camera board:
//! an ON Semiconductor (Aptina) MT9M021 image sensor whose parallel output
//! is converted to MIPI CSI-2 by a Toshiba TC358746 bridge.
//! Both chips share one two-wire bus:
//! - the sensor uses 16-bit register addresses and 16-bit data
//! - the bridge uses 16-bit register addresses and 16- or 32-bit data
//!
//! This driver is concerned with power sequencing, register programming,
//! control conversion and stream start/stop. Pixel transport is not handled here.

#[cfg(feature = "rttdebug")]
use panic_rtt_core::rprintln;

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::blocking::i2c;
use embedded_hal::digital::v2::OutputPin;

pub mod bridge;
pub mod controls;
pub mod modes;
pub mod power;
pub mod stream;
pub mod table;

#[cfg(test)]
mod testing;

pub use controls::{
    Control, ControlError, ControlId, ControlStore, ControlValues, FlashMode,
    Overrides,
};
pub use modes::{SensorMode, MODES};
pub use power::{PowerError, PowerRail, PowerRails, PowerState, Rail};
pub use stream::StreamState;
pub use table::RegOp;

use power::PowerSequencer;

/// Errors in this crate
#[derive(Debug)]
pub enum Error<CommE> {
    /// Sensor communication error
    Comm(CommE),

    /// The chip id register did not read back the MT9M021 id
    NotDetected(u16),

    /// A supply rail failed to enable; earlier rails were switched back off
    PowerRail(Rail),

    /// The reset line could not be driven during power-on
    ResetLine,

    /// Register table programming failed at the given sensor address
    Table(u16, CommE),

    /// Bridge programming failed at the given bridge address
    Bridge(u16, CommE),

    /// The mode index is not present in the mode catalog
    InvalidMode(usize),

    /// The control value could not be converted
    Control(ControlError),
}

impl<CommE> From<ControlError> for Error<CommE> {
    fn from(err: ControlError) -> Self {
        Error::Control(err)
    }
}

impl<CommE> From<PowerError> for Error<CommE> {
    fn from(err: PowerError) -> Self {
        match err {
            PowerError::Rail(rail) => Error::PowerRail(rail),
            PowerError::ResetLine => Error::ResetLine,
        }
    }
}

/// 7-bit address of the MT9M021 on the DAX-C02
pub const DEFAULT_SENSOR_ADDRESS: u8 = 0x10;

/// 7-bit address of the TC358746 on the DAX-C02
pub const DEFAULT_BRIDGE_ADDRESS: u8 = 0x0E;

/// Value of the `ChipId` register for the MT9M021
pub const CHIP_ID: u16 = 0x2401;

/// `ResetRegister` value: soft reset
pub const RESET_REG_SOFT_RESET: u16 = 0x0001;
/// `ResetRegister` value: parallel interface enabled, streaming stopped
pub const RESET_REG_STREAM_OFF: u16 = 0x10D8;
/// `ResetRegister` value: master mode, streaming
pub const RESET_REG_MASTER_MODE: u16 = 0x10DC;

/// Main driver struct
pub struct Daxc02<I2C, D, R, RST> {
    sensor_address: u8,
    bridge_address: u8,
    i2c: I2C,
    delay: D,
    power: PowerSequencer<R, RST>,
    modes: &'static [SensorMode],
    mode: usize,
    override_enable: bool,
    stream: StreamState,
    /// Last programmed coarse integration time, in lines
    coarse_time: u16,
    /// Last programmed frame length, in lines minus one
    frame_length: u16,
}

impl<I2C, CommE, D, R, RST> Daxc02<I2C, D, R, RST>
where
    I2C: i2c::Write<Error = CommE> + i2c::WriteRead<Error = CommE>,
    D: DelayMs<u32> + DelayUs<u32>,
    R: PowerRail,
    RST: OutputPin,
{
    /// Create a new instance using the default addresses and the built-in mode catalog.
    pub fn new(i2c: I2C, delay: D, rails: PowerRails<R, RST>) -> Self {
        Self {
            sensor_address: DEFAULT_SENSOR_ADDRESS,
            bridge_address: DEFAULT_BRIDGE_ADDRESS,
            i2c,
            delay,
            power: PowerSequencer::new(rails),
            modes: MODES,
            mode: 0,
            override_enable: true,
            stream: StreamState::Stopped,
            coarse_time: 0,
            frame_length: 0,
        }
    }

    /// Use different bus addresses for the sensor and the bridge
    pub fn with_addresses(mut self, sensor: u8, bridge: u8) -> Self {
        self.sensor_address = sensor;
        self.bridge_address = bridge;
        self
    }

    /// Replace the mode catalog. The active mode is reset to index 0.
    pub fn with_modes(mut self, modes: &'static [SensorMode]) -> Self {
        self.modes = modes;
        self.mode = 0;
        self
    }

    /// Power the board up, verify the sensor identity and push every
    /// control value from `controls` to the sensor.
    pub fn probe(
        &mut self,
        controls: &ControlValues,
    ) -> Result<(), crate::Error<CommE>> {
        #[cfg(feature = "rttdebug")]
        rprintln!("daxc02 probe start");

        self.power_on()?;
        self.check_identity()?;

        for control in controls.snapshot().iter() {
            self.set_control(*control)?;
        }

        #[cfg(feature = "rttdebug")]
        rprintln!("daxc02 probe done");
        Ok(())
    }

    /// Read the chip id register and compare it to the MT9M021 id
    pub fn check_identity(&mut self) -> Result<(), crate::Error<CommE>> {
        let id = self.read_reg(Register::ChipId as u16)?;
        if id != CHIP_ID {
            #[cfg(feature = "rttdebug")]
            rprintln!("mt9m021 not detected: 0x{:04x}", id);
            return Err(Error::NotDetected(id));
        }

        #[cfg(feature = "rttdebug")]
        rprintln!("mt9m021 detected");
        Ok(())
    }

    /// Run the rail/reset power-up sequence
    pub fn power_on(&mut self) -> Result<(), crate::Error<CommE>> {
        self.power.power_on(&mut self.delay)?;
        Ok(())
    }

    /// Run the power-down sequence. Teardown is best-effort and never fails.
    pub fn power_off(&mut self) {
        self.power.power_off(&mut self.delay);
        self.stream = StreamState::Stopped;
    }

    pub fn power_state(&self) -> PowerState {
        self.power.state()
    }

    /// True once the power-up sequence has completed
    pub fn is_powered(&self) -> bool {
        self.power.state() == PowerState::On
    }

    /// Select the sensor mode used by the next stream start
    /// and by exposure / frame rate conversions.
    pub fn set_mode(&mut self, index: usize) -> Result<(), crate::Error<CommE>> {
        if index >= self.modes.len() {
            return Err(Error::InvalidMode(index));
        }
        self.mode = index;
        Ok(())
    }

    pub fn mode_index(&self) -> usize {
        self.mode
    }

    /// Geometry of the active mode
    pub fn sensor_mode(&self) -> Result<&'static SensorMode, crate::Error<CommE>> {
        self.modes.get(self.mode).ok_or(Error::InvalidMode(self.mode))
    }

    /// Re-apply gain, frame rate and exposure on every stream start
    pub fn set_override(&mut self, enable: bool) {
        self.override_enable = enable;
    }

    pub fn coarse_time(&self) -> u16 {
        self.coarse_time
    }

    pub fn frame_length(&self) -> u16 {
        self.frame_length
    }

    /// Convert and write a single control.
    /// Writes are silently dropped while the board is powered down.
    pub fn set_control(
        &mut self,
        control: Control,
    ) -> Result<(), crate::Error<CommE>> {
        if !self.is_powered() {
            return Ok(());
        }

        match control {
            Control::Gain(raw) => self.set_gain(raw),
            Control::Exposure(raw) => self.set_exposure(raw),
            Control::FrameRate(raw) => self.set_frame_rate(raw),
            Control::HorizontalFlip(on) => {
                self.update_read_mode(controls::HFLIP_MASK, on)
            }
            Control::VerticalFlip(on) => {
                self.update_read_mode(controls::VFLIP_MASK, on)
            }
            Control::AnalogGain(gain) => {
                let current = self.read_reg(Register::DigitalTest as u16)?;
                let updated = controls::analog_gain_bits(current, gain)?;
                self.write_reg(Register::DigitalTest as u16, updated)
            }
            Control::Flash(mode) => {
                let code = controls::flash_code(mode)?;
                self.write_reg(Register::Flash as u16, code)
            }
            Control::TestPattern(index) => {
                let code = controls::test_pattern_code(index)?;
                #[cfg(feature = "rttdebug")]
                rprintln!("test pattern {} -> 0x{:x}", index, code);
                self.write_reg(Register::TestPattern as u16, code)
            }
            // accepted for framework compatibility, nothing to program
            Control::HdrEnable(_) | Control::GroupHold(_) => Ok(()),
        }
    }

    /// Program the global gain from a Q42.22 linear gain
    pub fn set_gain(&mut self, raw: i64) -> Result<(), crate::Error<CommE>> {
        let code = controls::gain_code(raw)?;

        #[cfg(feature = "rttdebug")]
        {
            let (whole, frac) = controls::split_gain(code);
            rprintln!("gain {} + {}/32", whole, frac);
        }

        self.write_reg(Register::GlobalGain as u16, code)
    }

    /// Program the coarse integration time from a Q42.22 duration in seconds
    pub fn set_exposure(&mut self, raw: i64) -> Result<(), crate::Error<CommE>> {
        let mode = self.sensor_mode()?;
        self.coarse_time = controls::coarse_time(raw, mode)?;

        #[cfg(feature = "rttdebug")]
        rprintln!("coarse time 0x{:04x}", self.coarse_time);

        self.write_reg(Register::CoarseIntTime as u16, self.coarse_time)
    }

    /// Program the frame length from a Q42.22 frame rate in Hz
    pub fn set_frame_rate(&mut self, raw: i64) -> Result<(), crate::Error<CommE>> {
        let mode = self.sensor_mode()?;
        self.frame_length = controls::frame_length(raw, mode)?;

        #[cfg(feature = "rttdebug")]
        rprintln!("frame length 0x{:04x}", self.frame_length);

        self.write_reg(Register::FrameLengthLines as u16, self.frame_length)
    }

    fn update_read_mode(
        &mut self,
        mask: u16,
        on: bool,
    ) -> Result<(), crate::Error<CommE>> {
        let current = self.read_reg(Register::ReadMode as u16)?;
        let updated = controls::flip_bits(current, mask, on);
        self.write_reg(Register::ReadMode as u16, updated)
    }

    /// Read a u16 from a 16-bit sensor address
    pub fn read_reg(&mut self, reg: u16) -> Result<u16, crate::Error<CommE>> {
        // address is written without a stop, then the data is read back
        let cmd_buf = reg.to_be_bytes();
        let mut recv_buf = [0u8; 2];
        self.i2c
            .write_read(self.sensor_address, &cmd_buf, &mut recv_buf)
            .map_err(Error::Comm)?;

        Ok(u16::from_be_bytes(recv_buf))
    }

    /// Write a u16 to a 16-bit sensor address
    pub fn write_reg(
        &mut self,
        reg: u16,
        data: u16,
    ) -> Result<(), crate::Error<CommE>> {
        self.write_raw(reg, data).map_err(Error::Comm)
    }

    fn write_raw(&mut self, reg: u16, data: u16) -> Result<(), CommE> {
        let [addr_hi, addr_lo] = reg.to_be_bytes();
        let [data_hi, data_lo] = data.to_be_bytes();
        self.i2c
            .write(self.sensor_address, &[addr_hi, addr_lo, data_hi, data_lo])
    }
}

/// MT9M021 registers used by this driver
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Register {
    ChipId = 0x3000,
    YAddrStart = 0x3002,
    XAddrStart = 0x3004,
    YAddrEnd = 0x3006,
    XAddrEnd = 0x3008,
    FrameLengthLines = 0x300A,
    LineLengthPck = 0x300C,
    CoarseIntTime = 0x3012,
    FineIntTime = 0x3014,
    ResetRegister = 0x301A,
    DataPedestal = 0x301E,
    VtPixClkDiv = 0x302A,
    VtSysClkDiv = 0x302C,
    PrePllClkDiv = 0x302E,
    PllMultiplier = 0x3030,
    DigitalBinning = 0x3032,
    ReadMode = 0x3040,
    DarkControl = 0x3044,
    Flash = 0x3046,
    GlobalGain = 0x305E,
    TestPattern = 0x3070,
    /// Also carries the analog column gain field
    DigitalTest = 0x30B0,
    ColumnCorrection = 0x30D4,
    AeCtrl = 0x3100,
}
