/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

//! Control value conversion.
//!
//! Gain, exposure and frame rate arrive as signed Q42.22 fixed point
//! (`raw / 2^22` is the physical value). Conversions truncate toward zero,
//! the same as the register formats do.

use core::convert::TryFrom;

use crate::modes::SensorMode;

/// Number of fractional bits in a control value
pub const FRACTION_BITS: u32 = 22;
/// 1.0 in Q42.22
pub const FIXED_ONE: i64 = 1 << FRACTION_BITS;

/// Horizontal flip bit of the read mode register
pub const HFLIP_MASK: u16 = 0x4000;
/// Vertical flip bit of the read mode register
pub const VFLIP_MASK: u16 = 0x8000;

/// Column gain field of the digital test register
pub const ANALOG_GAIN_MASK: u16 = 0x0030;
pub const ANALOG_GAIN_SHIFT: u16 = 4;

/// Extra blanking pixels the sensor adds to every line
const H_BLANK_RESERVED: i64 = 12;

const TEST_PATTERN_CODES: [u16; 5] = [0x0, 0x1, 0x2, 0x3, 0x100];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ControlError {
    /// No control has this numeric id
    InvalidId(u32),
    /// The value cannot be represented by the control
    OutOfRange(ControlId),
    /// The value is valid for the framework but not for this sensor
    Unsupported(ControlId),
}

/// Numeric control ids as used by the V4L2 / Tegra camera framework
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ControlId {
    GroupHold = 0x009a_2003,
    HdrEnable = 0x009a_2004,
    Gain = 0x009a_2009,
    Exposure = 0x009a_200a,
    FrameRate = 0x009a_200b,
    HorizontalFlip = 0x0098_0914,
    VerticalFlip = 0x0098_0915,
    FlashLedMode = 0x009c_0901,
    AnalogGain = 0x009e_0903,
    TestPattern = 0x009f_0903,
}

impl TryFrom<u32> for ControlId {
    type Error = ControlError;

    fn try_from(id: u32) -> Result<Self, ControlError> {
        use ControlId::*;
        let known = [
            GroupHold,
            HdrEnable,
            Gain,
            Exposure,
            FrameRate,
            HorizontalFlip,
            VerticalFlip,
            FlashLedMode,
            AnalogGain,
            TestPattern,
        ];
        known
            .iter()
            .copied()
            .find(|c| *c as u32 == id)
            .ok_or(ControlError::InvalidId(id))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlashMode {
    None,
    Flash,
    /// Not supported by the sensor's flash output
    Torch,
}

impl TryFrom<i64> for FlashMode {
    type Error = ControlError;

    fn try_from(val: i64) -> Result<Self, ControlError> {
        match val {
            0 => Ok(FlashMode::None),
            1 => Ok(FlashMode::Flash),
            2 => Ok(FlashMode::Torch),
            _ => Err(ControlError::OutOfRange(ControlId::FlashLedMode)),
        }
    }
}

/// A control request with its value
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Control {
    /// Linear gain, Q42.22
    Gain(i64),
    /// Exposure time in seconds, Q42.22
    Exposure(i64),
    /// Frame rate in Hz, Q42.22
    FrameRate(i64),
    HorizontalFlip(bool),
    VerticalFlip(bool),
    /// Column gain step, 0..=3
    AnalogGain(u16),
    Flash(FlashMode),
    /// Test pattern menu index, 0..=4
    TestPattern(u8),
    HdrEnable(bool),
    GroupHold(bool),
}

impl Control {
    /// Build a control from a framework id and its integer value
    pub fn from_raw(id: u32, value: i64) -> Result<Self, ControlError> {
        let id = ControlId::try_from(id)?;
        let small = |max: i64| {
            if (0..=max).contains(&value) {
                Ok(value)
            } else {
                Err(ControlError::OutOfRange(id))
            }
        };
        let control = match id {
            ControlId::Gain => Control::Gain(value),
            ControlId::Exposure => Control::Exposure(value),
            ControlId::FrameRate => Control::FrameRate(value),
            ControlId::HorizontalFlip => Control::HorizontalFlip(small(1)? != 0),
            ControlId::VerticalFlip => Control::VerticalFlip(small(1)? != 0),
            ControlId::AnalogGain => {
                Control::AnalogGain(small(i64::from(ANALOG_GAIN.max))? as u16)
            }
            ControlId::FlashLedMode => Control::Flash(FlashMode::try_from(value)?),
            ControlId::TestPattern => Control::TestPattern(small(4)? as u8),
            ControlId::HdrEnable => Control::HdrEnable(small(1)? != 0),
            ControlId::GroupHold => Control::GroupHold(small(1)? != 0),
        };
        Ok(control)
    }

    pub fn id(&self) -> ControlId {
        match self {
            Control::Gain(_) => ControlId::Gain,
            Control::Exposure(_) => ControlId::Exposure,
            Control::FrameRate(_) => ControlId::FrameRate,
            Control::HorizontalFlip(_) => ControlId::HorizontalFlip,
            Control::VerticalFlip(_) => ControlId::VerticalFlip,
            Control::AnalogGain(_) => ControlId::AnalogGain,
            Control::Flash(_) => ControlId::FlashLedMode,
            Control::TestPattern(_) => ControlId::TestPattern,
            Control::HdrEnable(_) => ControlId::HdrEnable,
            Control::GroupHold(_) => ControlId::GroupHold,
        }
    }
}

/// Limits of an integer control
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ControlRange<T> {
    pub min: T,
    pub max: T,
    pub default: T,
    pub step: T,
}

impl<T: PartialOrd + Copy> ControlRange<T> {
    pub fn contains(&self, val: T) -> bool {
        val >= self.min && val <= self.max
    }
}

/// 1.0 ..= 7.96875 in 1/32 steps
pub const GAIN: ControlRange<i64> = ControlRange {
    min: 100_000 * FIXED_ONE / 100_000,
    max: 796_875 * FIXED_ONE / 100_000,
    default: 100_000 * FIXED_ONE / 100_000,
    step: 3_125 * FIXED_ONE / 100_000,
};

/// 23us ..= 30ms
pub const EXPOSURE: ControlRange<i64> = ControlRange {
    min: 23 * FIXED_ONE / 1_000_000,
    max: 30_000 * FIXED_ONE / 1_000_000,
    default: 5_689 * FIXED_ONE / 1_000_000,
    step: 1,
};

/// 1 ..= 60 Hz
pub const FRAME_RATE: ControlRange<i64> = ControlRange {
    min: FIXED_ONE,
    max: 60 * FIXED_ONE,
    default: 30 * FIXED_ONE,
    step: FIXED_ONE,
};

pub const ANALOG_GAIN: ControlRange<u16> = ControlRange {
    min: 0,
    max: 3,
    default: 0,
    step: 1,
};

/// Q42.22 gain to the sensor's global gain code (5 fractional bits)
pub fn gain_code(raw: i64) -> Result<u16, ControlError> {
    if raw < 0 {
        return Err(ControlError::OutOfRange(ControlId::Gain));
    }
    Ok((raw / (1 << 17)) as u16)
}

/// Split a gain code into its integer part and 1/32 fraction
pub fn split_gain(code: u16) -> (u16, u16) {
    (code >> 5, code % 32)
}

/// Q42.22 exposure seconds to lines of coarse integration time
pub fn coarse_time(raw: i64, mode: &SensorMode) -> Result<u16, ControlError> {
    let out_of_range = ControlError::OutOfRange(ControlId::Exposure);
    if raw < 0 || mode.line_length == 0 {
        return Err(out_of_range);
    }
    let lines = raw
        .checked_mul(i64::from(mode.pixel_clock))
        .ok_or(out_of_range)?
        / i64::from(mode.line_length)
        / FIXED_ONE;
    Ok(lines as u16)
}

/// Q42.22 frame rate to the frame length register (total lines minus one)
pub fn frame_length(raw: i64, mode: &SensorMode) -> Result<u16, ControlError> {
    if raw <= 0 || mode.line_length == 0 {
        return Err(ControlError::OutOfRange(ControlId::FrameRate));
    }
    let mut length = i64::from(mode.pixel_clock) * FIXED_ONE / raw;
    length -= i64::from(mode.width) + H_BLANK_RESERVED;
    length /= i64::from(mode.line_length);
    Ok((length - 1) as u16)
}

/// Flash register value for a flash mode
pub fn flash_code(mode: FlashMode) -> Result<u16, ControlError> {
    match mode {
        FlashMode::None => Ok(0x0000),
        FlashMode::Flash => Ok(0x0180),
        FlashMode::Torch => Err(ControlError::Unsupported(ControlId::FlashLedMode)),
    }
}

/// Test pattern register value for a menu index
pub fn test_pattern_code(index: u8) -> Result<u16, ControlError> {
    TEST_PATTERN_CODES
        .get(usize::from(index))
        .copied()
        .ok_or(ControlError::OutOfRange(ControlId::TestPattern))
}

/// Replace the column gain field of a digital test register value
pub fn analog_gain_bits(current: u16, gain: u16) -> Result<u16, ControlError> {
    if !ANALOG_GAIN.contains(gain) {
        return Err(ControlError::OutOfRange(ControlId::AnalogGain));
    }
    Ok((current & !ANALOG_GAIN_MASK)
        | ((gain << ANALOG_GAIN_SHIFT) & ANALOG_GAIN_MASK))
}

/// Set or clear a flip bit of a read mode register value
pub fn flip_bits(current: u16, mask: u16, on: bool) -> u16 {
    if on {
        current | mask
    } else {
        current & !mask
    }
}

/// Gain, frame rate and exposure to re-apply at stream start
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Overrides {
    pub gain: i64,
    pub frame_rate: i64,
    pub exposure: i64,
}

/// Source of the current control values
pub trait ControlStore {
    /// Current gain, frame rate and exposure, or `None` if they
    /// cannot be fetched right now
    fn overrides(&self) -> Option<Overrides>;
}

/// Current value of every control, starting from the defaults.
/// Values only change through [`ControlValues::set`], which checks limits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ControlValues {
    gain: i64,
    exposure: i64,
    frame_rate: i64,
    hflip: bool,
    vflip: bool,
    analog_gain: u16,
    flash: FlashMode,
    test_pattern: u8,
}

impl Default for ControlValues {
    fn default() -> Self {
        Self {
            gain: GAIN.default,
            exposure: EXPOSURE.default,
            frame_rate: FRAME_RATE.default,
            hflip: false,
            vflip: false,
            analog_gain: ANALOG_GAIN.default,
            flash: FlashMode::Flash,
            test_pattern: 0,
        }
    }
}

impl ControlValues {
    pub fn gain(&self) -> i64 {
        self.gain
    }

    pub fn exposure(&self) -> i64 {
        self.exposure
    }

    pub fn frame_rate(&self) -> i64 {
        self.frame_rate
    }

    pub fn hflip(&self) -> bool {
        self.hflip
    }

    pub fn vflip(&self) -> bool {
        self.vflip
    }

    pub fn analog_gain(&self) -> u16 {
        self.analog_gain
    }

    pub fn flash(&self) -> FlashMode {
        self.flash
    }

    pub fn test_pattern(&self) -> u8 {
        self.test_pattern
    }

    /// Record a new value, rejecting anything outside the control's limits
    pub fn set(&mut self, control: Control) -> Result<(), ControlError> {
        let out_of_range = Err(ControlError::OutOfRange(control.id()));
        match control {
            Control::Gain(v) if GAIN.contains(v) => self.gain = v,
            Control::Exposure(v) if EXPOSURE.contains(v) => self.exposure = v,
            Control::FrameRate(v) if FRAME_RATE.contains(v) => self.frame_rate = v,
            Control::Gain(_) | Control::Exposure(_) | Control::FrameRate(_) => {
                return out_of_range
            }
            Control::HorizontalFlip(on) => self.hflip = on,
            Control::VerticalFlip(on) => self.vflip = on,
            Control::AnalogGain(v) if ANALOG_GAIN.contains(v) => {
                self.analog_gain = v
            }
            Control::AnalogGain(_) => return out_of_range,
            Control::Flash(mode) => {
                flash_code(mode)?;
                self.flash = mode;
            }
            Control::TestPattern(index) => {
                test_pattern_code(index)?;
                self.test_pattern = index;
            }
            Control::HdrEnable(_) | Control::GroupHold(_) => {}
        }
        Ok(())
    }

    /// Every programmable control, frame rate ahead of exposure
    pub fn snapshot(&self) -> [Control; 8] {
        [
            Control::Gain(self.gain),
            Control::FrameRate(self.frame_rate),
            Control::Exposure(self.exposure),
            Control::AnalogGain(self.analog_gain),
            Control::Flash(self.flash),
            Control::HorizontalFlip(self.hflip),
            Control::VerticalFlip(self.vflip),
            Control::TestPattern(self.test_pattern),
        ]
    }
}

impl ControlStore for ControlValues {
    fn overrides(&self) -> Option<Overrides> {
        Some(Overrides {
            gain: self.gain,
            frame_rate: self.frame_rate,
            exposure: self.exposure,
        })
    }
}
