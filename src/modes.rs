/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

//! Sensor mode catalog and register tables

use crate::table::RegOp::{self, End, WaitMs, Write};
use crate::Register;
use crate::{RESET_REG_SOFT_RESET, RESET_REG_STREAM_OFF};

/// External clock supplied to the sensor, Hz
pub const EXT_CLOCK_HZ: u32 = 24_000_000;

/// Geometry and timing of one supported sensor mode
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SensorMode {
    pub width: u32,
    pub height: u32,
    /// Output pixel clock, Hz
    pub pixel_clock: u32,
    /// Line length including horizontal blanking, pixels
    pub line_length: u32,
    /// Register table applied after `MODE_COMMON` when this mode starts streaming
    pub table: &'static [RegOp],
}

/// Applied on every stream start, before the per-mode table
pub const MODE_COMMON: &[RegOp] = &[
    Write(Register::ResetRegister as u16, RESET_REG_SOFT_RESET),
    WaitMs(200),
    Write(Register::ResetRegister as u16, RESET_REG_STREAM_OFF),
    // 24MHz / 4 * 99 / 8 = 74.25MHz
    Write(Register::VtSysClkDiv as u16, 0x0001),
    Write(Register::VtPixClkDiv as u16, 0x0008),
    Write(Register::PrePllClkDiv as u16, 0x0004),
    Write(Register::PllMultiplier as u16, 0x0063),
    WaitMs(1),
    Write(Register::DigitalTest as u16, 0x1300),
    Write(Register::DataPedestal as u16, 0x00A8),
    Write(Register::ColumnCorrection as u16, 0xE007),
    Write(Register::DarkControl as u16, 0x0400),
    Write(Register::AeCtrl as u16, 0x0000),
    Write(Register::DigitalBinning as u16, 0x0000),
    Write(Register::FineIntTime as u16, 0x0000),
    End,
];

pub const MODE_1280X720_30FPS: &[RegOp] = &[
    Write(Register::YAddrStart as u16, 0x0078),
    Write(Register::XAddrStart as u16, 0x0002),
    Write(Register::YAddrEnd as u16, 0x0347),
    Write(Register::XAddrEnd as u16, 0x0501),
    Write(Register::LineLengthPck as u16, 0x0672),
    Write(Register::FrameLengthLines as u16, 0x05DA),
    Write(Register::ReadMode as u16, 0x0000),
    End,
];

pub const MODE_1280X960_30FPS: &[RegOp] = &[
    Write(Register::YAddrStart as u16, 0x0004),
    Write(Register::XAddrStart as u16, 0x0002),
    Write(Register::YAddrEnd as u16, 0x03C3),
    Write(Register::XAddrEnd as u16, 0x0501),
    Write(Register::LineLengthPck as u16, 0x0672),
    Write(Register::FrameLengthLines as u16, 0x05DA),
    Write(Register::ReadMode as u16, 0x0000),
    End,
];

/// Built-in mode catalog; index 0 is the default mode
pub static MODES: &[SensorMode] = &[
    SensorMode {
        width: 1280,
        height: 720,
        pixel_clock: 74_250_000,
        line_length: 1650,
        table: MODE_1280X720_30FPS,
    },
    SensorMode {
        width: 1280,
        height: 960,
        pixel_clock: 74_250_000,
        line_length: 1650,
        table: MODE_1280X960_30FPS,
    },
];
