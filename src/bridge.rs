/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

//! TC358746 parallel-to-MIPI bridge configuration

#[cfg(feature = "rttdebug")]
use panic_rtt_core::rprintln;

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::blocking::i2c;
use embedded_hal::digital::v2::OutputPin;

use crate::power::PowerRail;
use crate::{Daxc02, Error};

/// TC358746 registers touched during setup
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BridgeRegister {
    SysCtl = 0x0002,
    ConfCtl = 0x0004,
    FifoCtl = 0x0006,
    DataFmt = 0x0008,
    PllCtl0 = 0x0016,
    PllCtl1 = 0x0018,
    WordCnt = 0x0022,
    ClwCntrl = 0x0140,
    D0wCntrl = 0x0144,
    D1wCntrl = 0x0148,
    D2wCntrl = 0x014C,
    D3wCntrl = 0x0150,
    StartCntrl = 0x0204,
    LineInitCnt = 0x0210,
    LptxTimeCnt = 0x0214,
    TclkHeaderCnt = 0x0218,
    TclkTrailCnt = 0x021C,
    ThsHeaderCnt = 0x0220,
    TwakeUp = 0x0224,
    TclkPostCnt = 0x0228,
    ThsTrailCnt = 0x022C,
    HstxVregEn = 0x0234,
    TxOptionCntrl = 0x0238,
    CsiConfW = 0x0500,
    CsiStart = 0x0518,
}

/// Data width of a bridge register
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Width {
    /// 16-bit register, low half of `data` is sent
    Short,
    /// 32-bit register
    Long,
}

/// One bridge register write
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BridgeSetting {
    pub width: Width,
    pub addr: u16,
    pub data: u32,
}

impl BridgeSetting {
    pub const fn short(reg: BridgeRegister, data: u16) -> Self {
        Self {
            width: Width::Short,
            addr: reg as u16,
            data: data as u32,
        }
    }

    pub const fn long(reg: BridgeRegister, data: u32) -> Self {
        Self {
            width: Width::Long,
            addr: reg as u16,
            data,
        }
    }

    /// Serialize into `buf` and return the bytes to put on the wire:
    /// ADDR[15:8] ADDR[7:0] DATA[15:8] DATA[7:0] then, for 32-bit registers,
    /// DATA[31:24] DATA[23:16].
    pub fn encode<'a>(&self, buf: &'a mut [u8; 6]) -> &'a [u8] {
        let [addr_hi, addr_lo] = self.addr.to_be_bytes();
        let [d3, d2, d1, d0] = self.data.to_be_bytes();
        *buf = [addr_hi, addr_lo, d1, d0, d3, d2];
        match self.width {
            Width::Short => &buf[..4],
            Width::Long => &buf[..],
        }
    }
}

use BridgeRegister::*;

/// Full bridge bring-up, applied on every stream start.
/// PLL first, then FIFO and format, lanes, PHY timing, CSI start,
/// and finally the parallel port is re-enabled.
pub const BRIDGE_CONFIG: &[BridgeSetting] = &[
    // parallel port off, then pulse reset
    BridgeSetting::short(ConfCtl, 0x0004),
    BridgeSetting::short(SysCtl, 0x0001),
    BridgeSetting::short(SysCtl, 0x0000),
    // input / feedback divide ratio
    BridgeSetting::short(PllCtl0, 0x3095),
    // 50% loop bandwidth, PLL clock on, PLL on
    BridgeSetting::short(PllCtl1, 0x0213),
    BridgeSetting::short(FifoCtl, 0x01C2),
    // RAW12
    BridgeSetting::short(DataFmt, 0x0020),
    // bytes per line
    BridgeSetting::short(WordCnt, 0x0780),
    // clock lane and data lanes 0-1 on, lanes 2-3 off
    BridgeSetting::long(ClwCntrl, 0x0000_0000),
    BridgeSetting::long(D0wCntrl, 0x0000_0000),
    BridgeSetting::long(D1wCntrl, 0x0000_0000),
    BridgeSetting::long(D2wCntrl, 0x0000_0001),
    BridgeSetting::long(D3wCntrl, 0x0000_0001),
    // PHY timing
    BridgeSetting::long(LineInitCnt, 0x0000_2C00),
    BridgeSetting::long(LptxTimeCnt, 0x0000_0005),
    BridgeSetting::long(TclkHeaderCnt, 0x0000_2004),
    BridgeSetting::long(TclkTrailCnt, 0x0000_0003),
    BridgeSetting::long(ThsHeaderCnt, 0x0000_0705),
    BridgeSetting::long(TwakeUp, 0x0000_4988),
    BridgeSetting::long(TclkPostCnt, 0x0000_000A),
    BridgeSetting::long(ThsTrailCnt, 0x0000_0004),
    BridgeSetting::long(HstxVregEn, 0x0000_0007),
    // discontinuous clock
    BridgeSetting::long(TxOptionCntrl, 0x0000_0000),
    // PPI start
    BridgeSetting::long(StartCntrl, 0x0000_0001),
    BridgeSetting::long(CsiStart, 0x0000_0001),
    // two data lanes
    BridgeSetting::long(CsiConfW, 0xA300_80A3),
    // address auto-increment, parallel port on, 2 CSI lanes
    BridgeSetting::short(ConfCtl, 0x0045),
];

impl<I2C, CommE, D, R, RST> Daxc02<I2C, D, R, RST>
where
    I2C: i2c::Write<Error = CommE> + i2c::WriteRead<Error = CommE>,
    D: DelayMs<u32> + DelayUs<u32>,
    R: PowerRail,
    RST: OutputPin,
{
    /// Program the whole bridge configuration.
    /// Aborts at the first failed write; nothing is undone.
    pub fn setup_bridge(&mut self) -> Result<(), crate::Error<CommE>> {
        let mut buf = [0u8; 6];
        for setting in BRIDGE_CONFIG {
            let bytes = setting.encode(&mut buf);
            if let Err(e) = self.i2c.write(self.bridge_address, bytes) {
                #[cfg(feature = "rttdebug")]
                rprintln!("bridge setup failed at 0x{:04x}", setting.addr);
                return Err(Error::Bridge(setting.addr, e));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::testing::powered_driver;
    use embedded_hal_mock::i2c::{Mock as I2cMock, Transaction};
    use embedded_hal_mock::MockError;
    use std::io::ErrorKind;
    use std::vec;
    use std::vec::Vec;

    const ADDR: u8 = crate::DEFAULT_BRIDGE_ADDRESS;

    #[test]
    fn short_setting_sends_four_bytes() {
        let mut buf = [0u8; 6];
        let setting = BridgeSetting::short(PllCtl0, 0x3095);
        assert_eq!(setting.encode(&mut buf), &[0x00, 0x16, 0x30, 0x95]);
    }

    #[test]
    fn long_setting_sends_low_half_first() {
        let mut buf = [0u8; 6];
        let setting = BridgeSetting::long(CsiConfW, 0xA300_80A3);
        assert_eq!(
            setting.encode(&mut buf),
            &[0x05, 0x00, 0x80, 0xA3, 0xA3, 0x00]
        );
    }

    #[test]
    fn ordering_constraints_hold() {
        let pos = |addr: BridgeRegister| {
            BRIDGE_CONFIG
                .iter()
                .position(|s| s.addr == addr as u16)
                .unwrap()
        };
        assert_eq!(BRIDGE_CONFIG.first().unwrap().addr, ConfCtl as u16);
        assert!(pos(PllCtl1) < pos(LineInitCnt));
        assert!(pos(HstxVregEn) < pos(CsiStart));
        assert!(pos(CsiStart) < pos(CsiConfW));
        let last = BRIDGE_CONFIG.last().unwrap();
        assert_eq!((last.addr, last.data), (ConfCtl as u16, 0x0045));
    }

    #[test]
    fn setup_writes_every_setting_in_order() {
        let expectations: Vec<Transaction> = BRIDGE_CONFIG
            .iter()
            .map(|s| {
                let mut buf = [0u8; 6];
                Transaction::write(ADDR, s.encode(&mut buf).to_vec())
            })
            .collect();
        let i2c = I2cMock::new(&expectations);
        let mut dev = powered_driver(i2c.clone());

        dev.setup_bridge().unwrap();

        let mut i2c = i2c;
        i2c.done();
    }

    #[test]
    fn setup_aborts_on_first_failure() {
        let i2c = I2cMock::new(&[
            Transaction::write(ADDR, vec![0x00, 0x04, 0x00, 0x04]),
            Transaction::write(ADDR, vec![0x00, 0x02, 0x00, 0x01])
                .with_error(MockError::Io(ErrorKind::Other)),
        ]);
        let mut dev = powered_driver(i2c.clone());

        match dev.setup_bridge() {
            Err(Error::Bridge(0x0002, _)) => {}
            other => panic!("unexpected result {:?}", other),
        }

        let mut i2c = i2c;
        i2c.done();
    }
}
