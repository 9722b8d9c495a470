/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

//! Table-driven sensor register programming

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::blocking::i2c;
use embedded_hal::digital::v2::OutputPin;

use crate::power::PowerRail;
use crate::{Daxc02, Error};

/// One step of a sensor register table
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegOp {
    /// Write a value to a 16-bit register address
    Write(u16, u16),
    /// Sleep for the given number of milliseconds; no bus traffic
    WaitMs(u16),
    /// End of table; anything after this is never visited
    End,
}

impl<I2C, CommE, D, R, RST> Daxc02<I2C, D, R, RST>
where
    I2C: i2c::Write<Error = CommE> + i2c::WriteRead<Error = CommE>,
    D: DelayMs<u32> + DelayUs<u32>,
    R: PowerRail,
    RST: OutputPin,
{
    /// Apply a register table in order.
    /// Stops at the first `End` or the first failed write; registers already
    /// written are left as they are.
    pub fn write_table(
        &mut self,
        table: &[RegOp],
    ) -> Result<(), crate::Error<CommE>> {
        for op in table {
            match *op {
                RegOp::End => break,
                RegOp::WaitMs(ms) => self.delay.delay_ms(u32::from(ms)),
                RegOp::Write(reg, val) => {
                    self.write_raw(reg, val)
                        .map_err(|e| Error::Table(reg, e))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::testing::{driver, powered_driver, FakeDelay};
    use embedded_hal_mock::i2c::{Mock as I2cMock, Transaction};
    use embedded_hal_mock::MockError;
    use std::io::ErrorKind;
    use std::vec;

    const ADDR: u8 = crate::DEFAULT_SENSOR_ADDRESS;

    #[test]
    fn stops_at_first_end() {
        let i2c = I2cMock::new(&[Transaction::write(
            ADDR,
            vec![0x30, 0x1A, 0x00, 0x01],
        )]);
        let mut dev = driver(i2c.clone(), FakeDelay::default());

        let table = [
            RegOp::Write(0x301A, 0x0001),
            RegOp::End,
            RegOp::Write(0x3012, 0x0010),
        ];
        dev.write_table(&table).unwrap();

        let mut i2c = i2c;
        i2c.done();
    }

    #[test]
    fn wait_sleeps_without_bus_traffic() {
        let i2c = I2cMock::new(&[]);
        let delay = FakeDelay::default();
        let mut dev = driver(i2c.clone(), delay.clone());

        dev.write_table(&[RegOp::WaitMs(200), RegOp::End]).unwrap();

        assert_eq!(delay.ms_calls(), vec![200]);
        let mut i2c = i2c;
        i2c.done();
    }

    #[test]
    fn failure_reports_address_and_aborts() {
        let i2c = I2cMock::new(&[
            Transaction::write(ADDR, vec![0x30, 0x2A, 0x00, 0x08]),
            Transaction::write(ADDR, vec![0x30, 0x2C, 0x00, 0x01])
                .with_error(MockError::Io(ErrorKind::Other)),
        ]);
        let mut dev = powered_driver(i2c.clone());

        let table = [
            RegOp::Write(0x302A, 0x0008),
            RegOp::Write(0x302C, 0x0001),
            RegOp::Write(0x302E, 0x0004),
            RegOp::End,
        ];
        match dev.write_table(&table) {
            Err(Error::Table(0x302C, _)) => {}
            other => panic!("unexpected result {:?}", other),
        }

        let mut i2c = i2c;
        i2c.done();
    }

    #[test]
    fn table_without_end_runs_to_the_last_entry() {
        let i2c = I2cMock::new(&[
            Transaction::write(ADDR, vec![0x30, 0x5E, 0x00, 0x20]),
            Transaction::write(ADDR, vec![0x30, 0x70, 0x00, 0x00]),
        ]);
        let mut dev = driver(i2c.clone(), FakeDelay::default());

        dev.write_table(&[RegOp::Write(0x305E, 0x20), RegOp::Write(0x3070, 0)])
            .unwrap();

        let mut i2c = i2c;
        i2c.done();
    }
}
