/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

//! Recording fakes shared by the unit tests

extern crate std;

use core::cell::RefCell;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::digital::v2::OutputPin;
use embedded_hal_mock::i2c::Mock as I2cMock;

use crate::power::{PowerRail, PowerRails, Rail};
use crate::Daxc02;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Enable(Rail),
    Disable(Rail),
    Reset(bool),
    DelayMs(u32),
    DelayUs(u32),
}

pub type Log = Rc<RefCell<Vec<Event>>>;

#[derive(Clone, Default)]
pub struct FakeDelay {
    pub log: Log,
}

impl FakeDelay {
    pub fn with_log(log: &Log) -> Self {
        Self { log: log.clone() }
    }

    pub fn ms_calls(&self) -> Vec<u32> {
        self.log
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::DelayMs(ms) => Some(*ms),
                _ => None,
            })
            .collect()
    }
}

impl DelayMs<u32> for FakeDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.log.borrow_mut().push(Event::DelayMs(ms));
    }
}

impl DelayUs<u32> for FakeDelay {
    fn delay_us(&mut self, us: u32) {
        self.log.borrow_mut().push(Event::DelayUs(us));
    }
}

pub struct FakeRail {
    rail: Rail,
    log: Log,
    fail_enable: bool,
}

impl FakeRail {
    pub fn new(rail: Rail, log: &Log) -> Self {
        Self {
            rail,
            log: log.clone(),
            fail_enable: false,
        }
    }

    pub fn failing(rail: Rail, log: &Log) -> Self {
        Self {
            fail_enable: true,
            ..Self::new(rail, log)
        }
    }
}

impl PowerRail for FakeRail {
    type Error = ();

    fn enable(&mut self) -> Result<(), ()> {
        self.log.borrow_mut().push(Event::Enable(self.rail));
        if self.fail_enable {
            Err(())
        } else {
            Ok(())
        }
    }

    fn disable(&mut self) -> Result<(), ()> {
        self.log.borrow_mut().push(Event::Disable(self.rail));
        Ok(())
    }
}

pub struct FakeLine {
    log: Log,
    fail: bool,
}

impl FakeLine {
    pub fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            fail: false,
        }
    }

    /// A reset line whose every drive attempt fails without being logged
    pub fn failing(log: &Log) -> Self {
        Self {
            log: log.clone(),
            fail: true,
        }
    }

    fn drive(&mut self, high: bool) -> Result<(), ()> {
        if self.fail {
            return Err(());
        }
        self.log.borrow_mut().push(Event::Reset(high));
        Ok(())
    }
}

impl OutputPin for FakeLine {
    type Error = ();

    fn set_low(&mut self) -> Result<(), ()> {
        self.drive(false)
    }

    fn set_high(&mut self) -> Result<(), ()> {
        self.drive(true)
    }
}

/// All three rails and the reset line, recording into one log
pub fn full_rails(log: &Log) -> PowerRails<FakeRail, FakeLine> {
    PowerRails {
        dvdd: Some(FakeRail::new(Rail::Dvdd, log)),
        avdd: Some(FakeRail::new(Rail::Avdd, log)),
        iovdd: Some(FakeRail::new(Rail::Iovdd, log)),
        reset: Some(FakeLine::new(log)),
    }
}

pub type TestDriver = Daxc02<I2cMock, FakeDelay, FakeRail, FakeLine>;

/// Driver with no rails configured, still powered down
pub fn driver(i2c: I2cMock, delay: FakeDelay) -> TestDriver {
    Daxc02::new(i2c, delay, PowerRails::none())
}

/// Driver with no rails configured, already through power-on
pub fn powered_driver(i2c: I2cMock) -> TestDriver {
    let mut dev = driver(i2c, FakeDelay::default());
    if dev.power_on().is_err() {
        panic!("power on without rails cannot fail");
    }
    dev
}
