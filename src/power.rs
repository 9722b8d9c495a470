/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

//! Supply rail and reset line sequencing.
//!
//! The MT9M021 must see its rails in a fixed order:
//! dvdd (1.2V) -> avdd (2.8V) -> iovdd (1.8V) -> reset released.
//! Power-down is the exact reverse.

#[cfg(feature = "rttdebug")]
use panic_rtt_core::rprintln;

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::digital::v2::OutputPin;

/// A switchable voltage supply, provided by the board
pub trait PowerRail {
    type Error;

    fn enable(&mut self) -> Result<(), Self::Error>;
    fn disable(&mut self) -> Result<(), Self::Error>;
}

/// Names the sensor supply rails
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Rail {
    /// 1.2V digital core
    Dvdd,
    /// 2.8V analog
    Avdd,
    /// 1.8V I/O
    Iovdd,
}

const POWER_UP_ORDER: [Rail; 3] = [Rail::Dvdd, Rail::Avdd, Rail::Iovdd];

/// Aggregate power state of the board
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PowerState {
    Off,
    Powering,
    On,
    /// Rolling back rails after a failed power-up
    Failing,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PowerError {
    /// The rail refused to enable
    Rail(Rail),
    ResetLine,
}

/// Settle time between the last rail coming up and reset release
pub const RAIL_SETTLE_MS: u32 = 30;
/// Time the sensor needs after reset release to finish its internal boot
pub const BOOT_DELAY_MS: u32 = 200;
/// Propagation delay between consecutive rail transitions
pub const INTER_RAIL_DELAY_US: u32 = 100;

/// Board power handles. A `None` handle is not present on the board
/// and every operation on it is a no-op.
pub struct PowerRails<R, RST> {
    pub dvdd: Option<R>,
    pub avdd: Option<R>,
    pub iovdd: Option<R>,
    pub reset: Option<RST>,
}

impl<R, RST> PowerRails<R, RST> {
    /// No controllable rails: the board is powered externally
    pub fn none() -> Self {
        Self {
            dvdd: None,
            avdd: None,
            iovdd: None,
            reset: None,
        }
    }
}

pub(crate) struct PowerSequencer<R, RST> {
    rails: PowerRails<R, RST>,
    state: PowerState,
}

impl<R, RST> PowerSequencer<R, RST>
where
    R: PowerRail,
    RST: OutputPin,
{
    pub fn new(rails: PowerRails<R, RST>) -> Self {
        Self {
            rails,
            state: PowerState::Off,
        }
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    fn rail_mut(&mut self, rail: Rail) -> Option<&mut R> {
        match rail {
            Rail::Dvdd => self.rails.dvdd.as_mut(),
            Rail::Avdd => self.rails.avdd.as_mut(),
            Rail::Iovdd => self.rails.iovdd.as_mut(),
        }
    }

    fn enable(&mut self, rail: Rail) -> Result<(), PowerError> {
        match self.rail_mut(rail) {
            Some(handle) => handle.enable().map_err(|_| PowerError::Rail(rail)),
            None => Ok(()),
        }
    }

    fn disable(&mut self, rail: Rail) {
        if let Some(handle) = self.rail_mut(rail) {
            // teardown is best-effort
            let _ = handle.disable();
        }
    }

    /// Disable `rails` in reverse order and drop back to `Off`
    fn roll_back(&mut self, rails: &[Rail]) {
        self.state = PowerState::Failing;
        for rail in rails.iter().rev() {
            self.disable(*rail);
        }
        self.state = PowerState::Off;
    }

    /// Bring the rails up in order and release reset.
    /// On a rail failure every rail enabled so far is switched back off.
    pub fn power_on<D>(&mut self, delay: &mut D) -> Result<(), PowerError>
    where
        D: DelayMs<u32> + DelayUs<u32>,
    {
        if self.state == PowerState::On {
            return Ok(());
        }

        #[cfg(feature = "rttdebug")]
        rprintln!("power on");

        self.state = PowerState::Powering;
        for (i, rail) in POWER_UP_ORDER.iter().enumerate() {
            if i > 0 {
                delay.delay_us(INTER_RAIL_DELAY_US);
            }
            if let Err(err) = self.enable(*rail) {
                #[cfg(feature = "rttdebug")]
                rprintln!("power on failed at {:?}", rail);
                self.roll_back(&POWER_UP_ORDER[..i]);
                return Err(err);
            }
        }

        delay.delay_ms(RAIL_SETTLE_MS);
        if let Some(reset) = self.rails.reset.as_mut() {
            if reset.set_high().is_err() {
                #[cfg(feature = "rttdebug")]
                rprintln!("power on failed at reset line");
                self.roll_back(&POWER_UP_ORDER);
                return Err(PowerError::ResetLine);
            }
        }
        delay.delay_ms(BOOT_DELAY_MS);

        self.state = PowerState::On;
        Ok(())
    }

    /// Assert reset and drop the rails in reverse order.
    /// Always completes; failures of individual handles are ignored.
    pub fn power_off<D>(&mut self, delay: &mut D)
    where
        D: DelayMs<u32> + DelayUs<u32>,
    {
        #[cfg(feature = "rttdebug")]
        rprintln!("power off");

        if let Some(reset) = self.rails.reset.as_mut() {
            let _ = reset.set_low();
        }
        for rail in POWER_UP_ORDER.iter().rev() {
            delay.delay_us(INTER_RAIL_DELAY_US);
            self.disable(*rail);
        }
        self.state = PowerState::Off;
    }
}
