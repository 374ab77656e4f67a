//! # DS18B20 Driver
//!
//! This module provides a synchronous, architecture-agnostic driver for
//! the `DS18B20` digital temperature sensor.
//! The driver is synchronous to meet the device’s strict timing requirements.
//!
//! The `DS18B20` communicates over the 1-Wire bus and provides temperature
//! readings with a resolution of 9 to 12 bits.
//! It performs temperature conversions internally and exposes the result
//! through its scratchpad memory.
//!
//! The driver operates in *single-sensor mode* using the `Skip ROM` command to
//! address the device directly without needing its unique 64-bit ROM code,
//! so **only one** `DS18B20` may be connected to the bus. Scratchpad bytes
//! are not CRC-checked.
//!
//! A full reading goes through these steps:
//!
//! 1. [`Ds18b20::initialize`] configures the line and the resolution
//! 2. [`Ds18b20::start_conversion`] starts a conversion
//! 3. [`Ds18b20::is_conversion_ready`] is polled until it returns `true`
//! 4. [`Ds18b20::read_temperature`] fetches the temperature register
//! 5. [`Ds18b20::temperature`] returns the value in degrees Celsius (°C)
//!
//! Nothing prevents reading the register before the conversion is over, in
//! which case the previous conversion result is returned.
//! [`Ds18b20::measure`] runs steps 2 to 5 at once.
//!
//! For detailed specifications, refer to the
//! [datasheet](https://www.alldatasheet.com/datasheet-pdf/pdf/58557/DALLAS/DS18B20.html).

use core::result::Result;

use embedded_hal::delay::DelayNs;

#[cfg(feature = "async")]
use embedded_hal_async::delay::DelayNs as AsyncDelay;

use log::{debug, trace, warn};

#[cfg(feature = "critical-section")]
use crate::atomic::CriticalSectionMask;
use crate::atomic::InterruptMask;
use crate::error::Error;
use crate::onewire::OneWire;
use crate::pin::BusPin;
use crate::temperature::{RawTemperature, Resolution};

// DS18B20 ROM and function commands.
const CMD_SKIP_ROM: u8 = 0xCC;
const CMD_CONVERT_T: u8 = 0x44;
const CMD_WRITE_SCRATCHPAD: u8 = 0x4E;
const CMD_READ_SCRATCHPAD: u8 = 0xBE;

// Alarm thresholds written along with the configuration register.
const ALARM_HIGH: u8 = 0;
const ALARM_LOW: u8 = 0;

// Pause between two conversion polls.
const POLL_INTERVAL_MS: u32 = 1;

/// The `DS18B20` driver.
pub struct Ds18b20<P, D, M>
where
    P: BusPin,
    D: DelayNs,
    M: InterruptMask,
{
    wire: OneWire<P, D, M>,
    resolution: Option<Resolution>,
    raw: Option<RawTemperature>,
}

#[cfg(feature = "critical-section")]
impl<P, D> Ds18b20<P, D, CriticalSectionMask>
where
    P: BusPin,
    D: DelayNs,
{
    /// Creates a [`Ds18b20`] driver for the given pin and delay provider.
    ///
    /// Timing-critical sections mask interrupts through the
    /// `critical-section` implementation of the target.
    #[must_use]
    pub fn new(pin: P, delay: D) -> Self {
        Self::with_mask(pin, delay, CriticalSectionMask)
    }
}

impl<P, D, M> Ds18b20<P, D, M>
where
    P: BusPin,
    D: DelayNs,
    M: InterruptMask,
{
    /// Creates a [`Ds18b20`] driver masking interrupts through `mask`.
    #[must_use]
    pub fn with_mask(pin: P, delay: D, mask: M) -> Self {
        Self {
            wire: OneWire::new(pin, delay, mask),
            resolution: None,
            raw: None,
        }
    }

    /// Consumes the driver, returning its pin, delay and mask.
    pub fn release(self) -> (P, D, M) {
        self.wire.release()
    }

    /// Puts the line in its idle state, then sets the conversion resolution.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    ///
    /// - `bits` is not one of 9, 10, 11 or 12
    /// - No device responds on the bus
    /// - Communication with the sensor fails
    pub fn initialize(&mut self, bits: u8) -> Result<(), Error<P::Error>> {
        self.wire.idle()?;
        self.set_resolution(bits)
    }

    /// Sets the conversion resolution, in bits.
    ///
    /// An invalid resolution is rejected before any bus activity and leaves
    /// the stored resolution untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    ///
    /// - `bits` is not one of 9, 10, 11 or 12
    /// - No device responds on the bus
    /// - Communication with the sensor fails
    pub fn set_resolution(&mut self, bits: u8) -> Result<(), Error<P::Error>> {
        let resolution = Resolution::try_from(bits).map_err(Error::InvalidResolution)?;

        self.skip_rom()?;
        self.wire.write_byte(CMD_WRITE_SCRATCHPAD)?;
        self.wire
            .write_bytes(&[ALARM_HIGH, ALARM_LOW, resolution.config_byte()])?;

        self.resolution = Some(resolution);
        debug!("DS18B20 resolution set to {bits} bits");

        Ok(())
    }

    /// Starts a temperature conversion without waiting for its completion.
    ///
    /// # Errors
    ///
    /// Returns an error if no device responds on the bus or if communication
    /// with the sensor fails.
    pub fn start_conversion(&mut self) -> Result<(), Error<P::Error>> {
        self.skip_rom()?;
        self.wire.write_byte(CMD_CONVERT_T)?;

        debug!("DS18B20 conversion started");

        Ok(())
    }

    /// Returns `true` once the conversion started by
    /// [`Ds18b20::start_conversion`] is over.
    ///
    /// The sensor holds the line low while converting, so a single read slot
    /// tells whether it is done.
    ///
    /// # Errors
    ///
    /// Returns an error if accessing the GPIO pin fails.
    #[inline]
    pub fn is_conversion_ready(&mut self) -> Result<bool, Error<P::Error>> {
        self.wire.read_bit()
    }

    /// Polls [`Ds18b20::is_conversion_ready`] every millisecond until the
    /// conversion is over.
    ///
    /// The wait is bounded by the worst-case conversion time of the current
    /// resolution, or of the 12-bit power-on resolution when none was set.
    ///
    /// # Errors
    ///
    /// Returns an error if the conversion does not end in time or if
    /// accessing the GPIO pin fails.
    pub fn wait_for_conversion(&mut self) -> Result<(), Error<P::Error>> {
        for _ in 0..self.conversion_budget_ms() {
            if self.is_conversion_ready()? {
                return Ok(());
            }
            self.wire.delay_ms(POLL_INTERVAL_MS);
        }

        self.conversion_outcome()
    }

    /// Same as [`Ds18b20::wait_for_conversion`], but awaits `delay` between
    /// two polls instead of blocking.
    ///
    /// Every poll is still a blocking time slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the conversion does not end in time or if
    /// accessing the GPIO pin fails.
    #[cfg(feature = "async")]
    pub async fn wait_for_conversion_async<A: AsyncDelay>(
        &mut self,
        delay: &mut A,
    ) -> Result<(), Error<P::Error>> {
        for _ in 0..self.conversion_budget_ms() {
            if self.is_conversion_ready()? {
                return Ok(());
            }
            delay.delay_ms(POLL_INTERVAL_MS).await;
        }

        self.conversion_outcome()
    }

    /// Reads the temperature register from the sensor scratchpad.
    ///
    /// Run this method once the conversion is over. The stored register is
    /// only replaced when the whole read succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if no device responds on the bus or if communication
    /// with the sensor fails.
    pub fn read_temperature(&mut self) -> Result<(), Error<P::Error>> {
        self.fetch_temperature().map(|_| ())
    }

    /// Performs a full temperature measurement sequence:
    ///
    /// 1. Initiates a temperature conversion
    /// 2. Waits for the conversion to complete
    /// 3. Reads the temperature register
    /// 4. Returns the measured temperature in degrees Celsius (°C)
    ///
    /// # Notes
    ///
    /// After a power-on reset, the DS18B20’s temperature register is
    /// initialized to **85.0 °C**.
    /// Discard the first reading after a power-on reset if the conversion
    /// could not complete.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    ///
    /// - Communication with the sensor fails
    /// - No device responds on the bus
    /// - The conversion does not complete in time
    pub fn measure(&mut self) -> Result<f32, Error<P::Error>> {
        self.start_conversion()?;
        self.wait_for_conversion()?;

        self.fetch_temperature().map(RawTemperature::celsius)
    }

    /// Returns the last temperature read, in degrees Celsius (°C).
    ///
    /// Returns `None` until [`Ds18b20::read_temperature`] succeeds once.
    #[must_use]
    #[inline]
    pub fn temperature(&self) -> Option<f32> {
        self.raw.map(RawTemperature::celsius)
    }

    /// Returns the last temperature register read, unconverted.
    ///
    /// Returns `None` until [`Ds18b20::read_temperature`] succeeds once.
    #[must_use]
    #[inline]
    pub fn raw_temperature(&self) -> Option<RawTemperature> {
        self.raw
    }

    /// Returns the resolution set by the last successful
    /// [`Ds18b20::set_resolution`].
    #[must_use]
    #[inline]
    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    fn skip_rom(&mut self) -> Result<(), Error<P::Error>> {
        // Every transaction starts with a reset followed by the addressing.
        self.wire.reset().inspect_err(|e| match e {
            Error::NoPresence => warn!("DS18B20 not found: no presence pulse"),
            Error::LineHeldLow => warn!("DS18B20 bus held low after reset"),
            _ => {}
        })?;

        self.wire.write_byte(CMD_SKIP_ROM)
    }

    fn fetch_temperature(&mut self) -> Result<RawTemperature, Error<P::Error>> {
        self.skip_rom()?;
        self.wire.write_byte(CMD_READ_SCRATCHPAD)?;

        // The temperature register takes the first two scratchpad bytes.
        let mut bytes = [0u8; 2];
        self.wire.read_bytes(&mut bytes)?;

        let raw = RawTemperature::from_le_bytes(bytes);
        trace!("DS18B20 temperature register: {:#06x}", raw.value());

        self.raw = Some(raw);

        Ok(raw)
    }

    fn conversion_budget_ms(&self) -> u32 {
        self.resolution
            .unwrap_or(Resolution::Bits12)
            .max_conversion_time_ms()
    }

    fn conversion_outcome(&mut self) -> Result<(), Error<P::Error>> {
        if self.is_conversion_ready()? {
            return Ok(());
        }

        warn!(
            "DS18B20 conversion still running after {} ms",
            self.conversion_budget_ms()
        );

        Err(Error::ConversionTimeout)
    }
}
