//! # 1-Wire Bus Master
//!
//! This module drives a 1-Wire bus entirely in software, using a single
//! open-drain line, busy-wait delays and interrupt masking.
//!
//! The timings follow the `DS18B20` datasheet:
//!
//! - A reset holds the line low for 480 µs, releases it and samples the
//!   presence pulse 64 µs later, then waits for the rest of the 480 µs
//!   presence window.
//! - A time slot lasts at least 60 µs. A 0 is written by holding the line low
//!   for the whole slot; a 1 is written, or a bit read, by releasing the line
//!   after 2 µs and sampling it within the first 15 µs.
//!
//! The presence sample and the body of every time slot run inside an
//! [`AtomicSection`], since an interrupt there would shift the sampling
//! instant out of its window.
//!
//! Bytes travel least-significant bit first.

use core::result::Result;

use embedded_hal::delay::DelayNs;

use crate::atomic::{AtomicSection, InterruptMask};
use crate::error::Error;
use crate::pin::BusPin;

// Timing for reset and presence detection.
const RESET_LOW_US: u32 = 480;
const PRESENCE_SAMPLE_US: u32 = 64;
const PRESENCE_RELEASE_US: u32 = RESET_LOW_US - PRESENCE_SAMPLE_US;

// Timing for a time slot (start, read sample, write 0, recovery).
const SLOT_START_LOW_US: u32 = 2;
const READ_SAMPLE_US: u32 = 10;
const READ_REMAINDER_US: u32 = 50;
const WRITE_0_LOW_US: u32 = 60;
const SLOT_RECOVERY_US: u32 = 2;

/// A software 1-Wire bus master.
///
/// The output latch of the pin is only ever written low, so switching the pin
/// to output always pulls the line down.
pub struct OneWire<P, D, M>
where
    P: BusPin,
    D: DelayNs,
    M: InterruptMask,
{
    pin: P,
    delay: D,
    mask: M,
}

impl<P, D, M> OneWire<P, D, M>
where
    P: BusPin,
    D: DelayNs,
    M: InterruptMask,
{
    /// Creates a [`OneWire`] bus master for the given pin, delay provider and
    /// interrupt mask.
    #[must_use]
    #[inline]
    pub fn new(pin: P, delay: D, mask: M) -> Self {
        Self { pin, delay, mask }
    }

    /// Consumes the bus master, returning its pin, delay and mask.
    #[inline]
    pub fn release(self) -> (P, D, M) {
        (self.pin, self.delay, self.mask)
    }

    /// Puts the line in its idle state: released, with a low output latch.
    ///
    /// # Errors
    ///
    /// Returns an error if accessing the GPIO pin fails.
    pub fn idle(&mut self) -> Result<(), Error<P::Error>> {
        self.pin.set_input()?;
        self.pin.set_low()?;

        Ok(())
    }

    /// Performs a bus reset and checks for the presence pulse of a device.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    ///
    /// - No device pulls the line low at the presence sampling instant
    /// - The line is still low once the presence window has elapsed
    /// - Accessing the GPIO pin fails
    pub fn reset(&mut self) -> Result<(), Error<P::Error>> {
        self.pin.set_low()?;
        self.pin.set_output()?;
        self.delay.delay_us(RESET_LOW_US);

        let present = {
            let _section = AtomicSection::enter(&mut self.mask);

            self.pin.set_input()?;
            self.delay.delay_us(PRESENCE_SAMPLE_US);

            // A device answers by pulling the line low.
            !self.pin.is_high()?
        };

        self.delay.delay_us(PRESENCE_RELEASE_US);
        let idle = self.pin.is_high()?;

        if !present {
            return Err(Error::NoPresence);
        }
        if !idle {
            return Err(Error::LineHeldLow);
        }

        Ok(())
    }

    /// Runs a single time slot.
    ///
    /// Writing `false` holds the line low for the whole slot and returns
    /// `false`. Writing `true` only starts the slot, then samples the line:
    /// the returned bit is what the device left on the bus, which makes this
    /// the read slot as well.
    ///
    /// # Errors
    ///
    /// Returns an error if accessing the GPIO pin fails.
    pub fn io_slot(&mut self, bit: bool) -> Result<bool, Error<P::Error>> {
        let bit = {
            let _section = AtomicSection::enter(&mut self.mask);

            self.pin.set_output()?;
            self.delay.delay_us(SLOT_START_LOW_US);

            if bit {
                self.pin.set_input()?;
                self.delay.delay_us(READ_SAMPLE_US);
                let sampled = self.pin.is_high()?;
                self.delay.delay_us(READ_REMAINDER_US);
                sampled
            } else {
                self.delay.delay_us(WRITE_0_LOW_US);
                self.pin.set_input()?;
                false
            }
        };

        self.delay.delay_us(SLOT_RECOVERY_US);

        Ok(bit)
    }

    /// Writes a single bit.
    ///
    /// # Errors
    ///
    /// Returns an error if accessing the GPIO pin fails.
    #[inline]
    pub fn write_bit(&mut self, bit: bool) -> Result<(), Error<P::Error>> {
        self.io_slot(bit).map(|_| ())
    }

    /// Reads a single bit.
    ///
    /// # Errors
    ///
    /// Returns an error if accessing the GPIO pin fails.
    #[inline]
    pub fn read_bit(&mut self) -> Result<bool, Error<P::Error>> {
        self.io_slot(true)
    }

    /// Writes a full byte, least-significant bit first.
    ///
    /// # Errors
    ///
    /// Returns an error if accessing the GPIO pin fails.
    pub fn write_byte(&mut self, byte: u8) -> Result<(), Error<P::Error>> {
        for i in 0..8 {
            self.write_bit((byte >> i) & 1 != 0)?;
        }

        Ok(())
    }

    /// Reads a full byte, least-significant bit first.
    ///
    /// # Errors
    ///
    /// Returns an error if accessing the GPIO pin fails.
    pub fn read_byte(&mut self) -> Result<u8, Error<P::Error>> {
        let mut byte = 0;

        for i in 0..8 {
            if self.read_bit()? {
                byte |= 1 << i;
            }
        }

        Ok(byte)
    }

    /// Writes every byte of `bytes` in order.
    ///
    /// # Errors
    ///
    /// Returns an error if accessing the GPIO pin fails.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error<P::Error>> {
        for &byte in bytes {
            self.write_byte(byte)?;
        }

        Ok(())
    }

    /// Fills `bytes` with bytes read from the bus.
    ///
    /// # Errors
    ///
    /// Returns an error if accessing the GPIO pin fails.
    pub fn read_bytes(&mut self, bytes: &mut [u8]) -> Result<(), Error<P::Error>> {
        for byte in bytes {
            *byte = self.read_byte()?;
        }

        Ok(())
    }

    pub(crate) fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}
