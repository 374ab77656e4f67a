//! # Bus Signal Primitives
//!
//! The 1-Wire line is open-drain: the master and the sensor can only pull it
//! low or let it go, and an external pull-up resistor brings it back high.
//!
//! [`BusPin`] exposes the four primitives the bus master needs on such a
//! line. [`OpenDrain`] implements them for any `embedded-hal` pin that is
//! both an [`InputPin`] and an [`OutputPin`], which is how HALs usually
//! expose a GPIO configured in open-drain mode.

use core::result::Result;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

/// The primitives needed to drive a single open-drain bus line.
///
/// The output latch and the pin direction are independent: writing the latch
/// while the pin is an input must not disturb the line, and switching the
/// direction to output drives the line to the latched level.
pub trait BusPin {
    /// Error type returned by the pin operations.
    type Error;

    /// Switches the pin to output, driving the line to the latched level.
    fn set_output(&mut self) -> Result<(), Self::Error>;

    /// Switches the pin to a high-impedance input, releasing the line.
    fn set_input(&mut self) -> Result<(), Self::Error>;

    /// Writes a low level into the output latch.
    fn set_low(&mut self) -> Result<(), Self::Error>;

    /// Samples the line, returning `true` when it is high.
    fn is_high(&mut self) -> Result<bool, Self::Error>;
}

impl<T: BusPin + ?Sized> BusPin for &mut T {
    type Error = T::Error;

    #[inline]
    fn set_output(&mut self) -> Result<(), Self::Error> {
        T::set_output(self)
    }

    #[inline]
    fn set_input(&mut self) -> Result<(), Self::Error> {
        T::set_input(self)
    }

    #[inline]
    fn set_low(&mut self) -> Result<(), Self::Error> {
        T::set_low(self)
    }

    #[inline]
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        T::is_high(self)
    }
}

/// A [`BusPin`] built on top of an `embedded-hal` open-drain pin.
///
/// On an open-drain pin `set_high` releases the line and `set_low` pulls it
/// down, so the direction is emulated. The bus master never latches a high
/// level, hence output mode always pulls the line low.
pub struct OpenDrain<P>
where
    P: InputPin + OutputPin,
{
    pin: P,
    output: bool,
}

impl<P> OpenDrain<P>
where
    P: InputPin + OutputPin,
{
    /// Wraps an open-drain pin.
    ///
    /// The pin starts as a released input with a low latch. No pin operation
    /// is performed until the bus master uses it.
    #[must_use]
    #[inline]
    pub fn new(pin: P) -> Self {
        Self { pin, output: false }
    }

    /// Returns the wrapped pin.
    #[must_use]
    #[inline]
    pub fn release(self) -> P {
        self.pin
    }
}

impl<P> BusPin for OpenDrain<P>
where
    P: InputPin + OutputPin,
{
    type Error = <P as ErrorType>::Error;

    fn set_output(&mut self) -> Result<(), Self::Error> {
        self.output = true;
        self.pin.set_low()
    }

    fn set_input(&mut self) -> Result<(), Self::Error> {
        self.output = false;
        self.pin.set_high()
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        // An input pin keeps the line released.
        if self.output {
            self.pin.set_low()
        } else {
            Ok(())
        }
    }

    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.pin.is_high()
    }
}
