/// Errors that may occur when driving the 1-Wire bus or the `DS18B20`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// Error related to GPIO pin I/O operations.
    Pin(E),
    /// The requested resolution is not one of 9, 10, 11 or 12 bits.
    InvalidResolution(u8),
    /// No presence pulse detected, sensor not found on bus.
    NoPresence,
    /// The line was still low once the reset window elapsed.
    LineHeldLow,
    /// The sensor did not finish its conversion in the expected time.
    ConversionTimeout,
}

impl<E> Error<E> {
    const fn description(&self) -> &'static str {
        match self {
            Self::Pin(_) => "GPIO pin failure",
            Self::InvalidResolution(_) => "Invalid resolution",
            Self::NoPresence => "No presence pulse",
            Self::LineHeldLow => "Line held low after reset",
            Self::ConversionTimeout => "Conversion timeout",
        }
    }

    /// Returns `true` if the error was raised by the bus rather than by the
    /// caller's arguments or the pin implementation.
    #[must_use]
    pub const fn is_bus_fault(&self) -> bool {
        matches!(self, Self::NoPresence | Self::LineHeldLow)
    }
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::Pin(e)
    }
}

impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Pin(e) => write!(f, "{}: {e:?}", self.description()),
            Self::InvalidResolution(bits) => {
                write!(f, "{}: {bits} bits, expected 9 to 12", self.description())
            }
            _ => f.write_str(self.description()),
        }
    }
}

impl<E: core::fmt::Debug> core::error::Error for Error<E> {}
