//! Values exchanged with the `DS18B20` scratchpad.

// Each bit in the temperature register corresponds to 0.0625 °C.
const TEMPERATURE_RESOLUTION_C_PER_LSB: f32 = 0.0625;

/// Conversion resolution of the `DS18B20`.
///
/// A higher resolution gives a finer reading at the cost of a longer
/// conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Resolution {
    /// 9 bits, 0.5 °C.
    Bits9,
    /// 10 bits, 0.25 °C.
    Bits10,
    /// 11 bits, 0.125 °C.
    Bits11,
    /// 12 bits, 0.0625 °C.
    Bits12,
}

impl Resolution {
    /// Returns the number of bits of the resolution.
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::Bits9 => 9,
            Self::Bits10 => 10,
            Self::Bits11 => 11,
            Self::Bits12 => 12,
        }
    }

    /// Returns the configuration register value selecting this resolution.
    #[must_use]
    pub const fn config_byte(self) -> u8 {
        (self.bits() - 9) << 5
    }

    /// Returns the worst-case conversion time in milliseconds, as given by
    /// the datasheet and rounded up.
    #[must_use]
    pub const fn max_conversion_time_ms(self) -> u32 {
        match self {
            Self::Bits9 => 94,
            Self::Bits10 => 188,
            Self::Bits11 => 375,
            Self::Bits12 => 750,
        }
    }
}

impl TryFrom<u8> for Resolution {
    type Error = u8;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            9 => Ok(Self::Bits9),
            10 => Ok(Self::Bits10),
            11 => Ok(Self::Bits11),
            12 => Ok(Self::Bits12),
            _ => Err(bits),
        }
    }
}

/// The raw temperature register of the `DS18B20`.
///
/// A signed two's-complement value where each unit is 1/16 °C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawTemperature(i16);

impl RawTemperature {
    /// Creates a [`RawTemperature`] from the register value.
    #[must_use]
    #[inline]
    pub const fn new(raw: i16) -> Self {
        Self(raw)
    }

    /// Creates a [`RawTemperature`] from the two scratchpad bytes, low
    /// byte first.
    #[must_use]
    #[inline]
    pub const fn from_le_bytes(bytes: [u8; 2]) -> Self {
        Self(i16::from_le_bytes(bytes))
    }

    /// Returns the register value.
    #[must_use]
    #[inline]
    pub const fn value(self) -> i16 {
        self.0
    }

    /// Returns the temperature in degrees Celsius (°C).
    #[must_use]
    pub fn celsius(self) -> f32 {
        f32::from(self.0) * TEMPERATURE_RESOLUTION_C_PER_LSB
    }
}
