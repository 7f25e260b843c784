//! Bus error types and BSC reason codes

use core::fmt;

/// Outcome of an addressed transfer, as the bcm2835 library reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ReasonCode {
    /// Success
    Ok = 0x00,
    /// Received a NACK
    Nack = 0x01,
    /// Received a clock stretch timeout
    ClockStretchTimeout = 0x02,
    /// Not all data was sent or received
    Data = 0x04,
    /// Gave up waiting on the controller
    Timeout = 0x08,
}

impl ReasonCode {
    /// Numeric code
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl<T> From<&Result<T, I2cError>> for ReasonCode {
    fn from(result: &Result<T, I2cError>) -> Self {
        match result {
            Ok(_) => ReasonCode::Ok,
            Err(e) => e.reason(),
        }
    }
}

/// Error from a BSC transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cError {
    /// Slave did not acknowledge (ERR status bit)
    Nack,
    /// Slave held SCL low past the CLKT limit
    ClockStretchTimeout,
    /// Transfer finished with bytes left over
    IncompleteData,
    /// A status bit never showed up before the deadline
    Timeout,
}

impl I2cError {
    /// Reason code matching this error
    pub const fn reason(self) -> ReasonCode {
        match self {
            I2cError::Nack => ReasonCode::Nack,
            I2cError::ClockStretchTimeout => ReasonCode::ClockStretchTimeout,
            I2cError::IncompleteData => ReasonCode::Data,
            I2cError::Timeout => ReasonCode::Timeout,
        }
    }
}

impl fmt::Display for I2cError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            I2cError::Nack => f.write_str("slave did not acknowledge"),
            I2cError::ClockStretchTimeout => f.write_str("clock stretch timeout"),
            I2cError::IncompleteData => f.write_str("not all data was transferred"),
            I2cError::Timeout => f.write_str("timed out waiting for the controller"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for I2cError {}

impl embedded_hal::i2c::Error for I2cError {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

        match self {
            I2cError::Nack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            I2cError::ClockStretchTimeout => ErrorKind::Bus,
            I2cError::IncompleteData => ErrorKind::Overrun,
            I2cError::Timeout => ErrorKind::Other,
        }
    }
}

/// Error from [`BscMaster::begin`](crate::i2c::BscMaster::begin)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BeginError {
    /// The control register read back as zero after reset, so the window
    /// is not backed by the peripheral
    Unmapped,
}

impl fmt::Display for BeginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeginError::Unmapped => {
                f.write_str("I2C registers not mapped correctly - are you root?")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BeginError {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_reason_codes_are_bit_flags() {
        assert_eq!(ReasonCode::Ok.code(), 0);
        assert_eq!(ReasonCode::Nack.code(), 1);
        assert_eq!(ReasonCode::ClockStretchTimeout.code(), 2);
        assert_eq!(ReasonCode::Data.code(), 4);
        assert_eq!(ReasonCode::Timeout.code(), 8);
    }

    #[test]
    fn test_reason_from_result() {
        let ok: Result<(), I2cError> = Ok(());
        assert_eq!(ReasonCode::from(&ok), ReasonCode::Ok);

        let timeout: Result<(), I2cError> = Err(I2cError::Timeout);
        assert_eq!(ReasonCode::from(&timeout), ReasonCode::Timeout);
        assert_eq!(I2cError::IncompleteData.reason(), ReasonCode::Data);
    }

    #[test]
    fn test_embedded_hal_kind() {
        use embedded_hal::i2c::{Error, ErrorKind, NoAcknowledgeSource};

        assert_eq!(
            I2cError::Nack.kind(),
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown)
        );
        assert_eq!(I2cError::Timeout.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_unmapped_message() {
        assert_eq!(
            BeginError::Unmapped.to_string(),
            "I2C registers not mapped correctly - are you root?"
        );
    }
}
