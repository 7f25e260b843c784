//! Bus adapters
//!
//! Lets the drivers run on any `embedded-hal` 1.0 I2C master, for example
//! a Linux `i2c-dev` handle, instead of the register-level BSC master.

use embedded_hal::i2c::{I2c, SevenBitAddress};
use pisugar_hal::I2cBus;

/// [`I2cBus`] over an [`embedded_hal::i2c::I2c`] master
#[derive(Debug)]
pub struct EmbeddedHalBus<T> {
    inner: T,
}

impl<T> EmbeddedHalBus<T> {
    /// Wrap an `embedded-hal` master
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Unwrap the master
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: I2c<SevenBitAddress>> I2cBus for EmbeddedHalBus<T> {
    type Error = T::Error;

    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error> {
        self.inner.write(address, data)
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.inner.read(address, buf)
    }

    fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.inner.write_read(address, write_data, read_buf)
    }
}
