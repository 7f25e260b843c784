//! BSC master engine
//!
//! Drives the Broadcom Serial Controller through its registers. Two kinds
//! of transfer are offered:
//!
//! - [`BscMaster::exchange`] and its wrappers [`BscMaster::transmit`] /
//!   [`BscMaster::receive`]: a raw, byte-synchronous full-duplex exchange
//!   through the data FIFO. Each byte is written, then its reply is read
//!   back into the same buffer slot before the next byte is queued.
//! - [`BscMaster::write`], [`BscMaster::read`] and
//!   [`BscMaster::write_read`]: addressed transfers following the BSC
//!   datasheet sequence (slave address, data length, start).
//!
//! Every status poll is bounded by a [`Deadline`]. Running out of time is
//! reported as [`I2cError::Timeout`] instead of spinning forever on a stuck
//! or missing slave.
//!
//! The master is single-threaded by construction: it owns its register
//! window and every operation takes `&mut self`.

use alloc::vec;
use alloc::vec::Vec;

use pisugar_hal::gpio::{PinMode, PinModeControl};
use pisugar_hal::i2c::{I2cBus, I2cConfig};

use crate::clock::{byte_wait_micros, divider_for, mask_divider, CoreClock};
use crate::error::{BeginError, I2cError, ReasonCode};
use crate::pins::BusId;
use crate::regs::{
    chip_select_polarity_bit, ControlBit, Register, StatusBit, CHIP_SELECT_MASK, CLEAR_FIFO,
    CLOCK_PHASE, CLOCK_POLARITY, DIVIDER_MASK, FIFO_SIZE,
};
use crate::window::RegisterWindow;

/// Polls allowed per wait when no other deadline is configured
pub const DEFAULT_SPIN_LIMIT: u32 = 1_000_000;

/// Bound on a single status-bit wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Deadline {
    /// Give up after this many unsuccessful polls
    Spins(u32),
    /// Give up once this much wall-clock time has passed
    #[cfg(feature = "std")]
    Elapsed(core::time::Duration),
}

impl Default for Deadline {
    fn default() -> Self {
        Deadline::Spins(DEFAULT_SPIN_LIMIT)
    }
}

/// Running budget of one wait
enum Countdown {
    Spins(u32),
    #[cfg(feature = "std")]
    Until(std::time::Instant),
}

impl Countdown {
    fn start(deadline: Deadline) -> Self {
        match deadline {
            Deadline::Spins(n) => Countdown::Spins(n),
            #[cfg(feature = "std")]
            Deadline::Elapsed(d) => Countdown::Until(std::time::Instant::now() + d),
        }
    }

    /// Consume one poll; true once the budget is gone
    fn expired(&mut self) -> bool {
        match self {
            Countdown::Spins(left) => {
                if *left == 0 {
                    true
                } else {
                    *left -= 1;
                    false
                }
            }
            #[cfg(feature = "std")]
            Countdown::Until(at) => std::time::Instant::now() >= *at,
        }
    }
}

/// Clock idle level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockPolarity {
    /// Clock rests low
    #[default]
    IdleLow,
    /// Clock rests high
    IdleHigh,
}

impl From<u8> for ClockPolarity {
    fn from(value: u8) -> Self {
        if value == 0 {
            ClockPolarity::IdleLow
        } else {
            ClockPolarity::IdleHigh
        }
    }
}

/// Clock edge data is sampled on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockPhase {
    /// First clock transition in the middle of the data bit
    #[default]
    MiddleOfBit,
    /// First clock transition at the beginning of the data bit
    StartOfBit,
}

impl From<u8> for ClockPhase {
    fn from(value: u8) -> Self {
        if value == 0 {
            ClockPhase::MiddleOfBit
        } else {
            ClockPhase::StartOfBit
        }
    }
}

/// Active level of a chip select line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipSelectPolarity {
    /// Chip select is active low
    #[default]
    ActiveLow,
    /// Chip select is active high
    ActiveHigh,
}

impl From<u8> for ChipSelectPolarity {
    fn from(value: u8) -> Self {
        if value == 0 {
            ChipSelectPolarity::ActiveLow
        } else {
            ChipSelectPolarity::ActiveHigh
        }
    }
}

/// BSC master configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BscConfig {
    /// Core clock the divider is applied to
    pub core_clock: CoreClock,
    /// Bus speed programmed by [`BscMaster::begin`]
    pub default_speed_hz: u32,
    /// Bound on every status wait
    pub deadline: Deadline,
}

impl Default for BscConfig {
    fn default() -> Self {
        Self {
            core_clock: CoreClock::default(),
            default_speed_hz: I2cConfig::STANDARD.frequency,
            deadline: Deadline::default(),
        }
    }
}

impl BscConfig {
    /// Default configuration with the core clock probed from the running SoC
    #[cfg(feature = "std")]
    pub fn probe() -> Self {
        Self {
            core_clock: CoreClock::probe(),
            ..Self::default()
        }
    }

    /// Use a different core clock
    pub const fn with_core_clock(mut self, core_clock: CoreClock) -> Self {
        self.core_clock = core_clock;
        self
    }

    /// Use a different bus speed at begin
    pub const fn with_speed(mut self, speed_hz: u32) -> Self {
        self.default_speed_hz = speed_hz;
        self
    }

    /// Use a different wait bound
    pub const fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }
}

/// BSC (I2C) master
///
/// Owns the BSC register window and the pin binding used to route the bus
/// to its GPIOs. Only one master should exist per controller.
pub struct BscMaster<W, P> {
    window: W,
    pins: P,
    config: BscConfig,
    byte_wait_us: u64,
}

impl<W: RegisterWindow, P: PinModeControl> BscMaster<W, P> {
    /// Create a master over an already-mapped BSC register block
    ///
    /// Nothing is written until [`begin`](Self::begin).
    pub fn new(window: W, pins: P, config: BscConfig) -> Self {
        Self {
            window,
            pins,
            config,
            byte_wait_us: 0,
        }
    }

    /// Give back the register window and the pin binding
    pub fn release(self) -> (W, P) {
        (self.window, self.pins)
    }

    /// Register window, for inspection
    pub fn window_mut(&mut self) -> &mut W {
        &mut self.window
    }

    /// Pin binding, for inspection
    pub fn pins(&self) -> &P {
        &self.pins
    }

    /// Active configuration
    pub fn config(&self) -> &BscConfig {
        &self.config
    }

    /// Reset the controller and route `bus` to its pins
    ///
    /// The control register is cleared and read back. A read-back of zero
    /// means the window is not backed by the peripheral (typically a failed
    /// mapping or missing privileges) and nothing else is touched.
    ///
    /// On success the bus pins are switched to their I2C function and the
    /// default speed is programmed. Controllers without pins (see
    /// [`BusId::pins`]) are configured without touching any GPIO.
    pub fn begin(&mut self, bus: BusId) -> Result<(), BeginError> {
        self.write_reg(Register::Control, 0);
        if self.read_reg(Register::Control) == 0 {
            error!("I2C registers not mapped correctly - are you root?");
            return Err(BeginError::Unmapped);
        }

        if !bus.is_wired() {
            debug!("{:?}: no pins to route", bus);
        }
        self.pins.set_pins_mode(bus.pins(), PinMode::I2c);

        let divider = self.read_reg(Register::ClockDivider);
        self.byte_wait_us = byte_wait_micros(divider, self.config.core_clock.hz());
        info!(
            "{:?}: microseconds wait per byte: {}",
            bus,
            self.byte_wait_us
        );

        self.set_speed(self.config.default_speed_hz);
        Ok(())
    }

    /// Return `bus` pins to plain inputs
    ///
    /// The control register is left as it is. Calling this repeatedly is
    /// harmless.
    pub fn end(&mut self, bus: BusId) {
        self.pins.set_pins_mode(bus.pins(), PinMode::Input);
        debug!("{:?}: pins released", bus);
    }

    /// Bus time per byte implied by the divider found at begin
    ///
    /// Diagnostic only; transfers are paced by the status bits.
    pub fn byte_wait_micros(&self) -> u64 {
        self.byte_wait_us
    }

    /// Set the (maximum) bus clock in Hz
    ///
    /// The divider is `core clock / speed_hz`, rounded down to an even
    /// value. Speeds above 31.25 MHz are representable but unreliable.
    pub fn set_speed(&mut self, speed_hz: u32) {
        if !(I2cConfig { frequency: speed_hz }).is_reliable() {
            warn!("I2C speed {} Hz is outside the reliable range", speed_hz);
        }
        self.set_divider(divider_for(self.config.core_clock.hz(), speed_hz));
    }

    /// Program the clock divider
    ///
    /// The register keeps 16 bits and the low bit is always cleared.
    /// Dividers past [`DIVIDER_MASK`] wrap to a faster clock.
    pub fn set_divider(&mut self, divider: u32) {
        if divider > DIVIDER_MASK {
            warn!("clock divider {} does not fit in 16 bits", divider);
        }
        let masked = mask_divider(divider);
        self.write_reg(Register::ClockDivider, masked);
        debug!("clock divider {} (requested {})", masked, divider);
    }

    /// Currently programmed clock divider
    pub fn divider(&mut self) -> u32 {
        self.read_reg(Register::ClockDivider)
    }

    /// Select chip select line 0, 1 or 2
    ///
    /// Only the two-bit field changes; larger values wrap into it.
    pub fn chip_select(&mut self, chip: u8) {
        let control = self.read_reg(Register::Control);
        let cs = chip as u32 & CHIP_SELECT_MASK;
        self.write_reg(Register::Control, (control & !CHIP_SELECT_MASK) | cs);
    }

    /// Set the active level of chip select line `chip`
    ///
    /// Chips past 2 have no polarity bit; the call then leaves the
    /// controller untouched.
    pub fn chip_select_polarity(&mut self, chip: u8, polarity: ChipSelectPolarity) {
        let Some(bit) = chip_select_polarity_bit(chip) else {
            warn!("no chip select polarity bit for chip {}", chip);
            return;
        };
        match polarity {
            ChipSelectPolarity::ActiveLow => self.clear_control(bit),
            ChipSelectPolarity::ActiveHigh => self.set_control(bit),
        }
    }

    /// Set clock polarity and phase
    pub fn mode(&mut self, polarity: ClockPolarity, phase: ClockPhase) {
        match polarity {
            ClockPolarity::IdleLow => self.clear_control(CLOCK_POLARITY),
            ClockPolarity::IdleHigh => self.set_control(CLOCK_POLARITY),
        }
        match phase {
            ClockPhase::MiddleOfBit => self.clear_control(CLOCK_PHASE),
            ClockPhase::StartOfBit => self.set_control(CLOCK_PHASE),
        }
    }

    /// Flush both FIFOs
    ///
    /// The hardware drops the clear bits again once the flush is done.
    pub fn clear_fifo(&mut self) {
        self.set_control(CLEAR_FIFO);
    }

    /// Raw status register
    pub fn status(&mut self) -> u32 {
        self.read_reg(Register::Status)
    }

    /// Exchange `data` with the slave, in place
    ///
    /// Every byte is sent and replaced by the byte received for it. Bounded
    /// by the configured deadline.
    pub fn exchange(&mut self, data: &mut [u8]) -> Result<(), I2cError> {
        self.exchange_within(data, self.config.deadline)
    }

    /// [`exchange`](Self::exchange) with an explicit bound on every wait
    pub fn exchange_within(&mut self, data: &mut [u8], deadline: Deadline) -> Result<(), I2cError> {
        self.clear_fifo();
        self.set_control(ControlBit::StartTransfer.mask());

        let result = self.exchange_bytes(data, deadline);

        self.clear_control(ControlBit::StartTransfer.mask());
        result
    }

    fn exchange_bytes(&mut self, data: &mut [u8], deadline: Deadline) -> Result<(), I2cError> {
        for byte in data.iter_mut() {
            self.wait_for(StatusBit::TxAcceptsData, deadline)?;
            self.write_reg(Register::Fifo, *byte as u32);

            self.wait_for(StatusBit::RxContainsData, deadline)?;
            *byte = self.read_reg(Register::Fifo) as u8;
        }

        self.wait_for(StatusBit::TransferDone, deadline)?;
        self.take_errors()
    }

    /// Send `data` to the slave, discarding what comes back
    ///
    /// `data` itself is left untouched.
    pub fn transmit(&mut self, data: &[u8]) -> Result<(), I2cError> {
        let mut scratch = data.to_vec();
        self.exchange(&mut scratch)
    }

    /// Receive `len` bytes from the slave
    ///
    /// The exchange clocks out `len` zero bytes while receiving; slaves that
    /// act on writes will see them.
    pub fn receive(&mut self, len: usize) -> Result<Vec<u8>, I2cError> {
        let mut data = vec![0u8; len];
        self.exchange(&mut data)?;
        Ok(data)
    }

    /// Addressed write of `data` to `address`
    pub fn write(&mut self, address: u8, data: &[u8]) -> Result<(), I2cError> {
        let deadline = self.config.deadline;
        self.prepare(address, data.len());
        let mut sent = self.prefill(data);
        self.write_reg(
            Register::Control,
            ControlBit::I2cEnable.mask() | ControlBit::StartTransfer.mask(),
        );

        let mut countdown = Countdown::start(deadline);
        loop {
            let status = self.status();
            if status & StatusBit::TransferDone.mask() != 0 {
                break;
            }
            if sent < data.len() && status & StatusBit::TxAcceptsData.mask() != 0 {
                self.write_reg(Register::Fifo, data[sent] as u32);
                sent += 1;
                continue;
            }
            if countdown.expired() {
                return Err(self.abort(address, StatusBit::TransferDone));
            }
        }

        self.finish(address, data.len() - sent)
    }

    /// Addressed read of `buf.len()` bytes from `address`
    pub fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), I2cError> {
        self.prepare(address, buf.len());
        self.write_reg(
            Register::Control,
            ControlBit::I2cEnable.mask()
                | ControlBit::StartTransfer.mask()
                | ControlBit::Read.mask(),
        );
        self.drain(address, buf)
    }

    /// Write `data` then read `buf.len()` bytes with a repeated start
    ///
    /// The repeated start needs the whole write phase queued up front, so
    /// writes longer than the FIFO fall back to a separate write and read.
    pub fn write_read(&mut self, address: u8, data: &[u8], buf: &mut [u8]) -> Result<(), I2cError> {
        if data.len() > FIFO_SIZE {
            self.write(address, data)?;
            return self.read(address, buf);
        }

        self.prepare(address, data.len());
        self.prefill(data);
        self.write_reg(
            Register::Control,
            ControlBit::I2cEnable.mask() | ControlBit::StartTransfer.mask(),
        );

        // The read is queued once the write phase is active. If the write
        // already ended, its DONE stays latched and must be cleared first or
        // the read would stop on it before any data arrives.
        let mut countdown = Countdown::start(self.config.deadline);
        let started = StatusBit::TransferActive.mask() | StatusBit::TransferDone.mask();
        let status = loop {
            let status = self.status();
            if status & started != 0 {
                break status;
            }
            if countdown.expired() {
                return Err(self.abort(address, StatusBit::TransferActive));
            }
        };
        if status & StatusBit::TransferDone.mask() != 0 {
            if let Err(e) = self.take_errors() {
                self.clear_control(ControlBit::I2cEnable.mask() | ControlBit::Read.mask());
                warn!("I2C write phase to {:#x} failed: {}", address, e);
                return Err(e);
            }
        }

        self.write_reg(Register::DataLength, buf.len() as u32);
        self.write_reg(
            Register::Control,
            ControlBit::I2cEnable.mask()
                | ControlBit::StartTransfer.mask()
                | ControlBit::Read.mask(),
        );
        self.drain(address, buf)
    }

    /// Address the slave, flush, clear stale status and set the length
    fn prepare(&mut self, address: u8, len: usize) {
        self.write_reg(Register::SlaveAddress, address as u32);
        self.clear_fifo();
        self.write_reg(Register::Status, StatusBit::WRITE_TO_CLEAR);
        self.write_reg(Register::DataLength, len as u32);
    }

    /// Queue as much of `data` as the FIFO holds; returns the count queued
    fn prefill(&mut self, data: &[u8]) -> usize {
        let queued = data.len().min(FIFO_SIZE);
        for &byte in &data[..queued] {
            self.write_reg(Register::Fifo, byte as u32);
        }
        queued
    }

    /// Collect the bytes of a started read until DONE, then empty the FIFO
    fn drain(&mut self, address: u8, buf: &mut [u8]) -> Result<(), I2cError> {
        let mut received = 0;
        let mut countdown = Countdown::start(self.config.deadline);
        loop {
            let status = self.status();
            if received < buf.len() && status & StatusBit::RxContainsData.mask() != 0 {
                buf[received] = self.read_reg(Register::Fifo) as u8;
                received += 1;
                continue;
            }
            if status & StatusBit::TransferDone.mask() != 0 {
                break;
            }
            if countdown.expired() {
                return Err(self.abort(address, StatusBit::TransferDone));
            }
        }

        while received < buf.len() && self.status() & StatusBit::RxContainsData.mask() != 0 {
            buf[received] = self.read_reg(Register::Fifo) as u8;
            received += 1;
        }

        self.finish(address, buf.len() - received)
    }

    /// Turn the end-of-transfer status into a result
    fn finish(&mut self, address: u8, remaining: usize) -> Result<(), I2cError> {
        let result = self.take_errors().and_then(|()| {
            if remaining > 0 {
                Err(I2cError::IncompleteData)
            } else {
                Ok(())
            }
        });
        self.clear_control(ControlBit::I2cEnable.mask() | ControlBit::Read.mask());

        trace!(
            "I2C transfer to {:#x}: reason {:#x}",
            address,
            ReasonCode::from(&result).code()
        );
        if let Err(e) = result {
            warn!("I2C transfer to {:#x} failed: {}", address, e);
        }
        result
    }

    /// Stop a stuck addressed transfer and flush what it left behind
    fn abort(&mut self, address: u8, waiting_for: StatusBit) -> I2cError {
        warn!(
            "I2C transfer to {:#x} timed out waiting for {:?}",
            address,
            waiting_for
        );
        self.clear_control(
            ControlBit::I2cEnable.mask()
                | ControlBit::StartTransfer.mask()
                | ControlBit::Read.mask(),
        );
        self.clear_fifo();
        self.write_reg(Register::Status, StatusBit::WRITE_TO_CLEAR);
        I2cError::Timeout
    }

    /// Read and clear the error bits left by the last transfer
    fn take_errors(&mut self) -> Result<(), I2cError> {
        let status = self.status();
        let latched = status & StatusBit::WRITE_TO_CLEAR;
        if latched != 0 {
            self.write_reg(Register::Status, latched);
        }

        if status & StatusBit::Error.mask() != 0 {
            Err(I2cError::Nack)
        } else if status & StatusBit::ClockStretchTimeout.mask() != 0 {
            Err(I2cError::ClockStretchTimeout)
        } else {
            Ok(())
        }
    }

    /// Spin until `bit` is set in the status register
    fn wait_for(&mut self, bit: StatusBit, deadline: Deadline) -> Result<(), I2cError> {
        let mut countdown = Countdown::start(deadline);
        while self.status() & bit.mask() == 0 {
            if countdown.expired() {
                warn!("timed out waiting for {:?}", bit);
                return Err(I2cError::Timeout);
            }
        }
        Ok(())
    }

    fn read_reg(&mut self, register: Register) -> u32 {
        self.window.read(register.offset())
    }

    fn write_reg(&mut self, register: Register, value: u32) {
        self.window.write(register.offset(), value)
    }

    fn set_control(&mut self, mask: u32) {
        self.window.set_bits(Register::Control.offset(), mask)
    }

    fn clear_control(&mut self, mask: u32) {
        self.window.clear_bits(Register::Control.offset(), mask)
    }
}

impl<W: RegisterWindow, P: PinModeControl> I2cBus for BscMaster<W, P> {
    type Error = I2cError;

    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error> {
        BscMaster::write(self, address, data)
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        BscMaster::read(self, address, buf)
    }

    fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), Self::Error> {
        BscMaster::write_read(self, address, write_data, read_buf)
    }
}

impl<W: RegisterWindow, P: PinModeControl> embedded_hal::i2c::ErrorType for BscMaster<W, P> {
    type Error = I2cError;
}

impl<W: RegisterWindow, P: PinModeControl> embedded_hal::i2c::I2c for BscMaster<W, P> {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [embedded_hal::i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        use embedded_hal::i2c::Operation;

        // Each operation is its own BSC transfer (STOP in between).
        for operation in operations {
            match operation {
                Operation::Write(data) => BscMaster::write(self, address, data)?,
                Operation::Read(buf) => BscMaster::read(self, address, buf)?,
            }
        }
        Ok(())
    }

    fn write_read(&mut self, address: u8, write: &[u8], read: &mut [u8]) -> Result<(), Self::Error> {
        BscMaster::write_read(self, address, write, read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::MAX_CHIP;
    use crate::sim::{Access, SimPins, SimWindow};
    use proptest::prelude::*;

    fn master() -> BscMaster<SimWindow, SimPins> {
        let mut master = BscMaster::new(SimWindow::new(), SimPins::default(), BscConfig::default());
        master.begin(BusId::I2c1).unwrap();
        master.window_mut().clear_log();
        master
    }

    fn control(master: &mut BscMaster<SimWindow, SimPins>) -> u32 {
        master.window_mut().peek(Register::Control)
    }

    /// A control value as the register can hold it at rest: self-clearing
    /// bits dropped, power-on bits present
    fn settled(value: u32) -> u32 {
        (value & !(CLEAR_FIFO | ControlBit::StartTransfer.mask())) | SimWindow::POWER_ON_CONTROL
    }

    #[test]
    fn test_begin_rejects_dead_window() {
        let mut master = BscMaster::new(SimWindow::unmapped(), SimPins::default(), BscConfig::default());
        assert_eq!(master.begin(BusId::I2c1), Err(BeginError::Unmapped));
        // Nothing past the probe happened
        assert!(master.pins().calls().is_empty());
    }

    #[test]
    fn test_begin_routes_pins_and_sets_standard_speed() {
        let mut master = BscMaster::new(SimWindow::new(), SimPins::default(), BscConfig::default());
        master.begin(BusId::I2c1).unwrap();

        assert_eq!(master.pins().mode(2), Some(PinMode::I2c));
        assert_eq!(master.pins().mode(3), Some(PinMode::I2c));
        assert_eq!(master.divider(), 2500);
    }

    #[test]
    fn test_begin_on_bcm2711_scales_divider() {
        let config = BscConfig::default().with_core_clock(CoreClock::Bcm2711);
        let mut master = BscMaster::new(SimWindow::new(), SimPins::default(), config);
        master.begin(BusId::I2c1).unwrap();
        assert_eq!(master.divider(), 5500);
    }

    #[test]
    fn test_begin_reports_byte_wait_from_current_divider() {
        let mut window = SimWindow::new();
        window.poke(Register::ClockDivider, 1500);
        let mut master = BscMaster::new(window, SimPins::default(), BscConfig::default());
        master.begin(BusId::I2c1).unwrap();
        // 1500 / 250 MHz * 9 bits = 54 us
        assert_eq!(master.byte_wait_micros(), 54);
    }

    #[test]
    fn test_unwired_bus_configures_no_pins() {
        let mut master = BscMaster::new(SimWindow::new(), SimPins::default(), BscConfig::default());
        master.begin(BusId::I2c0).unwrap();
        master.end(BusId::I2c2);
        assert!(master.pins().calls().is_empty());
        assert_eq!(master.divider(), 2500);
    }

    #[test]
    fn test_end_returns_pins_to_input_and_is_idempotent() {
        let mut master = master();
        master.set_control(CLOCK_POLARITY);
        let before = control(&mut master);

        master.end(BusId::I2c1);
        master.end(BusId::I2c1);

        assert_eq!(master.pins().mode(2), Some(PinMode::Input));
        assert_eq!(master.pins().mode(3), Some(PinMode::Input));
        assert_eq!(control(&mut master), before);
    }

    #[test]
    fn test_set_speed() {
        let mut master = master();
        master.set_speed(400_000);
        assert_eq!(master.divider(), 624);
        master.set_speed(1_000_000);
        assert_eq!(master.divider(), 250);
    }

    #[test]
    fn test_too_slow_speed_wraps_divider() {
        let mut master = master();
        // 250 MHz / 1 Hz needs far more than 16 bits
        assert!(divider_for(CoreClock::Bcm283x.hz(), 1) > DIVIDER_MASK);
        master.set_speed(1);
        assert_eq!(master.divider(), 250_000_000 & DIVIDER_MASK);

        // Slowest speed that still fits
        master.set_speed(3815);
        assert_eq!(master.divider(), 65530);
        // Zero asks for the slowest divider outright
        master.set_speed(0);
        assert_eq!(master.divider(), DIVIDER_MASK);
    }

    #[test]
    fn test_chip_select_wraps_into_two_bits() {
        let mut master = master();
        master.chip_select(2);
        assert_eq!(control(&mut master) & CHIP_SELECT_MASK, 2);
        master.chip_select(5);
        assert_eq!(control(&mut master) & CHIP_SELECT_MASK, 1);
    }

    #[test]
    fn test_chip_select_keeps_other_bits() {
        let mut master = master();
        master.mode(ClockPolarity::IdleHigh, ClockPhase::StartOfBit);
        let others = control(&mut master) & !CHIP_SELECT_MASK;
        master.chip_select(3);
        assert_eq!(control(&mut master) & !CHIP_SELECT_MASK, others);
    }

    #[test]
    fn test_mode_round_trip() {
        let mut master = master();
        let bits = CLOCK_POLARITY | CLOCK_PHASE;

        master.mode(0u8.into(), 0u8.into());
        assert_eq!(control(&mut master) & bits, 0);

        master.mode(1u8.into(), 1u8.into());
        assert_eq!(control(&mut master) & bits, bits);

        master.mode(ClockPolarity::IdleLow, ClockPhase::StartOfBit);
        assert_eq!(control(&mut master) & bits, CLOCK_PHASE);
    }

    #[test]
    fn test_clear_fifo_bits_self_clear() {
        let mut master = master();
        master.clear_fifo();
        assert_eq!(control(&mut master) & CLEAR_FIFO, 0);
        assert_eq!(master.window_mut().fifo_clears(), 1);
    }

    #[test]
    fn test_exchange_empty_buffer_skips_fifo() {
        let mut master = master();
        master.exchange(&mut []).unwrap();

        let log = master.window_mut().log().to_vec();
        assert!(log.iter().all(|a| a.register() != Register::Fifo));
        assert_eq!(master.window_mut().fifo_clears(), 1);
        // transfer-active went up and came back down
        let start = ControlBit::StartTransfer.mask();
        let writes: Vec<u32> = log
            .iter()
            .filter_map(|a| match a {
                Access::Write(Register::Control, v) => Some(*v),
                _ => None,
            })
            .collect();
        assert!(writes.iter().any(|v| v & start != 0));
        assert_eq!(writes.last().map(|v| v & start), Some(0));
    }

    #[test]
    fn test_exchange_full_fifo_alternates_write_and_read() {
        let mut master = master();
        let mut data: Vec<u8> = (0..FIFO_SIZE as u8).collect();
        master.window_mut().queue_replies(&[0xa5; FIFO_SIZE]);

        master.exchange(&mut data).unwrap();

        assert_eq!(data, [0xa5; FIFO_SIZE]);
        let fifo: Vec<Access> = master
            .window_mut()
            .log()
            .iter()
            .copied()
            .filter(|a| a.register() == Register::Fifo)
            .collect();
        assert_eq!(fifo.len(), 2 * FIFO_SIZE);
        for (i, pair) in fifo.chunks(2).enumerate() {
            assert_eq!(pair[0], Access::Write(Register::Fifo, i as u32));
            assert_eq!(pair[1], Access::Read(Register::Fifo, 0xa5));
        }
    }

    #[test]
    fn test_exchange_waits_for_tx_before_each_write() {
        let mut master = master();
        let mut data = [1u8, 2, 3];
        master.exchange(&mut data).unwrap();

        let log = master.window_mut().log().to_vec();
        let mut last_status = None;
        for access in &log {
            match access {
                Access::Read(Register::Status, v) => last_status = Some(*v),
                Access::Write(Register::Fifo, _) => {
                    let status = last_status.take().unwrap();
                    assert_ne!(status & StatusBit::TxAcceptsData.mask(), 0);
                }
                Access::Read(Register::Fifo, _) => {
                    let status = last_status.take().unwrap();
                    assert_ne!(status & StatusBit::RxContainsData.mask(), 0);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_exchange_times_out_on_stalled_fifo() {
        let mut master = master();
        master.window_mut().stall_tx(true);
        let mut data = [0x10u8, 0x20];

        let result = master.exchange_within(&mut data, Deadline::Spins(50));

        assert_eq!(result, Err(I2cError::Timeout));
        assert_eq!(control(&mut master) & ControlBit::StartTransfer.mask(), 0);
        assert_eq!(data, [0x10, 0x20]);
    }

    #[test]
    fn test_exchange_times_out_when_done_never_comes() {
        let mut master = master();
        master.window_mut().stall_done(true);
        let result = master.exchange_within(&mut [0u8; 2], Deadline::Spins(10));
        assert_eq!(result, Err(I2cError::Timeout));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_exchange_wall_clock_deadline() {
        let mut master = master();
        master.window_mut().stall_tx(true);
        let deadline = Deadline::Elapsed(core::time::Duration::from_millis(5));
        assert_eq!(master.exchange_within(&mut [0u8], deadline), Err(I2cError::Timeout));
    }

    #[test]
    fn test_exchange_reports_and_clears_error_bits() {
        let mut master = master();
        master.window_mut().force_nack(true);
        assert_eq!(master.exchange(&mut [1u8]), Err(I2cError::Nack));

        master.window_mut().force_nack(false);
        master.window_mut().force_clock_stretch_timeout(true);
        assert_eq!(master.exchange(&mut [1u8]), Err(I2cError::ClockStretchTimeout));

        master.window_mut().force_clock_stretch_timeout(false);
        assert_eq!(master.exchange(&mut [1u8]), Ok(()));
    }

    #[test]
    fn test_transmit_leaves_caller_data_alone() {
        let mut master = master();
        let data = [0xde, 0xad, 0xbe, 0xef];
        master.window_mut().queue_replies(&[0; 4]);

        master.transmit(&data).unwrap();

        assert_eq!(data, [0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(master.window_mut().bus_bytes(), &data);
    }

    #[test]
    fn test_receive_sends_zeros() {
        let mut master = master();
        master.window_mut().queue_replies(&[7, 8, 9]);

        let data = master.receive(3).unwrap();

        assert_eq!(data, [7, 8, 9]);
        assert_eq!(master.window_mut().bus_bytes(), &[0, 0, 0]);
        assert!(master.receive(0).unwrap().is_empty());
    }

    #[test]
    fn test_addressed_write_reaches_device() {
        let mut master = master();
        master.window_mut().add_device(0x75);

        master.write(0x75, &[0x10, 0xaa, 0xbb]).unwrap();

        let device = master.window_mut().device(0x75).unwrap();
        assert_eq!(device.register(0x10), 0xaa);
        assert_eq!(device.register(0x11), 0xbb);
    }

    #[test]
    fn test_addressed_write_longer_than_fifo() {
        let mut master = master();
        master.window_mut().add_device(0x20);
        let mut data = vec![0x00];
        data.extend(1..=40u8);

        master.write(0x20, &data).unwrap();

        let device = master.window_mut().device(0x20).unwrap();
        assert_eq!(device.register(0), 1);
        assert_eq!(device.register(39), 40);
    }

    #[test]
    fn test_addressed_read() {
        let mut master = master();
        master.window_mut().add_device(0x75).set_registers(0, &[1, 2, 3, 4]);

        let mut buf = [0u8; 4];
        master.read(0x75, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn test_write_read_repeated_start() {
        let mut master = master();
        master.window_mut().add_device(0x75).set_registers(0xa2, &[0x34, 0x12]);

        let mut buf = [0u8; 2];
        master.write_read(0x75, &[0xa2], &mut buf).unwrap();
        assert_eq!(buf, [0x34, 0x12]);
    }

    #[test]
    fn test_write_read_after_write_phase_completed() {
        let mut master = master();
        master.window_mut().add_device(0x75).set_registers(0xa2, &[0x5e, 0x14]);
        // The write phase is over before the read is queued and the read's
        // data shows up a few polls later
        master.window_mut().delay_rx(3);

        let mut buf = [0u8; 2];
        master.write_read(0x75, &[0xa2], &mut buf).unwrap();
        assert_eq!(buf, [0x5e, 0x14]);
        assert_eq!(master.window_mut().peek(Register::Status) & StatusBit::WRITE_TO_CLEAR, 0);
    }

    #[test]
    fn test_write_read_stops_on_write_phase_nack() {
        let mut master = master();
        master.window_mut().delay_rx(3);

        let mut buf = [0u8; 1];
        assert_eq!(master.write_read(0x42, &[0xa2], &mut buf), Err(I2cError::Nack));
        assert_eq!(master.window_mut().peek(Register::Status) & StatusBit::WRITE_TO_CLEAR, 0);
        assert_eq!(control(&mut master) & ControlBit::I2cEnable.mask(), 0);
        // No read was queued
        assert!(!master
            .window_mut()
            .log()
            .iter()
            .any(|a| matches!(a, Access::Write(Register::Control, v) if v & ControlBit::Read.mask() != 0)));
    }

    #[test]
    fn test_read_longer_than_fifo() {
        let mut master = master();
        let contents: Vec<u8> = (0..40).collect();
        master.window_mut().add_device(0x30).set_registers(0, &contents);

        let mut buf = [0u8; 40];
        master.read(0x30, &mut buf).unwrap();
        assert_eq!(&buf[..], &contents[..]);
    }

    #[test]
    fn test_missing_device_nacks() {
        let mut master = master();
        assert_eq!(master.write(0x42, &[1]), Err(I2cError::Nack));

        let mut buf = [0u8; 1];
        assert_eq!(master.read(0x42, &mut buf), Err(I2cError::Nack));
        assert_eq!(master.window_mut().peek(Register::Status) & StatusBit::WRITE_TO_CLEAR, 0);
    }

    #[test]
    fn test_addressed_transfer_times_out() {
        let config = BscConfig::default().with_deadline(Deadline::Spins(20));
        let mut master = BscMaster::new(SimWindow::new(), SimPins::default(), config);
        master.begin(BusId::I2c1).unwrap();
        master.window_mut().add_device(0x75);
        master.window_mut().stall_done(true);

        let mut buf = [0u8; 2];
        assert_eq!(master.read(0x75, &mut buf), Err(I2cError::Timeout));
        assert_eq!(control(&mut master) & ControlBit::I2cEnable.mask(), 0);
    }

    #[test]
    fn test_exchange_after_addressed_transfer() {
        let mut master = master();
        master.window_mut().add_device(0x75);
        master.write(0x75, &[0x00, 0x01]).unwrap();

        let mut data = [9u8];
        master.exchange(&mut data).unwrap();
        assert_eq!(data, [9]);
    }

    #[test]
    fn test_i2c_bus_trait_register_read() {
        let mut master = master();
        master.window_mut().add_device(0x75).set_registers(0x55, &[0x10]);
        assert_eq!(I2cBus::read_register(&mut master, 0x75, 0x55), Ok(0x10));
    }

    #[test]
    fn test_embedded_hal_transaction() {
        use embedded_hal::i2c::{I2c, Operation};

        let mut master = master();
        master.window_mut().add_device(0x75).set_registers(0x20, &[0xca, 0xfe]);

        let mut buf = [0u8; 2];
        master
            .transaction(0x75, &mut [Operation::Write(&[0x20]), Operation::Read(&mut buf)])
            .unwrap();
        assert_eq!(buf, [0xca, 0xfe]);

        let mut one = [0u8; 1];
        I2c::write_read(&mut master, 0x75, &[0x21], &mut one).unwrap();
        assert_eq!(one, [0xfe]);
    }

    proptest! {
        #[test]
        fn prop_chip_select_polarity_touches_one_bit(
            chip in 0u8..=MAX_CHIP,
            high in any::<bool>(),
            initial in any::<u32>(),
        ) {
            let initial = settled(initial);
            let mut master = master();
            master.window_mut().poke(Register::Control, initial);
            let polarity = if high { ChipSelectPolarity::ActiveHigh } else { ChipSelectPolarity::ActiveLow };

            master.chip_select_polarity(chip, polarity);

            let bit = 1u32 << (21 + chip as u32);
            let after = control(&mut master);
            prop_assert_eq!(after & !bit, initial & !bit);
            prop_assert_eq!(after & bit != 0, high);
        }

        #[test]
        fn prop_chip_select_polarity_ignores_unknown_chip(
            chip in (MAX_CHIP + 1)..=u8::MAX,
            initial in any::<u32>(),
        ) {
            let initial = settled(initial);
            let mut master = master();
            master.window_mut().poke(Register::Control, initial);
            master.chip_select_polarity(chip, ChipSelectPolarity::ActiveHigh);
            prop_assert_eq!(control(&mut master), initial);
        }

        #[test]
        fn prop_programmed_divider_is_even(divider in any::<u32>()) {
            let mut master = master();
            master.set_divider(divider);
            let programmed = master.divider();
            prop_assert_eq!(programmed & 1, 0);
            prop_assert!(programmed <= 0xFFFE);
            prop_assert!(programmed <= divider);
        }
    }
}
