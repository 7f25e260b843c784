//! Simulated BSC register block
//!
//! [`SimWindow`] behaves like the BSC master closely enough to run the
//! master's transfer loops on a host: a 16-byte FIFO in each direction,
//! self-clearing FIFO-clear bits, write-1-to-clear status bits and slave
//! devices with an auto-incrementing register pointer. Faults can be
//! injected, and every register access is logged so tests can check the
//! order of FIFO traffic.
//!
//! Model:
//!
//! - Setting START_TRANSFER with I2C_ENABLE and a non-zero DLEN starts an
//!   addressed transfer. START_TRANSFER then reads back as 0, as on the
//!   real controller. A slave address nobody answers latches ERR and DONE.
//! - Setting START_TRANSFER without I2C_ENABLE opens a raw exchange. The
//!   bit stays set until software clears it; every FIFO write is answered
//!   immediately with a queued reply (or an echo of the byte sent).
//! - The control register reads back [`SimWindow::POWER_ON_CONTROL`] on top
//!   of what was written, so a reset followed by a read-back sees a live
//!   block. [`SimWindow::unmapped`] reads zero everywhere.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use pisugar_hal::gpio::{PinMode, PinModeControl};

use crate::regs::{ControlBit, Register, StatusBit, CLEAR_FIFO, FIFO_SIZE};
use crate::window::RegisterWindow;

/// One register access seen by the simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Software read `value`
    Read(Register, u32),
    /// Software wrote `value`
    Write(Register, u32),
}

impl Access {
    /// Register that was accessed
    pub fn register(&self) -> Register {
        match self {
            Access::Read(r, _) | Access::Write(r, _) => *r,
        }
    }
}

/// Slave device with 256 byte-wide registers
///
/// The first byte of every write sets the register pointer; later bytes
/// are stored at the pointer, which then advances. Reads return the byte
/// at the pointer and advance it.
#[derive(Debug, Clone)]
pub struct SimDevice {
    address: u8,
    registers: [u8; 256],
    pointer: u8,
}

impl SimDevice {
    fn new(address: u8) -> Self {
        Self {
            address,
            registers: [0; 256],
            pointer: 0,
        }
    }

    /// Bus address
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Current register contents
    pub fn register(&self, register: u8) -> u8 {
        self.registers[register as usize]
    }

    /// Preload registers starting at `first`
    pub fn set_registers(&mut self, first: u8, values: &[u8]) -> &mut Self {
        for (i, &value) in values.iter().enumerate() {
            self.registers[first.wrapping_add(i as u8) as usize] = value;
        }
        self
    }

    fn receive(&mut self, byte: u8, first: bool) {
        if first {
            self.pointer = byte;
        } else {
            self.registers[self.pointer as usize] = byte;
            self.pointer = self.pointer.wrapping_add(1);
        }
    }

    fn send(&mut self) -> u8 {
        let byte = self.registers[self.pointer as usize];
        self.pointer = self.pointer.wrapping_add(1);
        byte
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transfer {
    Idle,
    Exchange,
    Write { first: bool },
    Read,
}

/// Simulated BSC master register block
#[derive(Debug, Clone)]
pub struct SimWindow {
    live: bool,
    control: u32,
    data_length: u32,
    slave_address: u32,
    divider: u32,
    data_delay: u32,
    clock_stretch: u32,
    tx: VecDeque<u8>,
    rx: VecDeque<u8>,
    transfer: Transfer,
    done: bool,
    error: bool,
    clock_stretch_timeout: bool,
    devices: Vec<SimDevice>,
    replies: VecDeque<u8>,
    stall_tx: bool,
    stall_done: bool,
    force_nack: bool,
    force_clock_stretch_timeout: bool,
    rx_latency: u32,
    rx_wait: u32,
    log: Vec<Access>,
    bus: Vec<u8>,
}

impl Default for SimWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWindow {
    /// Control bits the simulated controller reports regardless of writes
    pub const POWER_ON_CONTROL: u32 = ControlBit::InterruptDone.mask();

    /// A live controller with no slaves attached
    pub fn new() -> Self {
        Self {
            live: true,
            control: 0,
            data_length: 0,
            slave_address: 0,
            // Reset value of DIV
            divider: 0x5dc,
            data_delay: 0x0030_0030,
            clock_stretch: 0x40,
            tx: VecDeque::new(),
            rx: VecDeque::new(),
            transfer: Transfer::Idle,
            done: false,
            error: false,
            clock_stretch_timeout: false,
            devices: Vec::new(),
            replies: VecDeque::new(),
            stall_tx: false,
            stall_done: false,
            force_nack: false,
            force_clock_stretch_timeout: false,
            rx_latency: 0,
            rx_wait: 0,
            log: Vec::new(),
            bus: Vec::new(),
        }
    }

    /// A window that is not backed by the peripheral: reads are zero,
    /// writes vanish
    pub fn unmapped() -> Self {
        Self {
            live: false,
            divider: 0,
            data_delay: 0,
            clock_stretch: 0,
            ..Self::new()
        }
    }

    /// Attach a slave at `address`
    pub fn add_device(&mut self, address: u8) -> &mut SimDevice {
        self.devices.retain(|d| d.address != address);
        self.devices.push(SimDevice::new(address));
        let last = self.devices.len() - 1;
        &mut self.devices[last]
    }

    /// Slave at `address`, if attached
    pub fn device(&self, address: u8) -> Option<&SimDevice> {
        self.devices.iter().find(|d| d.address == address)
    }

    /// Replies for the next raw exchange bytes, in order
    pub fn queue_replies(&mut self, replies: &[u8]) {
        self.replies.extend(replies.iter().copied());
    }

    /// Keep TXD low, as if the bus were stuck
    pub fn stall_tx(&mut self, stall: bool) {
        self.stall_tx = stall;
    }

    /// Keep DONE low, as if the transfer never finished
    pub fn stall_done(&mut self, stall: bool) {
        self.stall_done = stall;
    }

    /// Report ERR at the end of every transfer
    pub fn force_nack(&mut self, nack: bool) {
        self.force_nack = nack;
    }

    /// Report CLKT at the end of every transfer
    pub fn force_clock_stretch_timeout(&mut self, timeout: bool) {
        self.force_clock_stretch_timeout = timeout;
    }

    /// Hold back the data of every addressed read for `polls` status reads
    ///
    /// Until then the read shows neither RXD nor its own DONE, like a slow
    /// slave. A DONE still latched from earlier stays visible.
    pub fn delay_rx(&mut self, polls: u32) {
        self.rx_latency = polls;
    }

    /// Register accesses since the last [`clear_log`](Self::clear_log)
    pub fn log(&self) -> &[Access] {
        &self.log
    }

    /// Bytes clocked out on the bus since the last [`clear_log`](Self::clear_log)
    pub fn bus_bytes(&self) -> &[u8] {
        &self.bus
    }

    /// Number of FIFO flushes requested in the log
    pub fn fifo_clears(&self) -> usize {
        self.log
            .iter()
            .filter(|a| matches!(a, Access::Write(Register::Control, v) if v & CLEAR_FIFO != 0))
            .count()
    }

    /// Forget logged accesses and bus traffic
    pub fn clear_log(&mut self) {
        self.log.clear();
        self.bus.clear();
    }

    /// Read a register as software would see it, without side effects
    pub fn peek(&self, register: Register) -> u32 {
        if !self.live {
            return 0;
        }
        match register {
            Register::Control => self.control | Self::POWER_ON_CONTROL,
            Register::Status => self.status(),
            Register::DataLength => self.data_length,
            Register::SlaveAddress => self.slave_address,
            Register::Fifo => self.rx.front().copied().unwrap_or(0) as u32,
            Register::ClockDivider => self.divider,
            Register::DataDelay => self.data_delay,
            Register::ClockStretchTimeout => self.clock_stretch,
        }
    }

    /// Set a register's stored value directly, bypassing the controller
    pub fn poke(&mut self, register: Register, value: u32) {
        match register {
            Register::Control => self.control = value,
            Register::Status => {}
            Register::DataLength => self.data_length = value,
            Register::SlaveAddress => self.slave_address = value,
            Register::Fifo => self.tx.push_back(value as u8),
            Register::ClockDivider => self.divider = value,
            Register::DataDelay => self.data_delay = value,
            Register::ClockStretchTimeout => self.clock_stretch = value,
        }
    }

    fn status(&self) -> u32 {
        let mut status = 0;
        let done = self.done || self.transfer == Transfer::Exchange;

        if self.transfer != Transfer::Idle {
            status |= StatusBit::TransferActive.mask();
        }
        if done && !self.stall_done {
            status |= StatusBit::TransferDone.mask();
        }
        if !self.stall_tx && self.tx.len() < FIFO_SIZE {
            status |= StatusBit::TxAcceptsData.mask();
        }
        if self.tx.len() >= FIFO_SIZE {
            status |= StatusBit::TxFull.mask();
        }
        if !self.rx.is_empty() {
            status |= StatusBit::RxContainsData.mask();
        }
        if self.rx.len() >= FIFO_SIZE {
            status |= StatusBit::RxFull.mask() | StatusBit::RxNeedsRead.mask();
        }
        if self.error || (done && self.force_nack) {
            status |= StatusBit::Error.mask();
        }
        if self.clock_stretch_timeout || (done && self.force_clock_stretch_timeout) {
            status |= StatusBit::ClockStretchTimeout.mask();
        }
        status
    }

    fn write_control(&mut self, value: u32) {
        if value & CLEAR_FIFO != 0 {
            self.tx.clear();
            self.rx.clear();
        }
        let start = ControlBit::StartTransfer.mask();
        let rising = value & start != 0 && self.control & start == 0;
        self.control = value & !CLEAR_FIFO;

        if value & start == 0 {
            if self.transfer == Transfer::Exchange {
                self.transfer = Transfer::Idle;
            }
            return;
        }
        if rising {
            self.start(value);
        }
    }

    // DONE is left as it is; only a status write clears it
    fn start(&mut self, control: u32) {
        if control & ControlBit::I2cEnable.mask() == 0 {
            self.transfer = Transfer::Exchange;
            return;
        }

        // ST is one-shot for addressed transfers
        self.control &= !ControlBit::StartTransfer.mask();

        if self.device(self.slave_address as u8).is_none() {
            self.error = true;
            self.finish();
            return;
        }
        if self.data_length == 0 {
            self.finish();
            return;
        }

        if control & ControlBit::Read.mask() != 0 {
            self.transfer = Transfer::Read;
            self.rx_wait = self.rx_latency;
            self.refill_rx();
        } else {
            self.transfer = Transfer::Write { first: true };
            while let Some(byte) = self.tx.pop_front() {
                self.send(byte);
                if self.transfer == Transfer::Idle {
                    break;
                }
            }
        }
    }

    fn finish(&mut self) {
        self.transfer = Transfer::Idle;
        self.done = true;
    }

    /// Clock one byte out to the addressed slave
    fn send(&mut self, byte: u8) {
        let Transfer::Write { first } = self.transfer else {
            return;
        };
        let address = self.slave_address as u8;
        if let Some(device) = self.devices.iter_mut().find(|d| d.address == address) {
            device.receive(byte, first);
        }
        self.bus.push(byte);
        self.transfer = Transfer::Write { first: false };
        self.data_length = self.data_length.saturating_sub(1);
        if self.data_length == 0 {
            self.finish();
        }
    }

    /// Clock bytes in from the addressed slave while the RX FIFO has room
    fn refill_rx(&mut self) {
        if self.rx_wait > 0 {
            return;
        }
        let address = self.slave_address as u8;
        while self.transfer == Transfer::Read && self.rx.len() < FIFO_SIZE {
            let byte = self
                .devices
                .iter_mut()
                .find(|d| d.address == address)
                .map(SimDevice::send)
                .unwrap_or(0xff);
            self.rx.push_back(byte);
            self.data_length = self.data_length.saturating_sub(1);
            if self.data_length == 0 {
                self.finish();
            }
        }
    }

    fn write_fifo(&mut self, byte: u8) {
        match self.transfer {
            Transfer::Exchange => {
                self.bus.push(byte);
                let reply = self.replies.pop_front().unwrap_or(byte);
                if self.rx.len() < FIFO_SIZE {
                    self.rx.push_back(reply);
                }
            }
            Transfer::Write { .. } => self.send(byte),
            Transfer::Idle | Transfer::Read => {
                if self.tx.len() < FIFO_SIZE {
                    self.tx.push_back(byte);
                }
            }
        }
    }

    /// One status poll passes for a delayed read
    fn poll_status(&mut self) {
        if self.transfer == Transfer::Read && self.rx_wait > 0 {
            self.rx_wait -= 1;
            self.refill_rx();
        }
    }

    fn read_fifo(&mut self) -> u32 {
        let byte = self.rx.pop_front().unwrap_or(0);
        self.refill_rx();
        byte as u32
    }
}

impl RegisterWindow for SimWindow {
    fn read(&mut self, offset: usize) -> u32 {
        let register = Register::ALL[offset];
        let value = match register {
            Register::Fifo if self.live => self.read_fifo(),
            Register::Status if self.live => {
                self.poll_status();
                self.peek(register)
            }
            _ => self.peek(register),
        };
        self.log.push(Access::Read(register, value));
        value
    }

    fn write(&mut self, offset: usize, value: u32) {
        let register = Register::ALL[offset];
        self.log.push(Access::Write(register, value));
        if !self.live {
            return;
        }
        match register {
            Register::Control => self.write_control(value),
            Register::Status => {
                if value & StatusBit::Error.mask() != 0 {
                    self.error = false;
                }
                if value & StatusBit::ClockStretchTimeout.mask() != 0 {
                    self.clock_stretch_timeout = false;
                }
                if value & StatusBit::TransferDone.mask() != 0 {
                    self.done = false;
                }
            }
            Register::Fifo => self.write_fifo(value as u8),
            // The divider keeps 16 bits
            Register::ClockDivider => self.divider = value & 0xffff,
            other => self.poke(other, value),
        }
    }
}

/// Pin binding that records every mode change
#[derive(Debug, Clone, Default)]
pub struct SimPins {
    calls: Vec<(u8, PinMode)>,
}

impl SimPins {
    /// Every mode change, in order
    pub fn calls(&self) -> &[(u8, PinMode)] {
        &self.calls
    }

    /// Last mode set on `pin`
    pub fn mode(&self, pin: u8) -> Option<PinMode> {
        self.calls
            .iter()
            .rev()
            .find(|(p, _)| *p == pin)
            .map(|(_, mode)| *mode)
    }
}

impl PinModeControl for SimPins {
    fn set_pin_mode(&mut self, pin: u8, mode: PinMode) {
        self.calls.push((pin, mode));
    }
}
