//! BSC register map
//!
//! Offsets and bit masks of the Broadcom Serial Controller master as laid
//! out in the BCM2835 ARM Peripherals datasheet (section 3.2). These values
//! are part of the SoC's physical layout and must stay bit-exact.

/// BSC master registers, as 32-bit word offsets from the block base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(usize)]
pub enum Register {
    /// C - Control
    Control = 0,
    /// S - Status
    Status = 1,
    /// DLEN - Data Length
    DataLength = 2,
    /// A - Slave Address
    SlaveAddress = 3,
    /// FIFO - Data FIFO
    Fifo = 4,
    /// DIV - Clock Divider
    ClockDivider = 5,
    /// DEL - Data Delay
    DataDelay = 6,
    /// CLKT - Clock Stretch Timeout
    ClockStretchTimeout = 7,
}

impl Register {
    /// Every register, in address order
    pub const ALL: [Register; 8] = [
        Register::Control,
        Register::Status,
        Register::DataLength,
        Register::SlaveAddress,
        Register::Fifo,
        Register::ClockDivider,
        Register::DataDelay,
        Register::ClockStretchTimeout,
    ];

    /// Number of 32-bit words the register block spans
    pub const BLOCK_WORDS: usize = Self::ALL.len();

    /// Word offset from the block base
    pub const fn offset(self) -> usize {
        self as usize
    }

    /// Byte offset from the block base
    pub const fn byte_offset(self) -> usize {
        self.offset() * 4
    }
}

/// Single-bit flags of the control register (C)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum ControlBit {
    /// I2CEN - I2C enable, 0 = disabled, 1 = enabled
    I2cEnable = 1 << 15,
    /// INTR - Interrupt on RX
    InterruptRx = 1 << 10,
    /// INTT - Interrupt on TX
    InterruptTx = 1 << 9,
    /// INTD - Interrupt on DONE
    InterruptDone = 1 << 8,
    /// ST - Start transfer; held by the raw exchange as its transfer-active flag
    StartTransfer = 1 << 7,
    /// CLEAR - FIFO clear, upper bit
    ClearFifo1 = 1 << 5,
    /// CLEAR - FIFO clear, lower bit
    ClearFifo2 = 1 << 4,
    /// READ - Read transfer
    Read = 1 << 0,
}

impl ControlBit {
    /// Bit mask within the control register
    pub const fn mask(self) -> u32 {
        self as u32
    }
}

/// Single-bit flags of the status register (S)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum StatusBit {
    /// CLKT - Clock stretch timeout (write 1 to clear)
    ClockStretchTimeout = 1 << 9,
    /// ERR - ACK error (write 1 to clear)
    Error = 1 << 8,
    /// RXF - RX FIFO full
    RxFull = 1 << 7,
    /// TXE - TX FIFO full
    TxFull = 1 << 6,
    /// RXD - FIFO contains data
    RxContainsData = 1 << 5,
    /// TXD - FIFO can accept data
    TxAcceptsData = 1 << 4,
    /// RXR - FIFO needs reading (full)
    RxNeedsRead = 1 << 3,
    /// TXW - FIFO needs writing (full)
    TxNeedsWrite = 1 << 2,
    /// DONE - Transfer done (write 1 to clear)
    TransferDone = 1 << 1,
    /// TA - Transfer active
    TransferActive = 1 << 0,
}

impl StatusBit {
    /// Bit mask within the status register
    pub const fn mask(self) -> u32 {
        self as u32
    }

    /// Status bits software clears by writing a 1
    pub const WRITE_TO_CLEAR: u32 = StatusBit::ClockStretchTimeout.mask()
        | StatusBit::Error.mask()
        | StatusBit::TransferDone.mask();
}

/// Both FIFO-clear bits; the hardware drops them again once the flush is done
pub const CLEAR_FIFO: u32 = ControlBit::ClearFifo1.mask() | ControlBit::ClearFifo2.mask();

/// Two-bit chip select field
pub const CHIP_SELECT_MASK: u32 = 0b11;

/// Clock phase: first clock transition at the beginning of the data bit
pub const CLOCK_PHASE: u32 = 1 << 2;

/// Clock polarity: clock rests high
pub const CLOCK_POLARITY: u32 = 1 << 3;

/// Bit position of the chip-select polarity bit for chip 0 (chips 1 and 2 follow)
pub const CHIP_SELECT_POLARITY_SHIFT: u32 = 21;

/// Highest chip select line the controller knows about
pub const MAX_CHIP: u8 = 2;

/// The divider register holds 16 bits and the hardware wants an even value
pub const DIVIDER_MASK: u32 = (1 << 16) - 1 - 1;

/// Depth of the BSC FIFO in bytes
pub const FIFO_SIZE: usize = 16;

/// Polarity bit for `chip`, or `None` past the last chip select line
pub const fn chip_select_polarity_bit(chip: u8) -> Option<u32> {
    if chip > MAX_CHIP {
        None
    } else {
        Some(1 << (CHIP_SELECT_POLARITY_SHIFT + chip as u32))
    }
}

const CONTROL_BITS: [ControlBit; 8] = [
    ControlBit::I2cEnable,
    ControlBit::InterruptRx,
    ControlBit::InterruptTx,
    ControlBit::InterruptDone,
    ControlBit::StartTransfer,
    ControlBit::ClearFifo1,
    ControlBit::ClearFifo2,
    ControlBit::Read,
];

const STATUS_BITS: [StatusBit; 10] = [
    StatusBit::ClockStretchTimeout,
    StatusBit::Error,
    StatusBit::RxFull,
    StatusBit::TxFull,
    StatusBit::RxContainsData,
    StatusBit::TxAcceptsData,
    StatusBit::RxNeedsRead,
    StatusBit::TxNeedsWrite,
    StatusBit::TransferDone,
    StatusBit::TransferActive,
];

const fn disjoint_single_bits(masks: &[u32]) -> bool {
    let mut seen = 0u32;
    let mut i = 0;
    while i < masks.len() {
        let m = masks[i];
        if m.count_ones() != 1 || seen & m != 0 {
            return false;
        }
        seen |= m;
        i += 1;
    }
    true
}

const fn control_masks() -> [u32; 8] {
    let mut out = [0u32; 8];
    let mut i = 0;
    while i < CONTROL_BITS.len() {
        out[i] = CONTROL_BITS[i].mask();
        i += 1;
    }
    out
}

const fn status_masks() -> [u32; 10] {
    let mut out = [0u32; 10];
    let mut i = 0;
    while i < STATUS_BITS.len() {
        out[i] = STATUS_BITS[i].mask();
        i += 1;
    }
    out
}

// Datasheet layout, checked at compile time.
const _: () = {
    assert!(disjoint_single_bits(&control_masks()));
    assert!(disjoint_single_bits(&status_masks()));
    assert!(ControlBit::I2cEnable.mask() == 0x0000_8000);
    assert!(ControlBit::StartTransfer.mask() == 0x0000_0080);
    assert!(CLEAR_FIFO == 0x0000_0030);
    assert!(StatusBit::ClockStretchTimeout.mask() == 0x0000_0200);
    assert!(StatusBit::TransferDone.mask() == 0x0000_0002);
    assert!(CHIP_SELECT_MASK & CLEAR_FIFO == 0);
    assert!((CLOCK_PHASE | CLOCK_POLARITY) & (CHIP_SELECT_MASK | CLEAR_FIFO) == 0);
    assert!(CLOCK_PHASE & CLOCK_POLARITY == 0);
    assert!(DIVIDER_MASK == 0xFFFE);
    assert!(Register::ClockStretchTimeout.byte_offset() == 0x1C);
};
