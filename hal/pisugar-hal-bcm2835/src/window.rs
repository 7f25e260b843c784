//! Register access layer
//!
//! A [`RegisterWindow`] is a block of 32-bit registers addressed by word
//! offset. It carries no logic; the BSC master and the GPIO function-select
//! binding both sit on top of it, and tests swap in a simulated block.

use core::ptr::NonNull;

/// A block of 32-bit registers addressed by word offset
pub trait RegisterWindow {
    /// Read the register at `offset` words from the block base
    fn read(&mut self, offset: usize) -> u32;

    /// Write the register at `offset` words from the block base
    fn write(&mut self, offset: usize, value: u32);

    /// Read-modify-write: set the bits in `mask`
    fn set_bits(&mut self, offset: usize, mask: u32) {
        let value = self.read(offset);
        self.write(offset, value | mask);
    }

    /// Read-modify-write: clear the bits in `mask`
    fn clear_bits(&mut self, offset: usize, mask: u32) {
        let value = self.read(offset);
        self.write(offset, value & !mask);
    }
}

impl<T: RegisterWindow + ?Sized> RegisterWindow for &mut T {
    fn read(&mut self, offset: usize) -> u32 {
        (**self).read(offset)
    }

    fn write(&mut self, offset: usize, value: u32) {
        (**self).write(offset, value)
    }
}

/// Register window backed by memory the process already has mapped
///
/// Every access is a volatile 32-bit load or store.
#[derive(Debug)]
pub struct MmioWindow {
    base: NonNull<u32>,
    words: usize,
}

#[allow(unsafe_code)]
impl MmioWindow {
    /// Wrap an existing mapping
    ///
    /// Returns `None` for a null `base`.
    ///
    /// # Safety
    ///
    /// `base` must point to `words` consecutive, 4-byte aligned 32-bit
    /// registers that stay mapped for the lifetime of the window, and no
    /// other window may alias the same registers.
    pub unsafe fn new(base: *mut u32, words: usize) -> Option<Self> {
        NonNull::new(base).map(|base| Self { base, words })
    }

    /// Number of registers in the window
    pub fn len(&self) -> usize {
        self.words
    }

    /// Check whether the window is empty
    pub fn is_empty(&self) -> bool {
        self.words == 0
    }

    fn register(&self, offset: usize) -> *mut u32 {
        assert!(
            offset < self.words,
            "register offset {} outside window of {} words",
            offset,
            self.words
        );
        // SAFETY: offset is within the mapping promised to `new`.
        unsafe { self.base.as_ptr().add(offset) }
    }
}

#[allow(unsafe_code)]
impl RegisterWindow for MmioWindow {
    fn read(&mut self, offset: usize) -> u32 {
        let reg = self.register(offset);
        // SAFETY: `reg` is an aligned, mapped register (see `new`).
        unsafe { core::ptr::read_volatile(reg) }
    }

    fn write(&mut self, offset: usize, value: u32) {
        let reg = self.register(offset);
        // SAFETY: `reg` is an aligned, mapped register (see `new`).
        unsafe { core::ptr::write_volatile(reg, value) }
    }
}

// The window is the only handle to its registers (see `new`).
#[allow(unsafe_code)]
unsafe impl Send for MmioWindow {}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;

    #[test]
    fn test_mmio_over_plain_memory() {
        let mut backing = [0u32; 4];
        let mut window = unsafe { MmioWindow::new(backing.as_mut_ptr(), 4) }.unwrap();

        window.write(2, 0xdead_beef);
        assert_eq!(window.read(2), 0xdead_beef);

        window.set_bits(1, 0b1010);
        window.clear_bits(1, 0b0010);
        assert_eq!(window.read(1), 0b1000);
        assert_eq!(window.len(), 4);

        drop(window);
        assert_eq!(backing[2], 0xdead_beef);
    }

    #[test]
    fn test_null_base_rejected() {
        assert!(unsafe { MmioWindow::new(core::ptr::null_mut(), 8) }.is_none());
    }

    #[test]
    #[should_panic]
    fn test_out_of_window_offset_panics() {
        let mut backing = [0u32; 2];
        let mut window = unsafe { MmioWindow::new(backing.as_mut_ptr(), 2) }.unwrap();
        window.read(2);
    }
}
