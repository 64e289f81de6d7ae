use arcode::{GuestAddr, GC_RAM_BASE};

/// Size of the guest's cached main-RAM window
pub const RAM_SIZE: u32 = 0x0180_0000;

/// Base guest address of main RAM, re-exported for adapter implementors
pub const RAM_BASE: u32 = GC_RAM_BASE;

/// True iff `addr` falls inside the guest's main-RAM window.
///
/// Pointer chases must be checked with this before dereferencing; plain
/// writes rely on the adapter staying silent instead.
#[must_use]
pub const fn mem_check(addr: GuestAddr) -> bool {
    addr >= RAM_BASE && addr < RAM_BASE + RAM_SIZE
}

/// Byte-granular access to the guest's flat address space.
///
/// Guest memory is big-endian; implementations own the byte order so that
/// the interpreter deals only in values.  Out-of-range access must stay
/// silent: writes are dropped and reads yield zero.  The interpreter
/// guards pointer chases with [`mem_check`] and never expects the adapter
/// to fault.
pub trait GuestMemory {
    /// Read one byte
    fn read_u8(&self, addr: GuestAddr) -> u8;

    /// Read a big-endian half-word
    fn read_u16(&self, addr: GuestAddr) -> u16;

    /// Read a big-endian word
    fn read_u32(&self, addr: GuestAddr) -> u32;

    /// Write one byte
    fn write_u8(&mut self, addr: GuestAddr, value: u8);

    /// Write a big-endian half-word
    fn write_u16(&mut self, addr: GuestAddr, value: u16);

    /// Write a big-endian word
    fn write_u32(&mut self, addr: GuestAddr, value: u32);

    /// Fetch a word through the instruction path.
    ///
    /// Adapters backed by a host with a separate instruction cache can
    /// override this; for a flat image it is an ordinary word read.
    fn read_instruction(&self, addr: GuestAddr) -> u32 {
        self.read_u32(addr)
    }
}

/// A heap-backed image of the main-RAM window.
///
/// This is the adapter used by the tests and the command-line driver; an
/// emulator embeds the engine against its own bus instead.
#[derive(Clone)]
pub struct MainRam {
    /// Backing bytes, indexed by offset from [`RAM_BASE`]
    bytes: Vec<u8>,
}

impl MainRam {
    /// A zero-filled RAM image
    #[must_use]
    pub fn new() -> Self {
        Self {
            bytes: vec![0; RAM_SIZE as usize],
        }
    }

    /// Offset of a guest address into the backing image, or `None` when
    /// the address lies outside the window
    fn offset(addr: GuestAddr) -> Option<usize> {
        if mem_check(addr) {
            usize::try_from(addr - RAM_BASE).ok()
        } else {
            None
        }
    }
}

impl Default for MainRam {
    fn default() -> Self {
        Self::new()
    }
}

impl GuestMemory for MainRam {
    fn read_u8(&self, addr: GuestAddr) -> u8 {
        Self::offset(addr)
            .and_then(|index| self.bytes.get(index).copied())
            .unwrap_or(0)
    }

    fn read_u16(&self, addr: GuestAddr) -> u16 {
        (u16::from(self.read_u8(addr)) << 8)
            | u16::from(self.read_u8(addr.wrapping_add(1)))
    }

    fn read_u32(&self, addr: GuestAddr) -> u32 {
        (u32::from(self.read_u16(addr)) << 16)
            | u32::from(self.read_u16(addr.wrapping_add(2)))
    }

    fn write_u8(&mut self, addr: GuestAddr, value: u8) {
        if let Some(slot) =
            Self::offset(addr).and_then(|index| self.bytes.get_mut(index))
        {
            *slot = value;
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        reason = "intentional byte extraction from a half-word"
    )]
    fn write_u16(&mut self, addr: GuestAddr, value: u16) {
        self.write_u8(addr, (value >> 8) as u8);
        self.write_u8(addr.wrapping_add(1), (value & 0xFF) as u8);
    }

    #[allow(
        clippy::cast_possible_truncation,
        reason = "intentional half-word extraction from a word"
    )]
    fn write_u32(&mut self, addr: GuestAddr, value: u32) {
        self.write_u16(addr, (value >> 16) as u16);
        self.write_u16(addr.wrapping_add(2), (value & 0xFFFF) as u16);
    }
}

#[cfg(test)]
mod tests {
    use coverage_helper::test;

    use super::*;

    #[test]
    fn words_are_stored_big_endian() {
        let mut ram = MainRam::new();
        ram.write_u32(0x8000_0000, 0xDEAD_BEEF);
        assert_eq!(ram.read_u8(0x8000_0000), 0xDE);
        assert_eq!(ram.read_u8(0x8000_0001), 0xAD);
        assert_eq!(ram.read_u8(0x8000_0002), 0xBE);
        assert_eq!(ram.read_u8(0x8000_0003), 0xEF);
        assert_eq!(ram.read_u16(0x8000_0000), 0xDEAD);
        assert_eq!(ram.read_u32(0x8000_0000), 0xDEAD_BEEF);
    }

    #[test]
    fn out_of_range_access_is_silent() {
        let mut ram = MainRam::new();
        // Below and above the window
        ram.write_u32(0x7FFF_FFFC, 0x1234_5678);
        ram.write_u32(0x8180_0000, 0x1234_5678);
        assert_eq!(ram.read_u32(0x7FFF_FFFC), 0);
        assert_eq!(ram.read_u32(0x8180_0000), 0);
    }

    #[test]
    fn window_edge_access_splits_silently() {
        let mut ram = MainRam::new();
        // The first two bytes land inside the window, the rest are dropped
        ram.write_u32(0x817F_FFFE, 0xAABB_CCDD);
        assert_eq!(ram.read_u8(0x817F_FFFE), 0xAA);
        assert_eq!(ram.read_u8(0x817F_FFFF), 0xBB);
        assert_eq!(ram.read_u16(0x817F_FFFE), 0xAABB);
        assert_eq!(
            ram.read_u32(0x817F_FFFE),
            0xAABB_0000,
            "bytes past the window read back as zero"
        );
    }

    #[test]
    fn mem_check_matches_the_window_bounds() {
        assert!(!mem_check(0x7FFF_FFFF));
        assert!(mem_check(0x8000_0000));
        assert!(mem_check(0x817F_FFFF));
        assert!(!mem_check(0x8180_0000));
        assert!(!mem_check(0x0000_0000));
    }

    #[test]
    fn instruction_fetch_reads_the_flat_image() {
        let mut ram = MainRam::new();
        ram.write_u32(0x8000_3100, 0x4E80_0020);
        assert_eq!(ram.read_instruction(0x8000_3100), 0x4E80_0020);
    }
}
