//! Priority ready bitmap
//!
//! One bit per priority level: bit `p` is set iff the ready list at
//! priority `p` is non-empty. The highest-priority lookup is O(1) whatever
//! the bit pattern, via a 256-entry lowest-set-bit table.
//!
//! Convention: priority 0 is the most urgent level. The word is scanned
//! least-significant byte first and ties within a byte resolve to the
//! lowest bit, so the selected index is always the numerically smallest
//! set bit.

/// Lowest-set-bit position for every byte value. Entry 0 is unused.
const LOWEST_BIT: [u8; 256] = build_lowest_bit_table();

const fn build_lowest_bit_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut value = 1usize;
    while value < 256 {
        table[value] = (value as u32).trailing_zeros() as u8;
        value += 1;
    }
    table
}

/// Bit-per-priority summary of the ready lists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadyBitmap(u32);

impl ReadyBitmap {
    pub const fn new() -> Self {
        Self(0)
    }

    /// Mark the ready list at `priority` non-empty
    pub fn set(&mut self, priority: u8) {
        debug_assert!(priority <= crate::config::MAX_PRIORITY);
        self.0 |= 1 << priority;
    }

    /// Mark the ready list at `priority` empty
    pub fn clear(&mut self, priority: u8) {
        debug_assert!(priority <= crate::config::MAX_PRIORITY);
        self.0 &= !(1 << priority);
    }

    pub fn is_set(&self, priority: u8) -> bool {
        self.0 & (1 << priority) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Highest-priority (numerically smallest) set bit.
    ///
    /// Caller contract: at least one bit is set. The scheduler guarantees
    /// this by keeping the idle thread ready at the `MAX_PRIORITY` floor.
    pub fn highest_ready(&self) -> u8 {
        debug_assert!(self.0 != 0, "highest_ready on empty bitmap");

        let word = self.0;
        let (byte, offset) = if word & 0x0000_00ff != 0 {
            (word & 0xff, 0)
        } else if word & 0x0000_ff00 != 0 {
            ((word >> 8) & 0xff, 8)
        } else if word & 0x00ff_0000 != 0 {
            ((word >> 16) & 0xff, 16)
        } else {
            ((word >> 24) & 0xff, 24)
        };

        LOWEST_BIT[byte as usize] + offset
    }
}
