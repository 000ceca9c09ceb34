//! Offset addressing
//!
//! Maps a logical byte offset onto the two-level layout:
//! quantum set (list item) → quantum within the set → byte within the quantum.

use std::fmt;

/// Location of a byte offset inside a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    /// Index of the quantum set in the chain
    pub item: usize,
    /// Index of the quantum within the set
    pub s_pos: usize,
    /// Byte offset within the quantum
    pub q_pos: usize,
}

impl Address {
    /// Locate `pos` for a device with the given layout
    ///
    /// `quantum` and `qset` must be non-zero; configurations are
    /// validated before any device is built with them.
    pub fn locate(pos: u64, quantum: usize, qset: usize) -> Self {
        let itemsize = quantum as u64 * qset as u64;
        let item = pos / itemsize;
        let rest = pos % itemsize;

        Self {
            item: item as usize,
            s_pos: (rest / quantum as u64) as usize,
            q_pos: (rest % quantum as u64) as usize,
        }
    }

    /// Bytes left in the quantum from this address to its end
    pub fn room(&self, quantum: usize) -> usize {
        quantum - self.q_pos
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Address(item={}, s_pos={}, q_pos={})",
            self.item, self.s_pos, self.q_pos
        )
    }
}
