//! A single scull device
//!
//! Reads and writes move at most one quantum per call. A call that would
//! cross a quantum boundary is cut short at the boundary and the caller
//! reissues for the rest, the same contract a character device gives to
//! `read(2)`/`write(2)`.

use super::address::Address;
use super::config::ScullConfig;
use super::qset::QsetChain;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// In-memory sparse byte device
#[derive(Debug)]
pub struct ScullDevice {
    /// Quantum sets, allocated lazily by writes
    data: QsetChain,
    quantum: usize,
    qset: usize,
    /// High-water mark of bytes written
    size: u64,
    /// Layout restored by `trim`
    defaults: ScullConfig,
}

impl ScullDevice {
    /// Create an empty device with the configured layout
    pub fn new(config: ScullConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            data: QsetChain::new(),
            quantum: config.quantum,
            qset: config.qset,
            size: 0,
            defaults: config,
        })
    }

    /// Current logical length in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn quantum(&self) -> usize {
        self.quantum
    }

    pub fn qset(&self) -> usize {
        self.qset
    }

    /// Read up to `count` bytes at `*f_pos` into `buf`
    ///
    /// Returns 0 at or past the end of data, and also when the offset falls
    /// in a hole that was never written; holes are not zero-filled.
    pub fn read(&self, f_pos: &mut u64, buf: &mut [u8], count: usize) -> Result<usize> {
        let pos = *f_pos;
        if pos >= self.size {
            return Ok(0);
        }

        let mut count = count.min(usize::try_from(self.size - pos).unwrap_or(usize::MAX));

        let addr = Address::locate(pos, self.quantum, self.qset);

        // Never allocates: every item below `size` was linked by the write that set it.
        let Some(quantum) = self
            .data
            .get(addr.item)
            .and_then(|set| set.quantum(addr.s_pos))
        else {
            debug!(pos, %addr, "Read hit a hole");
            return Ok(0);
        };

        // read only up to the end of this quantum
        count = count.min(addr.room(self.quantum));

        let available = buf.len();
        let dst = buf.get_mut(..count).ok_or(Error::TransferFault {
            requested: count,
            available,
        })?;
        dst.copy_from_slice(&quantum[addr.q_pos..addr.q_pos + count]);

        *f_pos += count as u64;
        debug!(pos, count, %addr, "Read");
        Ok(count)
    }

    /// Write up to `count` bytes from `buf` at `*f_pos`
    ///
    /// Allocates the quantum set, its array and the target quantum on
    /// demand. Allocations made before a fault are kept.
    pub fn write(&mut self, f_pos: &mut u64, buf: &[u8], count: usize) -> Result<usize> {
        let pos = *f_pos;
        let addr = Address::locate(pos, self.quantum, self.qset);

        // write only up to the end of this quantum
        let count = count.min(addr.room(self.quantum));
        let end = pos.checked_add(count as u64).ok_or(Error::OffsetOutOfRange)?;

        let quantum = self
            .data
            .follow(addr.item)?
            .quantum_mut(addr.s_pos, self.qset, self.quantum)?;

        let src = buf.get(..count).ok_or(Error::TransferFault {
            requested: count,
            available: buf.len(),
        })?;
        quantum[addr.q_pos..addr.q_pos + count].copy_from_slice(src);

        *f_pos = end;
        if self.size < end {
            self.size = end;
        }

        debug!(pos, count, %addr, size = self.size, "Wrote");
        Ok(count)
    }

    /// Release all storage and restore the configured layout
    ///
    /// Safe on an empty device.
    pub fn trim(&mut self) {
        let quanta = self.data.quanta();
        let freed = self.data.clear();

        self.size = 0;
        self.quantum = self.defaults.quantum;
        self.qset = self.defaults.qset;

        info!(quanta, freed_bytes = freed, "Trimmed device");
    }

    /// Snapshot of allocation counters
    pub fn stats(&self) -> DeviceStats {
        let quanta = self.data.quanta();
        DeviceStats {
            size: self.size,
            quantum: self.quantum,
            qset: self.qset,
            qsets: self.data.len(),
            quanta,
            allocated_bytes: (quanta * self.quantum) as u64,
        }
    }
}

/// Allocation statistics for one device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStats {
    /// Logical length (high-water mark)
    pub size: u64,
    pub quantum: usize,
    pub qset: usize,
    /// Linked quantum sets
    pub qsets: usize,
    /// Allocated quanta
    pub quanta: usize,
    /// Bytes held by allocated quanta
    pub allocated_bytes: u64,
}
