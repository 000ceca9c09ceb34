//! Quantum sets and the chain that holds them
//!
//! # Layout
//!
//! ```text
//! QsetChain
//!   ├─→ QuantumSet 0 → [Some(quantum), None, Some(quantum), ...]  (qset entries)
//!   ├─→ QuantumSet 1 → None                                       (never written)
//!   └─→ QuantumSet 2 → [None, Some(quantum), None, ...]
//! ```
//!
//! The chain only grows at its tail, one set at a time, so set `n` always
//! exists before set `n + 1`. A set's quantum array is allocated on the
//! first write that lands in it and always has exactly `qset` entries.

use crate::error::{Error, Result};
use std::mem;
use tracing::debug;

type Quantum = Box<[u8]>;

/// One element of the chain
#[derive(Debug, Default)]
pub struct QuantumSet {
    data: Option<Vec<Option<Quantum>>>,
}

impl QuantumSet {
    /// Whether the quantum array has been allocated
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// The quantum at `s_pos`, if it has ever been written
    pub fn quantum(&self, s_pos: usize) -> Option<&[u8]> {
        self.data.as_ref()?.get(s_pos)?.as_deref()
    }

    /// The quantum at `s_pos`, allocating the array and the buffer as needed
    pub fn quantum_mut(&mut self, s_pos: usize, qset: usize, quantum: usize) -> Result<&mut [u8]> {
        let data = match &mut self.data {
            Some(data) => data,
            empty => empty.insert(alloc_array(qset)?),
        };

        let slot = data.get_mut(s_pos).ok_or_else(|| {
            Error::Configuration(format!("quantum index {} outside set of {}", s_pos, qset))
        })?;

        match slot {
            Some(buf) => Ok(&mut buf[..]),
            empty => Ok(&mut empty.insert(alloc_quantum(quantum)?)[..]),
        }
    }

    /// Number of allocated quanta in this set
    pub fn quanta(&self) -> usize {
        self.data
            .as_ref()
            .map_or(0, |data| data.iter().filter(|q| q.is_some()).count())
    }

    /// Release every quantum and the array; returns bytes freed
    fn release(&mut self) -> usize {
        self.data.take().map_or(0, |data| {
            data.into_iter().flatten().map(|q| q.len()).sum()
        })
    }
}

fn alloc_array(qset: usize) -> Result<Vec<Option<Quantum>>> {
    let mut data = Vec::new();
    data.try_reserve_exact(qset).map_err(|_| Error::OutOfMemory {
        requested: qset.saturating_mul(mem::size_of::<Option<Quantum>>()),
    })?;
    data.resize_with(qset, || None);
    debug!(qset, "Allocated quantum array");
    Ok(data)
}

fn alloc_quantum(quantum: usize) -> Result<Quantum> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(quantum)
        .map_err(|_| Error::OutOfMemory { requested: quantum })?;
    buf.resize(quantum, 0);
    debug!(quantum, "Allocated quantum");
    Ok(buf.into_boxed_slice())
}

/// The list of quantum sets owned by one device
#[derive(Debug, Default)]
pub struct QsetChain {
    items: Vec<QuantumSet>,
}

impl QsetChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of quantum sets currently linked
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up set `n` without allocating
    pub fn get(&self, n: usize) -> Option<&QuantumSet> {
        self.items.get(n)
    }

    /// Walk to set `n`, allocating every missing set up to and including it
    ///
    /// Sets allocated before a failure stay linked; a later trim reclaims them.
    pub fn follow(&mut self, n: usize) -> Result<&mut QuantumSet> {
        while self.items.len() <= n {
            self.items.try_reserve(1).map_err(|_| Error::OutOfMemory {
                requested: mem::size_of::<QuantumSet>(),
            })?;
            self.items.push(QuantumSet::default());
            debug!(item = self.items.len() - 1, "Linked new quantum set");
        }
        Ok(&mut self.items[n])
    }

    /// Total allocated quanta across the chain
    pub fn quanta(&self) -> usize {
        self.items.iter().map(QuantumSet::quanta).sum()
    }

    /// Free every set and quantum; returns bytes of quantum storage freed
    pub fn clear(&mut self) -> usize {
        let freed = self.items.iter_mut().map(QuantumSet::release).sum();
        self.items = Vec::new();
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follow_allocates_up_to_target() -> Result<()> {
        let mut chain = QsetChain::new();
        assert!(chain.is_empty());

        let set = chain.follow(2)?;
        assert!(!set.has_data());
        assert_eq!(chain.len(), 3);
        Ok(())
    }

    #[test]
    fn test_follow_existing_does_not_grow() -> Result<()> {
        let mut chain = QsetChain::new();
        chain.follow(3)?;
        chain.follow(1)?;
        assert_eq!(chain.len(), 4);
        Ok(())
    }

    #[test]
    fn test_get_never_allocates() {
        let chain = QsetChain::new();
        assert!(chain.get(0).is_none());
        assert!(chain.is_empty());
    }

    #[test]
    fn test_quantum_mut_is_lazy() -> Result<()> {
        let mut set = QuantumSet::default();
        assert!(set.quantum(1).is_none());

        let buf = set.quantum_mut(1, 4, 16)?;
        assert_eq!(buf.len(), 16);
        buf[0] = 7;

        assert!(set.has_data());
        assert!(set.quantum(0).is_none());
        assert_eq!(set.quantum(1).map(|q| q[0]), Some(7));
        assert_eq!(set.quanta(), 1);
        Ok(())
    }

    #[test]
    fn test_quantum_mut_reuses_existing_buffer() -> Result<()> {
        let mut set = QuantumSet::default();
        set.quantum_mut(0, 2, 8)?[3] = 9;
        assert_eq!(set.quantum_mut(0, 2, 8)?[3], 9);
        assert_eq!(set.quanta(), 1);
        Ok(())
    }

    #[test]
    fn test_clear_reports_freed_bytes() -> Result<()> {
        let mut chain = QsetChain::new();
        chain.follow(0)?.quantum_mut(0, 4, 32)?;
        chain.follow(2)?.quantum_mut(3, 4, 32)?;
        assert_eq!(chain.quanta(), 2);

        assert_eq!(chain.clear(), 64);
        assert!(chain.is_empty());
        assert_eq!(chain.quanta(), 0);
        assert_eq!(chain.clear(), 0);
        Ok(())
    }

    #[test]
    fn test_quantum_array_overflow_is_out_of_memory() {
        let mut set = QuantumSet::default();
        let err = set.quantum_mut(0, usize::MAX, 1).unwrap_err();
        assert!(matches!(err, Error::OutOfMemory { requested: usize::MAX }));
        assert!(!set.has_data());
    }
}
