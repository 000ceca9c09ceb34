//! Open device handles
//!
//! A `ScullFile` owns the file position for one open of a device. The
//! inherent `read_chunk`/`write_chunk` calls keep the one-quantum-per-call
//! behaviour; the `std::io` impls sit on top so the usual adapters
//! (`write_all`, `read_exact`, `io::copy`) work.
//!
//! Note that `io::Read` sees a hole as end of file, since a hole read
//! returns 0 bytes.

use super::device::DeviceStats;
use super::registry::{AccessMode, SharedDevice};
use crate::error::{Error, Result};
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Handle returned by `ScullRegistry::open`
pub struct ScullFile {
    device: SharedDevice,
    minor: usize,
    mode: AccessMode,
    f_pos: u64,
}

impl ScullFile {
    pub(crate) fn new(device: SharedDevice, minor: usize, mode: AccessMode) -> Self {
        Self {
            device,
            minor,
            mode,
            f_pos: 0,
        }
    }

    pub fn minor(&self) -> usize {
        self.minor
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Current file position
    pub fn position(&self) -> u64 {
        self.f_pos
    }

    /// Logical size of the underlying device
    pub fn len(&self) -> u64 {
        self.device.lock().size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> DeviceStats {
        self.device.lock().stats()
    }

    /// One device read at the current position
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.mode.can_read() {
            return Err(Error::AccessDenied {
                mode: self.mode,
                op: "read",
            });
        }
        let count = buf.len();
        self.device.lock().read(&mut self.f_pos, buf, count)
    }

    /// One device write at the current position
    pub fn write_chunk(&mut self, buf: &[u8]) -> Result<usize> {
        if !self.mode.can_write() {
            return Err(Error::AccessDenied {
                mode: self.mode,
                op: "write",
            });
        }
        self.device.lock().write(&mut self.f_pos, buf, buf.len())
    }

    /// Write all of `buf` starting at `offset`, reissuing at each quantum boundary
    pub fn write_all_at(&mut self, offset: u64, mut buf: &[u8]) -> Result<()> {
        self.f_pos = offset;
        while !buf.is_empty() {
            let n = self.write_chunk(buf)?;
            buf = &buf[n..];
        }
        Ok(())
    }

    /// Read up to `buf.len()` bytes at `offset`, stopping at end of data or a hole
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.f_pos = offset;
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_chunk(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

impl Read for ScullFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_chunk(buf)?)
    }
}

impl Write for ScullFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_chunk(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for ScullFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(delta) => self.f_pos.checked_add_signed(delta),
            SeekFrom::End(delta) => self.len().checked_add_signed(delta),
        };
        self.f_pos = target.ok_or(Error::OffsetOutOfRange)?;
        Ok(self.f_pos)
    }
}

impl std::fmt::Debug for ScullFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScullFile")
            .field("minor", &self.minor)
            .field("mode", &self.mode)
            .field("f_pos", &self.f_pos)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ScullConfig, ScullRegistry};

    fn registry() -> ScullRegistry {
        ScullRegistry::new(ScullConfig::new(4, 2).with_nr_devs(1)).unwrap()
    }

    #[test]
    fn test_chunk_stops_at_quantum_boundary() -> Result<()> {
        let reg = registry();
        let mut file = reg.open(0, AccessMode::ReadWrite)?;

        assert_eq!(file.write_chunk(b"abcdef")?, 4);
        assert_eq!(file.position(), 4);
        assert_eq!(file.write_chunk(b"ef")?, 2);
        assert_eq!(file.len(), 6);
        Ok(())
    }

    #[test]
    fn test_write_all_at_spans_sets() -> Result<()> {
        let reg = registry();
        let mut file = reg.open(0, AccessMode::ReadWrite)?;

        file.write_all_at(2, b"0123456789")?;
        assert_eq!(file.len(), 12);
        assert_eq!(file.stats().qsets, 2);
        assert_eq!(file.stats().quanta, 3);

        let mut out = [0u8; 10];
        assert_eq!(file.read_at(2, &mut out)?, 10);
        assert_eq!(&out, b"0123456789");
        Ok(())
    }

    #[test]
    fn test_read_at_stops_at_hole() -> Result<()> {
        let reg = registry();
        let mut file = reg.open(0, AccessMode::ReadWrite)?;
        file.write_all_at(0, b"ab")?;
        file.write_all_at(8, b"cd")?;

        // The first quantum is allocated, so its unwritten tail reads back as zeros;
        // the second quantum of set 0 was never written.
        let mut out = [0xFFu8; 10];
        assert_eq!(file.read_at(0, &mut out)?, 4);
        assert_eq!(&out[..4], b"ab\0\0");
        assert_eq!(file.position(), 4);
        Ok(())
    }

    #[test]
    fn test_mode_is_enforced() -> Result<()> {
        let reg = registry();

        let mut file = reg.open(0, AccessMode::WriteOnly)?;
        let err = file.read_chunk(&mut [0u8; 4]).unwrap_err();
        assert!(matches!(err, Error::AccessDenied { op: "read", .. }));
        reg.release(file);

        let mut file = reg.open(0, AccessMode::ReadOnly)?;
        let err = file.write_chunk(b"x").unwrap_err();
        assert!(matches!(err, Error::AccessDenied { op: "write", .. }));
        Ok(())
    }

    #[test]
    fn test_io_traits() -> io::Result<()> {
        let reg = registry();
        let mut file = reg.open(0, AccessMode::ReadWrite)?;

        file.write_all(b"hello scull")?;
        assert_eq!(file.seek(SeekFrom::End(-5))?, 6);

        let mut tail = String::new();
        file.read_to_string(&mut tail)?;
        assert_eq!(tail, "scull");

        file.seek(SeekFrom::Start(0))?;
        let mut head = [0u8; 5];
        file.read_exact(&mut head)?;
        assert_eq!(&head, b"hello");

        assert_eq!(file.seek(SeekFrom::Current(1))?, 6);
        Ok(())
    }

    #[test]
    fn test_seek_before_start_is_rejected() -> Result<()> {
        let reg = registry();
        let mut file = reg.open(0, AccessMode::ReadOnly)?;

        let err = file.seek(SeekFrom::Current(-1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(file.position(), 0);
        Ok(())
    }
}
