//! Device table
//!
//! Holds the `nr_devs` devices created at start-up. Each device sits behind
//! its own mutex, held for the whole of every read, write, trim and stats
//! call, since locating a quantum and allocating it are separate steps.

use super::config::ScullConfig;
use super::device::{DeviceStats, ScullDevice};
use super::file::ScullFile;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// A device shared between open handles
pub type SharedDevice = Arc<Mutex<ScullDevice>>;

/// How a device is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn can_read(&self) -> bool {
        !matches!(self, Self::WriteOnly)
    }

    pub fn can_write(&self) -> bool {
        !matches!(self, Self::ReadOnly)
    }
}

/// The set of scull devices
pub struct ScullRegistry {
    config: ScullConfig,
    devices: Vec<SharedDevice>,
}

impl ScullRegistry {
    /// Create `config.nr_devs` empty devices
    pub fn new(config: ScullConfig) -> Result<Self> {
        config.validate()?;

        let devices = (0..config.nr_devs)
            .map(|_| ScullDevice::new(config).map(|dev| Arc::new(Mutex::new(dev))))
            .collect::<Result<Vec<_>>>()?;

        info!(
            nr_devs = config.nr_devs,
            quantum = config.quantum,
            qset = config.qset,
            "Initialized scull devices"
        );

        Ok(Self { config, devices })
    }

    /// Create a registry with the default layout
    pub fn with_defaults() -> Result<Self> {
        Self::new(ScullConfig::default())
    }

    pub fn config(&self) -> &ScullConfig {
        &self.config
    }

    pub fn nr_devs(&self) -> usize {
        self.devices.len()
    }

    /// Shared handle to device `minor`
    pub fn device(&self, minor: usize) -> Result<SharedDevice> {
        self.devices
            .get(minor)
            .cloned()
            .ok_or(Error::NoSuchDevice {
                minor,
                nr_devs: self.devices.len(),
            })
    }

    /// Open device `minor`; a write-only open empties the device first
    pub fn open(&self, minor: usize, mode: AccessMode) -> Result<ScullFile> {
        let device = self.device(minor)?;

        if mode == AccessMode::WriteOnly {
            device.lock().trim();
        }

        debug!(minor, ?mode, "Opened device");
        Ok(ScullFile::new(device, minor, mode))
    }

    /// Close a handle; device contents persist for the next open
    pub fn release(&self, file: ScullFile) {
        debug!(minor = file.minor(), position = file.position(), "Released device");
        drop(file);
    }

    /// Statistics for every device, in minor order
    pub fn stats(&self) -> Vec<DeviceStats> {
        self.devices.iter().map(|dev| dev.lock().stats()).collect()
    }
}

impl Drop for ScullRegistry {
    fn drop(&mut self) {
        for dev in &self.devices {
            dev.lock().trim();
        }
        info!(nr_devs = self.devices.len(), "Released scull devices");
    }
}

impl std::fmt::Debug for ScullRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScullRegistry")
            .field("config", &self.config)
            .field("nr_devs", &self.devices.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ScullRegistry {
        ScullRegistry::new(ScullConfig::new(4, 2).with_nr_devs(2)).unwrap()
    }

    #[test]
    fn test_creates_configured_device_count() {
        let reg = registry();
        assert_eq!(reg.nr_devs(), 2);
        assert_eq!(reg.stats().len(), 2);
        assert!(reg.stats().iter().all(|s| s.size == 0));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = ScullRegistry::new(ScullConfig::new(4, 2).with_nr_devs(0)).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_unknown_minor() {
        let err = registry().open(2, AccessMode::ReadOnly).unwrap_err();
        assert!(matches!(err, Error::NoSuchDevice { minor: 2, nr_devs: 2 }));
    }

    #[test]
    fn test_write_only_open_trims() -> Result<()> {
        let reg = registry();
        reg.device(0)?.lock().write(&mut 0, b"abcd", 4)?;

        let file = reg.open(0, AccessMode::ReadWrite)?;
        assert_eq!(reg.stats()[0].size, 4);
        reg.release(file);

        let file = reg.open(0, AccessMode::ReadOnly)?;
        assert_eq!(reg.stats()[0].size, 4);
        reg.release(file);

        let file = reg.open(0, AccessMode::WriteOnly)?;
        assert_eq!(reg.stats()[0].size, 0);
        assert_eq!(reg.stats()[0].quanta, 0);
        reg.release(file);
        Ok(())
    }

    #[test]
    fn test_devices_are_independent() -> Result<()> {
        let reg = registry();
        reg.device(1)?.lock().write(&mut 0, b"zz", 2)?;
        assert_eq!(reg.stats()[0].size, 0);
        assert_eq!(reg.stats()[1].size, 2);
        Ok(())
    }

    #[test]
    fn test_access_mode_permissions() {
        assert!(AccessMode::ReadOnly.can_read());
        assert!(!AccessMode::ReadOnly.can_write());
        assert!(!AccessMode::WriteOnly.can_read());
        assert!(AccessMode::WriteOnly.can_write());
        assert!(AccessMode::ReadWrite.can_read() && AccessMode::ReadWrite.can_write());
    }
}
