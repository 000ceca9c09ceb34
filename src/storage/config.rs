//! Device configuration
//!
//! The values here play the role of the driver's load-time parameters:
//! they are read once when the registry is created and are what a trim
//! resets a device back to.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Configuration for a set of scull devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScullConfig {
    /// Size of one quantum (leaf buffer) in bytes
    pub quantum: usize,
    /// Number of quantum pointers held by one quantum set
    pub qset: usize,
    /// Number of devices created by the registry
    pub nr_devs: usize,
}

impl ScullConfig {
    /// Default quantum size in bytes
    pub const DEFAULT_QUANTUM: usize = 4000;

    /// Default number of quanta per set
    pub const DEFAULT_QSET: usize = 1000;

    /// Default device count
    pub const DEFAULT_NR_DEVS: usize = 4;

    /// Create a config with explicit quantum and set width
    pub fn new(quantum: usize, qset: usize) -> Self {
        Self {
            quantum,
            qset,
            ..Self::default()
        }
    }

    /// Builder-style override of the device count
    pub fn with_nr_devs(mut self, nr_devs: usize) -> Self {
        self.nr_devs = nr_devs;
        self
    }

    /// Bytes addressed by one quantum set (`quantum * qset`)
    pub fn item_size(&self) -> u64 {
        self.quantum as u64 * self.qset as u64
    }

    /// Reject layouts the addressing arithmetic cannot work with
    pub fn validate(&self) -> Result<()> {
        let reason = if self.quantum == 0 {
            Some("quantum must be positive")
        } else if self.qset == 0 {
            Some("qset must be positive")
        } else if self.nr_devs == 0 {
            Some("nr_devs must be positive")
        } else if (self.quantum as u64).checked_mul(self.qset as u64).is_none() {
            Some("quantum * qset overflows the addressable range")
        } else {
            None
        };

        match reason {
            Some(reason) => {
                warn!(
                    quantum = self.quantum,
                    qset = self.qset,
                    nr_devs = self.nr_devs,
                    "Rejected scull configuration: {}",
                    reason
                );
                Err(Error::Configuration(reason.to_string()))
            }
            None => Ok(()),
        }
    }

    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| Error::Configuration(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = ?path, "Loading scull configuration");
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self)
            .map_err(|e| Error::Configuration(format!("Failed to render config: {}", e)))
    }
}

impl Default for ScullConfig {
    fn default() -> Self {
        Self {
            quantum: Self::DEFAULT_QUANTUM,
            qset: Self::DEFAULT_QSET,
            nr_devs: Self::DEFAULT_NR_DEVS,
        }
    }
}
