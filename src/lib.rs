// Scull - a sparse, lazily allocated in-memory byte device

#![warn(rust_2018_idioms)]

pub mod storage;

// Re-exports for convenience
pub use storage::{
    AccessMode, Address, DeviceStats, ScullConfig, ScullDevice, ScullFile, ScullRegistry,
};

/// Scull error types
pub mod error {
    use crate::storage::AccessMode;
    use std::io;
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        /// A node, slot array or quantum buffer could not be allocated.
        #[error("Out of memory: failed to allocate {requested} bytes")]
        OutOfMemory { requested: usize },

        /// The caller's buffer cannot hold the bytes the call asked to move.
        #[error("Transfer fault: requested {requested} bytes, buffer holds {available}")]
        TransferFault { requested: usize, available: usize },

        #[error("Configuration error: {0}")]
        Configuration(String),

        #[error("Offset out of range")]
        OffsetOutOfRange,

        #[error("Device opened {mode:?}, cannot {op}")]
        AccessDenied { mode: AccessMode, op: &'static str },

        #[error("No such device: minor {minor} (device count {nr_devs})")]
        NoSuchDevice { minor: usize, nr_devs: usize },

        #[error("IO error: {0}")]
        Io(#[from] io::Error),
    }

    pub type Result<T> = std::result::Result<T, Error>;

    impl From<Error> for io::Error {
        fn from(err: Error) -> Self {
            match err {
                Error::Io(e) => e,
                Error::OutOfMemory { .. } => io::Error::new(io::ErrorKind::OutOfMemory, err),
                Error::TransferFault { .. } => io::Error::new(io::ErrorKind::InvalidInput, err),
                Error::OffsetOutOfRange => io::Error::new(io::ErrorKind::InvalidInput, err),
                Error::AccessDenied { .. } => io::Error::new(io::ErrorKind::PermissionDenied, err),
                Error::NoSuchDevice { .. } => io::Error::new(io::ErrorKind::NotFound, err),
                Error::Configuration(_) => io::Error::new(io::ErrorKind::InvalidInput, err),
            }
        }
    }
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
