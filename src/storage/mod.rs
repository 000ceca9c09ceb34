//! Storage layer
//!
//! # Architecture
//!
//! ```text
//! ScullRegistry (nr_devs devices)
//!   └─→ Mutex<ScullDevice> (size, quantum, qset)
//!        └─→ QsetChain
//!             └─→ QuantumSet → [Option<quantum>; qset]
//!                                    └─→ [u8; quantum]
//! ```
//!
//! An offset maps to (quantum set, quantum, byte) through [`Address`].
//! Quantum sets and quanta are allocated by writes only; reads of ranges
//! that were never written return no data. `trim` drops the whole chain.

pub mod address;
pub mod config;
pub mod device;
pub mod file;
pub mod qset;
pub mod registry;

pub use address::Address;
pub use config::ScullConfig;
pub use device::{DeviceStats, ScullDevice};
pub use file::ScullFile;
pub use qset::{QsetChain, QuantumSet};
pub use registry::{AccessMode, ScullRegistry, SharedDevice};
