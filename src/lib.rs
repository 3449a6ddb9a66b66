//! Library crate for lan-miner-scan: find hosts answering on the miner API
//! port and query them over the cgminer JSON protocol.
pub mod client;
pub mod decode;
pub mod error;
pub mod netdetect;
pub mod ports;
pub mod scanner;
pub mod types;

pub use client::{ClientOptions, MinerClient, MinerEndpoint};
pub use error::{ApiError, ScanError};
pub use netdetect::{expand, parse_target, AddressSet, ScanTarget};
pub use scanner::{probe_host, LiveHostSet, ScanOptions, ScanStats, Scanner};
