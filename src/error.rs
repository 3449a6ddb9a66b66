use std::io;
use std::net::Ipv4Addr;

use thiserror::Error as ThisError;

/// Failures raised while expanding targets or probing addresses.
#[derive(ThisError, Debug)]
pub enum ScanError {
    #[error("invalid IPv4 address or CIDR block: {token:?}")]
    InvalidAddress { token: String },
    /// The probe could not even create a socket (fd/socket exhaustion).
    #[error("cannot allocate socket to probe {addr}: {source}")]
    Resource {
        addr: Ipv4Addr,
        #[source]
        source: io::Error,
    },
}

/// Failures raised by a single miner API round trip.
#[derive(ThisError, Debug)]
pub enum ApiError {
    #[error("cannot connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("i/o error talking to {endpoint}: {source}")]
    Io {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("{endpoint} did not answer within {millis}ms")]
    Timeout { endpoint: String, millis: u128 },
    #[error("cannot encode command: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("expected exactly one {key} object, got {count}")]
    Cardinality { key: String, count: usize },
    /// The miner answered with a non-success STATUS. For mutating commands the
    /// remote state is unknown: the change may or may not have been applied.
    #[error("miner rejected command: {code}: {description}")]
    Rejected { code: i64, description: String },
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}

pub type ScanResult<T> = std::result::Result<T, ScanError>;
pub type ApiResult<T> = std::result::Result<T, ApiError>;
