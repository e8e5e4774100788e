//! sqlsweep - find the hosts in a network that really speak MySQL
//!
//! Every usable address in an IPv4 range gets one TCP connect, bounded by a
//! concurrency limit. A host only counts as a match when the first bytes it
//! sends carry the protocol's greeting or error-packet layout; an open port
//! on its own proves nothing.

pub mod config;
pub mod error;
pub mod network;
pub mod output;
pub mod scanner;
pub mod utils;

// Re-export commonly used types
pub use config::ScanConfig;
pub use error::{ProbeFault, ScanError};
pub use network::{AddressEnumerator, Outcome, ProbeDetail, ProbeResult};
pub use scanner::{ConcurrencyLimiter, HandshakeProber, HostProber, ScanEngine, ScanReport};

pub type Result<T> = std::result::Result<T, ScanError>;
