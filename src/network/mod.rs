//! Network module: target expansion and per-host probe results

pub mod targets;

use crate::error::ProbeFault;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

pub use targets::{AddressEnumerator, HostIter};

/// Protocol version byte carried at offset 4 of a server greeting
pub const HANDSHAKE_MARKER: u8 = 0x0A;

/// Header byte of a server error packet at the same offset
pub const ERROR_PACKET_MARKER: u8 = 0xFF;

/// Offset of the marker byte (after the 3-byte length and 1-byte sequence id)
pub const MARKER_OFFSET: usize = 4;

/// Whether a host was confirmed to speak the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    MatchedProtocol,
    Unconfirmed,
}

impl Outcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Outcome::MatchedProtocol)
    }
}

/// Reason behind an [`Outcome`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeDetail {
    /// Server greeting with the protocol version marker
    Handshake,
    /// Server error packet (too many connections, host blocked, ...)
    ErrorPacket,
    /// Enough bytes arrived but the marker did not match
    Mismatch,
    /// Peer sent fewer than five bytes and closed
    ShortRead,
    /// Nothing (or not enough) arrived before the read timeout
    ReadTimeout,
    /// Read failed after the connection was established
    ClosedDuringRead,
    ConnectRefused,
    ConnectTimeout,
    Unreachable,
    /// The worker task itself failed
    WorkerFault,
}

impl ProbeDetail {
    pub fn outcome(&self) -> Outcome {
        match self {
            ProbeDetail::Handshake | ProbeDetail::ErrorPacket => Outcome::MatchedProtocol,
            _ => Outcome::Unconfirmed,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProbeDetail::Handshake => "handshake",
            ProbeDetail::ErrorPacket => "error_packet",
            ProbeDetail::Mismatch => "mismatch",
            ProbeDetail::ShortRead => "short_read",
            ProbeDetail::ReadTimeout => "read_timeout",
            ProbeDetail::ClosedDuringRead => "closed_during_read",
            ProbeDetail::ConnectRefused => "connect_refused",
            ProbeDetail::ConnectTimeout => "connect_timeout",
            ProbeDetail::Unreachable => "unreachable",
            ProbeDetail::WorkerFault => "worker_fault",
        }
    }
}

impl fmt::Display for ProbeDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&ProbeFault> for ProbeDetail {
    fn from(fault: &ProbeFault) -> Self {
        match fault {
            ProbeFault::ConnectRefused => ProbeDetail::ConnectRefused,
            ProbeFault::ConnectTimeout => ProbeDetail::ConnectTimeout,
            ProbeFault::Unreachable(_) => ProbeDetail::Unreachable,
            ProbeFault::ReadTimeout => ProbeDetail::ReadTimeout,
            ProbeFault::UnexpectedCloseDuringRead => ProbeDetail::ClosedDuringRead,
        }
    }
}

/// Final result for one address. Built once by the worker and never changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub address: Ipv4Addr,
    pub outcome: Outcome,
    pub detail: ProbeDetail,
    pub elapsed: Duration,
    /// Version string from the greeting, if one was readable
    pub server_version: Option<String>,
}

impl ProbeResult {
    pub fn new(address: Ipv4Addr, detail: ProbeDetail, elapsed: Duration) -> Self {
        Self {
            address,
            outcome: detail.outcome(),
            detail,
            elapsed,
            server_version: None,
        }
    }

    pub fn with_server_version(mut self, version: Option<String>) -> Self {
        self.server_version = version;
        self
    }

    pub fn is_match(&self) -> bool {
        self.outcome.is_match()
    }
}
