//! Single-host probe: connect, read the greeting, classify
//!
//! A probe walks through
//! `Idle → Connecting → Connected → AwaitingHandshake → Classified → Done`,
//! or leaves early through `Failed` (connect step) or `TimedOut` (read step).
//! Every path ends in a [`ProbeResult`]; nothing here returns an error.

use crate::config::{ScanConfig, MAX_READ_BUDGET};
use crate::error::ProbeFault;
use crate::network::{
    ProbeDetail, ProbeResult, ERROR_PACKET_MARKER, HANDSHAKE_MARKER, MARKER_OFFSET,
};
use crate::scanner::limiter::ConcurrencyLimiter;
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Probe lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Idle,
    Connecting,
    Connected,
    AwaitingHandshake,
    Classified,
    Failed,
    TimedOut,
    Done,
}

/// Something that can decide whether one address speaks the protocol
#[async_trait]
pub trait HostProber: Send + Sync {
    async fn probe(&self, address: Ipv4Addr) -> ProbeResult;
}

/// Classify the bytes read from a fresh connection.
///
/// Returns `None` when fewer than five bytes are available, since the
/// marker sits at offset 4.
pub fn classify_handshake(bytes: &[u8]) -> Option<ProbeDetail> {
    let marker = *bytes.get(MARKER_OFFSET)?;
    Some(match marker {
        HANDSHAKE_MARKER => ProbeDetail::Handshake,
        ERROR_PACKET_MARKER => ProbeDetail::ErrorPacket,
        _ => ProbeDetail::Mismatch,
    })
}

/// Pull the NUL-terminated server version out of a greeting, if it fits
/// in the bytes that were read.
pub fn parse_server_version(bytes: &[u8]) -> Option<String> {
    if bytes.get(MARKER_OFFSET) != Some(&HANDSHAKE_MARKER) {
        return None;
    }
    let rest = &bytes[MARKER_OFFSET + 1..];
    let end = rest.iter().position(|&b| b == 0)?;
    if end == 0 {
        return None;
    }
    Some(String::from_utf8_lossy(&rest[..end]).into_owned())
}

/// How the handshake read stopped
#[derive(Debug)]
enum ReadEnd {
    Enough,
    Eof,
    TimedOut,
    Failed(ProbeFault),
}

/// TCP connect + greeting inspection
#[derive(Debug, Clone)]
pub struct HandshakeProber {
    port: u16,
    connect_timeout: Duration,
    read_timeout: Duration,
    read_budget: usize,
}

impl HandshakeProber {
    pub fn new(port: u16, connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            port,
            connect_timeout,
            read_timeout,
            read_budget: 64,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(
            config.port,
            config.connect_timeout_duration(),
            config.read_timeout_duration(),
        )
        .with_read_budget(config.read_budget)
    }

    pub fn with_read_budget(mut self, budget: usize) -> Self {
        self.read_budget = budget.clamp(MARKER_OFFSET + 1, MAX_READ_BUDGET);
        self
    }

    /// Read until the marker is covered, the peer closes, or the read
    /// deadline passes. Whatever arrived is kept.
    async fn read_greeting(&self, stream: &mut TcpStream) -> (Vec<u8>, ReadEnd) {
        let mut buf = vec![0u8; self.read_budget];
        let mut filled = 0;
        let started = Instant::now();

        let end = loop {
            if filled > MARKER_OFFSET {
                break ReadEnd::Enough;
            }
            let remaining = self.read_timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                break ReadEnd::TimedOut;
            }
            match timeout(remaining, stream.read(&mut buf[filled..])).await {
                Ok(Ok(0)) => break ReadEnd::Eof,
                Ok(Ok(n)) => filled += n,
                Ok(Err(e)) => break ReadEnd::Failed(ProbeFault::from_read_error(&e)),
                Err(_) => break ReadEnd::TimedOut,
            }
        };

        buf.truncate(filled);
        (buf, end)
    }
}

fn transition(address: Ipv4Addr, from: ProbeState, to: ProbeState) -> ProbeState {
    log::trace!("{}: {:?} -> {:?}", address, from, to);
    to
}

#[async_trait]
impl HostProber for HandshakeProber {
    async fn probe(&self, address: Ipv4Addr) -> ProbeResult {
        let start = Instant::now();
        let target = SocketAddr::new(IpAddr::V4(address), self.port);
        let mut state = transition(address, ProbeState::Idle, ProbeState::Connecting);

        let connected = match timeout(self.connect_timeout, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(ProbeFault::from_connect_error(&e)),
            Err(_) => Err(ProbeFault::ConnectTimeout),
        };

        let mut stream = match connected {
            Ok(stream) => stream,
            Err(fault) => {
                state = transition(address, state, ProbeState::Failed);
                transition(address, state, ProbeState::Done);
                log::debug!("{}: {}", target, fault);
                return ProbeResult::new(address, ProbeDetail::from(&fault), start.elapsed());
            }
        };

        state = transition(address, state, ProbeState::Connected);
        state = transition(address, state, ProbeState::AwaitingHandshake);

        let (bytes, end) = self.read_greeting(&mut stream).await;

        // close before classifying so the socket is gone on every path
        let _ = stream.shutdown().await;
        drop(stream);

        let detail = match (classify_handshake(&bytes), end) {
            (Some(detail), _) => {
                state = transition(address, state, ProbeState::Classified);
                detail
            }
            (None, ReadEnd::TimedOut) => {
                state = transition(address, state, ProbeState::TimedOut);
                ProbeDetail::ReadTimeout
            }
            (None, ReadEnd::Failed(fault)) => {
                state = transition(address, state, ProbeState::Classified);
                ProbeDetail::from(&fault)
            }
            (None, ReadEnd::Eof) | (None, ReadEnd::Enough) => {
                state = transition(address, state, ProbeState::Classified);
                ProbeDetail::ShortRead
            }
        };
        transition(address, state, ProbeState::Done);

        log::debug!("{}: {} after {} bytes", target, detail, bytes.len());
        ProbeResult::new(address, detail, start.elapsed())
            .with_server_version(parse_server_version(&bytes))
    }
}

/// Runs one address through permit acquisition, probing and result emission
pub struct ProbeWorker {
    limiter: ConcurrencyLimiter,
    prober: Arc<dyn HostProber>,
    results: mpsc::UnboundedSender<ProbeResult>,
}

impl ProbeWorker {
    pub fn new(
        limiter: ConcurrencyLimiter,
        prober: Arc<dyn HostProber>,
        results: mpsc::UnboundedSender<ProbeResult>,
    ) -> Self {
        Self {
            limiter,
            prober,
            results,
        }
    }

    /// Probe `address` and send exactly one result. The permit is released
    /// (and the prober has closed its connection) before the result is sent.
    pub async fn run(self, address: Ipv4Addr) {
        let result = match self.limiter.acquire().await {
            Ok(permit) => {
                let result = self.prober.probe(address).await;
                drop(permit);
                result
            }
            Err(e) => {
                log::warn!("{}: {}", address, e);
                ProbeResult::new(address, ProbeDetail::WorkerFault, Duration::ZERO)
            }
        };

        if self.results.send(result).is_err() {
            log::warn!("{}: result channel closed before the probe finished", address);
        }
    }
}
