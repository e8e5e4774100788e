//! Scanner module containing the scanning engine and its parts

pub mod aggregator;
pub mod engine;
pub mod limiter;
pub mod probe;

use crate::network::{ProbeDetail, ProbeResult};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::time::Duration;

pub use aggregator::{Notifier, ResultAggregator};
pub use engine::ScanEngine;
pub use limiter::{ConcurrencyLimiter, ProbePermit};
pub use probe::{HandshakeProber, HostProber, ProbeWorker};

/// Complete scan report, produced after every worker has finished
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Range that was scanned, normalised
    pub target: String,

    /// Port probed on each host
    pub port: u16,

    /// Configured concurrency limit
    pub concurrency: usize,

    /// Highest number of probes that were in flight together
    pub peak_concurrency: usize,

    pub started_at: DateTime<Utc>,

    /// Total scan duration
    pub duration: Duration,

    /// One result per address, ascending
    pub results: Vec<ProbeResult>,
}

impl ScanReport {
    pub fn total_scanned(&self) -> usize {
        self.results.len()
    }

    pub fn total_matched(&self) -> usize {
        self.results.iter().filter(|r| r.is_match()).count()
    }

    /// Confirmed addresses in ascending order
    pub fn matches(&self) -> Vec<Ipv4Addr> {
        self.matched_results().map(|r| r.address).collect()
    }

    pub fn matched_results(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter().filter(|r| r.is_match())
    }

    pub fn unconfirmed_results(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter().filter(|r| !r.is_match())
    }

    /// Number of results per detail
    pub fn breakdown(&self) -> BTreeMap<ProbeDetail, usize> {
        let mut counts = BTreeMap::new();
        for result in &self.results {
            *counts.entry(result.detail).or_insert(0) += 1;
        }
        counts
    }

    /// Hosts per second
    pub fn scan_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.total_scanned() as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(details: &[ProbeDetail]) -> ScanReport {
        ScanReport {
            target: "192.168.0.0/24".to_string(),
            port: 3306,
            concurrency: 50,
            peak_concurrency: 3,
            started_at: Utc::now(),
            duration: Duration::from_secs(2),
            results: details
                .iter()
                .enumerate()
                .map(|(i, d)| {
                    ProbeResult::new(Ipv4Addr::new(192, 168, 0, i as u8 + 1), *d, Duration::ZERO)
                })
                .collect(),
        }
    }

    #[test]
    fn test_breakdown() {
        let report = report(&[
            ProbeDetail::ConnectRefused,
            ProbeDetail::Handshake,
            ProbeDetail::ConnectRefused,
            ProbeDetail::ReadTimeout,
        ]);

        let breakdown = report.breakdown();
        assert_eq!(breakdown[&ProbeDetail::ConnectRefused], 2);
        assert_eq!(breakdown[&ProbeDetail::Handshake], 1);
        assert_eq!(breakdown.get(&ProbeDetail::ErrorPacket), None);
        assert_eq!(report.unconfirmed_results().count(), 3);
        assert_eq!(report.scan_rate(), 2.0);
    }

    #[test]
    fn test_empty_report() {
        let report = report(&[]);
        assert_eq!(report.total_scanned(), 0);
        assert_eq!(report.total_matched(), 0);
        assert!(report.matches().is_empty());
    }
}
