//! Main scanning engine implementation

use crate::config::ScanConfig;
use crate::network::{AddressEnumerator, ProbeDetail, ProbeResult};
use crate::scanner::aggregator::{build_report, Notifier, ReportContext, ResultAggregator};
use crate::scanner::limiter::ConcurrencyLimiter;
use crate::scanner::probe::{HandshakeProber, HostProber, ProbeWorker};
use crate::scanner::ScanReport;
use crate::utils::Logger;
use crate::ScanError;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main scanning engine
pub struct ScanEngine {
    config: ScanConfig,
    targets: AddressEnumerator,
    limiter: ConcurrencyLimiter,
    prober: Arc<dyn HostProber>,
    notifier: Option<Notifier>,
}

impl ScanEngine {
    /// Create a new scan engine with the given configuration.
    ///
    /// Fails before anything touches the network if the configuration or
    /// the target range is invalid.
    pub fn new(config: ScanConfig) -> crate::Result<Self> {
        config.validate()?;

        let targets = AddressEnumerator::parse(&config.target)?;
        if targets.len() > config.max_hosts as u64 {
            return Err(ScanError::InvalidRange(format!(
                "{} expands to {} hosts, more than the limit of {}",
                targets,
                targets.len(),
                config.max_hosts
            )));
        }

        let limiter = ConcurrencyLimiter::new(config.concurrency);
        let prober = Arc::new(HandshakeProber::from_config(&config));

        Ok(Self {
            config,
            targets,
            limiter,
            prober,
            notifier: None,
        })
    }

    /// Replace the TCP prober
    pub fn with_prober(mut self, prober: Arc<dyn HostProber>) -> Self {
        self.prober = prober;
        self
    }

    /// Called for every result as it arrives, in completion order
    pub fn with_notifier<F>(mut self, notifier: F) -> Self
    where
        F: Fn(&ProbeResult) + Send + Sync + 'static,
    {
        self.notifier = Some(Arc::new(notifier));
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn targets(&self) -> &AddressEnumerator {
        &self.targets
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Probe every host in the range and build the report.
    ///
    /// One task is spawned per address; all of them are joined before the
    /// result channel is closed, so the report never contains a result
    /// whose worker is still running.
    pub async fn scan(&self) -> crate::Result<ScanReport> {
        let start_time = Instant::now();
        let started_at = chrono::Utc::now();
        let host_count = self.targets.len() as usize;

        Logger::log_scan_start(
            &self.targets.to_string(),
            host_count,
            self.config.port,
            self.limiter.capacity(),
        );

        let (sender, aggregator) = ResultAggregator::channel(host_count);
        let collector = tokio::spawn(aggregator.with_notifier(self.notifier.clone()).collect());

        let mut handles = Vec::with_capacity(host_count);
        for address in self.targets.iter() {
            let worker = ProbeWorker::new(self.limiter.clone(), self.prober.clone(), sender.clone());
            handles.push((address, tokio::spawn(worker.run(address))));
        }

        // Wait for all tasks to complete
        for (address, handle) in handles {
            if let Err(e) = handle.await {
                log::warn!("Probe worker for {} failed: {}", address, e);
                let fallback = ProbeResult::new(address, ProbeDetail::WorkerFault, Duration::ZERO);
                let _ = sender.send(fallback);
            }
        }

        // Last sender gone: the aggregator drains and returns
        drop(sender);
        let results = collector
            .await
            .map_err(|e| ScanError::AggregationError(e.to_string()))?;

        let report = build_report(
            ReportContext {
                target: self.targets.to_string(),
                port: self.config.port,
                concurrency: self.limiter.capacity(),
                peak_concurrency: self.limiter.peak(),
                started_at,
                duration: start_time.elapsed(),
            },
            results,
        );

        Logger::log_scan_complete(report.duration, report.total_matched(), report.total_scanned());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProber(ProbeDetail);

    #[async_trait]
    impl HostProber for FixedProber {
        async fn probe(&self, address: Ipv4Addr) -> ProbeResult {
            ProbeResult::new(address, self.0, Duration::ZERO)
        }
    }

    struct PanickyProber;

    #[async_trait]
    impl HostProber for PanickyProber {
        async fn probe(&self, address: Ipv4Addr) -> ProbeResult {
            if address.octets()[3] % 2 == 0 {
                panic!("simulated worker crash");
            }
            ProbeResult::new(address, ProbeDetail::Handshake, Duration::ZERO)
        }
    }

    #[test]
    fn test_invalid_range_is_fatal() {
        let err = ScanEngine::new(ScanConfig::new("10.0.0.0/40")).err().unwrap();
        assert!(matches!(err, ScanError::InvalidRange(_)));
    }

    #[test]
    fn test_huge_timeouts_are_config_errors() {
        for secs in [1e19, 1e20] {
            let config = ScanConfig::new("127.0.0.1/32").with_read_timeout(secs);
            assert!(matches!(ScanEngine::new(config), Err(ScanError::ConfigError(_))));
        }
    }

    #[test]
    fn test_max_hosts_guard() {
        let config = ScanConfig::new("10.0.0.0/16").with_max_hosts(1024);
        assert!(matches!(ScanEngine::new(config), Err(ScanError::InvalidRange(_))));

        let config = ScanConfig::new("10.0.0.0/22").with_max_hosts(1022);
        assert!(ScanEngine::new(config).is_ok());
    }

    #[tokio::test]
    async fn test_one_result_per_address() {
        let engine = ScanEngine::new(ScanConfig::new("10.1.0.0/26").with_concurrency(5))
            .unwrap()
            .with_prober(Arc::new(FixedProber(ProbeDetail::ConnectRefused)));

        let report = engine.scan().await.unwrap();
        assert_eq!(report.total_scanned(), 62);
        assert_eq!(report.total_matched(), 0);

        let mut addresses: Vec<_> = report.results.iter().map(|r| r.address).collect();
        addresses.dedup();
        assert_eq!(addresses.len(), 62);
        assert_eq!(engine.limiter().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_worker_panic_is_contained() {
        let engine = ScanEngine::new(ScanConfig::new("10.2.0.0/29").with_concurrency(2))
            .unwrap()
            .with_prober(Arc::new(PanickyProber));

        let report = engine.scan().await.unwrap();
        assert_eq!(report.total_scanned(), 6);
        assert_eq!(report.total_matched(), 3);
        assert_eq!(report.breakdown()[&ProbeDetail::WorkerFault], 3);
        assert_eq!(engine.limiter().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_notifier_sees_every_result() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();

        let engine = ScanEngine::new(ScanConfig::new("10.3.0.0/28"))
            .unwrap()
            .with_prober(Arc::new(FixedProber(ProbeDetail::Handshake)))
            .with_notifier(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        let report = engine.scan().await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 14);
        assert_eq!(report.total_matched(), 14);
    }
}
