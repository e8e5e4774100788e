//! Single consumer for probe results

use crate::network::ProbeResult;
use crate::scanner::ScanReport;
use chrono::{DateTime, Utc};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Callback invoked for every result as it arrives
pub type Notifier = Arc<dyn Fn(&ProbeResult) + Send + Sync>;

/// Drains the result channel that every [`ProbeWorker`](crate::scanner::probe::ProbeWorker) feeds.
///
/// Results arrive in completion order. [`ResultAggregator::collect`] only
/// returns once every sender is gone, which is what gives the engine its
/// fan-in point.
pub struct ResultAggregator {
    receiver: mpsc::UnboundedReceiver<ProbeResult>,
    notifier: Option<Notifier>,
    expected: usize,
}

impl ResultAggregator {
    /// Create the channel and its consuming end
    pub fn channel(expected: usize) -> (mpsc::UnboundedSender<ProbeResult>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            sender,
            Self {
                receiver,
                notifier: None,
                expected,
            },
        )
    }

    pub fn with_notifier(mut self, notifier: Option<Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Receive until the channel closes
    pub async fn collect(mut self) -> Vec<ProbeResult> {
        let mut results = Vec::with_capacity(self.expected);

        while let Some(result) = self.receiver.recv().await {
            if result.is_match() {
                log::info!("{} confirmed ({})", result.address, result.detail);
            }
            if let Some(ref notify) = self.notifier {
                if catch_unwind(AssertUnwindSafe(|| notify(&result))).is_err() {
                    log::warn!("{}: result notifier panicked", result.address);
                }
            }
            results.push(result);
        }

        if results.len() != self.expected {
            log::warn!(
                "Collected {} results for {} addresses",
                results.len(),
                self.expected
            );
        }
        results
    }
}

/// Everything the report needs besides the results themselves
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub target: String,
    pub port: u16,
    pub concurrency: usize,
    pub peak_concurrency: usize,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

/// Turn collected results into the final report
pub fn build_report(context: ReportContext, mut results: Vec<ProbeResult>) -> ScanReport {
    results.sort_by_key(|r| r.address);

    ScanReport {
        target: context.target,
        port: context.port,
        concurrency: context.concurrency,
        peak_concurrency: context.peak_concurrency,
        started_at: context.started_at,
        duration: context.duration,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ProbeDetail;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn result(last: u8, detail: ProbeDetail) -> ProbeResult {
        ProbeResult::new(Ipv4Addr::new(10, 0, 0, last), detail, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_panicking_notifier_keeps_collecting() {
        let (tx, aggregator) = ResultAggregator::channel(3);
        let aggregator = aggregator.with_notifier(Some(Arc::new(|r: &ProbeResult| {
            if r.is_match() {
                panic!("notifier failure");
            }
        })));

        tx.send(result(1, ProbeDetail::ConnectRefused)).unwrap();
        tx.send(result(2, ProbeDetail::Handshake)).unwrap();
        tx.send(result(3, ProbeDetail::ReadTimeout)).unwrap();
        drop(tx);

        let results = tokio::spawn(aggregator.collect()).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_collect_waits_for_all_senders() {
        let (tx, aggregator) = ResultAggregator::channel(3);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let aggregator = aggregator.with_notifier(Some(Arc::new(move |_: &ProbeResult| {
            counter.fetch_add(1, Ordering::SeqCst);
        })));

        let collector = tokio::spawn(aggregator.collect());

        let late = tx.clone();
        tx.send(result(3, ProbeDetail::Handshake)).unwrap();
        tx.send(result(1, ProbeDetail::ConnectRefused)).unwrap();
        drop(tx);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!collector.is_finished());

        late.send(result(2, ProbeDetail::ErrorPacket)).unwrap();
        drop(late);

        let results = collector.await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_build_report_sorts_and_counts() {
        let context = ReportContext {
            target: "10.0.0.0/29".to_string(),
            port: 3306,
            concurrency: 4,
            peak_concurrency: 4,
            started_at: Utc::now(),
            duration: Duration::from_millis(40),
        };
        let report = build_report(
            context,
            vec![
                result(5, ProbeDetail::ReadTimeout),
                result(4, ProbeDetail::ErrorPacket),
                result(1, ProbeDetail::Handshake),
            ],
        );

        assert_eq!(report.total_scanned(), 3);
        assert_eq!(report.total_matched(), 2);
        assert_eq!(
            report.matches(),
            vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 4)]
        );
        assert_eq!(report.results[2].address, Ipv4Addr::new(10, 0, 0, 5));
    }
}
