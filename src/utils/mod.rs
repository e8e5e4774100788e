//! Utility modules for the scanner

use std::time::Duration;

/// Logging utilities
pub struct Logger;

impl Logger {
    /// Initialize logger with specified level. `RUST_LOG` still wins for
    /// individual modules.
    pub fn init(level: log::LevelFilter) {
        let _ = env_logger::Builder::new()
            .filter_level(level)
            .parse_default_env()
            .format_timestamp_secs()
            .try_init();
    }

    /// Log scan start
    pub fn log_scan_start(target: &str, hosts: usize, port: u16, concurrency: usize) {
        log::info!(
            "Starting scan of {} ({} hosts) on port {} with {} concurrent probes",
            target,
            hosts,
            port,
            concurrency
        );
    }

    /// Log scan completion
    pub fn log_scan_complete(duration: Duration, matched: usize, total: usize) {
        log::info!(
            "Scan completed in {:.2}s - {}/{} hosts confirmed",
            duration.as_secs_f64(),
            matched,
            total
        );
    }
}

/// File descriptor limit handling. Every in-flight probe holds one socket.
pub struct FdLimit;

impl FdLimit {
    /// Raise the soft and hard limit to `limit`, then report the soft limit in effect
    #[cfg(unix)]
    pub fn adjust(limit: Option<u64>) -> Option<u64> {
        use rlimit::Resource;

        if let Some(limit) = limit {
            match Resource::NOFILE.set(limit, limit) {
                Ok(()) => log::info!("Raised file descriptor limit to {}", limit),
                Err(e) => log::warn!("Failed to set file descriptor limit to {}: {}", limit, e),
            }
        }

        match Resource::NOFILE.get() {
            Ok((soft, _)) => Some(soft),
            Err(e) => {
                log::warn!("Could not read file descriptor limit: {}", e);
                None
            }
        }
    }

    #[cfg(not(unix))]
    pub fn adjust(_limit: Option<u64>) -> Option<u64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_init_twice() {
        Logger::init(log::LevelFilter::Warn);
        Logger::init(log::LevelFilter::Debug);
    }

    #[cfg(unix)]
    #[test]
    fn test_read_fd_limit() {
        let soft = FdLimit::adjust(None);
        assert!(soft.unwrap_or(1) > 0);
    }
}
