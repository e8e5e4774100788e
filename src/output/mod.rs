//! Output formatting and management

use crate::network::ProbeResult;
use crate::scanner::ScanReport;
use chrono::{DateTime, Utc};
use colored::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;

/// Output format options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
    Greppable,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "greppable" | "grep" => Ok(OutputFormat::Greppable),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub file: Option<String>,
    pub colored: bool,
    /// Also list hosts that were not confirmed
    pub verbose: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            file: None,
            colored: true,
            verbose: false,
        }
    }
}

/// Main output manager
pub struct OutputManager {
    config: OutputConfig,
}

impl OutputManager {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Write the report to the configured file, or stdout
    pub fn write_report(&self, report: &ScanReport) -> crate::Result<()> {
        let output = self.render(report)?;

        match &self.config.file {
            Some(filename) => {
                let mut file = File::create(filename)?;
                file.write_all(output.as_bytes())?;
                log::info!("Report written to {}", filename);
            }
            None => {
                print!("{}", output);
            }
        }

        Ok(())
    }

    /// Render the report in the configured format
    pub fn render(&self, report: &ScanReport) -> crate::Result<String> {
        Ok(match self.config.format {
            OutputFormat::Text => self.format_text(report),
            OutputFormat::Json => self.format_json(report)?,
            OutputFormat::Greppable => self.format_greppable(report),
        })
    }

    /// One live line for a confirmed host
    pub fn format_match(&self, result: &ProbeResult) -> String {
        let line = match (&result.detail, &result.server_version) {
            (crate::network::ProbeDetail::ErrorPacket, _) => {
                format!("[!] MySQL service (error packet): {}", result.address)
            }
            (_, Some(version)) => format!("[+] MySQL service: {} ({})", result.address, version),
            (_, None) => format!("[+] MySQL service: {}", result.address),
        };

        let color = if result.detail == crate::network::ProbeDetail::ErrorPacket {
            "yellow"
        } else {
            "green"
        };
        self.colorize(&line, color)
    }

    /// Format results as text
    fn format_text(&self, report: &ScanReport) -> String {
        let mut output = String::new();

        output.push('\n');
        output.push_str(&self.colorize("Scan complete!\n", "blue"));
        output.push_str(&format!(
            "Target: {} port {} ({:.2}s, peak {} of {} concurrent probes)\n",
            report.target,
            report.port,
            report.duration.as_secs_f64(),
            report.peak_concurrency,
            report.concurrency
        ));
        output.push_str(&format!("Total scanned: {}\n", report.total_scanned()));
        output.push_str(&format!(
            "MySQL confirmed: {}\n",
            self.colorize(&report.total_matched().to_string(), "green")
        ));

        if report.total_matched() > 0 {
            output.push_str("Matched hosts:\n");
            for result in report.matched_results() {
                let suffix = match (&result.server_version, result.detail) {
                    (Some(version), _) => format!(" ({})", version),
                    (None, crate::network::ProbeDetail::ErrorPacket) => " (error packet)".to_string(),
                    _ => String::new(),
                };
                output.push_str(&format!(" - {}{}\n", result.address, suffix));
            }
        }

        if self.config.verbose {
            let breakdown = report.breakdown();
            if !breakdown.is_empty() {
                output.push_str("Breakdown:\n");
                for (detail, count) in breakdown {
                    output.push_str(&format!("  {:<20} {}\n", detail.name(), count));
                }
            }

            let unconfirmed: Vec<_> = report.unconfirmed_results().collect();
            if !unconfirmed.is_empty() {
                output.push_str(&self.colorize("Unconfirmed hosts:\n", "gray"));
                for result in unconfirmed {
                    let line = format!(
                        "  {:<15} {:<20} {}ms\n",
                        result.address.to_string(),
                        result.detail.name(),
                        result.elapsed.as_millis()
                    );
                    output.push_str(&self.colorize(&line, "gray"));
                }
            }
        }

        output
    }

    /// Format results as JSON
    fn format_json(&self, report: &ScanReport) -> crate::Result<String> {
        let json_report = JsonScanReport::from(report);
        let mut json = serde_json::to_string_pretty(&json_report)?;
        json.push('\n');
        Ok(json)
    }

    /// One `ip:port` line per confirmed host
    fn format_greppable(&self, report: &ScanReport) -> String {
        report
            .matches()
            .iter()
            .map(|ip| format!("{}:{}\n", ip, report.port))
            .collect()
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.config.colored {
            return text.to_string();
        }

        match color {
            "green" => text.bright_green().to_string(),
            "yellow" => text.bright_yellow().to_string(),
            "blue" => text.bright_blue().bold().to_string(),
            "gray" => text.truecolor(128, 128, 128).to_string(),
            _ => text.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonScanReport {
    target: String,
    port: u16,
    scan_time: DateTime<Utc>,
    duration_seconds: f64,
    concurrency: usize,
    peak_concurrency: usize,
    scanned: usize,
    matched: usize,
    matches: Vec<String>,
    breakdown: BTreeMap<String, usize>,
    results: Vec<JsonProbeResult>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonProbeResult {
    address: String,
    matched: bool,
    detail: String,
    elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_version: Option<String>,
}

impl From<&ScanReport> for JsonScanReport {
    fn from(report: &ScanReport) -> Self {
        Self {
            target: report.target.clone(),
            port: report.port,
            scan_time: report.started_at,
            duration_seconds: report.duration.as_secs_f64(),
            concurrency: report.concurrency,
            peak_concurrency: report.peak_concurrency,
            scanned: report.total_scanned(),
            matched: report.total_matched(),
            matches: report.matches().iter().map(|ip| ip.to_string()).collect(),
            breakdown: report
                .breakdown()
                .into_iter()
                .map(|(detail, count)| (detail.name().to_string(), count))
                .collect(),
            results: report.results.iter().map(JsonProbeResult::from).collect(),
        }
    }
}

impl From<&ProbeResult> for JsonProbeResult {
    fn from(result: &ProbeResult) -> Self {
        Self {
            address: result.address.to_string(),
            matched: result.is_match(),
            detail: result.detail.name().to_string(),
            elapsed_ms: result.elapsed.as_millis() as u64,
            server_version: result.server_version.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ProbeDetail;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn sample_report() -> ScanReport {
        ScanReport {
            target: "10.0.0.0/30".to_string(),
            port: 3306,
            concurrency: 50,
            peak_concurrency: 2,
            started_at: Utc::now(),
            duration: Duration::from_millis(1500),
            results: vec![
                ProbeResult::new(Ipv4Addr::new(10, 0, 0, 1), ProbeDetail::Handshake, Duration::from_millis(3))
                    .with_server_version(Some("8.0.36".to_string())),
                ProbeResult::new(Ipv4Addr::new(10, 0, 0, 2), ProbeDetail::ConnectRefused, Duration::from_millis(1)),
            ],
        }
    }

    fn manager(format: OutputFormat, verbose: bool) -> OutputManager {
        OutputManager::new(OutputConfig {
            format,
            file: None,
            colored: false,
            verbose,
        })
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("grep".parse::<OutputFormat>(), Ok(OutputFormat::Greppable));
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_text_summary() {
        let text = manager(OutputFormat::Text, false).render(&sample_report()).unwrap();
        assert!(text.contains("Total scanned: 2"));
        assert!(text.contains("MySQL confirmed: 1"));
        assert!(text.contains(" - 10.0.0.1 (8.0.36)"));
        assert!(!text.contains("10.0.0.2"));
    }

    #[test]
    fn test_verbose_text_lists_unconfirmed() {
        let text = manager(OutputFormat::Text, true).render(&sample_report()).unwrap();
        assert!(text.contains("10.0.0.2"));
        assert!(text.contains("connect_refused"));
    }

    #[test]
    fn test_json_report() {
        let json = manager(OutputFormat::Json, false).render(&sample_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["scanned"], 2);
        assert_eq!(value["matched"], 1);
        assert_eq!(value["matches"][0], "10.0.0.1");
        assert_eq!(value["breakdown"]["handshake"], 1);
        assert_eq!(value["results"][0]["server_version"], "8.0.36");
        assert!(value["results"][1].get("server_version").is_none());
    }

    #[test]
    fn test_greppable() {
        let out = manager(OutputFormat::Greppable, false).render(&sample_report()).unwrap();
        assert_eq!(out, "10.0.0.1:3306\n");
    }

    #[test]
    fn test_match_line() {
        let report = sample_report();
        let line = manager(OutputFormat::Text, false).format_match(&report.results[0]);
        assert_eq!(line, "[+] MySQL service: 10.0.0.1 (8.0.36)");

        let blocked = ProbeResult::new(Ipv4Addr::new(10, 0, 0, 9), ProbeDetail::ErrorPacket, Duration::ZERO);
        let line = manager(OutputFormat::Text, false).format_match(&blocked);
        assert_eq!(line, "[!] MySQL service (error packet): 10.0.0.9");
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let manager = OutputManager::new(OutputConfig {
            format: OutputFormat::Json,
            file: Some(path.to_string_lossy().into_owned()),
            colored: false,
            verbose: false,
        });

        manager.write_report(&sample_report()).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"matched\": 1"));
    }
}
