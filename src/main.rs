use clap::{Arg, ArgAction, ArgMatches, Command};
use std::process;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use sqlsweep::{
    config::ScanConfig,
    output::{OutputConfig, OutputFormat, OutputManager},
    scanner::ScanEngine,
    utils::{FdLimit, Logger},
};

fn print_banner() {
    println!("{}", "  ___  __ _| |_____      _____  ___ _ __  ".truecolor(0, 117, 143).bold());
    println!("{}", " / __|/ _` | / __\\ \\ /\\ / / _ \\/ _ \\ '_ \\ ".truecolor(0, 117, 143).bold());
    println!("{}", " \\__ \\ (_| | \\__ \\\\ V  V /  __/  __/ |_) |".truecolor(0, 117, 143).bold());
    println!("{}", " |___/\\__, |_|___/ \\_/\\_/ \\___|\\___| .__/ ".truecolor(0, 117, 143).bold());
    println!("{}", "         |_|                       |_|    ".truecolor(0, 117, 143).bold());
    println!();
}

fn build_cli() -> Command {
    Command::new("sqlsweep")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Find hosts in an IPv4 range that answer with a genuine MySQL handshake")
        .arg(
            Arg::new("target")
                .value_name("TARGET")
                .help("Network to scan in CIDR notation (default: 127.0.0.1/24)")
                .index(1),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Port to probe on every host (default: 3306)")
                .value_parser(clap::value_parser!(u16).range(1..)),
        )
        .arg(
            Arg::new("connect-timeout")
                .long("connect-timeout")
                .value_name("SECS")
                .help("TCP connect timeout in seconds (default: 4.0)")
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new("read-timeout")
                .long("read-timeout")
                .value_name("SECS")
                .help("Time to wait for the server greeting in seconds (default: 3.0)")
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new("concurrency")
                .short('c')
                .long("concurrency")
                .value_name("COUNT")
                .help("Maximum number of probes in flight (default: 50)")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("max-hosts")
                .long("max-hosts")
                .value_name("COUNT")
                .help("Refuse ranges that expand to more hosts than this (default: 65536)")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Load settings from a TOML file instead of ~/.sqlsweep.toml"),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_name("FORMAT")
                .help("Report format")
                .value_parser(["text", "json", "greppable"])
                .default_value("text"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Write the report to FILE instead of stdout"),
        )
        .arg(
            Arg::new("ulimit")
                .short('u')
                .long("ulimit")
                .value_name("LIMIT")
                .help("Raise the open file limit to this value before scanning")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("List unconfirmed hosts and log scan progress")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .help("Disable colored output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-banner")
                .long("no-banner")
                .help("Hide the banner")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-progress")
                .long("no-progress")
                .help("Hide the progress bar")
                .action(ArgAction::SetTrue),
        )
}

/// Defaults, then the config file, then explicit flags
fn resolve_config(matches: &ArgMatches) -> anyhow::Result<ScanConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => ScanConfig::from_toml_file(path)?,
        None => ScanConfig::load_default_config(),
    };

    if let Some(target) = matches.get_one::<String>("target") {
        config.target = target.clone();
    }
    if let Some(&port) = matches.get_one::<u16>("port") {
        config.port = port;
    }
    if let Some(&secs) = matches.get_one::<f64>("connect-timeout") {
        config.connect_timeout = secs;
    }
    if let Some(&secs) = matches.get_one::<f64>("read-timeout") {
        config.read_timeout = secs;
    }
    if let Some(&concurrency) = matches.get_one::<usize>("concurrency") {
        config.concurrency = concurrency;
    }
    if let Some(&max_hosts) = matches.get_one::<usize>("max-hosts") {
        config.max_hosts = max_hosts;
    }

    Ok(config)
}

fn progress_bar(total: u64, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} hosts ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▓░");
    bar.set_style(style);
    bar
}

async fn run(matches: ArgMatches) -> anyhow::Result<()> {
    let verbose = matches.get_flag("verbose");
    Logger::init(if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    });

    let no_color = matches.get_flag("no-color");
    if no_color {
        colored::control::set_override(false);
    }

    let format: OutputFormat = matches
        .get_one::<String>("format")
        .map(|s| s.parse::<OutputFormat>())
        .transpose()
        .map_err(|e: String| anyhow::anyhow!(e))?
        .unwrap_or(OutputFormat::Text);
    let output_file = matches.get_one::<String>("output").cloned();

    // keep stdout machine-readable when a structured report goes there
    let quiet_stdout = format != OutputFormat::Text && output_file.is_none();

    if !matches.get_flag("no-banner") && !quiet_stdout {
        print_banner();
    }

    let config = resolve_config(&matches)?;

    if let Some(soft) = FdLimit::adjust(matches.get_one::<u64>("ulimit").copied()) {
        if (config.concurrency as u64) + 32 > soft {
            eprintln!(
                "{} concurrency {} is close to the open file limit {}; consider --ulimit",
                "[!]".bright_yellow(),
                config.concurrency,
                soft
            );
        }
    }

    let output = OutputManager::new(OutputConfig {
        format,
        file: output_file,
        colored: !no_color,
        verbose,
    });

    let engine = ScanEngine::new(config)?;
    let total = engine.targets().len();

    if !quiet_stdout {
        println!(
            "{} {} ({} hosts) on port {}",
            "[~] Scanning".bright_blue(),
            engine.targets().to_string().bright_cyan(),
            total,
            engine.config().port
        );
        println!(
            "{} concurrency {}, timeouts connect {}s / read {}s\n",
            "[~]".bright_blue(),
            engine.config().concurrency,
            engine.config().connect_timeout,
            engine.config().read_timeout
        );
    }

    let bar = progress_bar(total, matches.get_flag("no-progress"));
    let live_bar = bar.clone();
    let live_lines = OutputManager::new(OutputConfig {
        colored: !no_color,
        ..OutputConfig::default()
    });

    let engine = engine.with_notifier(move |result| {
        live_bar.inc(1);
        if result.is_match() {
            let line = live_lines.format_match(result);
            if live_bar.is_hidden() {
                eprintln!("{}", line);
            } else {
                live_bar.println(line);
            }
        }
    });

    let report = engine.scan().await?;
    bar.finish_and_clear();

    output.write_report(&report)?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();

    if let Err(e) = run(matches).await {
        eprintln!("{} {}", "[!] ERROR:".bright_red(), e);
        process::exit(1);
    }
}
