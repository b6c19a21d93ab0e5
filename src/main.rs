use clap::{Arg, ArgMatches, Command};
use colored::*;
use std::process;
use std::time::Instant;

use portprobe::{
    config::{self, ScanConfig, ScanMode},
    output::ReportPrinter,
    CancellationToken, PortRange, ScanEngine, ScanError,
};

const EXIT_FAILURE: i32 = 1;
const EXIT_CONFIG: i32 = 2;

// Ulimit adjustment for Unix systems
#[cfg(unix)]
fn adjust_ulimit_size(ulimit: Option<u64>) -> u64 {
    use rlimit::Resource;

    if let Some(limit) = ulimit {
        if Resource::NOFILE.set(limit, limit).is_ok() {
            eprintln!("{} {}",
                "[~] Automatically increasing ulimit value to".bright_blue(),
                limit.to_string().bright_cyan().bold());
        } else {
            eprintln!("{}", "[!] ERROR: Failed to set ulimit value.".bright_red());
        }
    }

    match Resource::NOFILE.get() {
        Ok((soft, _)) => soft,
        Err(_) => {
            eprintln!("{}", "[!] WARNING: Could not get file descriptor limit".bright_yellow());
            65535
        }
    }
}

#[cfg(not(unix))]
fn adjust_ulimit_size(_ulimit: Option<u64>) -> u64 {
    65535
}

fn build_cli() -> Command {
    Command::new("portprobe")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Bounded, cancellable TCP connect port scanner")
        .arg(
            Arg::new("target")
                .value_name("TARGET")
                .help("Host name or IP address to scan [default: scanme.nmap.org]")
                .index(1),
        )
        .arg(
            Arg::new("ports")
                .short('p')
                .long("ports")
                .value_name("RANGE")
                .help("Inclusive port range, e.g. 20-1024 or 443 [default: 20-1024]"),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .value_name("MS")
                .help("Per-connection timeout in milliseconds [default: 1000]")
                .allow_negative_numbers(true)
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("concurrency")
                .short('c')
                .long("concurrency")
                .value_name("COUNT")
                .help("Maximum simultaneous connection attempts [default: 100]")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("sequential")
                .long("sequential")
                .help("Attempt one port at a time in ascending order")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file [default: ~/.portprobe.toml if present]"),
        )
        .arg(
            Arg::new("ulimit")
                .short('u')
                .long("ulimit")
                .value_name("LIMIT")
                .help("Automatically increase ulimit to this value")
                .value_parser(clap::value_parser!(u64)),
        )
}

/// Merge the config file (if any) with explicit command line flags
fn resolve_config(matches: &ArgMatches) -> portprobe::Result<ScanConfig> {
    let mut scan_config = match matches.get_one::<String>("config") {
        Some(path) => ScanConfig::from_toml_file(path)?,
        None => ScanConfig::load_default_config(),
    };

    if let Some(target) = matches.get_one::<String>("target") {
        scan_config.target = target.clone();
    }
    if let Some(ports) = matches.get_one::<String>("ports") {
        scan_config.ports = ports.parse::<PortRange>()?;
    }
    if let Some(&millis) = matches.get_one::<i64>("timeout") {
        scan_config = scan_config.with_timeout(config::timeout_from_millis(millis)?);
    }
    if let Some(&concurrency) = matches.get_one::<usize>("concurrency") {
        scan_config.concurrency = concurrency;
    }
    if matches.get_flag("sequential") {
        scan_config.mode = ScanMode::Sequential;
    }

    scan_config.validate()?;
    Ok(scan_config)
}

async fn run(matches: &ArgMatches) -> anyhow::Result<()> {
    let scan_config = resolve_config(matches)?;

    let fd_limit = adjust_ulimit_size(matches.get_one::<u64>("ulimit").copied());
    let workers = scan_config.effective_concurrency() as u64;
    if workers > fd_limit {
        log::warn!("Concurrency {} exceeds the open file limit {}", workers, fd_limit);
        eprintln!("{} {} {}",
            "[!] Concurrency".bright_yellow(),
            workers.to_string().bright_cyan(),
            "exceeds the file descriptor limit; consider --ulimit".bright_yellow());
    }

    let engine = ScanEngine::new(scan_config)?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "[!] Interrupted, waiting for in-flight attempts".bright_yellow());
            interrupt.cancel();
        }
    });

    eprintln!("{} {} {} {}",
        "[~] Scanning".bright_blue(),
        engine.config().target.bright_yellow(),
        "ports".bright_blue(),
        engine.config().ports.to_string().bright_cyan());

    let start_time = Instant::now();
    let mut stream = engine.scan_with_cancel(cancel).await?;
    ReportPrinter::stdout().drain(&mut stream).await?;

    let stats = stream.stats();
    let status = if stats.cancelled { "[!] Scan cancelled:".bright_yellow() } else { "[✓] Scan complete:".bright_green() };
    eprintln!("{} {} open, {} attempted in {:.2}s",
        status,
        stats.open.to_string().bright_cyan().bold(),
        stats.attempted,
        start_time.elapsed().as_secs_f64());

    Ok(())
}

fn exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<ScanError>() {
        Some(e) if e.is_configuration_error() => EXIT_CONFIG,
        _ => EXIT_FAILURE,
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let matches = build_cli().get_matches();

    if let Err(e) = run(&matches).await {
        eprintln!("{} {}", "[!] ERROR:".bright_red(), e);
        process::exit(exit_code(&e));
    }
}
