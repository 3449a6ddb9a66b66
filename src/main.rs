use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ::time::{format_description::well_known, OffsetDateTime};
use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use lan_miner_scan::ApiError;
use lan_miner_scan::client::{ClientOptions, MinerClient, MinerEndpoint, DEFAULT_CONNECT_TIMEOUT};
use lan_miner_scan::netdetect::{self, ScanTarget};
use lan_miner_scan::ports;
use lan_miner_scan::scanner::{ScanOptions, Scanner, DEFAULT_CONCURRENCY};
use lan_miner_scan::types::{HostReport, ScanReport};

/// lan-miner-scan — find cgminer-compatible miners on the LAN and report their status.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "lan-miner-scan",
    version,
    about = "Find cgminer-compatible miners on the LAN and report their status.",
    long_about = None
)]
struct Cli {
    /// IPv4 addresses or CIDR blocks (e.g. 10.0.0.5 192.168.1.0/24). If none are
    /// given, the locally attached IPv4 networks are scanned.
    #[arg(value_name = "TARGET")]
    targets: Vec<String>,

    /// Additional target; may be repeated.
    #[arg(short = 'm', long = "miner", value_name = "TARGET")]
    miners: Vec<String>,

    /// File with targets, one per line (`#` starts a comment).
    #[arg(long = "targets-file")]
    targets_file: Option<PathBuf>,

    /// Ports to probe: inline list (`4028,4029-4030`) or path to a ports file.
    #[arg(long, default_value = "4028")]
    ports: String,

    /// Max concurrent probe tasks.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Probe connect timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 2000)]
    timeout_ms: u64,

    /// Maximum wait for a miner API reply in milliseconds.
    #[arg(long = "read-timeout-ms", default_value_t = 5000)]
    read_timeout_ms: u64,

    /// Query summary, devices and pools from every host found.
    #[arg(long, default_value_t = false)]
    query: bool,

    /// Write the report as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,

    /// More logging (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    tracing::debug!("parsed CLI arguments: {:?}", cli);

    let ports = ports::resolve_ports(&cli.ports)?;
    let targets = collect_targets(&cli)?;

    println!("lan-miner-scan configuration:");
    println!(
        "  targets      : {}",
        targets.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    );
    println!("  ports        : {:?}", ports);
    println!("  concurrency  : {}", cli.concurrency);
    println!("  timeout_ms   : {}", cli.timeout_ms);
    println!("  query        : {}", cli.query);
    println!(
        "  output       : {}",
        cli.output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<none>".to_string())
    );
    println!(
        "Total addresses: {}",
        targets.iter().map(ScanTarget::len).sum::<u64>()
    );

    // Ctrl-C stops admitting new probes; running ones finish.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, waiting for running probes");
            cancel_ctrlc.cancel();
        }
    });

    let scanner = Scanner::new(ScanOptions {
        ports: ports.clone(),
        concurrency: cli.concurrency,
        timeout: Duration::from_millis(cli.timeout_ms),
    });
    let (live, stats) = scanner.scan_with_cancel(&targets, cancel).await;
    let live_hosts = live.to_sorted_vec();

    println!("\nHosts answering on {:?}:", ports);
    for ip in &live_hosts {
        println!("  ... {ip}");
    }
    println!(
        "Total unique hosts found: {} (probed {}, failed {})",
        live_hosts.len(),
        stats.dispatched,
        stats.failed
    );

    let mut hosts = Vec::new();
    if cli.query && !live_hosts.is_empty() {
        let options = ClientOptions {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: Duration::from_millis(cli.read_timeout_ms),
        };
        hosts = query_hosts(&live_hosts, ports[0], options).await;
        print_results_table(&hosts);
    }

    if let Some(path) = cli.output.as_deref() {
        let report = ScanReport {
            timestamp: now_iso_like(),
            targets: targets.iter().map(ToString::to_string).collect(),
            ports,
            addresses_probed: stats.dispatched,
            live_hosts,
            hosts,
        };
        match write_results_json(path, &report) {
            Ok(()) => println!("Wrote JSON results to {}", path.display()),
            Err(e) => eprintln!("Failed to write JSON to {}: {e:#}", path.display()),
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Gather targets from arguments, `-m` and the targets file, falling back to
/// the local networks. Bad tokens are reported and skipped.
fn collect_targets(cli: &Cli) -> Result<Vec<ScanTarget>> {
    let mut tokens: Vec<String> = cli.targets.iter().chain(&cli.miners).cloned().collect();
    if let Some(path) = cli.targets_file.as_deref() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read targets file: {}", path.display()))?;
        tokens.extend(
            content
                .lines()
                .filter_map(|l| l.split('#').next())
                .flat_map(str::split_whitespace)
                .map(str::to_string),
        );
    }

    if tokens.is_empty() {
        let cidrs = netdetect::detect_local_cidrs().context("failed to detect local networks")?;
        if cidrs.is_empty() {
            bail!("no targets given and no local IPv4 network found");
        }
        println!("Searching for miners on the local network(s)...");
        return Ok(cidrs.into_iter().map(ScanTarget::Block).collect());
    }

    let (targets, errors) = netdetect::parse_targets(tokens.iter().map(String::as_str));
    for e in &errors {
        tracing::warn!("skipping target: {e}");
    }
    if targets.is_empty() {
        bail!("none of the {} target(s) is a valid IPv4 address or CIDR block", tokens.len());
    }
    Ok(targets)
}

async fn query_hosts(ips: &[String], port: u16, options: ClientOptions) -> Vec<HostReport> {
    let mut set = JoinSet::new();
    for ip in ips {
        let client = MinerClient::with_options(MinerEndpoint::new(ip.clone(), port), options);
        set.spawn(query_host(client));
    }
    let mut reports = Vec::with_capacity(ips.len());
    while let Some(res) = set.join_next().await {
        match res {
            Ok(r) => reports.push(r),
            Err(e) => tracing::warn!("query task failed: {e}"),
        }
    }
    reports.sort_by_key(|r| {
        r.ip.parse::<std::net::Ipv4Addr>()
            .map(u32::from)
            .unwrap_or(u32::MAX)
    });
    reports
}

async fn query_host(client: MinerClient) -> HostReport {
    let mut report = HostReport {
        ip: client.endpoint().host.clone(),
        ..HostReport::default()
    };
    // Sequential: each call is its own connection and some miners serve one at a time.
    match client.summary().await {
        Ok(s) => report.summary = Some(s),
        Err(e) => note_failure(&mut report, client.endpoint(), "summary", e),
    }
    match client.devices().await {
        Ok(d) => report.devices = d,
        Err(e) => note_failure(&mut report, client.endpoint(), "devs", e),
    }
    match client.pools().await {
        Ok(p) => report.pools = p,
        Err(e) => note_failure(&mut report, client.endpoint(), "pools", e),
    }
    report
}

fn note_failure(report: &mut HostReport, endpoint: &MinerEndpoint, what: &str, e: ApiError) {
    tracing::warn!(%endpoint, "{what} failed: {e}");
    report.error.get_or_insert_with(|| format!("{what}: {e}"));
}

fn print_results_table(hosts: &[HostReport]) {
    let ip_w = hosts.iter().map(|h| h.ip.len()).max().unwrap_or(0).max("ip".len());
    let (acc_w, rej_w, mhs_w, dev_w) = (8usize, 8usize, 12usize, 4usize);

    println!("\nMiner status: {}", hosts.len());
    println!(
        "{:<ip_w$}  {:>acc_w$}  {:>rej_w$}  {:>mhs_w$}  {:>dev_w$}  {}",
        "ip", "accepted", "rejected", "MHS av", "devs", "pool / error",
    );
    println!(
        "{:-<ip_w$}  {:-<acc_w$}  {:-<rej_w$}  {:-<mhs_w$}  {:-<dev_w$}  {:-<12}",
        "", "", "", "", "", "",
    );
    for h in hosts {
        let (acc, rej, mhs) = match &h.summary {
            Some(s) => (s.accepted.to_string(), s.rejected.to_string(), format!("{:.2}", s.mhs_av)),
            None => ("-".into(), "-".into(), "-".into()),
        };
        let tail = match &h.error {
            Some(e) => e.clone(),
            None => h
                .pools
                .iter()
                .find(|p| p.stratum_active || p.status == "Alive")
                .map(|p| format!("#{} {}", p.pool, p.url))
                .unwrap_or_default(),
        };
        let tail: String = tail.chars().take(60).collect();
        println!(
            "{:<ip_w$}  {:>acc_w$}  {:>rej_w$}  {:>mhs_w$}  {:>dev_w$}  {}",
            h.ip,
            acc,
            rej,
            mhs,
            h.devices.len(),
            tail,
        );
    }
}

fn write_results_json(path: &Path, report: &ScanReport) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}

fn now_iso_like() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
