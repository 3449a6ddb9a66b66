use std::collections::HashSet;
use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::net::TcpSocket;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ScanError, ScanResult};
use crate::netdetect::{expand, ScanTarget};

/// Boxed future returned by a prober closure.
pub type ProbeFuture = Pin<Box<dyn Future<Output = ScanResult<Vec<u16>>> + Send>>;

/// cgminer/sgminer API port.
pub const DEFAULT_PORT: u16 = 4028;
/// Keeps large blocks from exhausting file descriptors.
pub const DEFAULT_CONCURRENCY: usize = 32_768;
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Debug)]
pub struct ScanOptions {
    pub ports: Vec<u16>,
    /// Maximum number of probe tasks in flight. Values below 1 are raised to 1.
    pub concurrency: usize,
    /// Per connect attempt.
    pub timeout: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            ports: vec![DEFAULT_PORT],
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Addresses (as strings) that accepted a connection on at least one port.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LiveHostSet(HashSet<String>);

impl LiveHostSet {
    pub fn contains(&self, ip: &str) -> bool {
        self.0.contains(ip)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    /// Entries ordered by numeric address, for stable output.
    pub fn to_sorted_vec(&self) -> Vec<String> {
        let mut v: Vec<String> = self.0.iter().cloned().collect();
        v.sort_by_key(|s| s.parse::<Ipv4Addr>().map(u32::from).unwrap_or(u32::MAX));
        v
    }
}

impl<S: Into<String>> FromIterator<S> for LiveHostSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl IntoIterator for LiveHostSet {
    type Item = String;
    type IntoIter = std::collections::hash_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Counters for one scan run.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub dispatched: u64,
    pub live: u64,
    pub failed: u64,
}

enum Outcome {
    Live,
    Silent,
    Failed,
}

impl ScanStats {
    fn record(&mut self, res: Result<Outcome, JoinError>) {
        match res {
            Ok(Outcome::Live) => self.live += 1,
            Ok(Outcome::Silent) => {}
            Ok(Outcome::Failed) => self.failed += 1,
            Err(e) => {
                warn!(error = %e, "probe task aborted");
                self.failed += 1;
            }
        }
    }
}

/// Try a timeout-bounded TCP connect to each port of `addr`.
///
/// Returns the ports that accepted. Refusals and timeouts simply leave the port
/// out. Failing to create a socket skips that port; it is reported as
/// [`ScanError::Resource`] only when no other port accepted. Accepted
/// connections are closed straight away without exchanging data.
pub async fn probe_host(addr: Ipv4Addr, ports: &[u16], timeout: Duration) -> ScanResult<Vec<u16>> {
    connect_ports(addr, ports, timeout, TcpSocket::new_v4).await
}

async fn connect_ports<S>(
    addr: Ipv4Addr,
    ports: &[u16],
    timeout: Duration,
    mut new_socket: S,
) -> ScanResult<Vec<u16>>
where
    S: FnMut() -> io::Result<TcpSocket>,
{
    let mut open = Vec::new();
    let mut resource_err = None;
    for &port in ports {
        let target = SocketAddr::from((addr, port));
        let socket = match new_socket() {
            Ok(s) => s,
            Err(source) => {
                debug!(%target, error = %source, "socket creation failed");
                resource_err.get_or_insert(ScanError::Resource { addr, source });
                continue;
            }
        };
        let start = Instant::now();
        match time::timeout(timeout, socket.connect(target)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                debug!(%target, latency_ms = start.elapsed().as_millis() as u64, "port open");
                open.push(port);
            }
            Ok(Err(e)) => debug!(%target, error = %e, "connect failed"),
            Err(_) => debug!(%target, "connect timed out"),
        }
    }
    match resource_err {
        Some(e) if open.is_empty() => Err(e),
        _ => Ok(open),
    }
}

/// Fans probes out over every address of a target list.
///
/// Each call to a `scan*` method owns its own live-host set and admission
/// semaphore; one `Scanner` may run several scans concurrently.
#[derive(Clone, Debug, Default)]
pub struct Scanner {
    options: ScanOptions,
}

impl Scanner {
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Probe every address of `targets` and return the hosts that answered.
    pub async fn scan(&self, targets: &[ScanTarget]) -> LiveHostSet {
        self.scan_with_stats(targets).await.0
    }

    pub async fn scan_with_stats(&self, targets: &[ScanTarget]) -> (LiveHostSet, ScanStats) {
        self.run(targets, CancellationToken::new(), self.tcp_prober())
            .await
    }

    /// Like [`Scanner::scan`], but stops admitting new probes once `cancel`
    /// fires. Probes already running finish normally.
    pub async fn scan_with_cancel(
        &self,
        targets: &[ScanTarget],
        cancel: CancellationToken,
    ) -> (LiveHostSet, ScanStats) {
        self.run(targets, cancel, self.tcp_prober()).await
    }

    /// Run the scan with a custom prober in place of the TCP connect probe.
    pub async fn scan_with<F, Fut>(&self, targets: &[ScanTarget], prober: F) -> LiveHostSet
    where
        F: FnMut(Ipv4Addr) -> Fut,
        Fut: Future<Output = ScanResult<Vec<u16>>> + Send + 'static,
    {
        self.run(targets, CancellationToken::new(), prober).await.0
    }

    fn tcp_prober(&self) -> impl FnMut(Ipv4Addr) -> ProbeFuture {
        let ports: Arc<[u16]> = self.options.ports.clone().into();
        let timeout = self.options.timeout;
        move |ip| -> ProbeFuture {
            let ports = ports.clone();
            Box::pin(async move { probe_host(ip, &ports, timeout).await })
        }
    }

    async fn run<F, Fut>(
        &self,
        targets: &[ScanTarget],
        cancel: CancellationToken,
        mut prober: F,
    ) -> (LiveHostSet, ScanStats)
    where
        F: FnMut(Ipv4Addr) -> Fut,
        Fut: Future<Output = ScanResult<Vec<u16>>> + Send + 'static,
    {
        let started = Instant::now();
        let live = Arc::new(Mutex::new(HashSet::<String>::new()));
        let limit = self.options.concurrency.clamp(1, Semaphore::MAX_PERMITS);
        let sem = Arc::new(Semaphore::new(limit));
        let mut set = JoinSet::new();
        let mut stats = ScanStats::default();

        'targets: for target in targets {
            debug!(%target, addresses = target.len(), "expanding target");
            for ip in expand(target) {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break 'targets,
                    permit = sem.clone().acquire_owned() => match permit {
                        Ok(p) => p,
                        Err(_) => break 'targets,
                    },
                };

                // Reap finished tasks so a large block does not pile up results.
                while let Some(res) = set.try_join_next() {
                    stats.record(res);
                }

                let live = live.clone();
                let probe = prober(ip);
                stats.dispatched += 1;
                set.spawn(async move {
                    let _permit = permit; // held until the probe and its sockets are gone
                    match probe.await {
                        Ok(open) if !open.is_empty() => {
                            debug!(%ip, ?open, "host answered");
                            if live.lock().await.insert(ip.to_string()) {
                                Outcome::Live
                            } else {
                                Outcome::Silent
                            }
                        }
                        Ok(_) => Outcome::Silent,
                        Err(e) => {
                            warn!(%ip, error = %e, "probe failed");
                            Outcome::Failed
                        }
                    }
                });
            }
        }

        while let Some(res) = set.join_next().await {
            stats.record(res);
        }

        let hosts = std::mem::take(&mut *live.lock().await);
        info!(
            dispatched = stats.dispatched,
            live = stats.live,
            failed = stats.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scan complete"
        );
        (LiveHostSet(hosts), stats)
    }
}
