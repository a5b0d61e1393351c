//! Connectivity checks between the discovered instances.
//!
//! Every address is used in turn as a source: the prober logs into it over
//! ssh and pings the anchor address plus every other discovered address.
//! Sources holding only a fixed address are reached from the DHCP
//! namespace of their network.

use std::io;

use async_trait::async_trait;
use log::{debug, error, info};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::cloud::Networking;
use crate::config::ProbeConfig;
use crate::error::{Error, Result};
use crate::types::{AddressMap, IpType};

pub mod expect;
pub mod pty;
pub mod session;

use expect::Expect;
pub use pty::{ssh_command, PtySpawner};
use session::drive;
pub use session::{PingResult, ProbeSession, SessionFailure, State};

/// Interactive byte stream to a remote shell.
#[async_trait]
pub trait ShellTransport: AsyncRead + AsyncWrite + Unpin + Send {
    /// Release the underlying process once the session is over.
    async fn terminate(&mut self) {}
}

#[async_trait]
impl ShellTransport for tokio::io::DuplexStream {}

/// Starts the shell client for one source.
pub trait Spawner: Send + Sync {
    type Transport: ShellTransport;

    fn spawn(&self, argv: &[String]) -> io::Result<Self::Transport>;
}

/// Packet loss read off a ping summary line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketLoss {
    Percent(u32),
    /// No summary line could be read.
    Indeterminate,
}

impl PacketLoss {
    /// Parse the number in front of `% packet loss`.  Fractional readings
    /// are rounded up so that any loss at all stays a failure.
    pub fn from_match(percent: Option<&str>) -> Self {
        match percent.and_then(|p| p.parse::<f64>().ok()) {
            Some(p) if p.is_finite() && p >= 0.0 => PacketLoss::Percent(p.ceil() as u32),
            _ => PacketLoss::Indeterminate,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == PacketLoss::Percent(0)
    }

    /// The percentage, or -1 when indeterminate.
    pub fn percent(&self) -> i32 {
        match self {
            PacketLoss::Percent(p) => *p as i32,
            PacketLoss::Indeterminate => -1,
        }
    }
}

/// Anchor first, then every discovered address except `source`.
pub fn destinations(ips: &AddressMap, source: &str, anchor: &str) -> Vec<String> {
    std::iter::once(anchor.to_string())
        .chain(
            ips.keys()
                .filter(|address| address.as_str() != source)
                .cloned(),
        )
        .collect()
}

pub fn dhcp_namespace(network_id: &str) -> String {
    format!("qdhcp-{}", network_id)
}

/// What happened when probing from one source.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source: String,
    pub ip_type: IpType,
    pub results: Vec<PingResult>,
    pub failure: Option<SessionFailure>,
}

impl SourceReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.results.iter().all(PingResult::is_success)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConnectivityReport {
    pub sources: Vec<SourceReport>,
}

impl ConnectivityReport {
    pub fn failed_sessions(&self) -> usize {
        self.sources.iter().filter(|s| s.failure.is_some()).count()
    }

    pub fn failed_pings(&self) -> usize {
        self.sources
            .iter()
            .flat_map(|s| s.results.iter())
            .filter(|r| !r.is_success())
            .count()
    }

    pub fn total_pings(&self) -> usize {
        self.sources.iter().map(|s| s.results.len()).sum()
    }

    pub fn is_success(&self) -> bool {
        self.sources.iter().all(SourceReport::is_success)
    }
}

/// Probe every address in `ips`, one source at a time.
///
/// Session problems are logged and recorded per source; only a failed
/// network lookup aborts the run.
pub async fn check_connectivity<S: Spawner>(
    networking: &dyn Networking,
    ips: &AddressMap,
    net_name: &str,
    settings: &ProbeConfig,
    spawner: &S,
) -> Result<ConnectivityReport> {
    let namespace = if ips.values().any(|t| *t == IpType::Fixed) {
        let network_id = networking
            .network_id_by_name(net_name)
            .await?
            .ok_or_else(|| Error::NetworkNotFound(net_name.to_string()))?;
        Some(dhcp_namespace(&network_id))
    } else {
        None
    };

    let mut report = ConnectivityReport::default();
    for (source, ip_type) in ips {
        let namespace = match ip_type {
            IpType::Fixed => namespace.as_deref(),
            IpType::Floating => None,
        };
        let dests = destinations(ips, source, &settings.anchor_address);
        let (results, failure) = probe_source(source, &dests, namespace, settings, spawner).await;
        if let Some(failure) = &failure {
            error!("Failed to ssh to instance with ip: {} ({})", source, failure);
        }
        report.sources.push(SourceReport {
            source: source.clone(),
            ip_type: *ip_type,
            results,
            failure,
        });
    }

    info!(
        "Checked {} sources: {} session failures, {}/{} pings failed",
        report.sources.len(),
        report.failed_sessions(),
        report.failed_pings(),
        report.total_pings()
    );
    Ok(report)
}

async fn probe_source<S: Spawner>(
    source: &str,
    destinations: &[String],
    namespace: Option<&str>,
    settings: &ProbeConfig,
    spawner: &S,
) -> (Vec<PingResult>, Option<SessionFailure>) {
    let argv = ssh_command(
        &settings.vm_username,
        source,
        namespace,
        settings.connect_timeout_secs,
    );
    debug!("Running command: {}", argv.join(" "));

    let transport = match spawner.spawn(&argv) {
        Ok(transport) => transport,
        Err(e) => return (Vec::new(), Some(SessionFailure::Spawn(e.to_string()))),
    };

    let mut session = ProbeSession::new(source, destinations);
    let mut io = Expect::new(transport);
    drive(&mut session, &mut io, settings).await;
    io.into_inner().terminate().await;

    let failure = match session.state() {
        State::Failed(failure) => Some(failure.clone()),
        _ => None,
    };
    (session.into_results(), failure)
}
