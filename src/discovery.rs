//! Tuner device discovery and composite credential resolution
//!
//! The cloud guide service authenticates a household by the concatenation
//! of the `DeviceAuth` tokens of every local tuner, so discovery probes
//! every candidate host it can find: the configured seed host, a couple of
//! well-known default hostnames, and any device that answers the vendor
//! UDP broadcast. Individual hosts failing is expected and never fatal;
//! only zero responsive devices aborts the run.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::Semaphore;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::client::{build_client, DEFAULT_PROBE_TIMEOUT_SECS};
use crate::error::{EpgError, Result};
use crate::parser::parse_device_auth;
use crate::types::Credential;

/// Vendor discovery datagram: a device/tuner wildcard discover request
const DISCOVERY_PACKET: [u8; 16] = [
    0x00, 0x02, 0x00, 0x0c, 0x01, 0x04, 0x00, 0x00, 0x00, 0x01, 0x02, 0x04, 0x00, 0x00, 0x00,
    0x01,
];

/// UDP port HDHomeRun devices listen on for discovery
const DISCOVERY_PORT: u16 = 65001;

/// Hostnames HDHomeRun devices register by default
const WELL_KNOWN_HOSTS: [&str; 2] = ["hdhomerun.local", "hdhomerun"];

/// Configuration for device discovery
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Timeout for each per-host HTTP probe in seconds (default: 5)
    pub probe_timeout_secs: u64,
    /// How long to collect UDP broadcast replies (default: 3s)
    pub broadcast_wait: Duration,
    /// Whether to run the UDP broadcast probe at all (default: true)
    pub broadcast: bool,
    /// Default hostnames added to the candidate set
    pub well_known_hosts: Vec<String>,
    /// Upper bound on concurrent per-host probes (default: 8)
    pub max_concurrent_probes: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            broadcast_wait: Duration::from_secs(3),
            broadcast: true,
            well_known_hosts: WELL_KNOWN_HOSTS.iter().map(|h| h.to_string()).collect(),
            max_concurrent_probes: 8,
        }
    }
}

/// Outcome of credential resolution
#[derive(Debug, Clone)]
pub struct ResolvedAuth {
    /// Composite credential for the guide service
    pub credential: Credential,
    /// Hosts that contributed a token, in candidate order
    pub devices: Vec<String>,
}

/// Discovers tuner devices and resolves the composite credential
pub struct DeviceAuthResolver {
    config: DiscoveryConfig,
    client: reqwest::Client,
}

impl DeviceAuthResolver {
    /// Create a resolver with default configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self> {
        Self::with_config(DiscoveryConfig::default())
    }

    /// Create a resolver with custom configuration.
    pub fn with_config(config: DiscoveryConfig) -> Result<Self> {
        let client = build_client(config.probe_timeout_secs)?;
        Ok(Self { config, client })
    }

    /// Discover all reachable tuner devices and build the composite
    /// credential from their auth tokens.
    ///
    /// # Arguments
    /// * `seed_host` - The configured primary device host
    /// * `extra_hosts` - Additional candidate hosts to probe
    ///
    /// # Errors
    /// `EpgError::NoDevicesDiscovered` if no candidate host yields a token.
    pub async fn resolve(&self, seed_host: &str, extra_hosts: &[String]) -> Result<ResolvedAuth> {
        info!(seed_host, "discovering HDHomeRun devices");

        let candidates = self.candidate_hosts(seed_host, extra_hosts).await;
        debug!(?candidates, "probing candidate hosts");

        // Probe hosts concurrently but reassemble results in candidate
        // order so the credential is deterministic for a given set.
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_probes));
        let mut handles = Vec::with_capacity(candidates.len());
        for host in &candidates {
            let client = self.client.clone();
            let host = host.clone();
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                probe_host(&client, &host).await
            }));
        }

        let mut tokens: Vec<String> = Vec::new();
        let mut devices: Vec<String> = Vec::new();
        for (host, handle) in candidates.iter().zip(handles) {
            let token = match handle.await {
                Ok(Some(token)) => token,
                Ok(None) => continue,
                Err(e) => {
                    debug!(host = %host, error = %e, "probe task failed");
                    continue;
                }
            };
            if tokens.iter().any(|t| t == &token) {
                debug!(host = %host, "device returned an already-seen token");
                continue;
            }
            info!(host = %host, "discovered device");
            tokens.push(token);
            devices.push(host.clone());
        }

        if tokens.is_empty() {
            return Err(EpgError::NoDevicesDiscovered(candidates.join(", ")));
        }

        let credential = Credential::from_tokens(&tokens);
        info!(
            devices = devices.len(),
            credential_len = credential.as_str().len(),
            "resolved composite credential"
        );
        Ok(ResolvedAuth {
            credential,
            devices,
        })
    }

    /// Build the ordered, deduplicated candidate host list.
    async fn candidate_hosts(&self, seed_host: &str, extra_hosts: &[String]) -> Vec<String> {
        let mut candidates: Vec<String> = Vec::new();
        let mut push = |host: &str, candidates: &mut Vec<String>| {
            if !host.is_empty() && !candidates.iter().any(|c| c == host) {
                candidates.push(host.to_string());
            }
        };

        push(seed_host, &mut candidates);
        for host in extra_hosts {
            push(host, &mut candidates);
        }
        for host in &self.config.well_known_hosts {
            push(host, &mut candidates);
        }

        if self.config.broadcast {
            match self.broadcast_probe().await {
                Ok(hosts) => {
                    debug!(found = hosts.len(), "broadcast discovery finished");
                    for host in &hosts {
                        push(host, &mut candidates);
                    }
                }
                Err(e) => warn!(error = %e, "broadcast discovery failed"),
            }
        }

        candidates
    }

    /// Send the vendor discovery datagram and collect reply sources until
    /// the wait window elapses.
    async fn broadcast_probe(&self) -> std::io::Result<Vec<String>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.set_broadcast(true)?;
        socket
            .send_to(&DISCOVERY_PACKET, ("255.255.255.255", DISCOVERY_PORT))
            .await?;

        let deadline = Instant::now() + self.config.broadcast_wait;
        let mut hosts = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match timeout(remaining, socket.recv_from(&mut buf)).await {
                // Replies shorter than a discovery header are noise
                Ok(Ok((len, addr))) if len >= 8 => {
                    let host = addr.ip().to_string();
                    debug!(host = %host, "broadcast reply");
                    hosts.push(host);
                }
                Ok(Ok(_)) => continue,
                Ok(Err(e)) => return Err(e),
                Err(_) => break,
            }
        }
        Ok(hosts)
    }
}

/// Probe one host's `discover.json` endpoint for its auth token.
///
/// Hosts that error, time out, or omit the token are skipped silently.
async fn probe_host(client: &reqwest::Client, host: &str) -> Option<String> {
    let url = format!("http://{}/discover.json", host);
    let body = client.get(&url).send().await.ok()?.text().await.ok()?;
    parse_device_auth(&body)
}
