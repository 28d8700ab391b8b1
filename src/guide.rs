//! Windowed guide fetching with endpoint and identity fallback
//!
//! The cloud guide service answers one bounded window of programs per
//! request, so a cursor walks the configured horizon in fixed increments.
//! The service is known to intermittently reject clients with 403, so
//! each window is attempted across an ordered list of endpoints and an
//! ordered list of client identities before the run gives up. A run that
//! cannot resolve one window aborts entirely: publishing a guide with
//! silent holes is worse than publishing nothing.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use crate::client::{build_client, WindowPacer, DEFAULT_TIMEOUT_SECS};
use crate::error::{EpgError, Result};
use crate::parser::parse_guide_window;
use crate::types::{Channel, Credential, ProgramRecord};

/// Guide endpoints, tried in order per window
pub const DEFAULT_GUIDE_ENDPOINTS: [&str; 2] = [
    "https://api.hdhomerun.com/api/guide",
    "https://my.hdhomerun.com/api/guide.php",
];

/// Client identity strings rotated through on authorization rejections
pub const DEFAULT_CLIENT_IDENTITIES: [&str; 4] = [
    "Mozilla/5.0 (Linux; HDHomeRun-XMLTV-Converter)",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "HDHomeRun/1.0",
    "curl/8.5.0",
];

/// App identity fields sent in the request body
const APP_NAME: &str = "HDHomeRun";
const APP_VERSION: &str = "20241024";
const PLATFORM: &str = "LINUX";

/// Configuration for the guide fetcher
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Days of guide data to retrieve (default: 7)
    pub days: u32,
    /// Hours covered per window request (default: 3)
    pub hours_increment: u32,
    /// Politeness delay between successive windows (default: 1s)
    pub window_delay: Duration,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            days: 7,
            hours_increment: 3,
            window_delay: Duration::from_secs(1),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Cursor over the (endpoint, identity) attempt space of one window
///
/// The identity pointer wraps and persists across windows and endpoints:
/// once an identity starts getting rejected it usually stays rejected, so
/// later windows should not start over from the front of the list. The
/// endpoint pointer restarts at the primary endpoint for every window.
#[derive(Debug)]
pub(crate) struct AttemptCursor {
    n_endpoints: usize,
    n_identities: usize,
    endpoint: usize,
    identity: usize,
    /// Identities tried against the current endpoint this window
    tried_on_endpoint: usize,
    /// Consecutive rejections since the last successful window
    rejections: usize,
}

impl AttemptCursor {
    pub(crate) fn new(n_endpoints: usize, n_identities: usize) -> Self {
        Self {
            n_endpoints,
            n_identities,
            endpoint: 0,
            identity: 0,
            tried_on_endpoint: 0,
            rejections: 0,
        }
    }

    /// Reset per-window state. The identity pointer is kept.
    pub(crate) fn begin_window(&mut self) {
        self.endpoint = 0;
        self.tried_on_endpoint = 0;
    }

    pub(crate) fn endpoint(&self) -> usize {
        self.endpoint
    }

    pub(crate) fn identity(&self) -> usize {
        self.identity
    }

    pub(crate) fn rejections(&self) -> usize {
        self.rejections
    }

    /// Record an authorization rejection and advance to the next attempt:
    /// next identity on the same endpoint, or the next endpoint once every
    /// identity was rejected here. Returns `false` when the attempt space
    /// is exhausted.
    pub(crate) fn advance_rejected(&mut self) -> bool {
        self.rejections += 1;
        self.tried_on_endpoint += 1;
        self.identity = (self.identity + 1) % self.n_identities;
        if self.tried_on_endpoint < self.n_identities {
            return true;
        }
        self.tried_on_endpoint = 0;
        self.next_endpoint()
    }

    /// Move to the next endpoint after a transport failure. Returns
    /// `false` when already on the last endpoint.
    pub(crate) fn advance_transport(&mut self) -> bool {
        self.tried_on_endpoint = 0;
        self.next_endpoint()
    }

    pub(crate) fn record_success(&mut self) {
        self.rejections = 0;
    }

    fn next_endpoint(&mut self) -> bool {
        if self.endpoint + 1 < self.n_endpoints {
            self.endpoint += 1;
            true
        } else {
            false
        }
    }
}

/// Outcome of a single guide request attempt
enum AttemptOutcome {
    Success(String),
    AuthRejected,
    Transport(String),
}

/// Retrieves program records across a time horizon in fixed windows
pub struct GuideFetcher {
    client: reqwest::Client,
    endpoints: Vec<String>,
    identities: Vec<String>,
    config: FetchConfig,
}

impl GuideFetcher {
    /// Create a fetcher against the default guide endpoints.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self> {
        Self::with_config(FetchConfig::default())
    }

    /// Create a fetcher with custom horizon and pacing settings.
    pub fn with_config(config: FetchConfig) -> Result<Self> {
        Self::with_endpoints(
            DEFAULT_GUIDE_ENDPOINTS.iter().map(|e| e.to_string()).collect(),
            DEFAULT_CLIENT_IDENTITIES.iter().map(|i| i.to_string()).collect(),
            config,
        )
    }

    /// Create a fetcher with explicit endpoint and identity lists.
    ///
    /// Both lists must be non-empty; order is the fallback order.
    pub fn with_endpoints(
        endpoints: Vec<String>,
        identities: Vec<String>,
        config: FetchConfig,
    ) -> Result<Self> {
        assert!(!endpoints.is_empty(), "at least one guide endpoint required");
        assert!(!identities.is_empty(), "at least one client identity required");
        let client = build_client(config.timeout_secs)?;
        Ok(Self {
            client,
            endpoints,
            identities,
            config,
        })
    }

    /// Fetch program records for the configured horizon.
    ///
    /// Returns the raw, possibly overlapping record stream; dedup is the
    /// next stage's job. On `AuthRejected` or `GuideUnavailable` no
    /// partial records are returned.
    ///
    /// # Errors
    /// * `EpgError::AuthRejected` - every endpoint × identity combination
    ///   was rejected for some window
    /// * `EpgError::GuideUnavailable` - non-auth transport failure on the
    ///   last endpoint
    /// * `EpgError::MalformedResponse` - unparsable guide JSON
    pub async fn fetch(
        &self,
        credential: &Credential,
        channels: &[Channel],
    ) -> Result<Vec<ProgramRecord>> {
        let known: HashSet<String> = channels
            .iter()
            .map(|c| c.guide_number.clone())
            .collect();

        let start = Utc::now();
        let end = start + chrono::Duration::days(i64::from(self.config.days));
        let step = chrono::Duration::hours(i64::from(self.config.hours_increment));

        info!(
            days = self.config.days,
            hours_increment = self.config.hours_increment,
            "retrieving guide data"
        );

        let mut cursor = AttemptCursor::new(self.endpoints.len(), self.identities.len());
        let mut pacer = WindowPacer::new(self.config.window_delay);
        let mut records = Vec::new();

        let mut current = start;
        while current < end {
            pacer.acquire().await;
            let window = self
                .fetch_window(credential, current.timestamp(), &mut cursor, &known)
                .await?;
            debug!(
                window_start = current.timestamp(),
                programs = window.len(),
                "window retrieved"
            );
            records.extend(window);
            current += step;
        }

        info!(programs = records.len(), "guide retrieval complete");
        Ok(records)
    }

    /// Resolve one window through the endpoint/identity fallback loop.
    async fn fetch_window(
        &self,
        credential: &Credential,
        start_ts: i64,
        cursor: &mut AttemptCursor,
        known: &HashSet<String>,
    ) -> Result<Vec<ProgramRecord>> {
        cursor.begin_window();
        loop {
            let endpoint = &self.endpoints[cursor.endpoint()];
            let identity = &self.identities[cursor.identity()];
            match self.attempt(endpoint, identity, credential, start_ts).await {
                AttemptOutcome::Success(body) => {
                    cursor.record_success();
                    return parse_guide_window(&body, known);
                }
                AttemptOutcome::AuthRejected => {
                    warn!(
                        endpoint = %endpoint,
                        rejections = cursor.rejections() + 1,
                        "guide request rejected, rotating identity"
                    );
                    if !cursor.advance_rejected() {
                        return Err(EpgError::AuthRejected);
                    }
                }
                AttemptOutcome::Transport(message) => {
                    if !cursor.advance_transport() {
                        return Err(EpgError::GuideUnavailable(message));
                    }
                    warn!(
                        endpoint = %endpoint,
                        error = %message,
                        "guide endpoint failed, trying next endpoint"
                    );
                }
            }
        }
    }

    /// Issue a single guide request for one window.
    async fn attempt(
        &self,
        endpoint: &str,
        identity: &str,
        credential: &Credential,
        start_ts: i64,
    ) -> AttemptOutcome {
        let start_param = start_ts.to_string();
        let result = self
            .client
            .post(endpoint)
            .query(&[
                ("DeviceAuth", credential.as_str()),
                ("Start", start_param.as_str()),
            ])
            .header(USER_AGENT, identity)
            .header(ACCEPT, "application/json, text/plain, */*")
            .form(&[
                ("AppName", APP_NAME),
                ("AppVersion", APP_VERSION),
                ("DeviceAuth", credential.as_str()),
                ("Platform", PLATFORM),
            ])
            .send()
            .await;

        match result {
            Ok(response) if response.status() == StatusCode::FORBIDDEN => {
                AttemptOutcome::AuthRejected
            }
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => AttemptOutcome::Success(body),
                Err(e) => AttemptOutcome::Transport(e.to_string()),
            },
            Ok(response) => AttemptOutcome::Transport(format!(
                "HTTP {} from {}",
                response.status(),
                endpoint
            )),
            Err(e) => AttemptOutcome::Transport(e.to_string()),
        }
    }
}
