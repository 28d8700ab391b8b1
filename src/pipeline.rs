//! High-level EPG pipeline
//!
//! Stages one full run: device discovery, lineup lookup, windowed guide
//! fetch, deduplication, XMLTV encoding. Stages are strictly sequential
//! because each consumes the previous stage's output, and the document is
//! only produced once fetch and dedup have completed for the whole
//! horizon, so an aborted run never yields a partial guide.

use tracing::info;

use crate::client::build_client;
use crate::dedup::dedup;
use crate::discovery::{DeviceAuthResolver, DiscoveryConfig};
use crate::error::Result;
use crate::guide::{FetchConfig, GuideFetcher};
use crate::lineup::fetch_lineup;
use crate::xmltv::{XmltvDocument, XmltvEncoder};

/// Configuration for one pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Primary tuner host; also the lineup source
    pub seed_host: String,
    /// Additional candidate hosts to probe during discovery
    pub extra_hosts: Vec<String>,
    /// Output timezone for XMLTV timestamps
    pub timezone: chrono_tz::Tz,
    /// Generator name stamped on the document root
    pub generator_name: String,
    /// Generator URL stamped on the document root
    pub generator_url: String,
    /// Discovery settings
    pub discovery: DiscoveryConfig,
    /// Guide fetch settings
    pub fetch: FetchConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed_host: "hdhomerun.local".to_string(),
            extra_hosts: Vec::new(),
            timezone: chrono_tz::UTC,
            generator_name: "hdhr-epg".to_string(),
            generator_url: "https://github.com/example/hdhr-epg".to_string(),
            discovery: DiscoveryConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

/// One-shot EPG pipeline from tuner discovery to XMLTV document
///
/// # Example
/// ```no_run
/// use hdhr_epg::{EpgPipeline, PipelineConfig};
///
/// # async fn example() -> hdhr_epg::Result<()> {
/// let pipeline = EpgPipeline::new(PipelineConfig::default())?;
/// let document = pipeline.run().await?;
/// println!("{}", document.xml);
/// # Ok(())
/// # }
/// ```
pub struct EpgPipeline {
    config: PipelineConfig,
    resolver: DeviceAuthResolver,
    fetcher: GuideFetcher,
    encoder: XmltvEncoder,
    lineup_client: reqwest::Client,
}

impl EpgPipeline {
    /// Create a pipeline against the default guide endpoints.
    ///
    /// # Errors
    /// Returns an error if an HTTP client cannot be created.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let fetcher = GuideFetcher::with_config(config.fetch.clone())?;
        Self::with_fetcher(config, fetcher)
    }

    /// Create a pipeline with a pre-configured guide fetcher.
    ///
    /// Useful when the endpoint or identity lists need overriding.
    pub fn with_fetcher(config: PipelineConfig, fetcher: GuideFetcher) -> Result<Self> {
        let resolver = DeviceAuthResolver::with_config(config.discovery.clone())?;
        let encoder = XmltvEncoder::new(
            config.timezone,
            config.generator_name.clone(),
            config.generator_url.clone(),
        );
        let lineup_client = build_client(config.fetch.timeout_secs)?;
        Ok(Self {
            config,
            resolver,
            fetcher,
            encoder,
            lineup_client,
        })
    }

    /// Execute one full pipeline run and produce the XMLTV document.
    ///
    /// # Errors
    /// Any fatal stage error (`NoDevicesDiscovered`, `LineupUnavailable`,
    /// `AuthRejected`, `GuideUnavailable`, `MalformedResponse`) aborts the
    /// run; no document is produced.
    pub async fn run(&self) -> Result<XmltvDocument> {
        let auth = self
            .resolver
            .resolve(&self.config.seed_host, &self.config.extra_hosts)
            .await?;

        let channels = fetch_lineup(&self.lineup_client, &self.config.seed_host).await?;

        let programs = self.fetcher.fetch(&auth.credential, &channels).await?;
        let programs = dedup(programs);

        let document = self.encoder.encode(&channels, &programs);
        info!(
            channels = channels.len(),
            programs = programs.len(),
            warnings = document.warnings.len(),
            "encoded XMLTV document"
        );
        Ok(document)
    }
}
