//! HDHomeRun EPG to XMLTV Library
//!
//! This crate retrieves electronic program guide data from HDHomeRun
//! tuner devices and renders it as an XMLTV document.
//!
//! # Features
//! - Multi-device discovery with composite credential aggregation
//! - Time-windowed guide retrieval with endpoint and identity fallback
//! - Deduplication of overlapping guide windows
//! - XMLTV encoding with episode-numbering translation and repeat/new
//!   inference

pub mod client;
pub mod dedup;
pub mod discovery;
pub mod error;
pub mod guide;
pub mod lineup;
pub mod parser;
pub mod pipeline;
pub mod types;
pub mod xmltv;

// Re-export main types for convenience
pub use dedup::dedup;
pub use discovery::{DeviceAuthResolver, DiscoveryConfig, ResolvedAuth};
pub use error::{EpgError, Result};
pub use guide::{FetchConfig, GuideFetcher};
pub use lineup::fetch_lineup;
pub use pipeline::{EpgPipeline, PipelineConfig};
pub use types::{Channel, Credential, FirstRun, ProgramRecord};
pub use xmltv::{XmltvDocument, XmltvEncoder};
