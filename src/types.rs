//! Data types for the HDHomeRun EPG pipeline
//!
//! This module contains the core data structures shared by all pipeline
//! stages. Everything here is created fresh per pipeline run, held in
//! memory only, and discarded once the XMLTV document is produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A channel from the HDHomeRun lineup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Guide number, the unique channel key (e.g., "5.1")
    pub guide_number: String,
    /// Display name of the channel
    pub guide_name: String,
    /// Stream URL on the tuner device
    pub stream_url: String,
    /// Channel logo URL, if the device reports one
    pub icon_url: Option<String>,
}

/// Tri-state first-run flag reported by the guide service
///
/// The guide may say a broadcast is a first airing, a repeat, or say
/// nothing at all. The three cases drive different XMLTV markers, so the
/// distinction is kept explicit rather than collapsed into a bool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FirstRun {
    /// Guide marked the broadcast as a first airing
    New,
    /// Guide marked the broadcast as a repeat
    Repeat,
    /// Guide did not report a first-run flag
    Unknown,
}

impl From<Option<bool>> for FirstRun {
    fn from(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => FirstRun::New,
            Some(false) => FirstRun::Repeat,
            None => FirstRun::Unknown,
        }
    }
}

/// A single program entry from the guide service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramRecord {
    /// Program title
    pub title: String,
    /// Broadcast start, UTC
    pub start_time: DateTime<Utc>,
    /// Broadcast end, UTC; always after `start_time`
    pub end_time: DateTime<Utc>,
    /// Guide number of the owning channel
    pub guide_number: String,
    /// Program description
    pub synopsis: Option<String>,
    /// Episode title
    pub episode_title: Option<String>,
    /// Vendor episode-number string, typically "S<season>E<episode>"
    pub episode_number: Option<String>,
    /// Program image URL
    pub icon_url: Option<String>,
    /// Original airdate, UTC
    pub original_airdate: Option<DateTime<Utc>>,
    /// Guide filter tags (e.g., "Movies", "Sports"), in guide order
    pub filters: Vec<String>,
    /// First-run flag
    pub first_run: FirstRun,
}

impl ProgramRecord {
    /// Key identifying one broadcast across overlapping fetch windows.
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            start_time: self.start_time,
            title: self.title.clone(),
            guide_number: self.guide_number.clone(),
        }
    }
}

/// Structural identity of a broadcast: two records with the same key are
/// the same broadcast regardless of which fetch window produced them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub start_time: DateTime<Utc>,
    pub title: String,
    pub guide_number: String,
}

/// Composite authentication credential for the cloud guide service
///
/// Formed by concatenating the per-device auth tokens of every distinct
/// tuner that responded during discovery, in discovery order. The guide
/// service requires proof of ownership of all local tuners, so a single
/// device's token is not sufficient on multi-tuner networks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential(String);

impl Credential {
    /// Concatenate device tokens, filtering duplicate token values while
    /// preserving first-seen order.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen: Vec<String> = Vec::new();
        for token in tokens {
            let token = token.as_ref();
            if !seen.iter().any(|t| t == token) {
                seen.push(token.to_string());
            }
        }
        Credential(seen.concat())
    }

    /// The concatenated token string, as sent to the guide service.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when no device contributed a token.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
