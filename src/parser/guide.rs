//! Parser for cloud guide service responses
//!
//! The guide service answers one window request with a JSON array of
//! per-channel objects, each carrying a `Guide` array of program entries.
//! Entries for channels outside the lineup, and entries whose times are
//! unusable, are dropped without failing the window.

use std::collections::HashSet;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::error::{EpgError, Result};
use crate::types::{FirstRun, ProgramRecord};

/// One per-channel object of the guide response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GuideChannel {
    #[serde(default)]
    guide_number: String,
    #[serde(default)]
    guide: Vec<GuideEntry>,
}

/// One program entry within a channel's `Guide` array
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GuideEntry {
    #[serde(default)]
    title: String,
    start_time: Option<i64>,
    end_time: Option<i64>,
    synopsis: Option<String>,
    episode_title: Option<String>,
    episode_number: Option<String>,
    #[serde(rename = "ImageURL")]
    image_url: Option<String>,
    original_airdate: Option<i64>,
    #[serde(default)]
    filter: Vec<String>,
    first: Option<bool>,
}

/// Parse one guide-window response into program records.
///
/// Channels not present in `known_channels` are dropped (the service may
/// return entries for channels outside the lineup), as are entries whose
/// start is not strictly before their end.
///
/// # Errors
/// `EpgError::MalformedResponse` if the body is not the expected JSON
/// shape; individually bad entries are never fatal.
pub fn parse_guide_window(
    body: &str,
    known_channels: &HashSet<String>,
) -> Result<Vec<ProgramRecord>> {
    let channels: Vec<GuideChannel> =
        serde_json::from_str(body).map_err(|e| EpgError::malformed("guide", e))?;

    let mut records = Vec::new();
    for channel in channels {
        if !known_channels.contains(&channel.guide_number) {
            debug!(
                guide_number = %channel.guide_number,
                "skipping guide entries for channel outside lineup"
            );
            continue;
        }
        for entry in channel.guide {
            match parse_entry(entry, &channel.guide_number) {
                Some(record) => records.push(record),
                None => debug!(
                    guide_number = %channel.guide_number,
                    "dropping guide entry with unusable times"
                ),
            }
        }
    }
    Ok(records)
}

/// Convert one wire entry to a record, or `None` if its times are invalid.
fn parse_entry(entry: GuideEntry, guide_number: &str) -> Option<ProgramRecord> {
    let start_time = entry.start_time.and_then(timestamp)?;
    let end_time = entry.end_time.and_then(timestamp)?;
    if start_time >= end_time {
        return None;
    }

    Some(ProgramRecord {
        title: entry.title,
        start_time,
        end_time,
        guide_number: guide_number.to_string(),
        synopsis: entry.synopsis,
        episode_title: entry.episode_title,
        episode_number: entry.episode_number,
        icon_url: entry.image_url,
        original_airdate: entry.original_airdate.and_then(timestamp),
        filters: entry.filter,
        first_run: FirstRun::from(entry.first),
    })
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}
