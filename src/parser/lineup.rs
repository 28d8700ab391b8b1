//! Parser for the device `lineup.json` response

use serde::Deserialize;

use crate::error::{EpgError, Result};
use crate::types::Channel;

/// One entry of the `lineup.json` array
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LineupEntry {
    #[serde(default)]
    guide_number: String,
    #[serde(default = "unknown_name")]
    guide_name: String,
    #[serde(rename = "URL", default)]
    url: String,
    #[serde(rename = "ImageURL")]
    image_url: Option<String>,
}

fn unknown_name() -> String {
    "Unknown".to_string()
}

/// Parse a `lineup.json` body into the channel set.
///
/// # Errors
/// `EpgError::MalformedResponse` if the body is not a JSON array of
/// channel objects.
pub fn parse_lineup(body: &str) -> Result<Vec<Channel>> {
    let entries: Vec<LineupEntry> =
        serde_json::from_str(body).map_err(|e| EpgError::malformed("lineup", e))?;

    Ok(entries
        .into_iter()
        .map(|entry| Channel {
            guide_number: entry.guide_number,
            guide_name: entry.guide_name,
            stream_url: entry.url,
            icon_url: entry.image_url,
        })
        .collect())
}
