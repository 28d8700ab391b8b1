//! Channel lineup retrieval
//!
//! One lookup per pipeline run against the primary device. The result is
//! used both to filter guide entries and to emit `<channel>` elements.

use tracing::info;

use crate::error::{EpgError, Result};
use crate::parser::parse_lineup;
use crate::types::Channel;

/// Fetch the channel lineup from a device.
///
/// # Errors
/// * `EpgError::LineupUnavailable` on network failure or error status
/// * `EpgError::MalformedResponse` if the body is not valid lineup JSON
pub async fn fetch_lineup(client: &reqwest::Client, host: &str) -> Result<Vec<Channel>> {
    let url = format!("http://{}/lineup.json", host);
    info!(host, "fetching channel lineup");

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| EpgError::LineupUnavailable(e.to_string()))?;

    if !response.status().is_success() {
        return Err(EpgError::LineupUnavailable(format!(
            "HTTP {} from {}",
            response.status(),
            url
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| EpgError::LineupUnavailable(e.to_string()))?;

    let channels = parse_lineup(&body)?;
    info!(channels = channels.len(), "retrieved channel lineup");
    Ok(channels)
}
