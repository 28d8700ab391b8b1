//! Parser for the per-device `discover.json` response

use serde::Deserialize;

/// Relevant subset of a device's `discover.json` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DiscoverResponse {
    device_auth: Option<String>,
}

/// Extract the device-auth token from a `discover.json` body.
///
/// Discovery is best effort per host: a body that is not JSON, or that
/// omits the `DeviceAuth` field, yields `None` rather than an error.
pub fn parse_device_auth(body: &str) -> Option<String> {
    let response: DiscoverResponse = serde_json::from_str(body).ok()?;
    response.device_auth.filter(|auth| !auth.is_empty())
}
