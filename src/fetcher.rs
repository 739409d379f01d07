use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::types::Location;

/// Fetch the location table from the REST bootstrap endpoint. The body is
/// `{"records": [LOCATION...]}`; records that fail to decode are skipped.
pub async fn fetch_locations(url: &str) -> Result<Vec<Location>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    debug!("[FETCH] GET {url}");
    let resp: serde_json::Value = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let (locations, skipped) = parse_locations(&resp)?;
    if skipped > 0 {
        warn!("[FETCH] skipped {skipped} malformed location records");
    }
    info!("[FETCH] {} locations loaded from {url}", locations.len());
    Ok(locations)
}

/// Split a bootstrap body into decoded locations and a count of skipped records.
pub fn parse_locations(body: &serde_json::Value) -> Result<(Vec<Location>, usize)> {
    let records = body
        .get("records")
        .and_then(|r| r.as_array())
        .ok_or_else(|| {
            AppError::Bootstrap("locations response has no `records` array".to_string())
        })?;

    let mut skipped = 0usize;
    let locations = records
        .iter()
        .filter_map(|v| match serde_json::from_value::<Location>(v.clone()) {
            Ok(loc) => Some(loc),
            Err(e) => {
                debug!("[FETCH] bad location record: {e}");
                skipped += 1;
                None
            }
        })
        .collect();

    Ok((locations, skipped))
}
