//! Fetch the raw CSV text from a URL or a local path.

use std::time::Duration;

use reqwest::blocking::Client;
use tracing::info;

use crate::error::AppError;

/// Public daily cumulative case counts for the US.
pub const DEFAULT_SOURCE_URL: &str = "https://raw.githubusercontent.com/nytimes/covid-19-data/master/us.csv";

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

pub fn is_remote(location: &str) -> bool {
    let lower = location.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Read the whole source into memory.
///
/// `http(s)://` locations are downloaded once; anything else is a file path.
pub fn fetch_source(location: &str) -> Result<String, AppError> {
    if is_remote(location) {
        fetch_remote(location)
    } else {
        std::fs::read_to_string(location)
            .map_err(|e| AppError::new(2, format!("Failed to read input '{location}': {e}")))
    }
}

fn fetch_remote(url: &str) -> Result<String, AppError> {
    info!(url, "downloading source data");
    let client = Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| AppError::new(4, format!("Failed to build HTTP client: {e}")))?;

    let resp = client
        .get(url)
        .send()
        .map_err(|e| AppError::new(4, format!("Request to '{url}' failed: {e}")))?;

    if !resp.status().is_success() {
        return Err(AppError::new(
            4,
            format!("Request to '{url}' failed with status {}.", resp.status()),
        ));
    }

    let body = resp
        .text()
        .map_err(|e| AppError::new(4, format!("Failed to read response body from '{url}': {e}")))?;
    info!(bytes = body.len(), "download complete");
    Ok(body)
}
