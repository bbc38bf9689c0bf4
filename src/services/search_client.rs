//! YouTube search scraping client
//!
//! No API key: fetches the public results page and pulls candidate tracks
//! out of the embedded `ytInitialData` JSON. The page structure is
//! undocumented and shifts over time, so parsing is defensive throughout
//! and an empty result list is a valid outcome.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::models::TrackCandidate;

/// Cap on returned candidates.
const MAX_RESULTS: usize = 5;

const RESULTS_URL: &str = "https://www.youtube.com/results";
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Request(String),

    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    #[error("could not locate result data in the page")]
    NoInitialData,
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        SearchError::Request(e.to_string())
    }
}

pub struct SearchClient {
    http: reqwest::Client,
}

impl SearchClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Search for a song, returning up to five candidates. The query is
    /// augmented with "official audio" to bias toward full-track uploads.
    pub async fn search(&self, query: &str) -> Result<Vec<TrackCandidate>, SearchError> {
        let response = self
            .http
            .get(RESULTS_URL)
            .query(&[("search_query", format!("{query} official audio"))])
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::HttpStatus(response.status().as_u16()));
        }

        let html = response.text().await?;
        let data = extract_initial_data(&html).ok_or(SearchError::NoInitialData)?;
        let candidates = extract_candidates(&data, MAX_RESULTS);
        debug!(query, count = candidates.len(), "search completed");
        Ok(candidates)
    }
}

/// Pull the `ytInitialData` JSON object out of the results page.
fn extract_initial_data(html: &str) -> Option<Value> {
    let marker = "var ytInitialData = ";
    let start = html.find(marker)? + marker.len();
    let rest = &html[start..];
    let end = rest.find("};</script>")?;
    serde_json::from_str(&rest[..=end]).ok()
}

/// Walk the result renderer tree, collecting video entries. Every level
/// can be absent; anything unrecognized is skipped rather than an error.
fn extract_candidates(data: &Value, limit: usize) -> Vec<TrackCandidate> {
    let mut results = Vec::new();

    let sections = data
        .pointer("/contents/twoColumnSearchResultsRenderer/primaryContents/sectionListRenderer/contents")
        .and_then(Value::as_array);
    let Some(sections) = sections else {
        return results;
    };

    for section in sections {
        let Some(items) = section
            .pointer("/itemSectionRenderer/contents")
            .and_then(Value::as_array)
        else {
            continue;
        };

        for item in items {
            let Some(video) = item.get("videoRenderer") else {
                continue;
            };
            let Some(id) = video.get("videoId").and_then(Value::as_str) else {
                continue;
            };

            results.push(TrackCandidate {
                id: id.to_string(),
                title: video
                    .pointer("/title/runs/0/text")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown Title")
                    .to_string(),
                thumbnail: video
                    .pointer("/thumbnail/thumbnails/0/url")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
                duration: video
                    .pointer("/lengthText/simpleText")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown")
                    .to_string(),
                channel: video
                    .pointer("/ownerText/runs/0/text")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown Channel")
                    .to_string(),
            });

            if results.len() >= limit {
                return results;
            }
        }
    }

    results
}
