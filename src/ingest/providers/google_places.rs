use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::ingest::types::ReviewSource;
use crate::review::ReviewRecord;

pub const DEFAULT_DETAILS_URL: &str = "https://maps.googleapis.com/maps/api/place/details/json";

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    result: Option<PlaceResult>,
}

#[derive(Debug, Default, Deserialize)]
struct PlaceResult {
    #[serde(default)]
    reviews: Vec<PlaceReview>,
}

#[derive(Debug, Deserialize)]
struct PlaceReview {
    #[serde(default)]
    author_name: Option<String>,
    #[serde(default)]
    text: Option<Value>,
    #[serde(default)]
    time: Option<Value>,
}

impl From<PlaceReview> for ReviewRecord {
    fn from(r: PlaceReview) -> Self {
        ReviewRecord {
            id: None,
            text: r.text,
            date: r.time,
            author: r.author_name.map(Value::String),
        }
    }
}

/// Google Places "place details" endpoint.
pub struct GooglePlacesSource {
    client: reqwest::Client,
    details_url: String,
    api_key: String,
}

impl GooglePlacesSource {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_url(DEFAULT_DETAILS_URL, api_key)
    }

    /// Point at a different details endpoint (proxies, local stubs).
    pub fn with_url(details_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("truetale-analyzer/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .context("building places http client")?;
        Ok(Self {
            client,
            details_url: details_url.into(),
            api_key: api_key.into(),
        })
    }

    fn parse_body(body: &str) -> Result<Vec<ReviewRecord>> {
        let resp: DetailsResponse =
            serde_json::from_str(body).context("parsing place details json")?;
        match resp.status.as_deref() {
            None | Some("OK") | Some("ZERO_RESULTS") => {}
            Some(other) => bail!(
                "places api status {other}: {}",
                resp.error_message.unwrap_or_default()
            ),
        }
        Ok(resp
            .result
            .unwrap_or_default()
            .reviews
            .into_iter()
            .map(ReviewRecord::from)
            .collect())
    }
}

#[async_trait]
impl ReviewSource for GooglePlacesSource {
    async fn fetch(&self, place_id: &str) -> Result<Vec<ReviewRecord>> {
        let resp = self
            .client
            .get(&self.details_url)
            .query(&[
                ("place_id", place_id),
                ("fields", "reviews"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("places http get()")?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(reqwest::Error::without_url)
            .context("places http .text()")?;
        if !status.is_success() {
            bail!("places api returned {status}");
        }
        Self::parse_body(&body)
    }

    fn name(&self) -> &'static str {
        "google_places"
    }
}
