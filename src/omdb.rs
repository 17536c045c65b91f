use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const OMDB_BASE: &str = "http://www.omdbapi.com/";

const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

/// Secondary lookup service: OMDb exact-title lookup.
#[async_trait]
pub trait OmdbApi: Send + Sync {
    async fn lookup_title(&self, title: &str) -> Result<OmdbResponse>;
}

/// OMDb reports success in-band: `Response` is the string "True" on a match.
#[derive(Debug, Clone, Deserialize)]
pub struct OmdbResponse {
    #[serde(rename = "Response", default)]
    pub response: String,
    #[serde(rename = "Title")]
    pub title: Option<String>,
    #[serde(rename = "Year")]
    pub year: Option<String>,
    #[serde(rename = "imdbRating")]
    pub imdb_rating: Option<String>,
    #[serde(rename = "Poster")]
    pub poster: Option<String>,
}

impl OmdbResponse {
    pub fn is_match(&self) -> bool {
        self.response == "True"
    }
}

#[derive(Debug, Clone)]
pub struct OmdbClient {
    client: Client,
    api_key: String,
}

impl OmdbClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Failed to build OMDb HTTP client")?;
        Ok(Self { client, api_key })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let res = self.client.get(url).send().await.context("request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading body failed")?;
        if !status.is_success() {
            return Err(anyhow!("{} -> {}", status, text));
        }
        let parsed: T = serde_json::from_str(&text).context("JSON parse failed")?;
        Ok(parsed)
    }
}

#[async_trait]
impl OmdbApi for OmdbClient {
    async fn lookup_title(&self, title: &str) -> Result<OmdbResponse> {
        let url = format!(
            "{OMDB_BASE}?apikey={}&t={}",
            self.api_key,
            urlencoding::encode(title)
        );
        self.get_json(&url).await
    }
}
