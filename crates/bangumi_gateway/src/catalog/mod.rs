//! Stateless proxy to the Bangumi catalog API.

pub mod shapes;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{GatewayError, Result};
pub use shapes::{AiringStatus, AnimeDetail, SearchItem, SearchResults};
use shapes::{UpstreamSearch, UpstreamSubject};

/// Bangumi subject type code for anime
pub const ANIME_SUBJECT_TYPE: &str = "2";

#[derive(Clone)]
pub struct CatalogClient {
    api_base_url: Url,
    http_client: reqwest::Client,
}

impl CatalogClient {
    pub fn new(api_base_url: Url, http_client: reqwest::Client) -> Self {
        Self {
            api_base_url,
            http_client,
        }
    }

    /// Keyword search, projected into `{results, total, page}`
    pub async fn search(&self, query: &str, subject_type: &str) -> Result<SearchResults> {
        let mut url = self.endpoint(&["search", "subject", query])?;
        url.query_pairs_mut().append_pair("type", subject_type);

        let upstream: UpstreamSearch = self.get_json(url).await?;
        Ok(SearchResults::from(upstream))
    }

    /// Subject detail reshaped for the anime view
    pub async fn anime_detail(&self, id: &str) -> Result<AnimeDetail> {
        let url = self.endpoint(&["v0", "subjects", id])?;
        let subject: UpstreamSubject = self.get_json(url).await?;
        Ok(AnimeDetail::from_subject(subject, Utc::now()))
    }

    /// Subject detail exactly as upstream returned it
    pub async fn subject(&self, id: &str) -> Result<Value> {
        let url = self.endpoint(&["v0", "subjects", id])?;
        self.get_json(url).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Config(format!("{} cannot be a base URL", self.api_base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("Catalog request: GET {}", url);

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(GatewayError::upstream_transport)?;

        if !response.status().is_success() {
            return Err(GatewayError::upstream_status(response.status()));
        }

        response.json().await.map_err(GatewayError::upstream_transport)
    }
}
