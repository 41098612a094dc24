//! Track search by genre

use std::time::Duration;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument};

use super::TrackCatalog;
use crate::Result;
use crate::config::CatalogConfig;
use crate::error::{ErrorKind, PlaylistError, Stage};
use crate::http;
use crate::models::{AccessToken, GenreTag, PlaylistResult};

/// Searches the catalog and keeps only the track names
pub struct CatalogSearcher {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: TrackPage,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    items: Vec<TrackItem>,
}

#[derive(Debug, Deserialize)]
struct TrackItem {
    name: String,
}

impl CatalogSearcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AnyResult<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &CatalogConfig) -> AnyResult<Self> {
        Self::new(
            config.api_base_url.clone(),
            Duration::from_secs(config.timeout_seconds.into()),
        )
    }

    fn url_for(&self, genre: GenreTag, limit: u32) -> String {
        format!(
            "{}/search?q={}&type=track&limit={}",
            self.base_url,
            urlencoding::encode(genre.as_str()),
            limit
        )
    }
}

#[async_trait]
impl TrackCatalog for CatalogSearcher {
    #[instrument(skip(self, token))]
    async fn search(
        &self,
        token: &AccessToken,
        genre: GenreTag,
        limit: u32,
    ) -> Result<PlaylistResult> {
        if token.is_expired_at(Utc::now()) {
            return Err(PlaylistError::new(
                Stage::Search,
                ErrorKind::Rejected,
                "access token expired before the search",
            ));
        }

        let request = self
            .client
            .get(self.url_for(genre, limit))
            .bearer_auth(&token.value);

        let response = http::send(Stage::Search, request).await?;
        let body: SearchResponse = http::read_json(Stage::Search, response).await?;

        let playlist: PlaylistResult =
            body.tracks.items.into_iter().map(|item| item.name).collect();
        info!("Found {} {} tracks", playlist.len(), genre);
        Ok(playlist)
    }
}
