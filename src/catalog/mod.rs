//! Music catalog access
//!
//! Two steps against the catalog provider: a client-credentials exchange that
//! yields a bearer token, then a track search keyed by genre.

use async_trait::async_trait;

use crate::Result;
use crate::models::{AccessToken, GenreTag, PlaylistResult};

pub mod auth;
pub mod search;

pub use auth::CatalogAuthenticator;
pub use search::CatalogSearcher;

/// Issues bearer tokens for the catalog API
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn obtain_token(&self) -> Result<AccessToken>;
}

/// Searches the catalog for tracks of a genre
#[async_trait]
pub trait TrackCatalog: Send + Sync {
    async fn search(
        &self,
        token: &AccessToken,
        genre: GenreTag,
        limit: u32,
    ) -> Result<PlaylistResult>;
}
