//! `weather-playlist` - playlists picked by the current weather
//!
//! This library resolves a location's temperature, maps it to a music genre
//! and fetches matching tracks from a music catalog, with a circuit breaker
//! and bounded retry guarding each upstream provider.

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod history;
pub mod http;
pub mod models;
pub mod pipeline;
pub mod resilience;
pub mod telemetry;
pub mod weather;
pub mod web;

#[cfg(test)]
mod testing;

// Re-export core types for public API
pub use catalog::{CatalogAuthenticator, CatalogSearcher, TokenProvider, TrackCatalog};
pub use config::AppConfig;
pub use error::{ErrorClass, ErrorKind, PlaylistError, Stage};
pub use history::{DiskHistory, HistoryRecorder, InMemoryHistory};
pub use models::{GenreTag, LocationQuery, PipelineOutcome, PlaylistResult, WeatherObservation};
pub use pipeline::{PlaylistOrchestrator, Providers, StagePolicy};
pub use resilience::{BreakerConfig, BreakerState, CircuitBreaker, RetryPolicy};
pub use weather::{WeatherProvider, WeatherResolver};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, PlaylistError>;
