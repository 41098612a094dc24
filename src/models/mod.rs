//! Data models for the weather playlist pipeline
//!
//! This module contains the domain models organized by concern:
//! - Location: what the caller asks about
//! - Weather: the temperature reading taken from the weather provider
//! - Genre: the temperature to genre mapping
//! - Playlist: tokens, results, outcomes and history records

pub mod genre;
pub mod location;
pub mod playlist;
pub mod weather;

// Re-export all public types for convenient access
pub use genre::{GenreTag, classify};
pub use location::LocationQuery;
pub use playlist::{AccessToken, HistoryRecord, PipelineOutcome, PlaylistResult, StoredRecord};
pub use weather::WeatherObservation;
