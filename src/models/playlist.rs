//! Tokens, playlists, pipeline outcomes and history records

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorClass, PlaylistError};

/// Bearer token issued by the catalog's client-credentials exchange
#[derive(Clone, PartialEq)]
pub struct AccessToken {
    pub value: String,
    pub obtained_at: DateTime<Utc>,
    /// Lifetime advertised by the provider, if any
    pub expires_in: Option<Duration>,
}

impl AccessToken {
    #[must_use]
    pub fn new(value: String, expires_in: Option<Duration>) -> Self {
        Self {
            value,
            obtained_at: Utc::now(),
            expires_in,
        }
    }

    /// Whether the advertised lifetime has passed. Tokens without one never expire.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let Some(lifetime) = self.expires_in else {
            return false;
        };
        chrono::Duration::from_std(lifetime)
            .ok()
            .and_then(|lifetime| self.obtained_at.checked_add_signed(lifetime))
            .is_some_and(|expiry| now >= expiry)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("obtained_at", &self.obtained_at)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Track names in the order the catalog returned them
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct PlaylistResult(pub Vec<String>);

impl PlaylistResult {
    #[must_use]
    pub fn new(tracks: Vec<String>) -> Self {
        Self(tracks)
    }

    #[must_use]
    pub fn tracks(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for PlaylistResult {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Result of one pipeline run, handed to the HTTP layer
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Success(PlaylistResult),
    Failure { class: ErrorClass, message: String },
}

impl PipelineOutcome {
    #[must_use]
    pub fn failure(error: &PlaylistError) -> Self {
        Self::Failure {
            class: error.class(),
            message: error.user_message(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Failure class, `None` on success
    #[must_use]
    pub fn error_class(&self) -> Option<ErrorClass> {
        match self {
            Self::Success(_) => None,
            Self::Failure { class, .. } => Some(*class),
        }
    }
}

impl From<PlaylistError> for PipelineOutcome {
    fn from(error: PlaylistError) -> Self {
        Self::failure(&error)
    }
}

/// One completed request, written once to the history
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HistoryRecord {
    pub location: String,
    pub temperature: f64,
    pub timestamp: DateTime<Utc>,
    pub playlist: PlaylistResult,
}

impl HistoryRecord {
    #[must_use]
    pub fn new(location: String, temperature: f64, playlist: PlaylistResult) -> Self {
        Self {
            location,
            temperature,
            timestamp: Utc::now(),
            playlist,
        }
    }
}

/// History record together with the id the recorder assigned
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: u64,
    #[serde(flatten)]
    pub record: HistoryRecord,
}
