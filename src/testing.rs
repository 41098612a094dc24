//! Scripted providers for unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::Result;
use crate::catalog::{TokenProvider, TrackCatalog};
use crate::history::HistoryRecorder;
use crate::models::{
    AccessToken, GenreTag, HistoryRecord, LocationQuery, PlaylistResult, StoredRecord,
    WeatherObservation,
};
use crate::pipeline::StagePolicy;
use crate::resilience::{BreakerConfig, RetryPolicy};
use crate::weather::WeatherProvider;

/// Provider answering from a script, then repeating a fallback answer
pub struct Scripted<T> {
    script: Mutex<VecDeque<Result<T>>>,
    fallback: Result<T>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl<T: Clone> Scripted<T> {
    pub fn always(answer: Result<T>) -> Arc<Self> {
        Self::sequence(Vec::new(), answer)
    }

    pub fn sequence(script: Vec<Result<T>>, fallback: Result<T>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Arguments observed so far, rendered as strings
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    fn answer(&self, argument: Option<String>) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(argument) = argument {
            self.seen.lock().unwrap().push(argument);
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl WeatherProvider for Scripted<WeatherObservation> {
    async fn current_weather(&self, location: &LocationQuery) -> Result<WeatherObservation> {
        self.answer(Some(location.label()))
    }
}

#[async_trait]
impl TokenProvider for Scripted<AccessToken> {
    async fn obtain_token(&self) -> Result<AccessToken> {
        self.answer(None)
    }
}

#[async_trait]
impl TrackCatalog for Scripted<PlaylistResult> {
    async fn search(
        &self,
        _token: &AccessToken,
        genre: GenreTag,
        _limit: u32,
    ) -> Result<PlaylistResult> {
        self.answer(Some(genre.to_string()))
    }
}

/// Weather provider that takes the given time to answer
pub struct SlowWeather(pub Duration);

#[async_trait]
impl WeatherProvider for SlowWeather {
    async fn current_weather(&self, _location: &LocationQuery) -> Result<WeatherObservation> {
        tokio::time::sleep(self.0).await;
        Ok(WeatherObservation::new(20.0))
    }
}

/// Recorder whose storage is always broken
pub struct FailingHistory;

#[async_trait]
impl HistoryRecorder for FailingHistory {
    async fn record(&self, _record: HistoryRecord) -> anyhow::Result<u64> {
        anyhow::bail!("history storage offline")
    }

    async fn all(&self) -> anyhow::Result<Vec<StoredRecord>> {
        anyhow::bail!("history storage offline")
    }

    async fn get(&self, _id: u64) -> anyhow::Result<Option<StoredRecord>> {
        anyhow::bail!("history storage offline")
    }
}

pub fn token() -> AccessToken {
    AccessToken::new("test-token".to_string(), Some(Duration::from_secs(3600)))
}

/// Three quick attempts, breaker opening after three failed calls
pub fn fast_policy() -> StagePolicy {
    StagePolicy {
        breaker: BreakerConfig {
            window_size: 10,
            minimum_calls: 3,
            failure_rate_threshold: 50.0,
            open_duration: Duration::from_secs(30),
            half_open_probes: 1,
        },
        retry: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5)),
        call_timeout: Duration::from_secs(1),
    }
}
