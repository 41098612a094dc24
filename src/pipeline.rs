//! Playlist pipeline
//!
//! weather lookup → genre classification → token exchange → catalog search,
//! then a best-effort history write. The weather provider and the catalog
//! provider each get their own [`ResilientStage`], so one provider's breaker
//! never trips because of the other. Every run ends in exactly one
//! [`PipelineOutcome`].

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::Result;
use crate::catalog::{CatalogAuthenticator, CatalogSearcher, TokenProvider, TrackCatalog};
use crate::config::{AppConfig, StagePolicyConfig};
use crate::error::{ErrorKind, PlaylistError, Stage};
use crate::history::HistoryRecorder;
use crate::models::{
    GenreTag, HistoryRecord, LocationQuery, PipelineOutcome, PlaylistResult, WeatherObservation,
    classify,
};
use crate::resilience::{BreakerConfig, CircuitBreaker, ResilientStage, RetryPolicy};
use crate::weather::{WeatherProvider, WeatherResolver};

/// Upper bound on the history write
const PERSIST_TIMEOUT: Duration = Duration::from_secs(5);

/// Collaborators the pipeline drives
#[derive(Clone)]
pub struct Providers {
    pub weather: Arc<dyn WeatherProvider>,
    pub tokens: Arc<dyn TokenProvider>,
    pub catalog: Arc<dyn TrackCatalog>,
    pub history: Arc<dyn HistoryRecorder>,
}

/// Resilience settings for one provider
#[derive(Debug, Clone)]
pub struct StagePolicy {
    pub breaker: BreakerConfig,
    pub retry: RetryPolicy,
    pub call_timeout: Duration,
}

impl StagePolicy {
    #[must_use]
    pub fn from_config(config: &StagePolicyConfig, timeout_seconds: u32) -> Self {
        Self {
            breaker: config.breaker_config(),
            retry: config.retry_policy(),
            call_timeout: Duration::from_secs(timeout_seconds.into()),
        }
    }

    fn into_stage(self, provider: &str) -> ResilientStage {
        ResilientStage::new(
            CircuitBreaker::new(provider, self.breaker),
            self.retry,
            self.call_timeout,
        )
    }
}

/// Sole entry point of the core: location in, playlist outcome out
#[derive(Clone)]
pub struct PlaylistOrchestrator {
    providers: Providers,
    weather_stage: ResilientStage,
    catalog_stage: ResilientStage,
    search_limit: u32,
    deadline: Option<Duration>,
}

impl PlaylistOrchestrator {
    /// Each provider gets a breaker of its own
    pub fn new(providers: Providers, weather: StagePolicy, catalog: StagePolicy) -> Self {
        Self {
            providers,
            weather_stage: weather.into_stage("weather"),
            catalog_stage: catalog.into_stage("catalog"),
            search_limit: 10,
            deadline: Some(Duration::from_secs(30)),
        }
    }

    #[must_use]
    pub fn with_search_limit(mut self, search_limit: u32) -> Self {
        self.search_limit = search_limit;
        self
    }

    /// Deadline for a whole run, `None` for no deadline
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Wire the HTTP clients described by the configuration
    pub fn from_config(
        config: &AppConfig,
        history: Arc<dyn HistoryRecorder>,
    ) -> anyhow::Result<Self> {
        let providers = Providers {
            weather: Arc::new(WeatherResolver::from_config(&config.weather)?),
            tokens: Arc::new(CatalogAuthenticator::from_config(&config.catalog)?),
            catalog: Arc::new(CatalogSearcher::from_config(&config.catalog)?),
            history,
        };

        Ok(Self::new(
            providers,
            StagePolicy::from_config(&config.resilience.weather, config.weather.timeout_seconds),
            StagePolicy::from_config(&config.resilience.catalog, config.catalog.timeout_seconds),
        )
        .with_search_limit(config.catalog.search_limit)
        .with_deadline(config.pipeline.deadline()))
    }

    #[must_use]
    pub fn weather_breaker(&self) -> &Arc<CircuitBreaker> {
        self.weather_stage.breaker()
    }

    #[must_use]
    pub fn catalog_breaker(&self) -> &Arc<CircuitBreaker> {
        self.catalog_stage.breaker()
    }

    #[must_use]
    pub fn history(&self) -> &Arc<dyn HistoryRecorder> {
        &self.providers.history
    }

    pub async fn playlist_by_city(&self, city: &str) -> PipelineOutcome {
        match LocationQuery::city(city) {
            Ok(query) => self.run(query).await,
            Err(error) => self.fallback(error),
        }
    }

    pub async fn playlist_by_coordinates(&self, latitude: f64, longitude: f64) -> PipelineOutcome {
        match LocationQuery::coordinates(latitude, longitude) {
            Ok(query) => self.run(query).await,
            Err(error) => self.fallback(error),
        }
    }

    /// Run the pipeline for an already validated query
    #[instrument(skip(self), fields(location = %query))]
    pub async fn run(&self, query: LocationQuery) -> PipelineOutcome {
        let lookup = self.lookup(&query);
        let result = match self.deadline {
            Some(deadline) => timeout(deadline, lookup).await.unwrap_or_else(|_| {
                Err(PlaylistError::transient(
                    Stage::Pipeline,
                    format!("no playlist within {deadline:?}"),
                ))
            }),
            None => lookup.await,
        };

        match result {
            Ok((observation, playlist)) => {
                self.persist(&query, observation, &playlist).await;
                PipelineOutcome::Success(playlist)
            }
            Err(error) => self.fallback(error),
        }
    }

    async fn lookup(&self, query: &LocationQuery) -> Result<(WeatherObservation, PlaylistResult)> {
        let weather = &self.providers.weather;
        let observation = self
            .weather_stage
            .call(Stage::Weather, move || weather.current_weather(query))
            .await?;

        let genre = classify(observation.temperature_celsius);
        info!(
            "{} maps to {} playlist",
            observation.format_temperature(),
            genre
        );

        let playlist = self.catalog_playlist(genre).await?;
        Ok((observation, playlist))
    }

    async fn catalog_playlist(&self, genre: GenreTag) -> Result<PlaylistResult> {
        let tokens = &self.providers.tokens;
        let token = self
            .catalog_stage
            .call(Stage::Token, move || tokens.obtain_token())
            .await?;

        let catalog = &self.providers.catalog;
        let token = &token;
        let limit = self.search_limit;
        self.catalog_stage
            .call(Stage::Search, move || catalog.search(token, genre, limit))
            .await
    }

    async fn persist(
        &self,
        query: &LocationQuery,
        observation: WeatherObservation,
        playlist: &PlaylistResult,
    ) {
        let record = HistoryRecord::new(
            query.label(),
            observation.temperature_celsius,
            playlist.clone(),
        );
        match timeout(PERSIST_TIMEOUT, self.providers.history.record(record)).await {
            Ok(Ok(id)) => debug!(id, "Request recorded"),
            Ok(Err(e)) => warn!("Failed to record request for {}: {:#}", query, e),
            Err(_) => warn!("Recording request for {} timed out", query),
        }
    }

    /// Degrade a stage failure into a typed outcome
    fn fallback(&self, error: PlaylistError) -> PipelineOutcome {
        match error.kind {
            ErrorKind::NotFound | ErrorKind::InvalidInput | ErrorKind::Rejected => {
                info!(stage = %error.stage, "Request failed: {}", error);
            }
            ErrorKind::Transient
            | ErrorKind::ProviderUnavailable
            | ErrorKind::Malformed
            | ErrorKind::BreakerOpen => {
                error!("Fallback triggered for {} service: {}", error.stage, error);
            }
        }
        PipelineOutcome::failure(&error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use crate::history::InMemoryHistory;
    use crate::resilience::BreakerState;
    use crate::testing::{FailingHistory, Scripted, SlowWeather, fast_policy, token};

    struct Harness {
        weather: Arc<Scripted<WeatherObservation>>,
        tokens: Arc<Scripted<crate::models::AccessToken>>,
        catalog: Arc<Scripted<PlaylistResult>>,
        history: Arc<InMemoryHistory>,
        orchestrator: PlaylistOrchestrator,
    }

    fn harness(
        weather: Arc<Scripted<WeatherObservation>>,
        catalog: Arc<Scripted<PlaylistResult>>,
    ) -> Harness {
        let tokens = Scripted::always(Ok(token()));
        let history = Arc::new(InMemoryHistory::new());
        let orchestrator = PlaylistOrchestrator::new(
            Providers {
                weather: weather.clone(),
                tokens: tokens.clone(),
                catalog: catalog.clone(),
                history: history.clone(),
            },
            fast_policy(),
            fast_policy(),
        );
        Harness {
            weather,
            tokens,
            catalog,
            history,
            orchestrator,
        }
    }

    fn playlist(tracks: &[&str]) -> PlaylistResult {
        tracks.iter().copied().collect()
    }

    fn weather_error(kind: ErrorKind) -> PlaylistError {
        PlaylistError::new(Stage::Weather, kind, "scripted")
    }

    fn search_error(kind: ErrorKind) -> PlaylistError {
        PlaylistError::new(Stage::Search, kind, "scripted")
    }

    #[tokio::test(start_paused = true)]
    async fn test_city_success_end_to_end() {
        let h = harness(
            Scripted::always(Ok(WeatherObservation::new(15.0))),
            Scripted::always(Ok(playlist(&["A", "B"]))),
        );

        let outcome = h.orchestrator.playlist_by_city("London").await;

        assert_eq!(outcome, PipelineOutcome::Success(playlist(&["A", "B"])));
        assert_eq!(h.weather.seen(), vec!["London"]);
        assert_eq!(h.catalog.seen(), vec!["pop"]);
        assert_eq!(h.tokens.calls(), 1);

        let history = h.history.all().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].record.location, "London");
        assert_eq!(history[0].record.temperature, 15.0);
        assert_eq!(history[0].record.playlist, playlist(&["A", "B"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_coordinates_are_labelled_in_history() {
        let h = harness(
            Scripted::always(Ok(WeatherObservation::new(35.0))),
            Scripted::always(Ok(playlist(&["Party Rock"]))),
        );

        let outcome = h.orchestrator.playlist_by_coordinates(25.2, 55.3).await;

        assert!(outcome.is_success());
        assert_eq!(h.catalog.seen(), vec!["party"]);
        let history = h.history.all().await.unwrap();
        assert_eq!(history[0].record.location, "Lat: 25.2, Lon: 55.3");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_city_skips_catalog() {
        let h = harness(
            Scripted::always(Err(weather_error(ErrorKind::NotFound))),
            Scripted::always(Ok(playlist(&["A"]))),
        );

        let outcome = h.orchestrator.playlist_by_city("Nowhere").await;

        assert_eq!(outcome.error_class(), Some(ErrorClass::NotFound));
        assert_eq!(h.weather.calls(), 1);
        assert_eq!(h.tokens.calls(), 0);
        assert_eq!(h.catalog.calls(), 0);
        assert!(h.history.all().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_coordinates_rejected_before_network() {
        let h = harness(
            Scripted::always(Ok(WeatherObservation::new(15.0))),
            Scripted::always(Ok(playlist(&["A"]))),
        );

        let outcome = h.orchestrator.playlist_by_coordinates(91.0, 0.0).await;

        assert_eq!(outcome.error_class(), Some(ErrorClass::BadRequest));
        assert_eq!(h.weather.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_city_is_bad_request() {
        let h = harness(
            Scripted::always(Ok(WeatherObservation::new(15.0))),
            Scripted::always(Ok(playlist(&["A"]))),
        );

        let outcome = h.orchestrator.playlist_by_city("  ").await;
        assert_eq!(outcome.error_class(), Some(ErrorClass::BadRequest));
        assert_eq!(h.weather.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_weather_is_unavailable_without_retry() {
        let h = harness(
            Scripted::always(Err(weather_error(ErrorKind::Malformed))),
            Scripted::always(Ok(playlist(&["A"]))),
        );

        let outcome = h.orchestrator.playlist_by_city("London").await;

        assert_eq!(outcome.error_class(), Some(ErrorClass::Unavailable));
        assert_eq!(h.weather.calls(), 1);
        assert_eq!(h.catalog.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_weather_failures_are_retried() {
        let h = harness(
            Scripted::sequence(
                vec![
                    Err(weather_error(ErrorKind::Transient)),
                    Err(weather_error(ErrorKind::ProviderUnavailable)),
                ],
                Ok(WeatherObservation::new(5.0)),
            ),
            Scripted::always(Ok(playlist(&["Clair de Lune"]))),
        );

        let outcome = h.orchestrator.playlist_by_city("Oslo").await;

        assert_eq!(outcome, PipelineOutcome::Success(playlist(&["Clair de Lune"])));
        assert_eq!(h.weather.calls(), 3);
        assert_eq!(h.catalog.seen(), vec!["classical"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_weather_breaker_fails_fast_after_exhaustion() {
        let h = harness(
            Scripted::always(Err(weather_error(ErrorKind::ProviderUnavailable))),
            Scripted::always(Ok(playlist(&["A"]))),
        );

        let outcome = h.orchestrator.playlist_by_city("London").await;
        assert_eq!(outcome.error_class(), Some(ErrorClass::Unavailable));
        assert_eq!(h.weather.calls(), 3);
        assert_eq!(h.orchestrator.weather_breaker().state(), BreakerState::Open);

        let outcome = h.orchestrator.playlist_by_city("London").await;
        assert_eq!(outcome.error_class(), Some(ErrorClass::Unavailable));
        assert_eq!(h.weather.calls(), 3);

        assert_eq!(h.orchestrator.catalog_breaker().state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_catalog_breaker_does_not_affect_weather() {
        let h = harness(
            Scripted::always(Ok(WeatherObservation::new(20.0))),
            Scripted::always(Err(search_error(ErrorKind::ProviderUnavailable))),
        );

        let outcome = h.orchestrator.playlist_by_city("London").await;
        assert_eq!(outcome.error_class(), Some(ErrorClass::Unavailable));
        assert_eq!(h.orchestrator.catalog_breaker().state(), BreakerState::Open);
        assert_eq!(h.orchestrator.weather_breaker().state(), BreakerState::Closed);
        let searches = h.catalog.calls();

        // weather keeps being asked, the catalog is not
        let outcome = h.orchestrator.playlist_by_city("London").await;
        assert_eq!(outcome.error_class(), Some(ErrorClass::Unavailable));
        assert_eq!(h.weather.calls(), 2);
        assert_eq!(h.catalog.calls(), searches);
        assert_eq!(h.orchestrator.weather_breaker().state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_failure_skips_search() {
        let weather = Scripted::always(Ok(WeatherObservation::new(12.0)));
        let catalog = Scripted::always(Ok(playlist(&["A"])));
        let tokens =
            Scripted::always(Err(PlaylistError::malformed(Stage::Token, "no access_token")));
        let orchestrator = PlaylistOrchestrator::new(
            Providers {
                weather: weather.clone(),
                tokens: tokens.clone(),
                catalog: catalog.clone(),
                history: Arc::new(InMemoryHistory::new()),
            },
            fast_policy(),
            fast_policy(),
        );

        let outcome = orchestrator.playlist_by_city("London").await;

        assert_eq!(outcome.error_class(), Some(ErrorClass::Unavailable));
        assert_eq!(tokens.calls(), 1);
        assert_eq!(catalog.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_catalog_result_is_success() {
        let h = harness(
            Scripted::always(Ok(WeatherObservation::new(11.0))),
            Scripted::always(Ok(PlaylistResult::default())),
        );

        let outcome = h.orchestrator.playlist_by_city("London").await;
        assert_eq!(outcome, PipelineOutcome::Success(PlaylistResult::default()));
        assert_eq!(h.catalog.seen(), vec!["rock"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_failure_does_not_fail_run() {
        let orchestrator = PlaylistOrchestrator::new(
            Providers {
                weather: Scripted::always(Ok(WeatherObservation::new(15.0))),
                tokens: Scripted::always(Ok(token())),
                catalog: Scripted::always(Ok(playlist(&["A", "B"]))),
                history: Arc::new(FailingHistory),
            },
            fast_policy(),
            fast_policy(),
        );

        let outcome = orchestrator.playlist_by_city("London").await;
        assert_eq!(outcome, PipelineOutcome::Success(playlist(&["A", "B"])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_run_without_booking() {
        let orchestrator = PlaylistOrchestrator::new(
            Providers {
                weather: Arc::new(SlowWeather(Duration::from_secs(60))),
                tokens: Scripted::always(Ok(token())),
                catalog: Scripted::always(Ok(playlist(&["A"]))),
                history: Arc::new(InMemoryHistory::new()),
            },
            StagePolicy {
                call_timeout: Duration::from_secs(10),
                ..fast_policy()
            },
            fast_policy(),
        )
        .with_deadline(Some(Duration::from_secs(2)));

        let outcome = orchestrator.playlist_by_city("London").await;

        assert_eq!(outcome.error_class(), Some(ErrorClass::Unavailable));
        assert_eq!(orchestrator.weather_breaker().recorded_calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_runs() {
        let h = harness(
            Scripted::always(Ok(WeatherObservation::new(25.0))),
            Scripted::always(Ok(playlist(&["A", "B"]))),
        );

        let mut handles = Vec::new();
        for i in 0..20 {
            let orchestrator = h.orchestrator.clone();
            handles.push(tokio::spawn(async move {
                orchestrator.playlist_by_city(&format!("City {i}")).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_success());
        }

        assert_eq!(h.weather.calls(), 20);
        assert_eq!(h.history.all().await.unwrap().len(), 20);
    }
}
