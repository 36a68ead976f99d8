//! Weather state coordinator.
//!
//! Owns the screen's interaction state and sequences calls to the weather and
//! place gateways, the persisted view state and the location provider in
//! response to user triggers. Gateway failures end up in the read model as
//! `weather_error` / `forecast_error` (or as a [`Notice`] for suggestion
//! selection) and never propagate past this type.
//!
//! All trigger methods must be called from within a Tokio runtime: the search
//! debounce and the skeleton hold run on spawned timers.

use serde::{Serialize, de::DeserializeOwned};
use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
    time::Instant,
};

use crate::{
    error::GatewayError,
    location::{LocationProvider, Permission, PositionOptions, acquire_position},
    model::{Coordinates, ForecastSnapshot, Suggestion, WeatherSnapshot},
    provider::{PlaceGateway, WeatherGateway},
    store::{StorageKey, ViewStateStore},
};

/// Shown when a picked suggestion could not be turned into weather.
pub const SELECTION_FAILED_MESSAGE: &str =
    "Failed to get weather for selected location. Please try again.";

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Quiet period after the last keystroke before autocomplete runs.
    pub debounce: Duration,
    /// How long the skeleton stays up after the last weather fetch settles.
    pub skeleton_hold: Duration,
    pub forecast_days: u8,
    pub position: PositionOptions,
    /// Fall back to device location at startup when nothing usable was persisted.
    pub locate_on_start: bool,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            skeleton_hold: Duration::from_millis(1500),
            forecast_days: 7,
            position: PositionOptions::default(),
            locate_on_start: true,
        }
    }
}

/// Read model handed to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinatorState {
    pub query: String,
    pub suggestions: Vec<Suggestion>,
    /// Input text the current `suggestions` answer; empty when they were cleared.
    pub suggestion_input: String,
    pub weather: Option<WeatherSnapshot>,
    pub forecast: Option<ForecastSnapshot>,
    pub weather_error: Option<String>,
    pub forecast_error: Option<String>,
    pub searching: bool,
    pub suggestions_loading: bool,
    pub refreshing: bool,
    pub show_skeleton: bool,
    pub weather_loading: bool,
    pub forecast_loading: bool,
}

/// One-shot, user-facing notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    SelectionFailed { message: String },
}

#[derive(Debug, Clone, Copy)]
enum Flag {
    Searching,
    SuggestionsLoading,
    Refreshing,
}

impl Flag {
    fn slot(self, state: &mut CoordinatorState) -> &mut bool {
        match self {
            Flag::Searching => &mut state.searching,
            Flag::SuggestionsLoading => &mut state.suggestions_loading,
            Flag::Refreshing => &mut state.refreshing,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum WeatherTarget<'a> {
    City(&'a str),
    Coords(Coordinates),
}

/// Fetch bookkeeping behind `show_skeleton`, `weather_loading` and `forecast_loading`.
#[derive(Debug, Default)]
struct Activity {
    skeleton_pins: usize,
    weather_in_flight: usize,
    forecast_in_flight: usize,
    hold_until: Option<Instant>,
    release: Option<JoinHandle<()>>,
}

impl Activity {
    fn cancel_release(&mut self) {
        if let Some(timer) = self.release.take() {
            timer.abort();
        }
    }

    fn skeleton_needed(&self) -> bool {
        self.skeleton_pins > 0 || self.weather_in_flight > 0
    }
}

struct Inner {
    weather: Arc<dyn WeatherGateway>,
    places: Arc<dyn PlaceGateway>,
    store: Arc<dyn ViewStateStore>,
    location: Arc<dyn LocationProvider>,
    settings: CoordinatorSettings,
    state: watch::Sender<CoordinatorState>,
    notices: broadcast::Sender<Notice>,
    debounce: Mutex<Option<JoinHandle<()>>>,
    activity: Mutex<Activity>,
}

/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct WeatherCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for WeatherCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherCoordinator")
            .field("state", &*self.inner.state.borrow())
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl WeatherCoordinator {
    pub fn new(
        weather: Arc<dyn WeatherGateway>,
        places: Arc<dyn PlaceGateway>,
        store: Arc<dyn ViewStateStore>,
        location: Arc<dyn LocationProvider>,
        settings: CoordinatorSettings,
    ) -> Self {
        let (state, _) = watch::channel(CoordinatorState::default());
        let (notices, _) = broadcast::channel(16);

        Self {
            inner: Arc::new(Inner {
                weather,
                places,
                store,
                location,
                settings,
                state,
                notices,
                debounce: Mutex::new(None),
                activity: Mutex::new(Activity::default()),
            }),
        }
    }

    /// Current read model.
    pub fn state(&self) -> CoordinatorState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that wakes on every state change.
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.inner.state.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }

    /// Store the input text and schedule a debounced autocomplete for it.
    ///
    /// Each call cancels the previously scheduled (not yet dispatched) fetch.
    /// A fetch already in flight is left to finish. Blank text clears the
    /// suggestions immediately and schedules nothing.
    pub fn set_search_text(&self, text: impl Into<String>) {
        let text = text.into();
        let blank = text.trim().is_empty();

        self.update(|s| {
            s.query = text.clone();
            if blank {
                s.suggestions.clear();
                s.suggestion_input.clear();
            }
        });

        let mut timer = lock(&self.inner.debounce);
        if let Some(pending) = timer.take() {
            pending.abort();
        }
        if blank {
            return;
        }

        let this = self.clone();
        let delay = self.inner.settings.debounce;
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Detached so that cancelling the timer can no longer reach it.
            tokio::spawn(async move { this.fetch_suggestions(text).await });
        }));
    }

    /// Look up the current query as a city name, then its forecast.
    pub async fn search(&self) {
        let query = self.inner.state.borrow().query.trim().to_string();
        if query.is_empty() {
            tracing::debug!("search skipped: empty query");
            return;
        }

        self.cancel_pending_suggestions();
        let _searching = self.raise(Flag::Searching);

        let Ok(snapshot) = self.load_weather(WeatherTarget::City(&query)).await else {
            return;
        };
        self.update(|s| {
            s.query.clear();
            s.suggestions.clear();
            s.suggestion_input.clear();
        });
        self.persist(StorageKey::SelectedCity, query.clone()).await;

        // The forecast follows the place the provider resolved, not the raw text.
        let _ = self.load_forecast(snapshot.location.coordinates()).await;
        tracing::info!(%query, location = %snapshot.location.name, "search finished");
    }

    /// Resolve a picked suggestion and load weather and forecast for it in parallel.
    pub async fn select_suggestion(&self, suggestion: Suggestion) {
        self.cancel_pending_suggestions();
        self.update(|s| {
            s.query = suggestion.description.clone();
            s.suggestions.clear();
            s.suggestion_input.clear();
        });

        let _searching = self.raise(Flag::Searching);
        let _suggestions_loading = self.raise(Flag::SuggestionsLoading);
        let _skeleton = self.pin_skeleton();

        match self.resolve_and_load(&suggestion).await {
            Ok(()) => {
                self.persist(StorageKey::SelectedCity, suggestion.description.clone()).await;
                tracing::info!(place = %suggestion.description, "suggestion loaded");
            }
            Err(e) => {
                tracing::warn!(
                    place = %suggestion.description,
                    error = %e,
                    "suggestion selection failed"
                );
                let _ = self.inner.notices.send(Notice::SelectionFailed {
                    message: SELECTION_FAILED_MESSAGE.to_string(),
                });
                self.update(|s| s.query.clear());
            }
        }
    }

    /// Load weather for the device position, if the user allows it.
    pub async fn request_location(&self) {
        if self.inner.location.request_permission().await == Permission::Denied {
            tracing::debug!("location permission denied");
            return;
        }

        let _skeleton = self.pin_skeleton();

        let at = match acquire_position(self.inner.location.as_ref(), self.inner.settings.position)
            .await
        {
            Ok(at) => at,
            Err(e) => {
                tracing::warn!(error = %e, "could not get device position");
                return;
            }
        };

        let _ = self.load_weather(WeatherTarget::Coords(at)).await;
        let _ = self.load_forecast(at).await;
        tracing::info!(lat = at.lat, lon = at.lon, "location weather finished");
    }

    /// Re-fetch weather and forecast for the place currently shown.
    pub async fn refresh(&self) {
        let Some(at) = self.current_coordinates() else {
            tracing::debug!("refresh skipped: nothing loaded yet");
            return;
        };

        let _refreshing = self.raise(Flag::Refreshing);
        let _ = self.load_weather(WeatherTarget::Coords(at)).await;
        let _ = self.load_forecast(at).await;
    }

    /// Startup: restore the last city and swap the persisted payload for live data.
    pub async fn restore(&self) {
        if let Some(city) = self.read(StorageKey::SelectedCity).await {
            self.update(|s| s.query = city);
        }

        let saved: Option<WeatherSnapshot> = self.read_json(StorageKey::WeatherPayload).await;
        let at = saved
            .as_ref()
            .map(|w| w.location.coordinates())
            .filter(Coordinates::is_valid);

        match at {
            Some(at) => {
                let saved_forecast: Option<ForecastSnapshot> =
                    self.read_json(StorageKey::ForecastPayload).await;
                self.update(|s| {
                    s.weather = saved;
                    if saved_forecast.is_some() {
                        s.forecast = saved_forecast;
                    }
                });

                tracing::debug!(lat = at.lat, lon = at.lon, "refreshing persisted location");
                let _ = tokio::join!(
                    self.load_weather(WeatherTarget::Coords(at)),
                    self.load_forecast(at)
                );
            }
            None if self.inner.settings.locate_on_start => self.request_location().await,
            None => {}
        }
    }

    async fn resolve_and_load(&self, suggestion: &Suggestion) -> Result<(), GatewayError> {
        let at = self.inner.places.resolve(&suggestion.place_id).await?;

        let (weather, forecast) =
            tokio::join!(self.load_weather(WeatherTarget::Coords(at)), self.load_forecast(at));
        weather?;
        forecast
    }

    async fn fetch_suggestions(&self, input: String) {
        let _loading = self.raise(Flag::SuggestionsLoading);

        let result = self.inner.places.autocomplete(&input).await;
        match result {
            Ok(list) => {
                tracing::debug!(%input, count = list.len(), "suggestions received");
                self.update(|s| {
                    s.suggestions = list;
                    s.suggestion_input = input;
                });
            }
            Err(e) => {
                tracing::warn!(%input, error = %e, "autocomplete failed");
                self.update(|s| {
                    s.suggestions.clear();
                    s.suggestion_input = input;
                });
            }
        }
    }

    /// Fetch current weather, recording the outcome in the read model.
    async fn load_weather(
        &self,
        target: WeatherTarget<'_>,
    ) -> Result<WeatherSnapshot, GatewayError> {
        let fetch = self.begin_weather_fetch();

        let result = match target {
            WeatherTarget::City(name) => self.inner.weather.current_by_city(name).await,
            WeatherTarget::Coords(at) => self.inner.weather.current_by_coords(at).await,
        };

        match &result {
            Ok(snapshot) => self.update(|s| s.weather = Some(snapshot.clone())),
            Err(e) => {
                tracing::warn!(?target, error = %e, "weather fetch failed");
                self.update(|s| s.weather_error = Some(e.message().to_string()));
            }
        }
        drop(fetch);

        if let Ok(snapshot) = &result {
            self.persist_json(StorageKey::WeatherPayload, snapshot).await;
        }
        result
    }

    async fn load_forecast(&self, at: Coordinates) -> Result<(), GatewayError> {
        let fetch = self.begin_forecast_fetch();

        let result = self.inner.weather.forecast(at, self.inner.settings.forecast_days).await;

        match &result {
            Ok(forecast) => self.update(|s| s.forecast = Some(forecast.clone())),
            Err(e) => {
                tracing::warn!(lat = at.lat, lon = at.lon, error = %e, "forecast fetch failed");
                self.update(|s| s.forecast_error = Some(e.message().to_string()));
            }
        }
        drop(fetch);

        let forecast = result?;
        self.persist_json(StorageKey::ForecastPayload, &forecast).await;
        Ok(())
    }

    fn current_coordinates(&self) -> Option<Coordinates> {
        self.inner.state.borrow().weather.as_ref().map(|w| w.location.coordinates())
    }

    fn cancel_pending_suggestions(&self) {
        if let Some(pending) = lock(&self.inner.debounce).take() {
            pending.abort();
        }
    }

    fn update(&self, f: impl FnOnce(&mut CoordinatorState)) {
        self.inner.state.send_modify(f);
    }

    fn activity(&self) -> MutexGuard<'_, Activity> {
        lock(&self.inner.activity)
    }

    fn raise(&self, flag: Flag) -> FlagGuard<'_> {
        self.update(|s| *flag.slot(s) = true);
        FlagGuard { coordinator: self, flag }
    }

    fn pin_skeleton(&self) -> SkeletonPin<'_> {
        let mut activity = self.activity();
        activity.skeleton_pins += 1;
        activity.cancel_release();
        self.update(|s| s.show_skeleton = true);
        SkeletonPin { coordinator: self }
    }

    fn begin_weather_fetch(&self) -> WeatherFetch<'_> {
        let mut activity = self.activity();
        activity.weather_in_flight += 1;
        activity.cancel_release();
        self.update(|s| {
            s.weather_loading = true;
            s.weather_error = None;
            s.show_skeleton = true;
        });
        WeatherFetch { coordinator: self }
    }

    fn end_weather_fetch(&self) {
        {
            let mut activity = self.activity();
            activity.weather_in_flight = activity.weather_in_flight.saturating_sub(1);
            if activity.weather_in_flight == 0 {
                activity.hold_until = Some(Instant::now() + self.inner.settings.skeleton_hold);
                self.update(|s| s.weather_loading = false);
            }
        }
        self.schedule_skeleton_release();
    }

    fn begin_forecast_fetch(&self) -> ForecastFetch<'_> {
        let mut activity = self.activity();
        activity.forecast_in_flight += 1;
        self.update(|s| {
            s.forecast_loading = true;
            s.forecast_error = None;
        });
        ForecastFetch { coordinator: self }
    }

    fn end_forecast_fetch(&self) {
        let mut activity = self.activity();
        activity.forecast_in_flight = activity.forecast_in_flight.saturating_sub(1);
        if activity.forecast_in_flight == 0 {
            self.update(|s| s.forecast_loading = false);
        }
    }

    fn unpin_skeleton(&self) {
        {
            let mut activity = self.activity();
            activity.skeleton_pins = activity.skeleton_pins.saturating_sub(1);
        }
        self.schedule_skeleton_release();
    }

    /// Drop the skeleton once nothing needs it and the hold window has passed.
    fn schedule_skeleton_release(&self) {
        let mut activity = self.activity();
        if activity.skeleton_needed() {
            return;
        }
        activity.cancel_release();

        let remaining = activity
            .hold_until
            .map(|until| until.saturating_duration_since(Instant::now()))
            .unwrap_or_default();

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) if !remaining.is_zero() => handle,
            _ => {
                self.update(|s| s.show_skeleton = false);
                return;
            }
        };

        let this = self.clone();
        activity.release = Some(handle.spawn(async move {
            tokio::time::sleep(remaining).await;
            this.release_skeleton_if_idle();
        }));
    }

    fn release_skeleton_if_idle(&self) {
        let activity = self.activity();
        let held = activity.hold_until.is_some_and(|until| Instant::now() < until);
        if !activity.skeleton_needed() && !held {
            self.update(|s| s.show_skeleton = false);
        }
    }

    async fn read(&self, key: StorageKey) -> Option<String> {
        match self.inner.store.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = key.as_str(), error = %e, "failed to read view state");
                None
            }
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: StorageKey) -> Option<T> {
        let raw = self.read(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = key.as_str(), error = %e, "ignoring unreadable view state");
                None
            }
        }
    }

    async fn persist(&self, key: StorageKey, value: String) {
        if let Err(e) = self.inner.store.set(key, value).await {
            tracing::warn!(key = key.as_str(), error = %e, "failed to save view state");
        }
    }

    async fn persist_json<T: Serialize>(&self, key: StorageKey, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => self.persist(key, json).await,
            Err(e) => tracing::warn!(key = key.as_str(), error = %e, "failed to encode view state"),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Clears its flag when dropped, whichever way the operation ends.
struct FlagGuard<'a> {
    coordinator: &'a WeatherCoordinator,
    flag: Flag,
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        let flag = self.flag;
        self.coordinator.update(|s| *flag.slot(s) = false);
    }
}

struct SkeletonPin<'a> {
    coordinator: &'a WeatherCoordinator,
}

impl Drop for SkeletonPin<'_> {
    fn drop(&mut self) {
        self.coordinator.unpin_skeleton();
    }
}

struct WeatherFetch<'a> {
    coordinator: &'a WeatherCoordinator,
}

impl Drop for WeatherFetch<'_> {
    fn drop(&mut self) {
        self.coordinator.end_weather_fetch();
    }
}

struct ForecastFetch<'a> {
    coordinator: &'a WeatherCoordinator,
}

impl Drop for ForecastFetch<'_> {
    fn drop(&mut self) {
        self.coordinator.end_forecast_fetch();
    }
}
