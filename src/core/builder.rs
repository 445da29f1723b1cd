//! Fluent construction of map views.

use std::time::Duration;

use crate::{
    core::{
        geo::LatLng,
        state::{ControlSettings, MapKind, MapViewState, Padding},
        view::MapViewController,
    },
    input::sink::NullEventSink,
    prelude::Arc,
    runtime::Scheduler,
    sdk::MapSdk,
    traits::{EventSink, MapEngine},
    Result,
};

/// What flips a view from constructing to ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessSignal {
    /// Flip after a fixed delay posted at construction
    AfterDelay(Duration),
    /// Flip on the engine's `Loaded` event
    OnLoaded,
}

/// Builder for [`MapViewController`] instances
pub struct MapViewBuilder {
    sdk: MapSdk,
    engine: Box<dyn MapEngine>,
    scheduler: Arc<dyn Scheduler>,
    sink: Option<Arc<dyn EventSink>>,
    readiness: Option<ReadinessSignal>,
    state: MapViewState,
}

impl MapViewBuilder {
    pub fn new(sdk: MapSdk, engine: impl MapEngine + 'static, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::with_boxed_engine(sdk, Box::new(engine), scheduler)
    }

    pub fn with_boxed_engine(
        sdk: MapSdk,
        engine: Box<dyn MapEngine>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            sdk,
            engine,
            scheduler,
            sink: None,
            readiness: None,
            state: MapViewState::default(),
        }
    }

    /// Where outbound events go; dropped if unset
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn readiness(mut self, signal: ReadinessSignal) -> Self {
        self.readiness = Some(signal);
        self
    }

    /// Replaces the initial view properties wholesale
    pub fn initial_state(mut self, state: MapViewState) -> Self {
        self.state = state;
        self
    }

    /// Set the initial center and zoom level
    pub fn with_center_and_zoom(mut self, center: LatLng, zoom: f64) -> Self {
        self.state.center = center;
        self.state.zoom = zoom;
        self
    }

    /// Set zoom limits; each is clamped to the global range
    pub fn with_zoom_limits(mut self, min_zoom: Option<f64>, max_zoom: Option<f64>) -> Self {
        if let Some(min_zoom) = min_zoom {
            self.state.set_min_zoom(min_zoom);
        }
        if let Some(max_zoom) = max_zoom {
            self.state.set_max_zoom(max_zoom);
        }
        self
    }

    pub fn with_map_kind(mut self, kind: MapKind) -> Self {
        self.state.map_kind = kind;
        self
    }

    pub fn with_controls(mut self, controls: ControlSettings) -> Self {
        self.state.controls = controls;
        self
    }

    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.state.padding = padding;
        self
    }

    pub fn with_user_location(mut self, shows: bool) -> Self {
        self.state.shows_user_location = shows;
        self
    }

    /// Builds the view and initialises its engine.
    ///
    /// Fails if the SDK handle was not initialised or the initial center is
    /// out of range.
    pub fn build(self) -> Result<MapViewController> {
        self.state.center.validate()?;
        let mut state = self.state;
        state.zoom = state.clamp_zoom(state.zoom);

        let readiness = self.readiness.unwrap_or_else(|| {
            ReadinessSignal::AfterDelay(Duration::from_millis(self.sdk.config().ready_delay_ms))
        });
        let sink = self.sink.unwrap_or_else(|| Arc::new(NullEventSink));

        MapViewController::create(self.sdk, self.engine, self.scheduler, sink, readiness, state)
    }
}
