//! The map view controller.
//!
//! [`MapViewState`] is always written first. Before the readiness flip no
//! engine call is made and `has_pending_operations` is raised instead; the
//! flip then replays the whole state once. Annotation registries and the
//! info window only exist after the flip.

use std::time::Duration;

use parking_lot::Mutex;

use crate::{
    core::{
        builder::ReadinessSignal,
        geo::{LatLng, LatLngBounds},
        state::{MapKind, MapViewState, Padding},
    },
    input::events::{DragPhase, EngineEvent, MapEvent},
    layers::{
        info_window::{InfoWindowManager, InfoWindowOptions},
        marker::{MarkerPatch, MarkerRecord, MarkerSpec},
        overlay::{OverlayAttributes, OverlayKind, OverlayPatch, OverlayRecord, OverlaySpec},
        registry::{Annotation, AnnotationRegistry},
    },
    prelude::{Arc, Weak},
    runtime::{Scheduler, TimerHandle},
    sdk::MapSdk,
    traits::{EventSink, MapEngine},
    ErrorPayload, MapError, Result,
};

/// Collaborators that only exist once the view is ready
struct Annotations {
    markers: AnnotationRegistry<MarkerRecord>,
    overlays: AnnotationRegistry<OverlayRecord>,
    info_window: InfoWindowManager,
}

impl Annotations {
    fn new() -> Self {
        Self {
            markers: AnnotationRegistry::new(),
            overlays: AnnotationRegistry::new(),
            info_window: InfoWindowManager::new(),
        }
    }
}

struct ViewInner {
    state: MapViewState,
    engine: Option<Box<dyn MapEngine>>,
    annotations: Option<Annotations>,
    readiness: ReadinessSignal,
    ready_timer: Option<TimerHandle>,
    destroyed: bool,
}

struct ViewShared {
    id: u64,
    inner: Mutex<ViewInner>,
    scheduler: Arc<dyn Scheduler>,
    sink: Arc<dyn EventSink>,
    // Keeps the SDK handle alive for as long as the view is
    _sdk: MapSdk,
}

/// Pushes the entire state to the engine.
///
/// Every call is attempted; the first failure is returned.
fn apply_full_state(engine: &mut dyn MapEngine, state: &MapViewState) -> Result<()> {
    let results = [
        engine.set_zoom_limits(state.min_zoom, state.max_zoom),
        engine.set_status(&state.status()),
        engine.set_map_kind(state.map_kind),
        engine.set_my_location_enabled(
            state.shows_user_location,
            state.user_location_accuracy_circle,
        ),
        engine.set_controls(&state.controls),
        engine.set_layers(state.traffic_enabled, state.buildings_enabled),
        engine.set_padding(state.padding),
    ];
    results.into_iter().collect()
}

/// Controller for one map view instance.
///
/// Cheap to clone; clones control the same view. All methods may be called
/// at any point of the lifecycle, including after [`destroy`](Self::destroy).
#[derive(Clone)]
pub struct MapViewController {
    shared: Arc<ViewShared>,
}

impl MapViewController {
    /// Use [`crate::MapViewBuilder`] instead
    pub(crate) fn create(
        sdk: MapSdk,
        mut engine: Box<dyn MapEngine>,
        scheduler: Arc<dyn Scheduler>,
        sink: Arc<dyn EventSink>,
        readiness: ReadinessSignal,
        state: MapViewState,
    ) -> Result<Self> {
        sdk.ensure_initialized()?;

        let id = sdk.next_view_id();
        let initialized = engine.initialize();
        let controller = Self {
            shared: Arc::new(ViewShared {
                id,
                inner: Mutex::new(ViewInner {
                    state: MapViewState {
                        is_ready: false,
                        is_loaded: false,
                        has_pending_operations: false,
                        ..state
                    },
                    engine: initialized.is_ok().then_some(engine),
                    annotations: None,
                    readiness,
                    ready_timer: None,
                    destroyed: false,
                }),
                scheduler,
                sink,
                _sdk: sdk,
            }),
        };

        match initialized {
            Ok(()) => {
                log::debug!("map view {id} created, waiting for readiness ({readiness:?})");
                if let ReadinessSignal::AfterDelay(delay) = readiness {
                    let timer = controller.schedule(delay, |view| view.mark_ready());
                    controller.shared.inner.lock().ready_timer = Some(timer);
                }
            }
            Err(e) => {
                log::error!("map view {id}: engine failed to initialize: {e}");
                controller.emit(vec![MapEvent::MapError(e.to_payload())]);
            }
        }
        Ok(controller)
    }

    fn from_weak(weak: &Weak<ViewShared>) -> Option<Self> {
        weak.upgrade().map(|shared| Self { shared })
    }

    fn schedule(&self, delay: Duration, f: impl FnOnce(MapViewController) + Send + 'static) -> TimerHandle {
        let weak = Arc::downgrade(&self.shared);
        self.shared.scheduler.schedule(
            delay,
            Box::new(move || {
                if let Some(view) = Self::from_weak(&weak) {
                    f(view);
                }
            }),
        )
    }

    fn emit(&self, events: Vec<MapEvent>) {
        for event in events {
            self.shared.sink.emit(event);
        }
    }

    /// Id of this view, unique per SDK handle
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Writes state, then forwards to the engine or marks the write pending
    fn write<U, A>(&self, what: &str, update: U, apply: A)
    where
        U: FnOnce(&mut MapViewState),
        A: FnOnce(&mut dyn MapEngine, &MapViewState) -> Result<()>,
    {
        let mut events = Vec::new();
        {
            let mut guard = self.shared.inner.lock();
            let inner = &mut *guard;
            update(&mut inner.state);

            match inner.engine.as_deref_mut() {
                Some(engine) if inner.state.is_ready => {
                    if let Err(e) = apply(engine, &inner.state) {
                        log::error!("map view {}: failed to apply {what}: {e}", self.shared.id);
                        events.push(MapEvent::MapError(e.to_payload()));
                    }
                }
                _ => {
                    log::trace!("map view {}: deferring {what}", self.shared.id);
                    inner.state.has_pending_operations = true;
                }
            }
        }
        self.emit(events);
    }

    fn reject(&self, what: &str, error: MapError) {
        log::warn!("map view {}: rejected {what}: {error}", self.shared.id);
        self.emit(vec![MapEvent::MapError(error.to_payload())]);
    }

    pub fn set_center(&self, center: LatLng) {
        if let Err(e) = center.validate() {
            return self.reject("center", e);
        }
        self.write(
            "center",
            |state| state.center = center,
            |engine, state| engine.set_status(&state.status()),
        );
    }

    /// Sets the zoom, clamped into the current zoom limits
    pub fn set_zoom(&self, zoom: f64) {
        if !zoom.is_finite() {
            return self.reject("zoom", MapError::InvalidParameter(format!("zoom {zoom}")));
        }
        self.write(
            "zoom",
            |state| state.zoom = state.clamp_zoom(zoom),
            |engine, state| engine.set_status(&state.status()),
        );
    }

    pub fn set_map_kind(&self, kind: MapKind) {
        self.write(
            "map kind",
            |state| state.map_kind = kind,
            |engine, state| engine.set_map_kind(state.map_kind),
        );
    }

    /// String form of [`set_map_kind`](Self::set_map_kind); unknown names are ignored
    pub fn set_map_type(&self, name: &str) {
        match name.parse::<MapKind>() {
            Ok(kind) => self.set_map_kind(kind),
            Err(e) => log::warn!("map view {}: {e}; keeping current map type", self.shared.id),
        }
    }

    pub fn set_shows_user_location(&self, shows: bool) {
        self.write(
            "user location",
            |state| state.shows_user_location = shows,
            |engine, state| {
                engine.set_my_location_enabled(
                    state.shows_user_location,
                    state.user_location_accuracy_circle,
                )
            },
        );
    }

    pub fn set_user_location_accuracy_circle_enabled(&self, enabled: bool) {
        self.write(
            "accuracy circle",
            |state| state.user_location_accuracy_circle = enabled,
            |engine, state| {
                engine.set_my_location_enabled(
                    state.shows_user_location,
                    state.user_location_accuracy_circle,
                )
            },
        );
    }

    fn write_controls(&self, what: &str, update: impl FnOnce(&mut MapViewState)) {
        self.write(what, update, |engine, state| engine.set_controls(&state.controls));
    }

    pub fn set_zoom_controls_enabled(&self, enabled: bool) {
        self.write_controls("zoom controls", |s| s.controls.zoom_controls = enabled);
    }

    pub fn set_compass_enabled(&self, enabled: bool) {
        self.write_controls("compass", |s| s.controls.compass = enabled);
    }

    pub fn set_scale_control_enabled(&self, enabled: bool) {
        self.write_controls("scale control", |s| s.controls.scale_control = enabled);
    }

    pub fn set_rotate_gestures_enabled(&self, enabled: bool) {
        self.write_controls("rotate gestures", |s| s.controls.rotate_gestures = enabled);
    }

    pub fn set_scroll_gestures_enabled(&self, enabled: bool) {
        self.write_controls("scroll gestures", |s| s.controls.scroll_gestures = enabled);
    }

    pub fn set_zoom_gestures_enabled(&self, enabled: bool) {
        self.write_controls("zoom gestures", |s| s.controls.zoom_gestures = enabled);
    }

    pub fn set_overlook_gestures_enabled(&self, enabled: bool) {
        self.write_controls("overlook gestures", |s| s.controls.overlook_gestures = enabled);
    }

    pub fn set_traffic_enabled(&self, enabled: bool) {
        self.write(
            "traffic layer",
            |state| state.traffic_enabled = enabled,
            |engine, state| engine.set_layers(state.traffic_enabled, state.buildings_enabled),
        );
    }

    pub fn set_buildings_enabled(&self, enabled: bool) {
        self.write(
            "buildings layer",
            |state| state.buildings_enabled = enabled,
            |engine, state| engine.set_layers(state.traffic_enabled, state.buildings_enabled),
        );
    }

    pub fn set_padding(&self, padding: Padding) {
        self.write(
            "padding",
            |state| state.padding = padding,
            |engine, state| engine.set_padding(state.padding),
        );
    }

    /// Lower zoom bound, clamped to the global range; may drag zoom and max along
    pub fn set_min_zoom_level(&self, min_zoom: f64) {
        if !min_zoom.is_finite() {
            return self.reject("min zoom", MapError::InvalidParameter(format!("min zoom {min_zoom}")));
        }
        self.write(
            "min zoom",
            |state| state.set_min_zoom(min_zoom),
            |engine, state| {
                engine.set_zoom_limits(state.min_zoom, state.max_zoom)?;
                engine.set_status(&state.status())
            },
        );
    }

    /// Upper bound counterpart of [`set_min_zoom_level`](Self::set_min_zoom_level)
    pub fn set_max_zoom_level(&self, max_zoom: f64) {
        if !max_zoom.is_finite() {
            return self.reject("max zoom", MapError::InvalidParameter(format!("max zoom {max_zoom}")));
        }
        self.write(
            "max zoom",
            |state| state.set_max_zoom(max_zoom),
            |engine, state| {
                engine.set_zoom_limits(state.min_zoom, state.max_zoom)?;
                engine.set_status(&state.status())
            },
        );
    }

    /// Centers on `center` and, once ready, fits the span around it.
    ///
    /// Only the center survives a replay; the span is a one-off camera move.
    pub fn set_region(&self, center: LatLng, lat_delta: f64, lng_delta: f64) {
        if let Err(e) = center.validate() {
            return self.reject("region", e);
        }
        if !(lat_delta.is_finite() && lng_delta.is_finite() && lat_delta >= 0.0 && lng_delta >= 0.0) {
            return self.reject(
                "region",
                MapError::InvalidParameter(format!("region span {lat_delta}x{lng_delta}")),
            );
        }
        let bounds = LatLngBounds::from_center_span(center, lat_delta, lng_delta);
        self.write(
            "region",
            |state| state.center = center,
            |engine, _| engine.fit_bounds(&bounds),
        );
    }

    /// The readiness flip. One-way; later calls are no-ops.
    fn mark_ready(&self) {
        let mut events = Vec::new();
        {
            let mut guard = self.shared.inner.lock();
            let inner = &mut *guard;
            if inner.destroyed || inner.state.is_ready {
                return;
            }
            let Some(engine) = inner.engine.as_deref_mut() else {
                return;
            };

            inner.state.is_ready = true;
            inner.ready_timer = None;
            inner.annotations = Some(Annotations::new());
            if let Err(e) = apply_full_state(engine, &inner.state) {
                log::error!("map view {}: replay on ready failed: {e}", self.shared.id);
                events.push(MapEvent::MapError(e.to_payload()));
            }
            inner.state.has_pending_operations = false;
            log::debug!("map view {} is ready", self.shared.id);
            events.push(MapEvent::MapReady);
        }
        self.emit(events);
    }

    /// Commit boundary of a UI update batch.
    ///
    /// Replays the full state if writes are still pending on a ready view.
    /// Returns true if a replay happened.
    pub fn after_update_transaction(&self) -> bool {
        let pending = {
            let inner = self.shared.inner.lock();
            inner.state.is_ready && inner.state.has_pending_operations
        };
        pending && self.replay()
    }

    /// Pushes the entire current state to the engine; false before readiness
    pub fn replay(&self) -> bool {
        let mut events = Vec::new();
        let replayed = {
            let mut guard = self.shared.inner.lock();
            let inner = &mut *guard;
            match inner.engine.as_deref_mut() {
                Some(engine) if inner.state.is_ready => {
                    if let Err(e) = apply_full_state(engine, &inner.state) {
                        log::error!("map view {}: replay failed: {e}", self.shared.id);
                        events.push(MapEvent::MapError(e.to_payload()));
                    }
                    inner.state.has_pending_operations = false;
                    true
                }
                _ => false,
            }
        };
        self.emit(events);
        replayed
    }

    /// Handles a notification from the engine
    pub fn dispatch(&self, event: EngineEvent) {
        let mut events = Vec::new();
        let mut flip = false;
        {
            let mut guard = self.shared.inner.lock();
            let inner = &mut *guard;
            if inner.destroyed {
                log::debug!("map view {}: ignoring {event:?} after destroy", self.shared.id);
                return;
            }

            match event {
                EngineEvent::Loaded => {
                    inner.state.is_loaded = true;
                    events.push(MapEvent::MapLoaded { loaded: true });
                    flip = inner.readiness == ReadinessSignal::OnLoaded;
                }
                EngineEvent::Click { coordinate } => {
                    events.push(MapEvent::MapClick { coordinate });
                }
                EngineEvent::LongClick { coordinate } => {
                    events.push(MapEvent::MapLongClick { coordinate });
                }
                EngineEvent::StatusChangeFinish { status } => {
                    if status.center.is_valid() {
                        inner.state.center = status.center;
                    }
                    if status.zoom.is_finite() {
                        inner.state.zoom = inner.state.clamp_zoom(status.zoom);
                    }
                    events.push(MapEvent::MapStatusChange {
                        center: inner.state.center,
                        zoom: inner.state.zoom,
                        overlook: 0.0,
                        rotation: 0.0,
                    });
                }
                EngineEvent::MarkerClick { handle } => {
                    let marker = inner.annotations.as_ref().and_then(|a| {
                        let id = a.markers.id_for_handle(handle)?;
                        a.markers.get(id)
                    });
                    match marker {
                        Some(marker) => events.push(MapEvent::MarkerPress {
                            marker_id: marker.id.clone(),
                            coordinate: marker.coordinate,
                        }),
                        None => log::debug!("click on unknown marker handle {handle:?}"),
                    }
                }
                EngineEvent::MarkerDrag {
                    handle,
                    phase,
                    coordinate,
                } => {
                    let marker_id = inner.annotations.as_mut().and_then(|a| {
                        let id = a.markers.id_for_handle(handle)?.to_string();
                        if phase == DragPhase::End {
                            a.markers.with_record_mut(&id, |m| m.coordinate = coordinate);
                        }
                        Some(id)
                    });
                    match marker_id {
                        Some(marker_id) => events.push(match phase {
                            DragPhase::Start => MapEvent::MarkerDragStart {
                                marker_id,
                                coordinate,
                            },
                            DragPhase::Drag => MapEvent::MarkerDrag {
                                marker_id,
                                coordinate,
                            },
                            DragPhase::End => MapEvent::MarkerDragEnd {
                                marker_id,
                                coordinate,
                            },
                        }),
                        None => log::debug!("drag on unknown marker handle {handle:?}"),
                    }
                }
                EngineEvent::InfoWindowClick => {
                    if let Some(a) = inner.annotations.as_ref() {
                        a.info_window.press(&mut events);
                    }
                }
                EngineEvent::UserLocation { location } => match location.validate() {
                    Ok(()) => events.push(MapEvent::UserLocationUpdate { location }),
                    Err(e) => log::debug!("dropping user location from engine: {e}"),
                },
                EngineEvent::Error { code, message } => {
                    log::error!("map view {}: engine error {code}: {message}", self.shared.id);
                    events.push(MapEvent::MapError(ErrorPayload { code, message }));
                }
            }
        }
        self.emit(events);
        if flip {
            self.mark_ready();
        }
    }

    /// Runs `f` against the ready-only collaborators; `None` before readiness
    fn with_annotations<R>(
        &self,
        f: impl FnOnce(&mut Annotations, &mut dyn MapEngine, &mut Vec<MapEvent>) -> R,
    ) -> Option<R> {
        let mut events = Vec::new();
        let result = {
            let mut guard = self.shared.inner.lock();
            let inner = &mut *guard;
            match (inner.annotations.as_mut(), inner.engine.as_deref_mut()) {
                (Some(annotations), Some(engine)) => Some(f(annotations, engine, &mut events)),
                _ => None,
            }
        };
        self.emit(events);
        result
    }

    /// Adds a marker and returns its id (`marker_1`, `marker_2`, ...)
    pub fn add_marker(&self, spec: MarkerSpec) -> Result<String> {
        spec.coordinate.validate()?;
        self.with_annotations(|a, engine, _| a.markers.add(spec, engine))
            .ok_or(MapError::NotReady)?
            .ok_or_else(|| MapError::Internal("marker id space exhausted".into()))
    }

    /// Merges `patch` into a marker; false for unknown ids or a bad coordinate
    pub fn update_marker(&self, id: &str, patch: &MarkerPatch) -> bool {
        if let Some(Err(e)) = patch.coordinate.map(|c| c.validate()) {
            log::warn!("not updating {id}: {e}");
            return false;
        }
        self.with_annotations(|a, engine, _| a.markers.update(id, patch, engine))
            .unwrap_or(false)
    }

    pub fn remove_marker(&self, id: &str) -> bool {
        self.with_annotations(|a, engine, events| {
            let removed = a.markers.remove(id, engine);
            if removed {
                a.info_window.on_marker_removed(id, engine, events);
            }
            removed
        })
        .unwrap_or(false)
    }

    /// Removes every marker; returns how many were removed
    pub fn remove_all_markers(&self) -> usize {
        self.with_annotations(|a, engine, events| {
            a.info_window.hide(engine, events);
            a.markers.remove_all(engine)
        })
        .unwrap_or(0)
    }

    pub fn marker(&self, id: &str) -> Option<MarkerRecord> {
        let inner = self.shared.inner.lock();
        inner.annotations.as_ref()?.markers.get(id).cloned()
    }

    pub fn markers(&self) -> Vec<MarkerRecord> {
        let inner = self.shared.inner.lock();
        inner
            .annotations
            .as_ref()
            .map(|a| a.markers.records().into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Stores an overlay and draws it if its geometry allows.
    ///
    /// Bad geometry is not rejected here: the record is kept undrawn and an
    /// `onMapError` with `INVALID_PARAMETER` is emitted.
    pub fn add_overlay(&self, spec: OverlaySpec) -> Result<String> {
        for coordinate in spec.attributes.coordinates_iter() {
            coordinate.validate()?;
        }
        self.with_annotations(|a, engine, events| {
            let id = a.overlays.add(spec, engine)?;
            Self::report_undrawn(&a.overlays, &id, events);
            Some(id)
        })
        .ok_or(MapError::NotReady)?
        .ok_or_else(|| MapError::Internal("overlay id space exhausted".into()))
    }

    fn report_undrawn(overlays: &AnnotationRegistry<OverlayRecord>, id: &str, events: &mut Vec<MapEvent>) {
        if overlays.is_drawn(id) {
            return;
        }
        if let Some(Err(e)) = overlays.get(id).map(|record| record.to_drawable()) {
            events.push(MapEvent::MapError(e.to_payload()));
        }
    }

    pub fn add_polyline(&self, attributes: OverlayAttributes) -> Result<String> {
        self.add_overlay(OverlaySpec::new(OverlayKind::Polyline, attributes))
    }

    pub fn add_polygon(&self, attributes: OverlayAttributes) -> Result<String> {
        self.add_overlay(OverlaySpec::new(OverlayKind::Polygon, attributes))
    }

    pub fn add_circle(&self, attributes: OverlayAttributes) -> Result<String> {
        self.add_overlay(OverlaySpec::new(OverlayKind::Circle, attributes))
    }

    /// Merges `patch` into an overlay; false for unknown ids or bad coordinates
    pub fn update_overlay(&self, id: &str, patch: &OverlayPatch) -> bool {
        if let Some(bad) = patch.coordinates_iter().find(|c| !c.is_valid()) {
            log::warn!("not updating {id}: invalid coordinate {bad:?}");
            return false;
        }
        self.with_annotations(|a, engine, events| {
            let updated = a.overlays.update(id, patch, engine);
            if updated {
                Self::report_undrawn(&a.overlays, id, events);
            }
            updated
        })
        .unwrap_or(false)
    }

    pub fn remove_overlay(&self, id: &str) -> bool {
        self.with_annotations(|a, engine, _| a.overlays.remove(id, engine))
            .unwrap_or(false)
    }

    pub fn remove_all_overlays(&self) -> usize {
        self.with_annotations(|a, engine, _| a.overlays.remove_all(engine))
            .unwrap_or(0)
    }

    pub fn overlay(&self, id: &str) -> Option<OverlayRecord> {
        let inner = self.shared.inner.lock();
        inner.annotations.as_ref()?.overlays.get(id).cloned()
    }

    pub fn overlays(&self) -> Vec<OverlayRecord> {
        let inner = self.shared.inner.lock();
        inner
            .annotations
            .as_ref()
            .map(|a| a.overlays.records().into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// True if the overlay currently has an engine drawing
    pub fn is_overlay_drawn(&self, id: &str) -> bool {
        let inner = self.shared.inner.lock();
        inner
            .annotations
            .as_ref()
            .is_some_and(|a| a.overlays.is_drawn(id))
    }

    pub fn show_info_window(&self, marker_id: &str, options: &InfoWindowOptions) -> bool {
        self.with_annotations(|a, engine, events| {
            a.info_window.show(marker_id, options, &a.markers, engine, events)
        })
        .unwrap_or(false)
    }

    pub fn hide_info_window(&self) -> bool {
        self.with_annotations(|a, engine, events| a.info_window.hide(engine, events))
            .unwrap_or(false)
    }

    pub fn update_info_window(&self, marker_id: &str, options: &InfoWindowOptions) -> bool {
        self.with_annotations(|a, engine, events| {
            a.info_window.update(marker_id, options, &a.markers, engine, events)
        })
        .unwrap_or(false)
    }

    pub fn current_info_window_marker(&self) -> Option<String> {
        let inner = self.shared.inner.lock();
        inner
            .annotations
            .as_ref()?
            .info_window
            .current_marker_id()
            .map(str::to_string)
    }

    pub fn is_info_window_showing(&self) -> bool {
        self.current_info_window_marker().is_some()
    }

    /// Snapshot of the view state
    pub fn state(&self) -> MapViewState {
        self.shared.inner.lock().state.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.shared.inner.lock().state.is_ready
    }

    pub fn is_loaded(&self) -> bool {
        self.shared.inner.lock().state.is_loaded
    }

    pub fn has_pending_operations(&self) -> bool {
        self.shared.inner.lock().state.has_pending_operations
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.inner.lock().destroyed
    }

    pub fn on_resume(&self) {
        log::debug!("map view {} resumed", self.shared.id);
    }

    pub fn on_pause(&self) {
        log::debug!("map view {} paused", self.shared.id);
    }

    /// Tears the view down and releases the engine.
    ///
    /// Idempotent, and safe when the engine never initialised.
    pub fn destroy(&self) {
        let mut events = Vec::new();
        {
            let mut guard = self.shared.inner.lock();
            let inner = &mut *guard;
            if inner.destroyed {
                return;
            }
            inner.destroyed = true;

            if let Some(timer) = inner.ready_timer.take() {
                timer.cancel();
            }
            let annotations = inner.annotations.take();
            if let Some(mut engine) = inner.engine.take() {
                if let Some(mut a) = annotations {
                    a.info_window.destroy(engine.as_mut(), &mut events);
                    a.markers.remove_all(engine.as_mut());
                    a.overlays.remove_all(engine.as_mut());
                }
                if inner.state.shows_user_location {
                    if let Err(e) = engine.set_my_location_enabled(false, false) {
                        log::warn!("map view {}: {e}", self.shared.id);
                    }
                }
                engine.release();
            }
            inner.state.is_ready = false;
            inner.state.is_loaded = false;
            inner.state.has_pending_operations = false;
            log::debug!("map view {} destroyed", self.shared.id);
        }
        self.emit(events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::builder::MapViewBuilder,
        engine::simulated::{EngineCall, SimulatedMapEngine},
        input::sink::ChannelEventSink,
        runtime::ManualScheduler,
    };

    fn view(
        readiness: ReadinessSignal,
    ) -> (
        MapViewController,
        SimulatedMapEngine,
        Arc<ManualScheduler>,
        crossbeam_channel::Receiver<MapEvent>,
    ) {
        let sdk = MapSdk::default();
        sdk.initialize(Some("test-key-0001")).unwrap();
        let engine = SimulatedMapEngine::new();
        let scheduler = ManualScheduler::shared(0);
        let (sink, rx) = ChannelEventSink::channel();
        let view = MapViewBuilder::new(sdk, engine.clone(), scheduler.clone())
            .event_sink(Arc::new(sink))
            .readiness(readiness)
            .build()
            .unwrap();
        (view, engine, scheduler, rx)
    }

    #[test]
    fn test_writes_before_ready_touch_no_engine() {
        let (view, engine, _scheduler, _rx) = view(ReadinessSignal::OnLoaded);
        engine.clear_calls();
        view.set_zoom(15.0);
        view.set_compass_enabled(true);
        assert!(view.has_pending_operations());
        assert!(engine.calls().is_empty());
        assert_eq!(view.state().zoom, 15.0);
    }

    #[test]
    fn test_ready_after_delay() {
        let (view, engine, scheduler, rx) = view(ReadinessSignal::AfterDelay(Duration::from_millis(100)));
        view.set_map_kind(MapKind::Satellite);
        scheduler.advance(Duration::from_millis(99));
        assert!(!view.is_ready());
        scheduler.advance(Duration::from_millis(1));
        assert!(view.is_ready());
        assert!(!view.has_pending_operations());
        assert_eq!(engine.snapshot().map_kind, Some(MapKind::Satellite));
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![MapEvent::MapReady]);
    }

    #[test]
    fn test_loaded_flips_once() {
        let (view, _engine, _scheduler, rx) = view(ReadinessSignal::OnLoaded);
        view.dispatch(EngineEvent::Loaded);
        view.dispatch(EngineEvent::Loaded);
        let names: Vec<_> = rx.try_iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["onMapLoaded", "onMapReady", "onMapLoaded"]);
        assert!(view.is_loaded());
    }

    #[test]
    fn test_ready_writes_go_straight_through() {
        let (view, engine, _scheduler, _rx) = view(ReadinessSignal::OnLoaded);
        view.dispatch(EngineEvent::Loaded);
        engine.clear_calls();
        view.set_traffic_enabled(true);
        assert!(!view.has_pending_operations());
        assert_eq!(engine.calls(), vec![EngineCall::SetLayers {
                traffic: true,
                buildings: true
            }]);
    }

    #[test]
    fn test_invalid_center_is_rejected() {
        let (view, _engine, _scheduler, rx) = view(ReadinessSignal::OnLoaded);
        let before = view.state();
        view.set_center(LatLng::new(91.0, 0.0));
        assert_eq!(view.state(), before);
        match rx.try_recv().unwrap() {
            MapEvent::MapError(payload) => assert_eq!(payload.code, "INVALID_PARAMETER"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_status_change_updates_state_without_engine_call() {
        let (view, engine, _scheduler, rx) = view(ReadinessSignal::OnLoaded);
        view.dispatch(EngineEvent::Loaded);
        rx.try_iter().count();
        engine.clear_calls();

        let mut status = crate::core::state::MapStatus::new(LatLng::new(31.23, 121.47), 14.0);
        status.rotation = 30.0;
        view.dispatch(EngineEvent::StatusChangeFinish { status });
        assert!(engine.calls().is_empty());
        assert_eq!(view.state().center, LatLng::new(31.23, 121.47));
        assert_eq!(
            rx.try_recv().unwrap(),
            MapEvent::MapStatusChange {
                center: LatLng::new(31.23, 121.47),
                zoom: 14.0,
                overlook: 0.0,
                rotation: 0.0,
            }
        );
    }

    #[test]
    fn test_engine_init_failure_is_reported() {
        let sdk = MapSdk::default();
        sdk.initialize(Some("test-key-0001")).unwrap();
        let engine = SimulatedMapEngine::new();
        engine.fail_initialize(true);
        let scheduler = ManualScheduler::shared(0);
        let (sink, rx) = ChannelEventSink::channel();
        let view = MapViewBuilder::new(sdk, engine, scheduler.clone())
            .event_sink(Arc::new(sink))
            .build()
            .unwrap();

        assert_eq!(rx.try_recv().unwrap().name(), "onMapError");
        scheduler.advance(Duration::from_secs(1));
        assert!(!view.is_ready());
        view.destroy();
    }

    #[test]
    fn test_marker_drag_end_writes_back() {
        let (view, engine, _scheduler, rx) = view(ReadinessSignal::OnLoaded);
        view.dispatch(EngineEvent::Loaded);
        let id = view.add_marker(MarkerSpec::at(LatLng::new(39.9, 116.4))).unwrap();
        let handle = *engine.snapshot().overlays.keys().next().unwrap();
        rx.try_iter().count();

        let moved = LatLng::new(39.95, 116.45);
        view.dispatch(EngineEvent::MarkerDrag {
            handle,
            phase: DragPhase::Drag,
            coordinate: moved,
        });
        assert_eq!(view.marker(&id).unwrap().coordinate, LatLng::new(39.9, 116.4));
        view.dispatch(EngineEvent::MarkerDrag {
            handle,
            phase: DragPhase::End,
            coordinate: moved,
        });
        assert_eq!(view.marker(&id).unwrap().coordinate, moved);

        let names: Vec<_> = rx.try_iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["onMarkerDrag", "onMarkerDragEnd"]);
    }

    #[test]
    fn test_destroy_cancels_ready_timer() {
        let (view, engine, scheduler, rx) = view(ReadinessSignal::AfterDelay(Duration::from_millis(100)));
        view.destroy();
        view.destroy();
        scheduler.advance(Duration::from_secs(1));
        assert!(!view.is_ready());
        assert!(engine.snapshot().released);
        assert!(rx.try_recv().is_err());
    }
}
