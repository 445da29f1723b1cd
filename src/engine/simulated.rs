use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::{
    core::{
        geo::LatLngBounds,
        state::{ControlSettings, MapKind, MapStatus, Padding},
    },
    engine::{Drawable, EngineHandle, InfoWindowContent},
    prelude::Arc,
    traits::MapEngine,
    MapError, Result,
};

/// One call made against the simulated engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Initialize,
    SetStatus(MapStatus),
    SetMapKind(MapKind),
    SetZoomLimits(f64, f64),
    SetMyLocationEnabled { enabled: bool, accuracy_circle: bool },
    SetControls(ControlSettings),
    SetLayers { traffic: bool, buildings: bool },
    SetPadding(Padding),
    FitBounds(LatLngBounds),
    AddOverlay(EngineHandle),
    UpdateOverlay(EngineHandle),
    RemoveOverlay(EngineHandle),
    ShowInfoWindow(String),
    HideInfoWindow,
    Release,
}

/// Engine-visible state after all calls so far
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineSnapshot {
    pub initialized: bool,
    pub released: bool,
    pub status: Option<MapStatus>,
    pub map_kind: Option<MapKind>,
    pub zoom_limits: Option<(f64, f64)>,
    pub my_location: Option<(bool, bool)>,
    pub controls: Option<ControlSettings>,
    pub layers: Option<(bool, bool)>,
    pub padding: Option<Padding>,
    pub fitted_bounds: Option<LatLngBounds>,
    pub overlays: BTreeMap<EngineHandle, Drawable>,
    pub info_window: Option<InfoWindowContent>,
}

#[derive(Default)]
struct SimulatedState {
    snapshot: EngineSnapshot,
    calls: Vec<EngineCall>,
    next_handle: u64,
    fail_initialize: bool,
}

/// In-memory engine that records what it was told.
///
/// Clones share state, so a test can hand one clone to a controller and
/// inspect the other.
#[derive(Clone, Default)]
pub struct SimulatedMapEngine {
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedMapEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `initialize` call fail
    pub fn fail_initialize(&self, fail: bool) {
        self.state.lock().fail_initialize = fail;
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.state.lock().snapshot.clone()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Runs `f` against live state after checking the engine was not released
    fn with_live<R>(
        &self,
        call: EngineCall,
        f: impl FnOnce(&mut SimulatedState) -> Result<R>,
    ) -> Result<R> {
        let mut state = self.state.lock();
        if state.snapshot.released {
            return Err(MapError::Engine("engine already released".into()));
        }
        state.calls.push(call);
        f(&mut state)
    }
}

impl MapEngine for SimulatedMapEngine {
    fn initialize(&mut self) -> Result<()> {
        self.with_live(EngineCall::Initialize, |state| {
            if state.fail_initialize {
                return Err(MapError::Engine("simulated initialisation failure".into()));
            }
            state.snapshot.initialized = true;
            Ok(())
        })
    }

    fn set_status(&mut self, status: &MapStatus) -> Result<()> {
        self.with_live(EngineCall::SetStatus(*status), |state| {
            state.snapshot.status = Some(*status);
            Ok(())
        })
    }

    fn set_map_kind(&mut self, kind: MapKind) -> Result<()> {
        self.with_live(EngineCall::SetMapKind(kind), |state| {
            state.snapshot.map_kind = Some(kind);
            Ok(())
        })
    }

    fn set_zoom_limits(&mut self, min_zoom: f64, max_zoom: f64) -> Result<()> {
        self.with_live(EngineCall::SetZoomLimits(min_zoom, max_zoom), |state| {
            state.snapshot.zoom_limits = Some((min_zoom, max_zoom));
            Ok(())
        })
    }

    fn set_my_location_enabled(&mut self, enabled: bool, accuracy_circle: bool) -> Result<()> {
        let call = EngineCall::SetMyLocationEnabled {
            enabled,
            accuracy_circle,
        };
        self.with_live(call, |state| {
            state.snapshot.my_location = Some((enabled, accuracy_circle));
            Ok(())
        })
    }

    fn set_controls(&mut self, controls: &ControlSettings) -> Result<()> {
        self.with_live(EngineCall::SetControls(*controls), |state| {
            state.snapshot.controls = Some(*controls);
            Ok(())
        })
    }

    fn set_layers(&mut self, traffic: bool, buildings: bool) -> Result<()> {
        self.with_live(EngineCall::SetLayers { traffic, buildings }, |state| {
            state.snapshot.layers = Some((traffic, buildings));
            Ok(())
        })
    }

    fn set_padding(&mut self, padding: Padding) -> Result<()> {
        self.with_live(EngineCall::SetPadding(padding), |state| {
            state.snapshot.padding = Some(padding);
            Ok(())
        })
    }

    fn fit_bounds(&mut self, bounds: &LatLngBounds) -> Result<()> {
        self.with_live(EngineCall::FitBounds(bounds.clone()), |state| {
            state.snapshot.fitted_bounds = Some(bounds.clone());
            Ok(())
        })
    }

    fn add_overlay(&mut self, drawable: &Drawable) -> Result<EngineHandle> {
        let mut state = self.state.lock();
        if state.snapshot.released {
            return Err(MapError::Engine("engine already released".into()));
        }
        state.next_handle += 1;
        let handle = EngineHandle(state.next_handle);
        state.calls.push(EngineCall::AddOverlay(handle));
        state.snapshot.overlays.insert(handle, drawable.clone());
        Ok(handle)
    }

    fn update_overlay(&mut self, handle: EngineHandle, drawable: &Drawable) -> Result<()> {
        self.with_live(EngineCall::UpdateOverlay(handle), |state| {
            match state.snapshot.overlays.get_mut(&handle) {
                Some(existing) => {
                    *existing = drawable.clone();
                    Ok(())
                }
                None => Err(MapError::Engine(format!("no overlay {handle:?}"))),
            }
        })
    }

    fn remove_overlay(&mut self, handle: EngineHandle) -> Result<()> {
        self.with_live(EngineCall::RemoveOverlay(handle), |state| {
            state
                .snapshot
                .overlays
                .remove(&handle)
                .map(|_| ())
                .ok_or_else(|| MapError::Engine(format!("no overlay {handle:?}")))
        })
    }

    fn show_info_window(&mut self, content: &InfoWindowContent) -> Result<()> {
        self.with_live(EngineCall::ShowInfoWindow(content.marker_id.clone()), |state| {
            state.snapshot.info_window = Some(content.clone());
            Ok(())
        })
    }

    fn hide_info_window(&mut self) -> Result<()> {
        self.with_live(EngineCall::HideInfoWindow, |state| {
            state.snapshot.info_window = None;
            Ok(())
        })
    }

    fn release(&mut self) {
        let mut state = self.state.lock();
        if state.snapshot.released {
            return;
        }
        state.calls.push(EngineCall::Release);
        state.snapshot.released = true;
        state.snapshot.overlays.clear();
        state.snapshot.info_window = None;
    }
}
