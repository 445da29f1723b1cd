//! Capability traits at the seams between this crate and its collaborators.
//!
//! The map engine, the location source, the permission check and the UI
//! event channel are all external. Each is reduced to the small set of
//! operations the orchestration layer actually needs, so a simulated and a
//! real-SDK-backed implementation can be swapped freely.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::{
    core::{
        config::LocationOptions,
        geo::LatLngBounds,
        state::{ControlSettings, MapKind, MapStatus, Padding},
    },
    engine::{Drawable, EngineHandle, InfoWindowContent},
    input::events::MapEvent,
    location::result::RawLocation,
    Result,
};

/// Imperative map engine driven by [`crate::MapViewController`].
///
/// Implementations must not call back into the controller synchronously;
/// engine notifications go through [`crate::MapViewController::dispatch`].
pub trait MapEngine: Send {
    /// Creates the engine-side map object
    fn initialize(&mut self) -> Result<()>;

    fn set_status(&mut self, status: &MapStatus) -> Result<()>;

    fn set_map_kind(&mut self, kind: MapKind) -> Result<()>;

    fn set_zoom_limits(&mut self, min_zoom: f64, max_zoom: f64) -> Result<()>;

    fn set_my_location_enabled(&mut self, enabled: bool, accuracy_circle: bool) -> Result<()>;

    fn set_controls(&mut self, controls: &ControlSettings) -> Result<()>;

    /// Traffic and 3D building layers
    fn set_layers(&mut self, traffic: bool, buildings: bool) -> Result<()>;

    fn set_padding(&mut self, padding: Padding) -> Result<()>;

    fn fit_bounds(&mut self, bounds: &LatLngBounds) -> Result<()>;

    fn add_overlay(&mut self, drawable: &Drawable) -> Result<EngineHandle>;

    fn update_overlay(&mut self, handle: EngineHandle, drawable: &Drawable) -> Result<()>;

    fn remove_overlay(&mut self, handle: EngineHandle) -> Result<()>;

    fn show_info_window(&mut self, content: &InfoWindowContent) -> Result<()>;

    fn hide_info_window(&mut self) -> Result<()>;

    /// Releases the engine-side map object; safe to call more than once
    fn release(&mut self);
}

/// Produces raw location samples.
///
/// `Ok(None)` means no fix is available yet; `Err` is a failure while
/// producing one.
pub trait LocationSource: Send {
    fn sample(&mut self, options: &LocationOptions) -> Result<Option<RawLocation>>;
}

/// Process-wide permission state; must be a side-effect-free read
pub trait PermissionProvider: Send + Sync {
    fn has_location_permission(&self) -> bool;
}

/// Receives outbound events for the UI layer
pub trait EventSink: Send + Sync {
    fn emit(&self, event: MapEvent);
}

impl<F> EventSink for F
where
    F: Fn(MapEvent) + Send + Sync,
{
    fn emit(&self, event: MapEvent) {
        self(event)
    }
}

/// Permission flag toggled by the host
#[derive(Debug)]
pub struct StaticPermissions {
    location: AtomicBool,
}

impl StaticPermissions {
    pub fn new(location: bool) -> Self {
        Self {
            location: AtomicBool::new(location),
        }
    }

    pub fn granted() -> Self {
        Self::new(true)
    }

    pub fn denied() -> Self {
        Self::new(false)
    }

    pub fn set_location(&self, granted: bool) {
        self.location.store(granted, Ordering::SeqCst);
    }
}

impl Default for StaticPermissions {
    fn default() -> Self {
        Self::granted()
    }
}

impl PermissionProvider for StaticPermissions {
    fn has_location_permission(&self) -> bool {
        self.location.load(Ordering::SeqCst)
    }
}
