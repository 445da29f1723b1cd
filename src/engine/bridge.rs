use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;

use crate::{
    core::{
        geo::LatLngBounds,
        state::{ControlSettings, MapKind, MapStatus, Padding},
    },
    engine::{Drawable, EngineHandle, InfoWindowContent},
    traits::MapEngine,
    MapError, Result,
};

/// A capability call serialised for a native map SDK host
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum EngineCommand {
    Initialize,
    SetStatus {
        status: MapStatus,
    },
    SetMapKind {
        kind: MapKind,
    },
    #[serde(rename_all = "camelCase")]
    SetZoomLimits {
        min_zoom: f64,
        max_zoom: f64,
    },
    #[serde(rename_all = "camelCase")]
    SetMyLocationEnabled {
        enabled: bool,
        accuracy_circle: bool,
    },
    SetControls {
        controls: ControlSettings,
    },
    SetLayers {
        traffic: bool,
        buildings: bool,
    },
    SetPadding {
        padding: Padding,
    },
    FitBounds {
        bounds: LatLngBounds,
    },
    AddOverlay {
        handle: EngineHandle,
        drawable: Drawable,
    },
    UpdateOverlay {
        handle: EngineHandle,
        drawable: Drawable,
    },
    RemoveOverlay {
        handle: EngineHandle,
    },
    ShowInfoWindow {
        content: InfoWindowContent,
    },
    HideInfoWindow,
    Release,
}

impl EngineCommand {
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Engine backed by a native map SDK living on the other side of a channel.
///
/// Every capability call becomes one [`EngineCommand`]; handles are
/// allocated here so the host only has to keep a handle-to-object table.
/// Notifications flow back as [`crate::EngineEvent`]s through
/// [`crate::MapViewController::dispatch`].
pub struct BridgeMapEngine {
    commands: Sender<EngineCommand>,
    next_handle: u64,
    released: bool,
}

impl BridgeMapEngine {
    pub fn new(commands: Sender<EngineCommand>) -> Self {
        Self {
            commands,
            next_handle: 0,
            released: false,
        }
    }

    /// Creates an engine and the receiver the native host drains
    pub fn channel() -> (Self, Receiver<EngineCommand>) {
        let (tx, rx) = unbounded();
        (Self::new(tx), rx)
    }

    fn send(&self, command: EngineCommand) -> Result<()> {
        if self.released {
            return Err(MapError::Engine("engine already released".into()));
        }
        self.commands
            .send(command)
            .map_err(|_| MapError::Engine("native map host disconnected".into()))
    }
}

impl MapEngine for BridgeMapEngine {
    fn initialize(&mut self) -> Result<()> {
        self.send(EngineCommand::Initialize)
    }

    fn set_status(&mut self, status: &MapStatus) -> Result<()> {
        self.send(EngineCommand::SetStatus { status: *status })
    }

    fn set_map_kind(&mut self, kind: MapKind) -> Result<()> {
        self.send(EngineCommand::SetMapKind { kind })
    }

    fn set_zoom_limits(&mut self, min_zoom: f64, max_zoom: f64) -> Result<()> {
        self.send(EngineCommand::SetZoomLimits { min_zoom, max_zoom })
    }

    fn set_my_location_enabled(&mut self, enabled: bool, accuracy_circle: bool) -> Result<()> {
        self.send(EngineCommand::SetMyLocationEnabled {
            enabled,
            accuracy_circle,
        })
    }

    fn set_controls(&mut self, controls: &ControlSettings) -> Result<()> {
        self.send(EngineCommand::SetControls {
            controls: *controls,
        })
    }

    fn set_layers(&mut self, traffic: bool, buildings: bool) -> Result<()> {
        self.send(EngineCommand::SetLayers { traffic, buildings })
    }

    fn set_padding(&mut self, padding: Padding) -> Result<()> {
        self.send(EngineCommand::SetPadding { padding })
    }

    fn fit_bounds(&mut self, bounds: &LatLngBounds) -> Result<()> {
        self.send(EngineCommand::FitBounds {
            bounds: bounds.clone(),
        })
    }

    fn add_overlay(&mut self, drawable: &Drawable) -> Result<EngineHandle> {
        let handle = EngineHandle(self.next_handle + 1);
        self.send(EngineCommand::AddOverlay {
            handle,
            drawable: drawable.clone(),
        })?;
        self.next_handle += 1;
        Ok(handle)
    }

    fn update_overlay(&mut self, handle: EngineHandle, drawable: &Drawable) -> Result<()> {
        self.send(EngineCommand::UpdateOverlay {
            handle,
            drawable: drawable.clone(),
        })
    }

    fn remove_overlay(&mut self, handle: EngineHandle) -> Result<()> {
        self.send(EngineCommand::RemoveOverlay { handle })
    }

    fn show_info_window(&mut self, content: &InfoWindowContent) -> Result<()> {
        self.send(EngineCommand::ShowInfoWindow {
            content: content.clone(),
        })
    }

    fn hide_info_window(&mut self) -> Result<()> {
        self.send(EngineCommand::HideInfoWindow)
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        // Best effort: the host may already be gone
        let _ = self.send(EngineCommand::Release);
        self.released = true;
    }
}
