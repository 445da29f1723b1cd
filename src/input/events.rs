use serde::{Deserialize, Serialize};

use crate::{
    core::{geo::LatLng, state::MapStatus},
    engine::EngineHandle,
    location::result::LocationResult,
    ErrorPayload,
};

/// Phase of a marker drag gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragPhase {
    Start,
    Drag,
    End,
}

/// Notifications from the map engine.
///
/// The engine reports everything through this one enum; the view
/// controller dispatches on the tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    Loaded,
    Click {
        coordinate: LatLng,
    },
    LongClick {
        coordinate: LatLng,
    },
    StatusChangeFinish {
        status: MapStatus,
    },
    MarkerClick {
        handle: EngineHandle,
    },
    MarkerDrag {
        handle: EngineHandle,
        phase: DragPhase,
        coordinate: LatLng,
    },
    InfoWindowClick,
    UserLocation {
        location: LocationResult,
    },
    Error {
        code: String,
        message: String,
    },
}

impl EngineEvent {
    pub fn from_json(value: serde_json::Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Events emitted to the UI layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "name", content = "payload")]
pub enum MapEvent {
    #[serde(rename = "onMapReady")]
    MapReady,
    #[serde(rename = "onMapClick")]
    MapClick { coordinate: LatLng },
    #[serde(rename = "onMapLongClick")]
    MapLongClick { coordinate: LatLng },
    #[serde(rename = "onMapStatusChange")]
    MapStatusChange {
        center: LatLng,
        zoom: f64,
        overlook: f64,
        rotation: f64,
    },
    #[serde(rename = "onMapLoaded")]
    MapLoaded { loaded: bool },
    #[serde(rename = "onMapError")]
    MapError(ErrorPayload),
    #[serde(rename = "onUserLocationUpdate")]
    UserLocationUpdate { location: LocationResult },
    #[serde(rename = "onMarkerPress", rename_all = "camelCase")]
    MarkerPress {
        marker_id: String,
        coordinate: LatLng,
    },
    #[serde(rename = "onMarkerDragStart", rename_all = "camelCase")]
    MarkerDragStart {
        marker_id: String,
        coordinate: LatLng,
    },
    #[serde(rename = "onMarkerDrag", rename_all = "camelCase")]
    MarkerDrag {
        marker_id: String,
        coordinate: LatLng,
    },
    #[serde(rename = "onMarkerDragEnd", rename_all = "camelCase")]
    MarkerDragEnd {
        marker_id: String,
        coordinate: LatLng,
    },
    #[serde(rename = "onInfoWindowShow", rename_all = "camelCase")]
    InfoWindowShow { marker_id: String },
    #[serde(rename = "onInfoWindowHide", rename_all = "camelCase")]
    InfoWindowHide { marker_id: String },
    #[serde(rename = "onInfoWindowPress", rename_all = "camelCase")]
    InfoWindowPress { marker_id: String },
    #[serde(rename = "BaiduMap_LocationUpdate")]
    LocationUpdate {
        latitude: f64,
        longitude: f64,
        accuracy: f64,
        address: Option<String>,
        timestamp: u64,
    },
    #[serde(rename = "BaiduMap_LocationError")]
    LocationError(ErrorPayload),
}

impl MapEvent {
    /// Name the UI layer subscribes to
    pub fn name(&self) -> &'static str {
        match self {
            MapEvent::MapReady => "onMapReady",
            MapEvent::MapClick { .. } => "onMapClick",
            MapEvent::MapLongClick { .. } => "onMapLongClick",
            MapEvent::MapStatusChange { .. } => "onMapStatusChange",
            MapEvent::MapLoaded { .. } => "onMapLoaded",
            MapEvent::MapError(_) => "onMapError",
            MapEvent::UserLocationUpdate { .. } => "onUserLocationUpdate",
            MapEvent::MarkerPress { .. } => "onMarkerPress",
            MapEvent::MarkerDragStart { .. } => "onMarkerDragStart",
            MapEvent::MarkerDrag { .. } => "onMarkerDrag",
            MapEvent::MarkerDragEnd { .. } => "onMarkerDragEnd",
            MapEvent::InfoWindowShow { .. } => "onInfoWindowShow",
            MapEvent::InfoWindowHide { .. } => "onInfoWindowHide",
            MapEvent::InfoWindowPress { .. } => "onInfoWindowPress",
            MapEvent::LocationUpdate { .. } => crate::constants::LOCATION_UPDATE_EVENT,
            MapEvent::LocationError(_) => crate::constants::LOCATION_ERROR_EVENT,
        }
    }

    /// `{"name": ..., "payload": {...}}` as delivered to the UI bridge
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            log::error!("failed to serialize {}: {e}", self.name());
            serde_json::json!({ "name": self.name() })
        })
    }

    pub(crate) fn location_update(location: &LocationResult) -> Self {
        MapEvent::LocationUpdate {
            latitude: location.coordinate.lat,
            longitude: location.coordinate.lng,
            accuracy: location.accuracy,
            address: location.address.clone(),
            timestamp: location.timestamp,
        }
    }

    pub fn is_location_event(&self) -> bool {
        matches!(
            self,
            MapEvent::LocationUpdate { .. } | MapEvent::LocationError(_)
        )
    }
}
