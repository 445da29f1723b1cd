use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    constants::{DEFAULT_CENTER, DEFAULT_ZOOM, GLOBAL_MAX_ZOOM, GLOBAL_MIN_ZOOM},
    core::geo::LatLng,
    MapError, Result,
};

/// Base map style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapKind {
    #[default]
    Normal,
    Satellite,
    Hybrid,
}

impl MapKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MapKind::Normal => "normal",
            MapKind::Satellite => "satellite",
            MapKind::Hybrid => "hybrid",
        }
    }
}

impl FromStr for MapKind {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" | "standard" => Ok(MapKind::Normal),
            "satellite" => Ok(MapKind::Satellite),
            "hybrid" => Ok(MapKind::Hybrid),
            other => Err(MapError::InvalidParameter(format!("unknown map type '{other}'"))),
        }
    }
}

impl fmt::Display for MapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-screen controls and gesture switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlSettings {
    pub zoom_controls: bool,
    pub compass: bool,
    pub scale_control: bool,
    pub rotate_gestures: bool,
    pub scroll_gestures: bool,
    pub zoom_gestures: bool,
    pub overlook_gestures: bool,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            zoom_controls: true,
            compass: false,
            scale_control: false,
            rotate_gestures: true,
            scroll_gestures: true,
            zoom_gestures: true,
            overlook_gestures: true,
        }
    }
}

/// Map padding in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Padding {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Padding {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

/// Camera status as reported by, or pushed to, the engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapStatus {
    pub center: LatLng,
    pub zoom: f64,
    pub overlook: f64,
    pub rotation: f64,
}

impl MapStatus {
    pub fn new(center: LatLng, zoom: f64) -> Self {
        Self {
            center,
            zoom,
            overlook: 0.0,
            rotation: 0.0,
        }
    }
}

/// Everything the UI has asked the map to look like.
///
/// This is the single source of truth for view properties: it is always
/// written first, and the engine is brought in line with it either
/// immediately or by a full replay once the view is ready.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapViewState {
    pub center: LatLng,
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub map_kind: MapKind,
    pub shows_user_location: bool,
    pub user_location_accuracy_circle: bool,
    pub controls: ControlSettings,
    pub traffic_enabled: bool,
    pub buildings_enabled: bool,
    pub padding: Padding,
    pub is_ready: bool,
    pub is_loaded: bool,
    pub has_pending_operations: bool,
}

impl Default for MapViewState {
    fn default() -> Self {
        Self {
            center: LatLng::new(DEFAULT_CENTER.0, DEFAULT_CENTER.1),
            zoom: DEFAULT_ZOOM,
            min_zoom: GLOBAL_MIN_ZOOM,
            max_zoom: GLOBAL_MAX_ZOOM,
            map_kind: MapKind::Normal,
            shows_user_location: false,
            user_location_accuracy_circle: true,
            controls: ControlSettings::default(),
            traffic_enabled: false,
            buildings_enabled: true,
            padding: Padding::default(),
            is_ready: false,
            is_loaded: false,
            has_pending_operations: false,
        }
    }
}

impl MapViewState {
    /// Camera status derived from center and zoom
    pub fn status(&self) -> MapStatus {
        MapStatus::new(self.center, self.zoom)
    }

    /// Clamps `zoom` into the current `[min_zoom, max_zoom]`
    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }

    /// Sets the lower zoom bound, clamped to the global range.
    ///
    /// Raises `max_zoom` if needed so the range stays non-empty, then pulls
    /// the current zoom into range.
    pub fn set_min_zoom(&mut self, min_zoom: f64) {
        self.min_zoom = min_zoom.clamp(GLOBAL_MIN_ZOOM, GLOBAL_MAX_ZOOM);
        if self.max_zoom < self.min_zoom {
            self.max_zoom = self.min_zoom;
        }
        self.zoom = self.clamp_zoom(self.zoom);
    }

    /// Mirror of [`MapViewState::set_min_zoom`] for the upper bound
    pub fn set_max_zoom(&mut self, max_zoom: f64) {
        self.max_zoom = max_zoom.clamp(GLOBAL_MIN_ZOOM, GLOBAL_MAX_ZOOM);
        if self.min_zoom > self.max_zoom {
            self.min_zoom = self.max_zoom;
        }
        self.zoom = self.clamp_zoom(self.zoom);
    }

    /// The UI-visible part of the state, without lifecycle flags
    pub fn properties(&self) -> MapViewState {
        MapViewState {
            is_ready: false,
            is_loaded: false,
            has_pending_operations: false,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let state = MapViewState::default();
        assert_eq!(state.center, LatLng::new(39.915, 116.404));
        assert_eq!(state.zoom, 12.0);
        assert_eq!((state.min_zoom, state.max_zoom), (3.0, 21.0));
        assert!(state.controls.zoom_controls);
        assert!(!state.controls.compass);
        assert!(state.buildings_enabled);
        assert!(!state.is_ready);
    }

    #[test]
    fn test_zoom_limits_clamp_to_global_range() {
        let mut state = MapViewState::default();
        state.set_min_zoom(1.0);
        assert_eq!(state.min_zoom, 3.0);
        state.set_max_zoom(25.0);
        assert_eq!(state.max_zoom, 21.0);
        assert_eq!(state.clamp_zoom(25.0), 21.0);
    }

    #[test]
    fn test_zoom_limits_stay_ordered() {
        let mut state = MapViewState::default();
        state.set_max_zoom(10.0);
        assert_eq!(state.zoom, 10.0);
        state.set_min_zoom(15.0);
        assert_eq!(state.min_zoom, 15.0);
        assert_eq!(state.max_zoom, 15.0);
        assert_eq!(state.zoom, 15.0);
    }

    #[test]
    fn test_map_kind_parsing() {
        assert_eq!("Satellite".parse::<MapKind>().unwrap(), MapKind::Satellite);
        assert!("terrain".parse::<MapKind>().is_err());
    }
}
