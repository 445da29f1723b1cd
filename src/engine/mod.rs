//! Map engine implementations and the engine-facing drawable model.

pub mod bridge;
pub mod simulated;

use serde::{Deserialize, Serialize};

use crate::{core::geo::LatLng, layers::overlay::Color};

/// Opaque engine-side handle of a drawn annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EngineHandle(pub u64);

/// Stroke shared by every overlay shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub color: Color,
    pub width: u32,
    pub dash_pattern: Vec<u32>,
}

/// A validated annotation in the shape the engine draws
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Drawable {
    #[serde(rename_all = "camelCase")]
    Marker {
        position: LatLng,
        title: Option<String>,
        icon: Option<String>,
        draggable: bool,
        visible: bool,
        alpha: f32,
        rotation: f32,
        flat: bool,
        z_index: i32,
    },
    #[serde(rename_all = "camelCase")]
    Polyline {
        points: Vec<LatLng>,
        stroke: Stroke,
        visible: bool,
        z_index: i32,
    },
    #[serde(rename_all = "camelCase")]
    Polygon {
        points: Vec<LatLng>,
        stroke: Stroke,
        fill: Color,
        visible: bool,
        z_index: i32,
    },
    #[serde(rename_all = "camelCase")]
    Circle {
        center: LatLng,
        radius_m: f64,
        stroke: Stroke,
        fill: Color,
        visible: bool,
        z_index: i32,
    },
}

impl Drawable {
    pub fn kind(&self) -> &'static str {
        match self {
            Drawable::Marker { .. } => "marker",
            Drawable::Polyline { .. } => "polyline",
            Drawable::Polygon { .. } => "polygon",
            Drawable::Circle { .. } => "circle",
        }
    }
}

/// What an info window shows and where
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoWindowContent {
    pub marker_id: String,
    pub anchor: LatLng,
    pub title: Option<String>,
    pub description: Option<String>,
    pub y_offset: i32,
}
