use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    constants::{DEFAULT_CIRCLE_RADIUS_M, DEFAULT_STROKE_WIDTH},
    core::geo::LatLng,
    engine::{Drawable, Stroke},
    layers::registry::Annotation,
    MapError, Result,
};

/// RGBA color as understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLUE: Color = Color::new(0, 0, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parses `value`, falling back to opaque blue
    pub fn parse_or_default(value: &str) -> Self {
        value.parse().unwrap_or_else(|e| {
            log::warn!("{e}; using default blue");
            Color::BLUE
        })
    }

    fn parse_channel(value: &str) -> Option<u8> {
        value.trim().parse::<u8>().ok()
    }

    fn parse_functional(body: &str, with_alpha: bool) -> Option<Color> {
        let parts: Vec<&str> = body.split(',').collect();
        let expected = if with_alpha { 4 } else { 3 };
        if parts.len() != expected {
            return None;
        }
        let r = Self::parse_channel(parts[0])?;
        let g = Self::parse_channel(parts[1])?;
        let b = Self::parse_channel(parts[2])?;
        let a = if with_alpha {
            let alpha = parts[3].trim().parse::<f64>().ok()?;
            if !(0.0..=1.0).contains(&alpha) {
                return None;
            }
            (alpha * 255.0).round() as u8
        } else {
            255
        };
        Some(Color::new(r, g, b, a))
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLUE
    }
}

impl FromStr for Color {
    type Err = MapError;

    /// Accepts `#RRGGBB`, `#AARRGGBB`, `rgb(r,g,b)` and `rgba(r,g,b,a)` with `a` in `0..=1`
    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim();
        let invalid = || MapError::InvalidParameter(format!("unrecognised color '{value}'"));

        if let Some(hex) = value.strip_prefix('#') {
            // from_str_radix alone would accept a sign
            if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            let raw = u32::from_str_radix(hex, 16).map_err(|_| invalid())?;
            return match hex.len() {
                6 => Ok(Color::rgb((raw >> 16) as u8, (raw >> 8) as u8, raw as u8)),
                8 => Ok(Color::new(
                    (raw >> 16) as u8,
                    (raw >> 8) as u8,
                    raw as u8,
                    (raw >> 24) as u8,
                )),
                _ => Err(invalid()),
            };
        }

        let lower = value.to_ascii_lowercase();
        let parsed = if let Some(body) = lower.strip_prefix("rgba(").and_then(|b| b.strip_suffix(')')) {
            Color::parse_functional(body, true)
        } else if let Some(body) = lower.strip_prefix("rgb(").and_then(|b| b.strip_suffix(')')) {
            Color::parse_functional(body, false)
        } else {
            None
        };
        parsed.ok_or_else(invalid)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.a, self.r, self.g, self.b)
    }
}

/// Overlay shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
    Polyline,
    Polygon,
    Circle,
}

impl OverlayKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlayKind::Polyline => "polyline",
            OverlayKind::Polygon => "polygon",
            OverlayKind::Circle => "circle",
        }
    }
}

/// Overlay attributes as sent by the UI bridge; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlayAttributes {
    #[serde(alias = "points")]
    pub coordinates: Option<Vec<LatLng>>,
    pub center: Option<LatLng>,
    pub radius: Option<f64>,
    pub stroke_color: Option<String>,
    pub stroke_width: Option<u32>,
    pub fill_color: Option<String>,
    #[serde(alias = "dashPattern")]
    pub stroke_pattern: Option<Vec<u32>>,
    pub visible: Option<bool>,
    pub z_index: Option<i32>,
}

/// Partial overlay update
pub type OverlayPatch = OverlayAttributes;

impl OverlayAttributes {
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Every coordinate carried by this payload
    pub fn coordinates_iter(&self) -> impl Iterator<Item = &LatLng> {
        self.coordinates.iter().flatten().chain(self.center.iter())
    }
}

/// Input for creating an overlay
#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySpec {
    pub kind: OverlayKind,
    pub attributes: OverlayAttributes,
}

impl OverlaySpec {
    pub fn new(kind: OverlayKind, attributes: OverlayAttributes) -> Self {
        Self { kind, attributes }
    }

    pub fn polyline(points: Vec<LatLng>) -> Self {
        Self::new(
            OverlayKind::Polyline,
            OverlayAttributes {
                coordinates: Some(points),
                ..Default::default()
            },
        )
    }

    pub fn polygon(points: Vec<LatLng>) -> Self {
        Self::new(
            OverlayKind::Polygon,
            OverlayAttributes {
                coordinates: Some(points),
                ..Default::default()
            },
        )
    }

    pub fn circle(center: LatLng, radius_m: f64) -> Self {
        Self::new(
            OverlayKind::Circle,
            OverlayAttributes {
                center: Some(center),
                radius: Some(radius_m),
                ..Default::default()
            },
        )
    }
}

/// A polyline, polygon or circle owned by the overlay registry.
///
/// Records may hold a shape the engine cannot draw (too few points, no
/// center); that is only rejected when projecting to a [`Drawable`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OverlayKind,
    #[serde(rename = "coordinates")]
    pub points: Vec<LatLng>,
    pub center: Option<LatLng>,
    #[serde(rename = "radius")]
    pub radius_m: f64,
    pub stroke_color: Color,
    pub stroke_width: u32,
    pub fill_color: Color,
    #[serde(rename = "strokePattern")]
    pub dash_pattern: Vec<u32>,
    pub visible: bool,
    pub z_index: i32,
}

impl OverlayRecord {
    pub fn new(id: String, kind: OverlayKind) -> Self {
        Self {
            id,
            kind,
            points: Vec::new(),
            center: None,
            radius_m: DEFAULT_CIRCLE_RADIUS_M,
            stroke_color: Color::BLUE,
            stroke_width: DEFAULT_STROKE_WIDTH,
            fill_color: Color::new(0, 0, 255, 0x80),
            dash_pattern: Vec::new(),
            visible: true,
            z_index: 0,
        }
    }

    fn stroke(&self) -> Stroke {
        Stroke {
            color: self.stroke_color,
            width: self.stroke_width,
            dash_pattern: self.dash_pattern.clone(),
        }
    }

    /// Checks the shape is drawable
    pub fn validate_geometry(&self) -> Result<()> {
        match self.kind {
            OverlayKind::Polyline if self.points.len() < 2 => Err(MapError::InvalidGeometry(
                format!("polyline {} needs at least 2 points, has {}", self.id, self.points.len()),
            )),
            OverlayKind::Polygon if self.points.len() < 3 => Err(MapError::InvalidGeometry(
                format!("polygon {} needs at least 3 points, has {}", self.id, self.points.len()),
            )),
            OverlayKind::Circle if self.center.is_none() => Err(MapError::InvalidGeometry(
                format!("circle {} has no center", self.id),
            )),
            OverlayKind::Circle if !(self.radius_m > 0.0 && self.radius_m.is_finite()) => {
                Err(MapError::InvalidGeometry(format!(
                    "circle {} radius must be positive, got {}",
                    self.id, self.radius_m
                )))
            }
            _ => Ok(()),
        }
    }
}

impl Annotation for OverlayRecord {
    type Spec = OverlaySpec;
    type Patch = OverlayPatch;

    fn id_prefix(spec: &OverlaySpec) -> &'static str {
        spec.kind.as_str()
    }

    fn create(id: String, spec: OverlaySpec) -> Self {
        let mut record = OverlayRecord::new(id, spec.kind);
        record.apply(&spec.attributes);
        record
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&mut self, patch: &OverlayPatch) {
        if let Some(points) = &patch.coordinates {
            self.points = points.clone();
        }
        if let Some(center) = patch.center {
            self.center = Some(center);
        }
        if let Some(radius) = patch.radius {
            self.radius_m = radius;
        }
        if let Some(color) = &patch.stroke_color {
            self.stroke_color = Color::parse_or_default(color);
        }
        if let Some(width) = patch.stroke_width {
            self.stroke_width = width;
        }
        if let Some(color) = &patch.fill_color {
            self.fill_color = Color::parse_or_default(color);
        }
        if let Some(pattern) = &patch.stroke_pattern {
            self.dash_pattern = pattern.clone();
        }
        if let Some(visible) = patch.visible {
            self.visible = visible;
        }
        if let Some(z_index) = patch.z_index {
            self.z_index = z_index;
        }
    }

    fn to_drawable(&self) -> Result<Drawable> {
        self.validate_geometry()?;
        Ok(match self.kind {
            OverlayKind::Polyline => Drawable::Polyline {
                points: self.points.clone(),
                stroke: self.stroke(),
                visible: self.visible,
                z_index: self.z_index,
            },
            OverlayKind::Polygon => Drawable::Polygon {
                points: self.points.clone(),
                stroke: self.stroke(),
                fill: self.fill_color,
                visible: self.visible,
                z_index: self.z_index,
            },
            OverlayKind::Circle => Drawable::Circle {
                center: self.center.unwrap_or_default(),
                radius_m: self.radius_m,
                stroke: self.stroke(),
                fill: self.fill_color,
                visible: self.visible,
                z_index: self.z_index,
            },
        })
    }
}
