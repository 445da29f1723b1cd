use serde::{Deserialize, Serialize};

use crate::{core::geo::LatLng, engine::Drawable, layers::registry::Annotation, Result};

/// Icon reference: a bare path/name or an `{uri}`/`{url}` object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IconSource {
    Path(String),
    Uri {
        #[serde(alias = "url")]
        uri: String,
    },
}

impl IconSource {
    pub fn into_ref(self) -> String {
        match self {
            IconSource::Path(path) => path,
            IconSource::Uri { uri } => uri,
        }
    }
}

/// Input for creating a marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerSpec {
    pub coordinate: LatLng,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<IconSource>,
    #[serde(default)]
    pub draggable: Option<bool>,
    #[serde(default)]
    pub visible: Option<bool>,
    #[serde(default)]
    pub alpha: Option<f32>,
    #[serde(default)]
    pub rotation: Option<f32>,
    #[serde(default)]
    pub flat: Option<bool>,
    #[serde(default)]
    pub z_index: Option<i32>,
}

impl MarkerSpec {
    /// A spec with only a coordinate; everything else defaults
    pub fn at(coordinate: LatLng) -> Self {
        Self {
            coordinate,
            title: None,
            description: None,
            icon: None,
            draggable: None,
            visible: None,
            alpha: None,
            rotation: None,
            flat: None,
            z_index: None,
        }
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    fn into_patch(self) -> MarkerPatch {
        MarkerPatch {
            coordinate: Some(self.coordinate),
            title: self.title,
            description: self.description,
            icon: self.icon,
            draggable: self.draggable,
            visible: self.visible,
            alpha: self.alpha,
            rotation: self.rotation,
            flat: self.flat,
            z_index: self.z_index,
        }
    }
}

/// Partial marker update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarkerPatch {
    pub coordinate: Option<LatLng>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon: Option<IconSource>,
    pub draggable: Option<bool>,
    pub visible: Option<bool>,
    pub alpha: Option<f32>,
    pub rotation: Option<f32>,
    pub flat: Option<bool>,
    pub z_index: Option<i32>,
}

impl MarkerPatch {
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// A marker owned by the marker registry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerRecord {
    pub id: String,
    pub coordinate: LatLng,
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub draggable: bool,
    pub visible: bool,
    pub alpha: f32,
    pub rotation: f32,
    pub flat: bool,
    pub z_index: i32,
}

impl MarkerRecord {
    pub fn new(id: String, coordinate: LatLng) -> Self {
        Self {
            id,
            coordinate,
            title: None,
            description: None,
            icon: None,
            draggable: false,
            visible: true,
            alpha: 1.0,
            rotation: 0.0,
            flat: false,
            z_index: 0,
        }
    }
}

impl Annotation for MarkerRecord {
    type Spec = MarkerSpec;
    type Patch = MarkerPatch;

    fn id_prefix(_spec: &MarkerSpec) -> &'static str {
        "marker"
    }

    fn create(id: String, spec: MarkerSpec) -> Self {
        let mut record = MarkerRecord::new(id, spec.coordinate);
        record.apply(&spec.into_patch());
        record
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&mut self, patch: &MarkerPatch) {
        if let Some(coordinate) = patch.coordinate {
            self.coordinate = coordinate;
        }
        if let Some(title) = &patch.title {
            self.title = Some(title.clone());
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(icon) = &patch.icon {
            self.icon = Some(icon.clone().into_ref());
        }
        if let Some(draggable) = patch.draggable {
            self.draggable = draggable;
        }
        if let Some(visible) = patch.visible {
            self.visible = visible;
        }
        if let Some(alpha) = patch.alpha.filter(|a| !a.is_nan()) {
            self.alpha = alpha.clamp(0.0, 1.0);
        }
        if let Some(rotation) = patch.rotation.filter(|r| r.is_finite()) {
            self.rotation = rotation;
        }
        if let Some(flat) = patch.flat {
            self.flat = flat;
        }
        if let Some(z_index) = patch.z_index {
            self.z_index = z_index;
        }
    }

    fn to_drawable(&self) -> Result<Drawable> {
        self.coordinate.validate()?;
        Ok(Drawable::Marker {
            position: self.coordinate,
            title: self.title.clone(),
            icon: self.icon.clone(),
            draggable: self.draggable,
            visible: self.visible,
            alpha: self.alpha,
            rotation: self.rotation,
            flat: self.flat,
            z_index: self.z_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_fills_defaults() {
        let spec = MarkerSpec {
            title: Some("A".into()),
            ..MarkerSpec::at(LatLng::new(39.9, 116.4))
        };
        let record = MarkerRecord::create("marker_1".into(), spec);
        assert_eq!(record.coordinate, LatLng::new(39.9, 116.4));
        assert_eq!(record.title.as_deref(), Some("A"));
        assert_eq!(record.alpha, 1.0);
        assert!(record.visible);
        assert!(!record.draggable);
        assert_eq!(record.z_index, 0);
        assert!(record.description.is_none());
    }

    #[test]
    fn test_patch_touches_only_present_keys() {
        let mut record = MarkerRecord::new("marker_1".into(), LatLng::new(39.9, 116.4));
        record.title = Some("keep".into());
        record.apply(&MarkerPatch {
            alpha: Some(3.0),
            draggable: Some(true),
            ..Default::default()
        });
        assert_eq!(record.alpha, 1.0);
        assert!(record.draggable);
        assert_eq!(record.title.as_deref(), Some("keep"));
        assert_eq!(record.coordinate, LatLng::new(39.9, 116.4));
    }

    #[test]
    fn test_spec_from_bridge_json() {
        let spec = MarkerSpec::from_json(serde_json::json!({
            "coordinate": {"latitude": 39.9, "longitude": 116.4},
            "title": "A",
            "icon": {"url": "https://example.com/pin.png"},
            "zIndex": 4
        }))
        .unwrap();
        let record = MarkerRecord::create("marker_1".into(), spec);
        assert_eq!(record.icon.as_deref(), Some("https://example.com/pin.png"));
        assert_eq!(record.z_index, 4);

        let bare = MarkerPatch::from_json(serde_json::json!({"icon": "pin"})).unwrap();
        assert_eq!(bare.icon.map(IconSource::into_ref).as_deref(), Some("pin"));

        assert!(MarkerSpec::from_json(serde_json::json!({"title": "no coordinate"})).is_err());
    }

    #[test]
    fn test_out_of_range_marker_is_not_drawable() {
        let record = MarkerRecord::new("marker_1".into(), LatLng::new(100.0, 116.4));
        assert!(record.to_drawable().is_err());
    }
}
