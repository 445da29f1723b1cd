use serde::{Deserialize, Serialize};

use crate::{
    constants::DEFAULT_INFO_WINDOW_Y_OFFSET,
    engine::InfoWindowContent,
    input::events::MapEvent,
    layers::{marker::MarkerRecord, registry::AnnotationRegistry},
    traits::MapEngine,
};

/// Overrides for what an info window shows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InfoWindowOptions {
    pub title: Option<String>,
    pub description: Option<String>,
    pub y_offset: Option<i32>,
}

/// Tracks the single info window a view can show.
///
/// Events are appended to the caller's buffer so the controller can emit
/// them after releasing its lock.
#[derive(Debug, Default)]
pub struct InfoWindowManager {
    current: Option<String>,
}

impl InfoWindowManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shows the window above `marker_id`, replacing any open one.
    ///
    /// Returns `false` if the marker does not exist or the engine refused.
    pub fn show(
        &mut self,
        marker_id: &str,
        options: &InfoWindowOptions,
        markers: &AnnotationRegistry<MarkerRecord>,
        engine: &mut dyn MapEngine,
        events: &mut Vec<MapEvent>,
    ) -> bool {
        let Some(marker) = markers.get(marker_id) else {
            log::warn!("cannot show info window: no marker {marker_id}");
            return false;
        };

        let content = InfoWindowContent {
            marker_id: marker_id.to_string(),
            anchor: marker.coordinate,
            title: options.title.clone().or_else(|| marker.title.clone()),
            description: options
                .description
                .clone()
                .or_else(|| marker.description.clone()),
            y_offset: options.y_offset.unwrap_or(DEFAULT_INFO_WINDOW_Y_OFFSET),
        };

        self.hide(engine, events);

        if let Err(e) = engine.show_info_window(&content) {
            log::error!("failed to show info window for {marker_id}: {e}");
            return false;
        }
        self.current = Some(marker_id.to_string());
        events.push(MapEvent::InfoWindowShow {
            marker_id: marker_id.to_string(),
        });
        true
    }

    /// Hides the open window, if any
    pub fn hide(&mut self, engine: &mut dyn MapEngine, events: &mut Vec<MapEvent>) -> bool {
        let Some(marker_id) = self.current.take() else {
            return false;
        };
        if let Err(e) = engine.hide_info_window() {
            log::error!("failed to hide info window for {marker_id}: {e}");
        }
        events.push(MapEvent::InfoWindowHide { marker_id });
        true
    }

    /// Re-shows the window with new options, but only if it belongs to `marker_id`
    pub fn update(
        &mut self,
        marker_id: &str,
        options: &InfoWindowOptions,
        markers: &AnnotationRegistry<MarkerRecord>,
        engine: &mut dyn MapEngine,
        events: &mut Vec<MapEvent>,
    ) -> bool {
        if self.current.as_deref() != Some(marker_id) {
            return false;
        }
        self.show(marker_id, options, markers, engine, events)
    }

    /// The user tapped the open window
    pub fn press(&self, events: &mut Vec<MapEvent>) {
        if let Some(marker_id) = &self.current {
            events.push(MapEvent::InfoWindowPress {
                marker_id: marker_id.clone(),
            });
        }
    }

    /// Closes the window if its marker went away
    pub fn on_marker_removed(
        &mut self,
        marker_id: &str,
        engine: &mut dyn MapEngine,
        events: &mut Vec<MapEvent>,
    ) {
        if self.current.as_deref() == Some(marker_id) {
            self.hide(engine, events);
        }
    }

    pub fn current_marker_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn is_showing(&self) -> bool {
        self.current.is_some()
    }

    pub fn destroy(&mut self, engine: &mut dyn MapEngine, events: &mut Vec<MapEvent>) {
        self.hide(engine, events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{core::geo::LatLng, engine::simulated::SimulatedMapEngine, layers::marker::MarkerSpec};

    fn setup() -> (SimulatedMapEngine, AnnotationRegistry<MarkerRecord>) {
        let mut engine = SimulatedMapEngine::new();
        let mut markers = AnnotationRegistry::new();
        for title in ["A", "B"] {
            markers.add(
                MarkerSpec {
                    title: Some(title.into()),
                    ..MarkerSpec::at(LatLng::new(39.9, 116.4))
                },
                &mut engine,
            );
        }
        (engine, markers)
    }

    #[test]
    fn test_show_uses_marker_fields_by_default() {
        let (mut engine, markers) = setup();
        let mut manager = InfoWindowManager::new();
        let mut events = Vec::new();

        assert!(manager.show("marker_1", &InfoWindowOptions::default(), &markers, &mut engine, &mut events));
        assert_eq!(manager.current_marker_id(), Some("marker_1"));
        let content = engine.snapshot().info_window.unwrap();
        assert_eq!(content.title.as_deref(), Some("A"));
        assert_eq!(content.y_offset, -47);
        assert_eq!(
            events,
            vec![MapEvent::InfoWindowShow {
                marker_id: "marker_1".into()
            }]
        );
    }

    #[test]
    fn test_show_replaces_current_window() {
        let (mut engine, markers) = setup();
        let mut manager = InfoWindowManager::new();
        let mut events = Vec::new();
        let options = InfoWindowOptions::default();

        manager.show("marker_1", &options, &markers, &mut engine, &mut events);
        events.clear();
        manager.show("marker_2", &options, &markers, &mut engine, &mut events);
        let names: Vec<_> = events.iter().map(MapEvent::name).collect();
        assert_eq!(names, vec!["onInfoWindowHide", "onInfoWindowShow"]);
    }

    #[test]
    fn test_unknown_marker_and_idle_hide() {
        let (mut engine, markers) = setup();
        let mut manager = InfoWindowManager::new();
        let mut events = Vec::new();

        assert!(!manager.show("marker_9", &InfoWindowOptions::default(), &markers, &mut engine, &mut events));
        assert!(!manager.hide(&mut engine, &mut events));
        assert!(events.is_empty());
    }

    #[test]
    fn test_update_only_touches_current() {
        let (mut engine, markers) = setup();
        let mut manager = InfoWindowManager::new();
        let mut events = Vec::new();
        manager.show("marker_1", &InfoWindowOptions::default(), &markers, &mut engine, &mut events);

        let options = InfoWindowOptions {
            title: Some("override".into()),
            ..Default::default()
        };
        assert!(!manager.update("marker_2", &options, &markers, &mut engine, &mut events));
        assert!(manager.update("marker_1", &options, &markers, &mut engine, &mut events));
        assert_eq!(
            engine.snapshot().info_window.and_then(|c| c.title).as_deref(),
            Some("override")
        );
    }

    #[test]
    fn test_press_and_destroy() {
        let (mut engine, markers) = setup();
        let mut manager = InfoWindowManager::new();
        let mut events = Vec::new();
        manager.press(&mut events);
        assert!(events.is_empty());

        manager.show("marker_2", &InfoWindowOptions::default(), &markers, &mut engine, &mut events);
        manager.press(&mut events);
        manager.destroy(&mut engine, &mut events);
        let names: Vec<_> = events.iter().map(MapEvent::name).collect();
        assert_eq!(names, vec!["onInfoWindowShow", "onInfoWindowPress", "onInfoWindowHide"]);
        assert!(!manager.is_showing());
        assert!(engine.snapshot().info_window.is_none());
    }
}
