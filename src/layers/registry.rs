use crate::{
    engine::{Drawable, EngineHandle},
    prelude::HashMap,
    traits::MapEngine,
    Result,
};

/// A record that can live in an [`AnnotationRegistry`]
pub trait Annotation: Clone + Send + 'static {
    /// Full input for a new record
    type Spec;
    /// Partial update; absent keys leave fields untouched
    type Patch;

    /// Prefix of generated ids, e.g. `marker` for `marker_1`
    fn id_prefix(spec: &Self::Spec) -> &'static str;

    fn create(id: String, spec: Self::Spec) -> Self;

    fn id(&self) -> &str;

    fn apply(&mut self, patch: &Self::Patch);

    /// Engine-facing projection; fails if the record cannot be drawn as is
    fn to_drawable(&self) -> Result<Drawable>;
}

struct Entry<A> {
    record: A,
    /// Derived engine projection, regenerable from `record`
    handle: Option<EngineHandle>,
}

/// Id-keyed annotation store with engine projection bookkeeping.
///
/// Operations on unknown ids are no-ops returning `false`/`None`, so callers
/// can issue commands against ids that were already removed.
pub struct AnnotationRegistry<A: Annotation> {
    entries: HashMap<String, Entry<A>>,
    /// Insertion order, used for listing
    order: Vec<String>,
    next_id: u64,
}

impl<A: Annotation> Default for AnnotationRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Annotation> AnnotationRegistry<A> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::default(),
            order: Vec::new(),
            next_id: 0,
        }
    }

    fn next_id(&mut self, prefix: &str) -> Option<String> {
        let next = self.next_id.checked_add(1)?;
        self.next_id = next;
        Some(format!("{prefix}_{next}"))
    }

    /// Draws `record` on the engine, replacing `existing` if given
    fn project(
        record: &A,
        existing: Option<EngineHandle>,
        engine: &mut dyn MapEngine,
    ) -> Option<EngineHandle> {
        let drawable = match record.to_drawable() {
            Ok(drawable) => drawable,
            Err(e) => {
                log::warn!("{} not drawn: {e}", record.id());
                if let Some(handle) = existing {
                    if let Err(e) = engine.remove_overlay(handle) {
                        log::error!("failed to remove {}: {e}", record.id());
                    }
                }
                return None;
            }
        };

        match existing {
            Some(handle) => match engine.update_overlay(handle, &drawable) {
                Ok(()) => Some(handle),
                Err(e) => {
                    log::error!("failed to update {}: {e}", record.id());
                    Some(handle)
                }
            },
            None => match engine.add_overlay(&drawable) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::error!("failed to draw {}: {e}", record.id());
                    None
                }
            },
        }
    }

    /// Stores a new record and draws it.
    ///
    /// Returns the generated id, or `None` if no id could be allocated. A
    /// record that cannot be drawn is still stored.
    pub fn add(&mut self, spec: A::Spec, engine: &mut dyn MapEngine) -> Option<String> {
        let id = self.next_id(A::id_prefix(&spec))?;
        if self.entries.contains_key(&id) {
            log::error!("annotation id {id} already in use");
            return None;
        }
        let record = A::create(id.clone(), spec);
        let handle = Self::project(&record, None, engine);
        self.entries.insert(id.clone(), Entry { record, handle });
        self.order.push(id.clone());
        Some(id)
    }

    /// Merges `patch` into the record and redraws it; `false` if `id` is unknown
    pub fn update(&mut self, id: &str, patch: &A::Patch, engine: &mut dyn MapEngine) -> bool {
        let Some(entry) = self.entries.get_mut(id) else {
            return false;
        };
        entry.record.apply(patch);
        entry.handle = Self::project(&entry.record, entry.handle, engine);
        true
    }

    /// Removes the record and its drawing; `false` if `id` is unknown
    pub fn remove(&mut self, id: &str, engine: &mut dyn MapEngine) -> bool {
        let Some(entry) = self.entries.remove(id) else {
            return false;
        };
        self.order.retain(|other| other != id);
        if let Some(handle) = entry.handle {
            if let Err(e) = engine.remove_overlay(handle) {
                log::error!("failed to remove {id}: {e}");
            }
        }
        true
    }

    /// Removes everything; returns how many records were dropped
    pub fn remove_all(&mut self, engine: &mut dyn MapEngine) -> usize {
        let count = self.entries.len();
        for id in std::mem::take(&mut self.order) {
            if let Some(Entry {
                handle: Some(handle),
                ..
            }) = self.entries.remove(&id)
            {
                if let Err(e) = engine.remove_overlay(handle) {
                    log::error!("failed to remove {id}: {e}");
                }
            }
        }
        self.entries.clear();
        count
    }

    pub fn get(&self, id: &str) -> Option<&A> {
        self.entries.get(id).map(|entry| &entry.record)
    }

    /// Mutates a record without touching the engine.
    ///
    /// For changes the engine already reflects, such as a finished drag.
    pub fn with_record_mut<F, R>(&mut self, id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut A) -> R,
    {
        self.entries.get_mut(id).map(|entry| f(&mut entry.record))
    }

    pub fn handle(&self, id: &str) -> Option<EngineHandle> {
        self.entries.get(id).and_then(|entry| entry.handle)
    }

    /// True if the record currently has an engine drawing
    pub fn is_drawn(&self, id: &str) -> bool {
        self.handle(id).is_some()
    }

    /// Reverse lookup from an engine handle
    pub fn id_for_handle(&self, handle: EngineHandle) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.handle == Some(handle))
            .map(|(id, _)| id.as_str())
    }

    /// Records in insertion order
    pub fn records(&self) -> Vec<&A> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|entry| &entry.record))
            .collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::geo::LatLng,
        engine::simulated::SimulatedMapEngine,
        layers::{
            marker::{MarkerPatch, MarkerRecord, MarkerSpec},
            overlay::{OverlayRecord, OverlaySpec},
        },
    };

    fn spec(title: &str) -> MarkerSpec {
        MarkerSpec {
            title: Some(title.to_string()),
            ..MarkerSpec::at(LatLng::new(39.9, 116.4))
        }
    }

    #[test]
    fn test_ids_are_monotonic_per_registry() {
        let mut engine = SimulatedMapEngine::new();
        let mut markers = AnnotationRegistry::<MarkerRecord>::new();
        let mut others = AnnotationRegistry::<MarkerRecord>::new();

        assert_eq!(markers.add(spec("A"), &mut engine).as_deref(), Some("marker_1"));
        assert_eq!(markers.add(spec("B"), &mut engine).as_deref(), Some("marker_2"));
        assert_eq!(others.add(spec("C"), &mut engine).as_deref(), Some("marker_1"));

        assert!(markers.remove("marker_1", &mut engine));
        assert_eq!(markers.add(spec("D"), &mut engine).as_deref(), Some("marker_3"));
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let mut engine = SimulatedMapEngine::new();
        let mut markers = AnnotationRegistry::<MarkerRecord>::new();
        markers.add(spec("A"), &mut engine);
        let calls_before = engine.calls().len();

        let patch = MarkerPatch {
            title: Some("changed".into()),
            ..Default::default()
        };
        assert!(!markers.update("marker_9", &patch, &mut engine));
        assert!(!markers.remove("marker_9", &mut engine));
        assert_eq!(markers.len(), 1);
        assert_eq!(markers.get("marker_1").and_then(|m| m.title.as_deref()), Some("A"));
        assert_eq!(engine.calls().len(), calls_before);
    }

    #[test]
    fn test_remove_twice() {
        let mut engine = SimulatedMapEngine::new();
        let mut markers = AnnotationRegistry::<MarkerRecord>::new();
        let id = markers.add(spec("A"), &mut engine).unwrap();
        assert!(markers.remove(&id, &mut engine));
        assert!(!markers.remove(&id, &mut engine));
        assert_eq!(engine.snapshot().overlays.len(), 0);
    }

    #[test]
    fn test_overlays_share_one_counter() {
        let mut engine = SimulatedMapEngine::new();
        let mut overlays = AnnotationRegistry::<OverlayRecord>::new();
        let a = LatLng::new(39.9, 116.4);
        let b = LatLng::new(39.91, 116.41);
        let c = LatLng::new(39.92, 116.40);

        assert_eq!(
            overlays.add(OverlaySpec::polyline(vec![a, b]), &mut engine).as_deref(),
            Some("polyline_1")
        );
        assert_eq!(
            overlays.add(OverlaySpec::polygon(vec![a, b, c]), &mut engine).as_deref(),
            Some("polygon_2")
        );
        assert_eq!(
            overlays.add(OverlaySpec::circle(a, 250.0), &mut engine).as_deref(),
            Some("circle_3")
        );
        assert_eq!(engine.snapshot().overlays.len(), 3);
    }

    #[test]
    fn test_undrawable_record_is_stored_but_not_drawn() {
        let mut engine = SimulatedMapEngine::new();
        let mut overlays = AnnotationRegistry::<OverlayRecord>::new();
        let id = overlays
            .add(OverlaySpec::polyline(vec![LatLng::new(39.9, 116.4)]), &mut engine)
            .unwrap();

        assert!(overlays.get(&id).is_some());
        assert!(!overlays.is_drawn(&id));
        assert!(engine.snapshot().overlays.is_empty());

        // Completing the shape draws it
        let patch = crate::layers::overlay::OverlayPatch {
            coordinates: Some(vec![LatLng::new(39.9, 116.4), LatLng::new(39.95, 116.45)]),
            ..Default::default()
        };
        assert!(overlays.update(&id, &patch, &mut engine));
        assert!(overlays.is_drawn(&id));
        assert_eq!(engine.snapshot().overlays.len(), 1);
    }

    #[test]
    fn test_remove_all_clears_engine() {
        let mut engine = SimulatedMapEngine::new();
        let mut markers = AnnotationRegistry::<MarkerRecord>::new();
        for title in ["A", "B", "C"] {
            markers.add(spec(title), &mut engine);
        }
        assert_eq!(markers.remove_all(&mut engine), 3);
        assert!(markers.is_empty());
        assert!(engine.snapshot().overlays.is_empty());
        assert_eq!(markers.remove_all(&mut engine), 0);
    }

    #[test]
    fn test_handle_lookup() {
        let mut engine = SimulatedMapEngine::new();
        let mut markers = AnnotationRegistry::<MarkerRecord>::new();
        let id = markers.add(spec("A"), &mut engine).unwrap();
        let handle = markers.handle(&id).unwrap();
        assert_eq!(markers.id_for_handle(handle), Some(id.as_str()));
        assert_eq!(markers.id_for_handle(EngineHandle(999)), None);
    }
}
