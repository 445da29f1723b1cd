//! Map annotations: markers, overlays and the info window.
//!
//! Markers and overlays live in independent [`registry::AnnotationRegistry`]
//! instances owned by the view controller; the info window reads markers
//! but never mutates them.

pub mod info_window;
pub mod marker;
pub mod overlay;
pub mod registry;

pub use info_window::{InfoWindowManager, InfoWindowOptions};
pub use marker::{MarkerPatch, MarkerRecord, MarkerSpec};
pub use overlay::{Color, OverlayAttributes, OverlayKind, OverlayPatch, OverlayRecord, OverlaySpec};
pub use registry::{Annotation, AnnotationRegistry};
