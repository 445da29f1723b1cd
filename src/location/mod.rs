//! Location acquisition: validated fixes, sample sources and the
//! continuous/single-shot pipeline with its last-known-location cache.

pub mod pipeline;
pub mod result;
pub mod source;

pub use pipeline::{LocationCallback, LocationPipeline, PipelineState};
pub use result::{LocationResult, RawLocation};
pub use source::{FeedLocationSource, ScriptedLocationSource, SimulatedLocationSource};
