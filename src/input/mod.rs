pub mod events;
pub mod sink;

// Re-export the essential types
pub use events::{DragPhase, EngineEvent, MapEvent};
pub use sink::{ChannelEventSink, EventCallback, EventManager, NullEventSink};
