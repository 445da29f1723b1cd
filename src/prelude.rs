//! Prelude module for common mapbridge types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use mapbridge::prelude::*;`

pub use crate::core::{
    builder::{MapViewBuilder, ReadinessSignal},
    config::{
        AccuracyBand, AccuracyPolicy, CoordinateSystem, LocationMode, LocationOptions,
        LocationOptionsPatch, LocationProfile, SdkConfig,
    },
    geo::{LatLng, LatLngBounds},
    state::{ControlSettings, MapKind, MapStatus, MapViewState, Padding},
    view::MapViewController,
};

pub use crate::layers::{
    info_window::{InfoWindowManager, InfoWindowOptions},
    marker::{IconSource, MarkerPatch, MarkerRecord, MarkerSpec},
    overlay::{Color, OverlayAttributes, OverlayKind, OverlayPatch, OverlayRecord, OverlaySpec},
    registry::{Annotation, AnnotationRegistry},
};

pub use crate::input::{
    events::{DragPhase, EngineEvent, MapEvent},
    sink::{ChannelEventSink, EventManager, NullEventSink},
};

pub use crate::location::{
    pipeline::{LocationCallback, LocationPipeline, PipelineState},
    result::{LocationResult, RawLocation},
    source::{FeedLocationSource, ScriptedLocationSource, SimulatedLocationSource},
};

pub use crate::engine::{
    bridge::{BridgeMapEngine, EngineCommand},
    simulated::{EngineCall, EngineSnapshot, SimulatedMapEngine},
    Drawable, EngineHandle, InfoWindowContent,
};

pub use crate::runtime::{ManualScheduler, Scheduler, Task, TimerHandle};

#[cfg(feature = "tokio-runtime")]
pub use crate::runtime::TokioScheduler;

pub use crate::traits::{EventSink, LocationSource, MapEngine, PermissionProvider, StaticPermissions};

pub use crate::{
    module::{MapModule, PermissionStatus, SdkInfo, SdkInitResult, ServiceStatus},
    sdk::{mask_api_key, MapSdk},
};

pub use crate::{Error as MapError, ErrorCode, ErrorPayload, Result};

pub use std::{
    sync::{Arc, Weak},
    time::Duration,
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
