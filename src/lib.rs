//! # mapbridge
//!
//! Orchestration layer between a declarative map view and an imperative
//! map/location engine.
//!
//! The crate keeps "what the UI wants the map to look like" consistent while
//! the engine initialises asynchronously: property writes are buffered and
//! replayed once the view becomes ready, annotations live in id-keyed
//! registries, and a location pipeline validates, filters and caches fixes.

pub mod core;
pub mod engine;
pub mod input;
pub mod layers;
pub mod location;
pub mod module;
pub mod prelude;
pub mod runtime;
pub mod sdk;
pub mod traits;
pub use crate::core::constants;

use serde::{Deserialize, Serialize};

// Re-export public API
pub use core::{
    builder::MapViewBuilder,
    config::{AccuracyPolicy, LocationOptions, LocationProfile, SdkConfig},
    geo::{LatLng, LatLngBounds},
    state::MapViewState,
    view::MapViewController,
};

pub use engine::{bridge::BridgeMapEngine, simulated::SimulatedMapEngine};

pub use input::{
    events::{EngineEvent, MapEvent},
    sink::{ChannelEventSink, EventManager},
};

pub use layers::{marker::MarkerRecord, overlay::OverlayRecord};

pub use location::{pipeline::LocationPipeline, result::LocationResult};

pub use module::MapModule;
pub use sdk::MapSdk;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapError {
    #[error("SDK is not initialized")]
    NotInitialized,

    #[error("Map view is not ready")]
    NotReady,

    #[error("Invalid API key: {0}")]
    InvalidApiKey(String),

    #[error("Location permission is required")]
    PermissionDenied,

    #[error("Location service is disabled")]
    LocationServiceDisabled,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Location request timed out after {0} ms")]
    LocationTimeout(u64),

    #[error("Location failed: {0}")]
    LocationFailed(String),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error type alias for convenience
pub type Error = MapError;

impl From<serde_json::Error> for MapError {
    fn from(err: serde_json::Error) -> Self {
        MapError::Serialization(err.to_string())
    }
}

impl MapError {
    /// Stable code reported to the UI bridge
    pub fn code(&self) -> ErrorCode {
        match self {
            MapError::NotInitialized | MapError::NotReady => ErrorCode::SdkNotInitialized,
            MapError::InvalidApiKey(_) => ErrorCode::InvalidApiKey,
            MapError::PermissionDenied => ErrorCode::LocationPermissionDenied,
            MapError::LocationServiceDisabled => ErrorCode::LocationServiceDisabled,
            MapError::Network(_) => ErrorCode::NetworkError,
            MapError::LocationTimeout(_) => ErrorCode::LocationTimeout,
            MapError::LocationFailed(_) => ErrorCode::LocationFailed,
            MapError::InvalidCoordinates(_)
            | MapError::InvalidGeometry(_)
            | MapError::InvalidParameter(_)
            | MapError::Serialization(_) => ErrorCode::InvalidParameter,
            MapError::Engine(_) | MapError::Internal(_) => ErrorCode::UnknownError,
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code().as_str().to_string(),
            message: self.to_string(),
        }
    }
}

/// Error codes understood by the UI bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    SdkNotInitialized,
    InvalidApiKey,
    LocationPermissionDenied,
    LocationServiceDisabled,
    NetworkError,
    LocationTimeout,
    LocationFailed,
    InvalidParameter,
    UnknownError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::SdkNotInitialized => "SDK_NOT_INITIALIZED",
            ErrorCode::InvalidApiKey => "INVALID_API_KEY",
            ErrorCode::LocationPermissionDenied => "LOCATION_PERMISSION_DENIED",
            ErrorCode::LocationServiceDisabled => "LOCATION_SERVICE_DISABLED",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::LocationTimeout => "LOCATION_TIMEOUT",
            ErrorCode::LocationFailed => "LOCATION_FAILED",
            ErrorCode::InvalidParameter => "INVALID_PARAMETER",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{code, message}` pair handed back across the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl From<&MapError> for ErrorPayload {
    fn from(err: &MapError) -> Self {
        err.to_payload()
    }
}

/// Initialise `env_logger` once; later calls are no-ops.
#[cfg(feature = "debug")]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .is_test(cfg!(test))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(MapError::NotInitialized.code().as_str(), "SDK_NOT_INITIALIZED");
        assert_eq!(MapError::NotReady.code().as_str(), "SDK_NOT_INITIALIZED");
        assert_eq!(MapError::PermissionDenied.code().as_str(), "LOCATION_PERMISSION_DENIED");
        assert_eq!(MapError::LocationTimeout(30_000).code().as_str(), "LOCATION_TIMEOUT");
        assert_eq!(
            MapError::Internal("boom".into()).code().as_str(),
            "UNKNOWN_ERROR"
        );
    }

    #[test]
    fn test_payload_carries_message() {
        let payload = MapError::InvalidApiKey("empty".into()).to_payload();
        assert_eq!(payload.code, "INVALID_API_KEY");
        assert!(payload.message.contains("empty"));
    }
}
