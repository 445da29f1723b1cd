//! Upward module facade consumed by the UI bridge.
//!
//! Asynchronous calls resolve exactly once, either through a callback or a
//! future. Fire-and-forget calls report failure through events only.

use std::future::Future;

use futures::channel::oneshot;
use serde::Serialize;

use crate::{
    core::{
        builder::MapViewBuilder,
        config::{LocationOptions, LocationOptionsPatch, SdkConfig},
        view::MapViewController,
    },
    input::events::MapEvent,
    location::{
        pipeline::{LocationCallback, LocationPipeline},
        result::LocationResult,
        source::SimulatedLocationSource,
    },
    prelude::Arc,
    runtime::Scheduler,
    sdk::MapSdk,
    traits::{EventSink, LocationSource, MapEngine, PermissionProvider},
    MapError, Result,
};

/// Outcome of [`MapModule::init_sdk`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkInitResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Masked key, present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub started: bool,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PermissionStatus {
    pub location: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkInfo {
    pub initialized: bool,
    pub version: String,
    pub platform: String,
    pub coord_type: String,
    /// Masked; empty before initialisation
    pub api_key: String,
    pub privacy_agreed: bool,
    pub timestamp: u64,
}

/// Module-level API: SDK lifecycle, location service, view creation
pub struct MapModule {
    sdk: MapSdk,
    scheduler: Arc<dyn Scheduler>,
    sink: Arc<dyn EventSink>,
    permissions: Arc<dyn PermissionProvider>,
    pipeline: LocationPipeline,
}

impl MapModule {
    pub fn new(
        config: SdkConfig,
        source: Box<dyn LocationSource>,
        scheduler: Arc<dyn Scheduler>,
        sink: Arc<dyn EventSink>,
        permissions: Arc<dyn PermissionProvider>,
    ) -> Self {
        let pipeline = LocationPipeline::new(
            source,
            scheduler.clone(),
            sink.clone(),
            permissions.clone(),
        );
        pipeline.set_freshness_window_ms(config.freshness_window_ms);
        Self {
            sdk: MapSdk::new(config),
            scheduler,
            sink,
            permissions,
            pipeline,
        }
    }

    /// A module backed by [`SimulatedLocationSource`]
    pub fn simulated(
        config: SdkConfig,
        scheduler: Arc<dyn Scheduler>,
        sink: Arc<dyn EventSink>,
        permissions: Arc<dyn PermissionProvider>,
    ) -> Self {
        let source = SimulatedLocationSource::new(scheduler.clone(), config.accuracy.clone());
        Self::new(config, Box::new(source), scheduler, sink, permissions)
    }

    pub fn sdk(&self) -> &MapSdk {
        &self.sdk
    }

    pub fn pipeline(&self) -> &LocationPipeline {
        &self.pipeline
    }

    /// Initialises the SDK.
    ///
    /// An empty key is an error. Missing location permission is reported as
    /// an unsuccessful result with code `PERMISSION_REQUIRED`, and the SDK
    /// stays uninitialised.
    pub fn init_sdk(&self, api_key: Option<&str>) -> Result<SdkInitResult> {
        let key = self.sdk.resolve_api_key(api_key)?;

        if !self.permissions.has_location_permission() {
            log::warn!("location permission missing; SDK not initialised");
            return Ok(SdkInitResult {
                success: false,
                message: "Location permission is required for SDK initialization".into(),
                code: Some("PERMISSION_REQUIRED".into()),
                api_key: None,
            });
        }

        let masked = self.sdk.initialize(Some(&key))?;
        Ok(SdkInitResult {
            success: true,
            message: "SDK initialized successfully".into(),
            code: None,
            api_key: Some(masked),
        })
    }

    pub fn is_sdk_initialized(&self) -> bool {
        self.sdk.is_initialized()
    }

    /// Resolves `callback` once with a location or a structured error
    pub fn get_current_location(
        &self,
        patch: Option<&LocationOptionsPatch>,
        callback: LocationCallback,
    ) {
        if let Err(e) = self.sdk.ensure_initialized() {
            callback(Err(e));
            return;
        }
        self.pipeline.get_current_location(patch, callback);
    }

    /// Future form of [`get_current_location`](Self::get_current_location).
    ///
    /// The request is issued immediately, not on first poll.
    pub fn current_location(
        &self,
        patch: Option<&LocationOptionsPatch>,
    ) -> impl Future<Output = Result<LocationResult>> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        self.get_current_location(
            patch,
            Box::new(move |result| {
                // The receiver may have been dropped; nobody is waiting then
                let _ = tx.send(result);
            }),
        );
        async move {
            rx.await
                .unwrap_or_else(|_| Err(MapError::Internal("location request dropped".into())))
        }
    }

    /// Starts the location stream; failures arrive as `LocationError` events
    pub fn start_location_service(&self, patch: Option<&LocationOptionsPatch>) {
        if let Err(e) = self.sdk.ensure_initialized() {
            log::warn!("cannot start location service: {e}");
            self.sink.emit(MapEvent::LocationError(e.to_payload()));
            return;
        }
        self.pipeline.start(patch);
    }

    pub fn stop_location_service(&self) {
        self.pipeline.stop();
    }

    pub fn is_location_service_started(&self) -> ServiceStatus {
        ServiceStatus {
            started: self.pipeline.is_started(),
            enabled: self.pipeline.is_enabled(),
        }
    }

    pub fn set_location_options(&self, patch: &LocationOptionsPatch) {
        self.pipeline.set_options(patch);
    }

    pub fn location_options(&self) -> LocationOptions {
        self.pipeline.options()
    }

    pub fn last_known_location(&self) -> Option<LocationResult> {
        self.pipeline.last_known_location()
    }

    pub fn check_permissions(&self) -> PermissionStatus {
        PermissionStatus {
            location: self.permissions.has_location_permission(),
        }
    }

    pub fn set_agree_privacy(&self, agree: bool) {
        log::info!("privacy agreement set to {agree}");
        self.sdk.set_privacy_agreed(agree);
    }

    pub fn check_privacy_agreement(&self) -> bool {
        self.sdk.privacy_agreed()
    }

    pub fn sdk_info(&self) -> SdkInfo {
        let config = self.sdk.config();
        SdkInfo {
            initialized: self.sdk.is_initialized(),
            version: config.version.clone(),
            platform: config.platform.clone(),
            coord_type: "BD09LL".into(),
            api_key: self.sdk.masked_api_key().unwrap_or_default(),
            privacy_agreed: self.sdk.privacy_agreed(),
            timestamp: self.scheduler.now_ms(),
        }
    }

    pub fn version(&self) -> &str {
        &self.sdk.config().version
    }

    /// Builds a view on this module's SDK handle and scheduler.
    ///
    /// Events go to `sink`, or to the module's sink if `None`.
    pub fn create_map_view(
        &self,
        engine: impl MapEngine + 'static,
        sink: Option<Arc<dyn EventSink>>,
    ) -> Result<MapViewController> {
        self.map_view_builder(engine, sink).build()
    }

    /// Like [`create_map_view`](Self::create_map_view), for further configuration
    pub fn map_view_builder(
        &self,
        engine: impl MapEngine + 'static,
        sink: Option<Arc<dyn EventSink>>,
    ) -> MapViewBuilder {
        MapViewBuilder::new(self.sdk.clone(), engine, self.scheduler.clone())
            .event_sink(sink.unwrap_or_else(|| self.sink.clone()))
    }

    /// Stops the location service, fails pending requests and shuts the SDK down
    pub fn destroy(&self) {
        self.pipeline.destroy();
        self.sdk.shutdown();
    }
}
