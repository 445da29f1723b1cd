//! Continuous and single-shot location acquisition.
//!
//! The continuous stream samples the source every
//! `max(MIN_SCAN_INTERVAL_MS, scan_interval)` and emits only valid fixes;
//! invalid samples are dropped without an error event. Single-shot requests
//! race a production timer against a timeout timer, and whichever takes the
//! in-flight acquisition first resolves every waiter exactly once.

use std::time::Duration;

use parking_lot::Mutex;

use crate::{
    constants::{LOCATION_FRESHNESS_WINDOW_MS, MIN_SCAN_INTERVAL_MS, NO_FIX_RETRY_MS},
    core::{
        config::{LocationOptions, LocationOptionsPatch},
        geo::LatLng,
    },
    input::events::MapEvent,
    location::result::LocationResult,
    prelude::{Arc, Weak},
    runtime::{Scheduler, TimerHandle},
    traits::{EventSink, LocationSource, PermissionProvider},
    MapError, Result,
};

/// Receives the outcome of a single-shot request, exactly once
pub type LocationCallback = Box<dyn FnOnce(Result<LocationResult>) + Send + 'static>;

/// Externally visible pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Stopped,
    Running,
    PendingSingleShot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Idle,
    Continuous,
    /// `start` with a zero scan interval: one sample, then idle
    OneOff,
}

/// A single-shot acquisition in flight
struct Acquisition {
    id: u64,
    options: LocationOptions,
    waiters: Vec<LocationCallback>,
    timers: Vec<TimerHandle>,
}

struct PipelineInner {
    options: LocationOptions,
    source: Box<dyn LocationSource>,
    stream: Stream,
    /// Bumped on every start/stop so stale ticks can tell they are stale
    stream_generation: u64,
    stream_timer: Option<TimerHandle>,
    last_known_location: Option<LocationResult>,
    last_location_time: Option<u64>,
    last_emitted: Option<LatLng>,
    acquisition: Option<Acquisition>,
    next_acquisition_id: u64,
    freshness_window_ms: u64,
    destroyed: bool,
}

impl PipelineInner {
    fn cancel_stream(&mut self) {
        if let Some(timer) = self.stream_timer.take() {
            timer.cancel();
        }
        self.stream = Stream::Idle;
        self.stream_generation += 1;
    }

    fn cache(&mut self, fix: &LocationResult, now_ms: u64) {
        self.last_known_location = Some(fix.clone());
        self.last_location_time = Some(now_ms);
    }

    fn fresh_location(&self, now_ms: u64) -> Option<LocationResult> {
        let cached_at = self.last_location_time?;
        if now_ms.saturating_sub(cached_at) < self.freshness_window_ms {
            self.last_known_location.clone()
        } else {
            None
        }
    }

    /// Distance filter for the continuous stream
    fn passes_distance_filter(&self, fix: &LocationResult) -> bool {
        let filter = self.options.distance_filter_m();
        match self.last_emitted {
            Some(previous) if filter > 0.0 => previous.distance_to(&fix.coordinate) >= filter,
            _ => true,
        }
    }

    /// Takes whatever acquisition is in flight, cancelling its timers
    fn take_any_acquisition(&mut self) -> Option<Acquisition> {
        let id = self.acquisition.as_ref()?.id;
        self.take_acquisition(id)
    }

    /// Takes the acquisition if `id` still owns the slot, cancelling its timers
    fn take_acquisition(&mut self, id: u64) -> Option<Acquisition> {
        if self.acquisition.as_ref().map(|a| a.id) != Some(id) {
            return None;
        }
        let acquisition = self.acquisition.take()?;
        for timer in &acquisition.timers {
            timer.cancel();
        }
        Some(acquisition)
    }
}

struct Shared {
    inner: Mutex<PipelineInner>,
    scheduler: Arc<dyn Scheduler>,
    sink: Arc<dyn EventSink>,
    permissions: Arc<dyn PermissionProvider>,
}

/// Location pipeline owned by the module facade.
///
/// Cheap to clone; clones drive the same pipeline.
#[derive(Clone)]
pub struct LocationPipeline {
    shared: Arc<Shared>,
}

fn resolve_all(waiters: Vec<LocationCallback>, result: Result<LocationResult>) {
    for waiter in waiters {
        waiter(result.clone());
    }
}

impl LocationPipeline {
    pub fn new(
        source: Box<dyn LocationSource>,
        scheduler: Arc<dyn Scheduler>,
        sink: Arc<dyn EventSink>,
        permissions: Arc<dyn PermissionProvider>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(PipelineInner {
                    options: LocationOptions::default(),
                    source,
                    stream: Stream::Idle,
                    stream_generation: 0,
                    stream_timer: None,
                    last_known_location: None,
                    last_location_time: None,
                    last_emitted: None,
                    acquisition: None,
                    next_acquisition_id: 0,
                    freshness_window_ms: LOCATION_FRESHNESS_WINDOW_MS,
                    destroyed: false,
                }),
                scheduler,
                sink,
                permissions,
            }),
        }
    }

    fn from_weak(weak: &Weak<Shared>) -> Option<Self> {
        weak.upgrade().map(|shared| Self { shared })
    }

    fn emit(&self, events: Vec<MapEvent>) {
        for event in events {
            self.shared.sink.emit(event);
        }
    }

    fn schedule(&self, delay_ms: u64, f: impl FnOnce(LocationPipeline) + Send + 'static) -> TimerHandle {
        let weak = Arc::downgrade(&self.shared);
        self.shared.scheduler.schedule(
            Duration::from_millis(delay_ms),
            Box::new(move || {
                // Liveness check: the pipeline may be gone by now
                if let Some(pipeline) = Self::from_weak(&weak) {
                    f(pipeline);
                }
            }),
        )
    }

    pub fn set_freshness_window_ms(&self, window_ms: u64) {
        self.shared.inner.lock().freshness_window_ms = window_ms;
    }

    /// Starts (or restarts) the update stream.
    ///
    /// Without location permission a `LOCATION_PERMISSION_DENIED` error is
    /// emitted and the pipeline stays as it was.
    pub fn start(&self, patch: Option<&LocationOptionsPatch>) {
        if !self.shared.permissions.has_location_permission() {
            log::warn!("location permission missing; not starting");
            self.emit(vec![MapEvent::LocationError(
                MapError::PermissionDenied.to_payload(),
            )]);
            return;
        }

        let mut inner = self.shared.inner.lock();
        if inner.destroyed {
            log::warn!("start called on a destroyed location pipeline");
            return;
        }
        if let Some(patch) = patch {
            inner.options.apply_patch(patch);
        }
        inner.cancel_stream();
        inner.last_emitted = None;

        let generation = inner.stream_generation;
        let period = inner.options.scan_interval_ms().max(MIN_SCAN_INTERVAL_MS);
        inner.stream = if inner.options.is_single_shot() {
            Stream::OneOff
        } else {
            Stream::Continuous
        };
        log::debug!(
            "location stream started ({:?}, every {period} ms, mode {})",
            inner.stream,
            inner.options.mode()
        );
        inner.stream_timer = Some(self.schedule(period, move |p| p.on_tick(generation)));
    }

    fn on_tick(&self, generation: u64) {
        let mut events = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            if inner.destroyed
                || inner.stream == Stream::Idle
                || inner.stream_generation != generation
            {
                return;
            }

            let options = inner.options.clone();
            match inner.source.sample(&options) {
                Ok(Some(raw)) => match raw.validate() {
                    Ok(fix) => {
                        if inner.passes_distance_filter(&fix) {
                            inner.last_emitted = Some(fix.coordinate);
                            events.push(MapEvent::location_update(&fix));
                        }
                        inner.cache(&fix, self.shared.scheduler.now_ms());
                    }
                    Err(e) => log::debug!("dropping invalid location sample: {e}"),
                },
                Ok(None) => log::debug!("no location fix yet"),
                Err(e) => log::warn!("location sample failed: {e}"),
            }

            if inner.stream == Stream::OneOff {
                inner.stream = Stream::Idle;
                inner.stream_timer = None;
            } else {
                let period = options.scan_interval_ms().max(MIN_SCAN_INTERVAL_MS);
                inner.stream_timer = Some(self.schedule(period, move |p| p.on_tick(generation)));
            }
        }
        self.emit(events);
    }

    /// Stops the update stream and any single-shot request; idempotent.
    ///
    /// Waiters of an interrupted request resolve once with `LOCATION_FAILED`.
    pub fn stop(&self) {
        let waiters = {
            let mut inner = self.shared.inner.lock();
            if inner.stream != Stream::Idle {
                log::debug!("location stream stopped");
            }
            inner.cancel_stream();
            inner.take_any_acquisition().map(|a| a.waiters)
        };
        if let Some(waiters) = waiters {
            log::debug!("stop interrupted a single-shot location request");
            resolve_all(
                waiters,
                Err(MapError::LocationFailed("location service stopped".into())),
            );
        }
    }

    /// Resolves `callback` with a fresh cached fix or a new single-shot acquisition
    pub fn get_current_location(
        &self,
        patch: Option<&LocationOptionsPatch>,
        callback: LocationCallback,
    ) {
        if !self.shared.permissions.has_location_permission() {
            callback(Err(MapError::PermissionDenied));
            return;
        }

        let now = self.shared.scheduler.now_ms();
        let mut inner = self.shared.inner.lock();
        if inner.destroyed {
            drop(inner);
            callback(Err(MapError::Internal("location pipeline destroyed".into())));
            return;
        }
        if let Some(fix) = inner.fresh_location(now) {
            drop(inner);
            callback(Ok(fix));
            return;
        }
        if let Some(acquisition) = inner.acquisition.as_mut() {
            // Join the acquisition already in flight
            acquisition.waiters.push(callback);
            return;
        }

        let mut options = inner.options.patched(patch);
        options.set_scan_interval_ms(0);
        let timeout_ms = options.timeout_ms();

        inner.next_acquisition_id += 1;
        let id = inner.next_acquisition_id;
        let production = self.schedule(timeout_ms / 2, move |p| p.on_attempt(id));
        let timeout = self.schedule(timeout_ms, move |p| p.on_timeout(id, timeout_ms));
        inner.acquisition = Some(Acquisition {
            id,
            options,
            waiters: vec![callback],
            timers: vec![production, timeout],
        });
    }

    fn on_attempt(&self, id: u64) {
        let (waiters, result) = {
            let mut inner = self.shared.inner.lock();
            let Some(options) = inner
                .acquisition
                .as_ref()
                .filter(|a| a.id == id)
                .map(|a| a.options.clone())
            else {
                return;
            };

            let result = match inner.source.sample(&options) {
                Ok(Some(raw)) => match raw.validate() {
                    Ok(fix) => {
                        inner.cache(&fix, self.shared.scheduler.now_ms());
                        Ok(fix)
                    }
                    Err(e) => Err(MapError::LocationFailed(e.to_string())),
                },
                Ok(None) => {
                    let retry = self.schedule(NO_FIX_RETRY_MS, move |p| p.on_attempt(id));
                    if let Some(acquisition) = inner.acquisition.as_mut() {
                        acquisition.timers.push(retry);
                    }
                    return;
                }
                Err(e) => {
                    log::warn!("location source failed: {e}");
                    Err(MapError::Internal(e.to_string()))
                }
            };

            let waiters = inner
                .take_acquisition(id)
                .map(|a| a.waiters)
                .unwrap_or_default();
            (waiters, result)
        };
        resolve_all(waiters, result);
    }

    fn on_timeout(&self, id: u64, timeout_ms: u64) {
        let waiters = {
            let mut inner = self.shared.inner.lock();
            inner.take_acquisition(id).map(|a| a.waiters)
        };
        if let Some(waiters) = waiters {
            log::warn!("single-shot location timed out after {timeout_ms} ms");
            resolve_all(waiters, Err(MapError::LocationTimeout(timeout_ms)));
        }
    }

    pub fn state(&self) -> PipelineState {
        let inner = self.shared.inner.lock();
        match inner.stream {
            Stream::Continuous => PipelineState::Running,
            Stream::OneOff => PipelineState::PendingSingleShot,
            Stream::Idle if inner.acquisition.is_some() => PipelineState::PendingSingleShot,
            Stream::Idle => PipelineState::Stopped,
        }
    }

    /// True while a stream started with `start` is active
    pub fn is_started(&self) -> bool {
        self.shared.inner.lock().stream != Stream::Idle
    }

    pub fn is_enabled(&self) -> bool {
        self.is_started()
    }

    pub fn last_known_location(&self) -> Option<LocationResult> {
        self.shared.inner.lock().last_known_location.clone()
    }

    pub fn last_location_time(&self) -> Option<u64> {
        self.shared.inner.lock().last_location_time
    }

    pub fn options(&self) -> LocationOptions {
        self.shared.inner.lock().options.clone()
    }

    /// Merges `patch` into the options used by the next `start`/acquisition
    pub fn set_options(&self, patch: &LocationOptionsPatch) {
        self.shared.inner.lock().options.apply_patch(patch);
    }

    /// Stops everything and fails any in-flight request; idempotent
    pub fn destroy(&self) {
        let waiters = {
            let mut inner = self.shared.inner.lock();
            inner.destroyed = true;
            inner.cancel_stream();
            inner.take_any_acquisition().map(|a| a.waiters)
        };
        if let Some(waiters) = waiters {
            resolve_all(
                waiters,
                Err(MapError::Internal("location service destroyed".into())),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        input::sink::ChannelEventSink,
        location::{result::RawLocation, source::ScriptedLocationSource},
        runtime::ManualScheduler,
        traits::StaticPermissions,
    };

    fn pipeline(
        source: &ScriptedLocationSource,
    ) -> (
        LocationPipeline,
        Arc<ManualScheduler>,
        crossbeam_channel::Receiver<MapEvent>,
    ) {
        let scheduler = ManualScheduler::shared(0);
        let (sink, rx) = ChannelEventSink::channel();
        let pipeline = LocationPipeline::new(
            Box::new(source.clone()),
            scheduler.clone(),
            Arc::new(sink),
            Arc::new(StaticPermissions::granted()),
        );
        (pipeline, scheduler, rx)
    }

    #[test]
    fn test_stop_is_idempotent() {
        let source = ScriptedLocationSource::new();
        let (pipeline, scheduler, _rx) = pipeline(&source);
        pipeline.stop();
        pipeline.start(None);
        assert_eq!(pipeline.state(), PipelineState::Running);
        pipeline.stop();
        pipeline.stop();
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_restart_replaces_the_cycle() {
        let source = ScriptedLocationSource::new();
        let (pipeline, scheduler, _rx) = pipeline(&source);
        pipeline.start(None);
        pipeline.start(None);
        assert_eq!(scheduler.pending(), 1);
        scheduler.advance(Duration::from_millis(1_000));
        assert_eq!(source.sample_count(), 1);
    }

    #[test]
    fn test_distance_filter_suppresses_small_moves() {
        let source = ScriptedLocationSource::new();
        source
            .push_fix(RawLocation::at(39.9, 116.4, 10.0, 1))
            .push_fix(RawLocation::at(39.90001, 116.4, 10.0, 2))
            .push_fix(RawLocation::at(39.91, 116.4, 10.0, 3));
        let (pipeline, scheduler, rx) = pipeline(&source);
        let patch = LocationOptionsPatch {
            distance_filter: Some(50.0),
            ..Default::default()
        };
        pipeline.start(Some(&patch));

        scheduler.advance(Duration::from_millis(2_000));
        assert_eq!(rx.try_iter().count(), 1);
        // suppressed, but still cached
        assert_eq!(pipeline.last_known_location().map(|f| f.timestamp), Some(2));

        scheduler.advance(Duration::from_millis(1_000));
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_restart_clears_distance_reference() {
        let source = ScriptedLocationSource::new();
        source
            .push_fix(RawLocation::at(39.9, 116.4, 10.0, 1))
            .push_fix(RawLocation::at(39.90001, 116.4, 10.0, 2));
        let (pipeline, scheduler, rx) = pipeline(&source);
        let patch = LocationOptionsPatch {
            distance_filter: Some(50.0),
            ..Default::default()
        };
        pipeline.start(Some(&patch));
        scheduler.advance(Duration::from_millis(1_000));
        pipeline.stop();
        assert_eq!(rx.try_iter().count(), 1);

        // First fix of a new session is emitted even if close to the last one
        pipeline.start(None);
        scheduler.advance(Duration::from_millis(1_000));
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_destroy_fails_waiters() {
        let source = ScriptedLocationSource::new();
        let (pipeline, scheduler, _rx) = pipeline(&source);
        let outcome = Arc::new(Mutex::new(None));
        let slot = outcome.clone();
        pipeline.get_current_location(None, Box::new(move |r| *slot.lock() = Some(r)));
        pipeline.destroy();
        pipeline.destroy();

        let result = outcome.lock().take().unwrap();
        assert_eq!(result.unwrap_err().code().as_str(), "UNKNOWN_ERROR");
        scheduler.advance(Duration::from_secs(60));
        assert_eq!(source.sample_count(), 0);
    }
}
