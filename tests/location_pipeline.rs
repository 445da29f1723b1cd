use mapbridge::prelude::*;

/// Location stream, single-shot acquisition and caching on a virtual clock
mod location_pipeline {
    use super::*;
    use crossbeam_channel::Receiver;
    use parking_lot::Mutex;

    type Outcomes = Arc<Mutex<Vec<Result<LocationResult>>>>;

    struct Harness {
        pipeline: LocationPipeline,
        source: ScriptedLocationSource,
        scheduler: Arc<ManualScheduler>,
        permissions: Arc<StaticPermissions>,
        events: Receiver<MapEvent>,
    }

    fn harness() -> Harness {
        let source = ScriptedLocationSource::new();
        let scheduler = ManualScheduler::shared(0);
        let permissions = Arc::new(StaticPermissions::granted());
        let (sink, events) = ChannelEventSink::channel();
        let pipeline = LocationPipeline::new(
            Box::new(source.clone()),
            scheduler.clone(),
            Arc::new(sink),
            permissions.clone(),
        );
        Harness {
            pipeline,
            source,
            scheduler,
            permissions,
            events,
        }
    }

    fn capture(outcomes: &Outcomes) -> LocationCallback {
        let outcomes = outcomes.clone();
        Box::new(move |result| outcomes.lock().push(result))
    }

    fn patch(json: serde_json::Value) -> LocationOptionsPatch {
        LocationOptionsPatch::from_json(json).unwrap()
    }

    fn advance_ms(scheduler: &ManualScheduler, ms: u64) {
        scheduler.advance(Duration::from_millis(ms));
    }

    /// An out-of-range fix is dropped silently in every mode
    #[test]
    fn test_out_of_range_latitude_is_never_emitted() {
        for mode in ["high_accuracy", "battery_saving", "device_sensors"] {
            let h = harness();
            h.source
                .push_fix(RawLocation::at(100.0, 116.4, 10.0, 1))
                .push_fix(RawLocation::at(39.9, 116.4, 10.0, 2))
                .push_fix(RawLocation::at(100.0, 116.4, 10.0, 3));
            h.pipeline.start(Some(&patch(serde_json::json!({ "locationMode": mode }))));
            advance_ms(&h.scheduler, 5_000);

            let events: Vec<_> = h.events.try_iter().collect();
            assert_eq!(events.len(), 1, "mode {mode}");
            match &events[0] {
                MapEvent::LocationUpdate { latitude, .. } => assert_eq!(*latitude, 39.9),
                other => panic!("unexpected event {other:?}"),
            }
            assert!(h.pipeline.is_started());
        }
    }

    #[test]
    fn test_inaccurate_fix_is_dropped() {
        let h = harness();
        h.source
            .push_fix(RawLocation::at(39.9, 116.4, 10_001.0, 1))
            .push(Err(MapError::Internal("sensor fault".into())))
            .push_fix(RawLocation::at(39.9, 116.4, 9_999.0, 3));
        h.pipeline.start(None);
        advance_ms(&h.scheduler, 3_000);

        assert_eq!(h.events.try_iter().count(), 1);
        assert_eq!(h.pipeline.last_known_location().map(|f| f.accuracy), Some(9_999.0));
    }

    #[test]
    fn test_stream_period_has_a_floor() {
        let h = harness();
        h.pipeline.start(Some(&patch(serde_json::json!({ "scanSpan": 200 }))));
        advance_ms(&h.scheduler, 999);
        assert_eq!(h.source.sample_count(), 0);
        advance_ms(&h.scheduler, 1);
        assert_eq!(h.source.sample_count(), 1);
        assert_eq!(h.pipeline.options().scan_interval_ms(), 200);
    }

    #[test]
    fn test_stop_cancels_the_stream() {
        let h = harness();
        h.pipeline.start(None);
        advance_ms(&h.scheduler, 2_000);
        h.pipeline.stop();
        advance_ms(&h.scheduler, 10_000);
        assert_eq!(h.source.sample_count(), 2);
        assert_eq!(h.pipeline.state(), PipelineState::Stopped);
    }

    #[test]
    fn test_zero_scan_interval_samples_once() {
        let h = harness();
        h.source.push_fix(RawLocation::at(39.9, 116.4, 10.0, 1));
        h.pipeline.start(Some(&patch(serde_json::json!({ "scanSpan": 0 }))));
        assert_eq!(h.pipeline.state(), PipelineState::PendingSingleShot);

        advance_ms(&h.scheduler, 1_000);
        assert_eq!(h.pipeline.state(), PipelineState::Stopped);
        advance_ms(&h.scheduler, 10_000);
        assert_eq!(h.source.sample_count(), 1);
        assert_eq!(h.events.try_iter().count(), 1);
        assert_eq!(h.scheduler.pending(), 0);
    }

    #[test]
    fn test_permission_denied() {
        let h = harness();
        h.permissions.set_location(false);
        h.pipeline.start(None);
        assert_eq!(h.pipeline.state(), PipelineState::Stopped);
        match h.events.try_recv().unwrap() {
            MapEvent::LocationError(payload) => {
                assert_eq!(payload.code, "LOCATION_PERMISSION_DENIED")
            }
            other => panic!("unexpected event {other:?}"),
        }

        let outcomes = Outcomes::default();
        h.pipeline.get_current_location(None, capture(&outcomes));
        assert_eq!(outcomes.lock().as_slice(), &[Err(MapError::PermissionDenied)]);
        assert_eq!(h.scheduler.pending(), 0);
    }

    /// Two calls inside the freshness window see the same payload
    #[test]
    fn test_fresh_cache_is_served_without_acquisition() {
        let h = harness();
        h.source.push_fix(RawLocation::at(39.9, 116.4, 12.0, 7));
        let outcomes = Outcomes::default();

        h.pipeline.get_current_location(None, capture(&outcomes));
        assert!(outcomes.lock().is_empty());
        // Production is scheduled at half the 30s timeout
        advance_ms(&h.scheduler, 15_000);
        assert_eq!(outcomes.lock().len(), 1);

        advance_ms(&h.scheduler, 29_999);
        h.pipeline.get_current_location(None, capture(&outcomes));

        let outcomes = outcomes.lock();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0], outcomes[1]);
        assert!(outcomes[0].is_ok());
        assert_eq!(h.source.sample_count(), 1);
        assert_eq!(h.pipeline.last_location_time(), Some(15_000));
    }

    #[test]
    fn test_stale_cache_triggers_new_acquisition() {
        let h = harness();
        h.source
            .push_fix(RawLocation::at(39.9, 116.4, 12.0, 1))
            .push_fix(RawLocation::at(39.95, 116.45, 12.0, 2));
        let outcomes = Outcomes::default();
        let fast = patch(serde_json::json!({ "timeout": 2_000 }));

        h.pipeline.get_current_location(Some(&fast), capture(&outcomes));
        advance_ms(&h.scheduler, 1_000);
        advance_ms(&h.scheduler, 30_000);
        h.pipeline.get_current_location(Some(&fast), capture(&outcomes));
        advance_ms(&h.scheduler, 1_000);

        let outcomes = outcomes.lock();
        assert_eq!(outcomes.len(), 2);
        assert_ne!(outcomes[0], outcomes[1]);
        assert_eq!(h.source.sample_count(), 2);
    }

    #[test]
    fn test_concurrent_requests_join_one_acquisition() {
        let h = harness();
        h.source.push_fix(RawLocation::at(39.9, 116.4, 12.0, 1));
        let outcomes = Outcomes::default();

        h.pipeline.get_current_location(None, capture(&outcomes));
        h.pipeline.get_current_location(None, capture(&outcomes));
        assert_eq!(h.pipeline.state(), PipelineState::PendingSingleShot);
        advance_ms(&h.scheduler, 15_000);

        let outcomes = outcomes.lock();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0], outcomes[1]);
        assert_eq!(h.source.sample_count(), 1);
        assert_eq!(h.pipeline.state(), PipelineState::Stopped);
    }

    /// The timeout wins and the late production attempt is a no-op
    #[test]
    fn test_timeout_resolves_exactly_once() {
        let h = harness();
        let outcomes = Outcomes::default();
        let quick = patch(serde_json::json!({ "timeout": 1_000 }));

        h.pipeline.get_current_location(Some(&quick), capture(&outcomes));
        // 500 ms: no fix yet, a retry is queued for 1500 ms
        advance_ms(&h.scheduler, 500);
        h.source.push_fix(RawLocation::at(39.9, 116.4, 12.0, 1));
        advance_ms(&h.scheduler, 500);
        advance_ms(&h.scheduler, 60_000);

        let outcomes = outcomes.lock();
        assert_eq!(outcomes.len(), 1);
        let err = outcomes[0].clone().unwrap_err();
        assert_eq!(err.code().as_str(), "LOCATION_TIMEOUT");
        assert_eq!(h.source.sample_count(), 1);
        assert!(h.pipeline.last_known_location().is_none());
    }

    #[test]
    fn test_no_fix_is_retried_until_one_arrives() {
        let h = harness();
        let outcomes = Outcomes::default();
        h.pipeline.get_current_location(None, capture(&outcomes));

        advance_ms(&h.scheduler, 15_000);
        advance_ms(&h.scheduler, 1_000);
        h.source.push_fix(RawLocation::at(39.9, 116.4, 12.0, 1));
        advance_ms(&h.scheduler, 1_000);

        assert_eq!(h.source.sample_count(), 3);
        assert!(outcomes.lock()[0].is_ok());
        advance_ms(&h.scheduler, 60_000);
        assert_eq!(outcomes.lock().len(), 1);
    }

    #[test]
    fn test_invalid_single_shot_sample_fails() {
        let h = harness();
        h.source.push_fix(RawLocation::at(100.0, 116.4, 12.0, 1));
        let outcomes = Outcomes::default();
        h.pipeline.get_current_location(None, capture(&outcomes));
        advance_ms(&h.scheduler, 15_000);

        let err = outcomes.lock()[0].clone().unwrap_err();
        assert_eq!(err.code().as_str(), "LOCATION_FAILED");
        assert!(h.pipeline.last_known_location().is_none());
    }

    #[test]
    fn test_source_error_is_unknown() {
        for failure in [
            MapError::Internal("driver crashed".into()),
            MapError::Network("socket reset".into()),
            MapError::PermissionDenied,
        ] {
            let h = harness();
            h.source.push(Err(failure));
            let outcomes = Outcomes::default();
            h.pipeline.get_current_location(None, capture(&outcomes));
            advance_ms(&h.scheduler, 20_000);

            let outcomes = outcomes.lock();
            assert_eq!(outcomes.len(), 1);
            let err = outcomes[0].clone().unwrap_err();
            assert_eq!(err.code().as_str(), "UNKNOWN_ERROR");
        }
    }

    /// Stopping abandons the single-shot request and resolves it once
    #[test]
    fn test_stop_cancels_single_shot() {
        let h = harness();
        h.source.push_fix(RawLocation::at(39.9, 116.4, 12.0, 1));
        let outcomes = Outcomes::default();
        h.pipeline.get_current_location(None, capture(&outcomes));
        h.pipeline.get_current_location(None, capture(&outcomes));
        h.pipeline.start(None);
        assert_eq!(h.scheduler.pending(), 3);

        h.pipeline.stop();
        assert_eq!(h.pipeline.state(), PipelineState::Stopped);
        assert_eq!(h.scheduler.pending(), 0);
        assert_eq!(outcomes.lock().len(), 2);

        advance_ms(&h.scheduler, 60_000);
        h.pipeline.stop();
        let outcomes = outcomes.lock();
        assert_eq!(outcomes.len(), 2);
        for outcome in outcomes.iter() {
            assert_eq!(outcome.clone().unwrap_err().code().as_str(), "LOCATION_FAILED");
        }
        assert_eq!(h.source.sample_count(), 0);
    }

    #[test]
    fn test_simulated_source_follows_accuracy_policy() {
        let scheduler = ManualScheduler::shared(0);
        let policy = AccuracyPolicy::default();
        let (sink, events) = ChannelEventSink::channel();
        let source = SimulatedLocationSource::new(scheduler.clone(), policy.clone()).with_seed(42);
        let pipeline = LocationPipeline::new(
            Box::new(source),
            scheduler.clone(),
            Arc::new(sink),
            Arc::new(StaticPermissions::granted()),
        );

        pipeline.start(Some(&patch(serde_json::json!({ "locationMode": "battery_saving" }))));
        advance_ms(&scheduler, 10_000);
        pipeline.stop();

        let band = policy.band(LocationMode::BatterySaving);
        let accuracies: Vec<f64> = events
            .try_iter()
            .filter_map(|e| match e {
                MapEvent::LocationUpdate { accuracy, .. } => Some(accuracy),
                _ => None,
            })
            .collect();
        assert_eq!(accuracies.len(), 10);
        assert!(accuracies.iter().all(|a| band.contains(*a)));
    }

    #[test]
    fn test_feed_source_serves_pushed_fix() {
        let scheduler = ManualScheduler::shared(0);
        let feed = FeedLocationSource::new();
        let (sink, events) = ChannelEventSink::channel();
        let pipeline = LocationPipeline::new(
            Box::new(feed.clone()),
            scheduler.clone(),
            Arc::new(sink),
            Arc::new(StaticPermissions::granted()),
        );

        pipeline.start(None);
        advance_ms(&scheduler, 1_000);
        feed.push(RawLocation::at(22.54, 114.06, 15.0, 1_500));
        advance_ms(&scheduler, 1_000);
        advance_ms(&scheduler, 1_000);

        let events: Vec<_> = events.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].to_json()["name"], "BaiduMap_LocationUpdate");
        assert_eq!(events[0].to_json()["payload"]["latitude"], 22.54);
    }
}
