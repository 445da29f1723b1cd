use std::time::Duration;

use anyhow::Context;
use mapbridge::prelude::*;

/// Headless walkthrough: SDK init, a deferred view, annotations and the
/// location stream, with every outbound event printed as bridge JSON
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler::current());
    let (sink, events) = ChannelEventSink::channel();
    let module = MapModule::simulated(
        SdkConfig::default(),
        scheduler,
        Arc::new(sink),
        Arc::new(StaticPermissions::granted()),
    );

    let init = module.init_sdk(Some("demo-key-0000-1111"))?;
    log::info!("init_sdk: {}", serde_json::to_string(&init)?);

    let engine = SimulatedMapEngine::new();
    let view = module
        .map_view_builder(engine.clone(), None)
        .with_center_and_zoom(LatLng::new(39.915, 116.404), 12.0)
        .build()
        .context("creating map view")?;

    // Written before the view is ready; replayed on readiness
    view.set_zoom(14.0);
    view.set_map_type("satellite");
    view.set_traffic_enabled(true);
    view.set_compass_enabled(true);

    tokio::time::sleep(Duration::from_millis(200)).await;
    drain(&events);
    anyhow::ensure!(view.is_ready(), "view did not become ready");

    let gate = view.add_marker(MarkerSpec {
        title: Some("Tiananmen".into()),
        ..MarkerSpec::at(LatLng::new(39.9087, 116.3975))
    })?;
    let palace = view.add_marker(MarkerSpec {
        title: Some("Forbidden City".into()),
        description: Some("Palace Museum".into()),
        ..MarkerSpec::at(LatLng::new(39.9163, 116.3972))
    })?;
    view.show_info_window(&palace, &InfoWindowOptions::default());

    let route = view.add_polyline(OverlayAttributes {
        coordinates: Some(vec![LatLng::new(39.9087, 116.3975), LatLng::new(39.9163, 116.3972)]),
        stroke_color: Some("#3366FF".into()),
        ..Default::default()
    })?;
    let area = view.add_circle(OverlayAttributes {
        center: Some(LatLng::new(39.9163, 116.3972)),
        radius: Some(500.0),
        fill_color: Some("rgba(51,102,255,0.2)".into()),
        ..Default::default()
    })?;
    log::info!("added {gate}, {palace}, {route}, {area}");

    // Simulate taps arriving from the engine
    view.dispatch(EngineEvent::Click {
        coordinate: LatLng::new(39.91, 116.40),
    });
    view.remove_marker(&gate);
    drain(&events);

    let quick = LocationOptionsPatch {
        timeout: Some(2_000),
        ..Default::default()
    };
    let fix = module.current_location(Some(&quick)).await?;
    log::info!(
        "current location {:.5},{:.5} (±{:.0} m)",
        fix.coordinate.lat,
        fix.coordinate.lng,
        fix.accuracy
    );

    let options = LocationOptionsPatch {
        location_mode: Some("battery_saving".into()),
        scan_span: Some(1_000),
        ..Default::default()
    };
    module.start_location_service(Some(&options));
    tokio::time::sleep(Duration::from_millis(3_500)).await;
    module.stop_location_service();
    drain(&events);

    log::info!("engine state: {} overlays drawn", engine.snapshot().overlays.len());
    log::info!("sdk info: {}", serde_json::to_string(&module.sdk_info())?);

    view.destroy();
    module.destroy();
    Ok(())
}

fn drain(events: &crossbeam_channel::Receiver<MapEvent>) {
    for event in events.try_iter() {
        println!("{}", event.to_json());
    }
}
