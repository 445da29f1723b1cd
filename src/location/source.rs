use std::collections::VecDeque;

use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    core::{config::{AccuracyPolicy, LocationOptions}, geo::LatLng},
    location::result::{LocationResult, RawLocation, LOC_TYPE_GPS},
    prelude::Arc,
    runtime::Scheduler,
    traits::LocationSource,
    MapError, Result,
};

/// Fixture position the simulated source jitters around
const SIMULATED_ORIGIN: (f64, f64) = (39.9042, 116.4074);
/// Maximum jitter in degrees, each way
const SIMULATED_JITTER_DEG: f64 = 0.005;
const SIMULATED_ALTITUDE_M: f64 = 50.0;

/// Produces plausible fixes around central Beijing.
///
/// Reported accuracy is drawn from the [`AccuracyPolicy`] band for the
/// requested mode.
pub struct SimulatedLocationSource {
    clock: Arc<dyn Scheduler>,
    policy: AccuracyPolicy,
    rng: StdRng,
}

impl SimulatedLocationSource {
    pub fn new(clock: Arc<dyn Scheduler>, policy: AccuracyPolicy) -> Self {
        Self {
            clock,
            policy,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic jitter for reproducible runs
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
}

impl LocationSource for SimulatedLocationSource {
    fn sample(&mut self, options: &LocationOptions) -> Result<Option<RawLocation>> {
        let band = self.policy.band(options.mode());
        if !band.is_valid() {
            return Err(MapError::InvalidParameter(format!(
                "accuracy band [{}, {}] for {} cannot be sampled",
                band.min_m,
                band.max_m,
                options.mode()
            )));
        }
        let lat = SIMULATED_ORIGIN.0 + self.rng.random_range(-SIMULATED_JITTER_DEG..SIMULATED_JITTER_DEG);
        let lng = SIMULATED_ORIGIN.1 + self.rng.random_range(-SIMULATED_JITTER_DEG..SIMULATED_JITTER_DEG);
        let accuracy = self.rng.random_range(band.min_m..=band.max_m);

        let mut fix = LocationResult::new(LatLng::new(lat, lng), accuracy, self.clock.now_ms());
        fix.coordinate_system = options.coordinate_system();
        fix.loc_type = LOC_TYPE_GPS;
        fix.speed = Some(0.0);
        fix.heading = Some(0.0);
        if options.need_altitude() {
            fix.altitude = Some(SIMULATED_ALTITUDE_M);
        }
        if options.need_address() {
            fix.address = Some("1 East Chang'an Avenue, Dongcheng District, Beijing".into());
            fix.province = Some("Beijing".into());
            fix.city = Some("Beijing".into());
            fix.district = Some("Dongcheng District".into());
            fix.street = Some("East Chang'an Avenue".into());
            fix.street_number = Some("1".into());
        }
        if options.need_location_describe() {
            fix.location_describe = Some("near Tiananmen".into());
        }
        Ok(Some(RawLocation::new(fix)))
    }
}

/// Replays queued samples in order, then reports "no fix"
#[derive(Clone, Default)]
pub struct ScriptedLocationSource {
    queue: Arc<Mutex<VecDeque<Result<Option<RawLocation>>>>>,
    sampled: Arc<Mutex<usize>>,
}

impl ScriptedLocationSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, sample: Result<Option<RawLocation>>) -> &Self {
        self.queue.lock().push_back(sample);
        self
    }

    pub fn push_fix(&self, raw: RawLocation) -> &Self {
        self.push(Ok(Some(raw)))
    }

    /// How many times the source was asked for a sample
    pub fn sample_count(&self) -> usize {
        *self.sampled.lock()
    }
}

impl LocationSource for ScriptedLocationSource {
    fn sample(&mut self, _options: &LocationOptions) -> Result<Option<RawLocation>> {
        *self.sampled.lock() += 1;
        self.queue.lock().pop_front().unwrap_or(Ok(None))
    }
}

/// Serves the latest fix pushed by a host, once
#[derive(Clone, Default)]
pub struct FeedLocationSource {
    latest: Arc<Mutex<Option<RawLocation>>>,
}

impl FeedLocationSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any fix not yet consumed
    pub fn push(&self, raw: RawLocation) {
        *self.latest.lock() = Some(raw);
    }
}

impl LocationSource for FeedLocationSource {
    fn sample(&mut self, _options: &LocationOptions) -> Result<Option<RawLocation>> {
        Ok(self.latest.lock().take())
    }
}
