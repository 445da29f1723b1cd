//! Configuration for location acquisition and SDK start-up.
//!
//! Options follow a preset-or-custom pattern: [`LocationProfile`] resolves
//! to a complete [`LocationOptions`], and bridge payloads are merged in as a
//! [`LocationOptionsPatch`] where only the keys present are touched.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        DEFAULT_LOCATION_TIMEOUT_MS, DEFAULT_READY_DELAY_MS, DEFAULT_SCAN_INTERVAL_MS,
        DEFAULT_WIFI_CACHE_TIMEOUT_MS, LOCATION_FRESHNESS_WINDOW_MS, MIN_LOCATION_TIMEOUT_MS,
        SDK_VERSION,
    },
    MapError, Result,
};

/// How the location engine trades accuracy for power
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationMode {
    #[default]
    HighAccuracy,
    BatterySaving,
    DeviceSensors,
}

impl LocationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationMode::HighAccuracy => "high_accuracy",
            LocationMode::BatterySaving => "battery_saving",
            LocationMode::DeviceSensors => "device_sensors",
        }
    }
}

impl FromStr for LocationMode {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high_accuracy" => Ok(LocationMode::HighAccuracy),
            "battery_saving" => Ok(LocationMode::BatterySaving),
            "device_sensors" => Ok(LocationMode::DeviceSensors),
            other => Err(MapError::InvalidParameter(format!(
                "unknown location mode '{other}'"
            ))),
        }
    }
}

impl fmt::Display for LocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coordinate reference systems the engine can report in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateSystem {
    #[default]
    Bd09ll,
    Bd09mc,
    Gcj02,
    Wgs84,
}

impl CoordinateSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinateSystem::Bd09ll => "bd09ll",
            CoordinateSystem::Bd09mc => "bd09mc",
            CoordinateSystem::Gcj02 => "gcj02",
            CoordinateSystem::Wgs84 => "wgs84",
        }
    }
}

impl FromStr for CoordinateSystem {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bd09ll" => Ok(CoordinateSystem::Bd09ll),
            "bd09mc" => Ok(CoordinateSystem::Bd09mc),
            "gcj02" => Ok(CoordinateSystem::Gcj02),
            "wgs84" => Ok(CoordinateSystem::Wgs84),
            other => Err(MapError::InvalidParameter(format!(
                "unknown coordinate system '{other}'"
            ))),
        }
    }
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location acquisition options.
///
/// Fields are private so every write goes through a clamping setter; a value
/// that cannot be stored is replaced with the documented default.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationOptions {
    #[serde(rename = "locationMode")]
    mode: LocationMode,
    #[serde(rename = "coordinateType")]
    coordinate_system: CoordinateSystem,
    #[serde(rename = "scanSpan")]
    scan_interval_ms: u64,
    #[serde(rename = "timeout")]
    timeout_ms: u64,
    #[serde(rename = "distanceFilter")]
    distance_filter_m: f64,
    need_address: bool,
    need_location_describe: bool,
    need_poi_list: bool,
    need_altitude: bool,
    open_gps: bool,
    enable_simulate_gps: bool,
    ignore_cache_exception: bool,
    ignore_kill_process: bool,
    wifi_cache_timeout_ms: u64,
    need_device_direct: bool,
    location_notify: bool,
}

impl Default for LocationOptions {
    fn default() -> Self {
        Self {
            mode: LocationMode::HighAccuracy,
            coordinate_system: CoordinateSystem::Bd09ll,
            scan_interval_ms: DEFAULT_SCAN_INTERVAL_MS,
            timeout_ms: DEFAULT_LOCATION_TIMEOUT_MS,
            distance_filter_m: 0.0,
            need_address: true,
            need_location_describe: true,
            need_poi_list: false,
            need_altitude: false,
            open_gps: true,
            enable_simulate_gps: false,
            ignore_cache_exception: false,
            ignore_kill_process: true,
            wifi_cache_timeout_ms: DEFAULT_WIFI_CACHE_TIMEOUT_MS,
            need_device_direct: false,
            location_notify: true,
        }
    }
}

impl LocationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> LocationMode {
        self.mode
    }

    pub fn coordinate_system(&self) -> CoordinateSystem {
        self.coordinate_system
    }

    pub fn scan_interval_ms(&self) -> u64 {
        self.scan_interval_ms
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    pub fn distance_filter_m(&self) -> f64 {
        self.distance_filter_m
    }

    pub fn need_address(&self) -> bool {
        self.need_address
    }

    pub fn need_location_describe(&self) -> bool {
        self.need_location_describe
    }

    pub fn need_poi_list(&self) -> bool {
        self.need_poi_list
    }

    pub fn need_altitude(&self) -> bool {
        self.need_altitude
    }

    pub fn open_gps(&self) -> bool {
        self.open_gps
    }

    pub fn enable_simulate_gps(&self) -> bool {
        self.enable_simulate_gps
    }

    pub fn ignore_cache_exception(&self) -> bool {
        self.ignore_cache_exception
    }

    pub fn ignore_kill_process(&self) -> bool {
        self.ignore_kill_process
    }

    pub fn wifi_cache_timeout_ms(&self) -> u64 {
        self.wifi_cache_timeout_ms
    }

    pub fn need_device_direct(&self) -> bool {
        self.need_device_direct
    }

    pub fn location_notify(&self) -> bool {
        self.location_notify
    }

    /// A zero scan interval means "one fix, then stop"
    pub fn is_single_shot(&self) -> bool {
        self.scan_interval_ms == 0
    }

    pub fn set_mode(&mut self, mode: LocationMode) {
        self.mode = mode;
    }

    /// Parses a mode name; unknown names leave the current mode untouched.
    pub fn set_mode_name(&mut self, name: &str) -> bool {
        match name.parse() {
            Ok(mode) => {
                self.mode = mode;
                true
            }
            Err(e) => {
                log::warn!("{e}; keeping {}", self.mode);
                false
            }
        }
    }

    pub fn set_coordinate_system(&mut self, system: CoordinateSystem) {
        self.coordinate_system = system;
    }

    /// Parses a coordinate system name; unknown names leave the current value untouched.
    pub fn set_coordinate_system_name(&mut self, name: &str) -> bool {
        match name.parse() {
            Ok(system) => {
                self.coordinate_system = system;
                true
            }
            Err(e) => {
                log::warn!("{e}; keeping {}", self.coordinate_system);
                false
            }
        }
    }

    pub fn set_scan_interval_ms(&mut self, interval: i64) {
        self.scan_interval_ms = interval.max(0) as u64;
    }

    pub fn set_timeout_ms(&mut self, timeout: i64) {
        self.timeout_ms = timeout.max(MIN_LOCATION_TIMEOUT_MS as i64) as u64;
    }

    pub fn set_distance_filter_m(&mut self, meters: f64) {
        self.distance_filter_m = if meters.is_finite() { meters.max(0.0) } else { 0.0 };
    }

    pub fn set_need_address(&mut self, need: bool) {
        self.need_address = need;
    }

    pub fn set_need_location_describe(&mut self, need: bool) {
        self.need_location_describe = need;
    }

    pub fn set_need_poi_list(&mut self, need: bool) {
        self.need_poi_list = need;
    }

    pub fn set_need_altitude(&mut self, need: bool) {
        self.need_altitude = need;
    }

    pub fn set_open_gps(&mut self, open: bool) {
        self.open_gps = open;
    }

    pub fn set_enable_simulate_gps(&mut self, enable: bool) {
        self.enable_simulate_gps = enable;
    }

    pub fn set_ignore_cache_exception(&mut self, ignore: bool) {
        self.ignore_cache_exception = ignore;
    }

    pub fn set_ignore_kill_process(&mut self, ignore: bool) {
        self.ignore_kill_process = ignore;
    }

    pub fn set_wifi_cache_timeout_ms(&mut self, timeout: i64) {
        self.wifi_cache_timeout_ms = timeout.max(0) as u64;
    }

    pub fn set_need_device_direct(&mut self, need: bool) {
        self.need_device_direct = need;
    }

    pub fn set_location_notify(&mut self, notify: bool) {
        self.location_notify = notify;
    }

    /// High accuracy turns the GPS on; anything else falls back to battery saving.
    pub fn set_enable_high_accuracy(&mut self, enable: bool) {
        if enable {
            self.mode = LocationMode::HighAccuracy;
            self.open_gps = true;
        } else {
            self.mode = LocationMode::BatterySaving;
            self.open_gps = false;
        }
    }

    /// Merges a bridge payload into these options
    pub fn apply_patch(&mut self, patch: &LocationOptionsPatch) {
        if let Some(enable) = patch.enable_high_accuracy {
            self.set_enable_high_accuracy(enable);
        }
        if let Some(max_age) = patch.maximum_age {
            self.set_wifi_cache_timeout_ms(max_age);
        }
        if let Some(mode) = &patch.location_mode {
            self.set_mode_name(mode);
        }
        if let Some(system) = &patch.coordinate_type {
            self.set_coordinate_system_name(system);
        }
        if let Some(scan) = patch.scan_span {
            self.set_scan_interval_ms(scan);
        }
        if let Some(timeout) = patch.timeout {
            self.set_timeout_ms(timeout);
        }
        if let Some(filter) = patch.distance_filter {
            self.set_distance_filter_m(filter);
        }
        if let Some(v) = patch.need_address {
            self.need_address = v;
        }
        if let Some(v) = patch.need_location_describe {
            self.need_location_describe = v;
        }
        if let Some(v) = patch.need_location_poi_list {
            self.need_poi_list = v;
        }
        if let Some(v) = patch.need_altitude {
            self.need_altitude = v;
        }
        if let Some(v) = patch.open_gps {
            self.open_gps = v;
        }
        if let Some(v) = patch.enable_simulate_gps {
            self.enable_simulate_gps = v;
        }
        if let Some(v) = patch.ignore_cache_exception {
            self.ignore_cache_exception = v;
        }
        if let Some(v) = patch.ignore_kill_process {
            self.ignore_kill_process = v;
        }
        if let Some(v) = patch.wifi_cache_time_out {
            self.set_wifi_cache_timeout_ms(v);
        }
        if let Some(v) = patch.need_device_direct {
            self.need_device_direct = v;
        }
        if let Some(v) = patch.location_notify {
            self.location_notify = v;
        }
    }

    /// Returns a copy with `patch` applied
    pub fn patched(&self, patch: Option<&LocationOptionsPatch>) -> Self {
        let mut options = self.clone();
        if let Some(patch) = patch {
            options.apply_patch(patch);
        }
        options
    }
}

/// Partial location options as sent by the UI bridge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationOptionsPatch {
    #[serde(alias = "mode")]
    pub location_mode: Option<String>,
    #[serde(alias = "coordType")]
    pub coordinate_type: Option<String>,
    #[serde(alias = "scanInterval")]
    pub scan_span: Option<i64>,
    pub timeout: Option<i64>,
    pub distance_filter: Option<f64>,
    pub need_address: Option<bool>,
    pub need_location_describe: Option<bool>,
    pub need_location_poi_list: Option<bool>,
    pub need_altitude: Option<bool>,
    pub open_gps: Option<bool>,
    pub enable_simulate_gps: Option<bool>,
    pub ignore_cache_exception: Option<bool>,
    pub ignore_kill_process: Option<bool>,
    pub wifi_cache_time_out: Option<i64>,
    pub need_device_direct: Option<bool>,
    pub location_notify: Option<bool>,
    pub enable_high_accuracy: Option<bool>,
    pub maximum_age: Option<i64>,
}

impl LocationOptionsPatch {
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Preset option bundles
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LocationProfile {
    #[default]
    HighAccuracy,
    BatterySaving,
    SingleShot,
    Custom(LocationOptions),
}

impl LocationProfile {
    pub fn resolve(&self) -> LocationOptions {
        match self {
            Self::HighAccuracy => {
                let mut options = LocationOptions::default();
                options.set_mode(LocationMode::HighAccuracy);
                options.set_scan_interval_ms(1_000);
                options.set_open_gps(true);
                options
            }
            Self::BatterySaving => {
                let mut options = LocationOptions::default();
                options.set_mode(LocationMode::BatterySaving);
                options.set_scan_interval_ms(5_000);
                options.set_open_gps(false);
                options.set_need_address(false);
                options
            }
            Self::SingleShot => {
                let mut options = LocationOptions::default();
                options.set_scan_interval_ms(0);
                options
            }
            Self::Custom(options) => options.clone(),
        }
    }
}

/// Reported accuracy range in meters.
///
/// Deserialized bands go through [`AccuracyBand::new_checked`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAccuracyBand")]
pub struct AccuracyBand {
    pub min_m: f64,
    pub max_m: f64,
}

#[derive(Deserialize)]
struct RawAccuracyBand {
    min_m: f64,
    max_m: f64,
}

impl TryFrom<RawAccuracyBand> for AccuracyBand {
    type Error = MapError;

    fn try_from(raw: RawAccuracyBand) -> Result<Self> {
        Self::new_checked(raw.min_m, raw.max_m)
    }
}

impl AccuracyBand {
    pub const fn new(min_m: f64, max_m: f64) -> Self {
        Self { min_m, max_m }
    }

    /// Rejects non-finite or negative bounds and swaps an inverted pair
    pub fn new_checked(min_m: f64, max_m: f64) -> Result<Self> {
        if !min_m.is_finite() || !max_m.is_finite() || min_m < 0.0 || max_m < 0.0 {
            return Err(MapError::InvalidParameter(format!(
                "accuracy band [{min_m}, {max_m}] must be finite and non-negative"
            )));
        }
        if min_m > max_m {
            log::warn!("accuracy band [{min_m}, {max_m}] is inverted; swapping bounds");
            return Ok(Self::new(max_m, min_m));
        }
        Ok(Self::new(min_m, max_m))
    }

    /// True if the band can be sampled from
    pub fn is_valid(&self) -> bool {
        self.min_m.is_finite() && self.max_m.is_finite() && 0.0 <= self.min_m && self.min_m <= self.max_m
    }

    pub fn contains(&self, accuracy: f64) -> bool {
        accuracy >= self.min_m && accuracy <= self.max_m
    }
}

/// Accuracy-by-mode table used by simulated sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyPolicy {
    pub high_accuracy: AccuracyBand,
    pub battery_saving: AccuracyBand,
    pub device_sensors: AccuracyBand,
    /// Band for mode names that do not parse
    pub fallback: AccuracyBand,
}

impl Default for AccuracyPolicy {
    fn default() -> Self {
        let medium = AccuracyBand::new(20.0, 60.0);
        Self {
            high_accuracy: AccuracyBand::new(5.0, 20.0),
            battery_saving: AccuracyBand::new(100.0, 300.0),
            device_sensors: medium,
            fallback: medium,
        }
    }
}

impl AccuracyPolicy {
    pub fn band(&self, mode: LocationMode) -> AccuracyBand {
        match mode {
            LocationMode::HighAccuracy => self.high_accuracy,
            LocationMode::BatterySaving => self.battery_saving,
            LocationMode::DeviceSensors => self.device_sensors,
        }
    }

    pub fn band_for_name(&self, mode: &str) -> AccuracyBand {
        mode.parse()
            .map(|mode| self.band(mode))
            .unwrap_or(self.fallback)
    }
}

/// SDK start-up configuration, loadable from JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    /// Key used when `init_sdk` is called without one
    pub api_key: Option<String>,
    pub version: String,
    pub platform: String,
    /// Delay before a view built with default readiness flips to ready
    pub ready_delay_ms: u64,
    pub freshness_window_ms: u64,
    pub accuracy: AccuracyPolicy,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            version: SDK_VERSION.to_string(),
            platform: "rust".to_string(),
            ready_delay_ms: DEFAULT_READY_DELAY_MS,
            freshness_window_ms: LOCATION_FRESHNESS_WINDOW_MS,
            accuracy: AccuracyPolicy::default(),
        }
    }
}

impl SdkConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}
