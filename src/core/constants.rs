//! Engine-wide magic numbers kept in a single place.

/// Lowest zoom level any view may be clamped to.
pub const GLOBAL_MIN_ZOOM: f64 = 3.0;

/// Highest zoom level any view may be clamped to.
pub const GLOBAL_MAX_ZOOM: f64 = 21.0;

/// Zoom level a freshly constructed view starts at.
pub const DEFAULT_ZOOM: f64 = 12.0;

/// Default view center (latitude, longitude).
pub const DEFAULT_CENTER: (f64, f64) = (39.915, 116.404);

/// Artificial delay standing in for asynchronous engine start-up.
pub const DEFAULT_READY_DELAY_MS: u64 = 100;

/// Location fixes reporting an accuracy above this are discarded.
pub const MAX_ACCEPTED_ACCURACY_M: f64 = 10_000.0;

/// A cached fix younger than this is served without a new acquisition.
pub const LOCATION_FRESHNESS_WINDOW_MS: u64 = 30_000;

/// Continuous sampling never runs faster than this.
pub const MIN_SCAN_INTERVAL_MS: u64 = 1_000;

/// Default continuous sampling period.
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 1_000;

/// Single-shot timeout floor and default.
pub const MIN_LOCATION_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_LOCATION_TIMEOUT_MS: u64 = 30_000;

/// Re-poll period while a single-shot acquisition has no fix yet.
pub const NO_FIX_RETRY_MS: u64 = 1_000;

/// Default wifi cache lifetime.
pub const DEFAULT_WIFI_CACHE_TIMEOUT_MS: u64 = 300_000;

/// Info windows sit this many pixels above their marker by default.
pub const DEFAULT_INFO_WINDOW_Y_OFFSET: i32 = -47;

/// Circle radius used when a spec omits one.
pub const DEFAULT_CIRCLE_RADIUS_M: f64 = 100.0;

/// Stroke width used when a spec omits one.
pub const DEFAULT_STROKE_WIDTH: u32 = 5;

/// Reported SDK version.
pub const SDK_VERSION: &str = "7.6.5";

/// Location stream event names.
pub const LOCATION_UPDATE_EVENT: &str = "BaiduMap_LocationUpdate";
pub const LOCATION_ERROR_EVENT: &str = "BaiduMap_LocationError";
