use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::{core::config::SdkConfig, prelude::Arc, MapError, Result};

#[derive(Debug, Default)]
struct SdkState {
    initialized: bool,
    api_key: Option<String>,
    privacy_agreed: bool,
}

struct SdkInner {
    config: SdkConfig,
    state: RwLock<SdkState>,
    view_counter: AtomicU64,
}

/// Explicit handle to the map SDK.
///
/// Initialisation and teardown are explicit calls on the handle; views
/// receive a clone at construction instead of reaching for process-wide
/// state.
#[derive(Clone)]
pub struct MapSdk {
    inner: Arc<SdkInner>,
}

/// Masks all but the first and last four characters
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}****{tail}")
}

impl MapSdk {
    pub fn new(config: SdkConfig) -> Self {
        Self {
            inner: Arc::new(SdkInner {
                config,
                state: RwLock::new(SdkState::default()),
                view_counter: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &SdkConfig {
        &self.inner.config
    }

    /// The key `initialize` would use: `api_key`, else the configured one
    pub fn resolve_api_key(&self, api_key: Option<&str>) -> Result<String> {
        api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .or_else(|| {
                self.inner
                    .config
                    .api_key
                    .as_deref()
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
            })
            .map(str::to_string)
            .ok_or_else(|| MapError::InvalidApiKey("API key is empty".into()))
    }

    /// Initialises with `api_key`, falling back to the configured key.
    ///
    /// Returns the masked key. Re-initialising replaces the key.
    pub fn initialize(&self, api_key: Option<&str>) -> Result<String> {
        let key = self.resolve_api_key(api_key)?;
        let masked = mask_api_key(&key);
        let mut state = self.inner.state.write();
        state.initialized = true;
        state.api_key = Some(key);
        log::info!("map SDK initialised with key {masked}");
        Ok(masked)
    }

    /// Returns to the uninitialised state; idempotent
    pub fn shutdown(&self) {
        let mut state = self.inner.state.write();
        if state.initialized {
            log::info!("map SDK shut down");
        }
        state.initialized = false;
        state.api_key = None;
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.state.read().initialized
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(MapError::NotInitialized)
        }
    }

    pub fn masked_api_key(&self) -> Option<String> {
        self.inner.state.read().api_key.as_deref().map(mask_api_key)
    }

    pub fn set_privacy_agreed(&self, agreed: bool) {
        self.inner.state.write().privacy_agreed = agreed;
    }

    pub fn privacy_agreed(&self) -> bool {
        self.inner.state.read().privacy_agreed
    }

    /// Sequence number for log correlation, scoped to this handle
    pub(crate) fn next_view_id(&self) -> u64 {
        self.inner.view_counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Default for MapSdk {
    fn default() -> Self {
        Self::new(SdkConfig::default())
    }
}
