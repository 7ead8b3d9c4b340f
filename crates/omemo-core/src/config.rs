//! Tunables for sessions and bundles.

use std::time::Duration;

/// Default number of one-time pre-keys in a fresh bundle
pub const DEFAULT_PRE_KEY_COUNT: usize = 10;

/// Default limit on message keys derived ahead in one receive step
pub const DEFAULT_MAX_SKIP: u32 = 1000;

/// Default cap on cached skipped message keys per session
pub const DEFAULT_MAX_SKIPPED_KEYS: usize = 1000;

/// Default lifetime of a cached skipped message key
pub const DEFAULT_SKIPPED_KEY_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Session and bundle configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OmemoConfig {
    /// One-time pre-keys generated per bundle, and the level the bundle is
    /// topped back up to after one is consumed
    pub pre_key_count: usize,
    /// Largest gap between the receive chain index and an incoming message
    /// index that will be bridged by deriving and caching skipped keys
    pub max_skip: u32,
    /// Cached skipped keys kept per session; the oldest are dropped first
    pub max_skipped_keys: usize,
    /// Cached skipped keys older than this are dropped
    pub skipped_key_max_age: Duration,
}

impl Default for OmemoConfig {
    fn default() -> Self {
        Self {
            pre_key_count: DEFAULT_PRE_KEY_COUNT,
            max_skip: DEFAULT_MAX_SKIP,
            max_skipped_keys: DEFAULT_MAX_SKIPPED_KEYS,
            skipped_key_max_age: DEFAULT_SKIPPED_KEY_MAX_AGE,
        }
    }
}
