//! Configuration for the RTC client adapter
//!
//! This module defines [`AdapterConfig`], the single configuration object
//! shared by every session the coordinator creates. It carries the engine
//! credentials plus the handful of timing knobs the adapter relies on.
//!
//! # Timing knobs
//!
//! - **Publish settle delay** - publish and unpublish resolve a fixed delay
//!   after the engine call is issued, because the engine's own completion
//!   signal for these operations is ambiguous. The delay is configuration,
//!   not a constant, so tests and latency-sensitive deployments can shrink
//!   it. Note the latent race: if the engine fails after the delay elapses,
//!   the failure surfaces only through the event feed.
//! - **RTT interval** - how often the round-trip-time monitor polls
//!   transport stats while connected.
//! - **Device release grace** - how long device enumeration waits before
//!   tearing down its throwaway client, giving the host environment time to
//!   release the captured device handle.
//!
//! # Examples
//!
//! ```rust
//! use edurtc_client_core::config::AdapterConfig;
//! use std::time::Duration;
//!
//! let config = AdapterConfig::new("my-app-id")
//!     .with_token("room-token")
//!     .with_screen_share_uid(1_000_000)
//!     .with_publish_settle_delay(Duration::from_millis(300));
//!
//! assert_eq!(config.app_id, "my-app-id");
//! assert_eq!(config.screen_share_uid, 1_000_000);
//! ```
//!
//! Configuration round-trips through serde for embedding in application
//! config files:
//!
//! ```rust
//! use edurtc_client_core::config::AdapterConfig;
//!
//! let config = AdapterConfig::new("my-app-id");
//! let json = serde_json::to_string(&config).unwrap();
//! let back: AdapterConfig = serde_json::from_str(&json).unwrap();
//! assert_eq!(back.app_id, config.app_id);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default settle delay applied after engine publish/unpublish calls
pub const DEFAULT_PUBLISH_SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Default polling interval for the round-trip-time monitor
pub const DEFAULT_RTT_INTERVAL: Duration = Duration::from_millis(100);

/// Default grace period before a device-enumeration client is torn down
pub const DEFAULT_DEVICE_RELEASE_GRACE: Duration = Duration::from_millis(80);

/// Default reserved stream identifier for the screen-share session
pub const DEFAULT_SCREEN_SHARE_UID: u32 = 1_000_000;

/// Configuration for coordinator and session behavior
///
/// Cheap to clone; each session holds its own copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Application identifier handed to the engine on client init
    pub app_id: String,
    /// Optional channel access token handed to the engine on join
    pub token: Option<String>,
    /// Reserved numeric uid for the screen-share session, distinct from any
    /// participant uid so the engine can tell the two streams apart within
    /// one channel
    pub screen_share_uid: u32,
    /// Delay before publish/unpublish resolve after the engine call
    pub publish_settle_delay: Duration,
    /// Polling interval for the round-trip-time monitor
    pub rtt_interval: Duration,
    /// Grace period before the device-enumeration client is torn down
    pub device_release_grace: Duration,
    /// Global switch for the round-trip-time monitor
    pub enable_rtt_monitor: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            token: None,
            screen_share_uid: DEFAULT_SCREEN_SHARE_UID,
            publish_settle_delay: DEFAULT_PUBLISH_SETTLE_DELAY,
            rtt_interval: DEFAULT_RTT_INTERVAL,
            device_release_grace: DEFAULT_DEVICE_RELEASE_GRACE,
            enable_rtt_monitor: true,
        }
    }
}

impl AdapterConfig {
    /// Create a configuration with the given application id and defaults
    /// for everything else
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            ..Default::default()
        }
    }

    /// Set the channel access token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the reserved screen-share stream identifier
    pub fn with_screen_share_uid(mut self, uid: u32) -> Self {
        self.screen_share_uid = uid;
        self
    }

    /// Set the publish/unpublish settle delay
    pub fn with_publish_settle_delay(mut self, delay: Duration) -> Self {
        self.publish_settle_delay = delay;
        self
    }

    /// Set the round-trip-time polling interval
    pub fn with_rtt_interval(mut self, interval: Duration) -> Self {
        self.rtt_interval = interval;
        self
    }

    /// Set the device release grace period
    pub fn with_device_release_grace(mut self, grace: Duration) -> Self {
        self.device_release_grace = grace;
        self
    }

    /// Enable or disable the round-trip-time monitor globally
    pub fn with_rtt_monitor(mut self, enabled: bool) -> Self {
        self.enable_rtt_monitor = enabled;
        self
    }
}
