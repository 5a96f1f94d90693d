//! Event handling for the RTC client adapter
//!
//! The wrapped engine raises named events on its client and local-stream
//! objects. This module models that vocabulary as closed enums so handlers
//! get compile-time exhaustiveness instead of string matching, and provides
//! the broadcast buses the adapter re-emits them on.
//!
//! # Event flow
//!
//! ```text
//! engine client  ──► ClientSdkEvent ─┐
//! engine stream  ──► StreamSdkEvent ─┼─► SessionEvent (session bus)
//! RTT monitor    ──► RttUpdate      ─┘          │
//!                                               ▼
//!                               CoordinatorEvent (coordinator bus,
//!                               tagged with the originating session role)
//! ```
//!
//! The session bus and the coordinator bus are independently lifecycled:
//! dropping a coordinator subscription does not disturb session-level
//! subscribers, and vice versa.
//!
//! # Usage Examples
//!
//! ```rust
//! use edurtc_client_core::events::{CoordinatorEvent, SessionEvent, ClientSdkEvent};
//!
//! fn describe(event: &CoordinatorEvent) -> String {
//!     match &event.event {
//!         SessionEvent::Client(ClientSdkEvent::PeerJoined { uid }) => {
//!             format!("peer {} joined ({})", uid, event.role)
//!         }
//!         SessionEvent::RttUpdate { rtt_ms } => format!("rtt {} ms", rtt_ms),
//!         other => format!("{:?}", other),
//!     }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{MediaDeviceKind, SessionRole, Uid};

/// Default capacity for the broadcast buses
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Connection state reported by the engine client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No transport connection
    Disconnected,
    /// Connection attempt in progress
    Connecting,
    /// Connected to the channel infrastructure
    Connected,
    /// Connection lost, engine is retrying
    Reconnecting,
}

/// Events raised by the engine's client object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientSdkEvent {
    /// A remote participant joined the channel
    PeerJoined {
        /// The participant's uid
        uid: Uid,
    },
    /// A remote participant left the channel
    PeerLeft {
        /// The participant's uid
        uid: Uid,
        /// Engine-supplied reason, when available
        reason: Option<String>,
    },
    /// A remote participant started publishing a stream
    StreamAdded {
        /// The publishing participant's uid
        uid: Uid,
    },
    /// A remote participant withdrew a stream
    StreamRemoved {
        /// The publishing participant's uid
        uid: Uid,
    },
    /// A remote stream subscription completed and media is flowing
    StreamSubscribed {
        /// The publishing participant's uid
        uid: Uid,
    },
    /// The transport connection changed state
    ConnectionStateChanged {
        /// The new state
        state: ConnectionState,
    },
    /// Periodic network quality rating from the engine
    NetworkQuality {
        /// Uplink rating, 0 (unknown) to 6 (down)
        uplink: u8,
        /// Downlink rating, 0 (unknown) to 6 (down)
        downlink: u8,
    },
    /// The engine reported a client-level error
    ClientError {
        /// Engine error code
        code: i32,
        /// Engine error description
        message: String,
    },
}

/// Events raised by the engine's local-stream object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamSdkEvent {
    /// The user granted device access
    AccessAllowed,
    /// The user denied device access
    AccessDenied {
        /// Which device kind was denied
        kind: MediaDeviceKind,
    },
    /// The captured audio track ended (device unplugged, permission revoked)
    AudioTrackEnded,
    /// The captured video track ended
    VideoTrackEnded,
    /// The user stopped screen capture through the browser/OS control
    ScreenShareStopped,
    /// Local playback of the stream started or stopped
    PlayerStateChanged {
        /// Whether the stream is now playing locally
        playing: bool,
    },
}

/// Everything a session re-emits on its bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// Forwarded client-level engine event
    Client(ClientSdkEvent),
    /// Forwarded stream-level engine event
    Stream(StreamSdkEvent),
    /// Latest round-trip time from the transport stats poll, 0 when
    /// the engine had no measurement
    RttUpdate {
        /// Round-trip time in milliseconds
        rtt_ms: u32,
    },
}

/// A session event as seen on the coordinator bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorEvent {
    /// Which session the event came from
    pub role: SessionRole,
    /// The forwarded session event
    pub event: SessionEvent,
    /// When the coordinator relayed it
    pub timestamp: DateTime<Utc>,
}

/// A publish/subscribe channel for adapter events
///
/// A thin wrapper over [`tokio::sync::broadcast`]. Emitting never blocks
/// and never fails; events emitted while no subscriber exists are dropped,
/// and a subscriber that falls behind loses the oldest events.
#[derive(Debug, Clone)]
pub struct EventBus<T: Clone> {
    tx: broadcast::Sender<T>,
}

impl<T: Clone> EventBus<T> {
    /// Create a bus with the given buffer capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to events emitted after this call
    ///
    /// Dropping the receiver unsubscribes; this is the `off` half of the
    /// subscription pair.
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.tx.subscribe()
    }

    /// Emit an event to all current subscribers
    pub fn emit(&self, event: T) {
        // Send only errors when there are no receivers; that is fine.
        let _ = self.tx.send(event);
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new(EVENT_BUS_CAPACITY)
    }
}
