//! RTC engine abstraction
//!
//! This module defines the trait seam between the adapter and the wrapped
//! real-time communication engine. The engine owns all of the hard parts
//! (capture, encoding, transport, congestion control); the adapter only
//! sequences its operations and forwards its events. Implementations bind
//! a concrete vendor engine; [`mock`] provides a scriptable test double.
//!
//! The engine's native API is callback-based; implementations surface each
//! operation as an async method that resolves with the success value or the
//! engine's failure value, carried unmodified as [`SdkError`].

use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::events::{ClientSdkEvent, StreamSdkEvent};
use crate::types::{RemoteStreamType, StreamSpec, Uid};

pub mod mock;

/// The failure value supplied by the engine's error callbacks
///
/// Carried through the adapter unmodified; no retries, no classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkError {
    /// Engine error code, when the engine supplied one
    pub code: Option<i32>,
    /// Engine error description
    pub message: String,
}

impl SdkError {
    /// Build an error from an engine failure message
    pub fn new(code: Option<i32>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for SdkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for SdkError {}

/// Result type for raw engine operations
pub type SdkResult<T> = std::result::Result<T, SdkError>;

/// Transport statistics snapshot from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransportStats {
    /// Round-trip time to the channel infrastructure, in milliseconds
    pub rtt_ms: Option<u32>,
    /// Outgoing bitrate in kbps, when reported
    pub tx_kbps: Option<u32>,
    /// Incoming bitrate in kbps, when reported
    pub rx_kbps: Option<u32>,
}

/// Raw device record as the engine reports it
///
/// Transformed into [`crate::types::MediaDeviceInfo`] before leaving the
/// adapter; unknown kinds are dropped during the transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkDeviceRecord {
    /// Stable device identifier
    pub device_id: String,
    /// Engine kind string ("audioinput", "videoinput", "audiooutput")
    pub kind: String,
    /// Human-readable label
    pub label: String,
}

/// One engine client connection
///
/// A client binds to at most one channel at a time and publishes at most
/// one local stream. Event delivery is push-based: [`RtcClient::events`]
/// hands out a receiver fed by the engine's own emissions.
#[async_trait::async_trait]
pub trait RtcClient: Send + Sync {
    /// Initialize the client with the application identifier
    async fn init(&self, app_id: &str) -> SdkResult<()>;

    /// Join a channel, returning the uid the engine assigned
    async fn join(&self, token: Option<&str>, channel: &str, uid: Uid) -> SdkResult<Uid>;

    /// Leave the current channel
    async fn leave(&self) -> SdkResult<()>;

    /// Publish a local stream into the channel
    async fn publish(&self, stream: Arc<dyn LocalMediaStream>) -> SdkResult<()>;

    /// Withdraw a previously published local stream
    async fn unpublish(&self, stream: Arc<dyn LocalMediaStream>) -> SdkResult<()>;

    /// Subscribe to a remote participant's stream
    async fn subscribe(&self, uid: Uid) -> SdkResult<()>;

    /// Request the high- or low-resolution variant of a remote stream
    async fn set_remote_video_stream_type(
        &self,
        uid: Uid,
        stream_type: RemoteStreamType,
    ) -> SdkResult<()>;

    /// Ask the engine to offer both resolution variants of the published
    /// stream
    async fn enable_dual_stream(&self) -> SdkResult<()>;

    /// Latest transport statistics, `None` while not connected
    async fn get_transport_stats(&self) -> Option<TransportStats>;

    /// Subscribe to the client's event emissions
    fn events(&self) -> broadcast::Receiver<ClientSdkEvent>;

    /// Release the client's native resources
    ///
    /// Idempotent. After destroy the client must be re-initialized before
    /// any other call.
    fn destroy(&self);
}

/// One engine local media stream
#[async_trait::async_trait]
pub trait LocalMediaStream: Send + Sync {
    /// The numeric identifier this stream carries within the channel
    fn stream_id(&self) -> Uid;

    /// Acquire the capture devices and prepare the stream
    async fn init(&self) -> SdkResult<()>;

    /// Route this stream's audio output to the given device
    async fn set_audio_output(&self, device_id: &str) -> SdkResult<()>;

    /// Set this stream's output volume, 0-100
    async fn set_audio_volume(&self, volume: u8) -> SdkResult<()>;

    /// Whether local playback is active
    fn is_playing(&self) -> bool;

    /// Stop local playback
    async fn stop(&self) -> SdkResult<()>;

    /// Close the stream and release the captured device handles
    async fn close(&self);

    /// Subscribe to the stream's event emissions
    fn events(&self) -> broadcast::Receiver<StreamSdkEvent>;
}

/// Factory for engine clients and streams
///
/// The entry point implementations provide. One engine instance serves the
/// whole application; clients and streams created from it are independent.
#[async_trait::async_trait]
pub trait RtcEngine: Send + Sync {
    /// Create a new, uninitialized client
    fn create_client(&self) -> Arc<dyn RtcClient>;

    /// Construct a local stream from a capture specification
    ///
    /// Construction is infallible; device acquisition happens in
    /// [`LocalMediaStream::init`].
    fn create_stream(&self, spec: &StreamSpec) -> Arc<dyn LocalMediaStream>;

    /// List the media devices the engine can see
    async fn get_devices(&self) -> SdkResult<Vec<SdkDeviceRecord>>;
}
