//! Type definitions for the RTC client adapter
//!
//! This module contains the value objects shared across the adapter:
//! stream specifications, device descriptors, and the small identifier
//! types used to attribute log lines and events to a session.
//!
//! # Usage Examples
//!
//! ## Describing a camera/microphone stream
//!
//! ```rust
//! use edurtc_client_core::types::StreamSpec;
//!
//! let spec = StreamSpec::camera(42)
//!     .with_camera_device("cam-front")
//!     .with_microphone_device("mic-usb");
//!
//! assert_eq!(spec.stream_id, 42);
//! assert!(spec.video && spec.audio);
//! assert!(!spec.screen);
//! ```
//!
//! ## Describing a screen-capture stream
//!
//! ```rust
//! use edurtc_client_core::types::StreamSpec;
//!
//! let spec = StreamSpec::screen(1_000_000);
//! assert!(spec.screen);
//! assert!(!spec.audio);
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Numeric participant/stream identifier within a channel
pub type Uid = u32;

/// Unique identifier for one adapter session
///
/// Used only for log and event attribution; the engine never sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a fresh session id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which session an event originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionRole {
    /// The camera/microphone session
    Primary,
    /// The secondary screen-share session
    ScreenShare,
}

impl std::fmt::Display for SessionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionRole::Primary => write!(f, "primary"),
            SessionRole::ScreenShare => write!(f, "screen-share"),
        }
    }
}

/// Resolution variant to request for a remote participant's stream
///
/// Meaningful only when the remote publisher has dual-stream mode enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteStreamType {
    /// Full-resolution variant
    High,
    /// Reduced-resolution variant
    Low,
}

/// Desired audio output routing for a local stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioOutputSpec {
    /// Output device identifier
    pub device_id: String,
    /// Output volume, 0-100, if the caller wants it set
    pub volume: Option<u8>,
}

/// Specification of a local capture stream
///
/// A pure value object describing desired capture; it carries no identity
/// beyond the call site that built it. Mirroring is forced off when the
/// session creates the actual stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSpec {
    /// Numeric identifier the stream will carry within the channel
    pub stream_id: Uid,
    /// Capture video
    pub video: bool,
    /// Capture audio
    pub audio: bool,
    /// Mirror the local video preview
    pub mirror: bool,
    /// Capture the screen instead of a camera
    pub screen: bool,
    /// Camera device identifier, engine default when absent
    pub camera_id: Option<String>,
    /// Microphone device identifier, engine default when absent
    pub microphone_id: Option<String>,
    /// Audio output routing to apply once the stream is initialized
    pub audio_output: Option<AudioOutputSpec>,
}

impl StreamSpec {
    /// Spec for a camera+microphone stream with default devices
    pub fn camera(stream_id: Uid) -> Self {
        Self {
            stream_id,
            video: true,
            audio: true,
            mirror: false,
            screen: false,
            camera_id: None,
            microphone_id: None,
            audio_output: None,
        }
    }

    /// Spec for a screen-capture stream
    ///
    /// Audio is off; the microphone stays with the primary session.
    pub fn screen(stream_id: Uid) -> Self {
        Self {
            stream_id,
            video: true,
            audio: false,
            mirror: false,
            screen: true,
            camera_id: None,
            microphone_id: None,
            audio_output: None,
        }
    }

    /// Select a specific camera device
    pub fn with_camera_device(mut self, device_id: impl Into<String>) -> Self {
        self.camera_id = Some(device_id.into());
        self
    }

    /// Select a specific microphone device
    pub fn with_microphone_device(mut self, device_id: impl Into<String>) -> Self {
        self.microphone_id = Some(device_id.into());
        self
    }

    /// Route audio output to a specific device, optionally with a volume
    pub fn with_audio_output(mut self, device_id: impl Into<String>, volume: Option<u8>) -> Self {
        self.audio_output = Some(AudioOutputSpec {
            device_id: device_id.into(),
            volume,
        });
        self
    }

    /// Toggle video capture
    pub fn with_video(mut self, video: bool) -> Self {
        self.video = video;
        self
    }

    /// Toggle audio capture
    pub fn with_audio(mut self, audio: bool) -> Self {
        self.audio = audio;
        self
    }
}

/// Kind of a media device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaDeviceKind {
    /// Microphone
    AudioInput,
    /// Camera
    VideoInput,
    /// Speaker / headset output
    AudioOutput,
}

impl MediaDeviceKind {
    /// Parse the engine's device-kind string
    ///
    /// Unknown kinds yield `None` and are skipped during enumeration.
    pub fn from_sdk_kind(kind: &str) -> Option<Self> {
        match kind {
            "audioinput" => Some(Self::AudioInput),
            "videoinput" => Some(Self::VideoInput),
            "audiooutput" => Some(Self::AudioOutput),
            _ => None,
        }
    }

    /// The engine-side string for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AudioInput => "audioinput",
            Self::VideoInput => "videoinput",
            Self::AudioOutput => "audiooutput",
        }
    }
}

/// Read-only snapshot of one media device
///
/// Returned by device enumeration; has no lifecycle beyond the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDeviceInfo {
    /// Stable device identifier usable in a [`StreamSpec`]
    pub device_id: String,
    /// Device kind
    pub kind: MediaDeviceKind,
    /// Human-readable label, may be empty before permission is granted
    pub label: String,
}

impl MediaDeviceInfo {
    /// Transform a raw engine device record, skipping unknown kinds
    pub fn from_record(record: &crate::sdk::SdkDeviceRecord) -> Option<Self> {
        Some(Self {
            device_id: record.device_id.clone(),
            kind: MediaDeviceKind::from_sdk_kind(&record.kind)?,
            label: record.label.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_spec_defaults() {
        let spec = StreamSpec::camera(7);
        assert_eq!(spec.stream_id, 7);
        assert!(spec.video);
        assert!(spec.audio);
        assert!(!spec.mirror);
        assert!(!spec.screen);
        assert!(spec.camera_id.is_none());
    }

    #[test]
    fn screen_spec_has_no_audio() {
        let spec = StreamSpec::screen(1_000_000);
        assert!(spec.screen);
        assert!(spec.video);
        assert!(!spec.audio);
    }

    #[test]
    fn device_kind_parsing() {
        assert_eq!(
            MediaDeviceKind::from_sdk_kind("audioinput"),
            Some(MediaDeviceKind::AudioInput)
        );
        assert_eq!(
            MediaDeviceKind::from_sdk_kind("videoinput"),
            Some(MediaDeviceKind::VideoInput)
        );
        assert_eq!(
            MediaDeviceKind::from_sdk_kind("audiooutput"),
            Some(MediaDeviceKind::AudioOutput)
        );
        assert_eq!(MediaDeviceKind::from_sdk_kind("haptic"), None);
    }

    #[test]
    fn device_record_transform_skips_unknown_kinds() {
        let record = crate::sdk::SdkDeviceRecord {
            device_id: "dev-1".to_string(),
            kind: "haptic".to_string(),
            label: "Rumble pack".to_string(),
        };
        assert!(MediaDeviceInfo::from_record(&record).is_none());

        let record = crate::sdk::SdkDeviceRecord {
            device_id: "dev-2".to_string(),
            kind: "videoinput".to_string(),
            label: "Front camera".to_string(),
        };
        let info = MediaDeviceInfo::from_record(&record).unwrap();
        assert_eq!(info.kind, MediaDeviceKind::VideoInput);
        assert_eq!(info.device_id, "dev-2");
    }
}
