//! Stream session - one engine client plus at most one local stream
//!
//! [`StreamSession`] wraps a single [`RtcClient`] connection and at most one
//! [`LocalMediaStream`], sequences their lifecycle (initialize, join,
//! create stream, publish, unpublish, leave, shutdown), and forwards the
//! engine's event emissions onto a session-level [`EventBus`] so callers
//! never touch the engine's native event API.
//!
//! Per-session lifecycle: `Uninitialized -> Initialized -> (LocalStreamReady)
//! -> Published <-> Unpublished -> Torn down`. Channel membership is an
//! orthogonal boolean tracked alongside. [`StreamSession::shutdown`] resets
//! every flag regardless of prior state, so teardown is idempotent.
//!
//! Operations are sequenced by the caller: the session provides no mutual
//! exclusion beyond its idempotency flags, and compound operations must not
//! overlap on one session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::config::AdapterConfig;
use crate::error::{AdapterError, AdapterResult};
use crate::events::{EventBus, SessionEvent};
use crate::sdk::{LocalMediaStream, RtcClient, RtcEngine};
use crate::types::{MediaDeviceInfo, RemoteStreamType, SessionId, StreamSpec, Uid};

/// One bound pair of engine client and local media stream
pub struct StreamSession {
    id: SessionId,
    engine: Arc<dyn RtcEngine>,
    client: Arc<dyn RtcClient>,
    config: AdapterConfig,
    bus: EventBus<SessionEvent>,
    local_stream: Option<Arc<dyn LocalMediaStream>>,
    subscribed_remotes: DashMap<Uid, DateTime<Utc>>,
    initialized: bool,
    joined: bool,
    published: bool,
    stream_id: Option<Uid>,
    client_forwarder: Option<JoinHandle<()>>,
    stream_forwarder: Option<JoinHandle<()>>,
    rtt_monitor: Option<JoinHandle<()>>,
}

impl StreamSession {
    /// Create a session with a fresh, uninitialized engine client
    pub fn new(engine: Arc<dyn RtcEngine>, config: AdapterConfig) -> Self {
        let client = engine.create_client();
        Self {
            id: SessionId::new(),
            engine,
            client,
            config,
            bus: EventBus::default(),
            local_stream: None,
            subscribed_remotes: DashMap::new(),
            initialized: false,
            joined: false,
            published: false,
            stream_id: None,
            client_forwarder: None,
            stream_forwarder: None,
            rtt_monitor: None,
        }
    }

    /// This session's identifier, for log correlation
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Whether the engine client has been initialized
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether the session is currently joined to a channel
    pub fn is_joined(&self) -> bool {
        self.joined
    }

    /// Whether the local stream is currently published
    pub fn is_published(&self) -> bool {
        self.published
    }

    /// Whether a local stream exists
    pub fn has_local_stream(&self) -> bool {
        self.local_stream.is_some()
    }

    /// The local stream's identifier, when one exists
    pub fn local_stream_id(&self) -> Option<Uid> {
        self.stream_id
    }

    /// Subscribe to this session's event bus
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SessionEvent> {
        self.bus.subscribe()
    }

    /// Remote uids this session has subscribed to
    pub fn subscribed_peers(&self) -> Vec<Uid> {
        self.subscribed_remotes.iter().map(|e| *e.key()).collect()
    }

    /// Initialize the engine client
    ///
    /// Idempotent: once initialized, further calls resolve immediately
    /// without touching the engine.
    pub async fn initialize(&mut self, app_id: &str) -> AdapterResult<()> {
        if self.initialized {
            tracing::trace!(session = %self.id, "client already initialized");
            return Ok(());
        }
        self.client
            .init(app_id)
            .await
            .map_err(AdapterError::init_failed)?;
        self.initialized = true;
        tracing::info!(session = %self.id, "engine client initialized");
        Ok(())
    }

    /// Initialize, start forwarding client events, and optionally start the
    /// round-trip-time monitor
    pub async fn connect(&mut self, app_id: &str, enable_rtt_monitor: bool) -> AdapterResult<()> {
        self.initialize(app_id).await?;

        // Re-subscribe on every connect so a client that was destroyed and
        // re-initialized gets a fresh forwarder.
        if let Some(handle) = self.client_forwarder.take() {
            handle.abort();
        }
        let mut events = self.client.events();
        let bus = self.bus.clone();
        let session = self.id;
        self.client_forwarder = Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        tracing::debug!(%session, ?event, "forwarding client event");
                        bus.emit(SessionEvent::Client(event));
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(%session, missed, "client event feed lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }));

        if enable_rtt_monitor && self.config.enable_rtt_monitor {
            self.start_rtt_monitor();
        }
        Ok(())
    }

    /// Join a channel with the given uid
    pub async fn join_channel(&mut self, uid: Uid, channel: &str) -> AdapterResult<Uid> {
        let assigned = self
            .client
            .join(self.config.token.as_deref(), channel, uid)
            .await?;
        self.joined = true;
        tracing::info!(session = %self.id, uid = assigned, channel, "joined channel");
        Ok(assigned)
    }

    /// Leave the current channel
    pub async fn leave_channel(&mut self) -> AdapterResult<()> {
        self.client.leave().await?;
        self.joined = false;
        self.subscribed_remotes.clear();
        tracing::info!(session = %self.id, "left channel");
        Ok(())
    }

    /// Create and initialize the local stream described by `spec`
    ///
    /// Mirroring is forced off. If the spec carries an audio output device
    /// it is applied before this resolves.
    pub async fn create_local_stream(&mut self, spec: &StreamSpec) -> AdapterResult<()> {
        let mut spec = spec.clone();
        spec.mirror = false;

        let stream = self.engine.create_stream(&spec);
        stream
            .init()
            .await
            .map_err(AdapterError::stream_init_failed)?;

        if let Some(handle) = self.stream_forwarder.take() {
            handle.abort();
        }
        let mut events = stream.events();
        let bus = self.bus.clone();
        let session = self.id;
        self.stream_forwarder = Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        tracing::debug!(%session, ?event, "forwarding stream event");
                        bus.emit(SessionEvent::Stream(event));
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(%session, missed, "stream event feed lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }));

        if let Some(output) = &spec.audio_output {
            stream.set_audio_output(&output.device_id).await?;
            if let Some(volume) = output.volume {
                stream.set_audio_volume(volume).await?;
            }
        }

        self.stream_id = Some(spec.stream_id);
        self.local_stream = Some(stream);
        tracing::info!(session = %self.id, stream_id = spec.stream_id, screen = spec.screen,
            "local stream ready");
        Ok(())
    }

    /// Publish the local stream into the channel
    ///
    /// Idempotent no-op when already published. The engine's completion
    /// signal for publish is ambiguous, so this resolves after
    /// `publish_settle_delay` rather than on an engine callback.
    pub async fn publish(&mut self) -> AdapterResult<()> {
        if self.published {
            tracing::debug!(session = %self.id, "already published, skipping");
            return Ok(());
        }
        let stream = self
            .local_stream
            .clone()
            .ok_or_else(|| AdapterError::invalid_state("publish requires a local stream"))?;

        self.client.publish(stream).await?;
        tokio::time::sleep(self.config.publish_settle_delay).await;
        self.published = true;
        tracing::info!(session = %self.id, stream_id = ?self.stream_id, "local stream published");
        Ok(())
    }

    /// Withdraw the local stream from the channel and tear it down
    ///
    /// No-op when not published or when no local stream exists. Resolves
    /// after the same settle delay as [`StreamSession::publish`].
    pub async fn unpublish(&mut self) -> AdapterResult<()> {
        if !self.published {
            return Ok(());
        }
        let Some(stream) = self.local_stream.clone() else {
            return Ok(());
        };

        self.client.unpublish(stream).await?;
        tokio::time::sleep(self.config.publish_settle_delay).await;
        self.destroy_local_stream().await;
        self.published = false;
        tracing::info!(session = %self.id, "local stream unpublished");
        Ok(())
    }

    /// Subscribe to a remote participant's stream
    ///
    /// Failures are logged and swallowed rather than surfaced; subscription
    /// is fire-and-forget from the caller's point of view.
    pub async fn subscribe_to_remote_stream(&self, uid: Uid) {
        match self.client.subscribe(uid).await {
            Ok(()) => {
                self.subscribed_remotes.insert(uid, Utc::now());
                tracing::debug!(session = %self.id, uid, "subscribed to remote stream");
            }
            Err(error) => {
                tracing::warn!(session = %self.id, uid, %error,
                    "remote stream subscribe failed, continuing");
            }
        }
    }

    /// Request the high- or low-resolution variant of a remote stream
    pub async fn set_remote_video_stream_type(
        &self,
        uid: Uid,
        stream_type: RemoteStreamType,
    ) -> AdapterResult<()> {
        self.client
            .set_remote_video_stream_type(uid, stream_type)
            .await?;
        Ok(())
    }

    /// Ask the engine to offer both resolution variants of the published
    /// stream
    pub async fn enable_dual_stream(&self) -> AdapterResult<()> {
        self.client.enable_dual_stream().await?;
        Ok(())
    }

    /// Route the local stream's audio output to the given device
    pub async fn set_audio_output(&self, device_id: &str) -> AdapterResult<()> {
        let stream = self
            .local_stream
            .as_ref()
            .ok_or_else(|| AdapterError::invalid_state("no local stream to route audio for"))?;
        stream.set_audio_output(device_id).await?;
        Ok(())
    }

    /// Set the local stream's output volume, 0-100
    pub async fn set_audio_volume(&self, volume: u8) -> AdapterResult<()> {
        let stream = self
            .local_stream
            .as_ref()
            .ok_or_else(|| AdapterError::invalid_state("no local stream to set volume on"))?;
        stream.set_audio_volume(volume).await?;
        Ok(())
    }

    /// List the media devices the engine can see, transformed into
    /// [`MediaDeviceInfo`] snapshots
    pub async fn enumerate_devices(&self) -> AdapterResult<Vec<MediaDeviceInfo>> {
        let records = self.engine.get_devices().await?;
        Ok(records
            .iter()
            .filter_map(MediaDeviceInfo::from_record)
            .collect())
    }

    /// Tear down the local stream
    ///
    /// Stops event forwarding, stops playback if active, closes the stream.
    /// Safe to call when no stream exists.
    pub async fn destroy_local_stream(&mut self) {
        if let Some(handle) = self.stream_forwarder.take() {
            handle.abort();
        }
        if let Some(stream) = self.local_stream.take() {
            if stream.is_playing() {
                if let Err(error) = stream.stop().await {
                    tracing::warn!(session = %self.id, %error, "failed to stop local playback");
                }
            }
            stream.close().await;
            tracing::debug!(session = %self.id, "local stream destroyed");
        }
        self.stream_id = None;
    }

    /// Full teardown: cancel the round-trip-time monitor, optionally leave
    /// the channel, destroy the local stream, release the client
    ///
    /// Fixed order: leave, then destroy. All flags reset regardless of
    /// prior state; the session can be reconnected afterwards.
    pub async fn shutdown(&mut self, leave_channel: bool) -> AdapterResult<()> {
        self.stop_rtt_monitor();

        if leave_channel && self.joined {
            self.leave_channel().await?;
        }

        self.destroy_local_stream().await;

        if let Some(handle) = self.client_forwarder.take() {
            handle.abort();
        }
        self.client.destroy();

        self.initialized = false;
        self.joined = false;
        self.published = false;
        self.subscribed_remotes.clear();
        tracing::info!(session = %self.id, "session shut down");
        Ok(())
    }

    /// Start the periodic transport-stats poll
    ///
    /// Emits [`SessionEvent::RttUpdate`] with the latest round-trip time,
    /// 0 when the engine has no measurement. The monitor must be cancelled
    /// before the client is destroyed; shutdown does so.
    fn start_rtt_monitor(&mut self) {
        self.stop_rtt_monitor();
        let client = self.client.clone();
        let bus = self.bus.clone();
        let interval = self.config.rtt_interval;
        self.rtt_monitor = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let rtt_ms = client
                    .get_transport_stats()
                    .await
                    .and_then(|stats| stats.rtt_ms)
                    .unwrap_or(0);
                bus.emit(SessionEvent::RttUpdate { rtt_ms });
            }
        }));
    }

    /// Cancel the transport-stats poll, if running
    fn stop_rtt_monitor(&mut self) {
        if let Some(handle) = self.rtt_monitor.take() {
            handle.abort();
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        // Background tasks hold a client handle; stop them with the session.
        if let Some(handle) = self.rtt_monitor.take() {
            handle.abort();
        }
        if let Some(handle) = self.client_forwarder.take() {
            handle.abort();
        }
        if let Some(handle) = self.stream_forwarder.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ClientSdkEvent, StreamSdkEvent};
    use crate::sdk::mock::MockRtcEngine;
    use std::time::Duration;
    use tokio_test::assert_ok;

    fn test_config() -> AdapterConfig {
        AdapterConfig::new("test-app")
            .with_publish_settle_delay(Duration::from_millis(1))
            .with_rtt_interval(Duration::from_millis(10))
            .with_device_release_grace(Duration::from_millis(1))
    }

    fn session_with_mock() -> (MockRtcEngine, StreamSession) {
        let engine = MockRtcEngine::new();
        let session = StreamSession::new(Arc::new(engine.clone()), test_config());
        (engine, session)
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let (engine, mut session) = session_with_mock();

        assert_ok!(session.initialize("test-app").await);
        assert_ok!(session.initialize("test-app").await);

        assert_eq!(engine.count_calls("init:"), 1);
        assert!(session.is_initialized());
    }

    #[tokio::test]
    async fn initialize_failure_is_init_error() {
        let (engine, mut session) = session_with_mock();
        engine.fail_on("init");

        let err = session.initialize("test-app").await.unwrap_err();
        assert!(matches!(err, AdapterError::InitFailed { .. }));
        assert!(!session.is_initialized());
    }

    #[tokio::test]
    async fn publish_when_already_published_skips_engine() {
        let (engine, mut session) = session_with_mock();
        session.connect("test-app", false).await.unwrap();
        session
            .create_local_stream(&StreamSpec::camera(5))
            .await
            .unwrap();

        session.publish().await.unwrap();
        session.publish().await.unwrap();

        assert_eq!(engine.count_calls("publish:"), 1);
        assert!(session.is_published());
    }

    #[tokio::test]
    async fn publish_without_stream_is_invalid_state() {
        let (_engine, mut session) = session_with_mock();
        session.connect("test-app", false).await.unwrap();

        let err = session.publish().await.unwrap_err();
        assert!(matches!(err, AdapterError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn publish_waits_for_settle_delay() {
        let engine = MockRtcEngine::new();
        let config = test_config().with_publish_settle_delay(Duration::from_millis(50));
        let mut session = StreamSession::new(Arc::new(engine), config);
        session.connect("test-app", false).await.unwrap();
        session
            .create_local_stream(&StreamSpec::camera(5))
            .await
            .unwrap();

        let started = std::time::Instant::now();
        session.publish().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn unpublish_when_not_published_is_a_no_op() {
        let (engine, mut session) = session_with_mock();
        session.connect("test-app", false).await.unwrap();
        session
            .create_local_stream(&StreamSpec::camera(5))
            .await
            .unwrap();

        session.unpublish().await.unwrap();

        assert_eq!(engine.count_calls("unpublish:"), 0);
        assert!(session.has_local_stream(), "stream must be untouched");
    }

    #[tokio::test]
    async fn unpublish_tears_the_stream_down() {
        let (engine, mut session) = session_with_mock();
        session.connect("test-app", false).await.unwrap();
        session
            .create_local_stream(&StreamSpec::camera(5))
            .await
            .unwrap();
        session.publish().await.unwrap();

        session.unpublish().await.unwrap();

        assert_eq!(engine.count_calls("unpublish:"), 1);
        assert_eq!(engine.count_calls("stream_close:"), 1);
        assert!(!session.is_published());
        assert!(!session.has_local_stream());
    }

    #[tokio::test]
    async fn mirror_is_forced_off() {
        let (_engine, mut session) = session_with_mock();
        session.connect("test-app", false).await.unwrap();

        let mut spec = StreamSpec::camera(5);
        spec.mirror = true;
        session.create_local_stream(&spec).await.unwrap();
        // The spec value object is untouched; only the created stream has
        // mirroring stripped. Presence of the stream is what we can observe.
        assert!(session.has_local_stream());
    }

    #[tokio::test]
    async fn audio_output_from_spec_is_applied() {
        let (engine, mut session) = session_with_mock();
        session.connect("test-app", false).await.unwrap();

        let spec = StreamSpec::camera(5).with_audio_output("speakers-2", Some(80));
        session.create_local_stream(&spec).await.unwrap();

        let calls = engine.calls();
        assert!(calls.contains(&"set_audio_output:speakers-2".to_string()));
        assert!(calls.contains(&"set_audio_volume:80".to_string()));
    }

    #[tokio::test]
    async fn subscribe_failure_is_swallowed() {
        let (engine, mut session) = session_with_mock();
        session.connect("test-app", false).await.unwrap();
        engine.fail_on("subscribe");

        // Must not panic or surface an error.
        session.subscribe_to_remote_stream(9).await;
        assert!(session.subscribed_peers().is_empty());

        engine.clear_failure("subscribe");
        session.subscribe_to_remote_stream(9).await;
        assert_eq!(session.subscribed_peers(), vec![9]);
    }

    #[tokio::test]
    async fn destroy_stops_active_playback() {
        let (engine, mut session) = session_with_mock();
        session.connect("test-app", false).await.unwrap();
        session
            .create_local_stream(&StreamSpec::camera(5))
            .await
            .unwrap();
        engine.last_stream().unwrap().set_playing(true);

        session.destroy_local_stream().await;

        let calls = engine.calls();
        assert!(calls.contains(&"stream_stop".to_string()));
        assert!(calls.contains(&"stream_close:5".to_string()));
    }

    #[tokio::test]
    async fn destroy_without_stream_is_safe() {
        let (_engine, mut session) = session_with_mock();
        session.destroy_local_stream().await;
        assert!(!session.has_local_stream());
    }

    #[tokio::test]
    async fn shutdown_resets_all_flags() {
        let (_engine, mut session) = session_with_mock();
        session.connect("test-app", true).await.unwrap();
        session.join_channel(42, "room1").await.unwrap();
        session
            .create_local_stream(&StreamSpec::camera(42))
            .await
            .unwrap();
        session.publish().await.unwrap();

        assert_ok!(session.shutdown(true).await);

        assert!(!session.is_initialized());
        assert!(!session.is_joined());
        assert!(!session.is_published());
        assert!(!session.has_local_stream());

        // Idempotent teardown.
        session.shutdown(true).await.unwrap();
    }

    #[tokio::test]
    async fn client_events_are_forwarded() {
        let (engine, mut session) = session_with_mock();
        session.connect("test-app", false).await.unwrap();
        let mut rx = session.subscribe();

        engine.inject_client_event(ClientSdkEvent::PeerJoined { uid: 7 });

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, SessionEvent::Client(ClientSdkEvent::PeerJoined { uid: 7 }));
    }

    #[tokio::test]
    async fn stream_events_are_forwarded() {
        let (engine, mut session) = session_with_mock();
        session.connect("test-app", false).await.unwrap();
        session
            .create_local_stream(&StreamSpec::camera(5))
            .await
            .unwrap();
        let mut rx = session.subscribe();

        engine.inject_stream_event(StreamSdkEvent::VideoTrackEnded);

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, SessionEvent::Stream(StreamSdkEvent::VideoTrackEnded));
    }

    #[tokio::test]
    async fn rtt_monitor_emits_and_stops_on_shutdown() {
        let (engine, mut session) = session_with_mock();
        engine.set_rtt(Some(42));
        session.connect("test-app", true).await.unwrap();
        let mut rx = session.subscribe();

        for _ in 0..3 {
            let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("monitor should keep emitting")
                .unwrap();
            assert_eq!(event, SessionEvent::RttUpdate { rtt_ms: 42 });
        }

        session.shutdown(false).await.unwrap();

        // Drain whatever was emitted before the abort, then expect silence.
        while let Ok(result) =
            tokio::time::timeout(Duration::from_millis(30), rx.recv()).await
        {
            result.unwrap();
        }
    }

    #[tokio::test]
    async fn rtt_monitor_reports_zero_without_stats() {
        let (engine, mut session) = session_with_mock();
        engine.set_rtt(None);
        session.connect("test-app", true).await.unwrap();
        let mut rx = session.subscribe();

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, SessionEvent::RttUpdate { rtt_ms: 0 });
    }

    #[tokio::test]
    async fn enumerate_devices_transforms_records() {
        use crate::sdk::SdkDeviceRecord;
        use crate::types::MediaDeviceKind;

        let (engine, session) = session_with_mock();
        engine.set_devices(vec![
            SdkDeviceRecord {
                device_id: "mic-1".into(),
                kind: "audioinput".into(),
                label: "Mic".into(),
            },
            SdkDeviceRecord {
                device_id: "odd-1".into(),
                kind: "haptic".into(),
                label: "Odd".into(),
            },
        ]);

        let devices = session.enumerate_devices().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].kind, MediaDeviceKind::AudioInput);
    }
}
