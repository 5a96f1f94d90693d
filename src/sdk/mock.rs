//! Scriptable engine test double
//!
//! [`MockRtcEngine`] records every engine call in order, lets tests inject
//! failures per operation and push events into the client/stream feeds, and
//! serves canned device lists and transport stats. All clients and streams
//! created from one engine share the same call log, so cross-session
//! ordering is observable from a single place.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::events::{ClientSdkEvent, StreamSdkEvent};
use crate::types::{RemoteStreamType, StreamSpec, Uid};

use super::{
    LocalMediaStream, RtcClient, RtcEngine, SdkDeviceRecord, SdkError, SdkResult, TransportStats,
};

/// Shared state behind one mock engine and everything it creates
struct MockState {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashSet<String>>,
    devices: Mutex<Vec<SdkDeviceRecord>>,
    rtt: Mutex<Option<u32>>,
    client_tx: broadcast::Sender<ClientSdkEvent>,
    stream_tx: broadcast::Sender<StreamSdkEvent>,
}

impl MockState {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn check(&self, op: &str) -> SdkResult<()> {
        if self.failures.lock().unwrap().contains(op) {
            Err(SdkError::new(Some(-1), format!("injected {op} failure")))
        } else {
            Ok(())
        }
    }
}

/// Scriptable mock engine for tests
#[derive(Clone)]
pub struct MockRtcEngine {
    state: Arc<MockState>,
    streams: Arc<Mutex<Vec<Arc<MockLocalStream>>>>,
}

impl MockRtcEngine {
    /// Create a mock engine with an empty call log and no failures
    pub fn new() -> Self {
        let (client_tx, _) = broadcast::channel(64);
        let (stream_tx, _) = broadcast::channel(64);
        Self {
            state: Arc::new(MockState {
                calls: Mutex::new(Vec::new()),
                failures: Mutex::new(HashSet::new()),
                devices: Mutex::new(Vec::new()),
                rtt: Mutex::new(None),
                client_tx,
                stream_tx,
            }),
            streams: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Snapshot of every engine call recorded so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.state.calls.lock().unwrap().clone()
    }

    /// Forget all recorded calls
    pub fn clear_calls(&self) {
        self.state.calls.lock().unwrap().clear();
    }

    /// How many recorded calls start with the given prefix
    pub fn count_calls(&self, prefix: &str) -> usize {
        self.state
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Make the named operation fail until cleared
    pub fn fail_on(&self, op: &str) {
        self.state.failures.lock().unwrap().insert(op.to_string());
    }

    /// Stop failing the named operation
    pub fn clear_failure(&self, op: &str) {
        self.state.failures.lock().unwrap().remove(op);
    }

    /// Set the device list enumeration will return
    pub fn set_devices(&self, devices: Vec<SdkDeviceRecord>) {
        *self.state.devices.lock().unwrap() = devices;
    }

    /// Set the round-trip time the transport stats will report,
    /// `None` for "stats unavailable"
    pub fn set_rtt(&self, rtt_ms: Option<u32>) {
        *self.state.rtt.lock().unwrap() = rtt_ms;
    }

    /// Push an event into every client event feed
    pub fn inject_client_event(&self, event: ClientSdkEvent) {
        let _ = self.state.client_tx.send(event);
    }

    /// Push an event into every stream event feed
    pub fn inject_stream_event(&self, event: StreamSdkEvent) {
        let _ = self.state.stream_tx.send(event);
    }

    /// The most recently created stream, for playback scripting
    pub fn last_stream(&self) -> Option<Arc<MockLocalStream>> {
        self.streams.lock().unwrap().last().cloned()
    }
}

#[async_trait::async_trait]
impl RtcEngine for MockRtcEngine {
    fn create_client(&self) -> Arc<dyn RtcClient> {
        self.state.record("create_client");
        Arc::new(MockRtcClient {
            state: self.state.clone(),
        })
    }

    fn create_stream(&self, spec: &StreamSpec) -> Arc<dyn LocalMediaStream> {
        self.state.record(format!("create_stream:{}", spec.stream_id));
        let stream = Arc::new(MockLocalStream {
            state: self.state.clone(),
            stream_id: spec.stream_id,
            playing: AtomicBool::new(false),
        });
        self.streams.lock().unwrap().push(stream.clone());
        stream
    }

    async fn get_devices(&self) -> SdkResult<Vec<SdkDeviceRecord>> {
        self.state.record("get_devices");
        self.state.check("get_devices")?;
        Ok(self.state.devices.lock().unwrap().clone())
    }
}

/// Mock client created by [`MockRtcEngine::create_client`]
pub struct MockRtcClient {
    state: Arc<MockState>,
}

#[async_trait::async_trait]
impl RtcClient for MockRtcClient {
    async fn init(&self, app_id: &str) -> SdkResult<()> {
        self.state.record(format!("init:{app_id}"));
        self.state.check("init")
    }

    async fn join(&self, _token: Option<&str>, channel: &str, uid: Uid) -> SdkResult<Uid> {
        self.state.record(format!("join:{channel}:{uid}"));
        self.state.check("join")?;
        Ok(uid)
    }

    async fn leave(&self) -> SdkResult<()> {
        self.state.record("leave");
        self.state.check("leave")
    }

    async fn publish(&self, stream: Arc<dyn LocalMediaStream>) -> SdkResult<()> {
        self.state.record(format!("publish:{}", stream.stream_id()));
        self.state.check("publish")
    }

    async fn unpublish(&self, stream: Arc<dyn LocalMediaStream>) -> SdkResult<()> {
        self.state.record(format!("unpublish:{}", stream.stream_id()));
        self.state.check("unpublish")
    }

    async fn subscribe(&self, uid: Uid) -> SdkResult<()> {
        self.state.record(format!("subscribe:{uid}"));
        self.state.check("subscribe")
    }

    async fn set_remote_video_stream_type(
        &self,
        uid: Uid,
        stream_type: RemoteStreamType,
    ) -> SdkResult<()> {
        self.state
            .record(format!("set_remote_video_stream_type:{uid}:{stream_type:?}"));
        self.state.check("set_remote_video_stream_type")
    }

    async fn enable_dual_stream(&self) -> SdkResult<()> {
        self.state.record("enable_dual_stream");
        self.state.check("enable_dual_stream")
    }

    async fn get_transport_stats(&self) -> Option<TransportStats> {
        self.state.rtt.lock().unwrap().map(|rtt_ms| TransportStats {
            rtt_ms: Some(rtt_ms),
            ..Default::default()
        })
    }

    fn events(&self) -> broadcast::Receiver<ClientSdkEvent> {
        self.state.client_tx.subscribe()
    }

    fn destroy(&self) {
        self.state.record("destroy_client");
    }
}

/// Mock stream created by [`MockRtcEngine::create_stream`]
pub struct MockLocalStream {
    state: Arc<MockState>,
    stream_id: Uid,
    playing: AtomicBool,
}

impl MockLocalStream {
    /// Script whether the stream reports local playback as active
    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl LocalMediaStream for MockLocalStream {
    fn stream_id(&self) -> Uid {
        self.stream_id
    }

    async fn init(&self) -> SdkResult<()> {
        self.state.record(format!("stream_init:{}", self.stream_id));
        self.state.check("stream_init")
    }

    async fn set_audio_output(&self, device_id: &str) -> SdkResult<()> {
        self.state.record(format!("set_audio_output:{device_id}"));
        self.state.check("set_audio_output")
    }

    async fn set_audio_volume(&self, volume: u8) -> SdkResult<()> {
        self.state.record(format!("set_audio_volume:{volume}"));
        self.state.check("set_audio_volume")
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    async fn stop(&self) -> SdkResult<()> {
        self.state.record("stream_stop");
        self.playing.store(false, Ordering::SeqCst);
        self.state.check("stream_stop")
    }

    async fn close(&self) {
        self.state.record(format!("stream_close:{}", self.stream_id));
        self.playing.store(false, Ordering::SeqCst);
    }

    fn events(&self) -> broadcast::Receiver<StreamSdkEvent> {
        self.state.stream_tx.subscribe()
    }
}
