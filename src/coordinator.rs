//! Call coordinator - compound operations over one or two sessions
//!
//! [`CallCoordinator`] owns the primary camera/microphone
//! [`StreamSession`] and, while screen sharing, a secondary session bound
//! to a reserved stream identifier. It sequences the multi-step operations
//! (join+publish, leave+teardown, start/stop screen share) and re-emits
//! both sessions' events on a coordinator-level bus, tagged with the
//! originating [`SessionRole`].
//!
//! The coordinator provides no internal mutual exclusion beyond its
//! `joined`/`published`/`shared` idempotency flags; callers must not run
//! overlapping compound operations against the same coordinator.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::config::AdapterConfig;
use crate::error::{AdapterError, AdapterResult};
use crate::events::{CoordinatorEvent, EventBus, SessionEvent};
use crate::sdk::{LocalMediaStream, RtcEngine};
use crate::session::StreamSession;
use crate::types::{MediaDeviceInfo, SessionRole, StreamSpec, Uid};

/// Coordinates the primary session and an optional screen-share session
pub struct CallCoordinator {
    engine: Arc<dyn RtcEngine>,
    config: AdapterConfig,
    bus: EventBus<CoordinatorEvent>,
    primary: StreamSession,
    screen: Option<StreamSession>,
    primary_relay: JoinHandle<()>,
    screen_relay: Option<JoinHandle<()>>,
    local_uid: Uid,
    channel_name: String,
    joined: bool,
    published: bool,
    shared: bool,
}

impl CallCoordinator {
    /// Create a coordinator with a fresh primary session
    pub fn new(engine: Arc<dyn RtcEngine>, config: AdapterConfig) -> Self {
        let bus: EventBus<CoordinatorEvent> = EventBus::default();
        let primary = StreamSession::new(engine.clone(), config.clone());
        let primary_relay = spawn_relay(primary.subscribe(), bus.clone(), SessionRole::Primary);
        Self {
            engine,
            config,
            bus,
            primary,
            screen: None,
            primary_relay,
            screen_relay: None,
            local_uid: 0,
            channel_name: String::new(),
            joined: false,
            published: false,
            shared: false,
        }
    }

    /// Subscribe to the coordinator's event bus
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<CoordinatorEvent> {
        self.bus.subscribe()
    }

    /// Whether the primary session is joined to a channel
    pub fn is_joined(&self) -> bool {
        self.joined
    }

    /// Whether the primary local stream is published
    pub fn is_published(&self) -> bool {
        self.published
    }

    /// Whether a screen-share session is live
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// The uid recorded at the last join
    pub fn local_uid(&self) -> Uid {
        self.local_uid
    }

    /// The channel recorded at the last join
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// The primary session, for per-session pass-throughs (remote stream
    /// subscription, stream-type selection, audio routing)
    pub fn primary(&self) -> &StreamSession {
        &self.primary
    }

    /// Mutable access to the primary session
    pub fn primary_mut(&mut self) -> &mut StreamSession {
        &mut self.primary
    }

    /// Enumerate media devices through a throwaway client
    ///
    /// Two-phase protocol: a client is created and initialized purely to
    /// trigger the permission prompt and make device labels readable, the
    /// list is taken, and after `device_release_grace` the client is torn
    /// down so the host environment releases the device handle.
    pub async fn enumerate_devices(&self) -> AdapterResult<Vec<MediaDeviceInfo>> {
        let client = self.engine.create_client();
        if let Err(error) = client.init(&self.config.app_id).await {
            client.destroy();
            return Err(AdapterError::init_failed(error));
        }

        let result = self.engine.get_devices().await;

        tokio::time::sleep(self.config.device_release_grace).await;
        client.destroy();

        let records = result?;
        Ok(records
            .iter()
            .filter_map(MediaDeviceInfo::from_record)
            .collect())
    }

    /// Connect the primary session and join the channel
    ///
    /// Round-trip-time monitoring is enabled on the primary session.
    /// Dual-stream mode is requested after the join when asked for.
    pub async fn join_channel(
        &mut self,
        uid: Uid,
        channel: &str,
        enable_dual_stream: bool,
    ) -> AdapterResult<()> {
        self.local_uid = uid;
        self.channel_name = channel.to_string();

        self.primary.connect(&self.config.app_id, true).await?;
        self.primary.join_channel(uid, channel).await?;
        if enable_dual_stream {
            self.primary.enable_dual_stream().await?;
        }

        self.joined = true;
        tracing::info!(uid, channel, "joined call channel");
        Ok(())
    }

    /// Leave the channel and fully tear the primary session down
    ///
    /// Strict order: unpublish (idempotent), leave, then client teardown,
    /// so no stale engine subscriptions survive. Safe to call repeatedly.
    pub async fn leave_channel(&mut self) -> AdapterResult<()> {
        self.primary.unpublish().await?;
        self.published = false;

        self.primary.shutdown(true).await?;
        self.joined = false;
        tracing::info!(channel = %self.channel_name, "left call channel");
        Ok(())
    }

    /// Create and publish the primary local stream
    ///
    /// Publishing is not additive: when a stream is already published it is
    /// fully unpublished first, then the new stream is created and
    /// published.
    pub async fn publish_local_stream(&mut self, spec: &StreamSpec) -> AdapterResult<()> {
        if self.published {
            self.primary.unpublish().await?;
            self.published = false;
        }

        self.primary.create_local_stream(spec).await?;
        self.primary.publish().await?;
        self.published = true;
        Ok(())
    }

    /// Withdraw the primary local stream
    pub async fn unpublish_local_stream(&mut self) -> AdapterResult<()> {
        self.primary.unpublish().await?;
        self.published = false;
        Ok(())
    }

    /// Start screen sharing through a secondary session
    ///
    /// The secondary session joins the same channel under the reserved
    /// `screen_share_uid` so the engine can tell the two streams apart.
    /// Sequence: create stream, connect, join, publish. No-op when already
    /// sharing.
    pub async fn start_screen_share(&mut self) -> AdapterResult<()> {
        if self.shared {
            tracing::debug!("screen share already active, skipping");
            return Ok(());
        }
        if !self.joined {
            return Err(AdapterError::invalid_state(
                "screen share requires a joined channel",
            ));
        }

        let share_uid = self.config.screen_share_uid;
        let mut session = StreamSession::new(self.engine.clone(), self.config.clone());

        if let Err(error) = self.bring_up_screen_session(&mut session).await {
            // Release whatever came up before the failure: the capture
            // stream holds a device handle and the client holds native
            // resources until the session tears them down.
            if session.is_joined() {
                if let Err(leave_error) = session.leave_channel().await {
                    tracing::warn!(%leave_error, "screen share rollback leave failed");
                }
            }
            if let Err(shutdown_error) = session.shutdown(false).await {
                tracing::warn!(%shutdown_error, "screen share rollback shutdown failed");
            }
            return Err(error);
        }

        if let Some(handle) = self.screen_relay.take() {
            handle.abort();
        }
        self.screen_relay = Some(spawn_relay(
            session.subscribe(),
            self.bus.clone(),
            SessionRole::ScreenShare,
        ));

        self.screen = Some(session);
        self.shared = true;
        tracing::info!(share_uid, channel = %self.channel_name, "screen share started");
        Ok(())
    }

    /// Run the screen-share startup sequence: create stream, connect,
    /// join, publish
    async fn bring_up_screen_session(&self, session: &mut StreamSession) -> AdapterResult<()> {
        let share_uid = self.config.screen_share_uid;
        session
            .create_local_stream(&StreamSpec::screen(share_uid))
            .await?;
        session.connect(&self.config.app_id, false).await?;
        session.join_channel(share_uid, &self.channel_name).await?;
        session.publish().await?;
        Ok(())
    }

    /// Stop screen sharing and tear the secondary session down
    ///
    /// `shared` is cleared unconditionally so a teardown failure can never
    /// leave the coordinator claiming an active share. Teardown runs every
    /// step (unpublish, leave, shutdown) even when an earlier one fails;
    /// the first failure is returned after the session is gone.
    pub async fn stop_screen_share(&mut self) -> AdapterResult<()> {
        self.shared = false;
        if let Some(handle) = self.screen_relay.take() {
            handle.abort();
        }
        let Some(mut session) = self.screen.take() else {
            return Ok(());
        };

        let mut first_error: Option<AdapterError> = None;

        if let Err(error) = session.unpublish().await {
            tracing::warn!(%error, "screen share unpublish failed");
            first_error.get_or_insert(error);
        }
        if session.is_joined() {
            if let Err(error) = session.leave_channel().await {
                tracing::warn!(%error, "screen share leave failed");
                first_error.get_or_insert(error);
            }
        }
        if let Err(error) = session.shutdown(false).await {
            tracing::warn!(%error, "screen share shutdown failed");
            first_error.get_or_insert(error);
        }
        drop(session);

        tracing::info!("screen share stopped");
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Leave everything: the primary channel, and the screen-share session
    /// if one is live
    ///
    /// Tolerates the secondary session being partially or fully absent;
    /// secondary teardown failures are logged, not surfaced.
    pub async fn exit(&mut self) -> AdapterResult<()> {
        self.leave_channel().await?;

        if self.shared || self.screen.is_some() {
            if let Err(error) = self.stop_screen_share().await {
                tracing::warn!(%error, "screen share teardown during exit failed");
            }
        }
        Ok(())
    }

    /// Create a standalone local stream for camera/microphone preview
    ///
    /// The stream joins no channel; the caller owns it and is responsible
    /// for closing it when the preview ends.
    pub async fn create_preview_stream(
        &self,
        camera_id: Option<String>,
        microphone_id: Option<String>,
    ) -> AdapterResult<Arc<dyn LocalMediaStream>> {
        let mut spec = StreamSpec::camera(0);
        if let Some(camera) = camera_id {
            spec = spec.with_camera_device(camera);
        }
        if let Some(microphone) = microphone_id {
            spec = spec.with_microphone_device(microphone);
        }

        let stream = self.engine.create_stream(&spec);
        stream
            .init()
            .await
            .map_err(AdapterError::stream_init_failed)?;
        Ok(stream)
    }
}

impl Drop for CallCoordinator {
    fn drop(&mut self) {
        self.primary_relay.abort();
        if let Some(handle) = self.screen_relay.take() {
            handle.abort();
        }
    }
}

/// Forward one session's events onto the coordinator bus, tagged with the
/// session's role
fn spawn_relay(
    mut rx: tokio::sync::broadcast::Receiver<SessionEvent>,
    bus: EventBus<CoordinatorEvent>,
    role: SessionRole,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => bus.emit(CoordinatorEvent {
                    role,
                    event,
                    timestamp: Utc::now(),
                }),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(%role, missed, "coordinator relay lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
