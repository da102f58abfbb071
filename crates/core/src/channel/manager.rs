//! Real-time channel lifecycle
//!
//! A single driver task owns the link. It reacts to commands from the
//! [`ChannelManager`] handle, inbound transport events, the heartbeat
//! ticker, the idle deadline and the pending reconnect timer. Everything it
//! learns is published to the store; nothing is returned to callers.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::dispatch::dispatch_payload;
use super::heartbeat::ActivityTracker;
use super::transport::{ChannelLink, ChannelTransport, TransportEvent};
use crate::auth::Credentials;
use crate::error::{CoreError, Result};
use crate::protocol::MessageCodec;
use crate::retry::Backoff;
use crate::store::{ConnectionStatus, ConnectivityPatch, Store};
use crate::types::{now_millis, ClientFrame, PresenceStatus};

/// Upper bound for a single `open` plus handshake
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimum spacing between `last_activity_at` publications
const ACTIVITY_PUBLISH_INTERVAL: Duration = Duration::from_secs(1);

/// Channel manager runtime configuration
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub credentials: Credentials,
    /// Period of `Activity` frames while a conversation is open
    pub heartbeat_interval: Duration,
    /// Inactivity after which presence falls back to `Available`
    pub idle_timeout: Duration,
    pub reconnect_initial_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub reconnect_multiplier: f64,
    pub reconnect_jitter: bool,
    /// Give up after this many failed reconnects (None = never)
    pub max_reconnect_attempts: Option<u32>,
}

impl ChannelConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            heartbeat_interval: Duration::from_secs(15),
            idle_timeout: Duration::from_secs(120),
            reconnect_initial_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(30),
            reconnect_multiplier: 2.0,
            reconnect_jitter: true,
            max_reconnect_attempts: None,
        }
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            self.reconnect_initial_delay,
            self.reconnect_max_delay,
            self.reconnect_multiplier,
            self.reconnect_jitter,
        )
    }
}

#[derive(Debug)]
enum Command {
    Connect,
    Disconnect,
    MarkActivity,
    Send(ClientFrame),
    Close,
}

/// Handle to the channel driver task
pub struct ChannelManager {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl ChannelManager {
    /// Spawn the driver on the current runtime; starts `Disconnected`
    pub fn spawn<T: ChannelTransport>(transport: T, store: Store, config: ChannelConfig) -> Self {
        Self::spawn_with_rng(transport, store, config, StdRng::from_entropy())
    }

    /// Like [`spawn`](Self::spawn) with an explicit jitter source
    pub fn spawn_with_rng<T: ChannelTransport>(
        transport: T,
        store: Store,
        config: ChannelConfig,
        rng: StdRng,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let driver = Driver {
            backoff: config.backoff(),
            activity: ActivityTracker::new(config.idle_timeout),
            transport,
            store,
            config,
            rng,
            link: None,
            status: ConnectionStatus::Disconnected,
            attempt: 0,
            reconnect_at: None,
            heartbeat: None,
            last_activity_published: None,
        };
        let task = tokio::spawn(driver.run(rx));
        Self { commands: tx, task }
    }

    /// Open the channel; no-op while connected or connecting
    pub fn connect(&self) {
        self.command(Command::Connect);
    }

    /// Close the link and cancel any pending reconnect
    pub fn disconnect(&self) {
        self.command(Command::Disconnect);
    }

    /// Note local user activity (key press, scroll, ...)
    pub fn mark_activity(&self) {
        self.command(Command::MarkActivity);
    }

    /// Queue a frame on the live link; dropped when not connected
    pub fn send(&self, frame: ClientFrame) {
        self.command(Command::Send(frame));
    }

    /// Disconnect and wait for the driver to finish
    pub async fn close(self) {
        self.command(Command::Close);
        if let Err(e) = self.task.await {
            tracing::warn!("Channel driver ended abnormally: {}", e);
        }
    }

    fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("Channel driver already stopped");
        }
    }
}

struct Driver<T> {
    transport: T,
    store: Store,
    config: ChannelConfig,
    backoff: Backoff,
    rng: StdRng,
    link: Option<ChannelLink>,
    status: ConnectionStatus,
    /// Consecutive failures since the last successful connect
    attempt: u32,
    reconnect_at: Option<Instant>,
    heartbeat: Option<Interval>,
    activity: ActivityTracker,
    last_activity_published: Option<Instant>,
}

async fn next_event(link: &mut Option<ChannelLink>) -> Option<TransportEvent> {
    match link {
        Some(link) => link.events.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl<T: ChannelTransport> Driver<T> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let idle_deadline = self.activity.idle_deadline();
            let watch_idle = self.link.is_some() && !self.activity.is_idle();

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Connect) => self.handle_connect().await,
                    Some(Command::Disconnect) => self.disconnect().await,
                    Some(Command::MarkActivity) => self.mark_activity().await,
                    Some(Command::Send(frame)) => self.send_frame(frame).await,
                    Some(Command::Close) | None => {
                        self.disconnect().await;
                        break;
                    }
                },
                event = next_event(&mut self.link) => self.handle_event(event).await,
                _ = next_tick(&mut self.heartbeat) => self.heartbeat().await,
                _ = wait_until(self.reconnect_at) => {
                    self.reconnect_at = None;
                    self.attempt_connect().await;
                }
                _ = tokio::time::sleep_until(idle_deadline), if watch_idle => self.enter_idle().await,
            }
        }
        tracing::debug!("Channel driver stopped");
    }

    fn publish(&mut self, patch: ConnectivityPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.store.set_connectivity(patch);
    }

    async fn handle_connect(&mut self) {
        match self.status {
            ConnectionStatus::Connected | ConnectionStatus::Connecting => {
                tracing::debug!("connect() ignored while {}", self.status);
            }
            ConnectionStatus::Reconnecting => {
                tracing::info!("Reconnect requested, skipping backoff");
                self.reconnect_at = None;
                self.attempt_connect().await;
            }
            ConnectionStatus::Disconnected => {
                self.attempt = 0;
                self.attempt_connect().await;
            }
        }
    }

    async fn attempt_connect(&mut self) {
        self.publish(ConnectivityPatch::status(ConnectionStatus::Connecting));

        match self.open_link().await {
            Ok(link) => {
                if self.attempt > 0 {
                    tracing::info!("Reconnected after {} attempts", self.attempt);
                } else {
                    tracing::info!("Channel connected");
                }
                self.link = Some(link);
                self.attempt = 0;
                self.start_heartbeat();
                self.publish(
                    ConnectivityPatch::status(ConnectionStatus::Connected)
                        .with_attempt(0)
                        .with_error(None),
                );
                let presence = if self.activity.is_idle() {
                    PresenceStatus::Available
                } else {
                    PresenceStatus::Online
                };
                self.store.set_own_presence(presence);
            }
            Err(e) => {
                tracing::warn!("Channel connect failed: {}", e);
                self.schedule_reconnect(e);
            }
        }
    }

    async fn open_link(&mut self) -> Result<ChannelLink> {
        let mut link = tokio::time::timeout(CONNECT_TIMEOUT, self.transport.open())
            .await
            .map_err(|_| CoreError::Timeout(CONNECT_TIMEOUT.as_millis() as u64))??;

        let hello = MessageCodec::to_payload(&ClientFrame::hello(&self.config.credentials))?;
        if let Err(e) = link.sink.send(hello).await {
            let _ = link.sink.close().await;
            return Err(e);
        }
        Ok(link)
    }

    fn start_heartbeat(&mut self) {
        let period = self.config.heartbeat_interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.heartbeat = Some(interval);
    }

    fn schedule_reconnect(&mut self, error: CoreError) {
        self.heartbeat = None;

        if let Some(max) = self.config.max_reconnect_attempts {
            if self.attempt >= max {
                tracing::error!("Max reconnection attempts ({}) reached. Last error: {}", max, error);
                self.reconnect_at = None;
                self.attempt = 0;
                self.publish(
                    ConnectivityPatch::status(ConnectionStatus::Disconnected).with_error(Some(error.to_string())),
                );
                self.store.set_own_presence(PresenceStatus::Offline);
                return;
            }
        }

        let delay = self.backoff.delay(self.attempt, &mut self.rng);
        self.attempt += 1;
        self.reconnect_at = Some(Instant::now() + delay);
        tracing::warn!("Reconnect attempt {} in {:?} ({})", self.attempt, delay, error);
        self.publish(
            ConnectivityPatch::status(ConnectionStatus::Reconnecting)
                .with_attempt(self.attempt)
                .with_error(Some(error.to_string())),
        );
    }

    async fn link_lost(&mut self, error: CoreError) {
        if let Some(mut link) = self.link.take() {
            let _ = link.sink.close().await;
        }
        tracing::warn!("Channel link lost: {}", error);
        self.schedule_reconnect(error);
    }

    async fn handle_event(&mut self, event: Option<TransportEvent>) {
        match event {
            Some(TransportEvent::Message(payload)) => dispatch_payload(&self.store, &payload),
            Some(TransportEvent::Close) => self.link_lost(CoreError::ConnectionClosed).await,
            Some(TransportEvent::Error(e)) => self.link_lost(e).await,
            None => {
                self.link_lost(CoreError::Connection("event stream ended".into())).await;
            }
        }
    }

    async fn disconnect(&mut self) {
        self.reconnect_at = None;
        self.heartbeat = None;

        if let Some(mut link) = self.link.take() {
            match MessageCodec::to_payload(&ClientFrame::Close) {
                Ok(payload) => {
                    if let Err(e) = link.sink.send(payload).await {
                        tracing::debug!("Close frame not delivered: {}", e);
                    }
                }
                Err(e) => tracing::debug!("Failed to encode close frame: {}", e),
            }
            if let Err(e) = link.sink.close().await {
                tracing::debug!("Link close failed: {}", e);
            }
        }

        self.attempt = 0;
        if self.status != ConnectionStatus::Disconnected {
            tracing::info!("Channel disconnected");
            self.publish(ConnectivityPatch::status(ConnectionStatus::Disconnected).with_attempt(0));
            self.store.set_own_presence(PresenceStatus::Offline);
        }
    }

    async fn mark_activity(&mut self) {
        let was_idle = self.activity.record_activity();

        let now = Instant::now();
        let due = self
            .last_activity_published
            .map_or(true, |at| now.duration_since(at) >= ACTIVITY_PUBLISH_INTERVAL);
        if due || was_idle {
            self.last_activity_published = Some(now);
            self.store.set_connectivity(ConnectivityPatch {
                last_activity_at: Some(now_millis()),
                ..Default::default()
            });
        }

        if was_idle {
            tracing::info!("User active again, presence -> online");
            self.store.set_own_presence(PresenceStatus::Online);
            self.send_frame(ClientFrame::Presence {
                status: PresenceStatus::Online,
            })
            .await;
        }
    }

    async fn enter_idle(&mut self) {
        if !self.activity.check_idle(Instant::now()) {
            return;
        }
        tracing::info!("User idle for {:?}, presence -> available", self.activity.idle_for());
        self.store.set_own_presence(PresenceStatus::Available);
        self.send_frame(ClientFrame::Presence {
            status: PresenceStatus::Available,
        })
        .await;
    }

    async fn heartbeat(&mut self) {
        if self.activity.is_idle() {
            tracing::trace!("Heartbeat skipped: user idle");
            return;
        }
        let active = self.store.navigation().get().active_conversation.clone();
        match active {
            Some(conversation_id) => self.send_frame(ClientFrame::activity(conversation_id)).await,
            None => tracing::trace!("Heartbeat skipped: no open conversation"),
        }
    }

    async fn send_frame(&mut self, frame: ClientFrame) {
        let Some(link) = self.link.as_mut() else {
            tracing::debug!("Dropping {:?}: not connected", frame);
            return;
        };

        let payload = match MessageCodec::to_payload(&frame) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Failed to encode frame: {}", e);
                return;
            }
        };

        let sent = link.sink.send(payload).await;
        if let Err(e) = sent {
            self.link_lost(e).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthToken;
    use crate::channel::MockTransport;
    use crate::types::{ChatMessage, GatewayEvent};

    fn config() -> ChannelConfig {
        ChannelConfig {
            heartbeat_interval: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(60),
            reconnect_initial_delay: Duration::from_millis(100),
            reconnect_max_delay: Duration::from_secs(1),
            reconnect_multiplier: 2.0,
            reconnect_jitter: false,
            ..ChannelConfig::new(Credentials::new("alice", AuthToken::from_hex(&"ab".repeat(32)).unwrap()))
        }
    }

    fn spawn(transport: &MockTransport, store: &Store, config: ChannelConfig) -> ChannelManager {
        ChannelManager::spawn_with_rng(transport.clone(), store.clone(), config, StdRng::seed_from_u64(1))
    }

    /// Let the driver drain everything that is ready
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    fn status(store: &Store) -> ConnectionStatus {
        store.connectivity().get().status
    }

    fn activity_frames(transport: &MockTransport) -> usize {
        transport
            .sent_frames()
            .iter()
            .filter(|f| matches!(f, ClientFrame::Activity { .. }))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_sends_hello() {
        let transport = MockTransport::new();
        let store = Store::new();
        let manager = spawn(&transport, &store, config());

        manager.connect();
        settle().await;

        assert_eq!(status(&store), ConnectionStatus::Connected);
        assert_eq!(store.connectivity().get().reconnect_attempt, 0);
        assert_eq!(store.presence().get().own, PresenceStatus::Online);
        match transport.sent_frames().first() {
            Some(ClientFrame::Hello { user_id, protocol_version, .. }) => {
                assert_eq!(user_id, "alice");
                assert_eq!(*protocol_version, crate::PROTOCOL_VERSION);
            }
            other => panic!("expected hello, got {:?}", other),
        }
        manager.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_is_noop_when_connected() {
        let transport = MockTransport::new();
        let store = Store::new();
        let manager = spawn(&transport, &store, config());

        manager.connect();
        manager.connect();
        settle().await;
        manager.connect();
        settle().await;

        assert_eq!(transport.open_count(), 1);
        manager.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_remote_close() {
        let transport = MockTransport::new();
        let store = Store::new();
        let manager = spawn(&transport, &store, config());

        manager.connect();
        settle().await;
        transport.close_remote().await.unwrap();
        settle().await;

        let connectivity = store.connectivity().get();
        assert_eq!(connectivity.status, ConnectionStatus::Reconnecting);
        assert_eq!(connectivity.reconnect_attempt, 1);
        assert!(connectivity.last_error.is_some());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(status(&store), ConnectionStatus::Connected);
        assert_eq!(transport.open_count(), 2);
        let hellos = transport
            .sent_frames()
            .iter()
            .filter(|f| matches!(f, ClientFrame::Hello { .. }))
            .count();
        assert_eq!(hellos, 2);
        manager.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_transport_error() {
        let transport = MockTransport::new();
        let store = Store::new();
        let manager = spawn(&transport, &store, config());

        manager.connect();
        settle().await;
        transport
            .inject(TransportEvent::Error(CoreError::ConnectionReset("peer reset".into())))
            .await
            .unwrap();
        settle().await;

        let connectivity = store.connectivity().get();
        assert_eq!(connectivity.status, ConnectionStatus::Reconnecting);
        assert!(connectivity.last_error.as_deref().unwrap().contains("peer reset"));
        assert_eq!(transport.closed_links(), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(status(&store), ConnectionStatus::Connected);
        assert_eq!(transport.open_count(), 2);
        manager.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_when_event_stream_ends() {
        let transport = MockTransport::new();
        let store = Store::new();
        let manager = spawn(&transport, &store, config());

        manager.connect();
        settle().await;
        transport.drop_link();
        settle().await;

        assert_eq!(status(&store), ConnectionStatus::Reconnecting);
        assert_eq!(store.connectivity().get().reconnect_attempt, 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(status(&store), ConnectionStatus::Connected);
        assert_eq!(transport.open_count(), 2);
        manager.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_grows_between_failed_attempts() {
        let transport = MockTransport::new();
        transport.fail_next_opens(3, || CoreError::ConnectionRefused("ECONNREFUSED".into()));
        let store = Store::new();
        let manager = spawn(&transport, &store, config());

        manager.connect();
        settle().await;
        assert_eq!(store.connectivity().get().reconnect_attempt, 1);

        // Failures at 0ms, 100ms, 300ms; success at 700ms
        tokio::time::sleep(Duration::from_millis(689)).await;
        let connectivity = store.connectivity().get();
        assert_eq!(connectivity.status, ConnectionStatus::Reconnecting);
        assert_eq!(connectivity.reconnect_attempt, 3);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let connectivity = store.connectivity().get();
        assert_eq!(connectivity.status, ConnectionStatus::Connected);
        assert_eq!(connectivity.reconnect_attempt, 0);
        assert!(connectivity.last_error.is_none());
        assert_eq!(transport.open_count(), 4);
        manager.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_cap_settles_disconnected() {
        let transport = MockTransport::new();
        transport.fail_next_opens(10, || CoreError::ConnectionRefused("ECONNREFUSED".into()));
        let store = Store::new();
        let manager = spawn(
            &transport,
            &store,
            ChannelConfig {
                max_reconnect_attempts: Some(2),
                ..config()
            },
        );

        manager.connect();
        tokio::time::sleep(Duration::from_secs(5)).await;

        let connectivity = store.connectivity().get();
        assert_eq!(connectivity.status, ConnectionStatus::Disconnected);
        assert!(connectivity.last_error.as_deref().unwrap().contains("ECONNREFUSED"));
        assert_eq!(transport.open_count(), 3);
        manager.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_cap_after_drop_goes_offline() {
        let transport = MockTransport::new();
        let store = Store::new();
        let manager = spawn(
            &transport,
            &store,
            ChannelConfig {
                max_reconnect_attempts: Some(1),
                ..config()
            },
        );

        manager.connect();
        settle().await;
        assert_eq!(store.presence().get().own, PresenceStatus::Online);

        transport.fail_next_opens(10, || CoreError::ConnectionRefused("ECONNREFUSED".into()));
        transport.close_remote().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(status(&store), ConnectionStatus::Disconnected);
        assert_eq!(store.presence().get().own, PresenceStatus::Offline);
        assert_eq!(transport.open_count(), 2);
        manager.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_reconnect() {
        let transport = MockTransport::new();
        transport.fail_next_opens(1, || CoreError::Timeout(10));
        let store = Store::new();
        let manager = spawn(&transport, &store, config());

        manager.connect();
        settle().await;
        assert_eq!(status(&store), ConnectionStatus::Reconnecting);

        manager.disconnect();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(status(&store), ConnectionStatus::Disconnected);
        assert_eq!(transport.open_count(), 1);
        manager.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_sends_close_frame() {
        let transport = MockTransport::new();
        let store = Store::new();
        let manager = spawn(&transport, &store, config());

        manager.connect();
        settle().await;
        transport.clear_sent();

        manager.disconnect();
        settle().await;
        assert_eq!(transport.sent_frames(), vec![ClientFrame::Close]);
        assert_eq!(transport.closed_links(), 1);
        assert_eq!(status(&store), ConnectionStatus::Disconnected);
        assert_eq!(store.presence().get().own, PresenceStatus::Offline);

        // No reconnect follows an explicit disconnect
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(transport.open_count(), 1);
        manager.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_while_reconnecting_skips_backoff() {
        let transport = MockTransport::new();
        transport.fail_next_opens(1, || CoreError::ConnectionReset("reset".into()));
        let store = Store::new();
        let manager = spawn(
            &transport,
            &store,
            ChannelConfig {
                reconnect_initial_delay: Duration::from_secs(10),
                reconnect_max_delay: Duration::from_secs(30),
                ..config()
            },
        );

        let start = Instant::now();
        manager.connect();
        settle().await;
        assert_eq!(status(&store), ConnectionStatus::Reconnecting);

        manager.connect();
        settle().await;
        assert_eq!(status(&store), ConnectionStatus::Connected);
        assert_eq!(transport.open_count(), 2);
        assert!(start.elapsed() < Duration::from_secs(1));
        manager.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_only_with_open_conversation() {
        let transport = MockTransport::new();
        let store = Store::new();
        let manager = spawn(&transport, &store, config());

        manager.connect();
        settle().await;
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(activity_frames(&transport), 0);

        store.open_conversation("c1");
        tokio::time::sleep(Duration::from_secs(2)).await;
        let frames = transport.sent_frames();
        let activity: Vec<_> = frames
            .iter()
            .filter(|f| matches!(f, ClientFrame::Activity { .. }))
            .collect();
        assert_eq!(activity.len(), 2);
        assert!(activity.iter().all(|f| **f == ClientFrame::activity("c1")));
        manager.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_fallback_and_return() {
        let transport = MockTransport::new();
        let store = Store::new();
        let manager = spawn(
            &transport,
            &store,
            ChannelConfig {
                idle_timeout: Duration::from_secs(5),
                ..config()
            },
        );

        store.open_conversation("c1");
        manager.connect();
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(store.presence().get().own, PresenceStatus::Available);
        assert!(transport.sent_frames().contains(&ClientFrame::Presence {
            status: PresenceStatus::Available
        }));

        transport.clear_sent();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(activity_frames(&transport), 0);

        manager.mark_activity();
        settle().await;
        assert_eq!(store.presence().get().own, PresenceStatus::Online);
        assert!(transport.sent_frames().contains(&ClientFrame::Presence {
            status: PresenceStatus::Online
        }));
        assert!(store.connectivity().get().last_activity_at.is_some());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(activity_frames(&transport) >= 1);
        manager.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_inbound_events_reach_store() {
        let transport = MockTransport::new();
        let store = Store::new();
        let manager = spawn(&transport, &store, config());

        manager.connect();
        settle().await;
        transport
            .inject_message(&GatewayEvent::MessageCreated {
                message: ChatMessage {
                    id: "m1".into(),
                    conversation_id: "c9".into(),
                    sender: "bob".into(),
                    body: "ping".into(),
                    timestamp: 3,
                },
            })
            .await
            .unwrap();
        transport
            .inject(TransportEvent::Message(bytes::Bytes::from_static(b"garbage")))
            .await
            .unwrap();
        settle().await;

        assert_eq!(store.conversations().get().messages_for("c9").len(), 1);
        assert_eq!(status(&store), ConnectionStatus::Connected);
        manager.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_triggers_reconnect() {
        let transport = MockTransport::new();
        let store = Store::new();
        let manager = spawn(&transport, &store, config());

        manager.connect();
        settle().await;
        transport.fail_sends(true);
        manager.send(ClientFrame::ping());
        settle().await;
        assert_eq!(status(&store), ConnectionStatus::Reconnecting);

        transport.fail_sends(false);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(status(&store), ConnectionStatus::Connected);
        manager.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_when_disconnected_is_dropped() {
        let transport = MockTransport::new();
        let store = Store::new();
        let manager = spawn(&transport, &store, config());

        manager.send(ClientFrame::ping());
        settle().await;
        assert!(transport.sent_payloads().is_empty());
        manager.close().await;
        assert_eq!(status(&store), ConnectionStatus::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_jittered_reconnect_delay_is_capped() {
        let transport = MockTransport::new();
        transport.fail_next_opens(6, || CoreError::ConnectionRefused("refused".into()));
        let store = Store::new();
        let manager = spawn(
            &transport,
            &store,
            ChannelConfig {
                reconnect_jitter: true,
                ..config()
            },
        );

        manager.connect();
        // Six failures with delays of at most 100+200+400+800+1000+1000 ms
        tokio::time::sleep(Duration::from_millis(3600)).await;
        assert_eq!(status(&store), ConnectionStatus::Connected);
        assert_eq!(transport.open_count(), 7);
        manager.close().await;
    }
}
