//! Realtime channel
//!
//! One long-lived task owns the connection. The [`RealtimeChannel`] handle
//! talks to it through a command queue (`emit`, `disconnect`) and a shared
//! [`HandlerRegistry`] (`on`, `off`). Connection lifecycle changes are
//! reported as [`ChannelEvent`]s on a separate queue so the app can refetch
//! state and rejoin rooms after an outage.
//!
//! Reconnection follows [`ReconnectionStrategy`]: bounded attempts with a
//! fixed delay, reset after every successful connect. Events emitted
//! while the connection is down are dropped; nothing is queued offline.

use super::{
    connection_url, Envelope, EventKind, EventSender, HandlerId, HandlerRegistry, IncomingEvent,
    OutgoingEvent, Transport, TransportFactory,
};
use crate::recovery::{ReconnectionStrategy, CONNECT_TIMEOUT, MAX_RECONNECT_ATTEMPTS, RECONNECT_DELAY};
use crate::{ChatError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// Realtime connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// WebSocket base URL of the chat service
    pub url: String,
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:5002".to_string(),
            reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            reconnect_delay: RECONNECT_DELAY,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

/// Connection lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// First successful connection
    Connected,
    /// Connection restored after an outage
    Reconnected,
    /// Connection lost; reconnection is being attempted
    Disconnected { reason: String },
    /// Reconnection attempts exhausted; the channel is closed
    GaveUp,
}

enum Command {
    Emit(OutgoingEvent),
    Close,
}

/// Handle to the realtime connection task
pub struct RealtimeChannel {
    commands: mpsc::UnboundedSender<Command>,
    handlers: Arc<RwLock<HandlerRegistry>>,
    connected: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl RealtimeChannel {
    /// Open a channel for `user_id` over transports made by `factory`
    ///
    /// Returns immediately; the connection is established in the background
    /// and reported on the returned lifecycle queue. Must be called from
    /// within a Tokio runtime.
    pub fn connect(
        config: RealtimeConfig,
        user_id: &str,
        factory: Arc<dyn TransportFactory>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ChannelEvent>)> {
        let url = connection_url(&config.url, user_id)?;
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (lifecycle_tx, lifecycle_rx) = mpsc::unbounded_channel();
        let handlers = Arc::new(RwLock::new(HandlerRegistry::new()));
        let connected = Arc::new(AtomicBool::new(false));

        let worker = ConnectionWorker {
            url,
            strategy: ReconnectionStrategy::new(config.reconnect_attempts, config.reconnect_delay),
            connect_timeout: config.connect_timeout,
            factory,
            commands: command_rx,
            handlers: handlers.clone(),
            connected: connected.clone(),
            lifecycle: lifecycle_tx,
        };

        info!("Opening realtime channel for user {}", user_id);
        let task = tokio::spawn(worker.run());

        Ok((
            Self {
                commands: command_tx,
                handlers,
                connected,
                task,
            },
            lifecycle_rx,
        ))
    }

    /// Queue an event for sending
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ChannelClosed`] once the channel has shut down.
    pub fn emit(&self, event: OutgoingEvent) -> Result<()> {
        self.commands
            .send(Command::Emit(event))
            .map_err(|_| ChatError::ChannelClosed)
    }

    /// Register a handler for incoming events of `kind`
    pub async fn on(&self, kind: EventKind, sender: EventSender) -> HandlerId {
        self.handlers.write().await.on(kind, sender)
    }

    /// Deregister a handler
    pub async fn off(&self, id: HandlerId) -> bool {
        self.handlers.write().await.off(id)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Close the connection and wait for the task to finish
    pub async fn disconnect(self) -> Result<()> {
        // The task may already be gone after giving up
        let _ = self.commands.send(Command::Close);
        self.task
            .await
            .map_err(|e| ChatError::WebSocket(format!("realtime task failed: {}", e)))
    }
}

enum Step {
    Command(Option<Command>),
    Received(Result<Option<Envelope>>),
}

enum SessionEnd {
    Closed,
    Lost(String),
}

struct ConnectionWorker {
    url: String,
    strategy: ReconnectionStrategy,
    connect_timeout: Duration,
    factory: Arc<dyn TransportFactory>,
    commands: mpsc::UnboundedReceiver<Command>,
    handlers: Arc<RwLock<HandlerRegistry>>,
    connected: Arc<AtomicBool>,
    lifecycle: mpsc::UnboundedSender<ChannelEvent>,
}

impl ConnectionWorker {
    async fn run(mut self) {
        let mut ever_connected = false;

        loop {
            match self.open().await {
                Ok(transport) => {
                    self.strategy.reset();
                    self.connected.store(true, Ordering::Relaxed);

                    if ever_connected {
                        info!("Realtime channel reconnected");
                        self.notify(ChannelEvent::Reconnected);
                    } else {
                        info!("Realtime channel connected");
                        self.notify(ChannelEvent::Connected);
                    }
                    ever_connected = true;

                    let end = self.serve(transport).await;
                    self.connected.store(false, Ordering::Relaxed);

                    match end {
                        SessionEnd::Closed => {
                            info!("Realtime channel closed");
                            return;
                        }
                        SessionEnd::Lost(reason) => {
                            warn!("Realtime connection lost: {}", reason);
                            self.notify(ChannelEvent::Disconnected { reason });
                        }
                    }
                }
                Err(e) => {
                    warn!("Realtime connect failed: {}", e);
                }
            }

            let Some(delay) = self.strategy.next_delay() else {
                error!("Giving up on realtime channel ({})", self.strategy.status());
                self.notify(ChannelEvent::GaveUp);
                return;
            };

            debug!("Reconnecting in {:?} ({})", delay, self.strategy.status());
            if !self.wait(delay).await {
                info!("Realtime channel closed while reconnecting");
                return;
            }
        }
    }

    async fn open(&self) -> Result<Box<dyn Transport>> {
        tokio::time::timeout(self.connect_timeout, self.factory.connect(&self.url))
            .await
            .map_err(|_| {
                ChatError::Timeout(format!(
                    "realtime connect did not complete within {:?}",
                    self.connect_timeout
                ))
            })?
    }

    /// Sleep between attempts; returns false if the channel was closed meanwhile
    async fn wait(&mut self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;

        loop {
            tokio::select! {
                _ = sleep_until(deadline) => return true,
                command = self.commands.recv() => match command {
                    Some(Command::Emit(event)) => {
                        debug!("Dropping {} while disconnected", event.name());
                    }
                    Some(Command::Close) | None => return false,
                },
            }
        }
    }

    /// Pump one connection until it is closed or lost
    async fn serve(&mut self, mut transport: Box<dyn Transport>) -> SessionEnd {
        loop {
            let step = tokio::select! {
                command = self.commands.recv() => Step::Command(command),
                received = transport.receive_event() => Step::Received(received),
            };

            match step {
                Step::Command(Some(Command::Emit(event))) => {
                    if let Err(e) = Self::send(transport.as_mut(), &event).await {
                        if matches!(e, ChatError::Json(_)) {
                            warn!("Could not encode {}: {}", event.name(), e);
                            continue;
                        }
                        return SessionEnd::Lost(e.to_string());
                    }
                }
                Step::Command(Some(Command::Close)) | Step::Command(None) => {
                    if let Err(e) = transport.close().await {
                        debug!("Error closing realtime transport: {}", e);
                    }
                    return SessionEnd::Closed;
                }
                Step::Received(Ok(Some(envelope))) => self.route(&envelope).await,
                Step::Received(Ok(None)) => {
                    return SessionEnd::Lost("connection closed by server".to_string());
                }
                Step::Received(Err(ChatError::InvalidEvent(msg))) => {
                    warn!("Ignoring malformed realtime frame: {}", msg);
                }
                Step::Received(Err(e)) => return SessionEnd::Lost(e.to_string()),
            }
        }
    }

    async fn send(transport: &mut dyn Transport, event: &OutgoingEvent) -> Result<()> {
        let envelope = event.to_envelope()?;
        debug!("Emitting {}", envelope.event);
        transport.send_event(&envelope).await
    }

    async fn route(&self, envelope: &Envelope) {
        match IncomingEvent::from_envelope(envelope) {
            Ok(Some(event)) => {
                let delivered = self.handlers.write().await.dispatch(&event);
                debug!("Routed {} to {} handler(s)", envelope.event, delivered);
            }
            Ok(None) => debug!("Ignoring unknown realtime event {}", envelope.event),
            Err(e) => warn!("Dropping realtime event {}: {}", envelope.event, e),
        }
    }

    fn notify(&self, event: ChannelEvent) {
        // The app may have stopped listening during shutdown
        let _ = self.lifecycle.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::TypingUpdate;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::timeout;

    #[derive(Debug)]
    struct MemoryTransport {
        inbound: mpsc::UnboundedReceiver<String>,
        outbound: mpsc::UnboundedSender<Envelope>,
    }

    struct ServerSide {
        to_client: mpsc::UnboundedSender<String>,
        from_client: mpsc::UnboundedReceiver<Envelope>,
    }

    fn memory_pair() -> (MemoryTransport, ServerSide) {
        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        (
            MemoryTransport { inbound, outbound },
            ServerSide {
                to_client,
                from_client,
            },
        )
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send_event(&mut self, envelope: &Envelope) -> Result<()> {
            self.outbound
                .send(envelope.clone())
                .map_err(|_| ChatError::ChannelClosed)
        }

        async fn receive_event(&mut self) -> Result<Option<Envelope>> {
            match self.inbound.recv().await {
                Some(text) => Envelope::from_text(&text).map(Some),
                None => Ok(None),
            }
        }

        async fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct MemoryFactory {
        transports: Mutex<VecDeque<MemoryTransport>>,
        urls: Mutex<Vec<String>>,
    }

    impl MemoryFactory {
        fn with(transports: Vec<MemoryTransport>) -> Arc<Self> {
            Arc::new(Self {
                transports: Mutex::new(transports.into()),
                urls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TransportFactory for MemoryFactory {
        async fn connect(&self, url: &str) -> Result<Box<dyn Transport>> {
            self.urls.lock().unwrap().push(url.to_string());
            match self.transports.lock().unwrap().pop_front() {
                Some(transport) => Ok(Box::new(transport)),
                None => Err(ChatError::NetworkError("connection refused".to_string())),
            }
        }
    }

    fn test_config() -> RealtimeConfig {
        RealtimeConfig {
            url: "ws://localhost:5002".to_string(),
            reconnect_attempts: 2,
            reconnect_delay: Duration::from_millis(10),
            connect_timeout: Duration::from_secs(1),
        }
    }

    async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for channel")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_emit_and_dispatch() {
        let (transport, mut server) = memory_pair();
        let factory = MemoryFactory::with(vec![transport]);
        let (channel, mut lifecycle) =
            RealtimeChannel::connect(test_config(), "u1", factory.clone()).unwrap();

        assert_eq!(next(&mut lifecycle).await, ChannelEvent::Connected);
        assert!(channel.is_connected());
        assert_eq!(
            factory.urls.lock().unwrap().as_slice(),
            ["ws://localhost:5002/?userId=u1".to_string()]
        );

        let (typing_tx, mut typing_rx) = mpsc::unbounded_channel();
        let handler = channel.on(EventKind::UserTyping, typing_tx).await;

        channel
            .emit(OutgoingEvent::JoinChat {
                chat_id: "c1".to_string(),
            })
            .unwrap();
        let sent = next(&mut server.from_client).await;
        assert_eq!(sent.event, "joinChat");
        assert_eq!(sent.data, json!({"chatId": "c1"}));

        server
            .to_client
            .send(r#"{"event":"userTyping","data":{"chatId":"c1","userId":"u2"}}"#.to_string())
            .unwrap();
        assert_eq!(
            next(&mut typing_rx).await,
            IncomingEvent::UserTyping(TypingUpdate {
                chat_id: "c1".to_string(),
                user_id: "u2".to_string(),
            })
        );

        assert!(channel.off(handler).await);
        channel.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_frames_do_not_drop_connection() {
        let (transport, server) = memory_pair();
        let factory = MemoryFactory::with(vec![transport]);
        let (channel, mut lifecycle) =
            RealtimeChannel::connect(test_config(), "u1", factory).unwrap();
        assert_eq!(next(&mut lifecycle).await, ChannelEvent::Connected);

        let (presence_tx, mut presence_rx) = mpsc::unbounded_channel();
        channel.on(EventKind::OnlineUsers, presence_tx).await;

        for frame in [
            "garbage",
            r#"{"event":"serverHello","data":{}}"#,
            r#"{"event":"getOnlineUser","data":"u1"}"#,
            r#"{"event":"getOnlineUser","data":["u1","u2"]}"#,
        ] {
            server.to_client.send(frame.to_string()).unwrap();
        }

        assert_eq!(
            next(&mut presence_rx).await,
            IncomingEvent::OnlineUsers(vec!["u1".to_string(), "u2".to_string()])
        );
        assert!(channel.is_connected());
        channel.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_reconnects_after_server_drop() {
        let (first, first_server) = memory_pair();
        let (second, mut second_server) = memory_pair();
        let factory = MemoryFactory::with(vec![first, second]);
        let (channel, mut lifecycle) =
            RealtimeChannel::connect(test_config(), "u1", factory).unwrap();

        assert_eq!(next(&mut lifecycle).await, ChannelEvent::Connected);

        drop(first_server);
        assert!(matches!(
            next(&mut lifecycle).await,
            ChannelEvent::Disconnected { .. }
        ));
        assert_eq!(next(&mut lifecycle).await, ChannelEvent::Reconnected);

        channel
            .emit(OutgoingEvent::LeaveChat {
                chat_id: "c1".to_string(),
            })
            .unwrap();
        assert_eq!(next(&mut second_server.from_client).await.event, "leaveChat");

        channel.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_gives_up_after_bounded_attempts() {
        let factory = MemoryFactory::with(Vec::new());
        let (channel, mut lifecycle) =
            RealtimeChannel::connect(test_config(), "u1", factory.clone()).unwrap();

        assert_eq!(next(&mut lifecycle).await, ChannelEvent::GaveUp);
        // Lifecycle queue closes once the worker has exited
        assert_eq!(lifecycle.recv().await, None);

        // Initial attempt plus two retries
        assert_eq!(factory.urls.lock().unwrap().len(), 3);
        assert!(!channel.is_connected());
        assert!(matches!(
            channel.emit(OutgoingEvent::JoinChat {
                chat_id: "c1".to_string()
            }),
            Err(ChatError::ChannelClosed)
        ));
        channel.disconnect().await.unwrap();
    }
}
