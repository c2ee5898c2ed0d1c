#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use backoff::backoff::{Backoff as _, Constant};
use futures::StreamExt as _;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

use super::config::Config;
use super::error::WsError;
use super::traits::MessageParser;
use crate::error::Kind;
use crate::{Result, error::Error};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Broadcast channel capacity for incoming messages.
const BROADCAST_CAPACITY: usize = 1024;

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected, either never started, stopped, or waiting to reconnect
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Handshake completed
    Open {
        /// When the connection was established
        since: Instant,
    },
}

impl ConnectionState {
    /// Check if the connection is currently open.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

/// Handle to the spawned connection loop.
struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Manages the WebSocket connection lifecycle and reconnection.
///
/// The manager is an explicit instance rather than process-wide state: callers hold
/// it (or a clone of it) and drive it with [`start`](Self::start) and
/// [`stop`](Self::stop). Exactly one connection loop runs per manager, so a pending
/// reconnect can never race a second live connection.
///
/// The channel is receive-only: nothing is ever written to the socket. Text frames
/// are handed to the parser and every parsed message is broadcast, in arrival order,
/// to all subscribers.
///
/// # Type Parameters
///
/// - `M`: Message type broadcast to subscribers
/// - `P`: Parser type that implements [`MessageParser<M>`]
///
/// # Example
///
/// ```ignore
/// let connection = ConnectionManager::new(
///     "wss://example.com/clrsocket".to_owned(),
///     Config::default(),
///     EnvelopeParser,
/// );
///
/// let mut rx = connection.subscribe();
/// connection.start()?;
/// while let Ok(msg) = rx.recv().await {
///     println!("Received: {msg:?}");
/// }
/// ```
pub struct ConnectionManager<M, P>
where
    M: Debug + Clone + Send + 'static,
    P: MessageParser<M>,
{
    /// Endpoint the loop connects to
    endpoint: String,
    /// Reconnection settings
    config: Config,
    /// Parser shared with the connection loop
    parser: Arc<P>,
    /// Watch channel sender for state changes (enables reconnection detection)
    state_tx: watch::Sender<ConnectionState>,
    /// Watch channel receiver for state changes (for use in checking the current state)
    state_rx: watch::Receiver<ConnectionState>,
    /// Broadcast sender for incoming messages
    broadcast_tx: broadcast::Sender<M>,
    /// The running connection loop, if any
    running: Arc<Mutex<Option<Running>>>,
}

impl<M, P> Clone for ConnectionManager<M, P>
where
    M: Debug + Clone + Send + 'static,
    P: MessageParser<M>,
{
    fn clone(&self) -> Self {
        Self {
            endpoint: self.endpoint.clone(),
            config: self.config.clone(),
            parser: Arc::clone(&self.parser),
            state_tx: self.state_tx.clone(),
            state_rx: self.state_rx.clone(),
            broadcast_tx: self.broadcast_tx.clone(),
            running: Arc::clone(&self.running),
        }
    }
}

impl<M, P> ConnectionManager<M, P>
where
    M: Debug + Clone + Send + 'static,
    P: MessageParser<M>,
{
    /// Create a new connection manager. No connection is made until [`start`](Self::start).
    #[must_use]
    pub fn new(endpoint: String, config: Config, parser: P) -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        Self {
            endpoint,
            config,
            parser: Arc::new(parser),
            state_tx,
            state_rx,
            broadcast_tx,
            running: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the connection loop in a background task.
    ///
    /// Calling this while the loop is already running is a no-op. Must be called from
    /// within a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::validation(format!("a Tokio runtime is required: {e}")))?;

        // The slot holds no invariant beyond "Some while a loop was spawned", so a
        // poisoned lock is safe to recover.
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = running.as_ref()
            && !current.handle.is_finished()
        {
            #[cfg(feature = "tracing")]
            tracing::debug!(endpoint = %self.endpoint, "Connection loop already running");
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let handle = runtime.spawn(Self::connection_loop(
            self.endpoint.clone(),
            self.config.clone(),
            Arc::clone(&self.parser),
            self.broadcast_tx.clone(),
            self.state_tx.clone(),
            cancel.clone(),
        ));

        *running = Some(Running { cancel, handle });
        Ok(())
    }

    /// Stop the connection loop, closing the socket and cancelling any pending reconnect.
    pub fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(running) = running {
            running.cancel.cancel();
            #[cfg(feature = "tracing")]
            tracing::info!(endpoint = %self.endpoint, "Stopping connection loop");
        }

        _ = self.state_tx.send(ConnectionState::Disconnected);
    }

    /// Whether the connection loop is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Resolve once the current connection loop has exited, either through
    /// [`stop`](Self::stop) or after running out of reconnect attempts.
    ///
    /// Resolves immediately if no loop was started.
    pub async fn closed(&self) {
        let token = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|running| running.cancel.clone());

        if let Some(token) = token {
            token.cancelled().await;
        }
    }

    /// Main connection loop with automatic reconnection.
    async fn connection_loop(
        endpoint: String,
        config: Config,
        parser: Arc<P>,
        broadcast_tx: broadcast::Sender<M>,
        state_tx: watch::Sender<ConnectionState>,
        cancel: CancellationToken,
    ) {
        // Wakes `closed` however the loop ends.
        let _exited = cancel.clone().drop_guard();
        let mut attempt = 0_u32;
        let mut backoff: Constant = config.reconnect.clone().into();

        loop {
            _ = state_tx.send(ConnectionState::Connecting);

            #[cfg(feature = "tracing")]
            tracing::info!(%endpoint, "Connecting to WebSocket");

            let connected = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = connect_async(&endpoint) => result,
            };

            match connected {
                Ok((ws_stream, _)) => {
                    attempt = 0;
                    backoff.reset();
                    _ = state_tx.send(ConnectionState::Open {
                        since: Instant::now(),
                    });

                    #[cfg(feature = "tracing")]
                    tracing::info!(%endpoint, "WebSocket connected");

                    if let Err(e) =
                        Self::handle_connection(ws_stream, &broadcast_tx, parser.as_ref(), &cancel)
                            .await
                    {
                        #[cfg(feature = "tracing")]
                        tracing::info!("WebSocket closed uncleanly: {e}");
                        #[cfg(not(feature = "tracing"))]
                        let _ = &e;
                    }
                }
                Err(e) => {
                    let error = Error::with_source(Kind::WebSocket, WsError::Connection(e));
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Unable to connect: {error:?}");
                    #[cfg(not(feature = "tracing"))]
                    let _ = &error;
                    attempt = attempt.saturating_add(1);
                }
            }

            _ = state_tx.send(ConnectionState::Disconnected);

            if cancel.is_cancelled() {
                break;
            }

            // Check if we should stop reconnecting
            if let Some(max) = config.reconnect.max_attempts
                && attempt >= max
            {
                #[cfg(feature = "tracing")]
                tracing::warn!(attempts = attempt, "Giving up on reconnecting");
                break;
            }

            if let Some(duration) = backoff.next_backoff() {
                #[cfg(feature = "tracing")]
                tracing::debug!(?duration, "Reconnecting after delay");

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = sleep(duration) => {}
                }
            }
        }

        _ = state_tx.send(ConnectionState::Disconnected);
    }

    /// Handle an open WebSocket connection until it closes or the loop is cancelled.
    ///
    /// Returns `Ok` for a close frame or cancellation and `Err` when the stream ends
    /// without one.
    async fn handle_connection(
        mut ws_stream: WsStream,
        broadcast_tx: &broadcast::Sender<M>,
        parser: &P,
        cancel: &CancellationToken,
    ) -> Result<()> {
        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => break,

                msg = ws_stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            #[cfg(feature = "tracing")]
                            tracing::trace!(%text, "Received WebSocket text message");

                            match parser.parse(text.as_bytes()) {
                                Ok(messages) => {
                                    for message in messages {
                                        #[cfg(feature = "tracing")]
                                        tracing::debug!(?message, "Received data");
                                        _ = broadcast_tx.send(message);
                                    }
                                }
                                Err(e) => {
                                    #[cfg(feature = "tracing")]
                                    tracing::warn!(%text, error = %e, "Failed to parse WebSocket message");
                                    #[cfg(not(feature = "tracing"))]
                                    let _ = (&text, &e);
                                }
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            #[cfg(feature = "tracing")]
                            match &frame {
                                Some(frame) => tracing::info!(
                                    code = u16::from(frame.code),
                                    reason = frame.reason.as_str(),
                                    "WebSocket closed cleanly"
                                ),
                                None => tracing::info!("WebSocket closed cleanly"),
                            }
                            #[cfg(not(feature = "tracing"))]
                            let _ = &frame;
                            return Ok(());
                        }
                        Some(Err(e)) => {
                            #[cfg(feature = "tracing")]
                            tracing::error!(error = %e, "WebSocket error observed");
                            return Err(Error::with_source(
                                Kind::WebSocket,
                                WsError::Connection(e),
                            ));
                        }
                        Some(Ok(_)) => {
                            // Binary frames are never consumed; ping/pong is answered by tungstenite.
                        }
                        None => {
                            return Err(Error::with_source(
                                Kind::WebSocket,
                                WsError::ConnectionClosed,
                            ));
                        }
                    }
                }
            }
        }

        _ = ws_stream.close(None).await;

        Ok(())
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Subscribe to incoming messages.
    ///
    /// Each call returns a new independent receiver. Multiple subscribers can
    /// receive messages concurrently without blocking each other.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<M> {
        self.broadcast_tx.subscribe()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Lines;

    impl MessageParser<String> for Lines {
        fn parse(&self, bytes: &[u8]) -> Result<Vec<String>> {
            Ok(String::from_utf8_lossy(bytes)
                .lines()
                .map(str::to_owned)
                .collect())
        }
    }

    #[test]
    fn new_does_not_connect() {
        let connection = ConnectionManager::new(
            "ws://127.0.0.1:1".to_owned(),
            Config::default(),
            Lines,
        );

        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert!(!connection.is_running());
    }

    #[test]
    fn start_outside_runtime_fails() {
        let connection = ConnectionManager::new(
            "ws://127.0.0.1:1".to_owned(),
            Config::default(),
            Lines,
        );

        let error = connection.start().unwrap_err();
        assert_eq!(error.kind(), Kind::Validation);
    }

    #[tokio::test]
    async fn stop_cancels_pending_reconnect() {
        let mut config = Config::default();
        config.reconnect.delay = std::time::Duration::from_secs(60);
        let connection = ConnectionManager::new("ws://127.0.0.1:1".to_owned(), config, Lines);

        connection.start().unwrap();
        assert!(connection.is_running());

        connection.stop();
        assert!(!connection.is_running());
        assert_eq!(connection.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn closed_resolves_when_loop_gives_up() {
        let mut config = Config::default();
        config.reconnect.delay = std::time::Duration::from_millis(10);
        config.reconnect.max_attempts = Some(2);
        let connection = ConnectionManager::new("ws://127.0.0.1:1".to_owned(), config, Lines);

        connection.closed().await;

        connection.start().unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), connection.closed())
            .await
            .unwrap();
    }
}
