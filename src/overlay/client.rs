use std::sync::{Arc, Mutex, PoisonError};

use async_stream::stream;
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::dispatcher::{Dispatcher, OverlayHandler};
use super::types::{EnvelopeParser, OverlayEvent};
use crate::error::Error;
use crate::ws::config::Config;
use crate::ws::connection::ConnectionState;
use crate::ws::{ConnectionManager, WsError};
use crate::{OVERLAY_WS_HOST_VAR, Result};

/// Overlay client: one socket, events dispatched in arrival order.
///
/// # Examples
///
/// ```rust, no_run
/// use clr_overlay_client::overlay::{Client, Scene};
/// use clr_overlay_client::ws::config::Config;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = Client::new("wss://forsen.tv/clrsocket", Config::default())?;
///     let scene = Scene::default();
///
///     let stopper = client.clone();
///     tokio::spawn(async move {
///         tokio::time::sleep(std::time::Duration::from_secs(60)).await;
///         stopper.stop();
///     });
///
///     let scene = client.run(scene).await?;
///     println!("{} sprites on screen", scene.sprites().len());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    endpoint: String,
    connection: ConnectionManager<OverlayEvent, EnvelopeParser>,
    /// Cancelled by [`Client::stop`]; replaced on the next start
    shutdown: Mutex<CancellationToken>,
}

impl Client {
    /// Create a client for `endpoint`, which must be a `ws://` or `wss://` URL.
    ///
    /// Nothing connects until [`start`](Self::start) or [`run`](Self::run).
    pub fn new(endpoint: &str, config: Config) -> Result<Self> {
        let url = Url::parse(endpoint)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::validation(format!(
                "overlay endpoint must use ws or wss, got {}",
                url.scheme()
            )));
        }

        let connection = ConnectionManager::new(endpoint.to_owned(), config, EnvelopeParser);

        Ok(Self {
            inner: Arc::new(ClientInner {
                endpoint: endpoint.to_owned(),
                connection,
                shutdown: Mutex::new(CancellationToken::new()),
            }),
        })
    }

    /// Create a client for the endpoint in `CLR_OVERLAY_WS_HOST`.
    pub fn from_env(config: Config) -> Result<Self> {
        let endpoint = std::env::var(OVERLAY_WS_HOST_VAR)
            .map_err(|e| Error::validation(format!("{OVERLAY_WS_HOST_VAR}: {e}")))?;

        Self::new(&endpoint, config)
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Connect in the background. Idempotent while running.
    pub fn start(&self) -> Result<()> {
        _ = self.shutdown_token();
        self.inner.connection.start()
    }

    /// Close the socket, cancel any pending reconnect and end [`run`](Self::run).
    pub fn stop(&self) {
        self.inner
            .shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
        self.inner.connection.stop();
    }

    /// Connect and dispatch every event to `handler` until [`stop`](Self::stop) is
    /// called or the connection gives up reconnecting, then hand the handler back.
    pub async fn run<H: OverlayHandler>(&self, handler: H) -> Result<H> {
        let mut rx = self.inner.connection.subscribe();
        self.start()?;
        let shutdown = self.shutdown_token();
        let closed = self.inner.connection.closed();
        tokio::pin!(closed);

        let mut dispatcher = Dispatcher::new(handler);

        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => break,

                received = rx.recv() => match received {
                    Ok(event) => dispatcher.dispatch(event),
                    Err(RecvError::Lagged(n)) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Overlay dispatcher lagged, missed {n} events");
                        #[cfg(not(feature = "tracing"))]
                        let _ = n;
                    }
                    Err(RecvError::Closed) => break,
                },

                () = &mut closed => {
                    #[cfg(feature = "tracing")]
                    tracing::info!(
                        endpoint = %self.inner.endpoint,
                        "Connection loop exited, ending dispatch"
                    );
                    break;
                }
            }
        }

        Ok(dispatcher.into_handler())
    }

    /// Stream of decoded events. Does not connect by itself.
    ///
    /// A subscriber that falls behind receives one [`WsError::Lagged`] item and then
    /// continues with the newest events.
    pub fn events(&self) -> impl Stream<Item = Result<OverlayEvent>> + use<> {
        let mut rx = self.inner.connection.subscribe();

        stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield Ok(event),
                    Err(RecvError::Lagged(n)) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Overlay event stream lagged, missed {n} events");
                        yield Err(Error::from(WsError::Lagged { count: n }));
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    /// Get the current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.state_receiver()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.connection.is_running()
    }

    fn shutdown_token(&self) -> CancellationToken {
        let mut token = self
            .inner
            .shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if token.is_cancelled() {
            *token = CancellationToken::new();
        }
        token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Kind;

    #[test]
    fn rejects_non_websocket_endpoints() {
        let error = Client::new("https://forsen.tv/clrsocket", Config::default())
            .err()
            .unwrap();
        assert_eq!(error.kind(), Kind::Validation);

        let error = Client::new("not a url", Config::default()).err().unwrap();
        assert_eq!(error.kind(), Kind::Internal);
    }

    #[test]
    fn accepts_ws_and_wss() {
        let client = Client::new("wss://forsen.tv/clrsocket", Config::default()).unwrap();
        assert_eq!(client.endpoint(), "wss://forsen.tv/clrsocket");
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);

        Client::new("ws://127.0.0.1:2356/clrsocket", Config::default()).unwrap();
    }

    #[tokio::test]
    async fn stop_is_sticky_until_restarted() {
        let client = Client::new("ws://127.0.0.1:1", Config::default()).unwrap();

        client.stop();
        let token = client.shutdown_token();
        assert!(!token.is_cancelled());

        client.stop();
        assert!(token.is_cancelled());
    }
}
