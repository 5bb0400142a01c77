use std::future::Future;

use questboard_transport::{Connection, TransportError};

/// Opens connections to the server.
///
/// The client calls [`connect`](Self::connect) once per attempt, so the
/// same connector serves the first connection and every reconnect.
pub trait Connector: Send + Sync + 'static {
    /// The connection type this connector opens.
    type Connection: Connection;

    fn connect(
        &self,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// Connects over WebSocket to a fixed URL, e.g. `ws://host:port/ws`.
#[cfg(feature = "websocket")]
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

#[cfg(feature = "websocket")]
impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(feature = "websocket")]
impl Connector for WebSocketConnector {
    type Connection = questboard_transport::ClientWebSocket;

    async fn connect(&self) -> Result<Self::Connection, TransportError> {
        questboard_transport::connect(&self.url).await
    }
}
