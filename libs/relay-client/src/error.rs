use std::time::Duration;

/// Errors returned by [`RelayClient`](crate::RelayClient) handle methods.
///
/// Connection failures are not errors here: they show up as state
/// transitions on [`RelayClient::watch_state`](crate::RelayClient::watch_state).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The background driver has stopped; the handle is unusable.
    #[error("relay client has shut down")]
    Closed,
    /// Reconnection gave up. Poll the REST API or call `connect()` again.
    #[error("relay client is in fallback mode")]
    Fallback,
}

/// Errors raised by a [`Transport`](crate::Transport) or
/// [`Connector`](crate::Connector).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Other(String),
}
