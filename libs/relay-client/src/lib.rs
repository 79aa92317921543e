//! Reconnecting client for the hyperlocal relay.
//!
//! [`RelayClient`] keeps a WebSocket session alive across abnormal closes
//! with exponential backoff, queues sends while the socket is down and flushes
//! them in order on reconnect, and gives up into [`ConnectionState::Fallback`]
//! once retries are exhausted so the application can poll the REST API.
//!
//! ```rust,ignore
//! let (client, mut events) = RelayClient::connect_ws("ws://localhost:3001/ws", ClientConfig::default());
//! client.send(ClientMessage::SubscribeNotifications {})?;
//! while let Some(event) = events.recv().await {
//!     println!("{} {}", event.event, event.data);
//! }
//! ```

pub mod client;
pub mod error;
pub mod policy;
pub mod queue;
pub mod state;
pub mod transport;

pub use client::{ClientConfig, RelayClient};
pub use error::{ClientError, TransportError};
pub use policy::ReconnectPolicy;
pub use queue::{OutboundQueue, OverflowPolicy};
pub use state::ConnectionState;
pub use transport::{Connector, Transport, TransportEvent, WsConnector};
