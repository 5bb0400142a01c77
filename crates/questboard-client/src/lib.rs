//! Reconnecting client for Questboard.
//!
//! A [`Client`] joins one room and keeps a live [`RoomView`] of it. The
//! connection is owned by a background task that:
//!
//! - sends `Join` as soon as a connection opens;
//! - pings after a quiet spell and drops the connection when nothing comes
//!   back in time;
//! - reconnects with [`Backoff`](questboard_timer::Backoff) until the
//!   client is closed.
//!
//! # Example
//!
//! ```rust,ignore
//! let (client, mut events) = Client::connect(
//!     "ws://127.0.0.1:48377/ws",
//!     RoomKey::new("R1"),
//!     LocalUser::new("ann").with_hero(3),
//!     ClientConfig::default(),
//! );
//!
//! client.choose(Choice::Number(5))?;
//! let mut view = client.subscribe();
//! while view.changed().await.is_ok() {
//!     for p in view.borrow().others() {
//!         println!("{}: {:?}", p.name, p.choice);
//!     }
//! }
//! ```
//!
//! The connection is reached through the [`Connector`] trait, so tests
//! can drive a client over in-memory channels instead of a socket.

mod client;
mod config;
mod connector;
mod error;
mod user;
mod view;

pub use client::{Client, ClientEvent, ConnectionState};
pub use config::ClientConfig;
#[cfg(feature = "websocket")]
pub use connector::WebSocketConnector;
pub use connector::Connector;
pub use error::ClientError;
pub use user::LocalUser;
pub use view::RoomView;
