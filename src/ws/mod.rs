//! Core WebSocket infrastructure.
//!
//! This module provides generic connection management that can be
//! specialized for different message formats through the [`MessageParser`] trait.
//!
//! # Architecture
//!
//! - [`ConnectionManager`]: Receive-only WebSocket connection with fixed-delay reconnection
//! - [`MessageParser`]: Trait for parsing incoming WebSocket messages
//!
//! # Example
//!
//! ```ignore
//! let connection = ConnectionManager::new(endpoint, Config::default(), EnvelopeParser);
//! let mut events = connection.subscribe();
//! connection.start()?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod traits;

pub use connection::ConnectionManager;
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use traits::*;
