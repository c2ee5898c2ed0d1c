//! Overlay event stream.
//!
//! The bot pushes `{"event": <name>, "data": {...}}` envelopes over a single
//! WebSocket. [`Client`] keeps that socket open and feeds every envelope, in order,
//! to an [`OverlayHandler`] through the [`Dispatcher`]. [`Scene`] is a ready-made
//! handler that keeps a renderer-agnostic model of the overlay.
//!
//! **Supported events:**
//! - `new_box`, `new_emotes`, `show_custom_image` - scattered sprites
//! - `notification`, `timeout` - notification column
//! - `emote_combo` - combo badge
//! - `emotecounter_start` / `emotecounter_update` / `emotecounter_close`
//! - `win_percent_change` / `win_percent_open` / `win_percent_close`
//! - `dotabet_new_game` / `dotabet_update_data` / `dotabet_close_game`
//! - `play_sound`
//! - `refresh` / `reload`
//!
//! Anything else is ignored.
//!
//! # Example
//!
//! ```rust, no_run
//! use clr_overlay_client::overlay::{Client, OverlayHandler};
//! use clr_overlay_client::overlay::types::Notification;
//! use clr_overlay_client::ws::config::Config;
//!
//! struct Printer;
//!
//! impl OverlayHandler for Printer {
//!     fn notification(&mut self, event: Notification) {
//!         println!("{}", event.message);
//!     }
//! }
//!
//! # async fn example() -> clr_overlay_client::Result<()> {
//! let client = Client::new("wss://forsen.tv/clrsocket", Config::default())?;
//! client.run(Printer).await?;
//! # Ok(())
//! # }
//! ```

mod client;
pub mod dispatcher;
pub mod effect;
pub mod scene;
pub mod types;

pub use client::Client;
pub use dispatcher::{Dispatcher, OverlayHandler};
pub use effect::{Effect, EffectPhase, Timeline};
pub use scene::Scene;
