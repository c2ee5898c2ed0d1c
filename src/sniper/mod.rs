//! Sniper leaderboard API client and types.
//!
//! **Feature flag:** `sniper` (required to use this module)
//!
//! The bot keeps a leaderboard of viewers who "snipe" the streamer, backed by a
//! queue of clip submissions that admins review.
//!
//! ## Available Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/api/v1/snipers/{username}` | POST | Set or bump a sniper's kills (admin) |
//! | `/api/v1/snipers/{username}/submit` | PUT | Queue a clip |
//! | `/api/v1/snipers/{username}/submit` | DELETE | Remove a queued clip (admin) |
//!
//! Failed calls come back as [`Kind::Status`](crate::error::Kind::Status) errors carrying
//! the server's message, e.g. `Submission already exists in queue`.

pub mod client;
pub mod types;

pub use client::Client;
