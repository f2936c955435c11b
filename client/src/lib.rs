//! # Movement Client Library
//!
//! This library provides the client side of the movement sync layer. The
//! client sends movement intents and mirrors whatever the server decides; it
//! has no say over any position, its own included.
//!
//! ## Architecture Overview
//!
//! ### Authoritative Round Trip
//! A key press (or bot decision) becomes a `UserCmdMove` frame. The local
//! player only moves when the server's `UserUpdate` for it comes back. There
//! is no prediction and no rollback.
//!
//! ### Registry Mirror
//! The client keeps its own player registry, filled from `UserSetup` frames
//! and emptied by `UserDisconnect`. Updates for players it has never heard of
//! are dropped rather than guessed at.
//!
//! ### Presentation-only Smoothing
//! Interpolation, when enabled, only moves visual objects. The registry
//! always holds the latest authoritative value.
//!
//! ## Module Organization
//!
//! ### Config Module (`config`)
//! [`config::ClientConfig`] and its defaults.
//!
//! ### Game Module (`game`)
//! [`game::ClientGame`] applies server messages to the registry and the
//! presentation, and runs the optional interpolation.
//!
//! ### Input Module (`input`)
//! The [`input::InputSource`] seam with a random walk bot, an idle observer
//! and a scripted source, plus the manager that schedules intents and
//! heartbeats.
//!
//! ### Network Module (`network`)
//! TCP connection, reader task and the tick loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::ClientConfig;
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = ClientConfig {
//!         bot: true,
//!         ..ClientConfig::default()
//!     };
//!
//!     let mut client = Client::connect(config).await?;
//!     client.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod game;
pub mod input;
pub mod network;
