//! # Movement Server Library
//!
//! This library provides the authoritative server for the movement sync layer.
//! Clients only ever send movement intents; the server decides every position
//! and tells all clients about it.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Movement
//! Each `UserCmdMove` carries a horizontal and a vertical direction. The server
//! applies a fixed step along each axis that has a direction, stores the new
//! position in its registry and broadcasts a `UserUpdate` to every client,
//! the sender included. Clients never predict.
//!
//! ### Player Lifecycle
//! Handles the complete lifecycle of a player:
//! - Unique name and skin assignment on connect
//! - Introducing the newcomer to everyone, and everyone to the newcomer
//! - Removal and a `UserDisconnect` broadcast when the connection goes away
//!
//! ## Architecture Design
//!
//! ### Single Control Loop
//! Network tasks never touch player state. They push transport events onto a
//! channel, and the server loop drains that channel once per tick, feeding
//! each event through the [`authority::Authority`]. The authority answers with
//! outbound messages that the loop encodes and queues on the right
//! connections.
//!
//! ### TCP Transport
//! Every message is a fixed-size frame, sent over TCP so delivery per
//! connection is reliable and ordered.
//!
//! ## Module Organization
//!
//! ### Authority Module (`authority`)
//! Movement resolution, name generation and the join/leave message flows.
//! Purely synchronous; all of it is testable without sockets.
//!
//! ### Client Manager Module (`client_manager`)
//! Connection bookkeeping: handle assignment, capacity, per-connection frame
//! queues and idle timeouts.
//!
//! ### Config Module (`config`)
//! [`config::ServerConfig`] with the defaults the binary starts from.
//!
//! ### Network Module (`network`)
//! The accept task, per-connection reader and writer tasks, the timeout
//! checker and the tick loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut server = Server::new(ServerConfig::default()).await?;
//!
//!     // Runs until a shutdown is requested through `server.shutdown_handle()`
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod authority;
pub mod client_manager;
pub mod config;
pub mod network;
