//! # Maze Escape Server Library
//!
//! This library provides the authoritative server for the LAN maze escape
//! game. It owns the maze and every player's position, validates movement
//! commands, and pushes a full snapshot of the world to every connected client
//! whenever anything changes.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative State
//! Clients only ever send direction words. Whether a move is legal, whether
//! it wins, and where everyone stands is decided here. Clients render whatever
//! the latest snapshot says.
//!
//! ### Session Management
//! Handles the complete lifecycle of a connection:
//! - Handshake with protocol version check and display name
//! - Player registration on a random free cell
//! - Command forwarding
//! - Cleanup that runs exactly once per player, whatever ended the session
//!
//! ### Earthquakes
//! Every 30 seconds the maze is replaced by a freshly generated one of the
//! same size. Players stay on their coordinates, even if those turn into
//! walls, and walk out with their next accepted move.
//!
//! ## Architecture Design
//!
//! ### Single Writer
//! One world task owns the game state and the session registry. Sessions send
//! it requests over a channel and the earthquake timer fires inside the same
//! loop, so every change and the snapshot that follows it happen without any
//! locking and without interleaving.
//!
//! ### Per-Session Tasks
//! Every TCP connection gets a reader that decodes client packets and a writer
//! that drains an outbound queue. Broadcasting only enqueues, so a stalled
//! client never delays the world task or the other players.
//!
//! ## Module Organization
//!
//! ### Maze Module (`maze`)
//! Randomized depth-first carving and exit placement.
//!
//! ### Game Module (`game`)
//! Player registry, move validation and win detection, spawn selection and
//! snapshot construction.
//!
//! ### Client Manager Module (`client_manager`)
//! Outbound queues of every registered session.
//!
//! ### Session Module (`session`)
//! Handshake, read loop and writer task of a single connection.
//!
//! ### Network Module (`network`)
//! Listener, world task and earthquake timer.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 21x11 maze with a random seed
//!     let server = Server::new("0.0.0.0:12345", ServerConfig::default()).await?;
//!
//!     // Accepts connections and processes requests until shut down
//!     server.run().await;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod maze;
pub mod network;
pub mod session;
