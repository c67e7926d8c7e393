//! # Maze Escape Client Library
//!
//! This library provides the terminal client for the LAN maze escape game.
//! The client is deliberately thin: it sends direction words and draws
//! whatever the server says the world looks like. There is no local
//! prediction, every position on screen comes from the latest snapshot.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! Connection setup and the two background tasks of a connection:
//! - Handshake with protocol version and display name
//! - Reader task turning server packets into `ServerEvent`s
//! - Writer task sending queued commands in order
//!
//! ### Game Module (`game`)
//! The client's view of the world:
//! - Latest maze and player list
//! - Own player id, derived from the display name
//! - Winner and connection status
//!
//! ### Input Module (`input`)
//! Maps typed lines to moves, including WASD and vi shorthands.
//!
//! ### Rendering Module (`rendering`)
//! Plain-text frames of the maze with players, exit and player list.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::ClientView;
//! use client::network::{self, ServerEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (commands, mut events) = network::connect("127.0.0.1:12345", "ada").await?;
//!     let mut view = ClientView::new("ada");
//!
//!     commands.send("right")?;
//!
//!     while let Some(event) = events.recv().await {
//!         view.apply_event(event);
//!         println!("{}", client::rendering::render(&view));
//!         if view.is_finished() {
//!             break;
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;

pub use network::{ClientError, CommandSender, ServerEvent};
