//! Session registry for the world task
//!
//! Each registered client is represented by the outbound queue of its
//! connection. The world task is the only owner of the registry and keeps it
//! in lockstep with the player map: an id is registered here exactly when a
//! player with that id exists in the game state.
//!
//! Sending never touches a socket. Frames are pushed onto the per-session
//! queue and the session's writer task performs the actual write, so one slow
//! or broken connection cannot hold up delivery to the others. Queues are
//! bounded: a client that falls `OUTBOUND_QUEUE_CAPACITY` frames behind is
//! treated exactly like one whose connection is gone.

use log::{info, warn};
use shared::PlayerId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Frames a session may have queued but not yet written.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 64;

/// Instructions for a session's writer task.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// A complete, already framed packet.
    Frame(Arc<Vec<u8>>),
    /// Flush what is queued, then close the connection.
    Close,
}

pub type OutboundSender = mpsc::Sender<Outbound>;
pub type OutboundReceiver = mpsc::Receiver<Outbound>;

pub fn outbound_queue() -> (OutboundSender, OutboundReceiver) {
    mpsc::channel(OUTBOUND_QUEUE_CAPACITY)
}

/// A registered connection.
#[derive(Debug)]
pub struct Client {
    /// Player id this connection controls
    pub id: PlayerId,
    /// Peer address, kept for logging
    pub addr: SocketAddr,
    /// Queue drained by the session's writer task
    pub sender: OutboundSender,
}

impl Client {
    pub fn new(id: PlayerId, addr: SocketAddr, sender: OutboundSender) -> Self {
        Self { id, addr, sender }
    }

    /// Queues an instruction without waiting. Fails when the writer task
    /// has stopped or has fallen a full queue behind.
    pub fn send(&self, outbound: Outbound) -> bool {
        match self.sender.try_send(outbound) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Client {} ({}) is not keeping up", self.id, self.addr);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Registry of every connection that completed its handshake.
#[derive(Debug, Default)]
pub struct ClientManager {
    clients: HashMap<PlayerId, Client>,
}

impl ClientManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_client(&mut self, id: PlayerId, addr: SocketAddr, sender: OutboundSender) {
        info!("Client {} registered from {}", id, addr);
        self.clients.insert(id, Client::new(id, addr, sender));
    }

    /// Removes a client. Returns false if it was already gone.
    pub fn remove_client(&mut self, id: PlayerId) -> bool {
        match self.clients.remove(&id) {
            Some(client) => {
                info!("Client {} unregistered ({})", client.id, client.addr);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.clients.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Queues an instruction for one client. Returns false if the client is
    /// unknown, its connection has gone away or its queue is full.
    pub fn send_to(&self, id: PlayerId, outbound: Outbound) -> bool {
        self.clients
            .get(&id)
            .map(|client| client.send(outbound))
            .unwrap_or(false)
    }

    /// Hands the same frame to every client.
    ///
    /// Every client is attempted. Returns the ids whose connection is gone or
    /// whose queue is full so the caller can run their disconnect cleanup
    /// once the pass is over.
    pub fn broadcast(&self, frame: &Arc<Vec<u8>>) -> Vec<PlayerId> {
        let mut dead = Vec::new();
        for (id, client) in &self.clients {
            if !client.send(Outbound::Frame(Arc::clone(frame))) {
                warn!("Failed to queue frame for client {} ({})", id, client.addr);
                dead.push(*id);
            }
        }
        dead
    }
}
