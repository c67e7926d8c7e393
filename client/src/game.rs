use crate::network::ServerEvent;
use log::info;
use shared::{Maze, Player, PlayerId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The client's picture of the world, rebuilt from every snapshot.
#[derive(Debug, Clone)]
pub struct ClientView {
    name: String,
    my_id: Option<PlayerId>,
    maze: Option<Arc<Maze>>,
    players: BTreeMap<PlayerId, Player>,
    winner: Option<String>,
    connected: bool,
}

impl ClientView {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            my_id: None,
            maze: None,
            players: BTreeMap::new(),
            winner: None,
            connected: true,
        }
    }

    pub fn apply_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Snapshot { maze, players } => self.apply_snapshot(maze, players),
            ServerEvent::Winner(name) => {
                info!("Winner announced: {}", name);
                self.winner = Some(name);
            }
            ServerEvent::Disconnected => self.connected = false,
        }
    }

    /// Replaces the maze and player list.
    ///
    /// The server never tells a client its id, so the first snapshot that
    /// contains a player with our name settles it. Names need not be unique;
    /// the lowest matching id wins and the choice is never revisited.
    pub fn apply_snapshot(&mut self, maze: Arc<Maze>, players: BTreeMap<PlayerId, Player>) {
        if self.my_id.is_none() {
            self.my_id = players
                .values()
                .find(|player| player.name == self.name)
                .map(|player| player.id);
            if let Some(id) = self.my_id {
                info!("Identified as player {}", id);
            }
        }

        self.maze = Some(maze);
        self.players = players;
    }

    pub fn my_id(&self) -> Option<PlayerId> {
        self.my_id
    }

    pub fn me(&self) -> Option<&Player> {
        self.my_id.and_then(|id| self.players.get(&id))
    }

    pub fn maze(&self) -> Option<&Maze> {
        self.maze.as_deref()
    }

    pub fn players(&self) -> &BTreeMap<PlayerId, Player> {
        &self.players
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// True once there is nothing left to play for.
    pub fn is_finished(&self) -> bool {
        self.winner.is_some() || !self.connected
    }
}
