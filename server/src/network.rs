//! Server network layer and the world task
//!
//! The world task is the single owner of the game state and the session
//! registry. Sessions talk to it only through `ServerMessage`s, so every
//! mutation and every snapshot happens on one task, one message at a time.

use crate::client_manager::{ClientManager, Outbound, OutboundSender};
use crate::game::GameState;
use crate::maze;
use crate::session::{self, DisconnectReason};
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{encode_frame, PlayerId, ServerPacket, EARTHQUAKE_INTERVAL, MAZE_HEIGHT, MAZE_WIDTH};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Requests from session tasks to the world task
#[derive(Debug)]
pub enum ServerMessage {
    Join {
        name: String,
        addr: SocketAddr,
        sender: OutboundSender,
        reply: oneshot::Sender<PlayerId>,
    },
    Command {
        player_id: PlayerId,
        direction: String,
    },
    Leave {
        player_id: PlayerId,
        reason: DisconnectReason,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub maze_width: i32,
    pub maze_height: i32,
    /// Seeds the server RNG for a reproducible sequence of mazes and spawns.
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            maze_width: MAZE_WIDTH,
            maze_height: MAZE_HEIGHT,
            seed: None,
        }
    }
}

/// Authoritative server: accepts connections and runs the world task
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    config: ServerConfig,
    game_state: GameState,
    clients: ClientManager,
    rng: StdRng,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(addr: &str, config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let maze = maze::generate(config.maze_width, config.maze_height, &mut rng)?;

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            config,
            game_state: GameState::new(maze),
            clients: ClientManager::new(),
            rng,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawns the task that accepts connections and starts a session for each
    fn spawn_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        info!("Connection from {}", addr);
                        tokio::spawn(session::handle_connection(stream, addr, server_tx.clone()));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Starts accepting connections and runs the world task
    pub async fn run(mut self) {
        self.spawn_acceptor();

        let mut earthquake = interval_at(Instant::now() + EARTHQUAKE_INTERVAL, EARTHQUAKE_INTERVAL);
        earthquake.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => match message {
                    Some(message) => self.handle_message(message),
                    None => {
                        info!("Server shutting down");
                        break;
                    }
                },
                _ = earthquake.tick() => self.trigger_earthquake(),
            }
        }
    }

    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Join {
                name,
                addr,
                sender,
                reply,
            } => self.handle_join(name, addr, sender, reply),
            ServerMessage::Command {
                player_id,
                direction,
            } => self.handle_command(player_id, &direction),
            ServerMessage::Leave { player_id, reason } => self.handle_leave(player_id, reason),
        }
    }

    fn handle_join(
        &mut self,
        name: String,
        addr: SocketAddr,
        sender: OutboundSender,
        reply: oneshot::Sender<PlayerId>,
    ) {
        let player_id = self.game_state.add_player(name, &mut self.rng);
        self.clients.add_client(player_id, addr, sender);

        if reply.send(player_id).is_err() {
            warn!("Session for player {} vanished during join", player_id);
            self.disconnect(player_id);
            return;
        }

        self.publish_state();
    }

    fn handle_command(&mut self, player_id: PlayerId, direction: &str) {
        let outcome = self.game_state.apply_command(player_id, direction);
        if !outcome.moved {
            return;
        }

        let winner_name = outcome
            .won
            .then(|| self.game_state.player(player_id).map(|p| p.name.clone()))
            .flatten();

        self.publish_state();

        if let Some(winner_name) = winner_name {
            self.announce_winner(player_id, winner_name);
        }
    }

    fn handle_leave(&mut self, player_id: PlayerId, reason: DisconnectReason) {
        if self.disconnect(player_id) {
            info!("Player {} disconnected: {}", player_id, reason);
            self.publish_state();
        }
    }

    /// Sends the winner announcement to everyone, then closes the winner's
    /// connection once its queue is flushed.
    fn announce_winner(&mut self, player_id: PlayerId, winner_name: String) {
        info!("Player {} ({}) wins", player_id, winner_name);

        let mut dead = self.publish(&ServerPacket::WinnerAnnouncement { winner_name });
        if !self.clients.send_to(player_id, Outbound::Close) && !dead.contains(&player_id) {
            dead.push(player_id);
        }
        self.reap(dead);
    }

    /// Replaces the maze with a freshly generated one of the same size.
    /// Player positions are left exactly where they are.
    pub fn trigger_earthquake(&mut self) {
        info!("Earthquake! The maze is shifting...");

        match maze::generate(self.config.maze_width, self.config.maze_height, &mut self.rng) {
            Ok(maze) => {
                self.game_state.replace_maze(maze);
                self.publish_state();
            }
            Err(e) => error!("Failed to regenerate maze: {}", e),
        }
    }

    /// Removes a player from both the game state and the registry.
    /// Returns false if neither knew about it.
    fn disconnect(&mut self, player_id: PlayerId) -> bool {
        let removed_player = self.game_state.remove_player(player_id).is_some();
        let removed_client = self.clients.remove_client(player_id);
        removed_player || removed_client
    }

    /// Broadcasts a fresh snapshot of the whole world.
    fn publish_state(&mut self) {
        let snapshot = self.game_state.snapshot();
        let dead = self.publish(&snapshot);
        self.reap(dead);
    }

    /// Encodes once and queues the frame for every client. Returns the
    /// clients whose connection turned out to be gone.
    fn publish(&self, packet: &ServerPacket) -> Vec<PlayerId> {
        match encode_frame(packet) {
            Ok(frame) => self.clients.broadcast(&Arc::new(frame)),
            Err(e) => {
                error!("Failed to encode packet: {}", e);
                Vec::new()
            }
        }
    }

    /// Cleans up clients found dead during a broadcast, then tells the
    /// survivors. Terminates because every round removes at least one client.
    fn reap(&mut self, dead: Vec<PlayerId>) {
        let mut changed = false;
        for player_id in dead {
            if self.disconnect(player_id) {
                info!("Player {} disconnected: connection lost", player_id);
                changed = true;
            }
        }
        if changed {
            self.publish_state();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_manager::{outbound_queue, OutboundReceiver, OUTBOUND_QUEUE_CAPACITY};
    use crate::session::DisconnectReason;
    use shared::{read_packet, Maze, Position};
    use std::collections::BTreeMap;
    use std::net::{IpAddr, Ipv4Addr};

    fn test_addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 40001)
    }

    async fn test_server() -> Server {
        let config = ServerConfig {
            seed: Some(17),
            ..ServerConfig::default()
        };
        Server::new("127.0.0.1:0", config).await.unwrap()
    }

    fn join(server: &mut Server, name: &str) -> (PlayerId, OutboundReceiver) {
        let (sender, outbound_rx) = outbound_queue();
        let (reply, mut reply_rx) = oneshot::channel();
        server.handle_message(ServerMessage::Join {
            name: name.to_string(),
            addr: test_addr(),
            sender,
            reply,
        });
        (reply_rx.try_recv().unwrap(), outbound_rx)
    }

    fn leave(server: &mut Server, player_id: PlayerId) {
        server.handle_message(ServerMessage::Leave {
            player_id,
            reason: DisconnectReason::Closed,
        });
    }

    fn command(server: &mut Server, player_id: PlayerId, direction: &str) {
        server.handle_message(ServerMessage::Command {
            player_id,
            direction: direction.to_string(),
        });
    }

    /// Decodes everything queued for one session.
    async fn drain(outbound_rx: &mut OutboundReceiver) -> (Vec<ServerPacket>, bool) {
        let mut packets = Vec::new();
        let mut closed = false;
        while let Ok(outbound) = outbound_rx.try_recv() {
            match outbound {
                Outbound::Frame(frame) => {
                    let mut bytes: &[u8] = &frame;
                    packets.push(read_packet(&mut bytes).await.unwrap());
                }
                Outbound::Close => closed = true,
            }
        }
        (packets, closed)
    }

    fn players_of(packet: &ServerPacket) -> &BTreeMap<PlayerId, shared::Player> {
        match packet {
            ServerPacket::StateSnapshot { players, .. } => players,
            other => panic!("Expected snapshot, got {:?}", other),
        }
    }

    fn scenario_maze() -> Maze {
        let rows = ["#####", "#...#", "#...#", "###.#", "#####"];
        let walls = rows
            .iter()
            .flat_map(|row| row.chars().map(|c| c == '#'))
            .collect();
        Maze::new(5, 5, walls, Position::new(4, 2))
    }

    #[tokio::test]
    async fn test_join_broadcasts_to_everyone_including_newcomer() {
        let mut server = test_server().await;
        let (first, mut first_rx) = join(&mut server, "ada");
        let (second, mut second_rx) = join(&mut server, "grace");

        let (packets, _) = drain(&mut first_rx).await;
        assert_eq!(packets.len(), 2);
        assert_eq!(players_of(&packets[1]).len(), 2);

        let (packets, _) = drain(&mut second_rx).await;
        assert_eq!(packets.len(), 1);
        let players = players_of(&packets[0]);
        assert_eq!(players[&first].name, "ada");
        assert_eq!(players[&second].name, "grace");
    }

    #[tokio::test]
    async fn test_join_places_player_on_open_cell() {
        let mut server = test_server().await;
        let (id, _rx) = join(&mut server, "ada");

        let position = server.game_state.player(id).unwrap().position;
        assert!(!server.game_state.maze().is_wall_at(position));
        assert!(!server.game_state.maze().is_exit(position));
    }

    #[tokio::test]
    async fn test_leave_is_broadcast_once() {
        let mut server = test_server().await;
        let (ada, _ada_rx) = join(&mut server, "ada");
        let (_grace, mut grace_rx) = join(&mut server, "grace");
        drain(&mut grace_rx).await;

        leave(&mut server, ada);
        leave(&mut server, ada);

        let (packets, _) = drain(&mut grace_rx).await;
        assert_eq!(packets.len(), 1);
        assert!(!players_of(&packets[0]).contains_key(&ada));
    }

    #[tokio::test]
    async fn test_all_joins_then_leaves_leave_nothing_behind() {
        let mut server = test_server().await;
        let sessions: Vec<_> = (0..16)
            .map(|i| join(&mut server, &format!("player{}", i)))
            .collect();
        assert_eq!(server.game_state.players().len(), 16);
        assert_eq!(server.clients.len(), 16);

        for (id, _) in &sessions {
            leave(&mut server, *id);
        }

        assert!(server.game_state.players().is_empty());
        assert!(server.clients.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_command_does_not_broadcast() {
        let mut server = test_server().await;
        server.game_state = GameState::new(scenario_maze());
        let (id, mut rx) = join(&mut server, "ada");
        drain(&mut rx).await;

        let before = server.game_state.player(id).unwrap().position;
        command(&mut server, id, "dance");

        let (packets, _) = drain(&mut rx).await;
        assert!(packets.is_empty());
        assert_eq!(server.game_state.player(id).unwrap().position, before);
    }

    #[tokio::test]
    async fn test_winner_is_announced_and_closed() {
        let mut server = test_server().await;
        server.game_state = GameState::new(scenario_maze());
        let a = server.game_state.add_player_at("A".to_string(), Position::new(2, 2));
        let b = server.game_state.add_player_at("B".to_string(), Position::new(3, 2));
        let (a_tx, mut a_rx) = outbound_queue();
        let (b_tx, mut b_rx) = outbound_queue();
        server.clients.add_client(a, test_addr(), a_tx);
        server.clients.add_client(b, test_addr(), b_tx);

        command(&mut server, a, "down");
        assert!(drain(&mut a_rx).await.0.is_empty());
        assert_eq!(server.game_state.player(a).unwrap().position, Position::new(2, 2));

        command(&mut server, b, "right");

        let (packets, closed) = drain(&mut a_rx).await;
        assert!(!closed);
        assert_eq!(packets.len(), 2);
        assert_eq!(players_of(&packets[0])[&b].position, Position::new(4, 2));
        match &packets[1] {
            ServerPacket::WinnerAnnouncement { winner_name } => assert_eq!(winner_name, "B"),
            other => panic!("Expected winner, got {:?}", other),
        }

        let (packets, closed) = drain(&mut b_rx).await;
        assert!(closed);
        assert!(matches!(
            packets.last(),
            Some(ServerPacket::WinnerAnnouncement { .. })
        ));
    }

    #[tokio::test]
    async fn test_earthquake_keeps_positions() {
        let mut server = test_server().await;
        let (ada, mut ada_rx) = join(&mut server, "ada");
        let (grace, _grace_rx) = join(&mut server, "grace");
        let (packets, _) = drain(&mut ada_rx).await;
        let before = players_of(packets.last().unwrap()).clone();
        let old_maze = Arc::clone(server.game_state.maze());

        server.trigger_earthquake();

        assert!(!Arc::ptr_eq(&old_maze, server.game_state.maze()));
        let (packets, _) = drain(&mut ada_rx).await;
        assert_eq!(packets.len(), 1);
        match &packets[0] {
            ServerPacket::StateSnapshot { maze, players } => {
                assert_eq!(**maze, **server.game_state.maze());
                assert_ne!(**maze, *old_maze);
                assert_eq!(players[&ada].position, before[&ada].position);
                assert_eq!(players[&grace].position, before[&grace].position);
            }
            other => panic!("Expected snapshot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dead_session_is_reaped_during_broadcast() {
        let mut server = test_server().await;
        let (ada, ada_rx) = join(&mut server, "ada");
        let (_grace, mut grace_rx) = join(&mut server, "grace");
        drain(&mut grace_rx).await;
        drop(ada_rx);

        server.trigger_earthquake();

        assert!(server.game_state.player(ada).is_none());
        assert!(!server.clients.contains(ada));

        let (packets, _) = drain(&mut grace_rx).await;
        assert_eq!(packets.len(), 2);
        assert!(players_of(&packets[0]).contains_key(&ada));
        assert!(!players_of(&packets[1]).contains_key(&ada));

        // The session's own leave arrives later and changes nothing.
        leave(&mut server, ada);
        assert!(drain(&mut grace_rx).await.0.is_empty());
    }

    #[tokio::test]
    async fn test_slow_session_is_disconnected() {
        let mut server = test_server().await;
        let (ada, _ada_rx) = join(&mut server, "ada");
        let (_grace, mut grace_rx) = join(&mut server, "grace");

        // Ada never reads, so her queue eventually fills up.
        let mut last = None;
        for _ in 0..OUTBOUND_QUEUE_CAPACITY {
            server.trigger_earthquake();
            let (packets, _) = drain(&mut grace_rx).await;
            last = packets.last().cloned().or(last);
        }

        assert!(server.game_state.player(ada).is_none());
        assert!(!server.clients.contains(ada));
        assert!(!players_of(&last.unwrap()).contains_key(&ada));
    }

    #[tokio::test(start_paused = true)]
    async fn test_earthquake_fires_on_schedule() {
        let mut server = test_server().await;
        let (ada, mut ada_rx) = join(&mut server, "ada");
        drain(&mut ada_rx).await;
        let old_maze = Arc::clone(server.game_state.maze());
        let position = server.game_state.player(ada).unwrap().position;

        tokio::spawn(server.run());
        tokio::task::yield_now().await;

        tokio::time::advance(EARTHQUAKE_INTERVAL - Duration::from_millis(1)).await;
        tokio::task::yield_now().await;
        assert!(ada_rx.try_recv().is_err());

        tokio::time::advance(Duration::from_millis(1)).await;
        let frame = match tokio::time::timeout(Duration::from_secs(1), ada_rx.recv()).await {
            Ok(Some(Outbound::Frame(frame))) => frame,
            other => panic!("Expected earthquake snapshot, got {:?}", other),
        };

        let mut bytes: &[u8] = &frame;
        match read_packet(&mut bytes).await.unwrap() {
            ServerPacket::StateSnapshot { maze, players } => {
                assert_ne!(*maze, *old_maze);
                assert_eq!(players[&ada].position, position);
            }
            other => panic!("Expected snapshot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_join_without_session_is_rolled_back() {
        let mut server = test_server().await;
        let (sender, _outbound_rx) = outbound_queue();
        let (reply, reply_rx) = oneshot::channel();
        drop(reply_rx);

        server.handle_message(ServerMessage::Join {
            name: "ghost".to_string(),
            addr: test_addr(),
            sender,
            reply,
        });

        assert!(server.game_state.players().is_empty());
        assert!(server.clients.is_empty());
    }
}
