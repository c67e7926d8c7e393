use log::{debug, info};
use rand::Rng;
use shared::{Direction, Maze, Player, PlayerId, Position, ServerPacket};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Result of applying one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MoveOutcome {
    pub moved: bool,
    pub won: bool,
}

/// Authoritative world: the current maze and every registered player.
#[derive(Debug, Clone)]
pub struct GameState {
    maze: Arc<Maze>,
    players: HashMap<PlayerId, Player>,
    next_player_id: PlayerId,
}

impl GameState {
    pub fn new(maze: Maze) -> Self {
        Self {
            maze: Arc::new(maze),
            players: HashMap::new(),
            next_player_id: 1,
        }
    }

    pub fn maze(&self) -> &Arc<Maze> {
        &self.maze
    }

    pub fn players(&self) -> &HashMap<PlayerId, Player> {
        &self.players
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.get(&player_id)
    }

    /// Registers a player on a random free cell and returns its new id.
    pub fn add_player<R: Rng + ?Sized>(&mut self, name: String, rng: &mut R) -> PlayerId {
        let spawn = find_spawn(&self.maze, rng);
        self.add_player_at(name, spawn)
    }

    pub fn add_player_at(&mut self, name: String, position: Position) -> PlayerId {
        let player_id = self.next_player_id;
        self.next_player_id += 1;

        info!("Added player {} ({}) at {}", player_id, name, position);
        self.players
            .insert(player_id, Player::new(player_id, name, position));
        player_id
    }

    pub fn remove_player(&mut self, player_id: PlayerId) -> Option<Player> {
        let removed = self.players.remove(&player_id);
        if let Some(player) = &removed {
            info!("Removed player {} ({})", player_id, player.name);
        }
        removed
    }

    /// Validates and applies a movement command for one player.
    ///
    /// Unknown directions, unknown players and blocked moves all leave the
    /// state untouched. Stepping onto the exit is always allowed and wins.
    pub fn apply_command(&mut self, player_id: PlayerId, command: &str) -> MoveOutcome {
        let Some(player) = self.players.get_mut(&player_id) else {
            return MoveOutcome::default();
        };

        let current = player.position;
        let candidate = Direction::parse(command)
            .map(|direction| current.step(direction))
            .unwrap_or(current);
        let exit = self.maze.exit();

        debug!(
            "Command from {} = {:?} current={} candidate={}",
            player.name, command, current, candidate
        );

        if candidate == current || (self.maze.is_wall_at(candidate) && candidate != exit) {
            debug!("{} move blocked", player.name);
            return MoveOutcome::default();
        }

        player.position = candidate;
        let won = candidate == exit;
        if won {
            info!("Player {} reached the exit!", player.name);
        } else {
            debug!("{} moved to {}", player.name, candidate);
        }

        MoveOutcome { moved: true, won }
    }

    /// Swaps in a new maze. Player positions are kept as they are, even when
    /// they now sit inside a wall.
    pub fn replace_maze(&mut self, maze: Maze) {
        self.maze = Arc::new(maze);
    }

    /// Full snapshot of the world, players keyed in ascending id order.
    pub fn snapshot(&self) -> ServerPacket {
        let players: BTreeMap<PlayerId, Player> = self
            .players
            .iter()
            .map(|(id, player)| (*id, player.clone()))
            .collect();

        ServerPacket::StateSnapshot {
            maze: Arc::clone(&self.maze),
            players,
        }
    }
}

/// Draws uniformly random cells until one is open and not the exit.
pub fn find_spawn<R: Rng + ?Sized>(maze: &Maze, rng: &mut R) -> Position {
    loop {
        let candidate = Position::new(
            rng.gen_range(0..maze.width()),
            rng.gen_range(0..maze.height()),
        );
        if !maze.is_wall_at(candidate) && !maze.is_exit(candidate) {
            return candidate;
        }
    }
}
