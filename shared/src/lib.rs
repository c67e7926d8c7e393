use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub mod codec;

pub use codec::{encode_frame, read_packet, write_packet, ProtocolError, MAX_FRAME_LEN};

pub const PROTOCOL_VERSION: u32 = 1;
pub const DEFAULT_PORT: u16 = 12345;
pub const MAZE_WIDTH: i32 = 21;
pub const MAZE_HEIGHT: i32 = 11;
pub const MIN_MAZE_SIZE: i32 = 5;
/// Largest maze, in cells, whose snapshot still fits in one frame with
/// room left for the player list.
pub const MAX_MAZE_CELLS: usize = 512 * 1024;
pub const EARTHQUAKE_INTERVAL: Duration = Duration::from_secs(30);

pub type PlayerId = u32;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum ClientPacket {
    Handshake {
        protocol_version: u32,
        display_name: String,
    },
    Command {
        direction: String,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum ServerPacket {
    StateSnapshot {
        maze: Arc<Maze>,
        players: BTreeMap<PlayerId, Player>,
    },
    WinnerAnnouncement {
        winner_name: String,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Parses a command word, ignoring case and surrounding whitespace.
    pub fn parse(command: &str) -> Option<Self> {
        match command.trim().to_ascii_lowercase().as_str() {
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            "left" => Some(Direction::Left),
            "right" => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

/// Immutable wall grid with a single exit cell.
///
/// Walls are stored row-major. Anything outside the grid, including indices a
/// malformed snapshot might leave uncovered, reads as a wall.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Maze {
    width: i32,
    height: i32,
    walls: Vec<bool>,
    exit: Position,
}

impl Maze {
    pub fn new(width: i32, height: i32, walls: Vec<bool>, exit: Position) -> Self {
        debug_assert_eq!(walls.len(), (width.max(0) * height.max(0)) as usize);
        Self {
            width,
            height,
            walls,
            exit,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn exit(&self) -> Position {
        self.exit
    }

    pub fn is_wall(&self, x: i32, y: i32) -> bool {
        if x < 0 || x >= self.width || y < 0 || y >= self.height {
            return true;
        }
        self.walls
            .get((y * self.width + x) as usize)
            .copied()
            .unwrap_or(true)
    }

    pub fn is_wall_at(&self, position: Position) -> bool {
        self.is_wall(position.x, position.y)
    }

    pub fn is_exit(&self, position: Position) -> bool {
        self.exit == position
    }
}

impl fmt::Display for Maze {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..self.height {
            for x in 0..self.width {
                f.write_str(if self.is_wall(x, y) { "#" } else { "." })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub position: Position,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, position: Position) -> Self {
        Self {
            id,
            name: name.into(),
            position,
        }
    }
}
