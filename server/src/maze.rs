//! Randomized depth-first maze carving
//!
//! The grid starts solid. Carving begins at (1,1) and jumps two cells at a
//! time, opening the cell in between, so passages run along odd coordinates
//! and walls along even ones. Each visited cell tries the four directions in
//! a freshly shuffled order. The exit is placed on the right border next to
//! the lowest open cell of the second-to-last column.

use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{Maze, Position, MAX_MAZE_CELLS, MIN_MAZE_SIZE};
use thiserror::Error;

const CARVE_START: Position = Position::new(1, 1);

/// Base direction order before shuffling: down, up, right, left.
const CARVE_STEPS: [(i32, i32); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MazeError {
    #[error("maze of {width}x{height} is below the 5x5 minimum")]
    TooSmall { width: i32, height: i32 },
    #[error("maze dimensions must be odd, got {width}x{height}")]
    EvenDimension { width: i32, height: i32 },
    #[error("maze of {width}x{height} has too many cells to broadcast")]
    TooLarge { width: i32, height: i32 },
}

/// Checks the size precondition without generating anything. Returns the
/// number of cells.
pub fn validate_dimensions(width: i32, height: i32) -> Result<usize, MazeError> {
    if width < MIN_MAZE_SIZE || height < MIN_MAZE_SIZE {
        return Err(MazeError::TooSmall { width, height });
    }
    if width % 2 == 0 || height % 2 == 0 {
        return Err(MazeError::EvenDimension { width, height });
    }
    cell_count(width, height)
        .filter(|&cells| cells <= MAX_MAZE_CELLS)
        .ok_or(MazeError::TooLarge { width, height })
}

fn cell_count(width: i32, height: i32) -> Option<usize> {
    let width = usize::try_from(width).ok()?;
    let height = usize::try_from(height).ok()?;
    width.checked_mul(height)
}

/// Generates a new maze. The result depends only on the draws taken from `rng`.
pub fn generate<R: Rng + ?Sized>(width: i32, height: i32, rng: &mut R) -> Result<Maze, MazeError> {
    let cells = validate_dimensions(width, height)?;

    let mut grid = Grid::solid(width, height, cells);
    grid.open(CARVE_START);
    carve(&mut grid, rng);

    let exit = locate_exit(&grid);
    debug!("Generated {}x{} maze with exit at {}", width, height, exit);
    Ok(Maze::new(width, height, grid.walls, exit))
}

struct Grid {
    width: i32,
    height: i32,
    walls: Vec<bool>,
}

impl Grid {
    fn solid(width: i32, height: i32, cells: usize) -> Self {
        Self {
            width,
            height,
            walls: vec![true; cells],
        }
    }

    fn contains(&self, position: Position) -> bool {
        position.x >= 0 && position.x < self.width && position.y >= 0 && position.y < self.height
    }

    fn is_wall(&self, position: Position) -> bool {
        !self.contains(position) || self.walls[self.index(position)]
    }

    fn open(&mut self, position: Position) {
        let index = self.index(position);
        self.walls[index] = false;
    }

    fn index(&self, position: Position) -> usize {
        (position.y * self.width + position.x) as usize
    }
}

/// A cell on the carve stack together with the directions it still has to try.
struct Frame {
    cell: Position,
    steps: [(i32, i32); 4],
    next: usize,
}

impl Frame {
    fn enter<R: Rng + ?Sized>(cell: Position, rng: &mut R) -> Self {
        let mut steps = CARVE_STEPS;
        steps.shuffle(rng);
        Self {
            cell,
            steps,
            next: 0,
        }
    }
}

/// Iterative form of the recursive carve. Draws happen on entering a cell,
/// and each direction is checked only once the previous branch is finished,
/// exactly as the recursion would.
fn carve<R: Rng + ?Sized>(grid: &mut Grid, rng: &mut R) {
    let mut stack = vec![Frame::enter(CARVE_START, rng)];

    while let Some(frame) = stack.last_mut() {
        if frame.next == frame.steps.len() {
            stack.pop();
            continue;
        }

        let (dx, dy) = frame.steps[frame.next];
        frame.next += 1;

        let cell = frame.cell;
        let target = Position::new(cell.x + dx * 2, cell.y + dy * 2);
        if grid.contains(target) && grid.is_wall(target) {
            grid.open(Position::new(cell.x + dx, cell.y + dy));
            grid.open(target);
            stack.push(Frame::enter(target, rng));
        }
    }
}

fn locate_exit(grid: &Grid) -> Position {
    let column = grid.width - 2;
    (1..=grid.height - 2)
        .rev()
        .find(|&y| !grid.is_wall(Position::new(column, y)))
        .map(|y| Position::new(grid.width - 1, y))
        .unwrap_or(Position::new(grid.width - 1, grid.height - 2))
}
