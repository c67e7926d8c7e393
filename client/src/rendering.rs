use crate::game::ClientView;
use std::fmt::Write;

pub const WALL: char = '#';
pub const OPEN: char = ' ';
pub const EXIT: char = 'E';
pub const SELF: char = 'P';
pub const OTHER: char = 'O';

pub const PROMPT: &str = "Your command (up/down/left/right): ";

/// ANSI sequence that clears the screen and homes the cursor.
pub const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Renders the maze, the players on it and the player list as plain text.
pub fn render(view: &ClientView) -> String {
    let Some(maze) = view.maze() else {
        return "Waiting for maze data...\n".to_string();
    };
    if view.players().is_empty() {
        return "Waiting for players...\n".to_string();
    }

    let width = maze.width().max(0) as usize;
    let height = maze.height().max(0) as usize;
    let mut grid: Vec<Vec<char>> = (0..maze.height())
        .map(|y| {
            (0..maze.width())
                .map(|x| if maze.is_wall(x, y) { WALL } else { OPEN })
                .collect()
        })
        .collect();

    let mut place = |x: i32, y: i32, c: char| {
        if x >= 0 && y >= 0 && (x as usize) < width && (y as usize) < height {
            grid[y as usize][x as usize] = c;
        }
    };

    let exit = maze.exit();
    place(exit.x, exit.y, EXIT);

    // Own marker last so it is never hidden by someone on the same cell.
    let my_id = view.my_id();
    for player in view.players().values().filter(|p| Some(p.id) != my_id) {
        place(player.position.x, player.position.y, OTHER);
    }
    if let Some(me) = view.me() {
        place(me.position.x, me.position.y, SELF);
    }

    let mut out = String::new();
    for row in grid {
        out.extend(row);
        out.push('\n');
    }

    out.push_str("\n--- Connected Players ---\n");
    for player in view.players().values() {
        let marker = if Some(player.id) == my_id { " (you)" } else { "" };
        let _ = writeln!(out, "- {}{}", player.name, marker);
    }
    out.push('\n');
    out
}

pub fn render_winner(name: &str) -> String {
    format!("\n*** WINNER: {} ***\n", name)
}
