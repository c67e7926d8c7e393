//! Performance benchmarks for critical game systems

use rand::rngs::StdRng;
use rand::SeedableRng;
use server::game::GameState;
use server::maze;
use shared::{encode_frame, Position, MAZE_HEIGHT, MAZE_WIDTH};
use std::time::Instant;

/// Benchmarks maze generation at the default size
#[test]
fn benchmark_maze_generation() {
    let mut rng = StdRng::seed_from_u64(42);

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = maze::generate(MAZE_WIDTH, MAZE_HEIGHT, &mut rng).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Maze generation: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Earthquakes regenerate on the world task, so this has to stay cheap
    assert!(duration.as_millis() < 2_000);
}

/// Benchmarks generation of the largest accepted maze, which exercises the carve stack
#[test]
fn benchmark_large_maze_generation() {
    let mut rng = StdRng::seed_from_u64(7);

    let start = Instant::now();
    let maze = maze::generate(723, 723, &mut rng).unwrap();
    let duration = start.elapsed();

    println!("723x723 maze generated in {:?}", duration);
    assert_eq!(maze.exit().x, 722);
    assert!(duration.as_secs() < 10);
}

/// Benchmarks command validation and application
#[test]
fn benchmark_command_processing() {
    let mut rng = StdRng::seed_from_u64(1);
    let maze = maze::generate(MAZE_WIDTH, MAZE_HEIGHT, &mut rng).unwrap();
    let mut state = GameState::new(maze);
    let id = state.add_player_at("bench".to_string(), Position::new(1, 1));

    let commands = ["up", "down", "left", "right", "RIGHT ", "noise"];
    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let _ = state.apply_command(id, commands[i % commands.len()]);
    }

    let duration = start.elapsed();
    println!(
        "Command processing: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1_000);
}

/// Benchmarks snapshot construction and encoding with a full room
#[test]
fn benchmark_snapshot_encoding() {
    let mut rng = StdRng::seed_from_u64(2);
    let maze = maze::generate(MAZE_WIDTH, MAZE_HEIGHT, &mut rng).unwrap();
    let mut state = GameState::new(maze);
    for i in 0..32 {
        state.add_player(format!("player{}", i), &mut rng);
    }

    let iterations = 10_000;
    let start = Instant::now();
    let mut bytes = 0;

    for _ in 0..iterations {
        let frame = encode_frame(&state.snapshot()).unwrap();
        bytes += frame.len();
    }

    let duration = start.elapsed();
    println!(
        "Snapshot encoding: {} iterations in {:?} ({:.2} μs/iter, {} bytes/frame)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64,
        bytes / iterations
    );

    assert!(duration.as_millis() < 2_000);
}
