use clap::Parser;
use log::{error, info};
use server::network::{Server, ServerConfig};
use shared::{DEFAULT_PORT, MAZE_HEIGHT, MAZE_WIDTH};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Maze width, odd and at least 5; width times height at most 524288 cells
    #[arg(long, default_value_t = MAZE_WIDTH)]
    width: i32,

    /// Maze height, odd and at least 5
    #[arg(long, default_value_t = MAZE_HEIGHT)]
    height: i32,

    /// Seed for reproducible mazes and spawns
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ServerConfig {
        maze_width: args.width,
        maze_height: args.height,
        seed: args.seed,
    };
    let address = format!("{}:{}", args.host, args.port);

    info!("Starting server on {}", address);
    info!("Maze size: {}x{}", config.maze_width, config.maze_height);

    let server = match Server::new(&address, config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start server: {}", e);
            return Err(e);
        }
    };

    tokio::select! {
        _ = server.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
