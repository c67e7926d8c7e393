use clap::Parser;
use client::game::ClientView;
use client::input::{self, InputAction};
use client::network::{self, ServerEvent};
use client::rendering;
use log::info;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:12345")]
    server: String,

    /// Display name, asked for on startup when omitted
    #[arg(short = 'n', long)]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let name = match args.name {
        Some(name) => name,
        None => {
            print!("Enter your player name: ");
            std::io::stdout().flush()?;
            lines.next_line().await?.unwrap_or_default()
        }
    };
    let name = name.trim().to_string();

    info!("Starting client...");
    info!("Controls: up/down/left/right, w/a/s/d or h/j/k/l, q to quit");

    let (commands, mut events) = network::connect(&args.server, &name).await?;
    println!("Connected to {}", args.server);

    let mut view = ClientView::new(name);

    loop {
        tokio::select! {
            event = events.recv() => {
                let event = event.unwrap_or(ServerEvent::Disconnected);
                view.apply_event(event);

                if let Some(winner) = view.winner() {
                    print!("{}", rendering::render_winner(winner));
                    break;
                }
                if !view.is_connected() {
                    eprintln!("Disconnected from server");
                    break;
                }

                print!("{}{}{}", rendering::CLEAR_SCREEN, rendering::render(&view), rendering::PROMPT);
                std::io::stdout().flush()?;
            }

            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match input::parse_line(&line) {
                    InputAction::Move(command) => commands.send(command)?,
                    InputAction::Quit => break,
                    InputAction::None => {}
                }
            }
        }
    }

    Ok(())
}
