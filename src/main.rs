// Auction room client entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not the terminal)
// 2. Load config
// 3. Open the session store
// 4. Connect the auction channel (lazy singleton, owned here)
// 5. Build the room controller
// 6. Spawn the stdin command reader
// 7. Run the room event loop until quit

use bidroom::api::RestApi;
use bidroom::channel::AuctionChannel;
use bidroom::config;
use bidroom::console::{self, Command};
use bidroom::room::{self, RoomController};
use bidroom::session::SessionStore;

use std::sync::Arc;

use anyhow::Context;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("auction client starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "config loaded: socket={}, api={}",
        config.server.socket_url, config.server.api_url
    );

    let session =
        SessionStore::open(&config.session.db_path).context("failed to open session store")?;
    match session.user() {
        Ok(Some(user)) => info!("session user: {} ({})", user.name, user.id),
        Ok(None) => info!("no stored session, joining as anonymous viewer"),
        Err(e) => warn!("stored session unreadable: {e}"),
    }

    let resume_tournament = session.selected_tournament().unwrap_or_default();

    let mut channel = AuctionChannel::new(
        config.server.socket_url.clone(),
        config.channel.event_capacity,
    );
    let (handle, events) = channel.connect();

    let api = Arc::new(RestApi::new(config.server.api_url.clone()));
    let mut controller = RoomController::new(handle, api, session, &config.ui);

    // Convenience: re-enter the previously selected room on startup.
    if let Some(tournament_id) = resume_tournament {
        info!("resuming previously selected tournament {tournament_id}");
        controller
            .handle_command(Command::Join(tournament_id), tokio::time::Instant::now())
            .await;
    }

    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    tokio::spawn(read_commands(cmd_tx));

    println!("{}", console::usage());
    room::run(controller, events, cmd_rx).await?;

    channel.disconnect();
    info!("auction client shut down cleanly");
    Ok(())
}

/// Read stdin lines, parse them, and forward commands to the event loop.
/// `help` and parse errors are answered here without a round trip.
async fn read_commands(cmd_tx: mpsc::Sender<Command>) {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "help" {
            println!("{}", console::usage());
            continue;
        }
        match console::parse_command(line) {
            Ok(command) => {
                let quit = command == Command::Quit;
                if cmd_tx.send(command).await.is_err() || quit {
                    break;
                }
            }
            Err(message) => println!("{message}"),
        }
    }
}

/// Initialize tracing to log to a file (the terminal belongs to the
/// console frontend).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let log_file = std::fs::File::create(log_dir.join("bidroom.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bidroom=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
