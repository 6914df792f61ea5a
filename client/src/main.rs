use clap::Parser;
use client::config::SessionConfig;
use client::input::{parse_line, Command, HELP};
use client::loopback::{LoopbackConfig, LoopbackGateway};
use client::network::Client;
use client::preferences::FilePreferences;
use client::rendering::{describe, Renderer};
use log::info;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File the color preference is stored in
    #[arg(long, default_value = "relay_prefs.json")]
    prefs: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "50")]
    fake_ping: u64,

    /// How long a shockwave stays on screen, in milliseconds
    #[arg(long, default_value_t = shared::EFFECT_LIFETIME_MS)]
    effect_lifetime_ms: u64,

    /// Lobby type to find or create
    #[arg(long, default_value = shared::GAME_TYPE)]
    game_type: String,

    /// Play alone, without the simulated second player
    #[arg(long)]
    no_bot: bool,

    /// Let the simulated player leave after this many relay messages
    #[arg(long)]
    bot_moves: Option<u32>,

    /// Seed for the simulated player
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting session client...");
    info!("Preferences: {}", args.prefs);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }

    let config = SessionConfig::default()
        .with_game_type(args.game_type)
        .with_effect_lifetime(Duration::from_millis(args.effect_lifetime_ms));
    let loopback = LoopbackConfig {
        latency: Duration::from_millis(args.fake_ping),
        bot: !args.no_bot,
        bot_moves: args.bot_moves,
        seed: args.seed,
        ..LoopbackConfig::default()
    };

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let gateway = LoopbackGateway::new(event_tx, loopback);
    let preferences = FilePreferences::open(&args.prefs);
    let (mut client, handle) = Client::new(gateway, preferences, config, event_rx);

    let mut snapshots = handle.snapshots.clone();
    let render_task = tokio::spawn(async move {
        let mut renderer = Renderer::new();
        loop {
            let frame = renderer.render(&snapshots.borrow_and_update());
            if let Some(frame) = frame {
                println!("\n{}", frame);
            }
            if snapshots.changed().await.is_err() {
                break;
            }
        }
    });

    let intents = handle.intents;
    let status = handle.snapshots;
    let input_task = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Ok(Some(line)) = lines.next_line().await {
            match parse_line(&line) {
                Ok(Command::Intent(intent)) => {
                    if intents.send(intent).is_err() {
                        break;
                    }
                }
                Ok(Command::Status) => println!("{}", describe(&status.borrow())),
                Ok(Command::Help) => println!("{}", HELP),
                Ok(Command::Quit) => break,
                Err(client::input::InputError::Empty) => {}
                Err(e) => eprintln!("{}", e),
            }
        }
    });

    client.run().await;

    input_task.abort();
    render_task.abort();
    info!("Session client stopped");

    Ok(())
}
