use clap::Parser;
use log::info;
use responder::Responder;
use shared::InfoReply;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Answers SA-MP info queries with fixed values", long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "7777")]
    port: u16,

    /// Advertised server name
    #[arg(short = 'n', long, default_value = "Local Test Server")]
    hostname: String,

    /// Advertised player count
    #[arg(long, default_value = "0")]
    players: u16,

    /// Advertised player limit
    #[arg(long, default_value = "50")]
    max_players: u16,

    /// Advertise the server as password protected
    #[arg(long)]
    passworded: bool,

    #[arg(long)]
    gamemode: Option<String>,

    #[arg(long)]
    language: Option<String>,

    /// Delay every reply by this many milliseconds
    #[arg(short = 'd', long, default_value = "0")]
    delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let info = InfoReply {
        passworded: args.passworded,
        players: args.players,
        max_players: args.max_players,
        hostname: args.hostname,
        gamemode: args.gamemode,
        language: args.language,
    };

    let address = format!("{}:{}", args.host, args.port);
    let mut responder = Responder::bind(&address, info).await?;
    if args.delay_ms > 0 {
        info!("Delaying replies by {}ms", args.delay_ms);
        responder = responder.with_delay(Duration::from_millis(args.delay_ms));
    }

    tokio::select! {
        result = responder.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
