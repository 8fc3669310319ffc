use clap::{Parser, Subcommand};
use log::{error, info};
use monitor::{AdminList, AggregatedRecord, Monitor, ProbeScheduler, Registry, StatusProbe};
use shared::StatusResult;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Parser, Debug)]
#[command(author, version, about = "Status monitor for SA-MP game servers", long_about = None)]
struct Args {
    /// Registry file holding the monitored servers
    #[arg(short, long, default_value = "servers.json")]
    registry: PathBuf,

    /// Maximum number of probes in flight
    #[arg(short, long, default_value_t = monitor::DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Per-probe reply timeout in milliseconds
    #[arg(short, long, default_value = "1500")]
    timeout_ms: u64,

    /// Give up on a whole probe cycle after this many milliseconds
    #[arg(short, long)]
    deadline_ms: Option<u64>,

    /// Callers allowed to remove servers (repeatable)
    #[arg(long = "admin", default_value = "admin")]
    admins: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe every registered server once
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Probe every registered server repeatedly until interrupted
    Watch {
        #[arg(short, long, default_value = "30")]
        interval_secs: u64,
        #[arg(long)]
        json: bool,
    },
    /// Register a server
    Add {
        host: String,
        port: u16,
        /// Who is adding it
        #[arg(long = "by")]
        added_by: String,
    },
    /// Unregister a server
    Remove {
        host: String,
        port: u16,
        /// Identity of the caller, checked against the admin list
        #[arg(long = "as")]
        caller: String,
    },
    /// Show registered servers without probing them
    List,
    /// Probe a single address, registered or not
    Probe {
        host: String,
        port: u16,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    let registry = Arc::new(Registry::open(&args.registry).await?);
    let mut scheduler = ProbeScheduler::new(
        StatusProbe::new(Duration::from_millis(args.timeout_ms)),
        args.concurrency,
    );
    if let Some(deadline_ms) = args.deadline_ms {
        scheduler = scheduler.with_batch_deadline(Duration::from_millis(deadline_ms));
    }
    let monitor = Monitor::new(registry, scheduler, Box::new(AdminList::new(args.admins)));

    match args.command {
        Command::Status { json } => {
            let records = monitor.status().await;
            print_records(&records, json)?;
        }
        Command::Watch {
            interval_secs,
            json,
        } => {
            tokio::select! {
                _ = watch(&monitor, Duration::from_secs(interval_secs.max(1)), json) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down");
                }
            }
        }
        Command::Add {
            host,
            port,
            added_by,
        } => {
            let endpoint = monitor.add(&host, port, &added_by).await?;
            println!("Added {}", endpoint.address());
        }
        Command::Remove { host, port, caller } => {
            let endpoint = monitor.remove(&caller, &host, port).await?;
            println!("Removed {} (added by {})", endpoint.address(), endpoint.added_by);
        }
        Command::List => {
            for endpoint in monitor.list().await {
                println!("{:<21} {}", endpoint.address(), endpoint.added_by);
            }
        }
        Command::Probe { host, port, json } => {
            let status = monitor.probe_one(&host, port).await;
            print_status(&host, port, &status, json)?;
        }
    }

    Ok(())
}

/// Runs probe cycles forever, logging servers that change state.
async fn watch(monitor: &Monitor, period: Duration, json: bool) {
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_seen: HashMap<String, bool> = HashMap::new();

    loop {
        timer.tick().await;

        let records = monitor.status().await;
        for record in &records {
            let address = record.endpoint.address();
            let online = record.status.online;
            match last_seen.insert(address.clone(), online) {
                Some(previous) if previous != online => {
                    info!(
                        "{} ({}) is now {}",
                        address,
                        record.display_name(),
                        if online { "online" } else { "offline" }
                    );
                }
                _ => {}
            }
        }
        last_seen.retain(|address, _| records.iter().any(|r| r.endpoint.address() == *address));

        if let Err(e) = print_records(&records, json) {
            error!("Failed to print probe cycle: {}", e);
        }
    }
}

fn print_records(records: &[AggregatedRecord], json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }

    println!("{:<21} {:<7} {:>9}  NAME", "ADDRESS", "STATUS", "PLAYERS");
    for record in records {
        println!(
            "{:<21} {:<7} {:>9}  {}",
            record.endpoint.address(),
            if record.status.online { "ONLINE" } else { "OFFLINE" },
            format!("{}/{}", record.players(), record.max_players()),
            record.display_name()
        );
    }
    Ok(())
}

fn print_status(
    host: &str,
    port: u16,
    status: &StatusResult,
    json: bool,
) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(status)?);
        return Ok(());
    }

    let fallback = format!("{}:{}", host, port);
    if status.online {
        println!(
            "ONLINE ({}/{}) {}",
            status.players_or_zero(),
            status.max_players_or_zero(),
            status.hostname_or(&fallback)
        );
    } else {
        println!("OFFLINE {}", fallback);
    }
    Ok(())
}
