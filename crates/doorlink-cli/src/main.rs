//! `doorlink` command-line tool.
//!
//! `doorlink simulate` runs a terminal and a gateway against each other over
//! an in-memory link, with a simulated network, broker and backend.
//! `doorlink tag` prints the integrity tag of an access event.

mod provisioning;
mod simulate;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use doorlink_core::{CardUid, DoorId};

use crate::provisioning::Provisioning;

#[derive(Parser, Debug)]
#[command(
    name = "doorlink",
    about = "Door terminal and gateway bench tools",
    author,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a terminal and a gateway over a simulated link
    Simulate(SimulateArgs),
    /// Print the integrity tag of an access event
    Tag(TagArgs),
}

#[derive(Args, Debug)]
struct SimulateArgs {
    #[arg(
        long,
        short = 'c',
        value_name = "PATH",
        help = "JSON provisioning file with `terminal` and `gateway` sections"
    )]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[arg(
        long = "allow",
        value_name = "UID",
        help = "Card UID the simulated backend grants (repeatable)"
    )]
    allow: Vec<String>,

    #[arg(
        long,
        value_name = "MS",
        default_value_t = 1_500,
        help = "Time the simulated network takes to accept a join"
    )]
    join_delay_ms: u64,

    #[arg(
        long,
        value_name = "MS",
        default_value_t = 2_500,
        help = "Spacing between scripted card presentations"
    )]
    scan_every_ms: u64,

    #[arg(
        long,
        value_name = "SECS",
        default_value_t = 20,
        help = "How long to run before printing the summary"
    )]
    duration_secs: u64,

    #[arg(value_name = "UID", help = "Card UIDs presented to the reader, in order")]
    cards: Vec<String>,
}

/// Command-line values that take precedence over the provisioning file.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    #[arg(long, value_name = "NAME", help = "Network name")]
    pub ssid: Option<String>,

    #[arg(long, value_name = "SECRET", help = "Network secret")]
    pub password: Option<String>,

    #[arg(long, value_name = "HOST", help = "Broker address")]
    pub broker: Option<String>,

    #[arg(long, value_name = "PORT", help = "Broker port")]
    pub port: Option<u16>,

    #[arg(long = "door-id", value_name = "ID", help = "Door identifier")]
    pub door_id: Option<String>,

    #[arg(long, value_name = "TOKEN", help = "Terminal auth token")]
    pub token: Option<String>,
}

#[derive(Args, Debug)]
struct TagArgs {
    #[arg(value_name = "UID")]
    card: String,

    #[arg(value_name = "DOOR")]
    door: String,

    #[arg(value_name = "MS", help = "Milliseconds since terminal boot")]
    timestamp: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    debug!(command = ?cli.command, "parsed command line");

    match cli.command {
        Command::Simulate(args) => run_simulation(args).await,
        Command::Tag(args) => print_tag(&args),
    }
}

async fn run_simulation(args: SimulateArgs) -> Result<()> {
    let provisioning = match &args.config {
        Some(path) => Provisioning::load(path)?,
        None => Provisioning::default(),
    };
    let setup = provisioning.resolve(&args.overrides)?;
    setup.validate()?;

    let cards = parse_cards(&args.cards)?;
    let allow = parse_cards(&args.allow)?;

    let plan = simulate::Plan {
        cards,
        allow,
        join_delay: std::time::Duration::from_millis(args.join_delay_ms),
        scan_every: std::time::Duration::from_millis(args.scan_every_ms),
        duration: std::time::Duration::from_secs(args.duration_secs),
    };
    let summary = simulate::run(setup, plan).await?;
    println!("{summary}");
    Ok(())
}

fn print_tag(args: &TagArgs) -> Result<()> {
    let card = CardUid::new(&args.card).context("invalid card UID")?;
    let door = DoorId::new(&args.door).context("invalid door id")?;
    let tag = doorlink_protocol::tag(card.as_str(), door.as_str(), args.timestamp);
    println!("{tag}");
    Ok(())
}

fn parse_cards(raw: &[String]) -> Result<Vec<CardUid>> {
    raw.iter()
        .map(|uid| CardUid::new(uid).with_context(|| format!("invalid card UID '{uid}'")))
        .collect()
}
