//! `CampusQR` CLI
//!
//! Rotating-QR attendance from the terminal: payloads and outcomes on
//! stdout, logs on stderr.

use std::io::{self, Write};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::info;

use campusqr_cli::config::{GlobalArgs, open_cache};
use campusqr_cli::emit_cmd::{self, EmitArgs};
use campusqr_cli::lab_cmd::{self, LabAction};
use campusqr_cli::manual_cmd::{self, ManualCmd};
use campusqr_cli::{scan_cmd, student_cmd};
use campusqr_core::api::ApiClient;
use campusqr_core::tracing_init::{default_filter, init_tracing};
use campusqr_core::{Emitter, Scanner, SystemClock};

#[derive(Parser, Debug)]
#[command(name = "campusqr")]
#[command(version, about = "Rotating QR attendance check-in", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Log in as a student and cache the identity
    Login {
        #[arg(long)]
        id: String,
        #[arg(long, env = "CAMPUSQR_PASSWORD")]
        password: String,
    },
    /// Reload year, division and batch from the backend
    Refresh,
    /// Print a rotating attendance token every interval
    Emit(EmitArgs),
    /// Manage lab sessions
    Lab {
        #[command(subcommand)]
        action: LabAction,
    },
    /// Add or remove attendance by hand
    Manual {
        #[command(subcommand)]
        action: ManualCmd,
    },
    /// Scan payloads read line by line from stdin
    Scan,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.global.resolve()?;

    init_tracing(&default_filter(&config.log_level), cli.global.log_json);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        api = %config.api.base_url,
        "Starting campusqr"
    );

    let api = ApiClient::new(&config.api)?;
    let mut out = io::stdout();

    match cli.command {
        Commands::Login { id, password } => {
            let mut cache = open_cache(&config)?;
            student_cmd::login(&api, &mut cache, &id, &password, &mut out).await?;
        }
        Commands::Refresh => {
            let mut cache = open_cache(&config)?;
            student_cmd::refresh(&api, &mut cache, &mut out).await?;
        }
        Commands::Emit(args) => {
            let target = args.target()?;
            let interval = args
                .interval_ms
                .map_or_else(|| config.emitter.interval(), Duration::from_millis);
            let emitter = Emitter::new(args.session, target, SystemClock);
            emit_cmd::stream_tokens(emitter, interval, args.count, &mut out, emit_cmd::ctrl_c())
                .await?;
        }
        Commands::Lab { action } => {
            lab_cmd::run(action, &api, config.emitter.interval(), &mut out).await?;
        }
        Commands::Manual { action } => {
            manual_cmd::run(action, &api, &SystemClock, &mut out).await?;
        }
        Commands::Scan => {
            let mut scanner = Scanner::new(open_cache(&config)?, SystemClock, &config.scanner);
            scanner.activate(&api).await;
            let stdin = BufReader::new(tokio::io::stdin());
            let resolved = scan_cmd::run_scan_loop(&mut scanner, &api, stdin, &mut out).await?;
            info!(resolved, "Scanner closed");
        }
    }

    out.flush()?;
    Ok(())
}
