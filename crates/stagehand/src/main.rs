//! stagehand - MCP bridge daemon for a host DAW.
//!
//! Subcommands:
//! - `stagehand mcp` - Run the MCP server over stdio (for agent clients)
//! - `stagehand ping` - Probe the DAW TCP port and the OSC bridge
//! - `stagehand send <json>` - Send one raw DAW command (debugging)
//!
//! Configuration is loaded from (in order, later wins):
//! 1. Compiled defaults
//! 2. /etc/stagehand/config.toml
//! 3. ~/.config/stagehand/config.toml
//! 4. ./stagehand.toml (or --config path)
//! 5. Environment variables (TCP_PORT, OSC_SEND_PORT, DASHBOARD_ENABLED, ...)

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use livewire::command::DawCommand;
use stagehand::config::Config;
use stagehand::singleton::SingletonGuard;
use stagehand::state::App;
use stagehand::{mcp, web};
use tracing::info;

/// Exit codes promised to supervisors.
const EXIT_SINGLETON: u8 = 2;
const EXIT_BIND: u8 = 3;
const EXIT_CONFIG: u8 = 4;

#[derive(Parser)]
#[command(name = "stagehand")]
#[command(about = "MCP bridge daemon for controlling a host DAW")]
#[command(version)]
struct Cli {
    /// Path to config file (overrides ./stagehand.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server over stdio
    Mcp {
        /// Show loaded configuration and exit
        #[arg(long)]
        show_config: bool,
    },

    /// Probe the DAW TCP port and the OSC bridge, print a health summary
    Ping,

    /// Send one raw DAW command as JSON, print the response
    ///
    /// Example: stagehand send '{"type":"get_session_info"}'
    Send {
        /// JSON command ({"type": ..., "params": {...}})
        json: String,

        /// Timeout in milliseconds
        #[arg(short, long, default_value = "10000")]
        timeout: u64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (config, sources) = match Config::load_with_sources_from(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    init_tracing(&config);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Mcp { show_config } => {
            if show_config {
                println!("# Configuration sources:");
                for path in &sources.files {
                    println!("#   - {}", path.display());
                }
                if !sources.env_overrides.is_empty() {
                    println!("# Environment overrides: {:?}", sources.env_overrides);
                }
                println!();
                println!("{}", config.to_toml());
                return ExitCode::SUCCESS;
            }
            runtime.block_on(run_mcp(config))
        }
        Commands::Ping => runtime.block_on(run_ping(config)),
        Commands::Send { json, timeout } => runtime.block_on(run_send(config, json, timeout)),
    }
}

/// Stderr logging keeps stdout clean for the MCP protocol.
fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.telemetry.log_level.clone()));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

async fn run_mcp(config: Config) -> ExitCode {
    // Exactly one stagehand per host: the DAW ports cannot be shared.
    let _singleton = match SingletonGuard::acquire(config.ports.sentinel) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!(
                "another stagehand instance is already running (sentinel port {}): {}",
                config.ports.sentinel, e
            );
            return ExitCode::from(EXIT_SINGLETON);
        }
    };

    let dashboard = config.dashboard.clone();
    let app = match App::build(config).await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("startup failed: {}", e);
            return ExitCode::from(EXIT_BIND);
        }
    };

    // Background: populate the catalog once the DAW shows up.
    tokio::spawn(Arc::clone(&app).populate_when_ready());

    if dashboard.enabled {
        tokio::spawn(web::serve(Arc::clone(&app), dashboard.port));
    }

    info!("stagehand {} starting", env!("CARGO_PKG_VERSION"));
    match mcp::run(app).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("MCP server failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_ping(config: Config) -> ExitCode {
    let app = match App::build(config).await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("startup failed: {}", e);
            return ExitCode::from(EXIT_BIND);
        }
    };

    let daw_reachable = app.tcp.probe().await;
    let bridge_version = app.bridge.version().await;
    let report = serde_json::json!({
        "daw_reachable": daw_reachable,
        "bridge_version": bridge_version,
        "catalog": app.catalog.status(),
    });
    println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());

    if daw_reachable {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn run_send(config: Config, json: String, timeout_ms: u64) -> ExitCode {
    let command: DawCommand = match serde_json::from_str(&json) {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("invalid command JSON: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let app = match App::build(config).await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("startup failed: {}", e);
            return ExitCode::from(EXIT_BIND);
        }
    };

    match app
        .pipeline
        .run_daw(command, Some(std::time::Duration::from_millis(timeout_ms)))
        .await
    {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("command failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
