//! script-dap - a Debug Adapter Protocol server for an embedded script engine
//!
//! `serve` runs the DAP listener for editors; `run` executes a script
//! directly without a debugger attached.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use script_dap::common::{config::Config, logging};
use script_dap::engine::Engine;

#[derive(Parser)]
#[command(name = "script-dap", about = "DAP server for the embedded script engine")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the DAP server
    Serve {
        /// Port to listen on (default from config, 4711)
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind (default from config, 127.0.0.1)
        #[arg(long)]
        host: Option<IpAddr>,
    },

    /// Execute a script without a debugger
    Run {
        /// Path to the script
        script: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let is_server = matches!(cli.command, Commands::Serve { .. });
    if is_server {
        if let Some(log_path) = logging::init_server() {
            eprintln!("Server logging to: {}", log_path.display());
        }
    } else {
        logging::init_cli();
    }

    let result = match cli.command {
        Commands::Serve { port, host } => {
            let mut config = match Config::load() {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                }
            };
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            script_dap::dap::serve(config).await
        }
        Commands::Run { script } => run_script(&script),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run_script(path: &Path) -> script_dap::Result<()> {
    let source = std::fs::read_to_string(path).map_err(|e| script_dap::Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;
    let program = script_dap::engine::parse(&source)?;
    let engine = Engine::new();
    engine.run(&path.display().to_string(), &program)
}
