use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use mindshift::config::MindshiftToml;

mod cmd;

#[derive(Parser)]
#[command(name = "mindshift")]
#[command(version, about = "Scripted Mind Shifting treatment sessions")]
pub struct Cli {
    /// Path to a mindshift.toml configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind (overrides the config file)
        #[arg(long)]
        bind: Option<String>,

        /// Also write logs to a daily-rolling file
        #[arg(long)]
        log_file: bool,
    },

    /// Run an interactive session in the terminal
    Run {
        /// Treatment modality for the session
        #[arg(short, long, default_value = "problem_shifting")]
        modality: String,

        /// Never consult the assist service; unclear input re-asks the
        /// current prompt instead
        #[arg(long)]
        script_mode: bool,

        /// User id recorded on the session
        #[arg(long)]
        user: Option<String>,
    },

    /// Inspect and lint the treatment scripts
    Script {
        #[command(subcommand)]
        command: Option<ScriptCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ScriptCommands {
    /// List every modality script
    List,

    /// Print one modality's phases, steps, and prompts
    Show { modality: String },

    /// Statically check every script for defects
    Lint,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = MindshiftToml::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve {
            port,
            bind,
            log_file,
        } => cmd::cmd_serve(&config, port, bind, log_file).await,
        Commands::Run {
            modality,
            script_mode,
            user,
        } => cmd::cmd_run(&config, &modality, script_mode, user).await,
        Commands::Script { command } => cmd::cmd_script(&config, command),
    }
}
