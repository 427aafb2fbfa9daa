use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tally_classify::ClassifyMode;

mod auth;
mod config;
mod dashboard;
mod ingest_cmd;
mod llm;
mod state;
mod summary_cmd;

#[derive(Parser, Debug)]
#[command(name = "tally", version, about = "Bank statement ingestion, classification and spending dashboard")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse every .ofx statement in a directory, classify and write the CSV
    Ingest {
        /// Statement directory (default from config: ./extratos)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Output CSV (default from config: ./extrato_classificado.csv)
        #[arg(long)]
        out: Option<PathBuf>,

        /// rules-first, model or rules-only
        #[arg(long)]
        mode: Option<ClassifyMode>,
    },

    /// Interactive dashboard over the classified CSV
    View {
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Print one period's metrics, breakdown and transactions
    Summary {
        #[arg(long)]
        file: Option<PathBuf>,

        /// YYYY-MM (default: most recent period in the file)
        #[arg(long)]
        month: Option<String>,

        /// Category label to include; repeat for more (default: all)
        #[arg(long = "category")]
        categories: Vec<String>,
    },

    /// Config file management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// API key storage
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config (~/.tally/config.toml, or ./tally.toml with --local)
    Init {
        #[arg(long)]
        local: bool,
    },
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    /// Store an API key in ~/.tally/auth.json
    PasteApiKey,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Config { command } => match command {
            ConfigCommand::Init { local } => config::init_config(local)?,
        },

        Command::Auth { command } => match command {
            AuthCommand::PasteApiKey => auth::paste_api_key()?,
        },

        Command::Ingest { dir, out, mode } => {
            let cfg = config::load_config()?;
            let dir = dir.unwrap_or_else(|| cfg.ingest.source_dir.clone());
            let out = out.unwrap_or_else(|| cfg.ingest.output.clone());
            let mode = mode.unwrap_or(cfg.classify.mode);
            ingest_cmd::run_ingest(&cfg, &dir, &out, mode)?;
        }

        Command::View { file } => {
            let cfg = config::load_config()?;
            let file = file.unwrap_or_else(|| cfg.ingest.output.clone());
            dashboard::run_dashboard(&file, &cfg.view.currency_symbol)?;
        }

        Command::Summary {
            file,
            month,
            categories,
        } => {
            let cfg = config::load_config()?;
            let file = file.unwrap_or_else(|| cfg.ingest.output.clone());
            summary_cmd::run_summary(&file, month.as_deref(), &categories, &cfg.view.currency_symbol)?;
        }
    }

    Ok(())
}
