use anyhow::Result;
use clap::{Parser, Subcommand};
use pulse_sync::{run_sync_once, Config};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pulse-cli")]
#[command(about = "Security content sync pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Pull every configured source and upsert into the document store.
    Sync {
        /// Emit the run summary as JSON instead of the text report.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Sync { json: false }) {
        Commands::Sync { json } => {
            let config = Config::from_env()?;
            let summary = run_sync_once(&config).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", summary.render());
            }
            if summary.all_failed() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
