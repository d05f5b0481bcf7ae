use clap::{Parser, Subcommand};
use swap_nursery::NurseryConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "swap-nursery")]
#[command(about = "Swap Nursery: coordinator for submarine, reverse and chain atomic swaps")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load configuration and report readiness. Wiring in the concrete chain
    /// clients, wallets, contract handlers and repositories is left to the
    /// embedding service; those adapters are out of scope here.
    Start {
        #[arg(long)]
        config: Option<String>,
    },
    /// Load configuration and print the resolved values, without starting anything.
    Config {
        #[arg(long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config } => {
            let config = match NurseryConfig::load(config.as_deref()) {
                Ok(config) => config,
                Err(err) => {
                    tracing::error!(%err, "failed to load configuration");
                    std::process::exit(1);
                }
            };
            tracing::info!(
                utxo_confirmations = config.confirmations.utxo_confirmations,
                evm_confirmations = config.confirmations.evm_confirmations,
                retry_interval_seconds = config.retry.retry_interval_seconds,
                "swap nursery configuration loaded; awaiting collaborator wiring from the embedding service"
            );
        }
        Commands::Config { config } => match NurseryConfig::load(config.as_deref()) {
            Ok(config) => println!("{config:#?}"),
            Err(err) => {
                eprintln!("failed to load configuration: {err}");
                std::process::exit(1);
            }
        },
    }
}
