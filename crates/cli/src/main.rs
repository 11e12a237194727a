//! `checkout` binary entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use checkout_cli::{Cart, Config, LogFormat};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Parser)]
#[command(name = "checkout", version, about = "Run a checkout session against the commerce backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create or resume the transaction, estimate and order, then submit payment.
    Pay {
        /// Cart file with the service, assets, billing profile and payment method.
        cart: PathBuf,
    },
    /// Mark the session's transaction completed and clear the session.
    Finalize { cart: PathBuf },
    /// Mark the session's transaction failed so the next run starts over.
    Abandon {
        cart: PathBuf,
        #[arg(long, default_value = "abandoned by buyer")]
        reason: String,
    },
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let (json, text) = match config.log_format {
        LogFormat::Json => (Some(tracing_subscriber::fmt::layer().json()), None),
        LogFormat::Text => (None, Some(tracing_subscriber::fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .init();
}

async fn run(cli: Cli, config: Config) -> checkout_cli::Result<serde_json::Value> {
    let flow = checkout_cli::build_flow(&config)?;

    match cli.command {
        Command::Pay { cart } => checkout_cli::pay(&flow, &Cart::from_path(&cart)?).await,
        Command::Finalize { cart } => checkout_cli::finalize(&flow, &Cart::from_path(&cart)?).await,
        Command::Abandon { cart, reason } => {
            checkout_cli::abandon(&flow, &Cart::from_path(&cart)?, &reason).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::from_env();
    init_tracing(&config);

    match run(cli, config).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to render output");
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            tracing::error!(error = %err, "checkout failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
