use clap::{command, Parser, Subcommand};
use tracing::{error, info, subscriber::set_global_default};
use tracing_subscriber::filter::EnvFilter;

use sealkv_client::{inspect, replay};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Logging level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Clone, Debug)]
enum Commands {
    /// Verify a captured proof bundle against the persisted trust anchor
    VerifyBundle(replay::VerifyBundleArgs),
    /// Inspect the persisted trust anchor
    Anchor(inspect::InspectArgs),
}

fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber_builder =
        tracing_subscriber::fmt::Subscriber::builder().with_env_filter(env_filter);

    let subscriber = subscriber_builder.with_writer(std::io::stderr).finish();
    set_global_default(subscriber).expect("Failed to set subscriber");
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let res = match cli.command {
        Commands::VerifyBundle(args) => replay::run(args).await,
        Commands::Anchor(args) => inspect::run(args),
    };

    match res {
        Ok(_) => {
            info!("sealkv has exited without errors");
            std::process::exit(0);
        }
        Err(err) => {
            error!("sealkv has exited with error: {}", err);
            std::process::exit(1);
        }
    }
}
