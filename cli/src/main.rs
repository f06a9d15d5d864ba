//! gha-gpu-runner - one CI job on one ephemeral GPU instance

use clap::Parser;
use gpu_runner::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = cli.run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
