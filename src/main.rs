use clap::Parser;
use quiver::commands::Commands;
use quiver::{cli, common};

#[derive(Parser)]
#[command(name = "quiver")]
#[command(about = "Collection-based API test runner with pluggable protocols")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    common::logging::init_cli();

    let args = Cli::parse();
    if let Err(e) = cli::dispatch(args.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
