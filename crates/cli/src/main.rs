use clap::Parser;
use std::path::PathBuf;

mod commands;

use commands::Commands;

#[derive(Parser)]
#[command(name = "urlcache")]
#[command(about = "Inspect and maintain an HTTP response cache directory", long_about = None)]
#[command(version)]
struct Cli {
    /// Cache root directory (overrides URLCACHE_ROOT and the config file)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = urlcache_utils::tracing::init() {
        eprintln!("failed to initialise logging: {e}");
    }

    let cli = Cli::parse();
    cli.command.execute(cli.root).await
}
