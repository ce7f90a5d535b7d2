use clap::Parser;
use db_api_keys::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    cli::run(cli.command).await
}
