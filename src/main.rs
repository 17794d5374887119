use anyhow::Result;
use clap::Parser;
use inventory_sync::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    inventory_sync::cli::init_tracing(cli.log_level.as_deref())?;

    match cli.cmd {
        Commands::Replay(args) => {
            let output = inventory_sync::cli::replay(&args).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
