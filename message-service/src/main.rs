use anyhow::Result;
use clap::Parser;
use message_service::{
    init_tracing, run_reconcile, run_seed, run_server, Cli, Commands, ServiceConfig,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = ServiceConfig::load()?;
    config.validate()?;
    init_tracing(config.log_file.as_deref())?;

    match cli.command() {
        Commands::Serve => run_server(config).await,
        Commands::Reconcile { batch_size } => {
            let report = run_reconcile(&config, batch_size).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Seed { count, users } => {
            let inserted = run_seed(&config, count, users).await?;
            info!(inserted, "Seed complete");
            Ok(())
        }
    }
}
