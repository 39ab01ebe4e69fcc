use clap::Parser;
use smart_money::cli::{Cli, Commands};
use smart_money::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Parse configuration (validated once telemetry is installed)
    let config = Config::read(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize telemetry
    let _telemetry = smart_money::telemetry::init_telemetry(&config.telemetry)?;
    let config = config.validated();

    match cli.command {
        Commands::Run(args) => {
            tracing::info!(symbols = ?config.feed.symbols, "Starting live detection");
            args.execute(config).await?;
        }
        Commands::Detect(args) => {
            tracing::info!(instrument = %args.symbol, "Running single detection");
            args.execute(config).await?;
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
