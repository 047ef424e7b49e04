use clap::Parser;
use reel::cli::{Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reel=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        None => reel::cli::serve::run(&cli.config, None, None, None).await,
        Some(Commands::Serve {
            host,
            port,
            upload_dir,
        }) => reel::cli::serve::run(&cli.config, host, port, upload_dir).await,
        Some(Commands::List { upload_dir }) => reel::cli::list::run(&cli.config, upload_dir),
        Some(Commands::Init { path }) => reel::cli::init::run(&path),
    };

    if let Err(e) = result {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
