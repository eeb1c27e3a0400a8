use clap::Parser;
use inkwell::cli::{Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkwell=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init { path, name }) => {
            inkwell::cli::init::run(path, name).await?;
        }
        Some(Commands::Serve { host, port }) => {
            inkwell::cli::serve::run(&cli.config, host, port).await?;
        }
        Some(Commands::Migrate) => {
            inkwell::cli::migrate::run(&cli.config).await?;
        }
        Some(Commands::User { command }) => {
            inkwell::cli::user::run(&cli.config, command).await?;
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
        }
    }

    Ok(())
}
