use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logspan")]
#[command(about = "Export CloudWatch Logs Insights results over any time span", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Run,
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logspan=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config_path = logspan::config::resolve_config_path(cli.config.as_deref());

    let result = match cli.command {
        Some(Commands::Run) | None => logspan::cli::run::run(config_path).await,
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => logspan::cli::config::init(stdout),
            ConfigAction::Validate => logspan::cli::config::validate(config_path),
        },
    };

    // Fatal errors end the process without waiting for in-flight queries.
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
