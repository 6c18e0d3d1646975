use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dr_domain::config::Config;
use dr_gateway::cli::{Cli, Command, ConfigCommand};
use dr_gateway::state::AppState;
use dr_gateway::{api, services};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let config = Config::load(&cli.config).context("loading configuration")?;
            run_server(config).await
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let config = Config::load(&cli.config).context("loading configuration")?;
            let redacted = config.redacted();
            println!("{}", serde_json::to_string_pretty(&redacted)?);
            Ok(())
        }
        Some(Command::Version) => {
            println!("drawroom {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,dr_gateway=debug")),
        )
        .json()
        .init();
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    tracing::info!("drawroom starting");

    let host = config.server.host.clone();
    let port = config.server.port;

    let state = AppState::new(config);

    let turn_processor_handle = services::turn_processor::start(state.clone());
    *state.turn_processor.lock() = Some(turn_processor_handle);
    tracing::info!("turn processor started");

    let app = api::router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "drawroom listening");

    axum::serve(listener, app).await.context("axum server error")?;

    Ok(())
}
