use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use osm_isochrone::api::{self, AppState};
use osm_isochrone::config::{Cli, Command, QueryArgs, ServeArgs};
use osm_isochrone::{isochrone, IsochroneResponse};

const DEFAULT_LOG_FILTER: &str = "osm_isochrone=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Query(args) => query(args),
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let addr = args.addr().context("invalid listen address")?;
    let network = args
        .network
        .load_network()
        .with_context(|| format!("loading {}", args.network.osm.display()))?;
    let state = Arc::new(AppState::new(network, args.network.service_config()));
    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "isochrone service listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn query(args: QueryArgs) -> Result<()> {
    let network = args
        .network
        .load_network()
        .with_context(|| format!("loading {}", args.network.osm.display()))?;
    let config = args.network.service_config();

    let started = Instant::now();
    let (_, outcome) = isochrone::process(
        &args.raw_query(),
        &args.hints(),
        &network,
        &config.isoline_builder(),
        config.max_visited_nodes,
    )?;
    let response = IsochroneResponse::new(outcome.payload, &config.copyrights, started.elapsed());

    let json = if args.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{json}");
    Ok(())
}
