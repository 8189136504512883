use std::process;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use exelixi::cli::Args;
use exelixi::cluster::{format_host_list, HttpStateClient, StateClient};
use exelixi::config::{load_settings, Settings};
use exelixi::dispatch::{DispatchError, InvocationMode, RoleDispatcher, RoleOutcome};
use exelixi::feature::FeatureRegistry;
use exelixi::framework::{
    Collaborators, RestFrameworkLauncher, RestOrchestrator, ServiceExecutorRunner, ShardClient,
};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Load .env file if specified, so RUST_LOG from it applies
    if let Some(ref env_file) = args.env_file {
        if let Err(e) = dotenvy::from_path(env_file) {
            eprintln!("Failed to load env file {}: {}", env_file.display(), e);
            process::exit(1);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = match load_settings(args.config.as_deref()) {
        Ok(s) => s.with_overrides(args.timeout, args.bind_addr.as_deref()),
        Err(e) => fail(format!("Failed to load settings: {}", e)),
    };
    if let Err(e) = settings.validate() {
        fail(e.to_string());
    }

    let mode = match InvocationMode::from_args(&args) {
        Ok(mode) => mode,
        Err(e) => fail(e.to_string()),
    };

    let dispatcher = match build_dispatcher(settings) {
        Ok(d) => d,
        Err(e) => fail(format!("Failed to initialize HTTP clients: {}", e)),
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            interrupt.cancel();
        }
    });

    match dispatcher.dispatch(&mode, &args.feature, cancel).await {
        Ok(RoleOutcome::NodesListed { slaves, .. }) => {
            println!("{}", format_host_list(&slaves));
        }
        Ok(outcome) => info!(?outcome, "{} finished", mode.name()),
        Err(DispatchError::Interrupted) => {
            warn!("interrupted before {} started", mode.name());
            process::exit(130);
        }
        Err(e) => fail(e.to_string()),
    }
}

fn build_dispatcher(settings: Settings) -> Result<RoleDispatcher, anyhow::Error> {
    let state_client: Arc<dyn StateClient> =
        Arc::new(HttpStateClient::new(settings.state_timeout())?);
    let shards = ShardClient::new(settings.state_timeout())?;

    let collaborators = Collaborators {
        launcher: Arc::new(RestFrameworkLauncher::new(
            state_client.clone(),
            shards.clone(),
            &settings,
        )),
        orchestrator: Arc::new(RestOrchestrator::new(shards, &settings)),
        executor: Arc::new(ServiceExecutorRunner::new(&settings)),
    };

    Ok(RoleDispatcher::new(
        settings,
        state_client,
        FeatureRegistry::builtin(),
        collaborators,
    ))
}

fn fail(message: String) -> ! {
    error!("{}", message);
    eprintln!("exelixi: {}", message);
    process::exit(1);
}
