use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use kubelog_k8s::KubeClient;
use kubelog_logs::KubeLogSource;
use kubelog_server::{AppState, ConfigOverrides, FileConfig, GatewayConfig};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on [default: 0.0.0.0:8080]
    #[arg(long, env = "KUBELOG_LISTEN")]
    listen: Option<SocketAddr>,

    /// Namespace to serve (defaults to the pod's own namespace, then the
    /// kubeconfig context's)
    #[arg(long, short = 'n', env = "KUBELOG_NAMESPACE")]
    namespace: Option<String>,

    /// Shared secret clients must present; unset means no authentication
    #[arg(long, env = "LOGKEY", hide_env_values = true)]
    key: Option<String>,

    /// TOML file with gateway settings
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

pub async fn run(args: ServeArgs) -> Result<()> {
    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    let config = GatewayConfig::resolve(
        file,
        ConfigOverrides {
            listen: args.listen,
            namespace: args.namespace,
            api_key: args.key,
        },
    );

    if config.api_key.is_none() {
        warn!("no API key configured; every route is open");
    }

    let kube = KubeClient::connect(config.namespace.as_deref()).await?;
    let source = KubeLogSource::new(kube.client());
    let state = AppState::new(config, Arc::new(kube), Arc::new(source));

    kubelog_server::serve(state, shutdown_signal())
        .await
        .context("Gateway server failed")?;

    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
