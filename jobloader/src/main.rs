use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use resources::{client::KubeClient, config::jobloader::LoaderConfig};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::Level;

use crate::loader::JobLoader;

mod controller;
mod creator;
mod fleet;
mod loader;
#[cfg(test)]
mod testing;
mod utils;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Path to the kubeconfig file, in-cluster config is used when absent.
    #[clap(long, env = "KUBECONFIG")]
    kubeconfig: Option<String>,
    /// Namespace the Jobs are created in.
    #[clap(short, long)]
    namespace: Option<String>,
    /// Number of Jobs kept alive per node.
    #[clap(short, long)]
    jobs_per_node: Option<u64>,
    /// Enable debug logging.
    #[clap(short, long)]
    debug: bool,
    /// Path to the YAML config file.
    #[clap(short, long, default_value = "/etc/jobloader/config.yaml")]
    config: String,
}

impl Cli {
    /// Flags given on the command line take precedence over the file.
    fn apply(self, mut config: LoaderConfig) -> LoaderConfig {
        if let Some(kubeconfig) = self.kubeconfig {
            config.cluster.kubeconfig = Some(kubeconfig);
        }
        if let Some(namespace) = self.namespace {
            config.cluster.namespace = namespace;
        }
        if let Some(jobs_per_node) = self.jobs_per_node {
            config.jobs_per_node = jobs_per_node;
        }
        config.debug |= self.debug;
        config
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = match LoaderConfig::load(&cli.config) {
        Ok(config) => cli.apply(config),
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(1);
        },
    };

    tracing_subscriber::fmt()
        .with_max_level(if config.debug {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .init();

    if let Err(e) = run(config).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: LoaderConfig) -> Result<()> {
    let client = KubeClient::new(config.cluster.kubeconfig.as_deref()).await?;

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, stopping");
        cancel_on_signal.cancel();
    });

    JobLoader::new(Arc::new(client), config).run(cancel).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
