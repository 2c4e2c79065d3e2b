use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use resources::{client::ClusterClient, config::jobloader::LoaderConfig};
use tokio::select;
use tokio_util::sync::CancellationToken;

use crate::{controller::ReplacementController, creator::JobCreator, fleet::count_fleet_nodes};

pub struct JobLoader {
    client: Arc<dyn ClusterClient>,
    config: LoaderConfig,
}

impl JobLoader {
    pub fn new(client: Arc<dyn ClusterClient>, config: LoaderConfig) -> Self {
        Self {
            client,
            config,
        }
    }

    /// Fill the cluster with `jobsPerNode` Jobs for every node and keep
    /// the population constant until `cancel` fires.
    ///
    /// Cancellation is the normal end of a run and yields `Ok`.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let version = self
            .client
            .server_version()
            .await
            .with_context(|| "Failed to connect to Kubernetes")?;
        tracing::info!("Connected to Kubernetes {}", version);

        let node_count = count_fleet_nodes(self.client.as_ref()).await?;
        let jobs_per_node = self.config.jobs_per_node;
        let total = jobs_per_node.checked_mul(node_count).ok_or_else(|| {
            anyhow!(
                "Too many jobs: {} jobs each for {} nodes",
                jobs_per_node,
                node_count
            )
        })?;
        tracing::info!(
            "Creating {} jobs each for {} nodes, {} in total",
            jobs_per_node,
            node_count,
            total
        );

        let creator = Arc::new(JobCreator::new(
            self.client.clone(),
            &self.config,
            cancel.clone(),
        ));
        let controller = ReplacementController::new(
            self.client.clone(),
            &self.config,
            creator.clone(),
            cancel.clone(),
        );
        let mut controller_handle = tokio::spawn(controller.run());

        creator.create_jobs(total).await;
        tracing::debug!("Initial batch of {} jobs issued", total);

        select! {
            biased;
            _ = cancel.cancelled() => {},
            result = &mut controller_handle => {
                result??;
                // teardown may complete before this task observes the cancellation
                if !cancel.is_cancelled() {
                    bail!("Replacement controller exited before shutdown");
                }
                return Ok(());
            },
        }
        controller_handle.await??;
        Ok(())
    }
}
