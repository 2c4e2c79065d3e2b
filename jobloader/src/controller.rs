use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Error, Result};
use k8s_openapi::api::batch::v1::Job;
use resources::{client::ClusterClient, config::jobloader::LoaderConfig};
use tokio::{
    select,
    sync::{mpsc, mpsc::Receiver},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{creator::JobCreator, utils::create_informer};

/// Replaces every owned Job that gets deleted, one creation per deletion.
pub struct ReplacementController {
    creator: Arc<JobCreator>,
    cancel: CancellationToken,
    shutdown_timeout: Duration,

    deleted_rx: Receiver<Job>,
    job_informer: JoinHandle<Result<(), Error>>,
    watch_cancel: CancellationToken,
}

impl ReplacementController {
    /// Starts watching right away, so deletions that happen
    /// while the initial batch is created are replaced too.
    pub fn new(
        client: Arc<dyn ClusterClient>,
        config: &LoaderConfig,
        creator: Arc<JobCreator>,
        cancel: CancellationToken,
    ) -> Self {
        let (deleted_tx, deleted_rx) = mpsc::channel::<Job>(16);
        let job_informer = create_informer(
            client,
            config.cluster.namespace.to_owned(),
            &config.owner_label,
            deleted_tx,
        );
        let watch_cancel = cancel.child_token();
        let informer_cancel = watch_cancel.clone();
        let job_informer = tokio::spawn(async move { job_informer.run(informer_cancel).await });

        Self {
            creator,
            cancel,
            shutdown_timeout: config.shutdown_timeout(),

            deleted_rx,
            job_informer,
            watch_cancel,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        tracing::info!("Starting watch...");

        loop {
            select! {
                _ = self.cancel.cancelled() => break,
                deleted = self.deleted_rx.recv() => match deleted {
                    Some(job) => {
                        tracing::info!(
                            "Deleted Job: {}",
                            job.metadata.name.as_deref().unwrap_or_default()
                        );
                        self.creator.create_job().await;
                    },
                    None => break,
                },
            }
        }

        let stopped_early = !self.cancel.is_cancelled();
        self.shutdown().await?;
        if stopped_early {
            return Err(anyhow!("Job informer exited before shutdown"));
        }
        Ok(())
    }

    /// Stop the watch and wait for the informer to finish,
    /// no event is delivered afterwards.
    async fn shutdown(mut self) -> Result<()> {
        tracing::info!("Terminating watch...");
        self.watch_cancel.cancel();
        self.deleted_rx.close();

        match tokio::time::timeout(self.shutdown_timeout, &mut self.job_informer).await {
            Ok(result) => {
                result??;
                tracing::info!("Done.");
            },
            Err(_) => {
                tracing::warn!(
                    "Watch did not terminate within {:?}, giving up",
                    self.shutdown_timeout
                );
                self.job_informer.abort();
            },
        }
        Ok(())
    }
}
