use std::{sync::Arc, time::Duration};

use futures::{stream, StreamExt};
use resources::{
    client::ClusterClient,
    config::{
        jobloader::{JobTemplateConfig, LoaderConfig},
        OwnerLabel,
    },
    objects::job::build_job,
};
use tokio::select;
use tokio_util::sync::CancellationToken;

/// Issues Job creations. Outcomes are only logged, a failed creation
/// is never compensated.
pub struct JobCreator {
    client: Arc<dyn ClusterClient>,
    namespace: String,
    template: JobTemplateConfig,
    owner: OwnerLabel,
    concurrency: usize,
    retries: u32,
    backoff: Duration,
    cancel: CancellationToken,
}

impl JobCreator {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        config: &LoaderConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            namespace: config.cluster.namespace.to_owned(),
            template: config.template.to_owned(),
            owner: config.owner_label.to_owned(),
            concurrency: config.create_concurrency.max(1),
            retries: config.create_retries,
            backoff: config.retry_backoff(),
            cancel,
        }
    }

    /// Create a single Job.
    /// An in-flight call is abandoned once the run is cancelled.
    pub async fn create_job(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        let job = build_job(&self.template, &self.owner);
        for attempt in 0..=self.retries {
            if attempt > 0 {
                select! {
                    _ = self.cancel.cancelled() => return,
                    _ = tokio::time::sleep(self.backoff) => {},
                }
            }
            let result = select! {
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Job creation cancelled");
                    return;
                },
                result = self.client.create_job(&self.namespace, &job) => result,
            };
            match result {
                Ok(job) => {
                    tracing::info!("Created Job: {}", job.metadata.name.unwrap_or_default());
                    return;
                },
                Err(e) if attempt < self.retries => {
                    tracing::warn!("Failed to create Job, attempt {}: {:#}", attempt + 1, e);
                },
                Err(e) => tracing::error!("Failed to create Job: {:#}", e),
            }
        }
    }

    /// Create `count` Jobs, at most `concurrency` at a time.
    /// No new creation starts after cancellation.
    pub async fn create_jobs(&self, count: u64) {
        stream::iter(0..count)
            .take_until(self.cancel.cancelled())
            .for_each_concurrent(self.concurrency, |_| self.create_job())
            .await;
    }
}
