use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use k8s_openapi::api::{batch::v1::Job, core::v1::Node};
use kube::{
    api::{Api, ListParams, ObjectList, PostParams, WatchParams},
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config,
};

use super::{ClusterClient, WatchStream};
use crate::models::ListPage;

/// Server side timeout of a watch request, must stay below 295 seconds.
const WATCH_TIMEOUT_SECS: u32 = 290;

#[derive(Clone)]
pub struct KubeClient {
    client: Client,
}

impl KubeClient {
    /// Connect using the kubeconfig at `kubeconfig`,
    /// or the inferred configuration when no path is given.
    pub async fn new(kubeconfig: Option<&str>) -> Result<Self> {
        let config = match kubeconfig {
            Some(path) if !path.is_empty() => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .with_context(|| format!("Failed to read kubeconfig {}", path))?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .with_context(|| format!("Failed to load kubeconfig {}", path))?
            },
            _ => Config::infer()
                .await
                .with_context(|| "Failed to infer cluster config".to_string())?,
        };
        let client = Client::try_from(config).with_context(|| "Failed to create client")?;
        Ok(Self {
            client,
        })
    }
}

impl<T: Clone> From<ObjectList<T>> for ListPage<T> {
    fn from(list: ObjectList<T>) -> Self {
        ListPage {
            items: list.items,
            resource_version: list.metadata.resource_version,
            remaining_item_count: list.metadata.remaining_item_count,
        }
    }
}

#[async_trait]
impl ClusterClient for KubeClient {
    async fn server_version(&self) -> Result<String> {
        let info = self.client.apiserver_version().await?;
        Ok(info.git_version)
    }

    async fn list_nodes(&self, limit: u32) -> Result<ListPage<Node>> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes.list(&ListParams::default().limit(limit)).await?;
        Ok(list.into())
    }

    async fn create_job(&self, namespace: &str, job: &Job) -> Result<Job> {
        let jobs: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        let job = jobs.create(&PostParams::default(), job).await?;
        Ok(job)
    }

    async fn list_jobs(&self, namespace: &str, selector: &str) -> Result<ListPage<Job>> {
        let jobs: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        let list = jobs.list(&ListParams::default().labels(selector)).await?;
        Ok(list.into())
    }

    async fn watch_jobs(
        &self,
        namespace: &str,
        selector: &str,
        resource_version: &str,
    ) -> Result<WatchStream<Job>> {
        let jobs: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        let params = WatchParams::default()
            .labels(selector)
            .timeout(WATCH_TIMEOUT_SECS);
        let stream = jobs.watch(&params, resource_version).await?;
        Ok(stream.map_err(anyhow::Error::from).boxed())
    }
}
