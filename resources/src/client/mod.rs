use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use k8s_openapi::api::{batch::v1::Job, core::v1::Node};

use crate::models::{ListPage, WatchEvent};

mod kubernetes;

pub use self::kubernetes::KubeClient;

/// Stream of watch events, an `Err` item is a single undecodable event.
pub type WatchStream<T> = BoxStream<'static, Result<WatchEvent<T>>>;

/// Calls the job loader issues against the cluster.
///
/// Every call is independent, implementations must allow
/// concurrent use from several tasks.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Version reported by the api-server.
    async fn server_version(&self) -> Result<String>;

    async fn list_nodes(&self, limit: u32) -> Result<ListPage<Node>>;

    /// Create a Job, returning the object as stored by the api-server.
    async fn create_job(&self, namespace: &str, job: &Job) -> Result<Job>;

    async fn list_jobs(&self, namespace: &str, selector: &str) -> Result<ListPage<Job>>;

    /// Watch Jobs matching `selector`, starting after `resource_version`.
    async fn watch_jobs(
        &self,
        namespace: &str,
        selector: &str,
        resource_version: &str,
    ) -> Result<WatchStream<Job>>;
}
