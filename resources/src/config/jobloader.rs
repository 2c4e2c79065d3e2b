use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, File};
use serde::{Deserialize, Serialize};

use super::{ClusterConfig, OwnerLabel};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoaderConfig {
    pub cluster: ClusterConfig,
    /// Number of Jobs kept alive per node.
    /// The population is computed once at startup. Default: 100
    pub jobs_per_node: u64,
    /// Enable debug logging.
    pub debug: bool,
    /// Label attached to every created Job
    /// and used to scope the replacement watch.
    pub owner_label: OwnerLabel,
    pub template: JobTemplateConfig,
    /// Maximum number of create calls in flight during the initial batch.
    /// Default: 16
    pub create_concurrency: usize,
    /// Number of extra attempts for a failed create call. Default: 0
    pub create_retries: u32,
    /// Delay between create attempts, in milliseconds. Default: 1000
    pub retry_backoff_ms: u64,
    /// How long to wait for the watch to terminate on shutdown.
    /// In seconds. Default: 30 sec
    pub shutdown_timeout_secs: u64,
}

impl LoaderConfig {
    /// Read the config file at `path`, a missing file yields the defaults.
    pub fn load(path: &str) -> Result<LoaderConfig> {
        Config::builder()
            .add_source(File::with_name(path).required(false))
            .build()
            .with_context(|| format!("Failed to read config {}", path))?
            .try_deserialize::<LoaderConfig>()
            .with_context(|| "Failed to parse config".to_string())
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig {
            cluster: ClusterConfig::default(),
            jobs_per_node: 100,
            debug: false,
            owner_label: OwnerLabel::default(),
            template: JobTemplateConfig::default(),
            create_concurrency: 16,
            create_retries: 0,
            retry_backoff_ms: 1000,
            shutdown_timeout_secs: 30,
        }
    }
}

/// Workload run by every Job.
/// The loader never inspects what the container does,
/// it only tracks creations and deletions.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct JobTemplateConfig {
    /// Prefix of the generated Job name,
    /// the api-server appends a unique suffix.
    pub name_prefix: String,
    /// Maximum number of pods of a Job running at any given time.
    pub parallelism: i32,
    /// Seconds after which a finished Job is deleted by the TTL controller.
    pub ttl_seconds_after_finished: i32,
    pub container_name: String,
    pub image: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
    /// Path of the HTTP readiness probe.
    pub readiness_path: String,
    /// Container port of the HTTP readiness probe.
    pub readiness_port: i32,
    pub readiness_initial_delay_seconds: i32,
    pub readiness_period_seconds: i32,
    /// Node label the pods are spread across.
    pub topology_key: String,
    pub max_skew: i32,
}

impl Default for JobTemplateConfig {
    fn default() -> Self {
        JobTemplateConfig {
            name_prefix: "jobloader-".to_string(),
            parallelism: 1,
            ttl_seconds_after_finished: 5,
            container_name: "httpd".to_string(),
            image: "docker.io/rancher/mirrored-library-busybox:1.36.1".to_string(),
            command: vec!["sh".to_string(), "-c".to_string()],
            args: vec![concat!(
                "sleep $(expr $RANDOM % 30); ",
                "echo ok > /tmp/index.html; ",
                "httpd -vv -p 8080 -h /tmp; ",
                "sleep 60; ",
                "sleep $(expr $RANDOM % 30); ",
                "killall httpd; ",
                "true"
            )
            .to_string()],
            readiness_path: "/".to_string(),
            readiness_port: 8080,
            readiness_initial_delay_seconds: 5,
            readiness_period_seconds: 5,
            topology_key: "kubernetes.io/hostname".to_string(),
            max_skew: 1,
        }
    }
}
