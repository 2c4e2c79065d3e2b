//! In-memory cluster used by the unit tests.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::{
    channel::mpsc::{unbounded, UnboundedSender},
    StreamExt,
};
use k8s_openapi::{
    api::{batch::v1::Job, core::v1::Node},
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
pub use resources::models::WatchEvent;
use resources::{
    client::{ClusterClient, WatchStream},
    config::OwnerLabel,
    models::ListPage,
    objects::Labels,
    utils::selector_match,
};

type EventSender = UnboundedSender<Result<WatchEvent<Job>>>;

#[derive(Default)]
pub struct FakeCluster {
    nodes: u64,
    hide_remaining: AtomicBool,
    fail_nodes: AtomicBool,
    fail_creates: AtomicBool,
    crash_job_list: AtomicBool,
    create_delay: Mutex<Duration>,
    node_list_limits: Mutex<Vec<u32>>,
    create_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    created: Mutex<Vec<Job>>,
    watches: Mutex<Vec<EventSender>>,
}

impl FakeCluster {
    pub fn new(nodes: u64) -> Self {
        Self {
            nodes,
            ..Default::default()
        }
    }

    pub fn hide_remaining_count(&self) {
        self.hide_remaining.store(true, Ordering::SeqCst);
    }

    pub fn fail_node_list(&self) {
        self.fail_nodes.store(true, Ordering::SeqCst);
    }

    /// Make the Job list call panic, taking the informer task down.
    pub fn crash_job_list(&self) {
        self.crash_job_list.store(true, Ordering::SeqCst);
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub fn set_create_delay(&self, delay: Duration) {
        *self.create_delay.lock().unwrap() = delay;
    }

    pub fn node_list_limits(&self) -> Vec<u32> {
        self.node_list_limits.lock().unwrap().clone()
    }

    /// Number of create calls received, failed ones included.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> Vec<Job> {
        self.created.lock().unwrap().clone()
    }

    pub fn watch_count(&self) -> usize {
        self.watches.lock().unwrap().len()
    }

    /// Whether the receiving side of the latest watch is gone.
    pub fn watch_closed(&self) -> bool {
        self.watches
            .lock()
            .unwrap()
            .last()
            .map_or(true, |tx| tx.is_closed())
    }

    /// Deliver an event on the latest watch, unfiltered.
    pub fn emit(&self, event: WatchEvent<Job>) {
        self.send(Ok(event));
    }

    /// Deliver an event that can't be decoded.
    pub fn emit_malformed(&self) {
        self.send(Err(anyhow!("event object not of type Job")));
    }

    fn send(&self, item: Result<WatchEvent<Job>>) {
        if let Some(tx) = self.watches.lock().unwrap().last() {
            tx.unbounded_send(item).ok();
        }
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn server_version(&self) -> Result<String> {
        Ok("v1.28.0-fake".to_string())
    }

    async fn list_nodes(&self, limit: u32) -> Result<ListPage<Node>> {
        self.node_list_limits.lock().unwrap().push(limit);
        if self.fail_nodes.load(Ordering::SeqCst) {
            return Err(anyhow!("connection refused"));
        }
        let returned = self.nodes.min(limit as u64);
        let items = (0..returned)
            .map(|i| Node {
                metadata: ObjectMeta {
                    name: Some(format!("node-{}", i)),
                    ..Default::default()
                },
                ..Default::default()
            })
            .collect();
        let remaining = self.nodes - returned;
        let mut page = ListPage::new(items);
        if remaining > 0 && !self.hide_remaining.load(Ordering::SeqCst) {
            page.remaining_item_count = Some(remaining as i64);
        }
        Ok(page)
    }

    async fn create_job(&self, namespace: &str, job: &Job) -> Result<Job> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        let delay = *self.create_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(anyhow!("injected create failure"));
        }
        let mut job = job.clone();
        let prefix = job.metadata.generate_name.clone().unwrap_or_default();
        job.metadata.name = Some(unique_name(&prefix));
        job.metadata.namespace = Some(namespace.to_string());
        self.created.lock().unwrap().push(job.clone());
        Ok(job)
    }

    async fn list_jobs(&self, _namespace: &str, selector: &str) -> Result<ListPage<Job>> {
        if self.crash_job_list.load(Ordering::SeqCst) {
            panic!("job list crashed");
        }
        let selector = parse_selector(selector);
        let items = self
            .created()
            .into_iter()
            .filter(|job| {
                let labels = job.metadata.labels.clone().unwrap_or_default();
                selector_match(&selector, &labels)
            })
            .collect();
        let mut page = ListPage::new(items);
        page.resource_version = Some("1".to_string());
        Ok(page)
    }

    async fn watch_jobs(
        &self,
        _namespace: &str,
        _selector: &str,
        _resource_version: &str,
    ) -> Result<WatchStream<Job>> {
        let (tx, rx) = unbounded();
        self.watches.lock().unwrap().push(tx);
        Ok(rx.boxed())
    }
}

fn unique_name(prefix: &str) -> String {
    let suffix = thread_rng()
        .sample_iter(Alphanumeric)
        .take(5)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();
    format!("{}{}", prefix, suffix)
}

fn parse_selector(selector: &str) -> Labels {
    selector
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn job_with_labels(name: &str, labels: Labels) -> Job {
    Job {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn owned_job(name: &str) -> Job {
    job_with_labels(name, OwnerLabel::default().labels())
}

pub fn foreign_job(name: &str) -> Job {
    job_with_labels(
        name,
        Labels::from([("app".to_string(), "unrelated".to_string())]),
    )
}

/// Poll `condition` until it holds, panicking after a few seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..300 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}
