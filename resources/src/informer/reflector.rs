use std::{collections::HashSet, sync::Arc};

use anyhow::Result;
use futures::StreamExt;
use kube::ResourceExt;
use tokio::{select, sync::mpsc, time::Duration};
use tokio_util::sync::CancellationToken;

use super::{ListerWatcher, Store};
use crate::{
    client::WatchStream,
    models::{ListPage, WatchEvent},
    objects::{Labels, Object},
    utils::{object_key, selector_match},
};

/// Status code of a watch error event whose resource version is too old.
const GONE: u16 = 410;

const RETRY_INTERVAL: Duration = Duration::from_secs(1);

pub(super) struct Reflector<T> {
    pub(super) lw: ListerWatcher<T>,
    pub(super) store: Arc<Store<T>>,
    pub(super) selector: Labels,
}

#[derive(Debug)]
pub(super) enum ReflectorNotification<T> {
    Add(T),
    /// old value, new value
    Update(T, T),
    Delete(T),
}

#[derive(Debug, PartialEq)]
enum WatchExit {
    /// The api-server ended the watch, watch again from the last version.
    Closed,
    /// The resource version expired, list again.
    Expired,
    Cancelled,
}

impl<T: Object> Reflector<T> {
    pub(super) async fn run(
        &self,
        tx: mpsc::Sender<ReflectorNotification<T>>,
        cancel: CancellationToken,
    ) -> Result<()> {
        loop {
            // lister
            let page = select! {
                _ = cancel.cancelled() => return Ok(()),
                page = self.list() => page,
            };
            let mut resource_version = page.resource_version.clone().unwrap_or_default();
            self.replace(page, &tx).await?;
            tracing::info!("List succeeded");

            // watcher
            loop {
                let result = select! {
                    _ = cancel.cancelled() => return Ok(()),
                    result = (self.lw.watcher)(resource_version.clone()) => result,
                };
                match result {
                    Ok(stream) => {
                        tracing::debug!("Watcher connected, receiving events...");
                        let exit = self
                            .handle_watcher(&tx, stream, &mut resource_version, &cancel)
                            .await?;
                        match exit {
                            WatchExit::Closed => continue,
                            WatchExit::Expired => break,
                            WatchExit::Cancelled => return Ok(()),
                        }
                    },
                    Err(e) => {
                        tracing::warn!("Watcher failed, caused by: {:#}", e);
                        select! {
                            _ = cancel.cancelled() => return Ok(()),
                            _ = tokio::time::sleep(RETRY_INTERVAL) => break,
                        }
                    },
                }
            }
            tracing::warn!("Restarting reflector");
        }
    }

    async fn list(&self) -> ListPage<T> {
        loop {
            match (self.lw.lister)(()).await {
                Ok(page) => return page,
                Err(e) => tracing::warn!("List failed, caused by: {:#}", e),
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }

    fn matches(&self, object: &T) -> bool {
        selector_match(&self.selector, object.labels())
    }

    /// Replace the store with a fresh list.
    /// Objects that disappeared since the last watch are reported as deleted.
    async fn replace(
        &self,
        page: ListPage<T>,
        tx: &mpsc::Sender<ReflectorNotification<T>>,
    ) -> Result<()> {
        let mut listed = HashSet::new();
        for object in page.items {
            if !self.matches(&object) {
                continue;
            }
            let key = object_key(&object);
            listed.insert(key.to_owned());
            match self.store.insert(key, object.clone()) {
                Some(old) if old.resource_version() == object.resource_version() => {},
                Some(old) => tx.send(ReflectorNotification::Update(old, object)).await?,
                None => tx.send(ReflectorNotification::Add(object)).await?,
            }
        }

        let vanished = self
            .store
            .iter()
            .map(|entry| entry.key().to_owned())
            .filter(|key| !listed.contains(key))
            .collect::<Vec<_>>();
        for key in vanished {
            if let Some((_, old)) = self.store.remove(&key) {
                tracing::debug!("Object {} is gone since the last watch", key);
                tx.send(ReflectorNotification::Delete(old)).await?;
            }
        }
        Ok(())
    }

    async fn handle_watcher(
        &self,
        tx: &mpsc::Sender<ReflectorNotification<T>>,
        mut stream: WatchStream<T>,
        resource_version: &mut String,
        cancel: &CancellationToken,
    ) -> Result<WatchExit> {
        loop {
            let event = select! {
                _ = cancel.cancelled() => return Ok(WatchExit::Cancelled),
                event = stream.next() => event,
            };
            let event = match event {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    tracing::error!("Watch error: {:#}", e);
                    continue;
                },
                None => {
                    tracing::debug!("Watch closed by api-server");
                    return Ok(WatchExit::Closed);
                },
            };

            match event {
                WatchEvent::Added(object) | WatchEvent::Modified(object) => {
                    if let Some(version) = object.resource_version() {
                        *resource_version = version;
                    }
                    let key = object_key(&object);
                    if !self.matches(&object) {
                        tracing::debug!("Ignoring {}, labels don't match", key);
                        continue;
                    }
                    match self.store.insert(key, object.clone()) {
                        Some(old) => tx.send(ReflectorNotification::Update(old, object)).await?,
                        None => tx.send(ReflectorNotification::Add(object)).await?,
                    }
                },
                WatchEvent::Deleted(object) => {
                    if let Some(version) = object.resource_version() {
                        *resource_version = version;
                    }
                    let key = object_key(&object);
                    if !self.matches(&object) {
                        tracing::debug!("Ignoring deletion of {}, labels don't match", key);
                        continue;
                    }
                    if self.store.remove(&key).is_none() {
                        tracing::debug!("Watch inconsistent, key {} was not in store", key);
                    }
                    tx.send(ReflectorNotification::Delete(object)).await?;
                },
                WatchEvent::Bookmark(bookmark) => {
                    *resource_version = bookmark.metadata.resource_version;
                },
                WatchEvent::Error(e) if e.code == GONE => {
                    tracing::warn!("Watch expired: {}", e.message);
                    return Ok(WatchExit::Expired);
                },
                WatchEvent::Error(e) => {
                    tracing::warn!("Watch error event: {} ({})", e.message, e.code);
                },
            }
        }
    }
}
