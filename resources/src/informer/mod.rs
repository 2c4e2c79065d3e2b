use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use futures::future::BoxFuture;
use reflector::{Reflector, ReflectorNotification};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    client::WatchStream,
    models::ListPage,
    objects::{Labels, Object},
};

mod reflector;

pub type Store<T> = DashMap<String, T>;

pub type CLS<ARG, RES> = Box<dyn Fn(ARG) -> BoxFuture<'static, Result<RES>> + Send + Sync>;

pub struct ListerWatcher<T> {
    pub lister: CLS<(), ListPage<T>>,
    /// Called with the resource version to watch from.
    pub watcher: CLS<String, WatchStream<T>>,
}

pub struct EventHandler<T> {
    pub add_cls: CLS<T, ()>,
    /// old value, new value
    pub update_cls: CLS<(T, T), ()>,
    pub delete_cls: CLS<T, ()>,
}

pub struct Informer<T> {
    reflector: Arc<Reflector<T>>,
    eh: EventHandler<T>,
}

impl<T: Object> Informer<T> {
    /// Objects whose labels don't match `selector` are never stored
    /// nor passed to the event handler.
    pub fn new(lw: ListerWatcher<T>, eh: EventHandler<T>, selector: Labels) -> Self {
        let reflector = Reflector {
            lw,
            store: Arc::new(DashMap::new()),
            selector,
        };
        Self {
            reflector: Arc::new(reflector),
            eh,
        }
    }

    /// Run until `cancel` fires. Returns once the reflector has stopped.
    /// No handler is called once `cancel` has fired, notifications still
    /// buffered at that point are dropped.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        // start reflector
        let (tx, mut rx) = mpsc::channel::<ReflectorNotification<T>>(16);
        let r = self.reflector.clone();
        let reflector_cancel = cancel.clone();
        let reflector_handle = tokio::spawn(async move { r.run(tx, reflector_cancel).await });

        tracing::info!("Informer started");
        while let Some(n) = rx.recv().await {
            // keep draining so the reflector never blocks on a full channel
            if cancel.is_cancelled() {
                continue;
            }
            let result = match n {
                ReflectorNotification::Add(new) => (self.eh.add_cls)(new).await,
                ReflectorNotification::Update(old, new) => (self.eh.update_cls)((old, new)).await,
                ReflectorNotification::Delete(old) => (self.eh.delete_cls)(old).await,
            };
            if let Err(e) = result {
                tracing::warn!("EventHandler error: {:#}", e);
            }
        }

        reflector_handle.await?
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::{stream, StreamExt};
    use k8s_openapi::{api::batch::v1::Job, apimachinery::pkg::apis::meta::v1::ObjectMeta};

    use super::*;

    fn owner() -> Labels {
        Labels::from([("owned".to_string(), "true".to_string())])
    }

    fn job(name: &str) -> Job {
        Job {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                labels: Some(owner()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn noop<ARG: Send + 'static>() -> CLS<ARG, ()> {
        Box::new(|_| Box::pin(async { Ok::<(), anyhow::Error>(()) }))
    }

    #[tokio::test]
    async fn no_dispatch_after_cancel() {
        let lw = ListerWatcher {
            lister: Box::new(|_| {
                Box::pin(async {
                    let mut page = ListPage::new(vec![job("a"), job("b"), job("c")]);
                    page.resource_version = Some("1".to_string());
                    Ok::<ListPage<Job>, anyhow::Error>(page)
                })
            }),
            watcher: Box::new(|_| {
                Box::pin(async {
                    let events: WatchStream<Job> = stream::pending().boxed();
                    Ok::<WatchStream<Job>, anyhow::Error>(events)
                })
            }),
        };

        let cancel = CancellationToken::new();
        let added = Arc::new(AtomicUsize::new(0));
        let eh = EventHandler::<Job> {
            add_cls: {
                let cancel = cancel.clone();
                let added = added.clone();
                Box::new(move |_| {
                    // the run is cancelled while the first add is handled
                    added.fetch_add(1, Ordering::SeqCst);
                    cancel.cancel();
                    Box::pin(async { Ok::<(), anyhow::Error>(()) })
                })
            },
            update_cls: noop(),
            delete_cls: noop(),
        };

        let informer = Informer::new(lw, eh, owner());
        tokio::time::timeout(std::time::Duration::from_secs(2), informer.run(cancel))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(added.load(Ordering::SeqCst), 1);
    }
}
