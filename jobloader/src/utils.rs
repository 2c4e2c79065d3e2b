use std::sync::Arc;

use anyhow::Error;
use k8s_openapi::api::batch::v1::Job;
use resources::{
    client::{ClusterClient, WatchStream},
    config::OwnerLabel,
    informer::{EventHandler, Informer, ListerWatcher},
    models::ListPage,
};
use tokio::sync::mpsc::Sender;

/// List and watch the Jobs in `namespace` carrying the owner label.
pub fn create_lister_watcher(
    client: Arc<dyn ClusterClient>,
    namespace: String,
    owner: &OwnerLabel,
) -> ListerWatcher<Job> {
    let selector = owner.selector();
    let list_client = client.clone();
    let list_namespace = namespace.clone();
    let list_selector = selector.clone();
    ListerWatcher {
        lister: Box::new(move |_| {
            let client = list_client.clone();
            let namespace = list_namespace.clone();
            let selector = list_selector.clone();
            Box::pin(async move {
                let page = client.list_jobs(&namespace, &selector).await?;
                Ok::<ListPage<Job>, Error>(page)
            })
        }),
        watcher: Box::new(move |resource_version| {
            let client = client.clone();
            let namespace = namespace.clone();
            let selector = selector.clone();
            Box::pin(async move {
                let stream = client
                    .watch_jobs(&namespace, &selector, &resource_version)
                    .await?;
                Ok::<WatchStream<Job>, Error>(stream)
            })
        }),
    }
}

/// Informer over the owned Jobs, forwarding every deleted Job to `deleted_tx`.
/// Additions and status changes are not forwarded.
pub fn create_informer(
    client: Arc<dyn ClusterClient>,
    namespace: String,
    owner: &OwnerLabel,
    deleted_tx: Sender<Job>,
) -> Informer<Job> {
    let lw = create_lister_watcher(client, namespace, owner);

    let eh = EventHandler::<Job> {
        add_cls: Box::new(|_| Box::pin(async { Ok::<(), Error>(()) })),
        update_cls: Box::new(|_| Box::pin(async { Ok::<(), Error>(()) })),
        delete_cls: Box::new(move |old| {
            let deleted_tx = deleted_tx.clone();
            Box::pin(async move {
                deleted_tx.send(old).await?;
                Ok::<(), Error>(())
            })
        }),
    };

    Informer::new(lw, eh, owner.labels())
}
