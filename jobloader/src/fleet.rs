use anyhow::{Context, Result};
use resources::client::ClusterClient;

/// Count the nodes of the cluster without fetching all of them:
/// a single-item page plus the remaining count reported by the api-server.
pub async fn count_fleet_nodes(client: &dyn ClusterClient) -> Result<u64> {
    let page = client
        .list_nodes(1)
        .await
        .with_context(|| "Failed to list nodes")?;
    let remaining = page.remaining_item_count.unwrap_or_default().max(0) as u64;
    Ok(page.items.len() as u64 + remaining)
}
