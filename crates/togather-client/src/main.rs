//! Headless entry point: load the entity graph, keep the outbox
//! draining, and hand the shared state to whatever front end embeds
//! this crate.

use tracing::info;

use togather_client::config::ClientConfig;
use togather_client::state::AppState;
use togather_client::{init_tracing, sync};
use togather_net::HttpGateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ClientConfig::from_env();
    info!(api = %config.api_url, "Starting Togather client core");

    let gateway = HttpGateway::new(&config.api_url);
    let state = AppState::shared();

    {
        let mut guard = state.lock().await;
        let summary = guard.store.bulk_load(&gateway).await?;
        info!(
            users = summary.users,
            communities = summary.communities,
            events = summary.events,
            posts = summary.posts,
            "Entity graph loaded"
        );
    }

    let worker = sync::spawn_sync_worker(state.clone(), gateway, config.sync_interval);

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    worker.abort();

    Ok(())
}
