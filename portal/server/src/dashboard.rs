use crate::app_config::{RemoteConfig, StorageConfig};
use clap::{Parser, ValueEnum};
use futures::StreamExt;
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use portal_api::{
    rpc::PortalApiClient,
    types::{TableName, Tables},
};
use serde::Serialize;
use std::{fmt::Debug, future::Future, sync::Arc, time::Duration};
use tracing::{debug, info};
use workstudy::{projection::LiveProjection, ChangeHub, Store};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Read the tables straight from local storage
    Local,
    /// Read the tables through a running portal service
    Remote,
}

#[derive(Clone, Debug, Parser, Serialize)]
pub struct SourceConfig {
    #[arg(long, env = "DASHBOARD_SOURCE", value_enum, default_value = "local")]
    pub source: SourceKind,

    #[clap(flatten)]
    pub storage: StorageConfig,

    #[clap(flatten)]
    pub remote: RemoteConfig,

    /// Keep running and print the stats again whenever they change
    #[arg(long, default_value_t = false)]
    pub follow: bool,

    /// How often a local follower re-reads storage
    #[arg(
        long,
        env = "POLL_INTERVAL_MS",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval_ms: u64,
}

async fn fetch_tables(client: &WsClient) -> anyhow::Result<Tables> {
    Ok(Tables {
        jobs: client.list_jobs().await?,
        applications: client.list_applications().await?,
        timesheets: client.list_timesheets().await?,
        users: client.list_users().await?,
    })
}

/// Emits the projection from local storage, then, when following, every
/// distinct value seen on each poll until `shutdown` resolves.
pub async fn run_local<P, F, E>(
    source: &SourceConfig,
    tables: &[TableName],
    compute: F,
    mut emit: E,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()>
where
    P: Clone + Debug + PartialEq + Send + 'static,
    F: Fn(&Tables) -> P + Send + Sync + 'static,
    E: FnMut(&P) -> anyhow::Result<()>,
{
    let store = {
        let adapter = source.storage.adapter()?;
        Arc::new(Store::open(adapter, ChangeHub::new()))
    };
    let projection = LiveProjection::new(&store, tables, compute);
    let mut last = projection.current();
    emit(&last)?;
    if !source.follow {
        return Ok(());
    }

    // other processes writing the files cannot reach this hub, so re-read on a timer
    let mut interval = tokio::time::interval(Duration::from_millis(source.poll_interval_ms));
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = interval.tick() => {
                store.hub().notify_local();
                let current = projection.current();
                if current != last {
                    emit(&current)?;
                    last = current;
                }
            }
        }
    }
    Ok(())
}

/// Emits the projection computed from a running portal, then, when following,
/// again on every change the portal reports until `shutdown` resolves.
pub async fn run_remote<P, F, E>(
    source: &SourceConfig,
    tables: &[TableName],
    compute: F,
    mut emit: E,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()>
where
    F: Fn(&Tables) -> P,
    E: FnMut(&P) -> anyhow::Result<()>,
{
    let url = source.remote.portal_url()?;
    let client = WsClientBuilder::default().build(url.as_str()).await?;
    debug!("Connected to portal at {}", url);

    // subscribe first so nothing written after the initial fetch is missed
    let mut changes = if source.follow {
        Some(client.subscribe_changes(tables.to_vec()).await?)
    } else {
        None
    };
    emit(&compute(&fetch_tables(&client).await?))?;

    let Some(changes) = changes.as_mut() else {
        return Ok(());
    };
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            change = changes.next() => match change {
                Some(change) => {
                    let change = change?;
                    info!(?change, "Portal changed");
                    emit(&compute(&fetch_tables(&client).await?))?;
                }
                None => break,
            },
        }
    }
    Ok(())
}

pub async fn run<P, F, E>(
    source: &SourceConfig,
    tables: &[TableName],
    compute: F,
    emit: E,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()>
where
    P: Clone + Debug + PartialEq + Send + 'static,
    F: Fn(&Tables) -> P + Send + Sync + 'static,
    E: FnMut(&P) -> anyhow::Result<()>,
{
    match source.source {
        SourceKind::Local => run_local(source, tables, compute, emit, shutdown).await,
        SourceKind::Remote => run_remote(source, tables, compute, emit, shutdown).await,
    }
}
