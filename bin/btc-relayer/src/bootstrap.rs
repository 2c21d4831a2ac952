//! Wires the observers and the relay loops together and runs them.

use std::{future::Future, sync::Arc};

use anyhow::{bail, Context};
use btc_relayer_db::{
    persistent::{constants::DB_DIR_NAME, RetryDb},
    tracker::RetryQueueDb,
};
use btc_relayer_observer::{alliance::AllianceObserver, btc::BtcObserver};
use btc_relayer_primitives::constants::QUEUE_CAPACITY;
use btc_relayer_relay::Relayer;
use btc_relayer_rpc::{alliance::AllianceClient, bitcoin::BitcoinClient};
use tokio::{signal, sync::mpsc, task::JoinSet};
use tracing::{error, info, warn};

use crate::config::Config;

/// Runs the relayer until Ctrl-C is received or one of its tasks ends.
///
/// None of the tasks is expected to end on its own, so that case is reported as an error.
pub(crate) async fn run(config: Config) -> anyhow::Result<()> {
    let db_path = config.datadir.join(DB_DIR_NAME);
    let db = RetryDb::open(&db_path, config.retry_db_config())
        .with_context(|| format!("failed to open retry store at {}", db_path.display()))?;
    let db = Arc::new(db);

    match db.pending().await {
        Ok(pending) => info!(path = %db_path.display(), %pending, "opened retry store"),
        Err(e) => warn!(%e, "could not count pending retries"),
    }

    let btc = BitcoinClient::new(
        &config.btc.url,
        &config.btc.user,
        &config.btc.pass,
        config.btc.timeout,
    )
    .context("failed to build bitcoin client")?;
    let btc = Arc::new(btc);

    let alliance = AllianceClient::new(&config.alliance.url, config.alliance.timeout)
        .context("failed to build alliance client")?;
    let alliance = Arc::new(alliance);

    let checkpoints = config.checkpoints();
    let btc_observer = BtcObserver::new(
        config.btc_observer_config()?,
        btc.clone(),
        db.clone(),
        &checkpoints,
    )
    .await;
    let alliance_observer = AllianceObserver::new(
        config.alliance_observer_config(),
        alliance.clone(),
        db.clone(),
        &checkpoints,
    )
    .await;

    let relayer = Relayer::new(config.relay_config(), btc, alliance, db);

    let (deposit_tx, deposit_rx) = mpsc::channel(QUEUE_CAPACITY);
    let (broadcast_tx, broadcast_rx) = mpsc::channel(QUEUE_CAPACITY);

    let mut tasks = JoinSet::new();

    spawn_named(&mut tasks, "bitcoin observer", {
        let items = deposit_tx.clone();
        async move {
            if let Err(e) = btc_observer.run(items).await {
                error!(%e, "bitcoin observer failed");
            }
        }
    });

    spawn_named(&mut tasks, "alliance observer", {
        let items = broadcast_tx.clone();
        async move {
            if let Err(e) = alliance_observer.run(items).await {
                error!(%e, "alliance observer failed");
            }
        }
    });

    spawn_named(&mut tasks, "relay", {
        let relayer = relayer.clone();
        async move { relayer.relay(deposit_rx, deposit_tx).await }
    });

    spawn_named(&mut tasks, "broadcast", {
        let relayer = relayer.clone();
        async move { relayer.broadcast(broadcast_rx, broadcast_tx).await }
    });

    spawn_named(&mut tasks, "rebroadcast", async move {
        relayer.rebroadcast().await
    });

    tokio::select! {
        res = signal::ctrl_c() => {
            res.context("failed to listen for ctrl-c")?;
            info!("received ctrl-c, shutting down");
            Ok(())
        }
        Some(res) = tasks.join_next() => {
            let name = res.context("relayer task panicked")?;
            bail!("{name} task ended unexpectedly");
        }
    }
}

fn spawn_named<F>(tasks: &mut JoinSet<&'static str>, name: &'static str, task: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(%name, "spawning task");
    tasks.spawn(async move {
        task.await;
        name
    });
}
