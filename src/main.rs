mod logging;
mod scenario;
mod settings;

use abox_engine::{
    Offload,
    config::{SIM_DROP_ACKS_ENV, SIM_NO_COMPLETIONS_ENV, env_flag},
    message::Message,
    sim::{SimBehavior, SimFirmware},
};
use anyhow::{Context, Result};
use settings::Settings;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::{mpsc::Receiver, watch};
use tracing::{debug, error, info};

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    fragments: u64,
    drains: u64,
    periods: u64,
}

async fn listen(mut rx: Receiver<Message>, drained: watch::Sender<u64>) -> Counts {
    let mut counts = Counts::default();
    while let Some(message) = rx.recv().await {
        match message {
            Message::FragmentElapsed(id) => {
                counts.fragments += 1;
                debug!("compr{id}: fragment elapsed ({})", counts.fragments);
            }
            Message::DrainComplete(id) => {
                counts.drains += 1;
                info!("compr{id}: drain complete");
                let _ = drained.send(counts.drains);
            }
            Message::PeriodElapsed(id) => {
                counts.periods += 1;
                debug!("rdma{id}: period elapsed");
            }
        }
    }
    counts
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let settings = Settings::load(path.as_deref())?;
    let plan = settings.scenario.clone();

    let sim = Arc::new(SimFirmware::new(SimBehavior {
        ack: !env_flag(SIM_DROP_ACKS_ENV),
        complete: !env_flag(SIM_NO_COMPLETIONS_ENV),
        ..SimBehavior::default()
    }));
    let Offload {
        device,
        mut rdma,
        notifications: rx,
    } = abox_engine::init(&settings.offload, sim.clone())?;
    sim.connect(device.irq_line());
    let device = Arc::new(device);

    let (drained_tx, mut drained_rx) = watch::channel(0u64);
    let listener = tokio::spawn(listen(rx, drained_tx));

    let written = {
        let (device, sim, plan) = (device.clone(), sim.clone(), plan.clone());
        tokio::task::spawn_blocking(move || scenario::play(&device, &sim, &plan)).await?
    };
    let written = match written {
        Ok(written) => written,
        Err(e) => {
            error!("{e:#}");
            let device = device.clone();
            let _ = tokio::task::spawn_blocking(move || device.free()).await;
            return Err(e);
        }
    };

    let drain_wait = Duration::from_millis(plan.drain_timeout_ms);
    if tokio::time::timeout(drain_wait, drained_rx.wait_for(|n| *n > 0))
        .await
        .is_err()
    {
        error!("no drain completion within {drain_wait:?}");
    }

    let mut report = {
        let device = device.clone();
        let plan = plan.clone();
        tokio::task::spawn_blocking(move || scenario::finish(&device, &plan, written))
            .await?
            .context("finish")?
    };

    let disable_timeout = settings.offload.rdma_disable_timeout();
    let swept = tokio::task::spawn_blocking(move || {
        scenario::sweep_rdma(&mut rdma, &sim, &plan, disable_timeout)
    })
    .await?;
    match swept {
        Ok(rdma) => report.rdma = Some(rdma),
        Err(e) => error!("{e:#}"),
    }

    drop(device);
    let counts = listener.await?;
    report.fragment_notifications = counts.fragments;
    report.drain_notifications = counts.drains;
    report.period_notifications = counts.periods;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
