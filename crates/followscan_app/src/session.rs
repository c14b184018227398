use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use followscan_core::Status;
use followscan_engine::{
    ApiClient, Bus, Coordinator, FileStateStore, PageAgent, SnapshotPage, StateStore, UiReader,
};
use scan_logging::{scan_info, scan_warn};

use crate::cli::Args;
use crate::config::AppConfig;
use crate::render;

/// Wire the three contexts together over one snapshot page and drive a scan
/// (and optionally an upload) from the UI side.
pub async fn run(args: &Args, config: &AppConfig) -> Result<()> {
    let state_path = args
        .state_path
        .clone()
        .unwrap_or_else(|| config.state_path.clone());
    let store = Arc::new(FileStateStore::new(&state_path)?);
    if args.reset {
        store.clear()?;
        scan_info!("Cleared stored state at {:?}", store.path());
    }

    if args.status_only {
        println!("{}", render::panel(&store.read()?));
        return Ok(());
    }

    let snapshot_dir = args
        .snapshot_dir
        .as_deref()
        .ok_or_else(|| anyhow!("missing SNAPSHOT_DIR"))?;
    let page = SnapshotPage::from_dir(&args.location, snapshot_dir)
        .with_context(|| format!("reading frames from {}", snapshot_dir.display()))?;
    if page.frame_count() == 0 {
        bail!("no *.html frames in {}", snapshot_dir.display());
    }

    let api = Arc::new(ApiClient::new(config.api_settings())?);
    let bus = Bus::new(config.bus_settings());
    let coordinator = Coordinator::spawn(bus.clone(), store.clone());
    let agent = PageAgent::spawn(bus.clone(), page, config.scrape_settings())?;
    let mut ui = UiReader::open(bus.clone(), store.clone(), api).await;
    let interval = config.refresh_interval();

    let outcome = drive(&mut ui, args, interval, || agent.is_finished()).await;

    agent.navigate_away().await;
    coordinator.shutdown().await;
    outcome
}

async fn drive(
    ui: &mut UiReader,
    args: &Args,
    interval: Duration,
    page_gone: impl Fn() -> bool,
) -> Result<()> {
    // Wait for the page to announce itself.
    for _ in 0..20 {
        if ui.view().can_start {
            break;
        }
        wait(ui, interval).await;
    }
    if !ui.view().can_start {
        bail!(
            "no scan can start from the stored state ({:?}); try --reset",
            ui.state().status
        );
    }

    ui.start_scrape().await?;
    let mut last_line = String::new();
    loop {
        let view = ui.view();
        let line = render::progress_line(&view);
        if line != last_line {
            println!("{line}");
            last_line = line;
        }
        if ui.state().is_terminal() {
            break;
        }
        if page_gone() {
            ui.refresh().await;
            if !ui.state().is_terminal() {
                bail!("the page context stopped before the scan finished");
            }
            break;
        }
        wait(ui, interval).await;
    }

    println!("{}", render::panel(ui.state()));

    if args.upload {
        upload(ui).await?;
    }
    Ok(())
}

async fn upload(ui: &mut UiReader) -> Result<()> {
    if ui.state().status != Status::Complete || !ui.view().can_upload {
        scan_warn!("Upload skipped: nothing to upload");
        println!("Nothing to upload.");
        return Ok(());
    }

    let connectivity = ui.connectivity().await;
    println!("{}", render::connectivity(&connectivity));
    if !connectivity.can_upload() {
        return Ok(());
    }

    match ui.upload().await {
        Ok(receipt) => {
            println!(
                "Uploaded {} accounts. Continue at {}",
                receipt.username_count, receipt.redirect_url
            );
            Ok(())
        }
        Err(err) => {
            println!("{}", render::panel(ui.state()));
            Err(err.into())
        }
    }
}

/// Prefer a pushed update; fall back to pulling when none arrives in time.
async fn wait(ui: &mut UiReader, interval: Duration) {
    if !ui.next_update(interval).await {
        ui.refresh().await;
    }
    ui.drain_updates();
}
