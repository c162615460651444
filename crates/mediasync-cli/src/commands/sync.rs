use super::sync_ui::SyncUI;
use super::{load_config, path_manager, trakt_client};
use crate::output::Output;
use color_eyre::Result;
use comfy_table::{Cell, Table};
use media_sync_core::{
    JsonLibrary, PassOutcome, SessionOptions, SyncDirection, SyncScope, SyncSession, SyncSummary,
};
use media_sync_sources::TrackingService;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

pub async fn run_sync(
    collection: bool,
    watched: bool,
    only: Vec<String>,
    library: Option<PathBuf>,
    dry_run: bool,
    output: &Output,
) -> Result<()> {
    tracing::debug!("Sync command started");

    let path_manager = path_manager()?;
    let config = load_config(&path_manager)?;

    // Explicit flags win; otherwise the directions enabled in the config.
    let direction = if collection || watched {
        SyncDirection::from_flags(collection, watched)
    } else {
        SyncDirection::from_flags(config.sync.collection, config.sync.watched)
    }
    .ok_or_else(|| color_eyre::eyre::eyre!("No sync direction enabled. Use --collection/--watched or 'mediasync config sync'."))?;

    let scope = if only.is_empty() {
        SyncScope::All
    } else {
        SyncScope::Only(only)
    };

    let library_root = library
        .or_else(|| config.library.path.clone())
        .unwrap_or_else(|| path_manager.library_dir());
    let store = JsonLibrary::new(&library_root);
    let mut media = store
        .load()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to load library from {}: {}", library_root.display(), e))?;
    if media.is_empty() {
        output.warn(format!("The library at {} is empty", library_root.display()));
    }

    let mut client = trakt_client(&config, &path_manager)?;
    if !client.is_authenticated() {
        return Err(color_eyre::eyre::eyre!("Not authenticated with Trakt. Run 'mediasync config trakt' first."));
    }
    if client.needs_refresh() {
        tracing::info!("Trakt access token is about to expire, refreshing");
        if let Err(e) = client.refresh_access_token().await {
            tracing::warn!("Failed to refresh Trakt access token: {}", e);
        }
    }

    let mut options = SessionOptions::from(&config.sync);
    options.dry_run = dry_run;
    let mut session = SyncSession::new(client, store).with_options(options);
    spawn_ctrl_c_handler(session.cancellation_token());

    let ui = SyncUI::new("Syncing with Trakt...", output.is_human() && !output.is_quiet());
    let summary = session.run_sync(&mut media, direction, &scope).await;
    ui.finish();

    print_summary(&summary, dry_run, output);

    if summary.is_success() {
        Ok(())
    } else {
        let reasons: Vec<String> = summary.failures.iter().map(|f| f.message.clone()).collect();
        Err(color_eyre::eyre::eyre!("Sync failed: {}", reasons.join("; ")))
    }
}

/// Cancel the session on Ctrl-C. The session stops at the next entity.
pub(crate) fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current item");
            cancel.cancel();
        }
    });
}

fn print_summary(summary: &SyncSummary, dry_run: bool, output: &Output) {
    if !output.is_human() {
        match serde_json::to_value(summary) {
            Ok(mut value) => {
                value["success"] = serde_json::Value::Bool(summary.is_success());
                value["dry_run"] = serde_json::Value::Bool(dry_run);
                value["duration_seconds"] = serde_json::json!(summary.duration.as_secs_f64());
                output.json(&value);
            }
            Err(e) => output.error(format!("Failed to serialize summary: {}", e)),
        }
        return;
    }
    if output.is_quiet() {
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Kind"),
        Cell::new("Direction"),
        Cell::new("Remote"),
        Cell::new("Matched"),
        Cell::new("Unmatched"),
        Cell::new("Updated"),
        Cell::new("Pending"),
        Cell::new("Skipped"),
        Cell::new("Added"),
        Cell::new("Result"),
    ]);
    for pass in &summary.passes {
        let result = match pass.outcome {
            PassOutcome::Submitted => "sent",
            PassOutcome::UpToDate => "up-to-date",
            PassOutcome::DryRun => "dry run",
            PassOutcome::Aborted => "aborted",
        };
        table.add_row(vec![
            Cell::new(pass.kind.to_string()),
            Cell::new(pass.direction.to_string()),
            Cell::new(pass.remote_items),
            Cell::new(pass.matched),
            Cell::new(pass.unmatched),
            Cell::new(pass.updated),
            Cell::new(pass.pending),
            Cell::new(pass.skipped),
            Cell::new(pass.response.added.describe()),
            Cell::new(result),
        ]);
    }
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    output.println(table.to_string());

    if summary.skipped() > 0 {
        output.warn(format!(
            "{} items were skipped because they have no ids yet",
            summary.skipped()
        ));
    }
    if summary.not_found() > 0 {
        output.warn(format!("{} items were not found on Trakt", summary.not_found()));
    }
    for error in &summary.errors {
        output.warn(error);
    }
    for failure in &summary.failures {
        output.error(&failure.message);
    }
    if summary.is_success() {
        output.success(format!(
            "Sync completed in {:.1}s: {} added, {} local items updated",
            summary.duration.as_secs_f64(),
            summary.added().describe(),
            summary.updated()
        ));
    }
}
