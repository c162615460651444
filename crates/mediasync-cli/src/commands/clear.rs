use super::prompts;
use super::sync::spawn_ctrl_c_handler;
use super::{load_config, path_manager, trakt_client};
use crate::output::Output;
use color_eyre::Result;
use media_sync_core::{ClearScope, JsonLibrary, SyncSession};
use media_sync_sources::TrackingService;
use serde_json::json;

pub async fn run_clear(movies: bool, shows: bool, yes: bool, output: &Output) -> Result<()> {
    let scope = ClearScope::from_flags(movies, shows);
    let what = match scope {
        ClearScope::Movies => "movies",
        ClearScope::Shows => "shows",
        ClearScope::Both => "movies and shows",
    };

    if !yes {
        let confirmed = prompts::prompt_yes_no(
            &format!("Remove ALL {} from your Trakt collection and watched history?", what),
            Some(false),
        )?;
        if !confirmed {
            output.info("Nothing was removed");
            return Ok(());
        }
    }

    let path_manager = path_manager()?;
    let config = load_config(&path_manager)?;
    let client = trakt_client(&config, &path_manager)?;
    if !client.is_authenticated() {
        return Err(color_eyre::eyre::eyre!("Not authenticated with Trakt. Run 'mediasync config trakt' first."));
    }

    // The store is never written during a clear.
    let store = JsonLibrary::new(path_manager.library_dir());
    let mut session = SyncSession::new(client, store);
    spawn_ctrl_c_handler(session.cancellation_token());
    let summary = session.run_clear(scope).await;

    if output.is_human() {
        output.info(format!(
            "Removed from collection: {}",
            summary.removed_from_collection.describe()
        ));
        output.info(format!("Removed from history: {}", summary.removed_from_history.describe()));
    } else {
        output.json(&json!({
            "success": summary.is_success(),
            "scope": scope,
            "summary": summary,
        }));
    }

    if summary.is_success() {
        output.success(format!("Cleared {} from Trakt", what));
        Ok(())
    } else {
        let reasons: Vec<String> = summary.failures.iter().map(|f| f.message.clone()).collect();
        Err(color_eyre::eyre::eyre!("Clear failed: {}", reasons.join("; ")))
    }
}
