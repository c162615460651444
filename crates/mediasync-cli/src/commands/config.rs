use super::{path_manager, prompts, trakt_client};
use crate::output::Output;
use color_eyre::Result;
use comfy_table::{Cell, Table};
use media_sync_config::{Config, CredentialStore, PathManager, TraktConfig};
use media_sync_sources::trakt::authorize_url;
use media_sync_sources::TrackingService;
use owo_colors::OwoColorize;
use serde_json::json;

pub async fn run_config(cmd: crate::ConfigCommands, output: &Output) -> Result<()> {
    match cmd {
        crate::ConfigCommands::Show { full } => show_config(full, output),
        crate::ConfigCommands::Trakt { client_id, client_secret } => {
            configure_trakt(client_id, client_secret, output).await
        }
        crate::ConfigCommands::Sync {
            collection,
            watched,
            shows_per_request,
        } => configure_sync(collection, watched, shows_per_request, output),
    }
}

fn load_or_default(path_manager: &PathManager, output: &Output) -> Result<Config> {
    let config_file = path_manager.config_file();
    if config_file.exists() {
        Config::load_from_file(&config_file)
            .map_err(|e| color_eyre::eyre::eyre!("Failed to load config from {}: {}", config_file.display(), e))
    } else {
        output.info("Configuration file not found. Creating default configuration...");
        Ok(Config::default())
    }
}

fn save(config: &Config, path_manager: &PathManager) -> Result<()> {
    let config_file = path_manager.config_file();
    config
        .save_to_file(&config_file)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to save config to {}: {}", config_file.display(), e))
}

fn show_config(full: bool, output: &Output) -> Result<()> {
    let path_manager = path_manager()?;
    let config_file = path_manager.config_file();

    if !config_file.exists() {
        output.warn(format!("Configuration file not found at: {}", config_file.display()));
        output.info("It will be created when you run 'mediasync config trakt'.");
        return Ok(());
    }

    let config = Config::load_from_file(&config_file)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to load config from {}: {}", config_file.display(), e))?;
    let mut cred_store = CredentialStore::new(path_manager.credentials_file());
    cred_store
        .load()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to load credentials: {}", e))?;
    let authenticated = cred_store.get_trakt_access_token().is_some_and(|t| !t.is_empty());
    let expires = cred_store.get_trakt_token_expires();
    let library = config
        .library
        .path
        .clone()
        .unwrap_or_else(|| path_manager.library_dir());

    let display = |value: &str| if full { value.to_string() } else { mask_string(value) };

    if !output.is_human() {
        let trakt = config.trakt.as_ref().map(|t| {
            json!({
                "enabled": t.enabled,
                "client_id": display(&t.client_id),
                "client_secret": display(&t.client_secret),
                "api_url": t.api_url(),
                "authenticated": authenticated,
                "token_expires": expires.map(|e| e.to_rfc3339()),
            })
        });
        output.json(&json!({
            "config_file": config_file.display().to_string(),
            "trakt": trakt,
            "sync": {
                "collection": config.sync.collection,
                "watched": config.sync.watched,
                "shows_per_request": config.sync.shows_per_request,
                "request_timeout_secs": config.sync.request_timeout_secs,
            },
            "library": library.display().to_string(),
        }));
        return Ok(());
    }
    if output.is_quiet() {
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Setting").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Value").add_attribute(comfy_table::Attribute::Bold),
    ]);
    table.add_row(vec![Cell::new("Config File"), Cell::new(config_file.display().to_string())]);
    match &config.trakt {
        Some(trakt) => {
            table.add_row(vec![Cell::new("Trakt Enabled"), Cell::new(check(trakt.enabled))]);
            table.add_row(vec![Cell::new("Trakt Client ID"), Cell::new(display(&trakt.client_id))]);
            table.add_row(vec![Cell::new("Trakt Client Secret"), Cell::new(display(&trakt.client_secret))]);
            table.add_row(vec![Cell::new("Trakt API"), Cell::new(trakt.api_url())]);
            table.add_row(vec![Cell::new("Authenticated"), Cell::new(check(authenticated))]);
            if let Some(expires) = expires {
                table.add_row(vec![Cell::new("Token Expires"), Cell::new(expires.to_rfc3339())]);
            }
        }
        None => {
            table.add_row(vec![Cell::new("Trakt"), Cell::new("Not configured".bright_black().to_string())]);
        }
    }
    table.add_row(vec![Cell::new("Sync Collection"), Cell::new(check(config.sync.collection))]);
    table.add_row(vec![Cell::new("Sync Watched"), Cell::new(check(config.sync.watched))]);
    table.add_row(vec![Cell::new("Shows Per Request"), Cell::new(config.sync.shows_per_request)]);
    table.add_row(vec![
        Cell::new("Request Timeout"),
        Cell::new(format!("{}s", config.sync.request_timeout_secs)),
    ]);
    table.add_row(vec![Cell::new("Library"), Cell::new(library.display().to_string())]);
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    println!("{}", table);

    Ok(())
}

async fn configure_trakt(
    client_id_arg: Option<String>,
    client_secret_arg: Option<String>,
    output: &Output,
) -> Result<()> {
    let path_manager = path_manager()?;
    let mut config = load_or_default(&path_manager, output)?;

    print_section_header("Trakt API Setup", output);
    output.println("Follow the instructions to setup your Trakt API application:");
    print_instruction_list(
        &[
            "Login to Trakt and navigate to your API apps page: https://trakt.tv/oauth/applications",
            "Create a new API application named 'mediasync'",
            "Use 'urn:ietf:wg:oauth:2.0:oob' as the Redirect URI",
        ],
        output,
    );
    output.println("");

    let existing = config.trakt.clone();
    let client_id = match client_id_arg {
        Some(id) => id,
        None => loop {
            let default = existing
                .as_ref()
                .map(|t| t.client_id.as_str())
                .filter(|id| !id.is_empty() && *id != "YOUR_CLIENT_ID");
            let input = prompts::prompt_string("Trakt Client ID", default)?;
            match validate_client_id(&input) {
                Ok(()) => break input,
                Err(e) => {
                    output.error(format!("Validation error: {}", e));
                    output.info("You can find your Client ID at: https://trakt.tv/oauth/applications");
                }
            }
        },
    };
    let client_secret = match client_secret_arg {
        Some(secret) => secret,
        None => {
            let is_new = existing
                .as_ref()
                .map_or(true, |t| t.client_secret.is_empty() || t.client_secret == "YOUR_CLIENT_SECRET");
            prompts::prompt_secret("Trakt Client Secret", is_new)?
        }
    };
    if client_id.trim().is_empty() || client_secret.trim().is_empty() {
        return Err(color_eyre::eyre::eyre!("Client ID and Client Secret are required"));
    }

    let app_changed = existing.as_ref().map_or(true, |t| t.client_id != client_id.trim());
    config.trakt = Some(TraktConfig {
        enabled: true,
        client_id: client_id.trim().to_string(),
        client_secret: client_secret.trim().to_string(),
        api_url: existing.and_then(|t| t.api_url),
    });
    save(&config, &path_manager)?;

    // Tokens issued to another application cannot be refreshed with this one.
    if app_changed {
        let mut cred_store = CredentialStore::new(path_manager.credentials_file());
        cred_store
            .load()
            .map_err(|e| color_eyre::eyre::eyre!("Failed to load credentials: {}", e))?;
        cred_store.clear_trakt_tokens();
        cred_store
            .save()
            .map_err(|e| color_eyre::eyre::eyre!("Failed to save credentials: {}", e))?;
    }

    let mut client = trakt_client(&config, &path_manager)?;

    output.println("");
    let mut authenticated = false;
    if client.is_authenticated() {
        print_oauth_progress("Attempting to refresh Trakt token...", output);
        match client.refresh_access_token().await {
            Ok(()) => authenticated = true,
            Err(e) => {
                tracing::debug!("Token refresh failed: {}", e);
                print_oauth_progress("Token refresh failed. Starting new authorization...", output);
            }
        }
    }

    if !authenticated {
        print_oauth_progress("Starting Trakt OAuth authentication...", output);
        output.println("");
        output.println("Please open the following URL in your browser and authorize mediasync:");
        output.println(format!("  {}", authorize_url(client_id.trim()).bright_blue()));
        output.println("");
        let code = prompts::prompt_string("Enter the PIN shown by Trakt", None)?;
        client
            .exchange_code(code.trim())
            .await
            .map_err(|e| color_eyre::eyre::eyre!("Trakt OAuth authentication failed: {}", e))?;
    }

    output.success("Trakt authentication successful!");
    if let Some(expires) = client.token_expires() {
        output.println(format!("  Access token expires at: {}", expires.to_rfc3339().bright_green()));
    }
    Ok(())
}

fn configure_sync(
    collection: Option<bool>,
    watched: Option<bool>,
    shows_per_request: Option<usize>,
    output: &Output,
) -> Result<()> {
    let path_manager = path_manager()?;
    let mut config = load_or_default(&path_manager, output)?;
    let interactive = collection.is_none() && watched.is_none() && shows_per_request.is_none();

    if interactive {
        print_section_header("Sync Options Configuration", output);
        output.println("Choose what 'mediasync sync' does when no direction flag is given.");
        output.println("");
    }

    config.sync.collection = match collection {
        Some(value) => value,
        None if interactive => {
            prompts::prompt_yes_no("Do you want to sync your collection?", Some(config.sync.collection))?
        }
        None => config.sync.collection,
    };

    config.sync.watched = match watched {
        Some(value) => value,
        None if interactive => {
            prompts::prompt_yes_no("Do you want to sync your watched history?", Some(config.sync.watched))?
        }
        None => config.sync.watched,
    };

    config.sync.shows_per_request = match shows_per_request {
        Some(value) => value,
        None if interactive => {
            output.println("\nSending many shows in one request may time out. 0 sends all shows at once.");
            prompts::prompt_number("How many shows per request?", config.sync.shows_per_request)?
        }
        None => config.sync.shows_per_request,
    };

    if !config.sync.collection && !config.sync.watched {
        output.warn("Both directions are disabled; 'mediasync sync' will need --collection or --watched");
    }

    save(&config, &path_manager)?;
    output.success("Sync options saved!");
    Ok(())
}

fn check(value: bool) -> String {
    if value {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    }
}

fn mask_string(s: &str) -> String {
    if s.is_empty() || s == "YOUR_CLIENT_ID" || s == "YOUR_CLIENT_SECRET" {
        return "<not set>".to_string();
    }
    if s.chars().count() <= 4 {
        return "*".repeat(s.chars().count());
    }
    let chars: Vec<char> = s.chars().collect();
    format!(
        "{}***{}",
        chars[..2].iter().collect::<String>(),
        chars[chars.len() - 2..].iter().collect::<String>()
    )
}

/// Validates Trakt Client ID format
fn validate_client_id(input: &str) -> Result<(), &'static str> {
    let input = input.trim();
    if input.is_empty() {
        return Err("Client ID cannot be empty");
    }
    if input.len() < 10 {
        return Err("Client ID seems too short. Please verify it's correct.");
    }
    Ok(())
}

fn print_section_header(title: &str, output: &Output) {
    output.println("");
    output.println(format!("{}", title.bold().bright_cyan()));
    output.println(format!("{}", "─".repeat(title.len()).bright_cyan()));
}

fn print_instruction_list(items: &[&str], output: &Output) {
    for (idx, item) in items.iter().enumerate() {
        output.println(format!("  {}. {}", idx + 1, item));
    }
}

fn print_oauth_progress(message: &str, output: &Output) {
    output.println(format!("{} {}", "→".bright_blue(), message.bright_white()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_string() {
        assert_eq!(mask_string(""), "<not set>");
        assert_eq!(mask_string("YOUR_CLIENT_ID"), "<not set>");
        assert_eq!(mask_string("abc"), "***");
        assert_eq!(mask_string("abcdefgh"), "ab***gh");
    }

    #[test]
    fn test_validate_client_id() {
        assert!(validate_client_id("").is_err());
        assert!(validate_client_id("short").is_err());
        assert!(validate_client_id("0123456789abcdef").is_ok());
    }
}
