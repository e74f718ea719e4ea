use super::prompts;
use crate::output::Output;
use crate::ConfigCommands;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::{Attribute, Cell, Color, Table};
use owo_colors::OwoColorize;
use serde_json::json;
use watchlist_config::{Config, PathManager};

pub fn run_config(cmd: ConfigCommands, output: &Output) -> Result<()> {
    let paths = super::path_manager();
    match cmd {
        ConfigCommands::Show { full } => show_config(&paths, full, output),
        ConfigCommands::Init => init_config(&paths, output),
    }
}

fn show_config(paths: &PathManager, full: bool, output: &Output) -> Result<()> {
    let config_file = paths.config_file();
    if !config_file.exists() {
        output.warn(format!("Configuration file not found at: {}", config_file.display()));
        output.info("Run 'watchlist config init' to create it, or use --offline for the demo catalog.");
        return Ok(());
    }
    let config = super::load_config(paths)?;
    let secret = |value: &str| if full { value.to_string() } else { mask_string(value) };

    if !output.is_human() {
        output.json(&json!({
            "config_file": config_file.display().to_string(),
            "omdb": {
                "api_key": secret(&config.omdb.api_key),
                "base_url": config.omdb.base_url,
                "configured": config.is_omdb_configured(),
            },
            "backend": {
                "url": config.backend.url,
                "anon_key": secret(&config.backend.anon_key),
                "configured": config.is_backend_configured(),
            },
            "search": {
                "min_query_len": config.search.min_query_len,
                "debounce_ms": config.search.debounce_ms,
            },
            "http": { "timeout_secs": config.http.timeout_secs },
            "valid": config.validate().is_ok(),
        }));
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Setting").fg(Color::Cyan).add_attribute(Attribute::Bold),
        Cell::new(config_file.display().to_string()),
    ]);
    table.add_row(vec![Cell::new("OMDb API key"), Cell::new(secret(&config.omdb.api_key))]);
    table.add_row(vec![Cell::new("OMDb base URL"), Cell::new(&config.omdb.base_url)]);
    table.add_row(vec![Cell::new("Backend URL"), Cell::new(&config.backend.url)]);
    table.add_row(vec![Cell::new("Backend anon key"), Cell::new(secret(&config.backend.anon_key))]);
    table.add_row(vec![
        Cell::new("Min query length"),
        Cell::new(config.search.min_query_len),
    ]);
    table.add_row(vec![
        Cell::new("Search debounce"),
        Cell::new(format!("{} ms", config.search.debounce_ms)),
    ]);
    table.add_row(vec![
        Cell::new("HTTP timeout"),
        Cell::new(format!("{} s", config.http.timeout_secs)),
    ]);
    output.table(table);

    match config.validate() {
        Ok(()) => output.println(format!("{}", "✓ Configuration is complete".green())),
        Err(e) => output.println(format!("{} {}", "✗".red(), e.to_string().bright_black())),
    }
    Ok(())
}

fn init_config(paths: &PathManager, output: &Output) -> Result<()> {
    let config_file = paths.config_file();
    let mut config = if config_file.exists() {
        output.info(format!("Updating {}", config_file.display()));
        super::load_config(paths)?
    } else {
        Config::template()
    };

    output.println(format!("\n{}", "OMDb".bright_cyan().bold()));
    output.println("Request a free key at https://www.omdbapi.com/apikey.aspx");
    config.omdb.api_key = prompts::prompt_required("API key", known(&config.omdb.api_key))?;

    output.println(format!("\n{}", "Backend".bright_cyan().bold()));
    output.println("Project URL and anon key from your hosted project's API settings");
    config.backend.url = prompts::prompt_required("Project URL", known(&config.backend.url))?;
    config.backend.anon_key = prompts::prompt_required("Anon key", known(&config.backend.anon_key))?;

    output.println(format!("\n{}", "Search".bright_cyan().bold()));
    config.search.min_query_len = prompts::prompt_bounded(
        "Minimum query length",
        config.search.min_query_len as u64,
        1,
        20,
    )? as usize;
    config.search.debounce_ms =
        prompts::prompt_bounded("Debounce in milliseconds", config.search.debounce_ms, 0, 5_000)?;

    config
        .validate()
        .map_err(|e| eyre!("Configuration is incomplete: {}", e))?;
    paths
        .ensure_directories()
        .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
    config
        .save_to_file(&config_file)
        .map_err(|e| eyre!("Failed to save config to {}: {}", config_file.display(), e))?;

    output.success(format!("Configuration saved to {}", config_file.display()));
    output.info("Next: 'watchlist login' to sign in");
    Ok(())
}

/// Existing value to offer as the prompt default, skipping template placeholders
fn known(value: &str) -> Option<&str> {
    if value.is_empty() || value.starts_with("YOUR_") {
        None
    } else {
        Some(value)
    }
}

fn mask_string(s: &str) -> String {
    if s.is_empty() || s.starts_with("YOUR_") {
        return "<not set>".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}***{}", head, tail)
}
