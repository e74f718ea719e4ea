use super::spinner::Spinner;
use crate::output::Output;
use crate::WatchedCommands;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::{Attribute, Cell, CellAlignment, Table};
use serde_json::json;
use watchlist_core::{WatchlistApp, MAX_RATING, MIN_RATING};
use watchlist_models::{WatchedEntry, WatchedSummary};

pub async fn run_watched(cmd: WatchedCommands, offline: bool, output: &Output) -> Result<()> {
    let ctx = super::open(offline).await?;
    if ctx.app.session().is_none() {
        return Err(eyre!("Not signed in. Run 'watchlist login' first."));
    }

    match cmd {
        WatchedCommands::List => list(&ctx.app, output),
        WatchedCommands::Add { id, rating, revisions } => add(&ctx.app, &id, rating, revisions, output).await,
        WatchedCommands::Remove { id } => remove(&ctx.app, &id, output).await,
    }
}

fn average(value: Option<f32>) -> String {
    value
        .map(|v| format!("{:.1}", v))
        .unwrap_or_else(|| "N/A".to_string())
}

fn summary_line(summary: &WatchedSummary) -> String {
    format!(
        "#️⃣ {} movies   ⭐ {}   🌟 {}   ⏳ {} min",
        summary.count,
        average(summary.avg_external_rating),
        average(summary.avg_user_rating),
        average(summary.avg_runtime_minutes),
    )
}

fn list(app: &WatchlistApp, output: &Output) -> Result<()> {
    let entries = app.watched();
    let summary = app.watched_summary();

    if !output.is_human() {
        output.json(&json!({ "summary": summary, "entries": entries }));
        return Ok(());
    }

    output.info(summary_line(&summary));
    if entries.is_empty() {
        output.info("Your watched list is empty");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("ID").add_attribute(Attribute::Bold),
        Cell::new("Title").add_attribute(Attribute::Bold),
        Cell::new("Year").add_attribute(Attribute::Bold),
        Cell::new("⭐").add_attribute(Attribute::Bold),
        Cell::new("🌟").add_attribute(Attribute::Bold),
        Cell::new("⏳").add_attribute(Attribute::Bold),
    ]);
    for entry in &entries {
        table.add_row(row(entry));
    }
    output.table(table);
    Ok(())
}

fn row(entry: &WatchedEntry) -> Vec<Cell> {
    let or_dash = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
    vec![
        Cell::new(&entry.external_id),
        Cell::new(&entry.title),
        Cell::new(&entry.year),
        Cell::new(or_dash(entry.external_rating.map(|r| r.to_string()))).set_alignment(CellAlignment::Right),
        Cell::new(or_dash(entry.user_rating.map(|r| r.to_string()))).set_alignment(CellAlignment::Right),
        Cell::new(or_dash(entry.runtime_minutes.map(|m| format!("{} min", m)))).set_alignment(CellAlignment::Right),
    ]
}

async fn add(app: &WatchlistApp, id: &str, rating: u8, revisions: u32, output: &Output) -> Result<()> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(eyre!("Rating must be between {} and {}", MIN_RATING, MAX_RATING));
    }

    let spinner = Spinner::start("Fetching movie details...", output.is_human());
    let detail = app.select_movie(id).await;
    let detail = match detail {
        Ok(detail) => detail,
        Err(e) => {
            spinner.finish();
            return Err(eyre!("Could not load {}: {}", id, e));
        }
    };

    // A single rating decision goes through the regular rate-then-add flow
    let result = if revisions <= 1 {
        app.rate(rating).map_err(|e| eyre!("{}", e))?;
        app.rate_and_add().await
    } else {
        let owner = app
            .session()
            .map(|s| s.user_id)
            .ok_or_else(|| eyre!("Not signed in"))?;
        app.add_watched(WatchedEntry::from_detail(&detail, &owner, rating, revisions))
            .await
    };
    spinner.finish();

    let stored = result.map_err(|e| eyre!("Could not add {}: {}", detail.title, e))?;
    if output.is_human() {
        output.success(format!("Added {} ({}) with rating {}", stored.title, stored.year, rating));
    } else {
        output.json(&json!({ "added": stored }));
    }
    Ok(())
}

async fn remove(app: &WatchlistApp, id: &str, output: &Output) -> Result<()> {
    let title = app
        .watched()
        .into_iter()
        .find(|e| e.matches(id))
        .map(|e| e.title);

    app.remove_watched(id)
        .await
        .map_err(|e| eyre!("Could not remove {}: {}", id, e))?;

    if output.is_human() {
        match title {
            Some(title) => output.success(format!("Removed {} from your watched list", title)),
            None => output.info(format!("{} was not in your watched list", id)),
        }
    } else {
        output.json(&json!({ "removed": id, "was_listed": title.is_some() }));
    }
    Ok(())
}
