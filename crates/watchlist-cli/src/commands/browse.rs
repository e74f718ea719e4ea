use super::spinner::Spinner;
use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::{Attribute, Cell, Color, Table};
use serde_json::json;
use watchlist_core::{SearchState, SearchStatus, WatchlistApp};

fn or_na<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
}

async fn wait_for_search(app: &WatchlistApp, query: &str, spinner: &Spinner) -> Result<SearchState> {
    let mut rx = app.subscribe_search();
    loop {
        let state = rx.borrow_and_update().clone();
        if state.is_settled_for(query) {
            return Ok(state);
        }
        if state.status == SearchStatus::Loading {
            spinner.set_message(&format!("Searching for \"{}\"...", query));
        }
        rx.changed()
            .await
            .map_err(|_| eyre!("Search stopped before finishing"))?;
    }
}

pub async fn run_search(query: &str, offline: bool, output: &Output) -> Result<()> {
    let ctx = super::open(offline).await?;
    let query = query.trim();

    ctx.app.set_query(query);
    let spinner = Spinner::start("Waiting for input to settle...", output.is_human());
    let state = wait_for_search(&ctx.app, query, &spinner).await;
    spinner.finish();
    ctx.app.shutdown();
    let state = state?;

    match state.status {
        SearchStatus::Failed(reason) => return Err(eyre!("Search failed: {}", reason)),
        SearchStatus::Idle => {
            output.warn("Query too short; type at least a few characters");
            if !output.is_human() {
                output.json(&json!({ "query": query, "results": [] }));
            }
            return Ok(());
        }
        SearchStatus::Loading | SearchStatus::Ready => {}
    }

    if !output.is_human() {
        let results: Vec<_> = state
            .movies
            .iter()
            .map(|m| {
                json!({
                    "id": m.external_id,
                    "title": m.title,
                    "year": m.year,
                    "poster": m.poster_url,
                    "watched_rating": ctx.app.watched_rating(&m.external_id),
                })
            })
            .collect();
        output.json(&json!({ "query": query, "results": results }));
        return Ok(());
    }

    output.info(format!("Found {} results", state.movies.len()));
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("ID").add_attribute(Attribute::Bold),
        Cell::new("Title").add_attribute(Attribute::Bold),
        Cell::new("Year").add_attribute(Attribute::Bold),
        Cell::new("Watched").add_attribute(Attribute::Bold),
    ]);
    for movie in &state.movies {
        let watched = match ctx.app.watched_rating(&movie.external_id) {
            Some(rating) => Cell::new(format!("★ {}", rating)).fg(Color::Yellow),
            None => Cell::new(""),
        };
        table.add_row(vec![
            Cell::new(&movie.external_id),
            Cell::new(&movie.title),
            Cell::new(&movie.year),
            watched,
        ]);
    }
    output.table(table);
    Ok(())
}

pub async fn run_show(id: &str, offline: bool, output: &Output) -> Result<()> {
    let ctx = super::open(offline).await?;

    let spinner = Spinner::start("Loading movie...", output.is_human());
    let detail = ctx.app.select_movie(id).await;
    spinner.finish();
    let detail = detail.map_err(|e| eyre!("Could not load {}: {}", id, e))?;

    let watched_rating = ctx.app.watched_rating(&detail.external_id);
    let views = ctx.app.comment_views();

    if !output.is_human() {
        output.json(&json!({
            "movie": detail,
            "watched_rating": watched_rating,
            "comments": views,
        }));
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        Cell::new(format!("{} ({})", detail.title, detail.year))
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(&detail.external_id),
    ]);
    table.add_row(vec![Cell::new("Released"), Cell::new(&detail.released)]);
    table.add_row(vec![Cell::new("Runtime"), Cell::new(format!("{} min", or_na(detail.runtime_minutes)))]);
    table.add_row(vec![Cell::new("Rating"), Cell::new(format!("⭐ {}", or_na(detail.external_rating)))]);
    table.add_row(vec![Cell::new("Genre"), Cell::new(&detail.genre)]);
    table.add_row(vec![Cell::new("Director"), Cell::new(&detail.director)]);
    table.add_row(vec![Cell::new("Starring"), Cell::new(&detail.actors)]);
    table.add_row(vec![Cell::new("Plot"), Cell::new(&detail.plot)]);
    output.table(table);

    match watched_rating {
        Some(rating) => output.info(format!("You rated this movie {} ⭐", rating)),
        None if ctx.app.session().is_some() => {
            output.info(format!("Not watched yet. Add it with 'watchlist watched add {} --rating N'", detail.external_id))
        }
        None => {}
    }

    output.println("");
    if views.is_empty() {
        output.info("No comments yet");
        return Ok(());
    }
    let mut comments = Table::new();
    comments.set_header(vec![
        Cell::new("ID").add_attribute(Attribute::Bold),
        Cell::new("Author").add_attribute(Attribute::Bold),
        Cell::new("Posted").add_attribute(Attribute::Bold),
        Cell::new("Comment").add_attribute(Attribute::Bold),
    ]);
    for view in &views {
        let author = if view.can_delete {
            Cell::new(format!("{} (you)", view.author_label)).fg(Color::Green)
        } else {
            Cell::new(&view.author_label)
        };
        comments.add_row(vec![
            Cell::new(&view.comment.id),
            author,
            Cell::new(view.comment.created_at.format("%Y-%m-%d %H:%M").to_string()),
            Cell::new(&view.comment.body),
        ]);
    }
    output.table(comments);
    Ok(())
}
