use super::spinner::Spinner;
use crate::output::Output;
use crate::CommentCommands;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde_json::json;
use watchlist_core::WatchlistApp;

pub async fn run_comments(cmd: CommentCommands, offline: bool, output: &Output) -> Result<()> {
    let ctx = super::open(offline).await?;
    if ctx.app.session().is_none() {
        return Err(eyre!("Not signed in. Run 'watchlist login' first."));
    }

    match cmd {
        CommentCommands::Post { movie, body } => post(&ctx.app, &movie, &body, output).await,
        CommentCommands::Delete { movie, comment_id } => {
            delete(&ctx.app, &movie, &comment_id, output).await
        }
    }
}

async fn open_thread(app: &WatchlistApp, movie: &str, output: &Output) -> Result<String> {
    let spinner = Spinner::start("Loading comments...", output.is_human());
    let detail = app.select_movie(movie).await;
    spinner.finish();
    detail
        .map(|d| d.title)
        .map_err(|e| eyre!("Could not load {}: {}", movie, e))
}

async fn post(app: &WatchlistApp, movie: &str, body: &str, output: &Output) -> Result<()> {
    let title = open_thread(app, movie, output).await?;

    app.set_comment_draft(body);
    app.post_comment(body)
        .await
        .map_err(|e| eyre!("Could not post comment: {}", e))?;

    let posted = app.comment_views().into_iter().next();
    if output.is_human() {
        output.success(format!("Comment posted on {}", title));
    } else {
        output.json(&json!({ "movie": movie, "posted": posted }));
    }
    Ok(())
}

async fn delete(app: &WatchlistApp, movie: &str, comment_id: &str, output: &Output) -> Result<()> {
    open_thread(app, movie, output).await?;

    app.delete_comment(comment_id)
        .await
        .map_err(|e| eyre!("Could not delete comment {}: {}", comment_id, e))?;

    if output.is_human() {
        output.success(format!("Deleted comment {}", comment_id));
    } else {
        output.json(&json!({ "movie": movie, "deleted": comment_id }));
    }
    Ok(())
}
