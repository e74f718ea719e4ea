use super::prompts;
use super::spinner::Spinner;
use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde_json::json;

pub async fn run_login(email: Option<String>, offline: bool, output: &Output) -> Result<()> {
    let ctx = super::open(offline).await?;

    let email = match email {
        Some(email) => email.trim().to_string(),
        None => prompts::prompt_required("Email", None)?,
    };
    let password = if offline {
        String::new()
    } else {
        prompts::prompt_password("Password")?
    };

    let spinner = Spinner::start("Signing in...", output.is_human());
    let result = ctx.gateways.sign_in.sign_in_with_password(&email, &password).await;
    spinner.finish();

    let session = result.map_err(|e| eyre!("Sign-in failed: {}", e))?;
    if output.is_human() {
        output.success(format!("Signed in as {}", session.email));
    } else {
        output.json(&json!({ "signed_in": true, "user_id": session.user_id, "email": session.email }));
    }
    Ok(())
}

pub async fn run_logout(offline: bool, output: &Output) -> Result<()> {
    let ctx = super::open(offline).await?;
    if ctx.app.session().is_none() {
        output.info("Not signed in");
        return Ok(());
    }

    ctx.app
        .sign_out()
        .await
        .map_err(|e| eyre!("Sign-out failed: {}", e))?;
    output.success("Signed out");
    Ok(())
}

pub async fn run_whoami(offline: bool, output: &Output) -> Result<()> {
    let ctx = super::open(offline).await?;
    let session = ctx.app.session();

    if !output.is_human() {
        output.json(&json!({
            "signed_in": session.is_some(),
            "user_id": session.as_ref().map(|s| s.user_id.clone()),
            "email": session.as_ref().map(|s| s.email.clone()),
        }));
        return Ok(());
    }
    match session {
        Some(session) => output.info(format!("Signed in as {} ({})", session.email, session.user_id)),
        None => output.info("Not signed in. Run 'watchlist login'."),
    }
    Ok(())
}
