pub mod auth;
pub mod browse;
pub mod clear;
pub mod comments;
pub mod config;
pub mod prompts;
pub mod spinner;
pub mod watched;

use std::sync::Arc;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use watchlist_config::{Config, PathManager};
use watchlist_core::{SearchOptions, WatchlistApp};
use watchlist_models::MovieDetail;
use watchlist_sources::{Gateways, InMemoryBackend};

pub fn path_manager() -> PathManager {
    PathManager::default()
}

pub fn load_config(paths: &PathManager) -> Result<Config> {
    let config_file = paths.config_file();
    if !config_file.exists() {
        return Err(eyre!(
            "Configuration file not found at {}. Run 'watchlist config init' first, or pass --offline.",
            config_file.display()
        ));
    }
    Config::load_from_file(&config_file)
        .map_err(|e| eyre!("Failed to load config from {}: {}", config_file.display(), e))
}

/// The collaborators plus the app built on them
pub struct Context {
    pub gateways: Gateways,
    pub app: WatchlistApp,
}

/// Build the app against the configured services (or the demo backend) and
/// resolve the stored session
pub async fn open(offline: bool) -> Result<Context> {
    let (gateways, options) = if offline {
        (Gateways::in_memory(demo_backend()?), SearchOptions::default())
    } else {
        let paths = path_manager();
        let config = load_config(&paths)?;
        let gateways = Gateways::hosted(&config, &paths)
            .map_err(|e| eyre!("Invalid configuration: {}", e))?;
        (gateways, SearchOptions::from(&config.search))
    };

    let app = WatchlistApp::new(gateways.clone(), options);
    app.start()
        .await
        .map_err(|e| eyre!("Failed to restore session: {}", e))?;
    Ok(Context { gateways, app })
}

pub const DEMO_EMAIL: &str = "demo@example.com";

fn demo_movie(id: &str, title: &str, year: &str, runtime: u32, rating: f32) -> MovieDetail {
    MovieDetail {
        external_id: id.to_string(),
        title: title.to_string(),
        year: year.to_string(),
        poster_url: None,
        runtime_minutes: Some(runtime),
        external_rating: Some(rating),
        plot: String::new(),
        released: String::new(),
        actors: String::new(),
        director: String::new(),
        genre: String::new(),
    }
}

/// In-memory backend with a small catalog, a signed-in demo user and a
/// second user whose comments cannot be deleted
fn demo_backend() -> Result<Arc<InMemoryBackend>> {
    let backend = Arc::new(InMemoryBackend::new());
    backend.register_user("demo", DEMO_EMAIL);
    backend.register_user("cinephile", "cinephile@example.com");

    backend.add_movie(MovieDetail {
        plot: "A thief who steals corporate secrets through dream-sharing technology is given the inverse task of planting an idea.".to_string(),
        director: "Christopher Nolan".to_string(),
        genre: "Action, Adventure, Sci-Fi".to_string(),
        ..demo_movie("tt1375666", "Inception", "2010", 148, 8.8)
    });
    backend.add_movie(demo_movie("tt5295894", "Inception: The Cobol Job", "2010", 14, 7.2));
    backend.add_movie(demo_movie("tt1790736", "Inception: Jump Right Into the Action", "2010", 15, 7.4));
    backend.add_movie(MovieDetail {
        director: "Quentin Tarantino".to_string(),
        genre: "Crime, Drama".to_string(),
        ..demo_movie("tt0110912", "Pulp Fiction", "1994", 154, 8.9)
    });
    backend.add_movie(demo_movie("tt0133093", "The Matrix", "1999", 136, 8.7));

    backend.seed_comment("tt1375666", "cinephile", "The spinning top still haunts me.");
    backend
        .sign_in_as("demo")
        .map_err(|e| eyre!("Failed to sign in demo user: {}", e))?;
    Ok(backend)
}
