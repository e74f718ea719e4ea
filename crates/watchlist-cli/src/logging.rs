use anyhow::Result;
use std::io;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::fmt::{self, time::ChronoUtc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// Filter for the requested verbosity; RUST_LOG wins unless `quiet` is set
fn build_filter(verbose_level: u8, quiet: bool) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }
    let default = match verbose_level {
        0 => "warn,watchlist_core=info,watchlist_sources=info",
        // -v: debug for our crates, keep the HTTP stack quiet
        1 => "debug,hyper=warn,reqwest=info,rustls=warn",
        _ => "trace",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn wants_json() -> bool {
    std::env::var("RUST_LOG_JSON")
        .map(|v| v == "true")
        .unwrap_or_else(|_| !io::stdout().is_terminal())
}

/// Split `watchlist.log` into the directory and prefix the rolling appender wants
fn rotation_target(log_path: &PathBuf) -> Result<(PathBuf, String)> {
    let dir = log_path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Log file path has no parent directory"))?
        .to_path_buf();
    let file_name = log_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid log filename"))?;
    let prefix = file_name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file_name);
    Ok((dir, prefix.to_string()))
}

/// Log to stderr, and additionally to a daily-rotated file when `log_file` is set
pub fn init_logging_with_file(verbose_level: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let json = wants_json();

    let stderr_layer = if json {
        fmt::layer()
            .json()
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(io::stderr)
            .boxed()
    };

    let file_layer = match log_file {
        Some(log_path) => {
            let (dir, prefix) = rotation_target(&log_path)?;
            std::fs::create_dir_all(&dir)?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, prefix);
            let layer = if json {
                fmt::layer()
                    .json()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(appender)
                    .boxed()
            } else {
                fmt::layer()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .with_writer(appender)
                    .boxed()
            };
            Some(layer)
        }
        None => None,
    };

    Registry::default()
        .with(build_filter(verbose_level, quiet))
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_target_strips_extension() {
        let (dir, prefix) = rotation_target(&PathBuf::from("/tmp/logs/watchlist.log")).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/logs"));
        assert_eq!(prefix, "watchlist");
    }

    #[test]
    fn test_rotation_target_without_extension() {
        let (_, prefix) = rotation_target(&PathBuf::from("/tmp/logs/watchlist")).unwrap();
        assert_eq!(prefix, "watchlist");
    }
}
