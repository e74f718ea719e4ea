use clap::{ArgAction, Parser, Subcommand};
use commands::{auth, browse, clear, comments, config, watched};

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "watchlist")]
#[command(about = "Search movies, keep a rated watched list and discuss them")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    /// Use a throwaway in-memory backend with a demo catalog and user
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    offline: bool,

    /// Also write logs to the daily-rotated log file
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        /// Account email (prompted if omitted)
        #[arg(long)]
        email: Option<String>,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in account
    Whoami,
    /// Search movies by title
    #[command(long_about = "Search the movie provider by title. Queries shorter than the configured minimum length return no results without contacting the provider.")]
    Search {
        /// Title to search for
        query: String,
    },
    /// Show a movie's details and its comments
    Show {
        /// Movie id, e.g. tt0110912
        id: String,
    },
    /// Manage your watched list
    Watched {
        #[command(subcommand)]
        cmd: Option<WatchedCommands>,
    },
    /// Post or delete comments on a movie
    Comments {
        #[command(subcommand)]
        cmd: CommentCommands,
    },
    /// View or create the configuration file
    Config {
        #[command(subcommand)]
        cmd: Option<ConfigCommands>,
    },
    /// Clear stored data
    #[command(long_about = "Clear stored data. Use --credentials to remove the stored session tokens.")]
    Clear {
        /// Clear stored session tokens
        #[arg(long, action = ArgAction::SetTrue)]
        credentials: bool,
    },
}

#[derive(Subcommand)]
pub enum WatchedCommands {
    /// List watched movies with summary figures
    List,
    /// Rate a movie and add it to the watched list
    Add {
        /// Movie id, e.g. tt0110912
        id: String,

        /// Your rating, 1 to 10
        #[arg(long)]
        rating: u8,

        /// How many times you changed your mind about the rating
        #[arg(long, default_value_t = 1)]
        revisions: u32,
    },
    /// Remove a movie from the watched list
    Remove {
        /// Movie id, e.g. tt0110912
        id: String,
    },
}

#[derive(Subcommand)]
pub enum CommentCommands {
    /// Post a comment on a movie
    Post {
        /// Movie id, e.g. tt0110912
        movie: String,
        /// Comment text
        body: String,
    },
    /// Delete one of your own comments
    Delete {
        /// Movie id, e.g. tt0110912
        movie: String,
        /// Comment id as shown by `watchlist show`
        comment_id: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration (masks sensitive data)
    Show {
        /// Show secrets unmasked
        #[arg(long, action = ArgAction::SetTrue)]
        full: bool,
    },
    /// Create or update the configuration interactively
    Init,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let log_file = if cli.log_file {
        Some(commands::path_manager().log_file())
    } else {
        None
    };
    logging::init_logging_with_file(cli.verbose, cli.quiet, log_file)
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);
    let offline = cli.offline;

    match cli.command {
        Commands::Login { email } => auth::run_login(email, offline, &output).await,
        Commands::Logout => auth::run_logout(offline, &output).await,
        Commands::Whoami => auth::run_whoami(offline, &output).await,
        Commands::Search { query } => browse::run_search(&query, offline, &output).await,
        Commands::Show { id } => browse::run_show(&id, offline, &output).await,
        Commands::Watched { cmd } => {
            let cmd = cmd.unwrap_or(WatchedCommands::List);
            watched::run_watched(cmd, offline, &output).await
        }
        Commands::Comments { cmd } => comments::run_comments(cmd, offline, &output).await,
        Commands::Config { cmd } => {
            let cmd = cmd.unwrap_or(ConfigCommands::Show { full: false });
            config::run_config(cmd, &output)
        }
        Commands::Clear { credentials } => clear::run_clear(credentials, &output),
    }
}
