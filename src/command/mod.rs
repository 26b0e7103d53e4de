//! Command line surface for Gator.
//!
//! Every subcommand is a variant of the closed [`Command`] enum and is
//! dispatched by a single `match`. Handlers write their user-facing output
//! to the supplied writer and log through `tracing`.

mod aggregate;
mod feeds;
mod users;

pub use aggregate::run_aggregator;

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{Config, DEFAULT_CONFIG_FILE};
use crate::db::{Database, User, UserRepository};
use crate::{GatorError, Result};

/// Number of posts `browse` shows when no limit is given.
pub const DEFAULT_BROWSE_LIMIT: i64 = 2;

/// Gator command line.
#[derive(Debug, Parser)]
#[command(name = "gator")]
#[command(version, about = "RSS feed aggregator")]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(long, short, env = "GATOR_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Create a user and log in as them.
    Register { name: String },
    /// Switch the current user.
    Login { name: String },
    /// Delete every user, feed, follow and post.
    Reset,
    /// List registered users.
    Users,
    /// Add a feed and follow it.
    #[command(name = "addfeed")]
    AddFeed { name: String, url: String },
    /// List all feeds.
    Feeds,
    /// Follow an existing feed by URL.
    Follow { url: String },
    /// List the feeds the current user follows.
    Following,
    /// Stop following a feed by URL.
    Unfollow { url: String },
    /// Poll feeds forever, one feed per interval (e.g. 30s, 1m, 1h30m).
    Agg {
        #[arg(value_name = "INTERVAL")]
        time_between_reqs: String,
    },
    /// Show the newest posts from followed feeds.
    Browse {
        #[arg(default_value_t = DEFAULT_BROWSE_LIMIT)]
        limit: i64,
    },
}

/// Everything a handler needs.
pub struct State {
    /// Loaded configuration.
    pub config: Config,
    /// Where the configuration is persisted.
    pub config_path: PathBuf,
    /// Open database.
    pub db: Database,
}

impl State {
    /// Bundle configuration and database.
    pub fn new(config: Config, config_path: impl Into<PathBuf>, db: Database) -> Self {
        Self {
            config,
            config_path: config_path.into(),
            db,
        }
    }

    /// Resolve the logged-in user.
    ///
    /// Fails if nobody is logged in or the stored name no longer exists.
    pub async fn current_user(&self) -> Result<User> {
        let name = self
            .config
            .session
            .current_user_name
            .as_deref()
            .ok_or_else(|| {
                GatorError::Validation("no user logged in, run `gator login <name>`".to_string())
            })?;

        UserRepository::new(self.db.pool())
            .get_by_name(name)
            .await?
            .ok_or_else(|| GatorError::NotFound(format!("user '{name}'")))
    }
}

/// Run one command.
pub async fn dispatch<W: Write>(state: &mut State, command: Command, out: &mut W) -> Result<()> {
    match command {
        Command::Register { name } => users::register(state, &name, out).await,
        Command::Login { name } => users::login(state, &name, out).await,
        Command::Reset => users::reset(state, out).await,
        Command::Users => users::list(state, out).await,
        Command::AddFeed { name, url } => {
            let user = state.current_user().await?;
            feeds::add_feed(state, &user, &name, &url, out).await
        }
        Command::Feeds => feeds::list(state, out).await,
        Command::Follow { url } => {
            let user = state.current_user().await?;
            feeds::follow(state, &user, &url, out).await
        }
        Command::Following => {
            let user = state.current_user().await?;
            feeds::following(state, &user, out).await
        }
        Command::Unfollow { url } => {
            let user = state.current_user().await?;
            feeds::unfollow(state, &user, &url, out).await
        }
        Command::Agg { time_between_reqs } => {
            aggregate::agg(state, &time_between_reqs, out).await
        }
        Command::Browse { limit } => {
            let user = state.current_user().await?;
            feeds::browse(state, &user, limit, out).await
        }
    }
}
