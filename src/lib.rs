//! Gator - RSS feed aggregator
//!
//! Polls subscribed RSS feeds on a fixed interval, one feed per tick, and
//! stores every item it has not seen before as a post.

pub mod command;
pub mod config;
pub mod db;
pub mod error;
pub mod interval;
pub mod logging;
pub mod rss;

pub use command::{dispatch, Cli, Command, State};
pub use config::Config;
pub use db::{Database, User, UserRepository};
pub use error::{FetchError, GatorError, Result};
pub use interval::parse_interval;
