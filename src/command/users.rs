//! User and session commands.

use std::io::Write;

use tracing::info;

use super::State;
use crate::db::UserRepository;
use crate::{GatorError, Result};

/// Create a user and make them the current user.
pub(super) async fn register<W: Write>(state: &mut State, name: &str, out: &mut W) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GatorError::Validation("user name must not be empty".to_string()));
    }

    let user = UserRepository::new(state.db.pool()).create(name).await?;
    state.config.set_user(&user.name, &state.config_path)?;
    info!(user = %user.name, "User registered");

    writeln!(out, "User {} created", user.name)?;
    writeln!(out, "  id:         {}", user.id)?;
    writeln!(out, "  created at: {}", user.created_at.format("%Y-%m-%d %H:%M:%S"))?;
    Ok(())
}

/// Switch to an existing user.
pub(super) async fn login<W: Write>(state: &mut State, name: &str, out: &mut W) -> Result<()> {
    let user = UserRepository::new(state.db.pool())
        .get_by_name(name)
        .await?
        .ok_or_else(|| GatorError::NotFound(format!("user '{name}'")))?;

    state.config.set_user(&user.name, &state.config_path)?;
    info!(user = %user.name, "User logged in");

    writeln!(out, "Logged in as {}", user.name)?;
    Ok(())
}

/// Remove every user; feeds, follows and posts cascade.
pub(super) async fn reset<W: Write>(state: &mut State, out: &mut W) -> Result<()> {
    let deleted = UserRepository::new(state.db.pool()).delete_all().await?;
    info!(deleted, "Database reset");

    writeln!(out, "Database reset, {deleted} user(s) removed")?;
    Ok(())
}

/// List users, flagging the current one.
pub(super) async fn list<W: Write>(state: &mut State, out: &mut W) -> Result<()> {
    let current = state.config.session.current_user_name.as_deref();
    for user in UserRepository::new(state.db.pool()).list_all().await? {
        if Some(user.name.as_str()) == current {
            writeln!(out, "* {} (current)", user.name)?;
        } else {
            writeln!(out, "* {}", user.name)?;
        }
    }
    Ok(())
}
