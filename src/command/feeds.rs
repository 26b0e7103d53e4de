//! Feed, follow and browse commands.

use std::io::Write;

use tracing::info;

use super::State;
use crate::db::User;
use crate::rss::{validate_url, FeedFollowRepository, FeedRepository, NewFeed, PostRepository};
use crate::{GatorError, Result};

/// Register a feed owned by `user` and follow it.
pub(super) async fn add_feed<W: Write>(
    state: &State,
    user: &User,
    name: &str,
    url: &str,
    out: &mut W,
) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GatorError::Validation("feed name must not be empty".to_string()));
    }
    validate_url(url)?;

    let feed = FeedRepository::new(state.db.pool())
        .create(&NewFeed::new(name, url, user.id))
        .await?;
    let follow = FeedFollowRepository::new(state.db.pool())
        .create(user.id, feed.id)
        .await?;
    info!(feed = %feed.name, url = %feed.url, user = %user.name, "Feed added");

    writeln!(out, "Feed {} added", feed.name)?;
    writeln!(out, "  id:  {}", feed.id)?;
    writeln!(out, "  url: {}", feed.url)?;
    writeln!(out, "{} now follows {}", follow.user_name, follow.feed_name)?;
    Ok(())
}

/// List every feed with the user who added it.
pub(super) async fn list<W: Write>(state: &State, out: &mut W) -> Result<()> {
    for entry in FeedRepository::new(state.db.pool()).list_with_owner().await? {
        writeln!(
            out,
            "* {} ({}) added by {}",
            entry.feed.name, entry.feed.url, entry.owner_name
        )?;
    }
    Ok(())
}

/// Follow an existing feed.
pub(super) async fn follow<W: Write>(
    state: &State,
    user: &User,
    url: &str,
    out: &mut W,
) -> Result<()> {
    let feed = FeedRepository::new(state.db.pool())
        .get_by_url(url)
        .await?
        .ok_or_else(|| GatorError::NotFound(format!("feed '{url}'")))?;

    let follow = FeedFollowRepository::new(state.db.pool())
        .create(user.id, feed.id)
        .await?;
    info!(feed = %feed.name, user = %user.name, "Feed followed");

    writeln!(out, "{} now follows {}", follow.user_name, follow.feed_name)?;
    Ok(())
}

/// List the feeds `user` follows.
pub(super) async fn following<W: Write>(state: &State, user: &User, out: &mut W) -> Result<()> {
    for follow in FeedFollowRepository::new(state.db.pool())
        .list_for_user(user.id)
        .await?
    {
        writeln!(out, "* {}", follow.feed_name)?;
    }
    Ok(())
}

/// Stop following a feed.
pub(super) async fn unfollow<W: Write>(
    state: &State,
    user: &User,
    url: &str,
    out: &mut W,
) -> Result<()> {
    let removed = FeedFollowRepository::new(state.db.pool())
        .delete_by_url(user.id, url)
        .await?;
    if !removed {
        return Err(GatorError::NotFound(format!("follow of '{url}'")));
    }
    info!(url, user = %user.name, "Feed unfollowed");

    writeln!(out, "{} unfollowed {}", user.name, url)?;
    Ok(())
}

/// Print the newest posts from followed feeds.
pub(super) async fn browse<W: Write>(
    state: &State,
    user: &User,
    limit: i64,
    out: &mut W,
) -> Result<()> {
    if limit <= 0 {
        return Err(GatorError::Validation(format!(
            "limit must be a positive number, got {limit}"
        )));
    }

    let posts = PostRepository::new(state.db.pool())
        .list_for_user(user.id, limit)
        .await?;

    writeln!(out, "Found {} post(s) for {}:", posts.len(), user.name)?;
    for entry in posts {
        let post = entry.post;
        match post.published_at {
            Some(at) => writeln!(out, "{} from {}", at.format("%a %b %d %Y"), entry.feed_name)?,
            None => writeln!(out, "from {}", entry.feed_name)?,
        }
        writeln!(out, "--- {} ---", post.title)?;
        if let Some(description) = &post.description {
            writeln!(out, "    {description}")?;
        }
        writeln!(out, "Link: {}", post.url)?;
        writeln!(out, "=====================================")?;
    }
    Ok(())
}
