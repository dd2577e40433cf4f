//! The CLI commands and the table that routes to them.

use async_trait::async_trait;
use tracing::info;

use crate::auth::{logged_in, AuthedHandler};
use crate::command::{Command, CommandNames, Commands, Handler, State};
use crate::db::{is_unique_violation, User};
use crate::error::GatorError;
use crate::scheduler::{parse_interval, Scheduler};

/// Builds the full command table.
pub fn registry() -> Commands {
    let mut commands = Commands::new();
    commands.register("login", Login);
    commands.register("register", Register);
    commands.register("reset", Reset);
    commands.register("users", Users);
    commands.register("agg", logged_in(Agg));
    commands.register("addfeed", logged_in(AddFeed));
    commands.register("feeds", Feeds);
    commands.register("follow", logged_in(Follow));
    commands.register("following", logged_in(Following));
    commands.register("unfollow", logged_in(Unfollow));

    let names = commands.live_names();
    commands.register("help", Help { names });
    commands
}

/// Commands that keep running until interrupted and so watch `State::shutdown`.
pub fn is_long_running(name: &str) -> bool {
    name == "agg"
}

pub struct Help {
    names: CommandNames,
}

#[async_trait]
impl Handler for Help {
    async fn call(&self, state: &mut State, _cmd: Command) -> Result<(), GatorError> {
        state.out.line("Available commands:");
        for name in self.names.list() {
            state.out.line(format!(" - {}", name));
        }
        Ok(())
    }
}

pub struct Login;

#[async_trait]
impl Handler for Login {
    async fn call(&self, state: &mut State, cmd: Command) -> Result<(), GatorError> {
        GatorError::check_args(&cmd.name, &cmd.args, 1)?;
        let name = &cmd.args[0];

        let user = state
            .db
            .get_user(name)
            .await?
            .ok_or_else(|| GatorError::UserNotFound(name.clone()))?;
        state.config.set_user(&user.name)?;

        state.out.line(format!("Logged in as {}", user.name));
        Ok(())
    }
}

pub struct Register;

#[async_trait]
impl Handler for Register {
    async fn call(&self, state: &mut State, cmd: Command) -> Result<(), GatorError> {
        GatorError::check_args(&cmd.name, &cmd.args, 1)?;
        let name = &cmd.args[0];

        let user = state.db.create_user(name).await.map_err(|err| {
            if is_unique_violation(&err) {
                GatorError::UserExists(name.clone())
            } else {
                err.into()
            }
        })?;
        state.config.set_user(&user.name)?;

        info!("Registered user {} (id {})", user.name, user.id);
        state.out.line(format!("Created user {}", user.name));
        Ok(())
    }
}

pub struct Reset;

#[async_trait]
impl Handler for Reset {
    async fn call(&self, state: &mut State, cmd: Command) -> Result<(), GatorError> {
        GatorError::check_args(&cmd.name, &cmd.args, 0)?;

        state.db.delete_all_users().await?;
        state.config.set_user("")?;

        state.out.line("Deleted all users");
        Ok(())
    }
}

pub struct Users;

#[async_trait]
impl Handler for Users {
    async fn call(&self, state: &mut State, cmd: Command) -> Result<(), GatorError> {
        GatorError::check_args(&cmd.name, &cmd.args, 0)?;

        let current = state.config.current_user();
        for user in state.db.get_users().await? {
            if Some(user.name.as_str()) == current {
                state.out.line(format!("* {} (current)", user.name));
            } else {
                state.out.line(format!("* {}", user.name));
            }
        }
        Ok(())
    }
}

pub struct Agg;

#[async_trait]
impl AuthedHandler for Agg {
    async fn call(&self, state: &mut State, cmd: Command, user: User) -> Result<(), GatorError> {
        GatorError::check_args(&cmd.name, &cmd.args, 1)?;
        let interval = parse_interval(&cmd.args[0])?;

        info!("Aggregation started by {}", user.name);
        state.out.line(format!(
            "Collecting feeds every {}",
            humantime::format_duration(interval)
        ));

        Scheduler::new(state.db.clone(), state.source.clone(), interval)
            .with_output(state.out.clone())
            .run(state.shutdown.clone())
            .await;
        Ok(())
    }
}

pub struct AddFeed;

#[async_trait]
impl AuthedHandler for AddFeed {
    async fn call(&self, state: &mut State, cmd: Command, user: User) -> Result<(), GatorError> {
        GatorError::check_args(&cmd.name, &cmd.args, 2)?;
        let (name, url) = (&cmd.args[0], &cmd.args[1]);

        let feed = state
            .db
            .create_feed(name, url, user.id)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    GatorError::FeedExists(url.clone())
                } else {
                    err.into()
                }
            })?;
        state.out.line(format!("Created feed {} ({})", feed.name, feed.url));

        follow_feed(state, &user, url).await
    }
}

pub struct Feeds;

#[async_trait]
impl Handler for Feeds {
    async fn call(&self, state: &mut State, cmd: Command) -> Result<(), GatorError> {
        GatorError::check_args(&cmd.name, &cmd.args, 0)?;

        for feed in state.db.get_feeds().await? {
            state
                .out
                .line(format!("* {} ({}) added by {}", feed.name, feed.url, feed.owner));
        }
        Ok(())
    }
}

pub struct Follow;

#[async_trait]
impl AuthedHandler for Follow {
    async fn call(&self, state: &mut State, cmd: Command, user: User) -> Result<(), GatorError> {
        GatorError::check_args(&cmd.name, &cmd.args, 1)?;
        follow_feed(state, &user, &cmd.args[0]).await
    }
}

async fn follow_feed(state: &State, user: &User, url: &str) -> Result<(), GatorError> {
    let feed = state
        .db
        .get_feed_by_url(url)
        .await?
        .ok_or_else(|| GatorError::FeedNotFound(url.to_string()))?;

    let follow = state
        .db
        .create_feed_follow(user.id, feed.id)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                GatorError::AlreadyFollowing(feed.name.clone())
            } else {
                err.into()
            }
        })?;

    state
        .out
        .line(format!("{} now follows {}", follow.user_name, follow.feed_name));
    Ok(())
}

pub struct Following;

#[async_trait]
impl AuthedHandler for Following {
    async fn call(&self, state: &mut State, cmd: Command, user: User) -> Result<(), GatorError> {
        GatorError::check_args(&cmd.name, &cmd.args, 0)?;

        for follow in state.db.get_feed_follows_for_user(user.id).await? {
            state
                .out
                .line(format!("* {} - {}", follow.feed_name, follow.feed_url));
        }
        Ok(())
    }
}

pub struct Unfollow;

#[async_trait]
impl AuthedHandler for Unfollow {
    async fn call(&self, state: &mut State, cmd: Command, user: User) -> Result<(), GatorError> {
        GatorError::check_args(&cmd.name, &cmd.args, 1)?;
        let url = &cmd.args[0];

        let deleted = state.db.delete_feed_follow_by_url(user.id, url).await?;
        if deleted.is_empty() {
            info!("{} was not following {}", user.name, url);
        } else {
            state.out.line(format!("Unfollowed {}", url));
        }
        Ok(())
    }
}
