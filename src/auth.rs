use async_trait::async_trait;

use crate::command::{Command, Handler, State};
use crate::db::User;
use crate::error::GatorError;

/// A handler that acts on behalf of the logged-in user.
#[async_trait]
pub trait AuthedHandler: Send + Sync {
    async fn call(&self, state: &mut State, cmd: Command, user: User) -> Result<(), GatorError>;
}

/// Resolves the current user on every call and hands it to the inner handler.
pub struct LoggedIn<H>(pub H);

pub fn logged_in<H: AuthedHandler>(handler: H) -> LoggedIn<H> {
    LoggedIn(handler)
}

/// Looks up the user named in the config.
pub async fn current_user(state: &State) -> Result<User, GatorError> {
    let name = state.config.current_user().ok_or(GatorError::NotLoggedIn)?;
    state
        .db
        .get_user(name)
        .await?
        .ok_or_else(|| GatorError::UserNotFound(name.to_string()))
}

#[async_trait]
impl<H: AuthedHandler> Handler for LoggedIn<H> {
    async fn call(&self, state: &mut State, cmd: Command) -> Result<(), GatorError> {
        let user = current_user(state).await?;
        self.0.call(state, cmd, user).await
    }
}
