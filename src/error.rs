use crate::config::ConfigError;
use crate::fetcher::FetchError;

/// Every failure a command or a scheduler tick can produce.
#[derive(Debug, thiserror::Error)]
pub enum GatorError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("unexpected number of args for {command} command. Expected: {expected}. Received: {received}")]
    InvalidArgumentCount {
        command: String,
        expected: usize,
        received: usize,
    },

    #[error("invalid duration '{input}': {reason}")]
    InvalidDuration { input: String, reason: String },

    #[error("not logged in, run `register <name>` or `login <name>` first")]
    NotLoggedIn,

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("user already exists: {0}")]
    UserExists(String),

    #[error("feed not found: {0}")]
    FeedNotFound(String),

    #[error("a feed with url {0} already exists")]
    FeedExists(String),

    #[error("already following {0}")]
    AlreadyFollowing(String),

    #[error("no feeds available to fetch")]
    NoFeedAvailable,

    #[error("fetch failed: {0}")]
    FetchFailed(#[from] FetchError),

    #[error("failed to parse feed: {0}")]
    ParseFailed(#[from] feed_rs::parser::ParseFeedError),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl GatorError {
    /// Checks that `args` has exactly `expected` entries.
    pub fn check_args(command: &str, args: &[String], expected: usize) -> Result<(), Self> {
        if args.len() != expected {
            return Err(Self::InvalidArgumentCount {
                command: command.to_string(),
                expected,
                received: args.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_args_exact_count() {
        let args = vec!["one".to_string()];
        assert!(GatorError::check_args("login", &args, 1).is_ok());
    }

    #[test]
    fn test_check_args_mismatch() {
        let args = vec!["a".to_string(), "b".to_string()];
        let err = GatorError::check_args("login", &args, 1).unwrap_err();

        match err {
            GatorError::InvalidArgumentCount {
                command,
                expected,
                received,
            } => {
                assert_eq!(command, "login");
                assert_eq!(expected, 1);
                assert_eq!(received, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_argument_count_message() {
        let err = GatorError::check_args("addfeed", &[], 2).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unexpected number of args for addfeed command. Expected: 2. Received: 0"
        );
    }
}
