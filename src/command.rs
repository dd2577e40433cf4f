use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::db::Database;
use crate::error::GatorError;
use crate::fetcher::FeedSource;

/// One CLI invocation: `gator <name> <args...>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Where command output goes. `Captured` keeps the lines instead of printing them.
#[derive(Debug, Clone, Default)]
pub enum Output {
    #[default]
    Stdout,
    Captured(Arc<Mutex<Vec<String>>>),
}

impl Output {
    pub fn captured() -> Self {
        Self::Captured(Arc::default())
    }

    pub fn line(&self, line: impl Into<String>) {
        let line = line.into();
        match self {
            Self::Stdout => println!("{}", line),
            Self::Captured(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(line);
                }
            }
        }
    }

    /// Lines written so far; always empty for stdout.
    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::Stdout => Vec::new(),
            Self::Captured(lines) => lines.lock().map(|l| l.clone()).unwrap_or_default(),
        }
    }
}

/// Everything a handler may touch. Built once in `main` and passed down.
pub struct State {
    pub config: Config,
    pub db: Arc<Database>,
    pub source: Arc<dyn FeedSource>,
    /// Stops long-running commands such as `agg`
    pub shutdown: CancellationToken,
    pub out: Output,
}

impl State {
    pub fn new(
        config: Config,
        db: Arc<Database>,
        source: Arc<dyn FeedSource>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            db,
            source,
            shutdown,
            out: Output::Stdout,
        }
    }

    pub fn with_output(mut self, out: Output) -> Self {
        self.out = out;
        self
    }
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, state: &mut State, cmd: Command) -> Result<(), GatorError>;
}

/// A live view of the registered command names.
#[derive(Debug, Clone, Default)]
pub struct CommandNames(Arc<RwLock<BTreeSet<String>>>);

impl CommandNames {
    /// Sorted names as of now.
    pub fn list(&self) -> Vec<String> {
        self.0
            .read()
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn insert(&self, name: String) {
        if let Ok(mut names) = self.0.write() {
            names.insert(name);
        }
    }
}

#[derive(Default)]
pub struct Commands {
    handlers: HashMap<String, Box<dyn Handler>>,
    names: CommandNames,
}

impl Commands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering an existing name replaces its handler.
    pub fn register(&mut self, name: impl Into<String>, handler: impl Handler + 'static) {
        let name = name.into();
        self.names.insert(name.clone());
        self.handlers.insert(name, Box::new(handler));
    }

    pub fn names(&self) -> Vec<String> {
        self.names.list()
    }

    /// A handle that keeps seeing commands registered after it was taken.
    pub fn live_names(&self) -> CommandNames {
        self.names.clone()
    }

    /// Dispatches `cmd` to its handler and returns the handler's result as is.
    pub async fn run(&self, state: &mut State, cmd: Command) -> Result<(), GatorError> {
        let handler = self
            .handlers
            .get(&cmd.name)
            .ok_or_else(|| GatorError::UnknownCommand(cmd.name.clone()))?;
        handler.call(state, cmd).await
    }
}
