use std::fmt;
use std::path::{Path, PathBuf};

use tracing::warn;

pub use history_sql::JournalMode;

/// Location string that requests a transient, in-memory store.
pub const MEMORY_LOCATION: &str = ":memory:";

/// Where a container keeps its version table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Location {
    /// Transient store, gone when the container is dropped.
    #[default]
    Memory,
    /// Durable single-file store.
    File(PathBuf),
}

impl Location {
    /// `":memory:"` selects the transient store; anything else is a file path.
    pub fn parse(location: &str) -> Self {
        if location == MEMORY_LOCATION {
            Location::Memory
        } else {
            Location::File(PathBuf::from(location))
        }
    }
}

impl From<&str> for Location {
    fn from(location: &str) -> Self {
        Location::parse(location)
    }
}

impl From<String> for Location {
    fn from(location: String) -> Self {
        Location::parse(&location)
    }
}

impl From<&Path> for Location {
    fn from(path: &Path) -> Self {
        Location::File(path.to_path_buf())
    }
}

impl From<PathBuf> for Location {
    fn from(path: PathBuf) -> Self {
        Location::File(path)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Memory => f.write_str(MEMORY_LOCATION),
            Location::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// What `History::delete` does with a live key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Fail with `NotImplemented` and leave storage, registry and cache untouched.
    #[default]
    Unsupported,
    /// Drop the key from the registry and cache; its stored versions stay as an
    /// audit trail.
    RetainHistory,
}

impl DeletePolicy {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "unsupported" => Some(DeletePolicy::Unsupported),
            "retain-history" => Some(DeletePolicy::RetainHistory),
            _ => None,
        }
    }
}

/// Options for opening a history container.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    pub location: Location,

    /// Journal mode for file-backed stores. Ignored for in-memory stores.
    pub journal_mode: JournalMode,

    /// Whether dropping a `HistoryDict` without `close` stores values changed
    /// through `get_mut`.
    pub flush_on_drop: bool,

    /// Behavior of `History::delete`.
    pub delete_policy: DeletePolicy,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            location: Location::Memory,
            journal_mode: JournalMode::Wal,
            flush_on_drop: true,
            delete_policy: DeletePolicy::Unsupported,
        }
    }
}

impl HistoryConfig {
    pub fn new(location: impl Into<Location>) -> Self {
        Self {
            location: location.into(),
            ..Default::default()
        }
    }

    pub fn with_journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }

    pub fn with_flush_on_drop(mut self, enabled: bool) -> Self {
        self.flush_on_drop = enabled;
        self
    }

    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    /// Parse configuration from command-line arguments.
    ///
    /// Supported flags:
    /// - `--history=PATH` (`:memory:` for a transient store)
    /// - `--journal-mode=wal|delete|truncate`
    /// - `--no-flush-on-drop`
    /// - `--delete-policy=unsupported|retain-history`
    ///
    /// Unrecognized flags are left for the caller.
    pub fn from_args(args: &[String]) -> Self {
        let mut config = HistoryConfig::default();

        for arg in args {
            if let Some(val) = arg.strip_prefix("--history=") {
                config.location = Location::parse(val);
            } else if let Some(val) = arg.strip_prefix("--journal-mode=") {
                match JournalMode::parse(val) {
                    Some(mode) => config.journal_mode = mode,
                    None => warn!("ignoring unknown journal mode {:?}", val),
                }
            } else if arg == "--no-flush-on-drop" {
                config.flush_on_drop = false;
            } else if let Some(val) = arg.strip_prefix("--delete-policy=") {
                match DeletePolicy::parse(val) {
                    Some(policy) => config.delete_policy = policy,
                    None => warn!("ignoring unknown delete policy {:?}", val),
                }
            }
        }

        config
    }
}
