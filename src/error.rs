use std::fmt;

use thiserror::Error;

/// Which side of the buffer a failure or stop belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Producer,
    Consumer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Producer => f.write_str("producer"),
            Role::Consumer => f.write_str("consumer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("capacity must be at least 1")]
    ZeroCapacity,

    #[error("total item count must be at least 1")]
    ZeroTotalItems,
}

/// Raw storage misuse. Only reachable when a caller skipped the permit
/// protocol, so it always means a broken invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("insert into a full buffer (capacity {capacity})")]
    Overflow { capacity: usize },

    #[error("remove from an empty buffer")]
    Underflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("wait cancelled")]
    Cancelled,

    #[error("wait timed out")]
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error(transparent)]
    Wait(#[from] WaitError),

    #[error("broken invariant: {0}")]
    Broken(#[from] BufferError),
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("{role} failed: {source}")]
    Role {
        role: Role,
        #[source]
        source: QueueError,
    },

    #[error("{0} thread panicked")]
    Panicked(Role),

    #[error("failed to spawn {role} thread: {source}")]
    Spawn {
        role: Role,
        #[source]
        source: std::io::Error,
    },

    #[error("pipeline was already awaited")]
    AlreadyAwaited,
}
