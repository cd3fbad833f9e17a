use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_CAPACITY: usize = 5;
pub const DEFAULT_TOTAL_ITEMS: u64 = 20;

/// How long the producer keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProducerMode {
    /// Produce exactly as many items as the consumer needs, then stop.
    #[default]
    Bounded,
    /// Keep producing until the pipeline shuts the producer down once the
    /// consumer has reached its target.
    UntilShutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub capacity: usize,
    pub total_items: u64,
    pub producer: ProducerMode,
    /// Upper bound on any single semaphore wait. `None` waits forever.
    pub wait_timeout: Option<Duration>,
    /// Each role sleeps a random time up to this between iterations.
    pub produce_delay: Option<Duration>,
    pub consume_delay: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            total_items: DEFAULT_TOTAL_ITEMS,
            producer: ProducerMode::default(),
            wait_timeout: None,
            produce_delay: None,
            consume_delay: None,
        }
    }
}

impl Config {
    pub fn new(capacity: usize, total_items: u64) -> Self {
        Self {
            capacity,
            total_items,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_producer(mut self, producer: ProducerMode) -> Self {
        self.producer = producer;
        self
    }

    #[must_use]
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_produce_delay(mut self, delay: Duration) -> Self {
        self.produce_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn with_consume_delay(mut self, delay: Duration) -> Self {
        self.consume_delay = Some(delay);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.total_items == 0 {
            return Err(ConfigError::ZeroTotalItems);
        }
        Ok(())
    }
}
