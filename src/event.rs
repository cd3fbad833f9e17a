use std::sync::Mutex;

use log::{info, warn};

use crate::error::Role;

/// Why a role left its loop before reaching its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    TimedOut,
    Broken,
}

/// What a role did before leaving its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub role: Role,
    pub items: u64,
    /// `None` when the role reached its target.
    pub stopped: Option<StopReason>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ItemProduced { id: u64, buffer_size_after: usize },
    ItemConsumed { id: u64, remaining_target: u64 },
    Completed { final_buffer_size: usize },
    Stopped { role: Role, reason: StopReason },
}

/// Receives run events. Called from the producer and consumer threads,
/// outside the critical section.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Writes every event through the `log` facade.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: Event) {
        match event {
            Event::ItemProduced { id, buffer_size_after } => {
                info!("produced item-{id}, buffer size {buffer_size_after}")
            }
            Event::ItemConsumed { id, remaining_target } => {
                info!("consumed item-{id}, {remaining_target} left")
            }
            Event::Completed { final_buffer_size } => {
                info!("completed, final buffer size {final_buffer_size}")
            }
            Event::Stopped { role, reason } => warn!("{role} stopped early: {reason:?}"),
        }
    }
}

/// Keeps events in memory in emission order.
#[derive(Debug, Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn consumed_ids(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::ItemConsumed { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn produced_ids(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::ItemProduced { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for Recorder {
    fn emit(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
