//! Lifecycle of one producer/consumer run.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, info};

use crate::bounded_queue::BoundedQueue;
use crate::cancel::CancelToken;
use crate::config::{Config, ProducerMode};
use crate::consumer::Consumer;
use crate::error::{QueueError, Role, RunError, WaitError};
use crate::event::{Event, EventSink, StopReason, Summary};
use crate::item::Item;
use crate::producer::Producer;

type RoleHandle = JoinHandle<Result<Summary, QueueError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The consumer reached its target.
    Completed,
    /// A shutdown arrived before the target was reached.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub outcome: Outcome,
    pub produced: u64,
    pub consumed: u64,
    pub final_buffer_size: usize,
    pub empty_slots: usize,
    pub full_slots: usize,
    pub peak_critical_occupancy: usize,
}

/// Cloneable way to stop a running pipeline from another thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    queue: Arc<BoundedQueue<Item>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        info!("shutdown requested");
        self.queue.cancel();
    }
}

pub struct Pipeline {
    config: Config,
    queue: Arc<BoundedQueue<Item>>,
    sink: Arc<dyn EventSink>,
    producer: Option<RoleHandle>,
    consumer: Option<RoleHandle>,
}

impl Pipeline {
    /// Validates `config` and spawns the producer and consumer threads.
    /// Nothing is spawned when the configuration is rejected.
    pub fn start(config: Config, sink: Arc<dyn EventSink>) -> Result<Self, RunError> {
        config.validate()?;
        let queue = Arc::new(BoundedQueue::with_cancel(
            config.capacity,
            CancelToken::new(),
            config.wait_timeout,
        ));
        debug!(
            "starting pipeline: capacity {}, target {}, producer {:?}, slots (empty {}, full {})",
            config.capacity,
            config.total_items,
            config.producer,
            queue.empty_slots(),
            queue.full_slots()
        );

        let limit = match config.producer {
            ProducerMode::Bounded => Some(config.total_items),
            ProducerMode::UntilShutdown => None,
        };
        let producer = Producer::new(queue.clone(), sink.clone(), limit, config.produce_delay);
        let producer = spawn(Role::Producer, &queue, move || producer.run())?;

        let consumer = Consumer::new(
            queue.clone(),
            sink.clone(),
            config.total_items,
            config.consume_delay,
        );
        let consumer = match spawn(Role::Consumer, &queue, move || consumer.run()) {
            Ok(handle) => handle,
            Err(err) => {
                queue.cancel();
                let _ = producer.join();
                return Err(err);
            }
        };

        Ok(Self {
            config,
            queue,
            sink,
            producer: Some(producer),
            consumer: Some(consumer),
        })
    }

    /// Blocks until the consumer has reached its target or the run was shut
    /// down, then stops and joins the producer.
    pub fn await_completion(&mut self) -> Result<Report, RunError> {
        let consumer = self.consumer.take().ok_or(RunError::AlreadyAwaited)?;
        let consumer = join(Role::Consumer, consumer);

        let consumer_done = matches!(consumer, Ok(Summary { stopped: None, .. }));
        if !consumer_done || self.config.producer == ProducerMode::UntilShutdown {
            self.queue.cancel();
        }
        let producer = self.producer.take().ok_or(RunError::AlreadyAwaited)?;
        let producer = join(Role::Producer, producer);

        let consumer = consumer?;
        let producer = producer?;
        // An open-ended producer idling on a full buffer may time out after
        // the consumer is done; that is its normal stop.
        let idle_producer = consumer_done && self.config.producer == ProducerMode::UntilShutdown;
        for summary in [&consumer, &producer] {
            if summary.stopped == Some(StopReason::TimedOut)
                && !(idle_producer && summary.role == Role::Producer)
            {
                return Err(RunError::Role {
                    role: summary.role,
                    source: QueueError::Wait(WaitError::TimedOut),
                });
            }
        }

        let final_buffer_size = self.queue.size();
        let outcome = if consumer_done {
            self.sink.emit(Event::Completed { final_buffer_size });
            Outcome::Completed
        } else {
            Outcome::Cancelled
        };

        Ok(Report {
            outcome,
            produced: producer.items,
            consumed: consumer.items,
            final_buffer_size,
            empty_slots: self.queue.empty_slots(),
            full_slots: self.queue.full_slots(),
            peak_critical_occupancy: self.queue.peak_critical_occupancy(),
        })
    }

    /// Requests cooperative cancellation of both roles. Returns immediately;
    /// use [`await_completion`](Self::await_completion) to wait for them.
    pub fn shutdown(&self) {
        self.shutdown_handle().shutdown();
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            queue: self.queue.clone(),
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.producer.is_none() && self.consumer.is_none() {
            return;
        }
        self.queue.cancel();
        for handle in [self.consumer.take(), self.producer.take()].into_iter().flatten() {
            let _ = handle.join();
        }
    }
}

/// Starts a pipeline and waits for it.
pub fn run(config: Config, sink: Arc<dyn EventSink>) -> Result<Report, RunError> {
    Pipeline::start(config, sink)?.await_completion()
}

/// Cancels the queue if the owning thread unwinds, so the peer is not left
/// waiting on a permit that will never be released.
struct CancelOnPanic(Arc<BoundedQueue<Item>>);

impl Drop for CancelOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.cancel();
        }
    }
}

fn spawn(
    role: Role,
    queue: &Arc<BoundedQueue<Item>>,
    body: impl FnOnce() -> Result<Summary, QueueError> + Send + 'static,
) -> Result<RoleHandle, RunError> {
    let guard = CancelOnPanic(queue.clone());
    thread::Builder::new()
        .name(role.to_string())
        .spawn(move || {
            let _guard = guard;
            body()
        })
        .map_err(|source| RunError::Spawn { role, source })
}

fn join(role: Role, handle: RoleHandle) -> Result<Summary, RunError> {
    handle
        .join()
        .map_err(|_| RunError::Panicked(role))?
        .map_err(|source| RunError::Role { role, source })
}
