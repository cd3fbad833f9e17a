use std::sync::Arc;
use std::time::Duration;

use log::{error, trace};

use crate::bounded_queue::BoundedQueue;
use crate::error::{QueueError, Role, WaitError};
use crate::event::{Event, EventSink, StopReason, Summary};
use crate::item::Item;
use crate::pacing::jitter;

pub struct Producer {
    queue: Arc<BoundedQueue<Item>>,
    sink: Arc<dyn EventSink>,
    /// `None` produces until cancelled.
    limit: Option<u64>,
    delay: Option<Duration>,
}

impl Producer {
    pub fn new(
        queue: Arc<BoundedQueue<Item>>,
        sink: Arc<dyn EventSink>,
        limit: Option<u64>,
        delay: Option<Duration>,
    ) -> Self {
        Self {
            queue,
            sink,
            limit,
            delay,
        }
    }

    /// Runs the produce loop. Cancellation is only looked at between
    /// iterations and inside the empty-slot wait, never once a slot is held.
    ///
    /// A broken queue is returned as an error after cancelling the queue so
    /// the consumer cannot wait forever on items that will never come.
    pub fn run(self) -> Result<Summary, QueueError> {
        let mut produced = 0;
        let stopped = loop {
            if self.limit.is_some_and(|limit| produced >= limit) {
                break None;
            }
            // Pause between items only, never after the last one.
            if produced > 0 {
                jitter(self.delay);
            }
            if self.queue.is_cancelled() {
                break Some(StopReason::Cancelled);
            }

            let item = Item::new(produced + 1);
            trace!("waiting for an empty slot for {item}");
            match self.queue.put(item) {
                Ok(buffer_size_after) => {
                    produced += 1;
                    self.sink.emit(Event::ItemProduced {
                        id: item.id(),
                        buffer_size_after,
                    });
                }
                Err(QueueError::Wait(WaitError::Cancelled)) => break Some(StopReason::Cancelled),
                Err(QueueError::Wait(WaitError::TimedOut)) => {
                    self.queue.cancel();
                    break Some(StopReason::TimedOut);
                }
                Err(err @ QueueError::Broken(_)) => {
                    error!("producer aborting: {err}");
                    self.queue.cancel();
                    self.sink.emit(Event::Stopped {
                        role: Role::Producer,
                        reason: StopReason::Broken,
                    });
                    return Err(err);
                }
            }
        };

        if let Some(reason) = stopped {
            // An open-ended producer is expected to be cancelled.
            if self.limit.is_some() || reason != StopReason::Cancelled {
                self.sink.emit(Event::Stopped {
                    role: Role::Producer,
                    reason,
                });
            }
        }
        trace!("producer done after {produced} items");
        Ok(Summary {
            role: Role::Producer,
            items: produced,
            stopped,
        })
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use crate::event::Recorder;

    #[test]
    fn test_bounded_producer_stops_at_limit() {
        let queue = Arc::new(BoundedQueue::new(4));
        let recorder = Arc::new(Recorder::new());
        let summary = Producer::new(queue.clone(), recorder.clone(), Some(3), None)
            .run()
            .unwrap();

        assert_eq!(summary.items, 3);
        assert_eq!(summary.stopped, None);
        assert_eq!(queue.size(), 3);
        assert_eq!(recorder.produced_ids(), vec![1, 2, 3]);
        assert_eq!(
            recorder.events()[2],
            Event::ItemProduced {
                id: 3,
                buffer_size_after: 3
            }
        );
    }

    #[test]
    fn test_cancelled_producer_never_starts() {
        let queue = Arc::new(BoundedQueue::new(2));
        queue.cancel();
        let recorder = Arc::new(Recorder::new());
        let summary = Producer::new(queue.clone(), recorder.clone(), Some(5), None)
            .run()
            .unwrap();

        assert_eq!(summary.items, 0);
        assert_eq!(summary.stopped, Some(StopReason::Cancelled));
        assert_eq!(queue.empty_slots(), 2);
    }

    #[test]
    fn test_full_buffer_timeout_cancels_queue() {
        let queue = Arc::new(BoundedQueue::with_cancel(
            2,
            crate::cancel::CancelToken::new(),
            Some(Duration::from_millis(20)),
        ));
        let recorder = Arc::new(Recorder::new());
        let summary = Producer::new(queue.clone(), recorder.clone(), None, None)
            .run()
            .unwrap();

        assert_eq!(summary.items, 2);
        assert_eq!(summary.stopped, Some(StopReason::TimedOut));
        assert!(queue.is_cancelled());
        assert_eq!(queue.size(), 2);
    }
}
