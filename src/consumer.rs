use std::sync::Arc;
use std::time::Duration;

use log::{error, trace};

use crate::bounded_queue::BoundedQueue;
use crate::error::{QueueError, Role, WaitError};
use crate::event::{Event, EventSink, StopReason, Summary};
use crate::item::Item;
use crate::pacing::jitter;

pub struct Consumer {
    queue: Arc<BoundedQueue<Item>>,
    sink: Arc<dyn EventSink>,
    target: u64,
    delay: Option<Duration>,
}

impl Consumer {
    pub fn new(
        queue: Arc<BoundedQueue<Item>>,
        sink: Arc<dyn EventSink>,
        target: u64,
        delay: Option<Duration>,
    ) -> Self {
        Self {
            queue,
            sink,
            target,
            delay,
        }
    }

    /// Takes items until `target` have been consumed. No acquisition is
    /// attempted after the target is reached.
    pub fn run(self) -> Result<Summary, QueueError> {
        let mut consumed = 0;
        let stopped = loop {
            if consumed >= self.target {
                break None;
            }
            if consumed > 0 {
                jitter(self.delay);
            }
            if self.queue.is_cancelled() {
                break Some(StopReason::Cancelled);
            }

            trace!("waiting for a full slot");
            match self.queue.take() {
                Ok((item, _)) => {
                    consumed += 1;
                    self.sink.emit(Event::ItemConsumed {
                        id: item.id(),
                        remaining_target: self.target - consumed,
                    });
                }
                Err(QueueError::Wait(WaitError::Cancelled)) => break Some(StopReason::Cancelled),
                Err(QueueError::Wait(WaitError::TimedOut)) => {
                    self.queue.cancel();
                    break Some(StopReason::TimedOut);
                }
                Err(err @ QueueError::Broken(_)) => {
                    error!("consumer aborting: {err}");
                    self.queue.cancel();
                    self.sink.emit(Event::Stopped {
                        role: Role::Consumer,
                        reason: StopReason::Broken,
                    });
                    return Err(err);
                }
            }
        };

        if let Some(reason) = stopped {
            self.sink.emit(Event::Stopped {
                role: Role::Consumer,
                reason,
            });
        }
        trace!("consumer done after {consumed} items");
        Ok(Summary {
            role: Role::Consumer,
            items: consumed,
            stopped,
        })
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use crate::event::Recorder;

    #[test]
    fn test_consumer_drains_to_target() {
        let queue = Arc::new(BoundedQueue::new(3));
        for id in 1..=3 {
            queue.put(Item::new(id)).unwrap();
        }
        let recorder = Arc::new(Recorder::new());
        let summary = Consumer::new(queue.clone(), recorder.clone(), 2, None)
            .run()
            .unwrap();

        assert_eq!(summary.items, 2);
        assert_eq!(summary.stopped, None);
        assert_eq!(recorder.consumed_ids(), vec![1, 2]);
        assert_eq!(
            recorder.events()[1],
            Event::ItemConsumed {
                id: 2,
                remaining_target: 0
            }
        );
        // The third item is left alone once the target is met.
        assert_eq!(queue.size(), 1);
        assert_eq!(queue.full_slots(), 1);
    }

    #[test]
    fn test_cancelled_consumer_reports_stop() {
        let queue = Arc::new(BoundedQueue::<Item>::new(1));
        queue.cancel();
        let recorder = Arc::new(Recorder::new());
        let summary = Consumer::new(queue, recorder.clone(), 4, None).run().unwrap();

        assert_eq!(summary.items, 0);
        assert_eq!(summary.stopped, Some(StopReason::Cancelled));
        assert_eq!(
            recorder.events(),
            vec![Event::Stopped {
                role: Role::Consumer,
                reason: StopReason::Cancelled
            }]
        );
    }

    #[test]
    fn test_starved_consumer_times_out() {
        let queue = Arc::new(BoundedQueue::with_cancel(
            2,
            crate::cancel::CancelToken::new(),
            Some(Duration::from_millis(20)),
        ));
        queue.put(Item::new(1)).unwrap();
        let recorder = Arc::new(Recorder::new());
        let summary = Consumer::new(queue.clone(), recorder.clone(), 3, None)
            .run()
            .unwrap();

        assert_eq!(summary.items, 1);
        assert_eq!(summary.stopped, Some(StopReason::TimedOut));
        assert!(queue.is_cancelled());
        assert_eq!(queue.empty_slots(), 2);
    }

    #[test]
    fn test_no_pause_after_final_item() {
        let queue = Arc::new(BoundedQueue::new(1));
        queue.put(Item::new(1)).unwrap();
        let started = std::time::Instant::now();
        let summary = Consumer::new(
            queue,
            Arc::new(Recorder::new()),
            1,
            Some(Duration::from_secs(5)),
        )
        .run()
        .unwrap();

        assert_eq!(summary.items, 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
