use crate::error::BufferError;

/// Fixed-capacity FIFO storage. Not synchronized; only
/// [`BoundedQueue`](crate::bounded_queue::BoundedQueue) touches it, and only
/// while holding its lock.
pub(crate) struct Ring<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    len: usize,
}

impl<T> Ring<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
        }
    }

    pub(crate) fn push(&mut self, value: T) -> Result<(), BufferError> {
        let capacity = self.capacity();
        if self.len == capacity {
            return Err(BufferError::Overflow { capacity });
        }
        let tail = (self.head + self.len) % capacity;
        self.slots[tail] = Some(value);
        self.len += 1;
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Result<T, BufferError> {
        if self.len == 0 {
            return Err(BufferError::Underflow);
        }
        let value = self.slots[self.head]
            .take()
            .ok_or(BufferError::Underflow)?;
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        Ok(value)
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }
}
