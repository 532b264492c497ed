//! Push-back buffer
//!
//! A thread-safe FIFO that lets tokens intercepted by the cursor position
//! scanner be "unread", so ordinary input consumers see them later in their
//! original order.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

const INITIAL_CAPACITY: usize = 256;

/// Unbounded FIFO of input tokens with unread semantics.
///
/// All operations take the single internal lock and never block on I/O. An
/// empty buffer reports zero availability and the caller falls through to the
/// live stream.
#[derive(Debug)]
pub struct PushbackBuffer<T> {
    queue: Mutex<VecDeque<T>>,
}

impl<T: Copy> Default for PushbackBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> PushbackBuffer<T> {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append one token.
    pub fn enqueue(&self, token: T) {
        self.lock().push(token);
    }

    /// Append a span of tokens, returning how many were accepted.
    ///
    /// The queue grows as needed, so every token is accepted in one call;
    /// callers may still loop on the returned count.
    pub fn enqueue_slice(&self, tokens: &[T]) -> usize {
        self.lock().push_slice(tokens)
    }

    /// Inspect the next token without removing it.
    pub fn peek(&self) -> Option<T> {
        self.lock().peek()
    }

    /// Move up to `dest.len()` tokens into `dest`, returning how many were copied.
    pub fn dequeue(&self, dest: &mut [T]) -> usize {
        self.lock().pop_into(dest)
    }

    /// Remove and return the next token.
    pub fn dequeue_one(&self) -> Option<T> {
        self.lock().pop()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the buffer's lock for a longer critical section.
    ///
    /// The cursor position query holds this guard for its whole scan loop so
    /// no ordinary read can consume tokens in between.
    pub fn lock(&self) -> PushbackGuard<'_, T> {
        PushbackGuard {
            queue: self.queue.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

/// Exclusive access to a [`PushbackBuffer`].
pub struct PushbackGuard<'a, T> {
    queue: MutexGuard<'a, VecDeque<T>>,
}

impl<T: Copy> PushbackGuard<'_, T> {
    pub fn push(&mut self, token: T) {
        self.queue.push_back(token);
    }

    pub fn push_slice(&mut self, tokens: &[T]) -> usize {
        self.queue.extend(tokens.iter().copied());
        tokens.len()
    }

    pub fn peek(&self) -> Option<T> {
        self.queue.front().copied()
    }

    pub fn pop(&mut self) -> Option<T> {
        self.queue.pop_front()
    }

    pub fn pop_into(&mut self, dest: &mut [T]) -> usize {
        let count = dest.len().min(self.queue.len());
        for (slot, token) in dest.iter_mut().zip(self.queue.drain(..count)) {
            *slot = token;
        }
        count
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<T: Copy> Extend<T> for PushbackGuard<'_, T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.queue.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let buffer = PushbackBuffer::new();
        buffer.enqueue(b'a');
        assert_eq!(buffer.enqueue_slice(b"bcd"), 3);
        buffer.enqueue(b'e');

        assert_eq!(buffer.peek(), Some(b'a'));
        assert_eq!(buffer.len(), 5);

        let mut dest = [0u8; 3];
        assert_eq!(buffer.dequeue(&mut dest), 3);
        assert_eq!(&dest, b"abc");

        let mut dest = [0u8; 8];
        assert_eq!(buffer.dequeue(&mut dest), 2);
        assert_eq!(&dest[..2], b"de");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_empty_reports_zero() {
        let buffer: PushbackBuffer<char> = PushbackBuffer::new();
        let mut dest = ['\0'; 4];
        assert_eq!(buffer.dequeue(&mut dest), 0);
        assert_eq!(buffer.peek(), None);
        assert_eq!(buffer.dequeue_one(), None);
    }

    #[test]
    fn test_grows_past_initial_capacity() {
        let buffer = PushbackBuffer::with_capacity(4);
        let data: Vec<u8> = (0..=255).cycle().take(1000).collect();
        let mut stored = 0;
        while stored < data.len() {
            stored += buffer.enqueue_slice(&data[stored..]);
        }
        let mut out = vec![0u8; 1000];
        assert_eq!(buffer.dequeue(&mut out), 1000);
        assert_eq!(out, data);
    }

    #[test]
    fn test_guard_blocks_other_producers() {
        let buffer = Arc::new(PushbackBuffer::new());
        let mut guard = buffer.lock();
        guard.push(1u8);

        let other = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || buffer.enqueue(2))
        };

        guard.extend([3u8, 4]);
        drop(guard);
        other.join().unwrap();

        let mut out = [0u8; 4];
        assert_eq!(buffer.dequeue(&mut out), 4);
        assert_eq!(out, [1, 3, 4, 2]);
    }
}
