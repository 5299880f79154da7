// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A bounded MPMC channel: a ring buffer
//! with two wait queues, one for senders blocked on a full buffer and one
//! for receivers blocked on an empty one.
//!
//! A channel closes once every [`Sender`] is dropped; `send` against a
//! closed channel returns `Err` (chosen over a silent no-op).

use super::wait_queue::WaitQueue;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct Shared<T> {
    capacity: usize,
    queue: Mutex<VecDeque<T>>,
    senders: AtomicUsize,
    receivers: AtomicUsize,
    send_waiters: WaitQueue,
    recv_waiters: WaitQueue,
}

impl<T> Shared<T> {
    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<T>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_closed(&self) -> bool {
        self.senders.load(Ordering::Acquire) == 0
    }
}

/// Creates a bounded channel with room for `capacity` buffered values.
pub fn channel<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    assert!(capacity > 0, "a channel needs at least one slot of capacity");
    let shared = Arc::new(Shared {
        capacity,
        queue: Mutex::new(VecDeque::with_capacity(capacity)),
        senders: AtomicUsize::new(1),
        receivers: AtomicUsize::new(1),
        send_waiters: WaitQueue::new(),
        recv_waiters: WaitQueue::new(),
    });
    (Sender { shared: Arc::clone(&shared) }, Receiver { shared })
}

/// The value could not be sent because the channel's last [`Receiver`]
/// (or every [`Sender`], from the receiving side's point of view) was
/// dropped.
pub struct SendError<T>(pub T);

impl<T> fmt::Debug for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SendError").field(&"...").finish()
    }
}

impl<T> fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("channel closed")
    }
}

impl<T: fmt::Debug> std::error::Error for SendError<T> {}

pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Sender<T> {
    /// Waits for room in the buffer and pushes `value`, or fails if every
    /// receiver has already been dropped.
    pub async fn send(&self, value: T) -> Result<(), SendError<T>> {
        let mut value = value;
        loop {
            // Registered before either check below: a concurrent receiver
            // drop (closing the channel) or a draining `receive()` call
            // could otherwise run entirely in the gap between a failed
            // check here and a later registration, leaving this send
            // parked on a wakeup that already happened.
            let wait = self.shared.send_waiters.wait();
            if self.shared.receivers.load(Ordering::Acquire) == 0 {
                return Err(SendError(value));
            }
            {
                let mut queue = self.shared.lock();
                if queue.len() < self.shared.capacity {
                    queue.push_back(value);
                    drop(queue);
                    self.shared.recv_waiters.wake_one();
                    return Ok(());
                }
            }
            if wait.await.is_err() {
                return Err(SendError(value));
            }
        }
    }

    /// Pushes `value` without waiting; fails if the buffer is full or every
    /// receiver has gone away.
    pub fn try_send(&self, value: T) -> Result<(), SendError<T>> {
        if self.shared.receivers.load(Ordering::Acquire) == 0 {
            return Err(SendError(value));
        }
        let mut queue = self.shared.lock();
        if queue.len() >= self.shared.capacity {
            return Err(SendError(value));
        }
        queue.push_back(value);
        drop(queue);
        self.shared.recv_waiters.wake_one();
        Ok(())
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        self.shared.senders.fetch_add(1, Ordering::AcqRel);
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        if self.shared.senders.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.recv_waiters.wake_all();
        }
    }
}

pub struct Receiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Receiver<T> {
    /// Waits for a value, returning `None` once the channel is closed and
    /// drained.
    pub async fn receive(&self) -> Option<T> {
        loop {
            let wait = self.shared.recv_waiters.wait();
            {
                let mut queue = self.shared.lock();
                if let Some(value) = queue.pop_front() {
                    drop(queue);
                    self.shared.send_waiters.wake_one();
                    return Some(value);
                }
                if self.shared.is_closed() {
                    return None;
                }
            }
            let _ = wait.await;
        }
    }

    /// Takes a buffered value without waiting, if one is available.
    pub fn try_receive(&self) -> Option<T> {
        let mut queue = self.shared.lock();
        let value = queue.pop_front();
        drop(queue);
        if value.is_some() {
            self.shared.send_waiters.wake_one();
        }
        value
    }
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        self.shared.receivers.fetch_add(1, Ordering::AcqRel);
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        if self.shared.receivers.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.send_waiters.wake_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_fifo_order_at_capacity_one() {
        crate::runtime::block_on(async {
            let (tx, rx) = channel::<u32>(1);
            let producer = crate::task::spawn(async move {
                for i in 1..=10 {
                    tx.send(i).await.unwrap();
                }
            })
            .unwrap();
            let mut received = Vec::new();
            for _ in 1..=10 {
                received.push(rx.receive().await.unwrap());
            }
            producer.await.unwrap();
            assert_eq!(received, (1..=10).collect::<Vec<_>>());
        });
    }

    #[test]
    fn receive_returns_none_after_senders_drop_and_drain() {
        crate::runtime::block_on(async {
            let (tx, rx) = channel::<u32>(4);
            tx.try_send(1).unwrap();
            tx.try_send(2).unwrap();
            drop(tx);
            assert_eq!(rx.receive().await, Some(1));
            assert_eq!(rx.receive().await, Some(2));
            assert_eq!(rx.receive().await, None);
        });
    }

    #[test]
    fn send_fails_once_every_receiver_is_dropped() {
        crate::runtime::block_on(async {
            let (tx, rx) = channel::<u32>(4);
            drop(rx);
            assert!(tx.send(1).await.is_err());
        });
    }
}
