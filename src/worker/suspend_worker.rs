//! Dedicated suspend worker
//!
//! Transitions run on one long-lived thread instead of the caller's. The
//! caller hands its request over a capacity-1 channel and blocks until the
//! worker replies. Callers are served strictly in arrival order: each takes
//! a ticket and waits for its turn, and a turn ends only after that
//! caller's reply has been received.

use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use thiserror::Error;
use uuid::Uuid;

use crate::coordinator::TransitionCore;
use crate::errors::{PmError, PmResult};
use crate::observability::{log_event, log_event_with_fields, Event};

/// The worker thread is gone; the request was not executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("suspend worker is not running")]
pub struct WorkerUnavailable;

/// One request handed to the worker.
pub struct SuspendWorkItem {
    pub id: Uuid,
    pub input: Vec<u8>,
    reply: SyncSender<PmResult<usize>>,
}

#[derive(Debug, Default)]
struct Turns {
    next_ticket: u64,
    now_serving: u64,
}

/// FIFO turnstile in front of the channel.
#[derive(Debug, Default)]
struct Queue {
    turns: Mutex<Turns>,
    advanced: Condvar,
}

impl Queue {
    fn turns(&self) -> MutexGuard<'_, Turns> {
        self.turns.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until it is this caller's turn.
    fn wait_turn(&self) -> Turn<'_> {
        let mut turns = self.turns();
        let ticket = turns.next_ticket;
        turns.next_ticket += 1;
        while turns.now_serving != ticket {
            turns = self
                .advanced
                .wait(turns)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Turn { queue: self }
    }
}

/// Ends the holder's turn on drop, on every path.
struct Turn<'a> {
    queue: &'a Queue,
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        self.queue.turns().now_serving += 1;
        self.queue.advanced.notify_all();
    }
}

/// Handle to the worker thread.
pub struct SuspendWorker {
    sender: Option<SyncSender<SuspendWorkItem>>,
    handle: Option<JoinHandle<()>>,
    queue: Queue,
    /// Set once a reply was lost; nothing is handed over after that.
    dead: AtomicBool,
}

impl SuspendWorker {
    /// Start the worker thread.
    ///
    /// Fails with `ResourceExhaustion` if the thread cannot be created.
    pub fn spawn(core: Arc<TransitionCore>) -> PmResult<Self> {
        let (sender, receiver) = mpsc::sync_channel::<SuspendWorkItem>(1);
        let handle = thread::Builder::new()
            .name("pm-suspend".to_string())
            .spawn(move || run(core, receiver))
            .map_err(|e| PmError::ResourceExhaustion(format!("suspend worker: {}", e)))?;

        log_event(Event::SuspendWorkerStarted);
        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            queue: Queue::default(),
            dead: AtomicBool::new(false),
        })
    }

    /// Execute `input` on the worker and wait for its result.
    ///
    /// The result is exactly what the transition sequence returned.
    /// `WorkerUnavailable` means the request was never handed over. If the
    /// worker dies after taking the request, the outcome is unknown and the
    /// caller gets `ResourceExhaustion` instead.
    pub fn submit(&self, input: &[u8], id: Uuid) -> Result<PmResult<usize>, WorkerUnavailable> {
        let sender = self.sender.as_ref().ok_or(WorkerUnavailable)?;
        let _turn = self.queue.wait_turn();
        if self.dead.load(Ordering::Acquire) {
            return Err(WorkerUnavailable);
        }

        let (reply, response) = mpsc::sync_channel(1);
        let item = SuspendWorkItem {
            id,
            input: input.to_vec(),
            reply,
        };
        sender.send(item).map_err(|_| WorkerUnavailable)?;
        Ok(response.recv().unwrap_or_else(|_| {
            self.dead.store(true, Ordering::Release);
            log_event_with_fields(
                Event::SuspendWorkerUnavailable,
                &[("reason", "worker died"), ("request_id", &id.to_string())],
            );
            Err(PmError::ResourceExhaustion(
                "suspend worker died during request".to_string(),
            ))
        }))
    }
}

impl Drop for SuspendWorker {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(core: Arc<TransitionCore>, receiver: Receiver<SuspendWorkItem>) {
    while let Ok(item) = receiver.recv() {
        let result = core.enter_state(&item.input, item.id);
        if item.reply.send(result).is_err() {
            log_event_with_fields(
                Event::SuspendWorkerUnavailable,
                &[("reason", "caller gone"), ("request_id", &item.id.to_string())],
            );
        }
    }
    log_event(Event::SuspendWorkerStopped);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turns_are_fifo() {
        let queue = Arc::new(Queue::default());
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = queue.wait_turn();
        let handles: Vec<_> = (0..3)
            .map(|i| {
                // Take tickets in a known order before spawning the waiter.
                let queue = Arc::clone(&queue);
                let order = Arc::clone(&order);
                let (ready_tx, ready_rx) = mpsc::channel();
                let handle = thread::spawn(move || {
                    let mut turns = queue.turns();
                    let ticket = turns.next_ticket;
                    turns.next_ticket += 1;
                    ready_tx.send(()).unwrap();
                    while turns.now_serving != ticket {
                        turns = queue.advanced.wait(turns).unwrap();
                    }
                    drop(turns);
                    order.lock().unwrap().push(i);
                    drop(Turn { queue: &queue });
                });
                ready_rx.recv().unwrap();
                handle
            })
            .collect();

        drop(first);
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_turn_released_on_drop() {
        let queue = Queue::default();
        drop(queue.wait_turn());
        drop(queue.wait_turn());
        assert_eq!(queue.turns().now_serving, 2);
    }
}
