//! Ordered observer chain invoked around sleep transitions

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use crate::observability::{log_event_with_fields, Event};

/// Phase-boundary events delivered to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PmEvent {
    /// About to hibernate
    HibernationPrepare,
    /// Hibernation finished or was aborted
    PostHibernation,
    /// About to suspend
    SuspendPrepare,
    /// Suspend finished or was aborted
    PostSuspend,
    /// About to restore a hibernation image
    RestorePrepare,
    /// Restore failed
    PostRestore,
}

impl PmEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            PmEvent::HibernationPrepare => "hibernation_prepare",
            PmEvent::PostHibernation => "post_hibernation",
            PmEvent::SuspendPrepare => "suspend_prepare",
            PmEvent::PostSuspend => "post_suspend",
            PmEvent::RestorePrepare => "restore_prepare",
            PmEvent::PostRestore => "post_restore",
        }
    }
}

impl fmt::Display for PmEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A subscriber veto. `code` is a negative errno.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("notifier vetoed with code {code}")]
pub struct NotifierError {
    pub code: i32,
}

impl NotifierError {
    pub fn veto(code: i32) -> Self {
        Self { code }
    }
}

/// Receives phase-boundary events.
pub trait PmObserver: Send + Sync {
    /// Returning an error stops the chain and aborts the transition.
    fn on_event(&self, event: PmEvent) -> Result<(), NotifierError>;
}

impl<F> PmObserver for F
where
    F: Fn(PmEvent) -> Result<(), NotifierError> + Send + Sync,
{
    fn on_event(&self, event: PmEvent) -> Result<(), NotifierError> {
        self(event)
    }
}

/// Opaque registration token returned by [`NotifierChain::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotifierHandle(u64);

struct Subscriber {
    handle: NotifierHandle,
    observer: Arc<dyn PmObserver>,
}

/// Subscribers in registration order.
pub struct NotifierChain {
    next_handle: AtomicU64,
    subscribers: RwLock<Vec<Subscriber>>,
}

impl NotifierChain {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Append `observer` to the chain.
    pub fn register(&self, observer: Arc<dyn PmObserver>) -> NotifierHandle {
        let handle = NotifierHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber { handle, observer });
        handle
    }

    /// Remove a subscriber. Returns false if the handle is not registered.
    pub fn unregister(&self, handle: NotifierHandle) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|s| s.handle != handle);
        subscribers.len() != before
    }

    /// Deliver `event` to every subscriber in registration order.
    ///
    /// The first veto is returned and later subscribers are not called.
    /// The list is copied before delivery, so a subscriber may register or
    /// unregister from inside its callback; such changes apply to the next
    /// event.
    pub fn notify(&self, event: PmEvent) -> Result<(), NotifierError> {
        let observers: Vec<Arc<dyn PmObserver>> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|s| Arc::clone(&s.observer))
            .collect();

        for observer in observers {
            if let Err(veto) = observer.on_event(event) {
                log_event_with_fields(
                    Event::NotifierVeto,
                    &[("code", &veto.code.to_string()), ("event", event.as_str())],
                );
                return Err(veto);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for NotifierChain {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NotifierChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifierChain")
            .field("subscribers", &self.len())
            .finish()
    }
}
