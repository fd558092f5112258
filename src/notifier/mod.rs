//! Notifier chain
//!
//! Subscribers that need to act before and after a sleep transition
//! (drivers, user-space helpers) register here. The engines notify the chain
//! at phase boundaries through the `TransitionContext` they are handed.

mod chain;

pub use chain::{NotifierChain, NotifierError, NotifierHandle, PmEvent, PmObserver};
