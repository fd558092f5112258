//! pmcore - System sleep-state transition coordinator
//!
//! Decides whether and when the machine may enter a low-power state, keeps
//! concurrent requests from overlapping, guards against lost wakeup events
//! and records why transitions failed. The engines that actually suspend
//! the machine sit behind the traits in [`engine`].

pub mod autosleep;
pub mod cli;
pub mod config;
pub mod control;
pub mod coordinator;
pub mod engine;
pub mod errors;
pub mod http_server;
pub mod notifier;
pub mod observability;
pub mod state;
pub mod stats;
pub mod wakeup;
pub mod worker;
