//! Transaction-lifecycle controller for the staking front-end.
//!
//! The controller turns a user intent (stake, unstake, withdraw, claim) into
//! a validated contract call, tracks that call until it is confirmed or
//! fails, and keeps the contract reads it depends on fresh.

pub mod cache;
pub mod client;
pub mod controller;
pub mod error;
pub mod notify;
pub mod sim;
pub mod tracker;
pub mod transactions;

pub use cache::{Cached, FieldValue, ReadCache};
pub use client::*;
pub use controller::{ActionError, AttemptInfo, Collaborators, ControllerEvent, StakingController};
pub use error::*;
pub use notify::{ChannelNotifier, Notification, Severity, TracingNotifier};
pub use sim::SimulatedPool;
pub use tracker::{TrackerError, TransactionTracker};
pub use transactions::WriteCall;
