// src/poller/mod.rs
mod poller;
mod state;

pub use poller::{Activation, HealthPoller};
pub use state::{FetchState, FetchTrigger, Snapshot};
