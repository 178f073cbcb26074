// src/lib.rs
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod metrics;
pub mod poller;
pub mod server;
pub mod view;
