// src/view/mod.rs
mod health_view;
mod shell;

pub use health_view::{HealthView, LOADING_TEXT, STATUS_HEADING};
pub use shell::AppShell;
