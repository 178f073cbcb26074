// src/health/mod.rs
mod client;
mod response;

pub use client::{health_endpoint, HealthClient, HealthSource};
pub use response::{ErrorDetail, FetchError, HealthResponse, FALLBACK_ERROR_MESSAGE};
