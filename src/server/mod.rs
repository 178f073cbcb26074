pub mod builder;
pub mod handler;
pub mod health_service;
pub mod listener;

pub use builder::ServerBuilder;
pub use handler::ApiHandler;
pub use health_service::{DependencyCheck, HealthService};
