// src/server/health_service.rs
use crate::health::HealthResponse;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// A backing dependency the API reports on, e.g. a database pool.
#[async_trait]
pub trait DependencyCheck: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn is_healthy(&self) -> bool;
}

/// Produces the payload for `GET {base}/health`.
#[derive(Clone)]
pub struct HealthService {
    project_name: String,
    checks: Vec<Arc<dyn DependencyCheck>>,
}

impl HealthService {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            checks: Vec::new(),
        }
    }

    pub fn with_check(mut self, check: Arc<dyn DependencyCheck>) -> Self {
        self.checks.push(check);
        self
    }

    /// True when every registered dependency reports healthy. With none
    /// registered there is nothing to fail.
    pub async fn check_dependencies(&self) -> bool {
        let results = futures::future::join_all(self.checks.iter().map(|c| c.is_healthy())).await;

        let mut healthy = true;
        for (check, ok) in self.checks.iter().zip(results) {
            if !ok {
                warn!("Dependency {} is unhealthy", check.name());
                healthy = false;
            }
        }
        healthy
    }

    pub async fn status(&self) -> HealthResponse {
        let status = if self.check_dependencies().await {
            "healthy"
        } else {
            "unhealthy"
        };

        HealthResponse::new(status, format!("{} API is running", self.project_name))
    }
}
