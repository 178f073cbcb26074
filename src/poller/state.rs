// src/poller/state.rs
use crate::health::{ErrorDetail, HealthResponse};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FetchState {
    #[default]
    Idle,
    Loading,
    Success(HealthResponse),
    Error(ErrorDetail),
}

impl FetchState {
    pub fn label(&self) -> &'static str {
        match self {
            FetchState::Idle => "idle",
            FetchState::Loading => "loading",
            FetchState::Success(_) => "success",
            FetchState::Error(_) => "error",
        }
    }
}

/// Why a fetch was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTrigger {
    Activation,
    Interval,
    Touch,
    Manual,
}

impl FetchTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchTrigger::Activation => "activation",
            FetchTrigger::Interval => "interval",
            FetchTrigger::Touch => "touch",
            FetchTrigger::Manual => "manual",
        }
    }
}

/// What a consumer sees of a live activation.
///
/// A background re-fetch keeps the last `Success`/`Error` in `state` and
/// raises `is_fetching` instead of falling back to `Loading`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub state: FetchState,
    pub is_fetching: bool,
    /// Sequence number of the fetch whose result is in `state`; 0 if none.
    pub generation: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn data(&self) -> Option<&HealthResponse> {
        match &self.state {
            FetchState::Success(response) => Some(response),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorDetail> {
        match &self.state {
            FetchState::Error(detail) => Some(detail),
            _ => None,
        }
    }

    /// True until the first result lands.
    pub fn is_loading(&self) -> bool {
        matches!(self.state, FetchState::Idle | FetchState::Loading)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.state, FetchState::Error(_))
    }

    pub fn is_success(&self) -> bool {
        matches!(self.state, FetchState::Success(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_accessors() {
        let loading = Snapshot {
            state: FetchState::Loading,
            ..Default::default()
        };
        assert!(loading.is_loading());
        assert!(loading.data().is_none());
        assert!(loading.error().is_none());

        let ok = Snapshot {
            state: FetchState::Success(HealthResponse::new("ok", "healthy")),
            generation: 1,
            ..Default::default()
        };
        assert!(!ok.is_loading());
        assert!(ok.is_success());
        assert_eq!(ok.data().and_then(|d| d.status.as_deref()), Some("ok"));

        let failed = Snapshot {
            state: FetchState::Error(ErrorDetail::new("boom")),
            ..Default::default()
        };
        assert!(failed.is_error());
        assert_eq!(failed.error().map(|e| e.message.as_str()), Some("boom"));
    }

    #[test]
    fn test_idle_counts_as_loading() {
        assert!(Snapshot::default().is_loading());
        assert_eq!(Snapshot::default().state.label(), "idle");
    }
}
