// src/view/health_view.rs
use crate::health::FALLBACK_ERROR_MESSAGE;
use crate::poller::FetchState;
use askama::Template;
use std::fmt;

pub const STATUS_HEADING: &str = "Backend Status";
pub const LOADING_TEXT: &str = "Loading health status...";

/// Presentation of a [`FetchState`]. Building one has no side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthView {
    Loading,
    Error {
        message: String,
    },
    Healthy {
        status: Option<String>,
        message: Option<String>,
    },
}

impl HealthView {
    pub fn from_state(state: &FetchState) -> Self {
        match state {
            FetchState::Idle | FetchState::Loading => HealthView::Loading,
            FetchState::Error(detail) => {
                let message = if detail.message.trim().is_empty() {
                    FALLBACK_ERROR_MESSAGE.to_string()
                } else {
                    detail.message.clone()
                };
                HealthView::Error { message }
            }
            FetchState::Success(response) => HealthView::Healthy {
                status: response.status.clone(),
                message: response.message.clone(),
            },
        }
    }

    /// Render the panel markup. Field values are HTML-escaped by the template.
    pub fn to_html(&self) -> Result<String, askama::Error> {
        match self {
            HealthView::Loading => LoadingPanel { text: LOADING_TEXT }.render(),
            HealthView::Error { message } => ErrorPanel { message: message.as_str() }.render(),
            HealthView::Healthy { status, message } => StatusPanel {
                heading: STATUS_HEADING,
                status: status.as_deref().unwrap_or_default(),
                message: message.as_deref().unwrap_or_default(),
            }
            .render(),
        }
    }
}

#[derive(Template)]
#[template(path = "health/loading.html")]
struct LoadingPanel<'a> {
    text: &'a str,
}

#[derive(Template)]
#[template(path = "health/error.html")]
struct ErrorPanel<'a> {
    message: &'a str,
}

#[derive(Template)]
#[template(path = "health/status.html")]
struct StatusPanel<'a> {
    heading: &'a str,
    status: &'a str,
    message: &'a str,
}

impl fmt::Display for HealthView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthView::Loading => f.write_str(LOADING_TEXT),
            HealthView::Error { message } => write!(f, "Error: {}", message),
            HealthView::Healthy { status, message } => {
                writeln!(f, "{}", STATUS_HEADING)?;
                writeln!(f, "Status: {}", status.as_deref().unwrap_or_default())?;
                write!(f, "Message: {}", message.as_deref().unwrap_or_default())
            }
        }
    }
}
