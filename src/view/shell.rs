// src/view/shell.rs
use super::health_view::HealthView;
use askama::Template;
use std::fmt::Write;

/// Page frame around the health panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppShell {
    pub title: String,
    pub subtitle: String,
}

impl Default for AppShell {
    fn default() -> Self {
        Self {
            title: "Reflection Agent".to_string(),
            subtitle: "Full-stack health dashboard".to_string(),
        }
    }
}

impl AppShell {
    pub fn new(title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: subtitle.into(),
        }
    }

    pub fn render_text(&self, health: &HealthView) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);
        let _ = writeln!(out, "{}", self.subtitle);
        let _ = writeln!(out);
        let _ = write!(out, "{}", health);
        out
    }

    /// Full HTML page with the panel in its own section.
    pub fn render_html(&self, health: &HealthView) -> Result<String, askama::Error> {
        ShellPage {
            title: &self.title,
            subtitle: &self.subtitle,
            health: health.to_html()?,
        }
        .render()
    }
}

#[derive(Template)]
#[template(path = "app_shell.html")]
struct ShellPage<'a> {
    title: &'a str,
    subtitle: &'a str,
    health: String,
}
