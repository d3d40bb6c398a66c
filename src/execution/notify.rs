//! Build notifications

use crate::core::config::NotificationConfig;
use crate::core::error::BuildError;
use crate::core::state::{BuildReport, ExecutionStatus};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Warning,
    Error,
}

/// A message to show the user once a build finishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    pub logo: Option<PathBuf>,
}

/// Decides whether and what to notify, per the `notifications` settings
#[derive(Debug, Clone)]
pub struct Notifier {
    config: NotificationConfig,
    default_title: String,
}

impl Notifier {
    pub fn new(config: NotificationConfig, project: &str) -> Self {
        Self {
            config,
            default_title: project.to_string(),
        }
    }

    fn title(&self) -> String {
        self.config
            .title
            .clone()
            .unwrap_or_else(|| self.default_title.clone())
    }

    fn make(&self, level: NotificationLevel, message: String) -> Notification {
        let notification = Notification {
            level,
            title: self.title(),
            message,
            logo: self.config.logo.clone(),
        };
        match level {
            NotificationLevel::Success => info!(title = %notification.title, "{}", notification.message),
            NotificationLevel::Warning => warn!(title = %notification.title, "{}", notification.message),
            NotificationLevel::Error => error!(title = %notification.title, "{}", notification.message),
        }
        notification
    }

    /// Notification for a finished build, if one should be shown
    pub fn for_report(&self, report: &BuildReport) -> Option<Notification> {
        if !self.config.enabled {
            return None;
        }

        match report.status {
            ExecutionStatus::Completed => {
                if self.config.suppress_success {
                    return None;
                }
                Some(self.make(
                    NotificationLevel::Success,
                    format!("Build successful: {} files emitted", report.emitted.len()),
                ))
            }
            ExecutionStatus::CompletedWithFailures => {
                if self.config.suppress_warning {
                    return None;
                }
                let failures = report.failure_count();
                Some(self.make(
                    NotificationLevel::Warning,
                    format!(
                        "Build finished with {} failed step{}",
                        failures,
                        if failures == 1 { "" } else { "s" }
                    ),
                ))
            }
            ExecutionStatus::Cancelled => Some(self.make(NotificationLevel::Warning, "Build cancelled".to_string())),
            _ => None,
        }
    }

    /// Notification for a build that errored out; errors are never suppressed
    pub fn for_error(&self, err: &BuildError) -> Option<Notification> {
        if !self.config.enabled {
            return None;
        }
        Some(self.make(NotificationLevel::Error, format!("Build failed: {}", err)))
    }
}
