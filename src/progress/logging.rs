//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, error, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::ModuleStarted { module, target } => {
                info!(module = %module, target = %target, "Starting module");
            }
            ProgressEvent::Action { module, action } => {
                info!(module = %module, "{}", action);
            }
            ProgressEvent::PhaseStarted { module, phase } => {
                debug!(module = %module, phase = %phase, "Starting phase");
            }
            ProgressEvent::PhaseComplete {
                module,
                phase,
                duration,
            } => {
                debug!(
                    module = %module,
                    phase = %phase,
                    duration_ms = duration.as_millis(),
                    "Phase complete"
                );
            }
            ProgressEvent::PhaseFailed {
                module,
                phase,
                error,
                fallback,
            } => match fallback {
                Some(fallback) => {
                    warn!(module = %module, phase = %phase, fallback = %fallback, error = %error, "Phase failed, fallback available");
                }
                None => {
                    error!(module = %module, phase = %phase, error = %error, "Phase failed");
                }
            },
            ProgressEvent::ShortCircuited {
                module,
                phase,
                advisory,
            } => match advisory {
                Some(advisory) => {
                    warn!(module = %module, phase = %phase, "{}", advisory);
                }
                None => {
                    info!(module = %module, phase = %phase, "Module already satisfied, skipping remaining phases");
                }
            },
            ProgressEvent::ModuleComplete { module, duration } => {
                info!(
                    module = %module,
                    total_time_ms = duration.as_millis(),
                    "Module complete"
                );
            }
            ProgressEvent::ModuleFailed { module, error } => {
                warn!(module = %module, error = %error, "Module failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_logging_all_events() {
        let handler = LoggingHandler;

        let events = vec![
            ProgressEvent::ModuleStarted {
                module: "perl-xml".to_string(),
                target: "install".to_string(),
            },
            ProgressEvent::Action {
                module: "perl-xml".to_string(),
                action: "Building".to_string(),
            },
            ProgressEvent::PhaseStarted {
                module: "perl-xml".to_string(),
                phase: "build".to_string(),
            },
            ProgressEvent::PhaseComplete {
                module: "perl-xml".to_string(),
                phase: "build".to_string(),
                duration: Duration::from_millis(10),
            },
            ProgressEvent::PhaseFailed {
                module: "perl-xml".to_string(),
                phase: "build".to_string(),
                error: "exit 2".to_string(),
                fallback: Some("force_checkout".to_string()),
            },
            ProgressEvent::PhaseFailed {
                module: "perl-xml".to_string(),
                phase: "force_checkout".to_string(),
                error: "exit 128".to_string(),
                fallback: None,
            },
            ProgressEvent::ShortCircuited {
                module: "perl-xml".to_string(),
                phase: "start".to_string(),
                advisory: Some("newer version recommended".to_string()),
            },
            ProgressEvent::ShortCircuited {
                module: "perl-xml".to_string(),
                phase: "start".to_string(),
                advisory: None,
            },
            ProgressEvent::ModuleComplete {
                module: "perl-xml".to_string(),
                duration: Duration::from_secs(5),
            },
            ProgressEvent::ModuleFailed {
                module: "perl-xml".to_string(),
                error: "Test error".to_string(),
            },
        ];

        for event in events {
            handler.on_progress(&event);
        }
    }
}
