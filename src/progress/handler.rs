//! Progress handler trait and events

use std::time::Duration;

/// Events emitted while a module's phases run
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A run started for a module
    ModuleStarted { module: String, target: String },

    /// A phase body reported what it is doing
    Action { module: String, action: String },

    /// Phase body about to be invoked
    PhaseStarted { module: String, phase: String },

    /// Phase body completed normally
    PhaseComplete {
        module: String,
        phase: String,
        duration: Duration,
    },

    /// Phase body failed
    PhaseFailed {
        module: String,
        phase: String,
        error: String,
        fallback: Option<String>,
    },

    /// A phase asked to treat the module as done
    ShortCircuited {
        module: String,
        phase: String,
        advisory: Option<String>,
    },

    /// Module reached its terminal phase
    ModuleComplete { module: String, duration: Duration },

    /// Module failed fatally
    ModuleFailed { module: String, error: String },
}

/// Trait for handling progress events during a build
pub trait ProgressHandler: Send + Sync {
    /// Called when a progress event occurs
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    impl ProgressHandler for CountingHandler {
        fn on_progress(&self, _event: &ProgressEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_noop_handler() {
        let handler = NoOpHandler;
        handler.on_progress(&ProgressEvent::ModuleStarted {
            module: "perl-xml".to_string(),
            target: "install".to_string(),
        });
    }

    #[test]
    fn test_progress_events() {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = CountingHandler {
            count: count.clone(),
        };

        handler.on_progress(&ProgressEvent::PhaseStarted {
            module: "perl-xml".to_string(),
            phase: "build".to_string(),
        });
        handler.on_progress(&ProgressEvent::PhaseComplete {
            module: "perl-xml".to_string(),
            phase: "build".to_string(),
            duration: Duration::from_millis(50),
        });
        handler.on_progress(&ProgressEvent::ModuleComplete {
            module: "perl-xml".to_string(),
            duration: Duration::from_secs(5),
        });

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_event_debug() {
        let event = ProgressEvent::ShortCircuited {
            module: "libfoo".to_string(),
            phase: "start".to_string(),
            advisory: None,
        };
        let debug_str = format!("{:?}", event);
        assert!(debug_str.contains("ShortCircuited"));
        assert!(debug_str.contains("advisory: None"));
    }
}
