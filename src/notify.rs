//! Notification Channel
//!
//! Single-slot snackbar: a new message replaces the current one and hides
//! itself after a fixed timeout.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, error, info};

use crate::models::Severity;

/// Default time a message stays visible
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Anything that can put a message in front of the user
pub trait Notifier: Send + Sync {
    fn show(&self, message: &str, severity: Severity);
}

/// What the snackbar is currently showing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Default)]
struct SnackbarState {
    visible: bool,
    message: String,
    severity: Severity,
    /// Bumped on every `show`; a hide timer only acts on its own message
    generation: u64,
}

#[derive(Clone)]
pub struct Snackbar {
    state: Arc<Mutex<SnackbarState>>,
    timeout: Duration,
}

impl Default for Snackbar {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Snackbar {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(SnackbarState::default())),
            timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SnackbarState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// The visible message, if any
    pub fn current(&self) -> Option<Notification> {
        let state = self.lock();
        state.visible.then(|| Notification {
            message: state.message.clone(),
            severity: state.severity,
        })
    }

    pub fn is_visible(&self) -> bool {
        self.lock().visible
    }

    pub fn hide(&self) {
        self.lock().visible = false;
    }
}

impl Notifier for Snackbar {
    fn show(&self, message: &str, severity: Severity) {
        let generation = {
            let mut state = self.lock();
            state.generation += 1;
            state.message = message.to_string();
            state.severity = severity;
            state.visible = true;
            state.generation
        };

        match severity {
            Severity::Error => error!("[SNACKBAR] {}", message),
            _ => info!("[SNACKBAR] {}: {}", severity.as_str(), message),
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let state = self.state.clone();
                let timeout = self.timeout;
                handle.spawn(async move {
                    tokio::time::sleep(timeout).await;
                    let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                    if state.generation == generation {
                        state.visible = false;
                    }
                });
            }
            Err(_) => debug!("[SNACKBAR] No runtime, message stays until hidden"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_message_hides_after_timeout() {
        let snackbar = Snackbar::default();
        snackbar.show("Saved", Severity::Success);
        assert_eq!(
            snackbar.current(),
            Some(Notification { message: "Saved".to_string(), severity: Severity::Success })
        );

        tokio::time::sleep(Duration::from_millis(2999)).await;
        assert!(snackbar.is_visible());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(snackbar.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_old_timer_does_not_hide_newer_message() {
        let snackbar = Snackbar::default();
        snackbar.show("first", Severity::Info);

        tokio::time::sleep(Duration::from_millis(2000)).await;
        snackbar.show("second", Severity::Error);

        // first timer fires here
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let shown = snackbar.current().expect("second message still visible");
        assert_eq!(shown.message, "second");
        assert_eq!(shown.severity, Severity::Error);

        tokio::time::sleep(Duration::from_millis(1600)).await;
        assert!(!snackbar.is_visible());
    }

    #[test]
    fn test_show_without_runtime_stays_visible() {
        let snackbar = Snackbar::new(Duration::from_millis(1));
        snackbar.show("offline", Severity::Info);
        assert!(snackbar.is_visible());
        snackbar.hide();
        assert!(snackbar.current().is_none());
    }
}
