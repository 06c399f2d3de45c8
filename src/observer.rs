//! Progress reporting for sync cycles.
//!
//! The sync client and scheduler report through [`SyncObserver`]; how the
//! messages reach a user is up to the implementation. [`TracingObserver`]
//! forwards everything to `tracing`.

use std::sync::Mutex;

/// Severity of a user-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

pub trait SyncObserver: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
    fn set_sync_status(&self, status: &str);
}

/// Observer that logs notifications
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info | Severity::Success => tracing::info!("{}", message),
            Severity::Warning => tracing::warn!("{}", message),
            Severity::Error => tracing::error!("{}", message),
        }
    }

    fn set_sync_status(&self, status: &str) {
        tracing::debug!("Sync status: {}", status);
    }
}

/// Observer that keeps every message, for inspection by embedders and tests.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    notifications: Mutex<Vec<(String, Severity)>>,
    statuses: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<(String, Severity)> {
        self.notifications
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// The most recent status text
    pub fn last_status(&self) -> Option<String> {
        self.statuses.lock().ok().and_then(|s| s.last().cloned())
    }
}

impl SyncObserver for RecordingObserver {
    fn notify(&self, message: &str, severity: Severity) {
        if let Ok(mut notifications) = self.notifications.lock() {
            notifications.push((message.to_string(), severity));
        }
    }

    fn set_sync_status(&self, status: &str) {
        if let Ok(mut statuses) = self.statuses.lock() {
            statuses.push(status.to_string());
        }
    }
}
