//! Toast-style notifications raised by the form and the table.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Maximum number of notifications kept for display.
pub const MAX_NOTIFICATIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Default,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub variant: Variant,
    pub raised_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    recent: VecDeque<Notification>,
}

/// Shared sink for notifications. Cloning shares the same queue.
#[derive(Clone, Default)]
pub struct Notifier {
    inner: Arc<Mutex<Inner>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(&self, title: &str, description: &str) {
        self.push(title, description, Variant::Default);
    }

    pub fn failure(&self, title: &str, description: &str) {
        self.push(title, description, Variant::Destructive);
    }

    pub fn push(&self, title: &str, description: &str, variant: Variant) {
        match variant {
            Variant::Default => info!(title, description, "notification"),
            Variant::Destructive => warn!(title, description, "notification"),
        }

        let mut inner = self.lock();
        inner.next_id += 1;
        let notification = Notification {
            id: inner.next_id,
            title: title.to_string(),
            description: description.to_string(),
            variant,
            raised_at: Utc::now(),
        };
        inner.recent.push_back(notification);
        while inner.recent.len() > MAX_NOTIFICATIONS {
            inner.recent.pop_front();
        }
    }

    /// Oldest first.
    pub fn recent(&self) -> Vec<Notification> {
        self.lock().recent.iter().cloned().collect()
    }

    /// `false` when no notification with `id` is shown.
    pub fn dismiss(&self, id: u64) -> bool {
        let mut inner = self.lock();
        let before = inner.recent.len();
        inner.recent.retain(|n| n.id != id);
        inner.recent.len() != before
    }

    pub fn titles(&self) -> Vec<String> {
        self.lock().recent.iter().map(|n| n.title.clone()).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned queue only means a panic mid-push; the data is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
