use std::fmt;

use serde::{Deserialize, Serialize};

use super::item::WorkItem;

/// Lifecycle of a work item.
///
/// Idle → Loading → Succeeded | Failed, and Failed/Succeeded → Loading again
/// on retry or regeneration. Loading and Failed never coexist, and Succeeded
/// always has a result and no error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemState {
    Idle,
    Loading,
    Succeeded,
    Failed,
}

impl ItemState {
    /// Whether a batch may pick the item up.
    pub fn accepts_batch(self) -> bool {
        !matches!(self, ItemState::Loading | ItemState::Succeeded)
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemState::Idle => write!(f, "IDLE"),
            ItemState::Loading => write!(f, "LOADING"),
            ItemState::Succeeded => write!(f, "SUCCEEDED"),
            ItemState::Failed => write!(f, "FAILED"),
        }
    }
}

/// Whole-item transitions. Each returns a fresh item so the store can swap
/// it in with a single replacement.
pub struct Lifecycle;

impl Lifecycle {
    /// Mark the item in flight, clearing any previous error.
    pub fn begin(item: &WorkItem) -> WorkItem {
        WorkItem {
            loading: true,
            error: None,
            ..item.clone()
        }
    }

    /// Record a translated artifact. Resets the retry counter.
    pub fn succeed(item: &WorkItem, result_location: String) -> WorkItem {
        WorkItem {
            loading: false,
            error: None,
            result_location: Some(result_location),
            retry_count: 0,
            ..item.clone()
        }
    }

    /// Record a terminal failure. Any earlier result is dropped so that a
    /// result and an error are never present together.
    pub fn fail(item: &WorkItem, message: String, retry_count: u32) -> WorkItem {
        WorkItem {
            loading: false,
            error: Some(message),
            result_location: None,
            retry_count,
            ..item.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> WorkItem {
        WorkItem::remote("https://example.test/p.jpg", "p.jpg")
    }

    #[test]
    fn begin_clears_error() {
        let mut failed = item();
        failed.error = Some("old".into());
        let started = Lifecycle::begin(&failed);
        assert_eq!(started.state(), ItemState::Loading);
        assert!(started.error.is_none());
    }

    #[test]
    fn succeed_resets_retry_count() {
        let mut started = Lifecycle::begin(&item());
        started.retry_count = 1;
        let done = Lifecycle::succeed(&started, "data:image/png;base64,AA==".into());
        assert_eq!(done.state(), ItemState::Succeeded);
        assert_eq!(done.retry_count, 0);
        assert!(done.error.is_none());
    }

    #[test]
    fn fail_never_keeps_result() {
        let done = Lifecycle::succeed(&item(), "data:image/png;base64,AA==".into());
        let regen = Lifecycle::begin(&done);
        let failed = Lifecycle::fail(&regen, "nope".into(), 1);
        assert_eq!(failed.state(), ItemState::Failed);
        assert!(failed.result_location.is_none());
        assert_eq!(failed.retry_count, 1);
        assert!(!failed.loading);
    }

    #[test]
    fn batch_admission() {
        assert!(ItemState::Idle.accepts_batch());
        assert!(ItemState::Failed.accepts_batch());
        assert!(!ItemState::Loading.accepts_batch());
        assert!(!ItemState::Succeeded.accepts_batch());
    }

    #[test]
    fn state_display() {
        assert_eq!(ItemState::Idle.to_string(), "IDLE");
        assert_eq!(ItemState::Loading.to_string(), "LOADING");
        assert_eq!(ItemState::Succeeded.to_string(), "SUCCEEDED");
        assert_eq!(ItemState::Failed.to_string(), "FAILED");
    }
}
