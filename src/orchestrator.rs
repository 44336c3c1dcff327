//! Job dispatcher: drives work items through translation under a
//! concurrency ceiling, and runs the single-item regenerate and manual
//! retry paths.
//!
//! A batch is a FIFO queue drained by `min(C, n)` worker futures that run
//! cooperatively on the calling task. Each worker pulls the next id, marks
//! the item Loading, awaits the [`TranslationClient`] and writes the result
//! back. Store access is always a short critical section with no `.await`
//! inside it.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::annotations::build_feedback;
use crate::config::AppConfig;
use crate::error::LensError;
use crate::gemini::ImageTranslator;
use crate::source::BinarySource;
use crate::state_machine::{ItemId, ItemState, Lifecycle, WorkItem};
use crate::store::{ItemStore, lock};
use crate::translator::{TranslateContext, TranslationClient, TranslationOutcome};

/// Notice shown when a batch has no eligible items.
pub const NOTHING_TO_DO: &str = "No images to translate.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Maximum translations in flight at once.
    pub max_concurrent: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { max_concurrent: 10 }
    }
}

impl DispatchConfig {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent.max(1),
        }
    }
}

/// Aggregate result of one batch. Counts cover only the items that passed
/// the pre-filter.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

#[derive(Debug, Clone)]
pub enum BatchOutcome {
    /// Every requested item was already translating or translated.
    NothingToDo,
    Completed(BatchReport),
}

/// Hooks for progress reporting. All methods default to no-ops and are
/// never called while the store is locked.
pub trait BatchObserver {
    fn batch_started(&self, _total: usize) {}
    fn item_started(&self, _item: &WorkItem) {}
    fn item_finished(&self, _item: &WorkItem) {}
}

pub struct NoopObserver;

impl BatchObserver for NoopObserver {}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    succeeded: usize,
    failed: usize,
}

pub struct JobDispatcher<T, S> {
    client: TranslationClient<T, S>,
    config: DispatchConfig,
}

impl<T: ImageTranslator, S: BinarySource> JobDispatcher<T, S> {
    /// A ceiling of zero would start no workers, so it is raised to one.
    pub fn new(client: TranslationClient<T, S>, config: DispatchConfig) -> Self {
        let config = DispatchConfig {
            max_concurrent: config.max_concurrent.max(1),
        };
        Self { client, config }
    }

    pub fn client(&self) -> &TranslationClient<T, S> {
        &self.client
    }

    /// Translate the given items. See [`JobDispatcher::run_batch_with`].
    pub async fn run_batch(&self, store: &Mutex<ItemStore>, ids: &[ItemId]) -> BatchOutcome {
        self.run_batch_with(store, ids, &NoopObserver).await
    }

    /// Translate the given items, reporting progress to `observer`.
    ///
    /// Items that are Loading or Succeeded are skipped, as are unknown ids
    /// and repeats of an id already queued. The global error is cleared on
    /// entry; when nothing is eligible it is set to [`NOTHING_TO_DO`].
    pub async fn run_batch_with(
        &self,
        store: &Mutex<ItemStore>,
        ids: &[ItemId],
        observer: &impl BatchObserver,
    ) -> BatchOutcome {
        let (queue, series_hint) = {
            let mut guard = lock(store);
            guard.set_global_error(None);

            let mut seen = HashSet::new();
            let queue: VecDeque<ItemId> = ids
                .iter()
                .filter(|id| seen.insert(id.as_str()))
                .filter(|id| {
                    guard
                        .get(id)
                        .is_some_and(|item| item.state().accepts_batch())
                })
                .cloned()
                .collect();

            if queue.is_empty() {
                guard.set_global_error(Some(NOTHING_TO_DO.to_string()));
                info!(requested = ids.len(), "Nothing to translate");
                return BatchOutcome::NothingToDo;
            }
            (queue, guard.series_hint())
        };

        let total = queue.len();
        let workers = self.config.max_concurrent.min(total);
        let started_at = Utc::now();
        let clock = Instant::now();
        info!(total, workers, "Starting batch");
        observer.batch_started(total);

        let queue = Mutex::new(queue);
        let ctx = TranslateContext {
            series_hint,
            ..Default::default()
        };
        let tallies = join_all(
            (0..workers).map(|_| self.drain(store, &queue, &ctx, observer)),
        )
        .await;

        let tally = tallies.into_iter().fold(Tally::default(), |acc, t| Tally {
            succeeded: acc.succeeded + t.succeeded,
            failed: acc.failed + t.failed,
        });
        let report = BatchReport {
            succeeded: tally.succeeded,
            failed: tally.failed,
            started_at,
            completed_at: Utc::now(),
            duration_ms: clock.elapsed().as_millis() as u64,
        };
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            duration_ms = report.duration_ms,
            "Batch complete"
        );
        BatchOutcome::Completed(report)
    }

    /// One worker: pull ids until the queue is empty.
    async fn drain(
        &self,
        store: &Mutex<ItemStore>,
        queue: &Mutex<VecDeque<ItemId>>,
        ctx: &TranslateContext,
        observer: &impl BatchObserver,
    ) -> Tally {
        let mut tally = Tally::default();

        loop {
            let Some(id) = lock(queue).pop_front() else {
                break;
            };

            let Some(item) = launch(store, &id) else {
                // Removed, or picked up by another initiator, after the batch was built.
                warn!(item = %id, "Item no longer eligible at launch");
                tally.failed += 1;
                continue;
            };
            debug!(item = %id, name = %item.display_name, "Launching translation");
            observer.item_started(&item);

            let outcome = self.client.translate(&item, ctx).await;
            if outcome.result.is_ok() {
                tally.succeeded += 1;
            } else {
                tally.failed += 1;
            }

            if let Some(done) = apply(store, &id, outcome) {
                debug!(item = %id, state = %done.state(), "Translation finished");
                observer.item_finished(&done);
            }
        }

        tally
    }

    /// Regenerate one item using its comments as feedback.
    ///
    /// The comments are consumed: they are cleared in the same replacement
    /// that marks the item Loading. Runs outside any batch and does not
    /// count against the concurrency ceiling.
    pub async fn regenerate(
        &self,
        store: &Mutex<ItemStore>,
        id: &str,
    ) -> Result<WorkItem, LensError> {
        let (item, ctx) = {
            let mut guard = lock(store);
            let current = guard
                .get(id)
                .ok_or_else(|| LensError::ItemNotFound(id.to_string()))?;
            if current.loading {
                return Err(LensError::ItemBusy(id.to_string()));
            }
            let Some(feedback) = build_feedback(&current.comments) else {
                guard.set_global_error(Some(LensError::NoFeedbackProvided.to_string()));
                return Err(LensError::NoFeedbackProvided);
            };

            let series_hint = guard.series_hint();
            let item = guard
                .replace(id, |item| WorkItem {
                    comments: Vec::new(),
                    ..Lifecycle::begin(item)
                })
                .cloned()
                .ok_or_else(|| LensError::ItemNotFound(id.to_string()))?;
            let ctx = TranslateContext {
                series_hint,
                feedback: Some(feedback),
                forced_retry: false,
            };
            (item, ctx)
        };
        info!(item = %id, "Regenerating with feedback");

        let outcome = self.client.translate(&item, &ctx).await;
        apply(store, id, outcome).ok_or_else(|| LensError::ItemNotFound(id.to_string()))
    }

    /// Manually retry one failed item. Counts as a retry, so a failure here
    /// is terminal without another automatic attempt. A Loading item is
    /// refused with `ItemBusy`, any other non-failed item with `NotFailed`.
    pub async fn retry_item(
        &self,
        store: &Mutex<ItemStore>,
        id: &str,
    ) -> Result<WorkItem, LensError> {
        let (item, series_hint) = {
            let mut guard = lock(store);
            let current = guard
                .get(id)
                .ok_or_else(|| LensError::ItemNotFound(id.to_string()))?;
            match current.state() {
                ItemState::Failed => {}
                ItemState::Loading => return Err(LensError::ItemBusy(id.to_string())),
                _ => return Err(LensError::NotFailed(id.to_string())),
            }
            let series_hint = guard.series_hint();
            let item = guard
                .replace(id, Lifecycle::begin)
                .cloned()
                .ok_or_else(|| LensError::ItemNotFound(id.to_string()))?;
            (item, series_hint)
        };
        info!(item = %id, retry_count = item.retry_count, "Manual retry");

        let ctx = TranslateContext {
            series_hint,
            feedback: None,
            forced_retry: true,
        };
        let outcome = self.client.translate(&item, &ctx).await;
        apply(store, id, outcome).ok_or_else(|| LensError::ItemNotFound(id.to_string()))
    }
}

/// Mark an item Loading if it is still eligible. Returns the started item.
fn launch(store: &Mutex<ItemStore>, id: &str) -> Option<WorkItem> {
    let mut guard = lock(store);
    if !guard.get(id)?.state().accepts_batch() {
        return None;
    }
    guard.replace(id, Lifecycle::begin).cloned()
}

/// Write a translate outcome back onto the item.
fn apply(store: &Mutex<ItemStore>, id: &str, outcome: TranslationOutcome) -> Option<WorkItem> {
    let mut guard = lock(store);
    let updated = match outcome.result {
        Ok(artifact) => guard.replace(id, |item| Lifecycle::succeed(item, artifact.location)),
        Err(reason) => guard.replace(id, |item| {
            Lifecycle::fail(item, reason.to_string(), outcome.retry_count)
        }),
    };
    if updated.is_none() {
        warn!(item = %id, "Item removed while translating, result dropped");
    }
    updated.cloned()
}
