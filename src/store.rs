//! The item store: every page, its lifecycle state, and the reader's
//! selection state.
//!
//! The store is an owned value. Async code shares it as a [`SharedStore`]
//! and mutates it only through short critical sections that never span an
//! `.await`, so any reader sees whole items. Items are swapped in wholesale
//! via [`ItemStore::replace`] rather than edited field by field.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::state_machine::{ItemId, ItemState, WorkItem};
use crate::validate::CandidateFile;

pub type SharedStore = Arc<Mutex<ItemStore>>;

/// Lock a store (or any mutex), recovering the guard if a holder panicked.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Which page rendition the reader shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Translated,
    Original,
    Compare,
}

/// Tracks locally created object URLs so each is released exactly once.
#[derive(Debug, Default)]
pub struct BlobRegistry {
    live: Mutex<HashSet<String>>,
    released: AtomicUsize,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new object URL.
    pub fn create(&self) -> String {
        let url = format!("blob:mangalens/{}", Uuid::new_v4());
        lock(&self.live).insert(url.clone());
        url
    }

    /// Release a handle. Returns `false` if it was never live or is
    /// already released.
    pub fn release(&self, url: &str) -> bool {
        let removed = lock(&self.live).remove(url);
        if removed {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
        removed
    }

    pub fn is_live(&self, url: &str) -> bool {
        lock(&self.live).contains(url)
    }

    pub fn live_count(&self) -> usize {
        lock(&self.live).len()
    }

    pub fn released_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

pub fn is_object_url(location: &str) -> bool {
    location.starts_with("blob:")
}

#[derive(Debug)]
pub struct ItemStore {
    items: Vec<WorkItem>,
    view_mode: ViewMode,
    feedback_mode: bool,
    global_error: Option<String>,
    series_name: String,
    chapter_reference: String,
    blobs: Arc<BlobRegistry>,
}

impl Default for ItemStore {
    fn default() -> Self {
        Self::with_registry(Arc::new(BlobRegistry::new()))
    }
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(blobs: Arc<BlobRegistry>) -> Self {
        Self {
            items: Vec::new(),
            view_mode: ViewMode::default(),
            feedback_mode: false,
            global_error: None,
            series_name: String::new(),
            chapter_reference: String::new(),
            blobs,
        }
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    pub fn registry(&self) -> &Arc<BlobRegistry> {
        &self.blobs
    }

    // --- items ---

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&WorkItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append an item. Refuses an id that is already present.
    pub fn insert(&mut self, item: WorkItem) -> bool {
        if self.get(&item.id).is_some() {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Validate and add local files. Every valid file becomes an item; the
    /// messages of rejected ones are joined into the global error, which is
    /// cleared when nothing was rejected.
    pub fn add_files(&mut self, files: impl IntoIterator<Item = CandidateFile>) -> Vec<ItemId> {
        let mut added = Vec::new();
        let mut errors = Vec::new();

        for file in files {
            if let Err(err) = file.validate() {
                errors.push(err.to_string());
                continue;
            }
            let handle = self.blobs.create();
            let item = WorkItem::local(file.name, file.mime_type, file.bytes, handle);
            added.push(item.id.clone());
            self.items.push(item);
        }

        self.global_error = if errors.is_empty() {
            None
        } else {
            Some(errors.join("\n"))
        };
        debug!(added = added.len(), rejected = errors.len(), "Added local files");
        added
    }

    /// Add remote pages in reading order.
    pub fn add_remote_pages(&mut self, urls: &[String]) -> Vec<ItemId> {
        let mut added = Vec::with_capacity(urls.len());
        for (index, url) in urls.iter().enumerate() {
            let name = url
                .rsplit('/')
                .next()
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("mangadex-{}.jpg", index + 1));
            let item = WorkItem::remote(url.clone(), name);
            added.push(item.id.clone());
            self.items.push(item);
        }
        added
    }

    /// Swap an item for the one `f` builds from it. Returns the new item, or
    /// `None` if the id is unknown.
    pub fn replace(
        &mut self,
        id: &str,
        f: impl FnOnce(&WorkItem) -> WorkItem,
    ) -> Option<&WorkItem> {
        let blobs = Arc::clone(&self.blobs);
        let slot = self.items.iter_mut().find(|item| item.id == id)?;
        let next = f(slot);
        if let Some(prev) = slot.result_location.as_deref()
            && is_object_url(prev)
            && next.result_location.as_deref() != Some(prev)
        {
            blobs.release(prev);
        }
        *slot = next;
        Some(&*slot)
    }

    /// Remove an item and release its object URLs.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(pos) = self.items.iter().position(|item| item.id == id) else {
            return false;
        };
        let item = self.items.remove(pos);
        self.release_handles(&item);
        true
    }

    /// Drop every item, releasing their handles.
    pub fn clear(&mut self) {
        for item in std::mem::take(&mut self.items) {
            self.release_handles(&item);
        }
    }

    fn release_handles(&self, item: &WorkItem) {
        if is_object_url(&item.original_location) {
            self.blobs.release(&item.original_location);
        }
        if let Some(result) = item.result_location.as_deref()
            && is_object_url(result)
        {
            self.blobs.release(result);
        }
    }

    // --- selection and notices ---

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn set_view_mode(&mut self, view_mode: ViewMode) {
        self.view_mode = view_mode;
    }

    pub fn feedback_mode(&self) -> bool {
        self.feedback_mode
    }

    pub fn set_feedback_mode(&mut self, on: bool) {
        self.feedback_mode = on;
    }

    pub fn global_error(&self) -> Option<&str> {
        self.global_error.as_deref()
    }

    pub fn set_global_error(&mut self, error: Option<String>) {
        self.global_error = error;
    }

    pub fn series_name(&self) -> &str {
        &self.series_name
    }

    pub fn set_series_name(&mut self, name: impl Into<String>) {
        self.series_name = name.into();
    }

    /// Trimmed series name, if any.
    pub fn series_hint(&self) -> Option<String> {
        let trimmed = self.series_name.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    pub fn chapter_reference(&self) -> &str {
        &self.chapter_reference
    }

    pub fn set_chapter_reference(&mut self, reference: impl Into<String>) {
        self.chapter_reference = reference.into();
    }

    // --- derived ---

    pub fn translated_count(&self) -> usize {
        self.items.iter().filter(|i| i.result_location.is_some()).count()
    }

    pub fn has_untranslated(&self) -> bool {
        self.items
            .iter()
            .any(|i| i.result_location.is_none() && !i.loading)
    }

    pub fn is_translating(&self) -> bool {
        self.items.iter().any(|i| i.loading)
    }

    pub fn has_translated(&self) -> bool {
        self.items.iter().any(|i| i.result_location.is_some())
    }

    pub fn count_in(&self, state: ItemState) -> usize {
        self.items.iter().filter(|i| i.state() == state).count()
    }

    /// Ids in `state`, in display order.
    pub fn ids_in(&self, state: ItemState) -> Vec<ItemId> {
        self.items
            .iter()
            .filter(|i| i.state() == state)
            .map(|i| i.id.clone())
            .collect()
    }
}

impl Drop for ItemStore {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::Lifecycle;

    fn png(name: &str) -> CandidateFile {
        CandidateFile::new(name, "image/png", vec![0u8; 8])
    }

    #[test]
    fn add_files_reports_rejections_and_keeps_valid() {
        let mut store = ItemStore::new();
        let added = store.add_files(vec![
            png("01.png"),
            CandidateFile::new("clip.gif", "image/gif", vec![0]),
            png("02.png"),
        ]);

        assert_eq!(added.len(), 2);
        assert_eq!(store.len(), 2);
        assert_eq!(
            store.global_error(),
            Some("Invalid file type: clip.gif. Please select a .jpg, .png, or .webp image.")
        );
        assert_eq!(store.registry().live_count(), 2);
    }

    #[test]
    fn add_files_clears_previous_error() {
        let mut store = ItemStore::new();
        store.set_global_error(Some("old".into()));
        store.add_files(vec![png("a.png")]);
        assert!(store.global_error().is_none());
    }

    #[test]
    fn remote_pages_keep_order_and_names() {
        let mut store = ItemStore::new();
        let urls = vec![
            "https://node.example/data/h/x1-aa.jpg".to_string(),
            "https://node.example/data/h/x2-bb.jpg".to_string(),
            "https://node.example/data/h/".to_string(),
        ];
        let ids = store.add_remote_pages(&urls);
        let names: Vec<_> = ids
            .iter()
            .map(|id| store.get(id).unwrap().display_name.clone())
            .collect();
        assert_eq!(names, vec!["x1-aa.jpg", "x2-bb.jpg", "mangadex-3.jpg"]);
        assert_eq!(store.registry().live_count(), 0);
    }

    #[test]
    fn insert_rejects_duplicate_id() {
        let mut store = ItemStore::new();
        let item = WorkItem::remote("u", "a");
        assert!(store.insert(item.clone()));
        assert!(!store.insert(item));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_releases_original_and_result_once() {
        let registry = Arc::new(BlobRegistry::new());
        let mut store = ItemStore::with_registry(Arc::clone(&registry));
        let id = store.add_files(vec![png("a.png")]).remove(0);

        let translated = registry.create();
        store.replace(&id, |item| Lifecycle::succeed(item, translated.clone()));
        assert_eq!(registry.live_count(), 2);

        assert!(store.remove(&id));
        assert!(store.get(&id).is_none());
        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.released_count(), 2);

        assert!(!store.remove(&id));
        assert_eq!(registry.released_count(), 2);
    }

    #[test]
    fn data_uri_results_are_not_released() {
        let registry = Arc::new(BlobRegistry::new());
        let mut store = ItemStore::with_registry(Arc::clone(&registry));
        let id = store.add_files(vec![png("a.png")]).remove(0);
        store.replace(&id, |item| {
            Lifecycle::succeed(item, "data:image/png;base64,AA==".into())
        });

        store.remove(&id);
        assert_eq!(registry.released_count(), 1);
    }

    #[test]
    fn replacing_a_blob_result_releases_the_old_one() {
        let registry = Arc::new(BlobRegistry::new());
        let mut store = ItemStore::with_registry(Arc::clone(&registry));
        let id = store.add_files(vec![png("a.png")]).remove(0);
        let first = registry.create();
        store.replace(&id, |item| Lifecycle::succeed(item, first.clone()));
        store.replace(&id, |item| Lifecycle::fail(item, "x".into(), 1));

        assert!(!registry.is_live(&first));
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn teardown_releases_everything() {
        let registry = Arc::new(BlobRegistry::new());
        {
            let mut store = ItemStore::with_registry(Arc::clone(&registry));
            store.add_files(vec![png("a.png"), png("b.png")]);
            assert_eq!(registry.live_count(), 2);
        }
        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.released_count(), 2);
    }

    #[test]
    fn replace_unknown_id_is_none() {
        let mut store = ItemStore::new();
        assert!(store.replace("missing", Lifecycle::begin).is_none());
    }

    #[test]
    fn derived_queries() {
        let mut store = ItemStore::new();
        let ids = store.add_files(vec![png("a.png"), png("b.png")]);
        assert!(store.has_untranslated());
        assert!(!store.has_translated());

        store.replace(&ids[0], Lifecycle::begin);
        assert!(store.is_translating());

        store.replace(&ids[0], |i| Lifecycle::succeed(i, "data:x".into()));
        assert_eq!(store.translated_count(), 1);
        assert!(store.has_translated());
        assert_eq!(store.count_in(ItemState::Idle), 1);
    }

    #[test]
    fn ids_in_keeps_display_order() {
        let mut store = ItemStore::new();
        let ids = store.add_files([png("a.png"), png("b.png"), png("c.png")]);
        store.replace(&ids[2], |i| Lifecycle::fail(i, "Model is overloaded.".into(), 1));
        store.replace(&ids[0], |i| Lifecycle::fail(i, "API rate limit exceeded.".into(), 1));

        assert_eq!(store.ids_in(ItemState::Failed), vec![ids[0].clone(), ids[2].clone()]);
        assert_eq!(store.ids_in(ItemState::Idle), vec![ids[1].clone()]);
    }

    #[test]
    fn series_hint_is_trimmed() {
        let mut store = ItemStore::new();
        assert!(store.series_hint().is_none());
        store.set_series_name("   ");
        assert!(store.series_hint().is_none());
        store.set_series_name("  One Piece ");
        assert_eq!(store.series_hint().as_deref(), Some("One Piece"));
    }

    #[test]
    fn view_mode_deserializes_lowercase() {
        let mode: ViewMode = serde_json::from_str("\"compare\"").unwrap();
        assert_eq!(mode, ViewMode::Compare);
        assert_eq!(ViewMode::default(), ViewMode::Translated);
    }
}
