//! Remote page sources: chapter resolution and page byte retrieval.

pub mod descramble;
pub mod mangadex;
pub mod proxy;

use std::sync::Mutex;

use tracing::{info, warn};

use crate::error::{ChapterError, SourceError};
use crate::state_machine::ItemId;
use crate::store::{ItemStore, lock};

pub use mangadex::{AtHomeServer, MangaDexClient, parse_chapter_id};
pub use proxy::{SourceProxy, Upstream, file_name_for};

/// Bytes of a remote page with their media type.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Materializes a remote page so it can be sent for translation.
#[allow(async_fn_in_trait)]
pub trait BinarySource {
    async fn fetch_binary(&self, reference: &str) -> Result<RemoteImage, SourceError>;
}

/// The external chapter index.
#[allow(async_fn_in_trait)]
pub trait ChapterLookup {
    async fn at_home(&self, chapter_id: &str) -> Result<AtHomeServer, ChapterError>;
}

/// Resolve a chapter URL or id to its page locations in reading order.
pub async fn resolve_chapter(
    lookup: &impl ChapterLookup,
    reference: &str,
) -> Result<Vec<String>, ChapterError> {
    let chapter_id = parse_chapter_id(reference)?;
    let pages = lookup.at_home(&chapter_id).await?.page_urls()?;
    if pages.is_empty() {
        return Err(ChapterError::EmptyChapter);
    }
    info!(chapter = %chapter_id, pages = pages.len(), "Resolved chapter");
    Ok(pages)
}

/// Resolve a chapter and append its pages to the store.
///
/// The global error is cleared on entry. On failure it receives the error
/// message and no items are added.
pub async fn import_chapter(
    lookup: &impl ChapterLookup,
    store: &Mutex<ItemStore>,
    reference: &str,
    limit: Option<usize>,
) -> Result<Vec<ItemId>, ChapterError> {
    {
        let mut guard = lock(store);
        guard.set_chapter_reference(reference);
        guard.set_global_error(None);
    }

    match resolve_chapter(lookup, reference).await {
        Ok(mut pages) => {
            if let Some(limit) = limit {
                pages.truncate(limit);
            }
            let mut guard = lock(store);
            let ids = guard.add_remote_pages(&pages);
            guard.set_chapter_reference("");
            Ok(ids)
        }
        Err(err) => {
            warn!(reference, "Chapter import failed: {err}");
            lock(store).set_global_error(Some(err.to_string()));
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "5364d445-4774-4af7-8f88-a2d99d66465b";

    struct FixedLookup {
        response: Result<serde_json::Value, ChapterError>,
    }

    impl ChapterLookup for FixedLookup {
        async fn at_home(&self, chapter_id: &str) -> Result<AtHomeServer, ChapterError> {
            assert_eq!(chapter_id, ID);
            match &self.response {
                Ok(value) => Ok(serde_json::from_value(value.clone()).unwrap()),
                Err(e) => Err(e.clone()),
            }
        }
    }

    fn pages(files: &[&str]) -> FixedLookup {
        FixedLookup {
            response: Ok(serde_json::json!({
                "result": "ok",
                "baseUrl": "https://node.example",
                "chapter": {"hash": "h", "data": files}
            })),
        }
    }

    #[tokio::test]
    async fn resolves_in_upstream_order() {
        let urls = resolve_chapter(&pages(&["b.png", "a.png"]), ID).await.unwrap();
        assert_eq!(
            urls,
            vec![
                "https://node.example/data/h/b.png",
                "https://node.example/data/h/a.png"
            ]
        );
    }

    #[tokio::test]
    async fn empty_chapter_is_an_error() {
        let err = resolve_chapter(&pages(&[]), ID).await.unwrap_err();
        assert_eq!(err, ChapterError::EmptyChapter);
    }

    #[tokio::test]
    async fn invalid_reference_never_hits_lookup() {
        let lookup = FixedLookup {
            response: Err(ChapterError::UpstreamError("should not be called".into())),
        };
        let err = resolve_chapter(&lookup, "https://example.com/nothing").await.unwrap_err();
        assert!(matches!(err, ChapterError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn import_adds_pages_and_clears_reference() {
        let store = Mutex::new(ItemStore::new());
        let url = format!("https://mangadex.org/chapter/{ID}/1");
        let ids = import_chapter(&pages(&["1.jpg", "2.jpg", "3.jpg"]), &store, &url, Some(2))
            .await
            .unwrap();

        let guard = lock(&store);
        assert_eq!(ids.len(), 2);
        assert_eq!(guard.len(), 2);
        assert_eq!(guard.items()[0].display_name, "1.jpg");
        assert!(guard.items().iter().all(|i| i.source.is_remote()));
        assert_eq!(guard.chapter_reference(), "");
        assert!(guard.global_error().is_none());
    }

    #[tokio::test]
    async fn failed_import_leaves_items_untouched() {
        let store = Mutex::new(ItemStore::new());
        lock(&store).add_remote_pages(&["https://node.example/data/h/0.jpg".to_string()]);

        let err = import_chapter(&pages(&[]), &store, ID, None).await.unwrap_err();
        assert_eq!(err, ChapterError::EmptyChapter);

        let guard = lock(&store);
        assert_eq!(guard.len(), 1);
        assert_eq!(guard.global_error(), Some("No images found in this chapter"));
        assert_eq!(guard.chapter_reference(), ID);
    }
}
