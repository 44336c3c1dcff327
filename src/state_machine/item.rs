use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::ItemState;

pub type ItemId = String;

/// Where a page's original bytes come from. Exactly one of the two.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemSource {
    /// Bytes the user supplied directly.
    Local {
        bytes: Arc<[u8]>,
        mime_type: String,
    },
    /// A page location on a remote chapter host, fetched on demand.
    Remote { url: String },
}

impl ItemSource {
    pub fn is_remote(&self) -> bool {
        matches!(self, ItemSource::Remote { .. })
    }
}

/// A positioned feedback note on a translated page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    /// Horizontal position in percent of the rendered width.
    pub x: f64,
    /// Vertical position in percent of the rendered height.
    pub y: f64,
    pub text: String,
    /// 1-based position in the item's comment list.
    pub number: u32,
}

impl Comment {
    pub fn new(x: f64, y: f64, number: u32) -> Self {
        Self {
            id: format!("comment-{}", Uuid::new_v4()),
            x: clamp_percent(x),
            y: clamp_percent(y),
            text: String::new(),
            number,
        }
    }
}

fn clamp_percent(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 100.0) }
}

/// One page submitted for translation.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub id: ItemId,
    pub source: ItemSource,
    pub display_name: String,
    /// Display handle for the original page: an object URL for local
    /// payloads, the upstream location for remote ones.
    pub original_location: String,
    pub result_location: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
    pub retry_count: u32,
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
}

impl WorkItem {
    pub fn local(
        display_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
        original_location: impl Into<String>,
    ) -> Self {
        Self::with_source(
            ItemSource::Local {
                bytes: bytes.into(),
                mime_type: mime_type.into(),
            },
            display_name.into(),
            original_location.into(),
        )
    }

    pub fn remote(url: impl Into<String>, display_name: impl Into<String>) -> Self {
        let url = url.into();
        Self::with_source(
            ItemSource::Remote { url: url.clone() },
            display_name.into(),
            url,
        )
    }

    fn with_source(source: ItemSource, display_name: String, original_location: String) -> Self {
        Self {
            id: format!("image-{}", Uuid::new_v4()),
            source,
            display_name,
            original_location,
            result_location: None,
            loading: false,
            error: None,
            retry_count: 0,
            comments: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Lifecycle state derived from the loading flag, result and error.
    pub fn state(&self) -> ItemState {
        if self.loading {
            ItemState::Loading
        } else if self.error.is_some() {
            ItemState::Failed
        } else if self.result_location.is_some() {
            ItemState::Succeeded
        } else {
            ItemState::Idle
        }
    }

    /// File name used when saving the translated page.
    pub fn download_name(&self) -> String {
        format!("translated-{}", self.display_name)
    }
}
