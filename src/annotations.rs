//! Positioned feedback comments on translated pages.
//!
//! Every edit goes through [`ItemStore::replace`], so the item is swapped
//! whole. Operations on an unknown item or comment are silent no-ops.

use crate::state_machine::{Comment, WorkItem};
use crate::store::ItemStore;

/// Render the non-empty comments as a numbered correction list.
///
/// Numbering counts only the comments that made it into the list, and the
/// text is kept as written. Returns `None` when every comment is blank.
pub fn build_feedback(comments: &[Comment]) -> Option<String> {
    let lines: Vec<String> = comments
        .iter()
        .filter(|c| !c.text.trim().is_empty())
        .enumerate()
        .map(|(i, c)| format!("{}. {}", i + 1, c.text))
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}

fn renumbered(mut comments: Vec<Comment>) -> Vec<Comment> {
    for (i, comment) in comments.iter_mut().enumerate() {
        comment.number = i as u32 + 1;
    }
    comments
}

impl ItemStore {
    /// Append an empty comment at (`x`, `y`) percent. Returns the new comment.
    pub fn add_comment(&mut self, item_id: &str, x: f64, y: f64) -> Option<Comment> {
        let mut added = None;
        self.replace(item_id, |item| {
            let comment = Comment::new(x, y, item.comments.len() as u32 + 1);
            added = Some(comment.clone());
            let mut comments = item.comments.clone();
            comments.push(comment);
            WorkItem {
                comments,
                ..item.clone()
            }
        })?;
        added
    }

    /// Replace a comment's text. Returns whether a comment was changed.
    pub fn update_comment(&mut self, item_id: &str, comment_id: &str, text: &str) -> bool {
        let known = self
            .get(item_id)
            .is_some_and(|item| item.comments.iter().any(|c| c.id == comment_id));
        if !known {
            return false;
        }
        self.replace(item_id, |item| {
            let comments = item
                .comments
                .iter()
                .map(|c| {
                    if c.id == comment_id {
                        Comment {
                            text: text.to_string(),
                            ..c.clone()
                        }
                    } else {
                        c.clone()
                    }
                })
                .collect();
            WorkItem {
                comments,
                ..item.clone()
            }
        })
        .is_some()
    }

    /// Remove a comment and renumber the rest 1..N in list order.
    pub fn delete_comment(&mut self, item_id: &str, comment_id: &str) -> bool {
        let known = self
            .get(item_id)
            .is_some_and(|item| item.comments.iter().any(|c| c.id == comment_id));
        if !known {
            return false;
        }
        self.replace(item_id, |item| {
            let kept = item
                .comments
                .iter()
                .filter(|c| c.id != comment_id)
                .cloned()
                .collect();
            WorkItem {
                comments: renumbered(kept),
                ..item.clone()
            }
        })
        .is_some()
    }

    /// Feedback text assembled from an item's comments.
    pub fn feedback_for(&self, item_id: &str) -> Option<String> {
        self.get(item_id).and_then(|item| build_feedback(&item.comments))
    }
}
