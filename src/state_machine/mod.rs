mod item;
mod state;

pub use item::{Comment, ItemId, ItemSource, WorkItem};
pub use state::{ItemState, Lifecycle};
