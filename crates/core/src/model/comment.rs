use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::annotate::Point;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CommentError {
    #[error("comment text cannot be empty")]
    EmptyText,
}

/// A note pinned to a content page.
///
/// `x`/`y` are offsets from the content container's top-left corner, captured
/// at creation time; they are not recomputed when the viewport changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub x: f64,
    pub y: f64,
}

impl Comment {
    /// Create a comment anchored at `anchor`.
    ///
    /// # Errors
    ///
    /// Returns `CommentError::EmptyText` if the text is blank.
    pub fn new(id: i64, text: impl Into<String>, anchor: Point) -> Result<Self, CommentError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(CommentError::EmptyText);
        }
        Ok(Self {
            id,
            text,
            x: anchor.x,
            y: anchor.y,
        })
    }

    #[must_use]
    pub fn anchor(&self) -> Point {
        Point::new(self.x, self.y)
    }
}
