//! Selection and annotation helpers over rendered word spans.
//!
//! The renderer exposes every word as a span with a bounding rectangle; these
//! helpers decide which spans a selection box touches and where a comment
//! marker is pinned.

mod geometry;
mod words;

pub use geometry::{Point, Rect};
pub use words::{tokenize, Token, WordSpan};

/// Returns true if any word span overlaps the selection box.
#[must_use]
pub fn selection_has_text(spans: &[WordSpan], selection: &Rect) -> bool {
    spans.iter().any(|span| span.rect.overlaps(selection))
}

/// Mark or unmark every span touched by `selection`.
///
/// Returns how many spans changed state.
pub fn set_highlight(spans: &mut [WordSpan], selection: &Rect, highlighted: bool) -> usize {
    let mut changed = 0;
    for span in spans.iter_mut().filter(|s| s.rect.overlaps(selection)) {
        if span.highlighted != highlighted {
            span.highlighted = highlighted;
            changed += 1;
        }
    }
    changed
}

/// Comment marker position: the selection's top-right corner, relative to
/// the content container.
#[must_use]
pub fn comment_anchor(selection: &Rect, container: &Rect) -> Point {
    Point::new(
        selection.left - container.left + selection.width,
        selection.top - container.top,
    )
}
