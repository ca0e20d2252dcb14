//! Selection and scroll bookkeeping for variable-length lists.
//!
//! Everything here is a pure function of indices and lengths. The app keeps a
//! [`Viewport`] per screen and re-clamps it after any change to the visible
//! collection length or the viewport height.

use std::ops::Range;

pub fn clamp_selection(selection: usize, len: usize) -> usize {
    selection.min(len.saturating_sub(1))
}

/// Moves `scroll` the minimum amount needed to keep `selection` on screen, then
/// bounds it so the last page is never partially empty.
pub fn clamp_scroll(selection: usize, scroll: usize, height: usize, len: usize) -> usize {
    let height = height.max(1);
    let mut scroll = scroll;
    if selection < scroll {
        scroll = selection;
    }
    if selection >= scroll + height {
        scroll = selection + 1 - height;
    }
    scroll.min(len.saturating_sub(height))
}

pub fn visible_range(scroll: usize, height: usize, len: usize) -> Range<usize> {
    let start = scroll.min(len);
    let end = scroll.saturating_add(height).min(len);
    start..end
}

/// "first-last of total", 1-based. `None` when everything fits.
pub fn scroll_indicator(scroll: usize, height: usize, len: usize) -> Option<String> {
    if len <= height {
        return None;
    }
    let range = visible_range(scroll, height, len);
    Some(format!("{}-{} of {len}", range.start + 1, range.end))
}

/// Largest valid offset for a text buffer of `lines` rows in `height` rows.
pub fn max_text_scroll(lines: usize, height: usize) -> usize {
    lines.saturating_sub(height.max(1))
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Viewport {
    pub selection: usize,
    pub scroll: usize,
    pub height: usize,
}

impl Viewport {
    pub fn new(height: usize) -> Self {
        Self {
            selection: 0,
            scroll: 0,
            height: height.max(1),
        }
    }

    pub fn reset(&mut self) {
        self.selection = 0;
        self.scroll = 0;
    }

    pub fn set_height(&mut self, height: usize, len: usize) {
        self.height = height.max(1);
        self.clamp(len);
    }

    pub fn clamp(&mut self, len: usize) {
        self.selection = clamp_selection(self.selection, len);
        self.scroll = clamp_scroll(self.selection, self.scroll, self.height, len);
    }

    pub fn move_by(&mut self, delta: isize, len: usize) {
        if len == 0 {
            self.reset();
            return;
        }
        let max_index = len.saturating_sub(1) as isize;
        let next = (self.selection.min(len - 1) as isize + delta).clamp(0, max_index);
        self.selection = next as usize;
        self.clamp(len);
    }

    pub fn select_first(&mut self, len: usize) {
        self.selection = 0;
        self.clamp(len);
    }

    pub fn select_last(&mut self, len: usize) {
        self.selection = len.saturating_sub(1);
        self.clamp(len);
    }

    pub fn page_step(&self) -> isize {
        self.height.saturating_sub(1).max(1) as isize
    }

    pub fn range(&self, len: usize) -> Range<usize> {
        visible_range(self.scroll, self.height, len)
    }

    pub fn indicator(&self, len: usize) -> Option<String> {
        scroll_indicator(self.scroll, self.height, len)
    }
}
