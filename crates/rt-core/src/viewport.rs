//! Viewport window - maps a scroll position onto the rows worth rendering
//!
//! Fixed row height model: every row is `row_extent` tall, so the scrollable
//! extent is `row_count * row_extent` and the window is pure arithmetic.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Scroll and size state of one table body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportWindow {
    scroll_offset: f64,
    container_extent: f64,
    row_extent: f64,
    overscan: usize,
    row_count: usize,
}

impl ViewportWindow {
    pub fn new(container_extent: f64, row_extent: f64, overscan: usize) -> Self {
        let mut window = Self {
            scroll_offset: 0.0,
            container_extent: 0.0,
            row_extent: 1.0,
            overscan,
            row_count: 0,
        };
        window.set_row_extent(row_extent);
        window.set_container_extent(container_extent);
        window
    }

    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    pub fn container_extent(&self) -> f64 {
        self.container_extent
    }

    pub fn row_extent(&self) -> f64 {
        self.row_extent
    }

    pub fn overscan(&self) -> usize {
        self.overscan
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Height of the whole scrollable body
    pub fn total_extent(&self) -> f64 {
        self.row_count as f64 * self.row_extent
    }

    pub fn max_scroll_offset(&self) -> f64 {
        (self.total_extent() - self.container_extent).max(0.0)
    }

    /// Returns whether the offset moved
    pub fn set_scroll_offset(&mut self, offset: f64) -> bool {
        if !offset.is_finite() {
            tracing::debug!("Ignoring non-finite scroll offset {}", offset);
            return false;
        }
        let clamped = offset.clamp(0.0, self.max_scroll_offset());
        let moved = clamped != self.scroll_offset;
        self.scroll_offset = clamped;
        moved
    }

    pub fn set_container_extent(&mut self, extent: f64) {
        if !extent.is_finite() || extent < 0.0 {
            tracing::debug!("Ignoring invalid container extent {}", extent);
            return;
        }
        self.container_extent = extent;
        self.clamp_offset();
    }

    pub fn set_row_extent(&mut self, extent: f64) {
        if !extent.is_finite() || extent <= 0.0 {
            tracing::warn!("Ignoring invalid row extent {}", extent);
            return;
        }
        self.row_extent = extent;
        self.clamp_offset();
    }

    pub fn set_overscan(&mut self, overscan: usize) {
        self.overscan = overscan;
    }

    /// Called whenever the filtered/sorted view changes size
    pub fn set_row_count(&mut self, row_count: usize) {
        self.row_count = row_count;
        self.clamp_offset();
    }

    /// Back to the top
    pub fn reset(&mut self) {
        self.scroll_offset = 0.0;
    }

    fn clamp_offset(&mut self) {
        self.scroll_offset = self.scroll_offset.clamp(0.0, self.max_scroll_offset());
    }

    /// Inclusive index range that must be rendered, `None` for an empty view
    pub fn visible_range(&self) -> Option<RangeInclusive<usize>> {
        let last_index = self.row_count.checked_sub(1)?;

        let first = (self.scroll_offset / self.row_extent).floor() as usize;
        let last = ((self.scroll_offset + self.container_extent) / self.row_extent).ceil() as usize;

        let end = last.saturating_add(self.overscan).min(last_index);
        let start = first.saturating_sub(self.overscan).min(end);
        Some(start..=end)
    }

    /// Upper bound on the length of [`ViewportWindow::visible_range`],
    /// independent of the row count
    pub fn window_capacity(&self) -> usize {
        (self.container_extent / self.row_extent).ceil() as usize + 2 + 2 * self.overscan
    }
}

impl Default for ViewportWindow {
    fn default() -> Self {
        Self::new(600.0, 28.0, 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(rows: usize, container: f64, row: f64, overscan: usize) -> ViewportWindow {
        let mut w = ViewportWindow::new(container, row, overscan);
        w.set_row_count(rows);
        w
    }

    #[test]
    fn test_top_of_table() {
        let w = window(1000, 600.0, 40.0, 3);
        assert_eq!(w.visible_range(), Some(0..=18));
        assert_eq!(w.total_extent(), 40_000.0);
    }

    #[test]
    fn test_overscan_on_both_sides() {
        let mut w = window(1000, 600.0, 40.0, 3);
        w.set_scroll_offset(400.0);
        // rows 10..=25 visible, plus three either side
        assert_eq!(w.visible_range(), Some(7..=28));
    }

    #[test]
    fn test_range_clamped_to_row_count() {
        let w = window(5, 600.0, 40.0, 3);
        assert_eq!(w.visible_range(), Some(0..=4));
        assert_eq!(window(0, 600.0, 40.0, 3).visible_range(), None);
    }

    #[test]
    fn test_offset_clamped_when_rows_shrink() {
        let mut w = window(1000, 600.0, 40.0, 2);
        w.set_scroll_offset(1e9);
        assert_eq!(w.scroll_offset(), w.max_scroll_offset());

        w.set_row_count(20);
        assert_eq!(w.scroll_offset(), 200.0);
        assert_eq!(w.visible_range(), Some(3..=19));
    }

    #[test]
    fn test_invalid_extents_ignored() {
        let mut w = window(10, 600.0, 40.0, 0);
        w.set_row_extent(0.0);
        w.set_row_extent(f64::NAN);
        w.set_container_extent(-1.0);
        assert_eq!(w.row_extent(), 40.0);
        assert_eq!(w.container_extent(), 600.0);
        assert!(!w.set_scroll_offset(f64::INFINITY));
    }

    #[test]
    fn test_cost_independent_of_row_count() {
        for rows in [100, 10_000, 1_000_000] {
            let mut w = window(rows, 600.0, 40.0, 3);
            w.set_scroll_offset(w.max_scroll_offset() / 2.0 + 13.0);
            let range = w.visible_range().unwrap();
            assert!(range.end() - range.start() + 1 <= w.window_capacity());
        }
    }

    #[test]
    fn test_sweep_covers_every_row() {
        for (rows, step) in [(1, 5.0), (97, 7.3), (500, 599.0), (64, 40.0)] {
            let mut w = window(rows, 600.0, 40.0, 0);
            let mut seen = vec![false; rows];
            let mut offset = 0.0;
            loop {
                w.set_scroll_offset(offset);
                for idx in w.visible_range().unwrap() {
                    seen[idx] = true;
                }
                if offset >= w.max_scroll_offset() {
                    break;
                }
                offset += step;
            }
            assert!(seen.iter().all(|s| *s), "gap with {rows} rows, step {step}");
        }
    }
}
