// SPDX-License-Identifier: MIT OR Apache-2.0
//! Visibility window index over time-bounded spans.
//!
//! Playback advances monotonically almost always, so the index keeps a moving
//! cursor: each query admits newly started spans and drops expired ones
//! instead of rescanning everything. A query earlier than the previous one
//! (seek, rewind) re-seeks the cursor and rebuilds the active list.

/// Anything with a bounded time-of-relevance window, in milliseconds
pub trait TimeSpan {
    /// Inclusive start of the window
    fn span_start(&self) -> f64;
    /// Inclusive end of the window
    fn span_end(&self) -> f64;
}

/// Index answering "which spans contain this time" with a moving cursor
///
/// Holds `(start, end)` pairs only; callers keep ownership of the indexed
/// entities and map the returned positions back themselves.
#[derive(Debug, Clone, Default)]
pub struct VisibilityIndex {
    spans: Vec<(f64, f64)>,
    next_enter: usize,
    active: Vec<usize>,
    last_query: f64,
}

impl VisibilityIndex {
    /// Build over `items`, which must already be ordered by span start
    pub fn build<T: TimeSpan>(items: &[T]) -> Self {
        let spans: Vec<(f64, f64)> = items
            .iter()
            .map(|item| (item.span_start(), item.span_end()))
            .collect();
        debug_assert!(
            spans.windows(2).all(|w| w[0].0 <= w[1].0),
            "spans must be ordered by start time"
        );
        Self {
            spans,
            next_enter: 0,
            active: Vec::new(),
            last_query: f64::NEG_INFINITY,
        }
    }

    /// Positions (in build order) of spans whose window contains `time`
    ///
    /// Amortized O(changes) for monotonically increasing queries; a backward
    /// query costs one binary search plus a scan of the started prefix.
    pub fn active_at(&mut self, time: f64) -> &[usize] {
        if time < self.last_query {
            tracing::debug!(
                "Visibility cursor rewound from {:.1}ms to {:.1}ms",
                self.last_query,
                time
            );
            self.next_enter = self.spans.partition_point(|s| s.0 <= time);
            self.active.clear();
            self.active
                .extend((0..self.next_enter).filter(|&i| self.spans[i].1 >= time));
        } else {
            while self.next_enter < self.spans.len() && self.spans[self.next_enter].0 <= time {
                self.active.push(self.next_enter);
                self.next_enter += 1;
            }
            self.active.retain(|&i| self.spans[i].1 >= time);
        }
        self.last_query = time;
        &self.active
    }

    /// Number of indexed spans
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Whether the index holds no spans
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Span(f64, f64);

    impl TimeSpan for Span {
        fn span_start(&self) -> f64 {
            self.0
        }
        fn span_end(&self) -> f64 {
            self.1
        }
    }

    fn sample() -> VisibilityIndex {
        VisibilityIndex::build(&[Span(100.0, 200.0), Span(150.0, 300.0), Span(400.0, 500.0)])
    }

    #[test]
    fn test_active_subsets() {
        let mut index = sample();
        assert_eq!(index.active_at(160.0), &[0, 1]);
        assert_eq!(index.active_at(350.0), &[] as &[usize]);
        assert_eq!(index.active_at(450.0), &[2]);
    }

    #[test]
    fn test_window_bounds_inclusive() {
        let mut index = sample();
        assert_eq!(index.active_at(100.0), &[0]);
        assert_eq!(index.active_at(200.0), &[0, 1]);
        assert_eq!(index.active_at(300.0), &[1]);
    }

    #[test]
    fn test_forward_skip_over_spans() {
        let mut index = sample();
        // Jumping straight past the first two spans must not leave them active
        assert_eq!(index.active_at(350.0), &[] as &[usize]);
        assert_eq!(index.active_at(600.0), &[] as &[usize]);
    }

    #[test]
    fn test_backward_query_reseeks() {
        let mut index = sample();
        assert_eq!(index.active_at(450.0), &[2]);
        assert_eq!(index.active_at(160.0), &[0, 1]);
        // Forward again from the rewound cursor
        assert_eq!(index.active_at(250.0), &[1]);
        assert_eq!(index.active_at(450.0), &[2]);
    }

    #[test]
    fn test_repeated_query_is_stable() {
        let mut index = sample();
        assert_eq!(index.active_at(160.0), &[0, 1]);
        assert_eq!(index.active_at(160.0), &[0, 1]);
    }

    #[test]
    fn test_empty_index() {
        let mut index = VisibilityIndex::build(&[] as &[Span]);
        assert!(index.is_empty());
        assert_eq!(index.active_at(0.0), &[] as &[usize]);
    }
}
