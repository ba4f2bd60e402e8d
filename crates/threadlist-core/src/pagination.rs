use crate::types::ConversationId;

/// Offset/count/has-more cursor for incremental page fetches.
///
/// `has_next` is authoritative only from the server and defaults to an
/// optimistic `true` before the first response. Every `prepare_for_load_more`
/// must be paired with `finish` or `abort` so no path leaves `loading`
/// permanently set.
#[derive(Debug, Clone)]
pub struct PageTracker {
    count: usize,
    offset: usize,
    has_next: bool,
    loading: bool,
    threshold_window: usize,
    threshold_ids: Vec<ConversationId>,
}

impl PageTracker {
    /// New tracker with a page size and a trailing lookahead window.
    pub fn new(count: usize, threshold_window: usize) -> Self {
        Self {
            count: count.max(1),
            offset: 0,
            has_next: true,
            loading: false,
            threshold_window: threshold_window.max(1),
            threshold_ids: Vec::new(),
        }
    }

    /// Page size used for fetches.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Current confirmed offset.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Whether the server reported more pages.
    pub fn has_next(&self) -> bool {
        self.has_next
    }

    /// Whether a fetch is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Whether a load-more triggered at `current_id` may dispatch.
    ///
    /// Rejects while a fetch is in flight, after pagination exhaustion, and
    /// when the id is outside the trailing threshold window; rapid scroll
    /// events near the middle of the list never trigger duplicate fetches.
    pub fn can_load_more(&self, current_id: ConversationId) -> bool {
        if self.loading || !self.has_next {
            return false;
        }
        self.threshold_ids.contains(&current_id)
    }

    /// Begin a load-more: advance the offset to the current collection size
    /// and mark the fetch in flight.
    pub fn prepare_for_load_more(&mut self, current_size: usize) {
        self.offset = current_size;
        self.loading = true;
    }

    /// Terminal call for a confirmed response.
    pub fn finish(&mut self, has_next_from_server: bool) {
        self.loading = false;
        self.has_next = has_next_from_server;
    }

    /// Terminal call for an error or discarded response; keeps `has_next`.
    pub fn abort(&mut self) {
        self.loading = false;
    }

    /// Zero the cursor for a refresh cycle.
    pub fn reset(&mut self) {
        self.offset = 0;
        self.has_next = true;
        self.loading = false;
        self.threshold_ids.clear();
    }

    /// Recompute the trailing lookahead window after a reconciliation pass.
    pub fn set_threshold_ids(&mut self, tail_ids: Vec<ConversationId>) {
        self.threshold_ids = tail_ids;
        self.threshold_ids
            .truncate(self.threshold_window.min(self.threshold_ids.len()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_load_more_while_in_flight() {
        let mut tracker = PageTracker::new(25, 5);
        tracker.set_threshold_ids(vec![8, 9]);
        assert!(tracker.can_load_more(9));

        tracker.prepare_for_load_more(50);
        assert!(!tracker.can_load_more(9));
        assert_eq!(tracker.offset(), 50);

        tracker.finish(true);
        assert!(tracker.can_load_more(9));
    }

    #[test]
    fn rejects_load_more_after_exhaustion() {
        let mut tracker = PageTracker::new(25, 5);
        tracker.set_threshold_ids(vec![8, 9]);
        tracker.prepare_for_load_more(25);
        tracker.finish(false);

        assert!(!tracker.can_load_more(9));
    }

    #[test]
    fn rejects_ids_outside_threshold_window() {
        let mut tracker = PageTracker::new(25, 2);
        tracker.set_threshold_ids(vec![8, 9]);

        assert!(!tracker.can_load_more(1));
        assert!(tracker.can_load_more(8));
    }

    #[test]
    fn abort_releases_loading_without_touching_has_next() {
        let mut tracker = PageTracker::new(25, 5);
        tracker.prepare_for_load_more(25);
        tracker.abort();

        assert!(!tracker.is_loading());
        assert!(tracker.has_next());
    }

    #[test]
    fn reset_restores_optimistic_defaults() {
        let mut tracker = PageTracker::new(25, 5);
        tracker.set_threshold_ids(vec![1]);
        tracker.prepare_for_load_more(25);
        tracker.finish(false);

        tracker.reset();
        assert_eq!(tracker.offset(), 0);
        assert!(tracker.has_next());
        assert!(!tracker.is_loading());
        assert!(!tracker.can_load_more(1));
    }
}
