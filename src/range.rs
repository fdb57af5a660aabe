use chrono::{Local, NaiveDate};

use crate::domain::DateRange;

/// Owns the selected query window and queues a notification for the host on
/// every accepted change.
///
/// The end date is clamped so it never precedes the start date.
pub struct DateRangeController {
    range: DateRange,
    pending: Option<DateRange>,
}

impl DateRangeController {
    /// Window for the current local calendar month.
    pub fn current_month() -> Self {
        Self::for_month_of(Local::now().date_naive())
    }

    /// The initial window is queued so the host fetches once on startup.
    pub fn for_month_of(today: NaiveDate) -> Self {
        let range = DateRange::month_of(today);
        Self {
            range,
            pending: Some(range),
        }
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    /// Moving the start past the end drags the end along.
    pub fn set_start(&mut self, start: NaiveDate) {
        let end = self.range.end.max(start);
        self.apply(DateRange::new(start, end));
    }

    /// An end before the start is pinned to the start.
    pub fn set_end(&mut self, end: NaiveDate) {
        let end = end.max(self.range.start);
        self.apply(DateRange::new(self.range.start, end));
    }

    /// Re-queues the current window, e.g. for a manual retry.
    pub fn reissue(&mut self) {
        self.pending = Some(self.range);
    }

    /// Drains the queued notification, if any.
    pub fn take_change(&mut self) -> Option<DateRange> {
        self.pending.take()
    }

    fn apply(&mut self, next: DateRange) {
        if next == self.range {
            return;
        }
        tracing::debug!(start = %next.start, end = %next.end, "date range changed");
        self.range = next;
        self.pending = Some(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("date")
    }

    #[test]
    fn defaults_to_month_and_notifies_once_at_start() {
        let mut controller = DateRangeController::for_month_of(day("2023-10-17"));
        let initial = controller.take_change().expect("initial notification");
        assert_eq!(initial, DateRange::new(day("2023-10-01"), day("2023-10-31")));
        assert!(controller.take_change().is_none());
    }

    #[test]
    fn every_change_is_queued() {
        let mut controller = DateRangeController::for_month_of(day("2023-10-17"));
        controller.take_change();
        controller.set_start(day("2023-10-05"));
        assert_eq!(
            controller.take_change(),
            Some(DateRange::new(day("2023-10-05"), day("2023-10-31")))
        );
        controller.set_end(day("2023-10-20"));
        assert_eq!(
            controller.take_change(),
            Some(DateRange::new(day("2023-10-05"), day("2023-10-20")))
        );
    }

    #[test]
    fn unchanged_selection_does_not_notify() {
        let mut controller = DateRangeController::for_month_of(day("2023-10-17"));
        controller.take_change();
        controller.set_start(day("2023-10-01"));
        assert!(controller.take_change().is_none());
    }

    #[test]
    fn inconsistent_pairs_are_clamped() {
        let mut controller = DateRangeController::for_month_of(day("2023-10-17"));
        controller.set_start(day("2023-11-10"));
        assert_eq!(
            controller.range(),
            DateRange::new(day("2023-11-10"), day("2023-11-10"))
        );
        controller.set_end(day("2023-09-01"));
        assert_eq!(
            controller.range(),
            DateRange::new(day("2023-11-10"), day("2023-11-10"))
        );
        assert!(controller.range().end >= controller.range().start);
    }

    #[test]
    fn reissue_queues_current_window() {
        let mut controller = DateRangeController::for_month_of(day("2023-10-17"));
        controller.take_change();
        controller.reissue();
        assert_eq!(controller.take_change(), Some(controller.range()));
    }
}
