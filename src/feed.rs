use std::{
    sync::{
        Arc,
        mpsc::{self, Receiver, TryRecvError},
    },
    thread,
};

use crate::{
    domain::DateRange,
    source::{FetchError, FetchOutcome, IssueSource},
};

/// Result of one background fetch, tagged with the request that issued it.
pub struct FetchResponse {
    pub request_id: u64,
    pub range: DateRange,
    pub outcome: FetchOutcome,
}

/// Issues fetches on worker threads and hands back only the response to the
/// most recent request. Older responses are dropped whenever they arrive.
pub struct IssueFeed {
    source: Arc<dyn IssueSource>,
    latest_request: u64,
    pending: Vec<PendingFetch>,
}

impl IssueFeed {
    pub fn new(source: Arc<dyn IssueSource>) -> Self {
        Self {
            source,
            latest_request: 0,
            pending: Vec::new(),
        }
    }

    pub fn source(&self) -> &dyn IssueSource {
        self.source.as_ref()
    }

    /// Starts a fetch for `range` and returns its request id. Earlier fetches
    /// keep running but their results will be discarded.
    pub fn request(&mut self, range: DateRange) -> u64 {
        self.latest_request += 1;
        let request_id = self.latest_request;
        tracing::info!(
            request_id,
            start = %range.start,
            end = %range.end,
            source = %self.source.describe(),
            "fetching issues"
        );
        self.pending.push(PendingFetch::spawn(
            Arc::clone(&self.source),
            request_id,
            range,
        ));
        request_id
    }

    /// True while the latest request has not resolved.
    pub fn is_loading(&self) -> bool {
        self.pending
            .iter()
            .any(|job| job.request_id == self.latest_request)
    }

    /// Collects finished jobs and returns the latest request's outcome once
    /// it is available.
    pub fn poll(&mut self) -> Option<FetchOutcome> {
        let mut finished = Vec::new();
        self.pending.retain(|job| match job.try_take() {
            None => true,
            Some(response) => {
                finished.push(response);
                false
            }
        });

        let mut accepted = None;
        for response in finished {
            if let Some(outcome) = self.accept(response) {
                accepted = Some(outcome);
            }
        }
        accepted
    }

    /// Returns the outcome if `response` answers the latest request.
    pub fn accept(&self, response: FetchResponse) -> Option<FetchOutcome> {
        if response.request_id != self.latest_request {
            tracing::debug!(
                request_id = response.request_id,
                latest = self.latest_request,
                "dropping stale fetch response"
            );
            return None;
        }

        match &response.outcome {
            Ok(issues) => tracing::info!(
                request_id = response.request_id,
                start = %response.range.start,
                end = %response.range.end,
                count = issues.len(),
                "issues loaded"
            ),
            Err(err) => tracing::error!(
                request_id = response.request_id,
                error = %err,
                "issue fetch failed"
            ),
        }
        Some(response.outcome)
    }
}

struct PendingFetch {
    request_id: u64,
    range: DateRange,
    receiver: Receiver<FetchOutcome>,
}

impl PendingFetch {
    fn spawn(source: Arc<dyn IssueSource>, request_id: u64, range: DateRange) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let outcome = source.fetch_issues(Some(range));
            let _ = tx.send(outcome);
        });
        Self {
            request_id,
            range,
            receiver: rx,
        }
    }

    fn try_take(&self) -> Option<FetchResponse> {
        let outcome = match self.receiver.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(FetchError::BackgroundWorkerGone),
        };
        Some(FetchResponse {
            request_id: self.request_id,
            range: self.range,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use chrono::NaiveDate;

    use super::*;
    use crate::{domain::IssueRecord, source::FixtureSource};

    fn october() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2023, 10, 1).expect("date"),
            NaiveDate::from_ymd_opt(2023, 10, 31).expect("date"),
        )
    }

    fn wait_for(feed: &mut IssueFeed) -> FetchOutcome {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(outcome) = feed.poll() {
                return outcome;
            }
            assert!(Instant::now() < deadline, "fetch did not finish");
            thread::sleep(Duration::from_millis(5));
        }
    }

    struct FailingSource;

    impl IssueSource for FailingSource {
        fn fetch_issues(&self, _: Option<DateRange>) -> Result<Vec<IssueRecord>, FetchError> {
            Err(FetchError::MissingToken)
        }

        fn describe(&self) -> String {
            "failing".to_owned()
        }
    }

    #[test]
    fn fetch_resolves_on_worker_thread() {
        let mut feed = IssueFeed::new(Arc::new(FixtureSource));
        feed.request(october());
        assert!(feed.is_loading());
        let issues = wait_for(&mut feed).expect("issues");
        assert_eq!(issues.len(), 4);
        assert!(!feed.is_loading());
    }

    #[test]
    fn failures_reach_the_caller_typed() {
        let mut feed = IssueFeed::new(Arc::new(FailingSource));
        feed.request(october());
        let outcome = wait_for(&mut feed);
        assert!(matches!(outcome, Err(FetchError::MissingToken)));
    }

    #[test]
    fn only_latest_request_is_applied() {
        let mut feed = IssueFeed::new(Arc::new(FixtureSource));
        let first = feed.request(october());
        let second = feed.request(october());
        assert!(second > first);

        let stale = FetchResponse {
            request_id: first,
            range: october(),
            outcome: Ok(Vec::new()),
        };
        assert!(feed.accept(stale).is_none());

        let fresh = FetchResponse {
            request_id: second,
            range: october(),
            outcome: Ok(Vec::new()),
        };
        assert!(feed.accept(fresh).is_some());
    }

    #[test]
    fn overlapping_requests_yield_single_outcome() {
        let mut feed = IssueFeed::new(Arc::new(FixtureSource));
        feed.request(october());
        feed.request(october());
        let outcome = wait_for(&mut feed).expect("issues");
        assert_eq!(outcome.len(), 4);

        let deadline = Instant::now() + Duration::from_millis(200);
        while Instant::now() < deadline {
            assert!(feed.poll().is_none());
            thread::sleep(Duration::from_millis(5));
        }
    }
}
