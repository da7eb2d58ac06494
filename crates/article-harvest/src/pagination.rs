//! Load-more pagination: when to ask for growth and when the list is done.
//!
//! The list grows asynchronously and never reports a total, so exhaustion is
//! only ever inferred: after the cursor reaches the end, the list length is
//! re-read at a fixed interval for a bounded number of attempts.

use std::future::Future;
use std::time::Duration;

use crate::config::HarvestConfig;
use crate::types::HarvestResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationState {
    /// The list just grew (or was just loaded); a growth request is due
    /// before the next item is consumed.
    Fresh,
    /// Consuming items that are already known.
    Draining,
    /// No items left and no growth observed. Terminal.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaginationCursor {
    pub items_seen: usize,
    pub known_list_length: usize,
    /// True from the moment new items arrive until the first of them is consumed.
    pub needs_fresh_load: bool,
}

#[derive(Debug, Clone)]
pub struct PaginationController {
    cursor: PaginationCursor,
    state: PaginationState,
    growth_requested: bool,
    growth_requests: usize,
    poll_interval: Duration,
    max_attempts: u32,
}

impl PaginationController {
    pub fn new(initial_length: usize, poll_interval: Duration, max_attempts: u32) -> Self {
        Self {
            cursor: PaginationCursor {
                items_seen: 0,
                known_list_length: initial_length,
                needs_fresh_load: true,
            },
            state: PaginationState::Fresh,
            growth_requested: false,
            growth_requests: 0,
            poll_interval,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(initial_length: usize, config: &HarvestConfig) -> Self {
        Self::new(
            initial_length,
            config.growth_poll_interval,
            config.growth_poll_attempts,
        )
    }

    pub fn state(&self) -> PaginationState {
        self.state
    }

    pub fn cursor(&self) -> PaginationCursor {
        self.cursor
    }

    /// Total growth requests handed out so far.
    pub fn growth_requests(&self) -> usize {
        self.growth_requests
    }

    /// Whether the caller should request growth now. Returns `true` at most
    /// once per growth cycle.
    pub fn take_growth_request(&mut self) -> bool {
        if self.state != PaginationState::Fresh || self.growth_requested {
            return false;
        }
        self.growth_requested = true;
        self.growth_requests += 1;
        true
    }

    /// Consume the next known item, returning its index.
    pub fn next_index(&mut self) -> Option<usize> {
        if self.state == PaginationState::Exhausted || self.at_end() {
            return None;
        }
        let index = self.cursor.items_seen;
        self.cursor.items_seen += 1;
        if self.state == PaginationState::Fresh {
            self.state = PaginationState::Draining;
            self.cursor.needs_fresh_load = false;
        }
        Some(index)
    }

    /// Whether every known item has been consumed.
    pub fn at_end(&self) -> bool {
        self.cursor.items_seen >= self.cursor.known_list_length
    }

    /// Record a freshly read list length. Growth starts a new cycle.
    pub fn observe_length(&mut self, length: usize) -> PaginationState {
        if self.state != PaginationState::Exhausted && length > self.cursor.known_list_length {
            self.cursor.known_list_length = length;
            self.cursor.needs_fresh_load = true;
            self.state = PaginationState::Fresh;
            self.growth_requested = false;
        }
        self.state
    }

    /// At the end of the known list, re-read it until it grows or the attempt
    /// budget runs out. Returns the grown list, or `None` once exhausted.
    ///
    /// Errors from `requery` are not retried.
    pub async fn await_growth<T, F, Fut>(&mut self, mut requery: F) -> HarvestResult<Option<Vec<T>>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = HarvestResult<Vec<T>>>,
    {
        for attempt in 1..=self.max_attempts {
            let list = requery().await?;
            if self.observe_length(list.len()) == PaginationState::Fresh {
                tracing::debug!(
                    "list grew to {} items after {attempt} check(s)",
                    list.len()
                );
                return Ok(Some(list));
            }
            tracing::debug!(
                "no growth beyond {} items (check {attempt}/{})",
                self.cursor.known_list_length,
                self.max_attempts
            );
            if attempt < self.max_attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
        self.state = PaginationState::Exhausted;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HarvestError;

    fn controller(initial: usize, attempts: u32) -> PaginationController {
        PaginationController::new(initial, Duration::ZERO, attempts)
    }

    #[test]
    fn test_starts_fresh_with_one_growth_request() {
        let mut pager = controller(3, 2);
        assert_eq!(pager.state(), PaginationState::Fresh);
        assert!(pager.cursor().needs_fresh_load);
        assert!(pager.take_growth_request());
        assert!(!pager.take_growth_request());
        assert_eq!(pager.next_index(), Some(0));
        assert_eq!(pager.state(), PaginationState::Draining);
        assert!(!pager.cursor().needs_fresh_load);
    }

    #[test]
    fn test_no_growth_request_while_draining() {
        let mut pager = controller(5, 2);
        assert!(pager.take_growth_request());
        for expected in 0..5 {
            assert!(!pager.take_growth_request());
            assert_eq!(pager.next_index(), Some(expected));
        }
        assert!(pager.at_end());
        assert_eq!(pager.next_index(), None);
        assert_eq!(pager.growth_requests(), 1);
    }

    #[test]
    fn test_growth_opens_new_cycle() {
        let mut pager = controller(2, 2);
        pager.take_growth_request();
        pager.next_index();
        pager.next_index();
        assert_eq!(pager.observe_length(2), PaginationState::Draining);
        assert_eq!(pager.observe_length(4), PaginationState::Fresh);
        assert!(pager.cursor().needs_fresh_load);
        assert!(pager.take_growth_request());
        assert_eq!(pager.next_index(), Some(2));
        assert_eq!(pager.growth_requests(), 2);
    }

    #[tokio::test]
    async fn test_await_growth_finds_late_items() {
        let mut pager = controller(2, 5);
        pager.take_growth_request();
        pager.next_index();
        pager.next_index();

        let mut checks = 0;
        let grown = pager
            .await_growth(|| {
                checks += 1;
                let len = if checks < 3 { 2 } else { 4 };
                async move { Ok::<_, HarvestError>(vec![(); len]) }
            })
            .await
            .unwrap();
        assert_eq!(grown.map(|l| l.len()), Some(4));
        assert_eq!(checks, 3);
        assert_eq!(pager.state(), PaginationState::Fresh);
        assert_eq!(pager.cursor().known_list_length, 4);
    }

    #[tokio::test]
    async fn test_await_growth_exhausts_after_budget() {
        let mut pager = controller(1, 3);
        pager.take_growth_request();
        pager.next_index();

        let mut checks = 0;
        let grown = pager
            .await_growth(|| {
                checks += 1;
                async { Ok::<_, HarvestError>(vec![()]) }
            })
            .await
            .unwrap();
        assert!(grown.is_none());
        assert_eq!(checks, 3);
        assert_eq!(pager.state(), PaginationState::Exhausted);
        assert_eq!(pager.next_index(), None);
        assert_eq!(pager.observe_length(10), PaginationState::Exhausted);
    }

    #[tokio::test]
    async fn test_await_growth_propagates_requery_errors() {
        let mut pager = controller(0, 3);
        let result = pager
            .await_growth(|| async {
                Err::<Vec<()>, _>(HarvestError::SessionFailure {
                    cause: "tab crashed".into(),
                })
            })
            .await;
        assert!(matches!(result, Err(HarvestError::SessionFailure { .. })));
    }
}
