use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Wall clock budget of a search, shared by the control loop and the workers.
///
/// Once the budget is spent, or the search is cancelled, [`RuntimeLimit::exceeded`] keeps
/// returning `true`.
#[derive(Debug)]
pub struct RuntimeLimit {
    start: Instant,
    limit: Option<Duration>,
    stopped: AtomicBool,
}

impl RuntimeLimit {
    pub fn new(limit: Option<Duration>) -> Self {
        Self {
            start: Instant::now(),
            limit,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    pub fn limit(&self) -> Option<Duration> {
        self.limit
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn exceeded(&self) -> bool {
        if self.stopped.load(Ordering::Relaxed) {
            return true;
        }
        if self.limit.is_some_and(|l| self.start.elapsed() >= l) {
            self.stopped.store(true, Ordering::Relaxed);
            return true;
        }
        false
    }

    /// Stops the search as if the budget were spent.
    pub fn cancel(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_budget_is_exceeded_immediately() {
        let limit = RuntimeLimit::new(Some(Duration::ZERO));
        assert!(limit.exceeded());
        assert_eq!(limit.limit(), Some(Duration::ZERO));
    }

    #[test]
    fn cancellation_sticks() {
        let limit = RuntimeLimit::unlimited();
        assert!(!limit.exceeded());
        limit.cancel();
        assert!(limit.exceeded());
        assert!(limit.exceeded());
    }
}
