use std::time::{Duration, SystemTime};

use tokio::time::Instant;

use crate::error::SyncError;

/// Snapshot of a poller subscription.
///
/// `is_loading` covers only the initial fetch of a lifecycle; every later
/// fetch raises `is_revalidating` instead. `is_stale` is advisory and never
/// changes `data`.
#[derive(Debug, Clone)]
pub struct FetchState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub is_revalidating: bool,
    pub error: Option<SyncError>,
    pub is_stale: bool,
    /// Monotonic time of the last successful fetch.
    pub last_updated: Option<Instant>,
    /// Wall-clock time of the last successful fetch.
    pub updated_at: Option<SystemTime>,
}

impl<T> FetchState<T> {
    pub(crate) fn new(is_loading: bool) -> Self {
        Self {
            data: None,
            is_loading,
            is_revalidating: false,
            error: None,
            is_stale: false,
            last_updated: None,
            updated_at: None,
        }
    }

    /// True while any fetch of the current lifecycle is in flight.
    pub fn is_fetching(&self) -> bool {
        self.is_loading || self.is_revalidating
    }

    /// Time since the last successful fetch.
    pub fn age(&self) -> Option<Duration> {
        self.last_updated.map(|at| at.elapsed())
    }

    pub(crate) fn apply_success(&mut self, data: T) {
        self.data = Some(data);
        self.error = None;
        self.last_updated = Some(Instant::now());
        self.updated_at = Some(SystemTime::now());
        self.is_stale = false;
    }

    pub(crate) fn apply_failure(&mut self, error: SyncError, keep_previous_data: bool) {
        self.error = Some(error);
        if !keep_previous_data {
            self.data = None;
        }
    }

    /// Recompute `is_stale`. Returns true when the flag flipped.
    ///
    /// An interval of zero means polling is off and data never goes stale.
    pub(crate) fn refresh_staleness(&mut self, interval: Duration) -> bool {
        let stale = match self.last_updated {
            Some(at) if !interval.is_zero() => at.elapsed() > interval,
            _ => false,
        };
        if stale == self.is_stale {
            return false;
        }
        self.is_stale = stale;
        true
    }
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_clears_error_and_staleness() {
        let mut state = FetchState::new(true);
        state.error = Some(SyncError::fetch("timeout"));
        state.is_stale = true;

        state.apply_success(vec![1, 2]);

        assert_eq!(state.data, Some(vec![1, 2]));
        assert!(state.error.is_none());
        assert!(!state.is_stale);
        assert!(state.last_updated.is_some());
        assert!(state.updated_at.is_some());
    }

    #[test]
    fn failure_keeps_previous_data_when_asked() {
        let mut state = FetchState::new(false);
        state.apply_success("devices");
        state.apply_failure(SyncError::fetch("502"), true);

        assert_eq!(state.data, Some("devices"));
        assert!(state.error.is_some());
    }

    #[test]
    fn failure_clears_data_otherwise() {
        let mut state = FetchState::new(false);
        state.apply_success("devices");
        state.apply_failure(SyncError::fetch("502"), false);

        assert_eq!(state.data, None);
    }

    #[tokio::test(start_paused = true)]
    async fn staleness_flips_after_interval() {
        let mut state = FetchState::new(false);
        state.apply_success(1u8);
        let interval = Duration::from_millis(1000);

        assert!(!state.refresh_staleness(interval));
        tokio::time::advance(Duration::from_millis(1000)).await;
        assert!(!state.refresh_staleness(interval));
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(state.refresh_staleness(interval));
        assert!(state.is_stale);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_never_stale() {
        let mut state = FetchState::new(false);
        state.apply_success(1u8);
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(!state.refresh_staleness(Duration::ZERO));
        assert!(!state.is_stale);
    }

    #[test]
    fn never_fetched_is_not_stale() {
        let mut state: FetchState<u8> = FetchState::default();
        assert!(!state.refresh_staleness(Duration::from_millis(1)));
    }
}
