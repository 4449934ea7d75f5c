//! Session state: the active collection, the age threshold, and the
//! load-cycle bookkeeping that keeps a slow, superseded load from
//! overwriting a newer one.

use tracing::{info, warn};

use crate::catalog::{CatalogTransport, FetchProgress};
use crate::error::{QuakeError, Result};
use crate::fallback::{DataOrigin, FallbackController, LoadedCollection, TabularSource};
use crate::filter::filter_by_age;
use crate::record::EventRecord;

/// Identifies one load cycle. Tokens only ever increase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadToken(u64);

/// What a total load failure does to a previously active collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    #[default]
    RetainPrevious,
    Clear,
}

/// Outcome of handing a load result to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Applied { origin: DataOrigin, records: usize },
    /// A newer load was issued after this one; the result was ignored.
    Stale,
}

/// Consumer of the active collection and of filtered views.
pub trait EventView {
    /// The full collection was replaced.
    fn replace_events(&mut self, records: &[EventRecord]);
    /// A filtered view was recomputed for `threshold_years`.
    fn show_filtered(&mut self, threshold_years: i32, visible: &[&EventRecord]);
}

#[derive(Debug)]
pub struct Session {
    active: Option<LoadedCollection>,
    threshold_years: i32,
    failure_policy: FailurePolicy,
    issued: u64,
}

impl Session {
    pub fn new(threshold_years: i32, failure_policy: FailurePolicy) -> Self {
        Self {
            active: None,
            threshold_years,
            failure_policy,
            issued: 0,
        }
    }

    pub fn records(&self) -> &[EventRecord] {
        match &self.active {
            Some(c) => &c.records,
            None => &[],
        }
    }

    pub fn origin(&self) -> Option<DataOrigin> {
        self.active.as_ref().map(|c| c.origin)
    }

    pub fn has_collection(&self) -> bool {
        self.active.is_some()
    }

    pub fn threshold_years(&self) -> i32 {
        self.threshold_years
    }

    pub fn set_threshold(&mut self, years: i32) {
        self.threshold_years = years;
    }

    /// The view for the current threshold, always recomputed from the full
    /// collection.
    pub fn visible(&self) -> Vec<&EventRecord> {
        filter_by_age(self.records(), self.threshold_years)
    }

    /// Start a load cycle. Only the most recently issued token may update
    /// the session.
    pub fn begin_load(&mut self) -> LoadToken {
        self.issued += 1;
        LoadToken(self.issued)
    }

    pub fn is_current(&self, token: LoadToken) -> bool {
        token.0 == self.issued
    }

    /// Apply the result of the load cycle identified by `token`.
    ///
    /// Stale results are dropped whatever they contain. A current failure
    /// is returned after [`FailurePolicy`] has been applied.
    pub fn complete_load(
        &mut self,
        token: LoadToken,
        result: Result<LoadedCollection>,
    ) -> Result<LoadStatus> {
        if !self.is_current(token) {
            warn!(token = token.0, latest = self.issued, ok = result.is_ok(), "discarding stale load result");
            return Ok(LoadStatus::Stale);
        }

        match result {
            Ok(loaded) => {
                let status = LoadStatus::Applied {
                    origin: loaded.origin,
                    records: loaded.records.len(),
                };
                self.active = Some(loaded);
                Ok(status)
            }
            Err(err) => {
                if self.failure_policy == FailurePolicy::Clear {
                    self.active = None;
                }
                warn!(
                    error = %err,
                    policy = ?self.failure_policy,
                    retained = self.active.is_some(),
                    "load cycle failed"
                );
                Err(err)
            }
        }
    }

    /// Run a complete load cycle in place.
    pub fn refresh<T, S>(
        &mut self,
        controller: &FallbackController<T, S>,
        on_progress: &mut dyn FnMut(FetchProgress),
    ) -> Result<LoadStatus>
    where
        T: CatalogTransport,
        S: TabularSource,
    {
        let token = self.begin_load();
        info!(token = token.0, "refresh requested");
        let result = controller.load(on_progress);
        self.complete_load(token, result)
    }

    /// Push the full collection and the current filtered view to `view`.
    pub fn render(&self, view: &mut dyn EventView) -> Result<()> {
        if self.active.is_none() {
            return Err(QuakeError::NoCollection);
        }
        view.replace_events(self.records());
        view.show_filtered(self.threshold_years, &self.visible());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::thread;

    use super::*;
    use crate::catalog::tests::{quakes, FakeTransport};
    use crate::catalog::Catalog;
    use crate::fallback::tests::{now, StaticText, FALLBACK_CSV};
    use crate::fallback::LoadParams;
    use crate::region::PACIFIC_WEST;

    fn loaded(origin: DataOrigin, ages: &[i32]) -> LoadedCollection {
        let records = ages
            .iter()
            .map(|&age_years| EventRecord {
                latitude: 1.0,
                longitude: 2.0,
                magnitude: 6.0,
                depth_km: 0.0,
                place: format!("age {age_years}"),
                occurred_at: now(),
                age_years,
                source_id: None,
                detail_url: None,
            })
            .collect();
        LoadedCollection { origin, records, dropped: 0 }
    }

    fn failure() -> QuakeError {
        QuakeError::AllSourcesFailed {
            remote: "down".into(),
            fallback: Box::new(QuakeError::Payload("empty".into())),
        }
    }

    #[derive(Default)]
    struct Recorder {
        replaced: usize,
        shown: Vec<(i32, usize)>,
    }

    impl EventView for Recorder {
        fn replace_events(&mut self, records: &[EventRecord]) {
            self.replaced = records.len();
        }

        fn show_filtered(&mut self, threshold_years: i32, visible: &[&EventRecord]) {
            self.shown.push((threshold_years, visible.len()));
        }
    }

    #[test]
    fn current_load_replaces_collection() {
        let mut session = Session::new(200, FailurePolicy::RetainPrevious);
        let first = session.begin_load();
        session.complete_load(first, Ok(loaded(DataOrigin::Remote, &[1, 2, 3]))).unwrap();
        let second = session.begin_load();
        let status = session.complete_load(second, Ok(loaded(DataOrigin::Fallback, &[4]))).unwrap();

        assert_eq!(status, LoadStatus::Applied { origin: DataOrigin::Fallback, records: 1 });
        assert_eq!(session.records().len(), 1);
        assert_eq!(session.origin(), Some(DataOrigin::Fallback));
    }

    #[test]
    fn slower_superseded_load_is_discarded() {
        let mut session = Session::new(200, FailurePolicy::RetainPrevious);
        let older = session.begin_load();
        let newer = session.begin_load();

        session.complete_load(newer, Ok(loaded(DataOrigin::Remote, &[1, 2]))).unwrap();
        let status = session.complete_load(older, Ok(loaded(DataOrigin::Fallback, &[9]))).unwrap();

        assert_eq!(status, LoadStatus::Stale);
        assert_eq!(session.origin(), Some(DataOrigin::Remote));
        assert_eq!(session.records().len(), 2);
    }

    #[test]
    fn stale_failure_does_not_clear() {
        let mut session = Session::new(200, FailurePolicy::Clear);
        let older = session.begin_load();
        let newer = session.begin_load();
        session.complete_load(newer, Ok(loaded(DataOrigin::Remote, &[1]))).unwrap();

        assert_eq!(session.complete_load(older, Err(failure())).unwrap(), LoadStatus::Stale);
        assert!(session.has_collection());
    }

    #[test]
    fn total_failure_retains_previous_collection() {
        let mut session = Session::new(200, FailurePolicy::RetainPrevious);
        let first = session.begin_load();
        session.complete_load(first, Ok(loaded(DataOrigin::Remote, &[1, 2]))).unwrap();

        let second = session.begin_load();
        assert!(session.complete_load(second, Err(failure())).is_err());
        assert_eq!(session.records().len(), 2);
    }

    #[test]
    fn total_failure_clears_when_configured() {
        let mut session = Session::new(200, FailurePolicy::Clear);
        let first = session.begin_load();
        session.complete_load(first, Ok(loaded(DataOrigin::Remote, &[1, 2]))).unwrap();

        let second = session.begin_load();
        assert!(session.complete_load(second, Err(failure())).is_err());
        assert!(!session.has_collection());
        assert!(session.records().is_empty());
    }

    #[test]
    fn threshold_changes_refilter_the_full_collection() {
        let mut session = Session::new(200, FailurePolicy::default());
        let token = session.begin_load();
        session.complete_load(token, Ok(loaded(DataOrigin::Remote, &[5, 50, 150]))).unwrap();

        session.set_threshold(10);
        assert_eq!(session.visible().len(), 1);
        session.set_threshold(100);
        assert_eq!(session.visible().len(), 2);
        assert_eq!(session.records().len(), 3);
    }

    #[test]
    fn render_feeds_the_view() {
        let mut session = Session::new(60, FailurePolicy::default());
        let mut view = Recorder::default();
        assert!(session.render(&mut view).is_err());

        let token = session.begin_load();
        session.complete_load(token, Ok(loaded(DataOrigin::Remote, &[5, 50, 150]))).unwrap();
        session.render(&mut view).unwrap();

        assert_eq!(view.replaced, 3);
        assert_eq!(view.shown, vec![(60, 2)]);
    }

    #[test]
    fn refresh_runs_a_full_cycle() {
        let transport = FakeTransport::default().failing("pacific-west", 1, 500);
        let controller = FallbackController::new(
            Catalog::new(transport, 10, vec![PACIFIC_WEST]),
            StaticText::new(FALLBACK_CSV),
            LoadParams::default(),
        );
        let mut session = Session::new(200, FailurePolicy::default());

        let status = session.refresh(&controller, &mut |_| {}).unwrap();

        assert_eq!(status, LoadStatus::Applied { origin: DataOrigin::Fallback, records: 2 });
    }

    #[test]
    fn refresh_prefers_remote_events() {
        let transport = FakeTransport::default().page("pacific-west", 1, quakes(4, 150.0));
        let controller = FallbackController::new(
            Catalog::new(transport, 10, vec![PACIFIC_WEST]),
            StaticText::missing(),
            LoadParams::default(),
        );
        let mut session = Session::new(200, FailurePolicy::default());

        session.refresh(&controller, &mut |_| {}).unwrap();

        assert_eq!(session.origin(), Some(DataOrigin::Remote));
        assert_eq!(session.records().len(), 4);
    }

    #[test]
    fn shared_session_keeps_latest_issued_result() {
        let session = Arc::new(Mutex::new(Session::new(200, FailurePolicy::default())));
        let older = session.lock().unwrap().begin_load();
        let newer = session.lock().unwrap().begin_load();

        let fast = {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                session
                    .lock()
                    .unwrap()
                    .complete_load(newer, Ok(loaded(DataOrigin::Remote, &[1])))
                    .unwrap()
            })
        };
        assert!(matches!(fast.join().unwrap(), LoadStatus::Applied { .. }));

        let slow = {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                session
                    .lock()
                    .unwrap()
                    .complete_load(older, Ok(loaded(DataOrigin::Fallback, &[1, 2, 3])))
                    .unwrap()
            })
        };
        assert_eq!(slow.join().unwrap(), LoadStatus::Stale);
        assert_eq!(session.lock().unwrap().origin(), Some(DataOrigin::Remote));
    }
}
