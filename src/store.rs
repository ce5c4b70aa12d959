//! Client-side read cache over a [`DataService`].
//!
//! The cache is never patched locally: every successful mutation is followed
//! by a full refetch, and a failed fetch leaves the previous records in
//! place. Push notifications carry no payload and only cause a refetch;
//! [`ChangeWatcher`] produces them by polling the service.

use crate::error::Result;
use crate::filters::{FilterOptions, FilterSpec};
use crate::reports::aggregate;
use crate::service::DataService;
use crate::table::TableView;
use crate::types::{DashboardViewModel, InspectionRecord};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Wake signal from the live-update channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataChanged;

/// Result of a bulk import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The service accepted every row and the cache was reloaded.
    Persisted { count: usize },
    /// Rows are visible in the cache but the service rejected them. They
    /// disappear on the next successful refresh.
    LocalOnly { count: usize, error: String },
}

impl ImportOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, ImportOutcome::Persisted { .. })
    }
}

pub struct InspectionStore<S: DataService> {
    service: S,
    records: Vec<InspectionRecord>,
    last_error: Option<String>,
    /// Rows staged by an import the service did not accept.
    unpersisted: usize,
    changes_tx: Sender<DataChanged>,
    changes_rx: Receiver<DataChanged>,
}

/// Ascending by inspection date; undated records go last in their
/// original relative order.
fn sort_by_date(records: &mut [InspectionRecord]) {
    records.sort_by_key(|r| (r.date().is_none(), r.date()));
}

impl<S: DataService> InspectionStore<S> {
    pub fn new(service: S) -> Self {
        let (changes_tx, changes_rx) = mpsc::channel();
        Self {
            service,
            records: Vec::new(),
            last_error: None,
            unpersisted: 0,
            changes_tx,
            changes_rx,
        }
    }

    pub fn records(&self) -> &[InspectionRecord] {
        &self.records
    }

    /// Message of the last failed call, cleared by the next successful fetch.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn unpersisted(&self) -> usize {
        self.unpersisted
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Handle for the push channel; each send schedules a refetch.
    pub fn notifier(&self) -> Sender<DataChanged> {
        self.changes_tx.clone()
    }

    /// Record whose server id or inspection id is `key`.
    pub fn find(&self, key: &str) -> Option<&InspectionRecord> {
        let key = key.trim();
        self.records
            .iter()
            .find(|r| r.id.as_deref() == Some(key))
            .or_else(|| self.records.iter().find(|r| r.inspection_id.as_deref() == Some(key)))
    }

    /// Replace the cache with the service's current records.
    pub fn refresh(&mut self) -> Result<()> {
        match self.service.list() {
            Ok(mut records) => {
                sort_by_date(&mut records);
                info!(count = records.len(), "inspections refreshed");
                self.records = records;
                self.last_error = None;
                self.unpersisted = 0;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "refresh failed, keeping previous data");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn mutated(&mut self, result: Result<()>) -> Result<()> {
        if let Err(e) = result {
            warn!(error = %e, "data service rejected the change");
            self.last_error = Some(e.to_string());
            return Err(e);
        }
        // The change is durable; a failed reload only leaves the view stale.
        let _ = self.refresh();
        Ok(())
    }

    pub fn add(&mut self, record: &InspectionRecord) -> Result<()> {
        let result = self.service.create(record);
        self.mutated(result)
    }

    pub fn update(&mut self, id: &str, record: &InspectionRecord) -> Result<()> {
        let result = self.service.update(id, record);
        self.mutated(result)
    }

    pub fn delete(&mut self, id: &str) -> Result<()> {
        let result = self.service.delete(id);
        self.mutated(result)
    }

    pub fn delete_all(&mut self) -> Result<()> {
        let result = self.service.delete_all();
        self.mutated(result)
    }

    /// Show the rows immediately, then persist them in one bulk call.
    pub fn import(&mut self, records: Vec<InspectionRecord>) -> ImportOutcome {
        let count = records.len();
        let result = self.service.import_bulk(&records);
        self.records.extend(records);
        match result {
            Ok(()) => {
                let _ = self.refresh();
                ImportOutcome::Persisted { count }
            }
            Err(e) => {
                warn!(count, error = %e, "import saved locally only");
                self.unpersisted += count;
                self.last_error = Some(e.to_string());
                ImportOutcome::LocalOnly {
                    count,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Drain pending notifications and refetch once if any arrived.
    /// Returns whether a refetch was attempted.
    pub fn pump_notifications(&mut self) -> bool {
        let mut pending = 0usize;
        while self.changes_rx.try_recv().is_ok() {
            pending += 1;
        }
        if pending == 0 {
            return false;
        }
        debug!(pending, "change notifications received");
        let _ = self.refresh();
        true
    }

    /// Block up to `timeout` for a notification, then behave like
    /// [`Self::pump_notifications`].
    pub fn wait_for_change(&mut self, timeout: Duration) -> bool {
        match self.changes_rx.recv_timeout(timeout) {
            Ok(signal) => {
                let _ = self.changes_tx.send(signal);
                self.pump_notifications()
            }
            Err(_) => false,
        }
    }

    pub fn dashboard(&self, filters: &FilterSpec) -> DashboardViewModel {
        aggregate(&self.records, filters)
    }

    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions::from_records(&self.records)
    }

    pub fn table(&self) -> TableView {
        TableView::build(&self.records)
    }
}

/// Background thread that lists the service every `interval` and sends a
/// [`DataChanged`] whenever the result differs from the previous listing.
pub struct ChangeWatcher {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ChangeWatcher {
    /// The first listing is taken before this returns, so any change made
    /// afterwards is reported.
    pub fn spawn<S>(service: S, interval: Duration, notifier: Sender<DataChanged>) -> Self
    where
        S: DataService + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let mut last = service.list().ok();
        let handle = thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                thread::sleep(interval);
                if stop_flag.load(Ordering::Relaxed) {
                    break;
                }
                let current = match service.list() {
                    Ok(records) => records,
                    Err(e) => {
                        debug!(error = %e, "change poll failed");
                        continue;
                    }
                };
                if last.as_ref() == Some(&current) {
                    continue;
                }
                debug!(count = current.len(), "remote inspections changed");
                last = Some(current);
                if notifier.send(DataChanged).is_err() {
                    break;
                }
            }
        });
        info!(interval_ms = interval.as_millis() as u64, "watching for remote changes");
        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stop polling and wait for the thread to finish.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::InspectionDate;
    use chrono::NaiveDate;
    use std::cell::{Cell, RefCell};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeService {
        rows: RefCell<Vec<InspectionRecord>>,
        fail_reads: Cell<bool>,
        fail_writes: Cell<bool>,
        lists: Cell<usize>,
    }

    impl FakeService {
        fn write(&self) -> Result<()> {
            if self.fail_writes.get() {
                return Err(Error::Service {
                    endpoint: "/inspections".into(),
                    status: 500,
                });
            }
            Ok(())
        }
    }

    impl DataService for FakeService {
        fn list(&self) -> Result<Vec<InspectionRecord>> {
            self.lists.set(self.lists.get() + 1);
            if self.fail_reads.get() {
                return Err(Error::Service {
                    endpoint: "/inspections".into(),
                    status: 503,
                });
            }
            Ok(self.rows.borrow().clone())
        }
        fn create(&self, record: &InspectionRecord) -> Result<()> {
            self.write()?;
            self.rows.borrow_mut().push(record.clone());
            Ok(())
        }
        fn update(&self, id: &str, record: &InspectionRecord) -> Result<()> {
            self.write()?;
            for row in self.rows.borrow_mut().iter_mut() {
                if row.id.as_deref() == Some(id) {
                    *row = record.clone();
                }
            }
            Ok(())
        }
        fn delete(&self, id: &str) -> Result<()> {
            self.write()?;
            self.rows.borrow_mut().retain(|r| r.id.as_deref() != Some(id));
            Ok(())
        }
        fn delete_all(&self) -> Result<()> {
            self.write()?;
            self.rows.borrow_mut().clear();
            Ok(())
        }
        fn import_bulk(&self, records: &[InspectionRecord]) -> Result<()> {
            self.write()?;
            self.rows.borrow_mut().extend(records.iter().cloned());
            Ok(())
        }
    }

    fn dated(id: &str, y: i32, m: u32, d: u32) -> InspectionRecord {
        InspectionRecord {
            id: Some(id.into()),
            inspection_date: NaiveDate::from_ymd_opt(y, m, d).map(InspectionDate::Parsed),
            ..Default::default()
        }
    }

    #[test]
    fn refresh_sorts_by_date() {
        let service = FakeService::default();
        service.rows.borrow_mut().extend([
            InspectionRecord { id: Some("u".into()), ..Default::default() },
            dated("b", 2024, 3, 1),
            dated("a", 2024, 1, 5),
        ]);
        let mut store = InspectionStore::new(service);
        store.refresh().unwrap();
        let ids: Vec<_> = store.records().iter().map(|r| r.id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "u"]);
    }

    #[test]
    fn failed_refresh_keeps_previous_data() {
        let service = FakeService::default();
        service.rows.borrow_mut().push(dated("a", 2024, 1, 5));
        let mut store = InspectionStore::new(service);
        store.refresh().unwrap();
        store.service().fail_reads.set(true);
        assert!(store.refresh().is_err());
        assert_eq!(store.records().len(), 1);
        assert!(store.last_error().is_some());
    }

    #[test]
    fn mutations_refetch() {
        let mut store = InspectionStore::new(FakeService::default());
        store.add(&dated("a", 2024, 1, 5)).unwrap();
        store.add(&dated("b", 2024, 2, 5)).unwrap();
        assert_eq!(store.records().len(), 2);
        store.delete("a").unwrap();
        assert_eq!(store.records().len(), 1);
        store.delete_all().unwrap();
        assert!(store.records().is_empty());
        assert_eq!(store.service().lists.get(), 4);
    }

    #[test]
    fn rejected_import_stays_local() {
        let mut store = InspectionStore::new(FakeService::default());
        store.service().fail_writes.set(true);
        let outcome = store.import(vec![dated("a", 2024, 1, 5), dated("b", 2024, 1, 6)]);
        assert!(matches!(outcome, ImportOutcome::LocalOnly { count: 2, .. }));
        assert_eq!(store.records().len(), 2);
        assert_eq!(store.unpersisted(), 2);

        store.service().fail_writes.set(false);
        store.refresh().unwrap();
        assert!(store.records().is_empty());
        assert_eq!(store.unpersisted(), 0);
    }

    #[test]
    fn notification_burst_refetches_once() {
        let mut store = InspectionStore::new(FakeService::default());
        let tx = store.notifier();
        for _ in 0..5 {
            tx.send(DataChanged).unwrap();
        }
        assert!(store.pump_notifications());
        assert!(!store.pump_notifications());
        assert_eq!(store.service().lists.get(), 1);
    }

    #[test]
    fn wait_for_change_wakes_on_signal() {
        let mut store = InspectionStore::new(FakeService::default());
        let tx = store.notifier();
        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            tx.send(DataChanged).unwrap();
        });
        assert!(store.wait_for_change(Duration::from_secs(5)));
        sender.join().unwrap();
        assert_eq!(store.service().lists.get(), 1);
        assert!(!store.wait_for_change(Duration::from_millis(10)));
    }

    #[test]
    fn find_by_server_or_inspection_id() {
        let mut store = InspectionStore::new(FakeService::default());
        let mut record = dated("a1", 2024, 1, 5);
        record.inspection_id = Some("INS-9".into());
        store.add(&record).unwrap();
        assert_eq!(store.find("a1").and_then(|r| r.inspection_id.as_deref()), Some("INS-9"));
        assert_eq!(store.find(" INS-9 ").and_then(|r| r.id.as_deref()), Some("a1"));
        assert!(store.find("nope").is_none());
    }

    /// Shareable across threads, unlike `FakeService`.
    #[derive(Clone, Default)]
    struct SharedService(Arc<Mutex<Vec<InspectionRecord>>>);

    impl DataService for SharedService {
        fn list(&self) -> Result<Vec<InspectionRecord>> {
            Ok(self.0.lock().unwrap().clone())
        }
        fn create(&self, record: &InspectionRecord) -> Result<()> {
            self.0.lock().unwrap().push(record.clone());
            Ok(())
        }
        fn update(&self, _id: &str, _record: &InspectionRecord) -> Result<()> {
            Ok(())
        }
        fn delete(&self, _id: &str) -> Result<()> {
            Ok(())
        }
        fn delete_all(&self) -> Result<()> {
            self.0.lock().unwrap().clear();
            Ok(())
        }
        fn import_bulk(&self, records: &[InspectionRecord]) -> Result<()> {
            self.0.lock().unwrap().extend(records.iter().cloned());
            Ok(())
        }
    }

    #[test]
    fn watcher_reports_remote_changes() {
        let remote = SharedService::default();
        let mut store = InspectionStore::new(remote.clone());
        let watcher = ChangeWatcher::spawn(remote.clone(), Duration::from_millis(10), store.notifier());

        remote.create(&dated("x", 2024, 4, 1)).unwrap();
        assert!(store.wait_for_change(Duration::from_secs(5)));
        assert_eq!(store.records().len(), 1);
        watcher.stop();
    }

    #[test]
    fn watcher_is_quiet_without_changes() {
        let remote = SharedService::default();
        let mut store = InspectionStore::new(remote.clone());
        let watcher = ChangeWatcher::spawn(remote, Duration::from_millis(5), store.notifier());
        assert!(!store.wait_for_change(Duration::from_millis(60)));
        watcher.stop();
    }
}
