//! Submissions Table: a local mirror of the `resumes` collection.
//!
//! A mounted table runs one sync task: it subscribes to the change feed, performs the
//! initial full load, then reloads on every refresh signal and merges change events by
//! id. Events that arrive during a load wait in the subscription and are applied after
//! the load result, so a row is never duplicated or resurrected.
//!
//! State is published through a `watch` channel; observers call `subscribe()`.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::resume::{ChangeEvent, ResumeRecord};
use crate::store::{RemoteStore, StoreError, Subscription};
use crate::vault::notify::Notifier;

pub const EMPTY_MESSAGE: &str = "No resumes have been submitted yet.";
pub const LOADING_MESSAGE: &str = "Loading resumes...";
pub const PREVIEW_TITLE: &str = "Resume Preview";

/// e.g. "Aug 15, 2023, 02:30 PM"
const DATE_FORMAT: &str = "%b %-d, %Y, %I:%M %p";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Loading,
    Ready,
    /// The last load failed; the list was cleared but live updates still apply.
    ErrorEmpty,
}

/// Records ordered by `created_at` descending, unique by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeList {
    rows: Vec<ResumeRecord>,
}

impl ResumeList {
    pub fn from_rows(rows: Vec<ResumeRecord>) -> Self {
        let mut list = Self::default();
        for row in rows {
            list.upsert(row);
        }
        list
    }

    /// Inserts or replaces by id, keeping newest-first order.
    pub fn upsert(&mut self, record: ResumeRecord) {
        self.remove(record.id);
        let at = self
            .rows
            .partition_point(|r| r.created_at > record.created_at);
        self.rows.insert(at, record);
    }

    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.rows.len();
        self.rows.retain(|r| r.id != id);
        self.rows.len() != before
    }

    pub fn get(&self, id: Uuid) -> Option<&ResumeRecord> {
        self.rows.iter().find(|r| r.id == id)
    }

    pub fn rows(&self) -> &[ResumeRecord] {
        &self.rows
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.rows.iter().map(|r| r.id).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableState {
    pub status: TableStatus,
    pub list: ResumeList,
    /// Completed loads, successful or not.
    pub loads: u64,
}

impl TableState {
    fn loading() -> Self {
        Self {
            status: TableStatus::Loading,
            list: ResumeList::default(),
            loads: 0,
        }
    }

    /// Idempotent: replaying an event leaves the list unchanged.
    pub fn apply(&mut self, event: ChangeEvent) {
        match event {
            ChangeEvent::Insert { record } => self.list.upsert(record),
            ChangeEvent::Delete { id } => {
                self.list.remove(id);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub submitted: String,
    pub created_at: DateTime<Utc>,
    pub resume_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TableView {
    Loading { message: &'static str },
    Empty { message: &'static str },
    Rows { rows: Vec<RowView> },
}

/// Embedded viewer for a stored resume plus the URL to open it in a new tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub title: &'static str,
    pub embed_url: String,
    pub open_url: String,
}

pub fn format_created_at(created_at: DateTime<Utc>, offset: &FixedOffset) -> String {
    created_at
        .with_timezone(offset)
        .format(DATE_FORMAT)
        .to_string()
}

pub struct SubmissionsTable {
    store: Arc<dyn RemoteStore>,
    notifier: Notifier,
    state: Arc<watch::Sender<TableState>>,
    sync: JoinHandle<()>,
}

impl SubmissionsTable {
    /// Starts the sync task. `refresh` is the external reload signal; every change to it
    /// triggers a full load.
    pub fn mount(
        store: Arc<dyn RemoteStore>,
        notifier: Notifier,
        mut refresh: watch::Receiver<u64>,
    ) -> Self {
        refresh.borrow_and_update();
        let (tx, _) = watch::channel(TableState::loading());
        let state = Arc::new(tx);
        let sync = tokio::spawn(run_sync(
            store.clone(),
            notifier.clone(),
            state.clone(),
            refresh,
        ));
        Self {
            store,
            notifier,
            state,
            sync,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TableState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> TableState {
        self.state.borrow().clone()
    }

    pub fn view(&self, offset: &FixedOffset) -> TableView {
        let state = self.state.borrow();
        match state.status {
            TableStatus::Loading => TableView::Loading {
                message: LOADING_MESSAGE,
            },
            _ if state.list.is_empty() => TableView::Empty {
                message: EMPTY_MESSAGE,
            },
            _ => TableView::Rows {
                rows: state
                    .list
                    .rows()
                    .iter()
                    .map(|r| RowView {
                        id: r.id,
                        name: r.name.clone(),
                        email: r.email.clone(),
                        phone: r.phone.clone(),
                        submitted: format_created_at(r.created_at, offset),
                        created_at: r.created_at,
                        resume_url: r.resume_url.clone(),
                    })
                    .collect(),
            },
        }
    }

    /// Opens the preview for a visible row. No copy of the file is made.
    pub fn preview(&self, id: Uuid) -> Option<Preview> {
        let state = self.state.borrow();
        state.list.get(id).map(|r| Preview {
            title: PREVIEW_TITLE,
            embed_url: r.resume_url.clone(),
            open_url: r.resume_url.clone(),
        })
    }

    /// First step of a delete: returns a confirmation for a visible row. Nothing is sent
    /// to the store until the confirmation is confirmed.
    pub fn request_delete(&self, id: Uuid) -> Option<DeleteConfirmation> {
        if self.state.borrow().list.get(id).is_none() {
            return None;
        }
        Some(DeleteConfirmation {
            id,
            store: self.store.clone(),
            notifier: self.notifier.clone(),
        })
    }

    /// Stops the sync task, which cancels the change subscription.
    pub fn unmount(self) {
        drop(self);
    }
}

impl Drop for SubmissionsTable {
    fn drop(&mut self) {
        self.sync.abort();
    }
}

/// A pending delete awaiting the user's decision.
#[must_use = "a delete request does nothing until confirmed"]
pub struct DeleteConfirmation {
    id: Uuid,
    store: Arc<dyn RemoteStore>,
    notifier: Notifier,
}

impl DeleteConfirmation {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancel(self) {}

    /// Issues the delete. The row is not removed locally; the change feed removes it.
    pub async fn confirm(self) -> Result<(), StoreError> {
        match self.store.delete_resume_record(self.id).await {
            Ok(()) => {
                self.notifier.success(
                    "Resume deleted",
                    "The resume has been permanently removed.",
                );
                Ok(())
            }
            Err(e) => {
                error!("Error deleting resume {}: {e}", self.id);
                self.notifier
                    .failure("Delete failed", "There was an error deleting the resume.");
                Err(e)
            }
        }
    }
}

async fn run_sync(
    store: Arc<dyn RemoteStore>,
    notifier: Notifier,
    state: Arc<watch::Sender<TableState>>,
    mut refresh: watch::Receiver<u64>,
) {
    // Subscribe before the first load so nothing between the two is missed.
    let mut subscription = match store.subscribe_resume_changes().await {
        Ok(sub) => Some(sub),
        Err(e) => {
            warn!("Live updates unavailable, list refreshes on reload only: {e}");
            None
        }
    };

    load(store.as_ref(), &notifier, &state).await;

    let mut refresh_open = true;
    loop {
        tokio::select! {
            // A pending reload goes first so the events it supersedes are discarded.
            biased;

            changed = refresh.changed(), if refresh_open => {
                if changed.is_err() {
                    refresh_open = false;
                    continue;
                }
                // Events buffered so far predate the snapshot about to be taken. Events
                // arriving during the load still queue and are applied after it.
                if let Some(sub) = subscription.as_mut() {
                    let stale = sub.discard_pending();
                    if stale > 0 {
                        debug!("Discarded {stale} change events superseded by reload");
                    }
                }
                load(store.as_ref(), &notifier, &state).await;
            }
            event = next_event(&mut subscription) => match event {
                Some(event) => {
                    debug!(id = %event.id(), "applying change event");
                    state.send_modify(|s| s.apply(event));
                }
                None => {
                    warn!("Change feed closed, list refreshes on reload only");
                    subscription = None;
                }
            },
        }
    }
}

async fn next_event(subscription: &mut Option<Subscription>) -> Option<ChangeEvent> {
    match subscription {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}

async fn load(store: &dyn RemoteStore, notifier: &Notifier, state: &watch::Sender<TableState>) {
    state.send_modify(|s| s.status = TableStatus::Loading);

    match store.list_resume_records().await {
        Ok(rows) => {
            info!("Loaded {} resumes", rows.len());
            state.send_modify(|s| {
                s.list = ResumeList::from_rows(rows);
                s.status = TableStatus::Ready;
                s.loads += 1;
            });
        }
        Err(e) => {
            error!("Error fetching resumes: {e}");
            notifier.failure("Failed to load resumes", "Please try refreshing the page.");
            state.send_modify(|s| {
                s.list = ResumeList::default();
                s.status = TableStatus::ErrorEmpty;
                s.loads += 1;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;

    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::models::resume::NewResumeRecord;
    use crate::store::memory::{MemoryStore, Operation};
    use crate::vault::picker::CandidateFile;

    /// Memory-backed store whose change feed is fed by the test itself.
    struct ScriptedFeed {
        inner: Arc<MemoryStore>,
        events: Mutex<Option<mpsc::Receiver<ChangeEvent>>>,
    }

    #[async_trait]
    impl RemoteStore for ScriptedFeed {
        async fn insert_resume_record(
            &self,
            fields: NewResumeRecord,
        ) -> Result<ResumeRecord, StoreError> {
            self.inner.insert_resume_record(fields).await
        }

        async fn list_resume_records(&self) -> Result<Vec<ResumeRecord>, StoreError> {
            self.inner.list_resume_records().await
        }

        async fn delete_resume_record(&self, id: Uuid) -> Result<(), StoreError> {
            self.inner.delete_resume_record(id).await
        }

        async fn subscribe_resume_changes(&self) -> Result<Subscription, StoreError> {
            let events = self
                .events
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| StoreError::Unavailable("feed already taken".to_string()))?;
            let feed = tokio::spawn(std::future::pending::<()>());
            Ok(Subscription::new(events, feed.abort_handle()))
        }

        async fn upload_blob(&self, file: &CandidateFile) -> Result<String, StoreError> {
            self.inner.upload_blob(file).await
        }

        async fn delete_blob(&self, url: &str) -> Result<(), StoreError> {
            self.inner.delete_blob(url).await
        }
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 8, 15, hour, minute, 0).unwrap()
    }

    fn record(name: &str, created_at: DateTime<Utc>) -> ResumeRecord {
        ResumeRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{name}@example.com"),
            phone: "(555) 123-4567".to_string(),
            resume_url: format!("https://files.example/{name}.pdf"),
            created_at,
        }
    }

    fn fields(name: &str) -> NewResumeRecord {
        NewResumeRecord {
            name: name.to_string(),
            email: format!("{name}@example.com"),
            phone: "555-0000".to_string(),
            resume_url: format!("https://files.example/{name}.pdf"),
        }
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    async fn wait_until(
        rx: &mut watch::Receiver<TableState>,
        f: impl FnMut(&TableState) -> bool,
    ) -> TableState {
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(f))
            .await
            .expect("timed out waiting for table state")
            .expect("table dropped")
            .clone()
    }

    fn mount(store: Arc<MemoryStore>) -> (SubmissionsTable, watch::Sender<u64>, Notifier) {
        let (refresh_tx, refresh_rx) = watch::channel(0u64);
        let notifier = Notifier::new();
        let table = SubmissionsTable::mount(store, notifier.clone(), refresh_rx);
        (table, refresh_tx, notifier)
    }

    #[test]
    fn test_from_rows_sorts_newest_first_and_dedupes() {
        let one = record("one", at(9, 0));
        let three = record("three", at(11, 0));
        let two = record("two", at(10, 0));
        let list = ResumeList::from_rows(vec![one.clone(), three.clone(), two.clone(), one.clone()]);
        assert_eq!(list.ids(), vec![three.id, two.id, one.id]);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut list = ResumeList::default();
        let r = record("a", at(9, 0));
        list.upsert(r.clone());
        list.upsert(r.clone());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_out_of_order_insert_keeps_descending_order() {
        let mut list = ResumeList::from_rows(vec![record("new", at(12, 0)), record("old", at(8, 0))]);
        let middle = record("middle", at(10, 0));
        list.upsert(middle.clone());
        assert_eq!(list.rows()[1].id, middle.id);
        assert!(list
            .rows()
            .windows(2)
            .all(|w| w[0].created_at >= w[1].created_at));
    }

    #[test]
    fn test_delete_event_removes_only_matching_row() {
        let three = record("3", at(11, 0));
        let one = record("1", at(9, 0));
        let mut state = TableState {
            status: TableStatus::Ready,
            list: ResumeList::from_rows(vec![one.clone(), three.clone()]),
            loads: 1,
        };
        assert_eq!(state.list.ids(), vec![three.id, one.id]);

        state.apply(ChangeEvent::Delete { id: one.id });
        assert_eq!(state.list.ids(), vec![three.id]);

        // Replayed or unknown deletes are no-ops.
        state.apply(ChangeEvent::Delete { id: one.id });
        state.apply(ChangeEvent::Delete { id: Uuid::new_v4() });
        assert_eq!(state.list.ids(), vec![three.id]);
    }

    #[test]
    fn test_format_created_at() {
        let created = Utc.with_ymd_and_hms(2023, 8, 15, 14, 30, 0).unwrap();
        assert_eq!(format_created_at(created, &utc()), "Aug 15, 2023, 02:30 PM");

        let pacific = FixedOffset::west_opt(7 * 3600).unwrap();
        assert_eq!(format_created_at(created, &pacific), "Aug 15, 2023, 07:30 AM");
    }

    #[tokio::test]
    async fn test_load_renders_newest_first() {
        let store = Arc::new(MemoryStore::new());
        let three = record("3", at(11, 0));
        let one = record("1", at(9, 0));
        store.seed(vec![one.clone(), three.clone()]).await;

        let (table, _refresh, _) = mount(store.clone());
        let mut rx = table.subscribe();
        let state = wait_until(&mut rx, |s| s.status == TableStatus::Ready).await;
        assert_eq!(state.list.ids(), vec![three.id, one.id]);

        store.delete_resume_record(one.id).await.unwrap();
        let state = wait_until(&mut rx, |s| s.list.len() == 1).await;
        assert_eq!(state.list.ids(), vec![three.id]);
    }

    #[tokio::test]
    async fn test_empty_and_loading_views() {
        let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(20)));
        let (table, _refresh, _) = mount(store);
        assert_eq!(
            table.view(&utc()),
            TableView::Loading {
                message: LOADING_MESSAGE
            }
        );

        let mut rx = table.subscribe();
        wait_until(&mut rx, |s| s.status == TableStatus::Ready).await;
        assert_eq!(
            table.view(&utc()),
            TableView::Empty {
                message: EMPTY_MESSAGE
            }
        );
    }

    #[tokio::test]
    async fn test_failed_load_is_empty_but_still_live() {
        let store = Arc::new(MemoryStore::new());
        store.seed(vec![record("hidden", at(9, 0))]).await;
        store.set_failing(Operation::List, true);

        let (table, _refresh, notifier) = mount(store.clone());
        let mut rx = table.subscribe();
        let state = wait_until(&mut rx, |s| s.status == TableStatus::ErrorEmpty).await;
        assert!(state.list.is_empty());
        assert_eq!(notifier.titles(), vec!["Failed to load resumes".to_string()]);
        assert!(matches!(table.view(&utc()), TableView::Empty { .. }));

        let inserted = store.insert_resume_record(fields("live")).await.unwrap();
        let state = wait_until(&mut rx, |s| !s.list.is_empty()).await;
        assert_eq!(state.list.ids(), vec![inserted.id]);
    }

    #[tokio::test]
    async fn test_insert_during_load_appears_once() {
        let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(10)));
        let (table, _refresh, _) = mount(store.clone());
        let inserted = store.insert_resume_record(fields("racer")).await.unwrap();

        let mut rx = table.subscribe();
        wait_until(&mut rx, |s| {
            s.status == TableStatus::Ready && s.list.get(inserted.id).is_some()
        })
        .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(table.snapshot().list.ids(), vec![inserted.id]);
    }

    #[tokio::test]
    async fn test_refresh_reloads_without_duplicates() {
        let store = Arc::new(MemoryStore::new());
        let (table, refresh, _) = mount(store.clone());
        let mut rx = table.subscribe();
        wait_until(&mut rx, |s| s.loads == 1).await;

        let inserted = store.insert_resume_record(fields("ada")).await.unwrap();
        wait_until(&mut rx, |s| s.list.len() == 1).await;

        refresh.send_modify(|n| *n += 1);
        let state = wait_until(&mut rx, |s| s.loads == 2 && s.status == TableStatus::Ready).await;
        assert_eq!(state.list.ids(), vec![inserted.id]);
        assert_eq!(store.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_reload_discards_events_it_supersedes() {
        let memory = Arc::new(MemoryStore::new());
        let (feed, events) = mpsc::channel(8);
        let store = Arc::new(ScriptedFeed {
            inner: memory.clone(),
            events: Mutex::new(Some(events)),
        });
        let (refresh, refresh_rx) = watch::channel(0u64);
        let table = SubmissionsTable::mount(store, Notifier::new(), refresh_rx);
        let mut rx = table.subscribe();
        wait_until(&mut rx, |s| s.loads == 1).await;

        // Insert seen by a poll taken before the row was deleted, queued behind a reload.
        let stale = record("stale", at(9, 0));
        feed.send(ChangeEvent::Insert {
            record: stale.clone(),
        })
        .await
        .unwrap();
        refresh.send_modify(|n| *n += 1);
        let state = wait_until(&mut rx, |s| s.loads == 2).await;
        assert!(state.list.is_empty());

        let fresh = memory.insert_resume_record(fields("fresh")).await.unwrap();
        feed.send(ChangeEvent::Insert {
            record: fresh.clone(),
        })
        .await
        .unwrap();
        let state = wait_until(&mut rx, |s| s.list.get(fresh.id).is_some()).await;
        assert_eq!(state.list.ids(), vec![fresh.id]);
        assert!(table.snapshot().list.get(stale.id).is_none());
    }

    #[tokio::test]
    async fn test_confirmed_delete_removes_via_change_feed() {
        let store = Arc::new(MemoryStore::new());
        let keep = record("keep", at(11, 0));
        let gone = record("gone", at(9, 0));
        store.seed(vec![keep.clone(), gone.clone()]).await;

        let (table, _refresh, notifier) = mount(store.clone());
        let mut rx = table.subscribe();
        wait_until(&mut rx, |s| s.status == TableStatus::Ready).await;

        let confirmation = table.request_delete(gone.id).expect("row is visible");
        assert_eq!(confirmation.id(), gone.id);
        confirmation.confirm().await.unwrap();

        let state = wait_until(&mut rx, |s| s.list.len() == 1).await;
        assert_eq!(state.list.ids(), vec![keep.id]);
        assert_eq!(store.delete_calls(), 1);
        assert!(notifier.titles().contains(&"Resume deleted".to_string()));
    }

    #[tokio::test]
    async fn test_cancelled_delete_sends_nothing() {
        let store = Arc::new(MemoryStore::new());
        let row = record("row", at(9, 0));
        store.seed(vec![row.clone()]).await;
        let (table, _refresh, _) = mount(store.clone());
        let mut rx = table.subscribe();
        wait_until(&mut rx, |s| s.status == TableStatus::Ready).await;

        table.request_delete(row.id).unwrap().cancel();
        assert_eq!(store.delete_calls(), 0);
        assert_eq!(table.snapshot().list.len(), 1);
        assert!(table.request_delete(Uuid::new_v4()).is_none());
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_row() {
        let store = Arc::new(MemoryStore::new());
        let row = record("row", at(9, 0));
        store.seed(vec![row.clone()]).await;
        store.set_failing(Operation::Delete, true);
        let (table, _refresh, notifier) = mount(store.clone());
        let mut rx = table.subscribe();
        wait_until(&mut rx, |s| s.status == TableStatus::Ready).await;

        assert!(table.request_delete(row.id).unwrap().confirm().await.is_err());
        assert_eq!(table.snapshot().list.ids(), vec![row.id]);
        assert!(notifier.titles().contains(&"Delete failed".to_string()));
    }

    #[tokio::test]
    async fn test_without_feed_row_stays_until_reload() {
        let store = Arc::new(MemoryStore::new());
        store.set_failing(Operation::Subscribe, true);
        let row = record("row", at(9, 0));
        store.seed(vec![row.clone()]).await;

        let (table, refresh, _) = mount(store.clone());
        let mut rx = table.subscribe();
        wait_until(&mut rx, |s| s.status == TableStatus::Ready).await;

        table.request_delete(row.id).unwrap().confirm().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(table.snapshot().list.len(), 1);

        refresh.send_modify(|n| *n += 1);
        let state = wait_until(&mut rx, |s| s.loads == 2).await;
        assert!(state.list.is_empty());
    }

    #[tokio::test]
    async fn test_preview_uses_stored_url() {
        let store = Arc::new(MemoryStore::new());
        let row = record("cv", at(9, 0));
        store.seed(vec![row.clone()]).await;
        let (table, _refresh, _) = mount(store);
        let mut rx = table.subscribe();
        wait_until(&mut rx, |s| s.status == TableStatus::Ready).await;

        let preview = table.preview(row.id).unwrap();
        assert_eq!(preview.title, PREVIEW_TITLE);
        assert_eq!(preview.embed_url, "https://files.example/cv.pdf");
        assert_eq!(preview.open_url, preview.embed_url);
        assert!(table.preview(Uuid::new_v4()).is_none());

        match table.view(&utc()) {
            TableView::Rows { rows } => {
                assert_eq!(rows[0].submitted, "Aug 15, 2023, 09:00 AM");
            }
            other => panic!("expected rows, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unmount_cancels_subscription() {
        let store = Arc::new(MemoryStore::new());
        let (table, _refresh, _) = mount(store.clone());
        let mut rx = table.subscribe();
        wait_until(&mut rx, |s| s.status == TableStatus::Ready).await;
        assert_eq!(store.subscriber_count(), 1);

        table.unmount();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.subscriber_count(), 0);
    }
}
