#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{blob_key, RemoteStore, StoreError, Subscription, SUBSCRIPTION_BUFFER};
use crate::models::resume::{ChangeEvent, NewResumeRecord, ResumeRecord};
use crate::vault::picker::CandidateFile;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert,
    List,
    Delete,
    Subscribe,
    Upload,
    DeleteBlob,
}

/// In-process store with a broadcast change feed.
pub struct MemoryStore {
    rows: RwLock<Vec<ResumeRecord>>,
    events: broadcast::Sender<ChangeEvent>,
    last_created_at: Mutex<Option<DateTime<Utc>>>,
    failing: Mutex<HashSet<Operation>>,
    latency: Option<Duration>,
    blob_base: String,
    blobs: Mutex<HashSet<String>>,
    inserts: AtomicUsize,
    deletes: AtomicUsize,
    lists: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            rows: RwLock::new(Vec::new()),
            events,
            last_created_at: Mutex::new(None),
            failing: Mutex::new(HashSet::new()),
            latency: None,
            blob_base: "memory://blobs".to_string(),
            blobs: Mutex::new(HashSet::new()),
            inserts: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            lists: AtomicUsize::new(0),
        }
    }

    /// Every operation sleeps this long before running.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes `op` fail with `StoreError::Unavailable` until toggled back.
    pub fn set_failing(&self, op: Operation, failing: bool) {
        let mut set = self.failing.lock().unwrap_or_else(|e| e.into_inner());
        if failing {
            set.insert(op);
        } else {
            set.remove(&op);
        }
    }

    /// Inserts rows directly, without change events.
    pub async fn seed(&self, records: impl IntoIterator<Item = ResumeRecord>) {
        let mut rows = self.rows.write().await;
        rows.extend(records);
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    pub fn insert_calls(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    /// Files uploaded and not yet deleted.
    pub fn blob_count(&self) -> usize {
        self.lock_blobs().len()
    }

    pub fn has_blob(&self, url: &str) -> bool {
        self.lock_blobs().contains(url)
    }

    /// Number of live change-feed receivers.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    async fn enter(&self, op: Operation) -> Result<(), StoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let failing = self
            .failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&op);
        if failing {
            return Err(StoreError::Unavailable(format!("{op:?} disabled")));
        }
        Ok(())
    }

    /// Strictly increasing creation timestamps, so newest-first order is total.
    fn next_created_at(&self) -> DateTime<Utc> {
        let mut last = self
            .last_created_at
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let mut now = Utc::now();
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + chrono::Duration::microseconds(1);
            }
        }
        *last = Some(now);
        now
    }

    fn lock_blobs(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, event: ChangeEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn insert_resume_record(
        &self,
        fields: NewResumeRecord,
    ) -> Result<ResumeRecord, StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.enter(Operation::Insert).await?;

        let record = ResumeRecord {
            id: Uuid::new_v4(),
            name: fields.name,
            email: fields.email,
            phone: fields.phone,
            resume_url: fields.resume_url,
            created_at: self.next_created_at(),
        };
        {
            let mut rows = self.rows.write().await;
            let at = rows.partition_point(|r| r.created_at > record.created_at);
            rows.insert(at, record.clone());
        }
        debug!(id = %record.id, "memory store insert");
        self.publish(ChangeEvent::Insert {
            record: record.clone(),
        });
        Ok(record)
    }

    async fn list_resume_records(&self) -> Result<Vec<ResumeRecord>, StoreError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.enter(Operation::List).await?;
        Ok(self.rows.read().await.clone())
    }

    async fn delete_resume_record(&self, id: Uuid) -> Result<(), StoreError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.enter(Operation::Delete).await?;

        let removed = {
            let mut rows = self.rows.write().await;
            let at = rows.iter().position(|r| r.id == id);
            at.map(|at| rows.remove(at))
        };
        if let Some(record) = removed {
            self.lock_blobs().remove(&record.resume_url);
            self.publish(ChangeEvent::Delete { id });
        }
        Ok(())
    }

    async fn subscribe_resume_changes(&self) -> Result<Subscription, StoreError> {
        self.enter(Operation::Subscribe).await?;

        let mut feed = self.events.subscribe();
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let handle = tokio::spawn(async move {
            loop {
                match feed.recv().await {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("memory change feed lagged, {skipped} events skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(Subscription::new(rx, handle.abort_handle()))
    }

    async fn upload_blob(&self, file: &CandidateFile) -> Result<String, StoreError> {
        self.enter(Operation::Upload).await?;
        let url = format!("{}/{}", self.blob_base, blob_key(&file.name));
        self.lock_blobs().insert(url.clone());
        Ok(url)
    }

    async fn delete_blob(&self, url: &str) -> Result<(), StoreError> {
        self.enter(Operation::DeleteBlob).await?;
        self.lock_blobs().remove(url);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(name: &str) -> NewResumeRecord {
        NewResumeRecord {
            name: name.to_string(),
            email: format!("{name}@example.com"),
            phone: "555-0000".to_string(),
            resume_url: "https://files.example/cv.pdf".to_string(),
        }
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = MemoryStore::new();
        let a = store.insert_resume_record(fields("a")).await.unwrap();
        let b = store.insert_resume_record(fields("b")).await.unwrap();
        assert!(b.created_at > a.created_at);

        let rows = store.list_resume_records().await.unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn test_subscription_sees_insert_and_delete() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe_resume_changes().await.unwrap();

        let record = store.insert_resume_record(fields("a")).await.unwrap();
        store.delete_resume_record(record.id).await.unwrap();

        assert_eq!(
            sub.recv().await,
            Some(ChangeEvent::Insert {
                record: record.clone()
            })
        );
        assert_eq!(sub.recv().await, Some(ChangeEvent::Delete { id: record.id }));
    }

    #[tokio::test]
    async fn test_delete_missing_id_is_ok_and_silent() {
        let store = MemoryStore::new();
        store.delete_resume_record(Uuid::new_v4()).await.unwrap();
        assert_eq!(store.delete_calls(), 1);
    }

    #[tokio::test]
    async fn test_failing_operation() {
        let store = MemoryStore::new();
        store.set_failing(Operation::List, true);
        assert!(matches!(
            store.list_resume_records().await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_failing(Operation::List, false);
        assert!(store.list_resume_records().await.is_ok());
    }

    #[tokio::test]
    async fn test_insert_keeps_newest_first_after_future_seed() {
        let store = MemoryStore::new();
        let ahead = ResumeRecord {
            id: Uuid::new_v4(),
            name: "ahead".to_string(),
            email: "ahead@example.com".to_string(),
            phone: "555-0000".to_string(),
            resume_url: "https://files.example/ahead.pdf".to_string(),
            created_at: Utc::now() + chrono::Duration::days(1),
        };
        store.seed([ahead.clone()]).await;

        let fresh = store.insert_resume_record(fields("fresh")).await.unwrap();

        let rows = store.list_resume_records().await.unwrap();
        assert_eq!(
            rows.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![ahead.id, fresh.id]
        );
    }

    #[tokio::test]
    async fn test_delete_record_removes_its_blob() {
        let store = MemoryStore::new();
        let url = store
            .upload_blob(&CandidateFile::new("cv.pdf", vec![1u8; 4]))
            .await
            .unwrap();
        let kept = store
            .upload_blob(&CandidateFile::new("other.pdf", vec![2u8; 4]))
            .await
            .unwrap();
        let record = store
            .insert_resume_record(NewResumeRecord {
                resume_url: url.clone(),
                ..fields("a")
            })
            .await
            .unwrap();
        assert_eq!(store.blob_count(), 2);

        store.delete_resume_record(record.id).await.unwrap();

        assert!(!store.has_blob(&url));
        assert!(store.has_blob(&kept));
    }

    #[tokio::test]
    async fn test_cancel_releases_feed() {
        let store = MemoryStore::new();
        let sub = store.subscribe_resume_changes().await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(store.subscriber_count(), 1);

        sub.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.subscriber_count(), 0);
    }
}
