//! Remote Store Client: the only way the vault talks to persistence.
//!
//! `AppState` carries an `Arc<dyn RemoteStore>` built once in `main`; components receive it
//! through their constructors. Backends:
//! - `PgRemoteStore`: Postgres rows + LISTEN/NOTIFY change feed + S3 blobs.
//! - `RestRemoteStore`: hosted backend-as-a-service over HTTP, change feed by polling.
//! - `MemoryStore`: in-process, used for local runs and tests.

#![allow(dead_code)]

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::models::resume::{ChangeEvent, NewResumeRecord, ResumeRecord};
use crate::vault::picker::CandidateFile;

pub mod memory;
pub mod postgres;
pub mod rest;

pub use memory::MemoryStore;
pub use postgres::PgRemoteStore;
pub use rest::RestRemoteStore;

/// Buffered change events per subscriber before the feed applies back-pressure.
pub(crate) const SUBSCRIPTION_BUFFER: usize = 256;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Blob storage error: {0}")]
    Blob(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote store error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode store payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn insert_resume_record(
        &self,
        fields: NewResumeRecord,
    ) -> Result<ResumeRecord, StoreError>;

    /// All records, newest first.
    async fn list_resume_records(&self) -> Result<Vec<ResumeRecord>, StoreError>;

    /// Deletes the record and the file behind its `resume_url`. Deleting an id that no
    /// longer exists succeeds.
    async fn delete_resume_record(&self, id: Uuid) -> Result<(), StoreError>;

    async fn subscribe_resume_changes(&self) -> Result<Subscription, StoreError>;

    /// Stores the file and returns a stable URL it can be retrieved from.
    async fn upload_blob(&self, file: &CandidateFile) -> Result<String, StoreError>;

    /// Removes a file stored by `upload_blob`. URLs this store did not issue are ignored.
    async fn delete_blob(&self, url: &str) -> Result<(), StoreError>;
}

/// Live change feed for the `resumes` collection. The feed task is cancelled when the
/// subscription is cancelled or dropped, whichever comes first.
pub struct Subscription {
    events: mpsc::Receiver<ChangeEvent>,
    feed: AbortHandle,
}

impl Subscription {
    pub(crate) fn new(events: mpsc::Receiver<ChangeEvent>, feed: AbortHandle) -> Self {
        Self { events, feed }
    }

    /// `None` once the feed has ended.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Drops events already buffered, returning how many. Used before a full reload, whose
    /// snapshot supersedes them.
    pub fn discard_pending(&mut self) -> usize {
        let mut discarded = 0;
        while self.events.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.feed.abort();
        self.events.close();
    }
}

/// Sanitized object key for an uploaded resume: `resumes/<uuid>/<name>`.
pub fn blob_key(file_name: &str) -> String {
    let cleaned: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    let cleaned = if cleaned.is_empty() { "resume" } else { cleaned };
    format!("resumes/{}/{}", Uuid::new_v4(), cleaned)
}
