//! Hosted backend-as-a-service over HTTP (PostgREST-style rows, object storage for blobs).
//!
//! The service's realtime socket is not used; the change feed polls the collection and
//! diffs snapshots by id.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{blob_key, RemoteStore, StoreError, Subscription, SUBSCRIPTION_BUFFER};
use crate::models::resume::{ChangeEvent, NewResumeRecord, ResumeRecord};
use crate::vault::picker::CandidateFile;

const TABLE_PATH: &str = "rest/v1/resumes";
const MAX_RETRIES: u32 = 3;
const RETRY_BASE: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct RestRemoteStore {
    client: Client,
    base_url: String,
    api_key: String,
    bucket: String,
    poll_interval: Duration,
    retry_base: Duration,
}

impl RestRemoteStore {
    pub fn new(
        base_url: &str,
        api_key: String,
        bucket: String,
        poll_interval: Duration,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            bucket,
            poll_interval,
            retry_base: RETRY_BASE,
        })
    }

    /// Delay before the first retry; later retries double it.
    pub fn with_retry_base(mut self, retry_base: Duration) -> Self {
        self.retry_base = retry_base;
        self
    }

    fn table_url(&self) -> String {
        format!("{}/{}", self.base_url, TABLE_PATH)
    }

    /// Public URL prefix of uploaded objects.
    fn public_object_prefix(&self) -> String {
        format!("{}/storage/v1/object/public/{}/", self.base_url, self.bucket)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Sends a request, retrying transport errors, 429 and 5xx with exponential backoff.
    async fn send<F>(&self, build: F) -> Result<Response, StoreError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_error: Option<StoreError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = backoff_delay(self.retry_base, attempt);
                warn!(
                    "Remote store attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.authorized(build()).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(StoreError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = Some(StoreError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(StoreError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }
            return Ok(response);
        }

        Err(last_error.unwrap_or_else(|| {
            StoreError::Unavailable(format!("gave up after {MAX_RETRIES} attempts"))
        }))
    }
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    async fn insert_resume_record(
        &self,
        fields: NewResumeRecord,
    ) -> Result<ResumeRecord, StoreError> {
        let url = self.table_url();
        let response = self
            .send(|| {
                self.client
                    .post(&url)
                    .header("Prefer", "return=representation")
                    .json(&fields)
            })
            .await?;

        let mut rows: Vec<ResumeRecord> = response.json().await?;
        if rows.is_empty() {
            return Err(StoreError::Api {
                status: 200,
                message: "insert returned no row".to_string(),
            });
        }
        Ok(rows.swap_remove(0))
    }

    async fn list_resume_records(&self) -> Result<Vec<ResumeRecord>, StoreError> {
        let url = self.table_url();
        let response = self
            .send(|| {
                self.client
                    .get(&url)
                    .query(&[("select", "*"), ("order", "created_at.desc")])
            })
            .await?;
        Ok(response.json().await?)
    }

    async fn delete_resume_record(&self, id: Uuid) -> Result<(), StoreError> {
        let url = self.table_url();
        let filter = format!("eq.{id}");
        let response = self
            .send(|| {
                self.client
                    .delete(&url)
                    .header("Prefer", "return=representation")
                    .query(&[("id", filter.as_str())])
            })
            .await?;

        let deleted: Vec<ResumeRecord> = response.json().await?;
        for record in deleted {
            if let Err(e) = self.delete_blob(&record.resume_url).await {
                warn!("Resume {id} deleted but its file was not: {e}");
            }
        }
        Ok(())
    }

    async fn subscribe_resume_changes(&self) -> Result<Subscription, StoreError> {
        let initial = self.list_resume_records().await?;
        let mut known: HashSet<Uuid> = initial.iter().map(|r| r.id).collect();

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let store = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(store.poll_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let current = match store.list_resume_records().await {
                    Ok(rows) => rows,
                    Err(e) => {
                        warn!("Change poll failed: {e}");
                        continue;
                    }
                };
                let events = diff_snapshots(&known, &current);
                if !events.is_empty() {
                    debug!("Change poll produced {} events", events.len());
                }
                known = current.iter().map(|r| r.id).collect();
                for event in events {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
        });
        Ok(Subscription::new(rx, handle.abort_handle()))
    }

    async fn upload_blob(&self, file: &CandidateFile) -> Result<String, StoreError> {
        let key = blob_key(&file.name);
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, key);
        let content_type = file
            .content_type
            .clone()
            .unwrap_or_else(|| "application/pdf".to_string());

        self.send(|| {
            self.client
                .post(&url)
                .header("content-type", content_type.as_str())
                .body(file.bytes.clone())
        })
        .await?;

        Ok(format!("{}{}", self.public_object_prefix(), key))
    }

    async fn delete_blob(&self, url: &str) -> Result<(), StoreError> {
        let prefix = self.public_object_prefix();
        let Some(key) = url.strip_prefix(&prefix).filter(|k| !k.is_empty()) else {
            debug!("Not a bucket URL, nothing to delete: {url}");
            return Ok(());
        };
        let object_url = format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, key);
        self.send(|| self.client.delete(&object_url)).await?;
        Ok(())
    }
}

/// Wait before retry `attempt` (1-based): `base`, then doubling.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * (1 << attempt.saturating_sub(1))
}

/// Events turning the `known` id set into `current`: inserts oldest first, then deletes.
pub fn diff_snapshots(known: &HashSet<Uuid>, current: &[ResumeRecord]) -> Vec<ChangeEvent> {
    let current_ids: HashSet<Uuid> = current.iter().map(|r| r.id).collect();

    let mut events: Vec<ChangeEvent> = current
        .iter()
        .rev()
        .filter(|r| !known.contains(&r.id))
        .map(|r| ChangeEvent::Insert { record: r.clone() })
        .collect();

    let mut removed: Vec<Uuid> = known.difference(&current_ids).copied().collect();
    removed.sort();
    events.extend(removed.into_iter().map(|id| ChangeEvent::Delete { id }));
    events
}
