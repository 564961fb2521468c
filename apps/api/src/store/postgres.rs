use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use sqlx::postgres::PgListener;
use serde::Deserialize;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{blob_key, RemoteStore, StoreError, Subscription, SUBSCRIPTION_BUFFER};
use crate::models::resume::{ChangeEvent, NewResumeRecord, ResumeRecord};
use crate::vault::picker::CandidateFile;

/// Channel the `resumes` trigger notifies on (see migrations).
pub const CHANGE_CHANNEL: &str = "resume_changes";

const RESUME_COLUMNS: &str = "id, name, email, phone, resume_url, created_at";

/// Notification written by the `resumes` trigger. Inserts carry only the id; the row is
/// read back before it is forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerPayload {
    Insert { id: Uuid },
    Delete { id: Uuid },
}

/// Postgres-backed store. Rows live in `resumes`, binaries in an S3 bucket.
#[derive(Clone)]
pub struct PgRemoteStore {
    pool: PgPool,
    s3: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl PgRemoteStore {
    pub fn new(
        pool: PgPool,
        s3: aws_sdk_s3::Client,
        bucket: String,
        public_base_url: String,
    ) -> Self {
        Self {
            pool,
            s3,
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RemoteStore for PgRemoteStore {
    async fn insert_resume_record(
        &self,
        fields: NewResumeRecord,
    ) -> Result<ResumeRecord, StoreError> {
        let record = sqlx::query_as::<_, ResumeRecord>(&format!(
            "INSERT INTO resumes (name, email, phone, resume_url) VALUES ($1, $2, $3, $4) RETURNING {RESUME_COLUMNS}"
        ))
        .bind(&fields.name)
        .bind(&fields.email)
        .bind(&fields.phone)
        .bind(&fields.resume_url)
        .fetch_one(&self.pool)
        .await?;

        info!("Inserted resume {}", record.id);
        Ok(record)
    }

    async fn list_resume_records(&self) -> Result<Vec<ResumeRecord>, StoreError> {
        Ok(sqlx::query_as::<_, ResumeRecord>(&format!(
            "SELECT {RESUME_COLUMNS} FROM resumes ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete_resume_record(&self, id: Uuid) -> Result<(), StoreError> {
        let resume_url: Option<String> =
            sqlx::query_scalar("DELETE FROM resumes WHERE id = $1 RETURNING resume_url")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(resume_url) = resume_url else {
            debug!("Resume {id} already gone");
            return Ok(());
        };
        info!("Deleted resume {id}");

        // The row is gone either way; a leftover object is only logged.
        if let Err(e) = self.delete_blob(&resume_url).await {
            warn!("Resume {id} deleted but its file was not: {e}");
        }
        Ok(())
    }

    async fn subscribe_resume_changes(&self) -> Result<Subscription, StoreError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;
        info!("Listening on channel '{CHANGE_CHANNEL}'");

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let pool = self.pool.clone();
        let handle = tokio::spawn(async move {
            loop {
                let notification = match listener.recv().await {
                    Ok(n) => n,
                    Err(e) => {
                        error!("Change feed listener failed: {e}");
                        break;
                    }
                };
                let event = match parse_notification(notification.payload()) {
                    Ok(TriggerPayload::Delete { id }) => ChangeEvent::Delete { id },
                    Ok(TriggerPayload::Insert { id }) => match fetch_record(&pool, id).await {
                        Ok(Some(record)) => ChangeEvent::Insert { record },
                        Ok(None) => {
                            debug!("Resume {id} deleted before it could be read");
                            continue;
                        }
                        Err(e) => {
                            error!("Failed to read inserted resume {id}: {e}");
                            continue;
                        }
                    },
                    Err(e) => {
                        warn!("Ignoring malformed change payload: {e}");
                        continue;
                    }
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        Ok(Subscription::new(rx, handle.abort_handle()))
    }

    async fn upload_blob(&self, file: &CandidateFile) -> Result<String, StoreError> {
        let key = blob_key(&file.name);
        let content_type = file
            .content_type
            .clone()
            .unwrap_or_else(|| "application/pdf".to_string());

        self.s3
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(file.bytes.clone()))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StoreError::Blob(format!("S3 upload failed: {e}")))?;

        info!("Uploaded resume to s3://{}/{}", self.bucket, key);
        Ok(format!("{}/{}", self.public_base_url, key))
    }

    async fn delete_blob(&self, url: &str) -> Result<(), StoreError> {
        let Some(key) = object_key(&self.public_base_url, url) else {
            debug!("Not a bucket URL, nothing to delete: {url}");
            return Ok(());
        };

        self.s3
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Blob(format!("S3 delete failed: {e}")))?;

        info!("Deleted s3://{}/{}", self.bucket, key);
        Ok(())
    }
}

async fn fetch_record(pool: &PgPool, id: Uuid) -> Result<Option<ResumeRecord>, sqlx::Error> {
    sqlx::query_as::<_, ResumeRecord>(&format!(
        "SELECT {RESUME_COLUMNS} FROM resumes WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Object key of a URL produced by `upload_blob`, or `None` for URLs outside the bucket
/// (e.g. placeholder URLs).
pub fn object_key<'a>(public_base_url: &str, url: &'a str) -> Option<&'a str> {
    url.strip_prefix(public_base_url)?
        .strip_prefix('/')
        .filter(|key| !key.is_empty())
}

/// Decodes a `pg_notify` payload written by the `resumes` trigger.
pub fn parse_notification(payload: &str) -> Result<TriggerPayload, StoreError> {
    Ok(serde_json::from_str(payload)?)
}
