#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A persisted resume submission. Immutable once created; only deletion changes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ResumeRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub resume_url: String,
    pub created_at: DateTime<Utc>,
}

/// Fields sent to the store on insert. `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewResumeRecord {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub resume_url: String,
}

/// Row-level change on the `resumes` collection, as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeEvent {
    Insert { record: ResumeRecord },
    Delete { id: Uuid },
}

impl ChangeEvent {
    pub fn id(&self) -> Uuid {
        match self {
            ChangeEvent::Insert { record } => record.id,
            ChangeEvent::Delete { id } => *id,
        }
    }
}
