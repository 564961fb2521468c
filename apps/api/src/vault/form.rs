//! Submission Form: owns one draft, validates it locally and inserts it through the
//! remote store. At most one submit is in flight per form.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::models::resume::{NewResumeRecord, ResumeRecord};
use crate::store::{blob_key, RemoteStore, StoreError};
use crate::vault::notify::Notifier;
use crate::vault::picker::{CandidateFile, FilePicker, PickerError};

/// Characters of the file name shown next to the file icon.
const FILE_NAME_DISPLAY_CHARS: usize = 40;

#[derive(Debug, Error)]
pub enum FormError {
    #[error("Please fill in all fields and upload a resume")]
    MissingFields,

    #[error("A submission is already in progress")]
    AlreadySubmitting,

    #[error(transparent)]
    File(#[from] PickerError),

    #[error("Submission failed: {0}")]
    Remote(#[from] StoreError),
}

/// How the stored `resume_url` is obtained for a submitted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeUrlStrategy {
    /// Upload the binary through the store and use the URL it returns.
    Upload,
    /// Skip the upload and point at `<base>/<uuid>/<file name>`.
    Placeholder { base: String },
}

impl ResumeUrlStrategy {
    pub fn placeholder_url(base: &str, file_name: &str) -> String {
        let key = blob_key(file_name);
        let tail = key.strip_prefix("resumes/").unwrap_or(&key);
        format!("{}/{}", base.trim_end_matches('/'), tail)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Email,
    Phone,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionDraft {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub file: Option<CandidateFile>,
}

impl SubmissionDraft {
    /// Every field non-empty and a file held. Values are taken exactly as typed.
    pub fn is_complete(&self) -> bool {
        [&self.name, &self.email, &self.phone]
            .iter()
            .all(|v| !v.is_empty())
            && self.file.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileView {
    pub name: String,
    pub display_name: String,
    pub size: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormView {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub file: Option<FileView>,
    pub accept: String,
    pub is_drag_over: bool,
    pub is_submitting: bool,
    pub submit_label: &'static str,
}

pub type SubmitCallback = Arc<dyn Fn() + Send + Sync>;

pub struct SubmissionForm {
    store: Arc<dyn RemoteStore>,
    notifier: Notifier,
    url_strategy: ResumeUrlStrategy,
    picker: Mutex<FilePicker>,
    draft: Mutex<SubmissionDraft>,
    submitting: AtomicBool,
    on_submit_success: Option<SubmitCallback>,
}

/// Clears the in-flight flag on every exit path of `submit`.
struct SubmittingGuard<'a>(&'a AtomicBool);

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SubmissionForm {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        notifier: Notifier,
        picker: FilePicker,
        url_strategy: ResumeUrlStrategy,
    ) -> Self {
        Self {
            store,
            notifier,
            url_strategy,
            picker: Mutex::new(picker),
            draft: Mutex::new(SubmissionDraft::default()),
            submitting: AtomicBool::new(false),
            on_submit_success: None,
        }
    }

    pub fn on_submit_success(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_submit_success = Some(Arc::new(callback));
        self
    }

    pub fn set_field(&self, field: Field, value: impl Into<String>) {
        let mut draft = self.lock_draft();
        let slot = match field {
            Field::Name => &mut draft.name,
            Field::Email => &mut draft.email,
            Field::Phone => &mut draft.phone,
        };
        *slot = value.into();
    }

    /// Picks a file through the browse dialog. A rejected file leaves the held one in place.
    pub fn select_file(&self, file: CandidateFile) -> Result<(), FormError> {
        let accepted = self.lock_picker().select(file);
        self.hold(accepted)
    }

    pub fn drop_files(&self, files: impl IntoIterator<Item = CandidateFile>) -> Result<(), FormError> {
        let dropped = self.lock_picker().drop_files(files);
        match dropped {
            Some(accepted) => self.hold(accepted),
            None => Ok(()),
        }
    }

    pub fn drag_over(&self) {
        self.lock_picker().drag_over();
    }

    pub fn drag_leave(&self) {
        self.lock_picker().drag_leave();
    }

    pub fn remove_file(&self) {
        self.lock_draft().file = None;
        self.lock_picker().reset_input();
    }

    pub fn draft(&self) -> SubmissionDraft {
        self.lock_draft().clone()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    pub fn input_generation(&self) -> u64 {
        self.lock_picker().input_generation()
    }

    pub fn view(&self) -> FormView {
        let draft = self.draft();
        let picker = self.lock_picker();
        let is_submitting = self.is_submitting();
        FormView {
            file: draft.file.as_ref().map(|f| FileView {
                name: f.name.clone(),
                display_name: f.display_name(FILE_NAME_DISPLAY_CHARS),
                size: f.display_size(),
            }),
            name: draft.name,
            email: draft.email,
            phone: draft.phone,
            accept: picker.accept_list().accept_attr(),
            is_drag_over: picker.is_drag_over(),
            is_submitting,
            submit_label: if is_submitting {
                "Uploading..."
            } else {
                "Submit Resume"
            },
        }
    }

    /// Validates the draft, resolves the resume URL and inserts the record.
    ///
    /// On success the draft is reset and the success callback runs once. On failure the
    /// draft is left as it was so the user can retry.
    pub async fn submit(&self) -> Result<ResumeRecord, FormError> {
        let draft = self.draft();
        let file = match (&draft.file, draft.is_complete()) {
            (Some(file), true) => file.clone(),
            _ => {
                self.notifier.failure(
                    "Missing fields",
                    "Please fill in all fields and upload a resume",
                );
                return Err(FormError::MissingFields);
            }
        };

        let guard = self.begin_submit().ok_or(FormError::AlreadySubmitting)?;

        let record = match self.insert(&draft, &file).await {
            Ok(record) => record,
            Err(e) => {
                error!("Error submitting resume: {e}");
                self.notifier.failure(
                    "Submission failed",
                    "There was an error uploading your resume. Please try again.",
                );
                return Err(FormError::Remote(e));
            }
        };

        info!("Resume {} submitted by {}", record.id, record.email);
        self.notifier
            .success("Resume submitted!", "Your resume has been successfully uploaded.");
        *self.lock_draft() = SubmissionDraft::default();
        self.lock_picker().reset_input();
        drop(guard);

        if let Some(callback) = &self.on_submit_success {
            callback();
        }
        Ok(record)
    }

    async fn insert(
        &self,
        draft: &SubmissionDraft,
        file: &CandidateFile,
    ) -> Result<ResumeRecord, StoreError> {
        let (resume_url, uploaded) = match &self.url_strategy {
            ResumeUrlStrategy::Upload => (self.store.upload_blob(file).await?, true),
            ResumeUrlStrategy::Placeholder { base } => {
                (ResumeUrlStrategy::placeholder_url(base, &file.name), false)
            }
        };

        let inserted = self
            .store
            .insert_resume_record(NewResumeRecord {
                name: draft.name.clone(),
                email: draft.email.clone(),
                phone: draft.phone.clone(),
                resume_url: resume_url.clone(),
            })
            .await;

        // A file without a record is unreachable; remove it before the user retries.
        if inserted.is_err() && uploaded {
            if let Err(e) = self.store.delete_blob(&resume_url).await {
                warn!("Orphaned upload {resume_url} not removed: {e}");
            }
        }
        inserted
    }

    fn begin_submit(&self) -> Option<SubmittingGuard<'_>> {
        self.submitting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| SubmittingGuard(&self.submitting))
    }

    fn hold(&self, accepted: Result<CandidateFile, PickerError>) -> Result<(), FormError> {
        match accepted {
            Ok(file) => {
                self.lock_draft().file = Some(file);
                Ok(())
            }
            Err(e) => {
                self.notifier.failure("Invalid file", &e.to_string());
                Err(FormError::File(e))
            }
        }
    }

    fn lock_draft(&self) -> MutexGuard<'_, SubmissionDraft> {
        self.draft.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_picker(&self) -> MutexGuard<'_, FilePicker> {
        self.picker.lock().unwrap_or_else(|e| e.into_inner())
    }
}
