use std::sync::Arc;

use crate::config::Config;
use crate::store::RemoteStore;
use crate::vault::form::SubmissionForm;
use crate::vault::notify::Notifier;
use crate::vault::picker::FilePicker;
use crate::vault::shell::Shell;
use crate::vault::table::SubmissionsTable;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RemoteStore>,
    pub notifier: Notifier,
    pub shell: Shell,
    /// Mounted for the lifetime of the process; mirrors the store through its change feed.
    pub table: Arc<SubmissionsTable>,
    pub config: Config,
}

impl AppState {
    /// Mounts the submissions table, so this must run inside the Tokio runtime.
    pub fn new(store: Arc<dyn RemoteStore>, config: Config) -> Self {
        let notifier = Notifier::new();
        let shell = Shell::new();
        let table = SubmissionsTable::mount(store.clone(), notifier.clone(), shell.refresh_signal());
        Self {
            store,
            notifier,
            shell,
            table: Arc::new(table),
            config,
        }
    }

    /// A fresh form for one fill-out session, reporting success to the shell.
    pub fn new_form(&self) -> SubmissionForm {
        let picker = FilePicker::new(self.config.accepted_file_types.clone())
            .with_max_bytes(Some(self.config.max_upload_bytes));
        let shell = self.shell.clone();
        SubmissionForm::new(
            self.store.clone(),
            self.notifier.clone(),
            picker,
            self.config.resume_url_strategy.clone(),
        )
        .on_submit_success(move || shell.handle_submit_success())
    }
}
