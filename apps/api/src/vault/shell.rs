use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

pub const TITLE: &str = "Resume Vault";
pub const SUBTITLE: &str = "Upload and manage your resume submissions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    Upload,
    Submissions,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShellView {
    pub title: &'static str,
    pub subtitle: &'static str,
    pub active_tab: Tab,
    pub refresh: u64,
}

/// Page shell: the active tab and the refresh signal handed to the submissions table.
#[derive(Clone)]
pub struct Shell {
    active_tab: Arc<watch::Sender<Tab>>,
    refresh: Arc<watch::Sender<u64>>,
}

impl Shell {
    pub fn new() -> Self {
        Self {
            active_tab: Arc::new(watch::channel(Tab::Upload).0),
            refresh: Arc::new(watch::channel(0).0),
        }
    }

    pub fn active_tab(&self) -> Tab {
        *self.active_tab.borrow()
    }

    pub fn set_active_tab(&self, tab: Tab) {
        self.active_tab.send_replace(tab);
    }

    /// Receiver for the table's external reload trigger.
    pub fn refresh_signal(&self) -> watch::Receiver<u64> {
        self.refresh.subscribe()
    }

    /// Called once per confirmed submission: reload the table and show it.
    pub fn handle_submit_success(&self) {
        self.refresh.send_modify(|n| *n += 1);
        self.set_active_tab(Tab::Submissions);
        info!("Submission confirmed, switching to submissions");
    }

    pub fn view(&self) -> ShellView {
        ShellView {
            title: TITLE,
            subtitle: SUBTITLE,
            active_tab: self.active_tab(),
            refresh: *self.refresh.borrow(),
        }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::vault::form::{Field, ResumeUrlStrategy, SubmissionForm};
    use crate::vault::notify::Notifier;
    use crate::vault::picker::{CandidateFile, FilePicker};

    #[test]
    fn test_starts_on_upload_tab() {
        let shell = Shell::new();
        assert_eq!(shell.active_tab(), Tab::Upload);
        assert_eq!(shell.view().refresh, 0);
    }

    #[test]
    fn test_submit_success_bumps_refresh_and_switches_tab() {
        let shell = Shell::new();
        let mut refresh = shell.refresh_signal();
        shell.handle_submit_success();
        assert_eq!(shell.active_tab(), Tab::Submissions);
        assert!(refresh.has_changed().unwrap());
        assert_eq!(*refresh.borrow_and_update(), 1);
    }

    #[tokio::test]
    async fn test_form_submission_switches_to_submissions() {
        let shell = Shell::new();
        let store = Arc::new(MemoryStore::new());
        let on_success = shell.clone();
        let form = SubmissionForm::new(
            store.clone(),
            Notifier::new(),
            FilePicker::default(),
            ResumeUrlStrategy::Upload,
        )
        .on_submit_success(move || on_success.handle_submit_success());

        form.set_field(Field::Name, "Ada");
        form.set_field(Field::Email, "ada@x.com");
        form.set_field(Field::Phone, "555-0000");
        form.select_file(CandidateFile::new("cv.pdf", vec![7u8; 64]))
            .unwrap();
        form.submit().await.unwrap();

        let draft = form.draft();
        assert_eq!(
            (draft.name.as_str(), draft.email.as_str(), draft.phone.as_str()),
            ("", "", "")
        );
        assert!(draft.file.is_none());
        assert_eq!(shell.active_tab(), Tab::Submissions);
        assert_eq!(shell.view().refresh, 1);
    }
}
