//! File Picker: holds the extension allow-list and drag/input state for a single
//! candidate file. The candidate itself is owned by the caller (the submission draft);
//! the picker only decides whether a file may replace it.

#![allow(dead_code)]

use std::fmt;

use bytes::Bytes;
use thiserror::Error;

/// "Max 10MB" hint shown under the drop zone.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PickerError {
    #[error("Invalid file type. Please upload one of the following types: {allowed}")]
    InvalidType { allowed: String },

    #[error("File is too large ({size} bytes). Maximum allowed size is {max} bytes")]
    TooLarge { size: u64, max: u64 },
}

/// A user-selected file that has not been submitted yet. Never persisted locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub bytes: Bytes,
    pub name: String,
    pub size: u64,
    pub extension: String,
    pub content_type: Option<String>,
}

impl CandidateFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let name = name.into();
        let bytes = bytes.into();
        Self {
            extension: extension_of(&name),
            size: bytes.len() as u64,
            content_type: None,
            bytes,
            name,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn size_mib(&self) -> f64 {
        self.size as f64 / BYTES_PER_MIB
    }

    /// Size in mebibytes rounded to two decimals, e.g. `"1.50 MB"`.
    pub fn display_size(&self) -> String {
        format!("{:.2} MB", self.size_mib())
    }

    /// File name cut to `max_chars` characters, ending in `…` when truncated.
    pub fn display_name(&self, max_chars: usize) -> String {
        truncate_name(&self.name, max_chars)
    }
}

/// Lowercased text after the last `.`; a name without a dot is its own extension.
pub fn extension_of(name: &str) -> String {
    name.rsplit('.').next().unwrap_or_default().to_lowercase()
}

fn truncate_name(name: &str, max_chars: usize) -> String {
    if name.chars().count() <= max_chars {
        return name.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut out: String = name.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

/// Caller-supplied list of accepted file types such as `[".pdf"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptList(Vec<String>);

impl AcceptList {
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(types.into_iter().map(Into::into).collect())
    }

    /// Parses a comma-separated list, ignoring blank entries.
    pub fn parse(raw: &str) -> Self {
        Self::new(
            raw.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from),
        )
    }

    /// An entry matches when it is literally `"." + extension`, or when its lowercase
    /// text contains the extension.
    pub fn accepts(&self, extension: &str) -> bool {
        let extension = extension.to_lowercase();
        let dotted = format!(".{extension}");
        self.0
            .iter()
            .any(|t| t.to_lowercase().contains(&extension) || *t == dotted)
    }

    /// Value for an `accept` attribute.
    pub fn accept_attr(&self) -> String {
        self.0.join(",")
    }

    pub fn entries(&self) -> &[String] {
        &self.0
    }
}

impl Default for AcceptList {
    fn default() -> Self {
        Self::new([".pdf"])
    }
}

impl fmt::Display for AcceptList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

#[derive(Debug, Clone)]
pub struct FilePicker {
    accept: AcceptList,
    max_bytes: Option<u64>,
    drag_over: bool,
    input_generation: u64,
}

impl FilePicker {
    pub fn new(accept: AcceptList) -> Self {
        Self {
            accept,
            max_bytes: Some(DEFAULT_MAX_UPLOAD_BYTES),
            drag_over: false,
            input_generation: 0,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: Option<u64>) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn accept_list(&self) -> &AcceptList {
        &self.accept
    }

    /// Validates a file chosen through the browse dialog. On `Ok` the caller replaces
    /// its held file; on `Err` it must keep the current one.
    pub fn select(&self, file: CandidateFile) -> Result<CandidateFile, PickerError> {
        self.validate(&file)?;
        Ok(file)
    }

    /// Handles a drop. Only the first dropped file is considered.
    pub fn drop_files(
        &mut self,
        files: impl IntoIterator<Item = CandidateFile>,
    ) -> Option<Result<CandidateFile, PickerError>> {
        self.drag_over = false;
        files.into_iter().next().map(|f| self.select(f))
    }

    pub fn drag_over(&mut self) {
        self.drag_over = true;
    }

    pub fn drag_leave(&mut self) {
        self.drag_over = false;
    }

    pub fn is_drag_over(&self) -> bool {
        self.drag_over
    }

    /// Resets the underlying input so the same file name can be picked again.
    pub fn reset_input(&mut self) {
        self.input_generation += 1;
    }

    pub fn input_generation(&self) -> u64 {
        self.input_generation
    }

    fn validate(&self, file: &CandidateFile) -> Result<(), PickerError> {
        if !self.accept.accepts(&file.extension) {
            tracing::debug!(file = %file.name, "rejected file type");
            return Err(PickerError::InvalidType {
                allowed: self.accept.to_string(),
            });
        }
        if let Some(max) = self.max_bytes {
            if file.size > max {
                return Err(PickerError::TooLarge {
                    size: file.size,
                    max,
                });
            }
        }
        Ok(())
    }
}

impl Default for FilePicker {
    fn default() -> Self {
        Self::new(AcceptList::default())
    }
}
