pub mod resume;

pub use resume::{ChangeEvent, NewResumeRecord, ResumeRecord};
