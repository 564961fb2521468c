// Resume Vault components: file picker, submission form, submissions table, page shell.
// Each is a plain state container over an injected `RemoteStore`; the HTTP layer in
// `handlers` only drives them.

pub mod form;
pub mod handlers;
pub mod notify;
pub mod picker;
pub mod shell;
pub mod table;
