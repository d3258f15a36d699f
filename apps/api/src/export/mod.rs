// Document export and the standalone file utilities.
// Printable/clipboard views read the workspace draft; merge and mail-merge
// are file-in/artifact-out and never touch generation.

pub mod handlers;
pub mod mail_merge;
pub mod merge;
pub mod printable;
