pub mod browser;
pub mod types;

pub use browser::{file_name, normalize_path, parent_path, DirectoryBrowser, ROOT};
pub use types::{Download, Entry, EntryKind, Listing, ReportStore, Selection};
