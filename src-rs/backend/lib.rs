pub mod http;
pub mod types;

pub use http::{HttpBackend, HttpBackendConfig};
pub use types::{JobBackend, RawLogEntry, RemoteStatus, StatusSnapshot, Suggestion};
