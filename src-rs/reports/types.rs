use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    #[serde(alias = "directory", alias = "dir")]
    Folder,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

impl Entry {
    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub path: String,
    pub entries: Vec<Entry>,
    /// `None` at the root.
    pub parent_path: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Selection {
    Listing(Listing),
    Preview(String),
}

/// A report fetched for saving to disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Hierarchical report storage: a plain request/response pass-through.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn list(&self, path: &str) -> Result<Vec<Entry>>;

    async fn read_file(&self, path: &str) -> Result<String>;

    async fn remove(&self, path: &str) -> Result<()>;

    async fn download(&self, path: &str) -> Result<Download>;
}
