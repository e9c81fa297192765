use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::types::{Download, Entry, Listing, ReportStore, Selection};
use crate::error::Result;

pub const ROOT: &str = ".";

pub struct DirectoryBrowser {
    store: Arc<dyn ReportStore>,
    latest: RwLock<Option<Listing>>,
}

impl DirectoryBrowser {
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self {
            store,
            latest: RwLock::new(None),
        }
    }

    pub async fn list(&self, path: &str) -> Result<Listing> {
        let path = normalize_path(path);
        let entries = self
            .store
            .list(&path)
            .await?
            .into_iter()
            .filter(|entry| !entry.name.starts_with('.'))
            .collect::<Vec<Entry>>();
        debug!(path = %path, entries = entries.len(), "listed reports");

        let listing = Listing {
            parent_path: parent_path(&path),
            path,
            entries,
        };
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Some(listing.clone());
        Ok(listing)
    }

    /// Re-lists the root.
    pub async fn refresh(&self) -> Result<Listing> {
        self.list(ROOT).await
    }

    /// Folders navigate, files load their content for preview.
    pub async fn open(&self, entry: &Entry) -> Result<Selection> {
        if entry.is_folder() {
            Ok(Selection::Listing(self.list(&entry.path).await?))
        } else {
            Ok(Selection::Preview(self.read_file(&entry.path).await?))
        }
    }

    pub async fn read_file(&self, path: &str) -> Result<String> {
        self.store.read_file(&normalize_path(path)).await
    }

    pub async fn download(&self, path: &str) -> Result<Download> {
        self.store.download(&normalize_path(path)).await
    }

    pub async fn remove(&self, path: &str) -> Result<Listing> {
        self.store.remove(&normalize_path(path)).await?;
        self.refresh().await
    }

    pub fn latest(&self) -> Option<Listing> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// `""`, `"."`, `"/"` and `"./"` all name the root; trailing slashes are dropped.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
    let trimmed = trimmed.trim_matches('/');
    if trimmed.is_empty() || trimmed == ROOT {
        ROOT.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Last segment of `path`, used as the saved file name.
pub fn file_name(path: &str) -> String {
    let path = normalize_path(path);
    match path.rfind('/') {
        Some(idx) => path[idx + 1..].to_string(),
        None => path,
    }
}

pub fn parent_path(path: &str) -> Option<String> {
    let path = normalize_path(path);
    if path == ROOT {
        return None;
    }
    match path.rfind('/') {
        Some(idx) => Some(path[..idx].to_string()),
        None => Some(ROOT.to_string()),
    }
}
