//! Indexed document list

use crate::api::{FilesReply, ReplyStatus, StatusReply};
use serde::{Deserialize, Serialize};

/// A document known to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedFile {
    pub filename: String,
    #[serde(default)]
    pub is_indexed: bool,
}

impl IndexedFile {
    pub fn new(filename: impl Into<String>, is_indexed: bool) -> Self {
        Self {
            filename: filename.into(),
            is_indexed,
        }
    }

    pub fn status_label(&self) -> &'static str {
        if self.is_indexed {
            "✅ Indexed"
        } else {
            "❌ Not indexed"
        }
    }

    /// One rendered row of the files panel
    pub fn render(&self) -> String {
        format!("{}  {}", self.filename, self.status_label())
    }
}

/// Client-side copy of the backend's file list. Every fetch replaces it.
#[derive(Debug, Clone, Default)]
pub struct FileList {
    files: Vec<IndexedFile>,
    /// Backend hint shown when there is nothing indexed yet
    hint: Option<String>,
}

impl FileList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &[IndexedFile] {
        &self.files
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn get(&self, filename: &str) -> Option<&IndexedFile> {
        self.files.iter().find(|f| f.filename == filename)
    }

    /// Replace the whole list (last fetch wins)
    pub fn replace(&mut self, files: Vec<IndexedFile>) {
        self.files = files;
        self.hint = None;
    }

    /// Apply a `GET /api/rag/files` reply. Error replies leave the list untouched
    /// and return the message to surface.
    pub fn apply_fetch(&mut self, reply: FilesReply) -> Result<(), String> {
        match reply.status {
            ReplyStatus::Error => Err(reply
                .error
                .or(reply.message)
                .unwrap_or_else(|| "Failed to load index information".to_string())),
            ReplyStatus::NoFiles => {
                self.files.clear();
                self.hint = reply.message;
                Ok(())
            }
            _ => {
                self.replace(reply.files);
                Ok(())
            }
        }
    }

    /// Mark an uploaded document indexed, inserting it if new. Keeps the list sorted.
    pub fn mark_indexed(&mut self, filename: &str) {
        match self.files.iter_mut().find(|f| f.filename == filename) {
            Some(existing) => existing.is_indexed = true,
            None => self.files.push(IndexedFile::new(filename, true)),
        }
        self.files.sort_by(|a, b| a.filename.cmp(&b.filename));
        self.hint = None;
    }

    /// Merge the outcome of an upload or delete.
    ///
    /// A full `files` list in the reply wins. Otherwise `indexed_files` (names only)
    /// replaces the list, and failing both the uploaded name is marked indexed.
    pub fn apply_change(&mut self, reply: &StatusReply, uploaded: Option<&str>) {
        if let Some(files) = &reply.files {
            self.replace(files.clone());
        } else if let Some(names) = &reply.indexed_files {
            let files = names.iter().map(|n| IndexedFile::new(n.clone(), true)).collect();
            self.replace(files);
        } else if let Some(name) = uploaded {
            self.mark_indexed(name);
        }
    }

    /// Rendered rows
    pub fn render(&self) -> Vec<String> {
        self.files.iter().map(IndexedFile::render).collect()
    }
}
