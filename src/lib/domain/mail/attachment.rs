//! Message attachments

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A file attached to an outbound message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Path of the file to attach
    pub file: PathBuf,

    /// Name to present the file under, omitted when the on-disk name is used
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
}

impl Attachment {
    /// Attach a file under its existing name
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            name: None,
        }
    }

    /// Attach a file under a different name
    pub fn named(file: impl Into<PathBuf>, name: &str) -> Self {
        Self {
            file: file.into(),
            name: Some(name.to_string()),
        }
    }

    /// The name the attachment is delivered under
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self
                .file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}
