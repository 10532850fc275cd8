//! UI-agnostic transcript types
//!
//! These are shared by every front end and don't depend on any UI framework.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A single item in the chat transcript.
///
/// Each variant carries exactly the data its role allows: user entries hold either text or an
/// image, loading placeholders hold nothing, system replies always hold text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatEntry {
    UserText(String),
    UserImage(ImageRef),
    Loading,
    System(String),
}

/// The role of a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    System,
    Loading,
}

impl ChatEntry {
    pub fn role(&self) -> ChatRole {
        match self {
            ChatEntry::UserText(_) | ChatEntry::UserImage(_) => ChatRole::User,
            ChatEntry::Loading => ChatRole::Loading,
            ChatEntry::System(_) => ChatRole::System,
        }
    }

    /// Text body, present for user text entries and system replies
    pub fn content(&self) -> Option<&str> {
        match self {
            ChatEntry::UserText(text) | ChatEntry::System(text) => Some(text),
            _ => None,
        }
    }

    /// Image reference, present only for user image entries
    pub fn image(&self) -> Option<&ImageRef> {
        match self {
            ChatEntry::UserImage(image) => Some(image),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ChatEntry::Loading)
    }
}

/// Local reference to an image the user sent, used for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub path: PathBuf,
    pub mime_type: Option<String>,
}

impl ImageRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mime_type = crate::imaging::mime_type_for_path(&path).map(str::to_string);
        Self { path, mime_type }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name for display, falling back to the full path
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}
