use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// State of a resumable upload as reported by the server.
///
/// The default value is the empty session sent with the first chunk: no
/// id, offset 0. Every successful chunk upload returns a replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSession {
    /// Opaque session id, allocated by the server on the first chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    /// Bytes the server has durably accepted so far.
    #[serde(default)]
    pub offset: u64,
    /// RFC 2822 expiry timestamp of the server-side session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
}

impl UploadSession {
    /// Returns `true` once the server has allocated a session id.
    pub fn has_upload_id(&self) -> bool {
        self.upload_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    /// Returns the session id, treating an empty string as absent.
    pub fn upload_id(&self) -> Option<&str> {
        self.upload_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Parses the expiry timestamp. `None` if absent or malformed.
    pub fn expires_at(&self) -> Option<DateTime<FixedOffset>> {
        self.expires
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
    }
}

/// Metadata of a file or folder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Human-readable size, e.g. `"225.4KB"`.
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub bytes: u64,
    pub path: String,
    #[serde(default)]
    pub is_dir: bool,
    #[serde(default)]
    pub is_deleted: bool,
    /// Revision id; pass it back as `parent_rev` to guard an overwrite.
    #[serde(default)]
    pub rev: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default)]
    pub thumb_exists: bool,
    #[serde(default)]
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_mtime: Option<String>,
    #[serde(default)]
    pub root: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Deprecated numeric revision.
    #[serde(default)]
    pub revision: i64,
}

impl FileMetadata {
    /// Parses the server modification time.
    pub fn modified_at(&self) -> Option<DateTime<FixedOffset>> {
        self.modified
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
    }

    /// Returns the last path component.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}
