use std::fmt;

use serde::{Deserialize, Serialize};

/// Base URL for content endpoints (uploads, downloads).
pub const API_CONTENT_URL: &str = "https://api-content.dropbox.com";

/// API version segment prepended to every endpoint path.
pub const API_VERSION: &str = "1";

/// Endpoint that accepts one chunk of a resumable upload.
pub const CHUNKED_UPLOAD_ENDPOINT: &str = "chunked_upload";

/// Endpoint that turns a finished upload session into a file.
pub const COMMIT_CHUNKED_UPLOAD_ENDPOINT: &str = "commit_chunked_upload";

/// Namespace a path is resolved against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Root {
    /// Full Dropbox access.
    #[default]
    #[serde(rename = "dropbox")]
    Dropbox,
    /// App folder access.
    #[serde(rename = "sandbox")]
    Sandbox,
}

impl Root {
    /// Returns the URL segment for this root.
    pub fn as_str(&self) -> &'static str {
        match self {
            Root::Dropbox => "dropbox",
            Root::Sandbox => "sandbox",
        }
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
