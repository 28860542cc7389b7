//! Wire types for the Dropbox v1 chunked upload API.
//!
//! Only the payloads the chunked upload flow exchanges live here: the
//! resumable [`UploadSession`] returned by `chunked_upload` and the
//! [`FileMetadata`] returned by `commit_chunked_upload`.

pub mod constants;
pub mod types;

// Re-export primary types for convenience.
pub use constants::Root;
pub use types::{FileMetadata, UploadSession};
