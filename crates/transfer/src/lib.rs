//! Resumable chunked upload with retry and progress tracking.
//!
//! The [`ChunkedUploader`] pulls bytes from a [`ChunkSource`], pushes them
//! through a [`RemoteStorage`] one chunk at a time, threading the
//! [`UploadSession`](dropchunk_protocol::UploadSession) returned by each
//! call into the next, and commits the session once the source runs dry.
//!
//! # Pipeline
//!
//! 1. **Validate** the destination path
//! 2. **Fetch** the first chunk (must be non-empty)
//! 3. **Upload** chunks, gated by the offset the server acknowledges
//! 4. **Commit** the session as a file

mod chunked;
mod error;
mod progress;
mod remote;
mod retry;
mod source;
mod types;
mod validation;

pub use chunked::ChunkedUploader;
pub use error::{RemoteError, UploadError};
pub use progress::{ProgressCallback, ProgressEvent, ThroughputMeter};
pub use remote::{RemoteFuture, RemoteStorage};
pub use retry::RetryPolicy;
pub use source::{ChunkSource, FileChunkSource, MemoryChunkSource};
pub use types::UploadRequest;
pub use validation::normalize_remote_path;

/// Default chunk size: 4 MiB.
///
/// The coordinator never picks a size itself; this is only what the
/// built-in sources fall back to when asked for a zero chunk size.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;
