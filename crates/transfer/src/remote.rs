//! Remote storage seam used by the coordinator.
//!
//! The HTTP client crate implements [`RemoteStorage`] on top of the real
//! API. Keeping it a trait leaves the coordinator free of transport
//! details and testable with in-memory mocks.

use std::future::Future;
use std::pin::Pin;

use dropchunk_protocol::{FileMetadata, UploadSession};

use crate::RemoteError;

/// Boxed future returned by [`RemoteStorage`] methods.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RemoteError>> + Send + 'a>>;

/// Server side of a resumable upload.
pub trait RemoteStorage: Send + Sync {
    /// Appends `data` to the session and returns the server's new session state.
    ///
    /// With an empty `session` (no upload id) the server allocates a new one.
    fn upload_chunk<'a>(
        &'a self,
        session: &'a UploadSession,
        data: &'a [u8],
    ) -> RemoteFuture<'a, UploadSession>;

    /// Turns the bytes accumulated in `session` into the file at `path`.
    ///
    /// `parent_rev`, when set, must match the current revision of the file
    /// being replaced.
    fn commit_upload<'a>(
        &'a self,
        session: &'a UploadSession,
        path: &'a str,
        overwrite: bool,
        parent_rev: Option<&'a str>,
    ) -> RemoteFuture<'a, FileMetadata>;
}
