//! Dropbox API client for resumable chunked uploads.
//!
//! Implements [`RemoteStorage`](dropchunk_transfer::RemoteStorage) on top of
//! the v1 `chunked_upload` and `commit_chunked_upload` endpoints.

pub mod client;

pub use client::{ClientError, ClientOptions, DropboxClient};
