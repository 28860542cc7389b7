//! Chunked upload coordinator.
//!
//! Drives one upload session from the first chunk to the commit. The loop
//! is iterative: each accepted chunk replaces the session value and the
//! next chunk is fetched at the offset the server acknowledged, so a file
//! split into any number of chunks runs in constant stack depth.

use dropchunk_protocol::{FileMetadata, UploadSession};
use tracing::{debug, info, trace, warn};

use crate::progress::{ProgressCallback, ProgressEvent};
use crate::remote::RemoteStorage;
use crate::retry::RetryPolicy;
use crate::source::ChunkSource;
use crate::types::UploadRequest;
use crate::validation::normalize_remote_path;
use crate::UploadError;

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    Uploading,
    Committing,
    Done,
    Failed,
}

/// Uploads a stream of chunks as a single remote file.
pub struct ChunkedUploader<'a> {
    remote: &'a dyn RemoteStorage,
    progress: Option<ProgressCallback>,
    retry: RetryPolicy,
}

impl<'a> ChunkedUploader<'a> {
    /// Creates an uploader that talks to `remote`.
    pub fn new(remote: &'a dyn RemoteStorage) -> Self {
        Self {
            remote,
            progress: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Registers a callback invoked once per accepted chunk.
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Sets the backoff used between retries of a failed chunk.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Runs the upload to completion and returns the committed file's metadata.
    ///
    /// Fails with [`UploadError::EmptyInput`] before any network call if the
    /// source has nothing at offset 0. Transport failures are retried per
    /// chunk up to `request.max_retries` times; everything else aborts the
    /// run. No cleanup request is sent on failure, the server expires the
    /// session on its own.
    pub async fn run<S>(
        &self,
        source: &mut S,
        request: &UploadRequest,
    ) -> Result<FileMetadata, UploadError>
    where
        S: ChunkSource + ?Sized,
    {
        let mut phase = Phase::Uninitialized;
        let result = self.drive(source, request, &mut phase).await;
        match &result {
            Ok(meta) => {
                enter(&mut phase, Phase::Done);
                info!(path = %meta.path, bytes = meta.bytes, rev = %meta.rev, "chunked upload committed");
            }
            Err(e) => {
                warn!(phase = ?phase, error = %e, "chunked upload failed");
                enter(&mut phase, Phase::Failed);
            }
        }
        result
    }

    async fn drive<S>(
        &self,
        source: &mut S,
        request: &UploadRequest,
        phase: &mut Phase,
    ) -> Result<FileMetadata, UploadError>
    where
        S: ChunkSource + ?Sized,
    {
        let path = normalize_remote_path(&request.path)?;
        let mut session = UploadSession::default();
        let mut chunks_completed: u64 = 0;
        let mut chunks_failed: u64 = 0;

        let mut chunk = fetch(source, &session)?;
        if chunk.is_empty() {
            return Err(UploadError::EmptyInput);
        }

        info!(
            path = %path,
            size_hint = ?request.total_size_hint,
            max_retries = request.retry_budget(),
            "starting chunked upload"
        );
        enter(phase, Phase::Uploading);

        loop {
            let next = self
                .upload_with_retry(&session, &chunk, request, &mut chunks_failed)
                .await?;
            check_advance(&session, &next, chunk.len())?;
            session = next;
            chunks_completed += 1;

            debug!(
                upload_id = session.upload_id().unwrap_or_default(),
                offset = session.offset,
                chunk_len = chunk.len(),
                chunks_completed,
                "chunk accepted"
            );
            self.report(ProgressEvent {
                upload_id: session.upload_id().unwrap_or_default().to_string(),
                chunks_completed,
                chunks_failed,
                bytes_transferred: session.offset,
                total_size_hint: request.total_size_hint,
            });

            if request.size_reached(session.offset) {
                debug!(offset = session.offset, "size hint reached");
                break;
            }

            chunk = fetch(source, &session)?;
            if chunk.is_empty() {
                break;
            }
        }

        enter(phase, Phase::Committing);
        self.remote
            .commit_upload(&session, &path, request.overwrite, request.parent_rev())
            .await
            .map_err(|e| UploadError::from_remote(e, &session))
    }

    /// Sends one chunk, retrying transport failures against the same session.
    async fn upload_with_retry(
        &self,
        session: &UploadSession,
        chunk: &[u8],
        request: &UploadRequest,
        chunks_failed: &mut u64,
    ) -> Result<UploadSession, UploadError> {
        let budget = request.retry_budget();
        let mut attempt: u32 = 0;

        loop {
            match self.remote.upload_chunk(session, chunk).await {
                Ok(next) => return Ok(next),
                Err(err) if err.is_transient() && attempt < budget => {
                    attempt += 1;
                    *chunks_failed += 1;
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        upload_id = session.upload_id().unwrap_or_default(),
                        offset = session.offset,
                        attempt,
                        max_retries = budget,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "chunk upload failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    *chunks_failed += 1;
                    return Err(UploadError::from_remote(err, session));
                }
            }
        }
    }

    fn report(&self, event: ProgressEvent) {
        if let Some(cb) = &self.progress {
            cb(event);
        }
    }
}

fn enter(phase: &mut Phase, next: Phase) {
    trace!(from = ?*phase, to = ?next, "upload phase");
    *phase = next;
}

/// Asks the source for the chunk at the session's acknowledged offset.
fn fetch<S>(source: &mut S, session: &UploadSession) -> Result<Vec<u8>, UploadError>
where
    S: ChunkSource + ?Sized,
{
    source
        .next_chunk(session.offset)
        .map_err(|e| UploadError::Source {
            offset: session.offset,
            source: e,
            last_session: session.has_upload_id().then(|| session.clone()),
        })
}

/// Rejects a server session that does not follow from the previous one.
fn check_advance(
    prev: &UploadSession,
    next: &UploadSession,
    sent: usize,
) -> Result<(), UploadError> {
    let fail = |message: String| UploadError::Protocol {
        message,
        last_session: prev.has_upload_id().then(|| prev.clone()),
    };

    let Some(next_id) = next.upload_id() else {
        return Err(fail("chunk upload response has no upload_id".into()));
    };
    if let Some(prev_id) = prev.upload_id()
        && prev_id != next_id
    {
        return Err(fail(format!(
            "server switched upload_id from {prev_id} to {next_id}"
        )));
    }
    if next.offset <= prev.offset && sent > 0 {
        return Err(fail(format!(
            "server offset did not advance: {} -> {}",
            prev.offset, next.offset
        )));
    }
    if next.offset > prev.offset.saturating_add(sent as u64) {
        return Err(fail(format!(
            "server acknowledged {} bytes but only {sent} were sent",
            next.offset - prev.offset
        )));
    }
    Ok(())
}
