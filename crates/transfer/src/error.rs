//! Upload error types.

use dropchunk_protocol::UploadSession;

/// Failure reported by a [`RemoteStorage`](crate::RemoteStorage) call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The request failed or the server answered with a non-success status.
    ///
    /// `status` is `None` when no response was received at all.
    #[error("transport error{}: {body}", fmt_status(.status))]
    Transport { status: Option<u16>, body: String },

    /// The response could not be decoded as the expected payload.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl RemoteError {
    /// Returns `true` for failures worth retrying against the same session:
    /// no response at all, a 5xx, or 429 Too Many Requests.
    ///
    /// Other 4xx answers (bad token, wrong offset, conflict) fail the same way
    /// on every attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Transport { status: None, .. } => true,
            RemoteError::Transport {
                status: Some(code), ..
            } => *code == 429 || (500..600).contains(code),
            RemoteError::Protocol(_) => false,
        }
    }
}

/// Errors produced by a chunked upload run.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The chunk source returned no data for offset 0. Nothing was sent.
    #[error("aborting chunked upload: chunk source returned no data on first call")]
    EmptyInput,

    /// The destination path was rejected before any data was read.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The chunk source itself failed.
    #[error("chunk source failed at offset {offset}: {source}")]
    Source {
        offset: u64,
        #[source]
        source: std::io::Error,
        last_session: Option<UploadSession>,
    },

    /// An upload or commit request failed at the transport level.
    #[error("transport error{}: {body}", fmt_status(.status))]
    Transport {
        status: Option<u16>,
        body: String,
        last_session: Option<UploadSession>,
    },

    /// The server answered with something that is not a valid payload.
    #[error("protocol error: {message}")]
    Protocol {
        message: String,
        last_session: Option<UploadSession>,
    },
}

impl UploadError {
    /// Wraps a remote failure, recording the last session the server accepted.
    pub(crate) fn from_remote(err: RemoteError, last_session: &UploadSession) -> Self {
        let last_session = last_session.has_upload_id().then(|| last_session.clone());
        match err {
            RemoteError::Transport { status, body } => UploadError::Transport {
                status,
                body,
                last_session,
            },
            RemoteError::Protocol(message) => UploadError::Protocol {
                message,
                last_session,
            },
        }
    }

    /// HTTP status of a transport failure, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            UploadError::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// The last session the server acknowledged before the failure.
    ///
    /// `None` means no chunk was ever accepted.
    pub fn last_session(&self) -> Option<&UploadSession> {
        match self {
            UploadError::Source { last_session, .. }
            | UploadError::Transport { last_session, .. }
            | UploadError::Protocol { last_session, .. } => last_session.as_ref(),
            UploadError::EmptyInput | UploadError::InvalidPath(_) => None,
        }
    }

    /// Returns `true` if a transfer was in progress when the run failed,
    /// `false` if nothing had been accepted by the server.
    pub fn transfer_started(&self) -> bool {
        self.last_session().is_some()
    }
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {code})"),
        None => String::new(),
    }
}
