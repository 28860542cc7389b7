/// Parameters of one chunked upload run.
///
/// Immutable once the run starts. Built with [`UploadRequest::new`] and the
/// `with_*` methods; `overwrite` defaults to `true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Destination path of the committed file.
    pub path: String,
    /// Replace an existing file at `path` instead of renaming the upload.
    pub overwrite: bool,
    /// Revision the existing file must still have for the commit to apply.
    pub parent_revision: Option<String>,
    /// Total bytes the caller expects to send. Stops fetching once reached.
    pub total_size_hint: Option<u64>,
    /// Extra attempts allowed per chunk after a transport failure.
    pub max_retries: Option<u32>,
}

impl UploadRequest {
    /// Creates a request for `path` with default options.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            overwrite: true,
            parent_revision: None,
            total_size_hint: None,
            max_retries: None,
        }
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_parent_revision(mut self, rev: impl Into<String>) -> Self {
        self.parent_revision = Some(rev.into());
        self
    }

    pub fn with_total_size_hint(mut self, bytes: u64) -> Self {
        self.total_size_hint = Some(bytes);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Number of retries allowed per chunk. `None` means none.
    pub(crate) fn retry_budget(&self) -> u32 {
        self.max_retries.unwrap_or(0)
    }

    /// Parent revision, with an empty string treated as absent.
    pub(crate) fn parent_rev(&self) -> Option<&str> {
        self.parent_revision.as_deref().filter(|r| !r.is_empty())
    }

    /// Returns `true` once `offset` has reached the caller's size hint.
    pub(crate) fn size_reached(&self, offset: u64) -> bool {
        self.total_size_hint.is_some_and(|total| offset >= total)
    }
}
