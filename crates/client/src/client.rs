//! Dropbox chunked upload client.
//!
//! Async HTTP client using `reqwest` with Bearer token authentication.

use std::time::Duration;

use dropchunk_protocol::constants::{
    API_CONTENT_URL, API_VERSION, CHUNKED_UPLOAD_ENDPOINT, COMMIT_CHUNKED_UPLOAD_ENDPOINT,
};
use dropchunk_protocol::{FileMetadata, Root, UploadSession};
use dropchunk_transfer::{RemoteError, RemoteFuture, RemoteStorage};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

/// Characters left unescaped in a path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Errors from building the client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid access token")]
    InvalidToken,
}

/// Client settings.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Namespace paths are resolved against.
    pub root: Root,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

/// Dropbox API client.
pub struct DropboxClient {
    http: reqwest::Client,
    content_url: String,
    root: Root,
}

impl DropboxClient {
    /// Creates a new client authenticated with an OAuth2 access token.
    pub fn new(access_token: &str, options: ClientOptions) -> Result<Self, ClientError> {
        if access_token.is_empty() {
            return Err(ClientError::InvalidToken);
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {access_token}"))
                .map_err(|_| ClientError::InvalidToken)?,
        );

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            content_url: API_CONTENT_URL.to_string(),
            root: options.root,
        })
    }

    /// Sets a custom content URL (for testing).
    #[cfg(test)]
    pub(crate) fn with_content_url(mut self, url: String) -> Self {
        self.content_url = url;
        self
    }

    pub fn root(&self) -> Root {
        self.root
    }

    /// Sends one chunk. The session id and offset are only sent once the
    /// server has allocated a session.
    async fn send_chunk(
        &self,
        session: &UploadSession,
        data: &[u8],
    ) -> Result<UploadSession, RemoteError> {
        let url = format!(
            "{}/{}/{}",
            self.content_url, API_VERSION, CHUNKED_UPLOAD_ENDPOINT
        );

        let mut req = self
            .http
            .put(&url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data.to_vec());
        if let Some(id) = session.upload_id() {
            req = req.query(&[("upload_id", id.to_string()), ("offset", session.offset.to_string())]);
        }

        trace!(offset = session.offset, len = data.len(), "PUT chunked_upload");
        let resp = req.send().await.map_err(transport_error)?;
        read_json(resp).await
    }

    /// Commits the session as the file at `path`.
    async fn send_commit(
        &self,
        session: &UploadSession,
        path: &str,
        overwrite: bool,
        parent_rev: Option<&str>,
    ) -> Result<FileMetadata, RemoteError> {
        let Some(upload_id) = session.upload_id() else {
            return Err(RemoteError::Protocol(
                "cannot commit a session without upload_id".into(),
            ));
        };

        let url = format!(
            "{}/{}/{}/{}{}",
            self.content_url,
            API_VERSION,
            COMMIT_CHUNKED_UPLOAD_ENDPOINT,
            self.root,
            encode_path(path)
        );

        let mut form = vec![
            ("overwrite", overwrite.to_string()),
            ("upload_id", upload_id.to_string()),
        ];
        if let Some(rev) = parent_rev.filter(|r| !r.is_empty()) {
            form.push(("parent_rev", rev.to_string()));
        }

        debug!(path, upload_id, offset = session.offset, "POST commit_chunked_upload");
        let resp = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(transport_error)?;
        read_json(resp).await
    }
}

impl RemoteStorage for DropboxClient {
    fn upload_chunk<'a>(
        &'a self,
        session: &'a UploadSession,
        data: &'a [u8],
    ) -> RemoteFuture<'a, UploadSession> {
        Box::pin(self.send_chunk(session, data))
    }

    fn commit_upload<'a>(
        &'a self,
        session: &'a UploadSession,
        path: &'a str,
        overwrite: bool,
        parent_rev: Option<&'a str>,
    ) -> RemoteFuture<'a, FileMetadata> {
        Box::pin(self.send_commit(session, path, overwrite, parent_rev))
    }
}

/// Content API success statuses.
fn is_success(status: StatusCode) -> bool {
    status == StatusCode::OK || status == StatusCode::PARTIAL_CONTENT
}

/// Checks the status and decodes a JSON body.
async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, RemoteError> {
    let status = resp.status();
    if !is_success(status) {
        let body = resp.text().await.unwrap_or_default();
        return Err(RemoteError::Transport {
            status: Some(status.as_u16()),
            body,
        });
    }

    let body = resp.bytes().await.map_err(transport_error)?;
    serde_json::from_slice(&body)
        .map_err(|e| RemoteError::Protocol(format!("invalid response body: {e}")))
}

fn transport_error(e: reqwest::Error) -> RemoteError {
    RemoteError::Transport {
        status: e.status().map(|s| s.as_u16()),
        body: e.to_string(),
    }
}

/// Percent-encodes each path segment, keeping `/` separators and a leading `/`.
fn encode_path(path: &str) -> String {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let mut out = String::with_capacity(path.len() + 1);
    for segment in trimmed.split('/') {
        out.push('/');
        out.extend(utf8_percent_encode(segment, PATH_SEGMENT));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropchunk_transfer::{ChunkedUploader, MemoryChunkSource, UploadRequest};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// A request as seen by the mock server.
    #[derive(Debug)]
    struct Captured {
        head: String,
        body: Vec<u8>,
    }

    impl Captured {
        fn request_line(&self) -> &str {
            self.head.lines().next().unwrap_or_default()
        }

        fn header(&self, name: &str) -> Option<&str> {
            self.head.lines().skip(1).find_map(|line| {
                let (k, v) = line.split_once(':')?;
                k.eq_ignore_ascii_case(name).then(|| v.trim())
            })
        }
    }

    async fn read_request(stream: &mut TcpStream) -> Captured {
        let mut buf = Vec::new();
        let mut tmp = [0u8; 8192];
        let head_end = loop {
            let n = stream.read(&mut tmp).await.unwrap();
            if n == 0 {
                break buf.len();
            }
            buf.extend_from_slice(&tmp[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
        let mut captured = Captured {
            head,
            body: buf[head_end..].to_vec(),
        };
        let len: usize = captured
            .header("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        while captured.body.len() < len {
            let n = stream.read(&mut tmp).await.unwrap();
            if n == 0 {
                break;
            }
            captured.body.extend_from_slice(&tmp[..n]);
        }
        captured
    }

    /// Starts a mock HTTP server that answers each connection with the
    /// next scripted `(status, body)` and returns the captured requests.
    async fn mock_server(
        responses: Vec<(u16, &str)>,
    ) -> (String, tokio::task::JoinHandle<Vec<Captured>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}");
        let responses: Vec<(u16, String)> = responses
            .into_iter()
            .map(|(s, b)| (s, b.to_string()))
            .collect();

        let handle = tokio::spawn(async move {
            let mut captured = Vec::new();
            for (status, body) in responses {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                captured.push(read_request(&mut stream).await);

                let resp = format!(
                    "HTTP/1.1 {status} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
            captured
        });

        (url, handle)
    }

    fn client(url: String) -> DropboxClient {
        DropboxClient::new("test-token", ClientOptions::default())
            .unwrap()
            .with_content_url(url)
    }

    fn session(id: &str, offset: u64) -> UploadSession {
        UploadSession {
            upload_id: Some(id.into()),
            offset,
            expires: None,
        }
    }

    #[test]
    fn empty_token_rejected() {
        let err = DropboxClient::new("", ClientOptions::default()).err().unwrap();
        assert!(matches!(err, ClientError::InvalidToken));
    }

    #[test]
    fn token_with_newline_rejected() {
        assert!(DropboxClient::new("abc\ndef", ClientOptions::default()).is_err());
    }

    #[test]
    fn sandbox_root_option() {
        let client = DropboxClient::new(
            "t",
            ClientOptions {
                root: Root::Sandbox,
                timeout: Some(Duration::from_secs(5)),
            },
        )
        .unwrap();
        assert_eq!(client.root(), Root::Sandbox);
    }

    #[test]
    fn encode_path_escapes_segments() {
        assert_eq!(encode_path("/My Docs/a&b.txt"), "/My%20Docs/a%26b.txt");
        assert_eq!(encode_path("plain/file-1_2.~x"), "/plain/file-1_2.~x");
        assert_eq!(encode_path("/caf\u{e9}.txt"), "/caf%C3%A9.txt");
    }

    #[tokio::test]
    async fn first_chunk_has_no_session_params() {
        let (url, handle) = mock_server(vec![(
            200,
            r#"{"upload_id":"abc","offset":5,"expires":"Tue, 19 Jul 2011 21:55:38 +0000"}"#,
        )])
        .await;

        let next = client(url)
            .upload_chunk(&UploadSession::default(), b"hello")
            .await
            .unwrap();
        assert_eq!(next.upload_id(), Some("abc"));
        assert_eq!(next.offset, 5);

        let reqs = handle.await.unwrap();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].request_line(), "PUT /1/chunked_upload HTTP/1.1");
        assert_eq!(reqs[0].header("authorization"), Some("Bearer test-token"));
        assert_eq!(reqs[0].body, b"hello");
    }

    #[tokio::test]
    async fn later_chunks_send_session_params() {
        let (url, handle) =
            mock_server(vec![(200, r#"{"upload_id":"abc","offset":10}"#)]).await;

        let next = client(url)
            .upload_chunk(&session("abc", 5), b"world")
            .await
            .unwrap();
        assert_eq!(next.offset, 10);

        let reqs = handle.await.unwrap();
        assert_eq!(
            reqs[0].request_line(),
            "PUT /1/chunked_upload?upload_id=abc&offset=5 HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn chunk_server_error_maps_to_transport() {
        let (url, handle) = mock_server(vec![(500, r#"{"error":"Internal Server Error"}"#)]).await;

        let err = client(url)
            .upload_chunk(&UploadSession::default(), b"x")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RemoteError::Transport {
                status: Some(500),
                body: r#"{"error":"Internal Server Error"}"#.into(),
            }
        );
        handle.abort();
    }

    #[tokio::test]
    async fn partial_content_is_success() {
        let (url, handle) = mock_server(vec![(206, r#"{"upload_id":"p","offset":1}"#)]).await;

        let next = client(url)
            .upload_chunk(&UploadSession::default(), b"x")
            .await
            .unwrap();
        assert_eq!(next.upload_id(), Some("p"));
        handle.abort();
    }

    #[tokio::test]
    async fn bad_json_maps_to_protocol() {
        let (url, handle) = mock_server(vec![(200, "not json")]).await;

        let err = client(url)
            .upload_chunk(&UploadSession::default(), b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Protocol(_)));
        handle.abort();
    }

    #[tokio::test]
    async fn connection_refused_has_no_status() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = client(format!("http://127.0.0.1:{port}"))
            .upload_chunk(&UploadSession::default(), b"x")
            .await
            .unwrap_err();
        match err {
            RemoteError::Transport { status, .. } => assert_eq!(status, None),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn commit_sends_form_fields() {
        let (url, handle) = mock_server(vec![(
            200,
            r#"{"size":"10 bytes","bytes":10,"path":"/My Docs/report.pdf","rev":"2a","is_dir":false,"root":"dropbox"}"#,
        )])
        .await;

        let meta = client(url)
            .commit_upload(&session("abc", 10), "/My Docs/report.pdf", false, Some("1f"))
            .await
            .unwrap();
        assert_eq!(meta.bytes, 10);
        assert_eq!(meta.rev, "2a");

        let reqs = handle.await.unwrap();
        assert_eq!(
            reqs[0].request_line(),
            "POST /1/commit_chunked_upload/dropbox/My%20Docs/report.pdf HTTP/1.1"
        );
        let form = String::from_utf8(reqs[0].body.clone()).unwrap();
        assert_eq!(form, "overwrite=false&upload_id=abc&parent_rev=1f");
    }

    #[tokio::test]
    async fn commit_omits_empty_parent_rev_and_uses_sandbox() {
        let (url, handle) = mock_server(vec![(200, r#"{"path":"/a.bin","bytes":1}"#)]).await;

        let client = DropboxClient::new(
            "t",
            ClientOptions {
                root: Root::Sandbox,
                timeout: None,
            },
        )
        .unwrap()
        .with_content_url(url);
        client
            .commit_upload(&session("abc", 1), "/a.bin", true, Some(""))
            .await
            .unwrap();

        let reqs = handle.await.unwrap();
        assert_eq!(
            reqs[0].request_line(),
            "POST /1/commit_chunked_upload/sandbox/a.bin HTTP/1.1"
        );
        let form = String::from_utf8(reqs[0].body.clone()).unwrap();
        assert_eq!(form, "overwrite=true&upload_id=abc");
    }

    #[tokio::test]
    async fn commit_conflict_maps_to_transport() {
        let (url, handle) = mock_server(vec![(409, r#"{"error":"conflict"}"#)]).await;

        let err = client(url)
            .commit_upload(&session("abc", 1), "/a.bin", false, Some("old"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Transport { status: Some(409), .. }));
        handle.abort();
    }

    #[tokio::test]
    async fn commit_without_session_is_rejected_locally() {
        let client = client("http://127.0.0.1:9".into());
        let err = client
            .commit_upload(&UploadSession::default(), "/a.bin", true, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Protocol(_)));
    }

    #[tokio::test]
    async fn coordinator_over_http() {
        let (url, handle) = mock_server(vec![
            (200, r#"{"upload_id":"s1","offset":4}"#),
            (200, r#"{"upload_id":"s1","offset":8}"#),
            (200, r#"{"upload_id":"s1","offset":10}"#),
            (200, r#"{"path":"/data.bin","bytes":10,"rev":"9"}"#),
        ])
        .await;

        let client = client(url);
        let uploader = ChunkedUploader::new(&client);
        let mut source = MemoryChunkSource::new(b"0123456789".to_vec(), 4);
        let meta = uploader
            .run(&mut source, &UploadRequest::new("data.bin"))
            .await
            .unwrap();
        assert_eq!(meta.bytes, 10);

        let reqs = handle.await.unwrap();
        assert_eq!(reqs.len(), 4);
        let body: Vec<u8> = reqs[..3].iter().flat_map(|r| r.body.clone()).collect();
        assert_eq!(body, b"0123456789");
        assert!(reqs[2].request_line().contains("upload_id=s1&offset=8"));
        assert!(reqs[3].request_line().starts_with("POST /1/commit_chunked_upload/dropbox/data.bin"));
    }
}
