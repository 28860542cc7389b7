//! Upload orchestrator: wires config, client, chunk source and progress output.

use std::io;
use std::time::Duration;

use anyhow::{Context, bail};
use dropchunk_client::{ClientOptions, DropboxClient};
use dropchunk_protocol::{FileMetadata, Root};
use dropchunk_transfer::{
    ChunkSource, ChunkedUploader, FileChunkSource, ProgressEvent, ThroughputMeter, UploadRequest,
};
use tokio_util::sync::CancellationToken;

use crate::args::Args;
use crate::config::{Config, TOKEN_ENV, config_path};

/// Uploads `args.local_file` and returns the committed file's metadata.
pub async fn run(config: Config, args: Args) -> anyhow::Result<FileMetadata> {
    if config.access_token.is_empty() {
        bail!(
            "no access token: set access_token in {} or {TOKEN_ENV}",
            config_path()?.display()
        );
    }

    let client = DropboxClient::new(
        &config.access_token,
        ClientOptions {
            root: if config.sandbox { Root::Sandbox } else { Root::Dropbox },
            timeout: config.request_timeout(),
        },
    )?;

    let chunk_size = args.chunk_size.unwrap_or(config.chunk_size);
    let file = FileChunkSource::open(&args.local_file, chunk_size)
        .with_context(|| format!("cannot open {}", args.local_file.display()))?;
    let total = file.file_size();
    let request = build_request(&config, &args, total);

    tracing::info!(
        file = %args.local_file.display(),
        remote = %args.remote_path,
        bytes = total,
        chunk_size = file.chunk_size(),
        "uploading"
    );

    // -- Ctrl-C --
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping after the current chunk");
                cancel.cancel();
            }
        })
    };

    let meter = ThroughputMeter::new(Some(Duration::from_secs(10)), None);
    let uploader = ChunkedUploader::new(&client).on_progress(Box::new(move |event| {
        meter.record(event.bytes_transferred);
        eprintln!("{}", render_progress(&event, &meter));
    }));

    let mut source = cancellable(file, cancel);
    let result = uploader.run(&mut source, &request).await;
    watcher.abort();

    result.with_context(|| format!("upload of {} failed", args.local_file.display()))
}

fn build_request(config: &Config, args: &Args, total: u64) -> UploadRequest {
    let mut request = UploadRequest::new(args.remote_path.clone())
        .with_overwrite(args.overwrite)
        .with_total_size_hint(total)
        .with_max_retries(args.max_retries.unwrap_or(config.max_retries));
    if let Some(rev) = &args.parent_rev {
        request = request.with_parent_revision(rev.clone());
    }
    request
}

/// Wraps a source so that it fails with `Interrupted` once `cancel` fires.
///
/// Returning an empty chunk instead would end the upload and commit a
/// truncated file.
fn cancellable<S>(
    mut inner: S,
    cancel: CancellationToken,
) -> impl FnMut(u64) -> io::Result<Vec<u8>> + Send
where
    S: ChunkSource,
{
    move |offset| {
        if cancel.is_cancelled() {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "upload cancelled"));
        }
        inner.next_chunk(offset)
    }
}

fn render_progress(event: &ProgressEvent, meter: &ThroughputMeter) -> String {
    let mut line = format_bytes(event.bytes_transferred);
    if let Some(total) = event.total_size_hint {
        line.push_str(&format!(" / {}", format_bytes(total)));
        if let Some(fraction) = event.fraction() {
            line.push_str(&format!(" ({:.1}%)", fraction * 100.0));
        }
    }

    let speed = meter.bytes_per_second();
    if speed > 0.0 {
        line.push_str(&format!(", {}/s", format_bytes(speed as u64)));
        if let Some(eta) = event.total_size_hint.and_then(|t| meter.eta(t)) {
            line.push_str(&format!(", eta {}s", eta.as_secs()));
        }
    }

    if event.chunks_failed > 0 {
        line.push_str(&format!(", {} retried", event.chunks_failed));
    }
    line
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
