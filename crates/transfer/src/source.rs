use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::DEFAULT_CHUNK_SIZE;

/// Supplies the bytes of an upload, one chunk at a time.
///
/// The coordinator asks for the chunk starting at the offset the server
/// last acknowledged. Returning an empty chunk signals there is no more
/// data. Returning an error aborts the upload.
///
/// Any `FnMut(u64) -> io::Result<Vec<u8>>` closure is a chunk source.
pub trait ChunkSource: Send {
    fn next_chunk(&mut self, offset: u64) -> std::io::Result<Vec<u8>>;
}

impl<F> ChunkSource for F
where
    F: FnMut(u64) -> std::io::Result<Vec<u8>> + Send,
{
    fn next_chunk(&mut self, offset: u64) -> std::io::Result<Vec<u8>> {
        self(offset)
    }
}

/// Serves a local file in fixed-size chunks.
///
/// Reads are positioned by the requested offset, not by a running cursor,
/// so a chunk can be served again after a retry.
pub struct FileChunkSource {
    file: std::fs::File,
    chunk_size: usize,
    position: u64,
    file_size: u64,
}

impl FileChunkSource {
    /// Opens `path` for chunked reading.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] is used.
    pub fn open(path: &Path, chunk_size: usize) -> std::io::Result<Self> {
        let file = std::fs::File::open(path)?;
        let file_size = file.metadata()?.len();
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Ok(Self {
            file,
            chunk_size,
            position: 0,
            file_size,
        })
    }

    /// Size of the file when it was opened. Reads below this size that come
    /// up short fail with [`UnexpectedEof`](std::io::ErrorKind::UnexpectedEof).
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl ChunkSource for FileChunkSource {
    fn next_chunk(&mut self, offset: u64) -> std::io::Result<Vec<u8>> {
        if offset >= self.file_size {
            return Ok(Vec::new());
        }
        if offset != self.position {
            self.file.seek(SeekFrom::Start(offset))?;
            self.position = offset;
        }

        let want = (self.file_size - offset).min(self.chunk_size as u64);
        let mut buf = Vec::with_capacity(want as usize);
        (&mut self.file).take(want).read_to_end(&mut buf)?;
        self.position += buf.len() as u64;

        // The file shrank after it was opened; an empty or short chunk here
        // would end the upload early and commit a truncated file.
        if (buf.len() as u64) < want {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "file shrank during upload: expected {want} bytes at offset {offset}, read {}",
                    buf.len()
                ),
            ));
        }
        Ok(buf)
    }
}

/// Serves an in-memory buffer in fixed-size chunks.
pub struct MemoryChunkSource {
    data: Vec<u8>,
    chunk_size: usize,
}

impl MemoryChunkSource {
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] is used.
    pub fn new(data: Vec<u8>, chunk_size: usize) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self { data, chunk_size }
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ChunkSource for MemoryChunkSource {
    fn next_chunk(&mut self, offset: u64) -> std::io::Result<Vec<u8>> {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(Vec::new());
        };
        if start >= self.data.len() {
            return Ok(Vec::new());
        }
        let end = start.saturating_add(self.chunk_size).min(self.data.len());
        Ok(self.data[start..end].to_vec())
    }
}
