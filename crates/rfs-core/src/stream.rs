//! Chunked content streaming
//!
//! Files are read one fixed-size chunk at a time so a transfer never holds
//! more than a single chunk in memory, however large the file or however
//! slow the client.

use crate::artifact::{CleanupAction, Finalizer, StreamOutcome, StreamableArtifact};
use crate::error::{RfsError, Result};
use crate::inspector::guess_mime;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::fmt;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// Chunk size used when none is configured
pub const DEFAULT_CHUNK_SIZE: usize = 512;

/// Opens files as lazy chunk streams
#[derive(Debug, Clone, Copy)]
pub struct ContentStreamer {
    chunk_size: usize,
}

impl Default for ContentStreamer {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl ContentStreamer {
    /// Create a streamer; a zero chunk size is bumped to one byte.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Open `path` for streaming, running `on_complete` when the stream ends.
    pub async fn open(
        &self,
        path: &Path,
        on_complete: Option<CleanupAction>,
    ) -> Result<ContentStream> {
        let filename = crate::inspector::display_name(path);
        let mut artifact = StreamableArtifact::new(path, filename);
        artifact.cleanup = on_complete;
        self.open_artifact(artifact).await
    }

    /// Take ownership of an artifact and stream its file.
    ///
    /// The artifact's cleanup runs exactly once whatever happens next: when
    /// the stream ends, fails, is dropped, or when opening fails.
    pub async fn open_artifact(&self, artifact: StreamableArtifact) -> Result<ContentStream> {
        let (path, filename, finalizer) = artifact.into_parts();

        // Opening a FIFO or device can block forever, so check first.
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| RfsError::from_io(&path, e))?;
        if !metadata.is_file() {
            return Err(RfsError::NotFound(path));
        }
        let file = File::open(&path)
            .await
            .map_err(|e| RfsError::from_io(&path, e))?;

        debug!(
            "Streaming {} as {} ({} bytes, {} byte chunks)",
            path.display(),
            filename,
            metadata.len(),
            self.chunk_size
        );

        Ok(ContentStream {
            mime_type: guess_mime(Path::new(&filename)),
            filename,
            content_length: metadata.len(),
            inner: chunk_stream(file, self.chunk_size, finalizer),
        })
    }
}

/// A lazy sequence of file chunks plus the headers needed to send them
pub struct ContentStream {
    pub filename: String,
    pub mime_type: String,
    /// File size when the stream was opened
    pub content_length: u64,
    inner: BoxStream<'static, io::Result<Bytes>>,
}

impl Stream for ContentStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl fmt::Debug for ContentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentStream")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

struct ReadState<R> {
    reader: R,
    chunk_size: usize,
    finalizer: Finalizer,
}

/// Turn a reader into a stream of `chunk_size` chunks (the last may be
/// shorter). The finalizer fires with `Completed` once the consumer polls
/// past the last chunk, with `Failed` on a read error, and with `Abandoned`
/// if the stream is dropped first.
pub(crate) fn chunk_stream<R>(
    reader: R,
    chunk_size: usize,
    finalizer: Finalizer,
) -> BoxStream<'static, io::Result<Bytes>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let state = ReadState {
        reader,
        chunk_size,
        finalizer,
    };

    stream::unfold(Some(state), |state| async move {
        let mut state = state?;
        match read_chunk(&mut state.reader, state.chunk_size).await {
            Ok(chunk) if chunk.is_empty() => {
                state.finalizer.finish(StreamOutcome::Completed);
                None
            }
            Ok(chunk) => Some((Ok(chunk), Some(state))),
            Err(e) => {
                state.finalizer.finish(StreamOutcome::Failed);
                Some((Err(e), None))
            }
        }
    })
    .boxed()
}

/// Read until `chunk_size` bytes are buffered or end-of-file.
async fn read_chunk<R>(reader: &mut R, chunk_size: usize) -> io::Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::zeroed(chunk_size);
    let mut filled = 0;
    while filled < chunk_size {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf.freeze())
}
