//! Readers that can be sniffed and then re-read for upload.
//!
//! Content sniffing reads ahead of the upload, so the stream handed to the
//! image service must be able to go back to where sniffing started. Rust
//! readers have no `mark`/`reset`, so [`ImageStream`] carries that capability
//! explicitly:
//!
//! - [`ImageStream::seekable`]: mark records the stream position, reset seeks back
//! - [`ImageStream::buffered`]: a [`MarkableReader`] records bytes read after the
//!   mark (up to a limit) and replays them after reset
//! - [`ImageStream::forward_only`]: no mark support at all

use bytes::Bytes;
use std::io::{self, Cursor, SeekFrom};
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt, ReadBuf};

/// Boxed forward-only reader
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Reader that can also seek
pub trait SeekableRead: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> SeekableRead for T {}

/// Byte stream passed to stream uploads
pub struct ImageStream {
    inner: Inner,
}

enum Inner {
    Seekable {
        reader: Box<dyn SeekableRead>,
        mark: Option<u64>,
    },
    Buffered(MarkableReader<BoxedReader>),
    Forward(BoxedReader),
}

impl ImageStream {
    /// Wrap a reader that supports seeking
    pub fn seekable<R: AsyncRead + AsyncSeek + Send + Unpin + 'static>(reader: R) -> Self {
        Self {
            inner: Inner::Seekable {
                reader: Box::new(reader),
                mark: None,
            },
        }
    }

    /// Wrap any reader in a mark/reset buffer
    pub fn buffered<R: AsyncRead + Send + Unpin + 'static>(reader: R) -> Self {
        Self {
            inner: Inner::Buffered(MarkableReader::new(Box::new(reader))),
        }
    }

    /// Wrap a reader that can only be read once
    pub fn forward_only<R: AsyncRead + Send + Unpin + 'static>(reader: R) -> Self {
        Self {
            inner: Inner::Forward(Box::new(reader)),
        }
    }

    /// In-memory stream
    pub fn from_bytes<B: Into<Bytes>>(bytes: B) -> Self {
        Self::seekable(Cursor::new(bytes.into()))
    }

    /// Whether [`mark`](Self::mark) and [`reset`](Self::reset) are available
    pub fn supports_mark(&self) -> bool {
        !matches!(self.inner, Inner::Forward(_))
    }

    /// Remember the current position.
    ///
    /// `read_limit` is the number of bytes the caller may read before the
    /// mark is lost. Seekable streams ignore it.
    pub async fn mark(&mut self, read_limit: usize) -> io::Result<()> {
        match &mut self.inner {
            Inner::Seekable { reader, mark } => {
                *mark = Some(reader.stream_position().await?);
                Ok(())
            }
            Inner::Buffered(reader) => {
                reader.mark(read_limit);
                Ok(())
            }
            Inner::Forward(_) => Err(mark_unsupported()),
        }
    }

    /// Return to the last mark
    pub async fn reset(&mut self) -> io::Result<()> {
        match &mut self.inner {
            Inner::Seekable { reader, mark } => {
                let position = mark.ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "stream has not been marked")
                })?;
                reader.seek(SeekFrom::Start(position)).await?;
                Ok(())
            }
            Inner::Buffered(reader) => reader.reset(),
            Inner::Forward(_) => Err(mark_unsupported()),
        }
    }

    /// Drop the mark so later reads are no longer recorded
    pub fn unmark(&mut self) {
        match &mut self.inner {
            Inner::Seekable { mark, .. } => *mark = None,
            Inner::Buffered(reader) => reader.unmark(),
            Inner::Forward(_) => {}
        }
    }
}

impl std::fmt::Debug for ImageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.inner {
            Inner::Seekable { .. } => "seekable",
            Inner::Buffered(_) => "buffered",
            Inner::Forward(_) => "forward_only",
        };
        f.debug_struct("ImageStream").field("kind", &kind).finish()
    }
}

impl AsyncRead for ImageStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            Inner::Seekable { reader, .. } => Pin::new(reader).poll_read(cx, buf),
            Inner::Buffered(reader) => Pin::new(reader).poll_read(cx, buf),
            Inner::Forward(reader) => Pin::new(reader).poll_read(cx, buf),
        }
    }
}

fn mark_unsupported() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "stream does not support mark/reset")
}

/// Bytes recorded since the last mark
#[derive(Debug)]
struct Recording {
    limit: usize,
    bytes: Vec<u8>,
    invalidated: bool,
}

impl Recording {
    fn record(&mut self, chunk: &[u8]) {
        if self.invalidated || chunk.is_empty() {
            return;
        }
        if self.bytes.len() + chunk.len() > self.limit {
            self.invalidated = true;
            self.bytes = Vec::new();
        } else {
            self.bytes.extend_from_slice(chunk);
        }
    }
}

/// Adds mark/reset to a forward-only reader by recording what is read
/// after the mark.
///
/// Reading more than the mark's limit invalidates it; a later
/// [`reset`](Self::reset) then fails instead of rewinding to a wrong offset.
#[derive(Debug)]
pub struct MarkableReader<R> {
    inner: R,
    recording: Option<Recording>,
    replay: Vec<u8>,
    replay_pos: usize,
}

impl<R> MarkableReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            recording: None,
            replay: Vec::new(),
            replay_pos: 0,
        }
    }

    /// Start recording; up to `limit` bytes may be read before the mark is lost
    pub fn mark(&mut self, limit: usize) {
        self.recording = Some(Recording {
            limit,
            bytes: Vec::with_capacity(limit.min(8 * 1024)),
            invalidated: false,
        });
    }

    /// Replay everything read since the mark. The mark stays in place.
    pub fn reset(&mut self) -> io::Result<()> {
        let recording = self.recording.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "stream has not been marked")
        })?;

        if recording.invalidated {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("mark invalidated: more than {} bytes read since mark", recording.limit),
            ));
        }

        let mut replay = std::mem::take(&mut recording.bytes);
        replay.extend_from_slice(&self.replay[self.replay_pos..]);
        self.replay = replay;
        self.replay_pos = 0;
        Ok(())
    }

    /// Stop recording. Bytes already queued for replay are still returned.
    pub fn unmark(&mut self) {
        self.recording = None;
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for MarkableReader<R> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.replay_pos < this.replay.len() {
            let n = (this.replay.len() - this.replay_pos).min(buf.remaining());
            let chunk = &this.replay[this.replay_pos..this.replay_pos + n];
            buf.put_slice(chunk);
            if let Some(recording) = this.recording.as_mut() {
                recording.record(chunk);
            }
            this.replay_pos += n;
            if this.replay_pos == this.replay.len() {
                this.replay.clear();
                this.replay_pos = 0;
            }
            return Poll::Ready(Ok(()));
        }

        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        if let Some(recording) = this.recording.as_mut() {
            recording.record(&buf.filled()[before..]);
        }
        Poll::Ready(Ok(()))
    }
}
