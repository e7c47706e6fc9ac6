//! Content sources the upload task slices from
//!
//! Every source hands out exactly the bytes of the requested [`ByteRange`] or
//! fails with [`Error::ContentRead`]. Short data is never returned.

use crate::error::{Error, Result};
use crate::range::ByteRange;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

/// Capability to extract the bytes of a range from some content representation
#[async_trait]
pub trait ContentSource: Send {
    /// Display name of the content (usually a file name)
    fn name(&self) -> &str;

    /// Total size of the content in bytes
    fn size(&self) -> u64;

    /// Bytes covered by `range`, exactly `range.len()` of them
    async fn slice(&mut self, range: ByteRange) -> Result<Bytes>;
}

/// Validate that `range` lies within content of `size` bytes and return its
/// bounds as unsigned offsets.
fn checked_bounds(range: ByteRange, size: u64) -> Result<(u64, u64)> {
    if range.is_empty() {
        return Err(Error::content_read("Cannot slice an empty range"));
    }
    let (start, end) = (range.min_value() as u64, range.max_value() as u64);
    if end >= size {
        return Err(Error::content_read(format!(
            "Range {} exceeds content size of {} bytes",
            range, size
        )));
    }
    Ok((start, end))
}

/// In-memory content
#[derive(Debug, Clone)]
pub struct BufferSource {
    name: String,
    data: Bytes,
}

impl BufferSource {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

#[async_trait]
impl ContentSource for BufferSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn slice(&mut self, range: ByteRange) -> Result<Bytes> {
        let (start, end) = checked_bounds(range, self.size())?;
        Ok(self.data.slice(start as usize..=end as usize))
    }
}

/// Content arriving incrementally from a stream of chunks.
///
/// Chunks are accumulated until a requested range is covered. Bytes of the
/// most recent range stay buffered so the same range can be sliced again after
/// a failed send; anything before it is dropped and cannot be requested.
pub struct StreamSource<S> {
    name: String,
    size: u64,
    stream: S,
    buffer: Vec<u8>,
    /// Content offset of `buffer[0]`
    buffer_start: u64,
}

impl<S> StreamSource<S> {
    /// Wrap `stream`, which must yield exactly `size` bytes in total
    pub fn new(name: impl Into<String>, size: u64, stream: S) -> Self {
        Self {
            name: name.into(),
            size,
            stream,
            buffer: Vec::new(),
            buffer_start: 0,
        }
    }
}

impl<R> StreamSource<ReaderStream<R>>
where
    R: AsyncRead + Unpin + Send,
{
    /// Stream the content of an async reader
    pub fn from_reader(name: impl Into<String>, size: u64, reader: R) -> Self {
        Self::new(name, size, ReaderStream::new(reader))
    }
}

#[async_trait]
impl<S, B> ContentSource for StreamSource<S>
where
    S: Stream<Item = std::io::Result<B>> + Unpin + Send,
    B: AsRef<[u8]> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn slice(&mut self, range: ByteRange) -> Result<Bytes> {
        let (start, end) = checked_bounds(range, self.size)?;

        if start < self.buffer_start {
            return Err(Error::content_read(format!(
                "Stream cannot rewind to byte {}, earliest buffered byte is {}",
                start, self.buffer_start
            )));
        }

        loop {
            let behind = (start - self.buffer_start).min(self.buffer.len() as u64) as usize;
            if behind > 0 {
                self.buffer.drain(..behind);
                self.buffer_start += behind as u64;
            }

            let buffered_end = self.buffer_start + self.buffer.len() as u64;
            if self.buffer_start == start && buffered_end > end {
                break;
            }

            match self.stream.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    return Err(Error::content_read_io(
                        format!("Failed reading {} for range {}", self.name, range),
                        e,
                    ))
                }
                None => {
                    return Err(Error::content_read(format!(
                        "Stream {} ended after {} bytes, range {} needs {}",
                        self.name,
                        buffered_end,
                        range,
                        end + 1
                    )))
                }
            }
        }

        let len = range.len() as usize;
        Ok(Bytes::copy_from_slice(&self.buffer[..len]))
    }
}

/// Content read lazily from a file on disk
#[derive(Debug)]
pub struct FileSource {
    name: String,
    size: u64,
    file: File,
}

impl FileSource {
    /// Open `path` and record its current size
    pub async fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).await.map_err(|e| {
            Error::content_read_io(format!("Cannot open {}", path.display()), e)
        })?;
        let size = file
            .metadata()
            .await
            .map_err(|e| Error::content_read_io(format!("Cannot stat {}", path.display()), e))?
            .len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self { name, size, file })
    }
}

#[async_trait]
impl ContentSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn slice(&mut self, range: ByteRange) -> Result<Bytes> {
        let (start, _) = checked_bounds(range, self.size)?;
        let mut buffer = vec![0u8; range.len() as usize];

        self.file
            .seek(SeekFrom::Start(start))
            .await
            .map_err(|e| Error::content_read_io(format!("Cannot seek {} to {}", self.name, start), e))?;
        self.file
            .read_exact(&mut buffer)
            .await
            .map_err(|e| Error::content_read_io(format!("Short read of {} for range {}", self.name, range), e))?;

        Ok(Bytes::from(buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn range(min: i64, max: i64) -> ByteRange {
        ByteRange::new(min, max).unwrap()
    }

    #[tokio::test]
    async fn test_buffer_slice() {
        let mut source = BufferSource::new("data.bin", b"0123456789".to_vec());
        assert_eq!(source.size(), 10);
        assert_eq!(&source.slice(range(2, 5)).await.unwrap()[..], b"2345");
        assert_eq!(&source.slice(range(9, 9)).await.unwrap()[..], b"9");
    }

    #[tokio::test]
    async fn test_buffer_slice_out_of_bounds() {
        let mut source = BufferSource::new("data.bin", b"0123".to_vec());
        let err = source.slice(range(2, 4)).await.unwrap_err();
        assert_eq!(err.name(), "ContentReadError");
        assert!(source.slice(ByteRange::EMPTY).await.is_err());
    }

    #[tokio::test]
    async fn test_stream_slices_across_chunk_boundaries() {
        let reader = tokio_test::io::Builder::new()
            .read(b"abc")
            .read(b"defgh")
            .read(b"ij")
            .build();
        let mut source = StreamSource::from_reader("stream.bin", 10, reader);

        assert_eq!(&source.slice(range(0, 3)).await.unwrap()[..], b"abcd");
        assert_eq!(&source.slice(range(4, 8)).await.unwrap()[..], b"efghi");
        assert_eq!(&source.slice(range(9, 9)).await.unwrap()[..], b"j");
    }

    #[tokio::test]
    async fn test_stream_repeats_current_range() {
        let chunks = futures::stream::iter(vec![
            Ok::<_, std::io::Error>(b"hello ".to_vec()),
            Ok(b"world".to_vec()),
        ]);
        let mut source = StreamSource::new("greeting", 11, chunks);

        assert_eq!(&source.slice(range(0, 4)).await.unwrap()[..], b"hello");
        assert_eq!(&source.slice(range(0, 4)).await.unwrap()[..], b"hello");
        assert_eq!(&source.slice(range(6, 10)).await.unwrap()[..], b"world");

        let err = source.slice(range(0, 4)).await.unwrap_err();
        assert!(err.to_string().contains("cannot rewind"));
    }

    #[tokio::test]
    async fn test_stream_skips_ahead() {
        let chunks = futures::stream::iter(vec![
            Ok::<_, std::io::Error>(b"0123".to_vec()),
            Ok(b"4567".to_vec()),
            Ok(b"89".to_vec()),
        ]);
        let mut source = StreamSource::new("digits", 10, chunks);
        assert_eq!(&source.slice(range(5, 8)).await.unwrap()[..], b"5678");
    }

    #[tokio::test]
    async fn test_stream_premature_end() {
        let chunks = futures::stream::iter(vec![Ok::<_, std::io::Error>(b"abc".to_vec())]);
        let mut source = StreamSource::new("short", 10, chunks);
        let err = source.slice(range(0, 5)).await.unwrap_err();
        assert_eq!(err.name(), "ContentReadError");
        assert!(err.to_string().contains("ended after 3 bytes"));
    }

    #[tokio::test]
    async fn test_stream_read_error_keeps_cause() {
        let reader = tokio_test::io::Builder::new()
            .read(b"ab")
            .read_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"))
            .build();
        let mut source = StreamSource::from_reader("broken", 8, reader);
        let err = source.slice(range(0, 7)).await.unwrap_err();
        match err {
            Error::ContentRead { source, .. } => {
                assert_eq!(source.unwrap().kind(), std::io::ErrorKind::BrokenPipe)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_file_source() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"The quick brown fox").unwrap();
        tmp.flush().unwrap();

        let mut source = FileSource::open(tmp.path()).await.unwrap();
        assert_eq!(source.size(), 19);
        assert_eq!(&source.slice(range(4, 8)).await.unwrap()[..], b"quick");
        assert_eq!(&source.slice(range(0, 2)).await.unwrap()[..], b"The");
        assert!(source.slice(range(10, 19)).await.is_err());
    }

    #[tokio::test]
    async fn test_file_source_short_read_after_truncation() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[7u8; 64]).unwrap();
        tmp.flush().unwrap();

        let mut source = FileSource::open(tmp.path()).await.unwrap();
        tmp.as_file().set_len(16).unwrap();

        let err = source.slice(range(8, 40)).await.unwrap_err();
        assert_eq!(err.name(), "ContentReadError");
    }

    #[tokio::test]
    async fn test_file_source_directory_is_content_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileSource::open(dir.path()).await;
        // Opening a directory succeeds on some platforms; slicing it never does
        let err = match result {
            Ok(mut source) => source.slice(range(0, 0)).await.unwrap_err(),
            Err(err) => err,
        };
        assert_eq!(err.name(), "ContentReadError");
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let err = FileSource::open(Path::new("/definitely/not/here.bin"))
            .await
            .unwrap_err();
        assert_eq!(err.name(), "ContentReadError");
    }
}
