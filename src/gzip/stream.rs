//! Bounded-memory streaming between a byte source, the GZIP codec and a sink.
//!
//! Reads are gathered into a list of chunks; whenever the gathered size
//! reaches `once_size` the chunks are joined, pushed through the codec and the
//! result is written out. End of input is the zero-length read of `Read`.

use std::fs::{self, File};
use std::io::{self, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use tracing::{debug, trace};

use super::{unix_seconds, GzipDecoder, GzipEncoder, GzipOptions};
use crate::error::{CompressError, CompressionLevel, Result};
use crate::zlib::os_code;

/// Sources above this size get the larger block.
const LARGE_SOURCE: u64 = 50 * 1024 * 1024;

/// Progress of a streaming operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Source bytes consumed so far.
    pub bytes_processed: u64,
    /// Expected source size; 0 when unknown.
    pub total_bytes: u64,
}

impl Progress {
    /// Percentage of the source consumed, with two decimals, e.g. `"42.00%"`.
    ///
    /// An unknown or empty source reports `"100.00%"`.
    pub fn percent(&self) -> String {
        if self.total_bytes == 0 {
            return "100.00%".to_string();
        }
        let ratio = 100.0 * self.bytes_processed as f64 / self.total_bytes as f64;
        format!("{ratio:.2}%")
    }
}

/// Block sizing for the streaming adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// Gathered bytes that trigger a codec call.
    pub once_size: usize,
    /// Read buffer size.
    pub chunk_size: usize,
    /// Expected source size, for progress.
    pub total_size: u64,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            once_size: 512 * 1024,
            chunk_size: 16 * 1024,
            total_size: 0,
        }
    }
}

impl StreamOptions {
    /// Options scaled to a source of `total_size` bytes.
    pub fn for_size(total_size: u64) -> Self {
        let once_size = if total_size > LARGE_SOURCE {
            1024 * 1024
        } else {
            512 * 1024
        };
        Self {
            once_size,
            total_size,
            ..Self::default()
        }
    }
}

/// A codec driven one block at a time.
pub trait BlockCodec {
    /// Process one block, returning the output ready so far.
    fn push_block(&mut self, block: &[u8]) -> Result<Vec<u8>>;

    /// End the stream, returning the remaining output.
    fn finish_stream(&mut self) -> Result<Vec<u8>>;
}

impl BlockCodec for GzipEncoder {
    fn push_block(&mut self, block: &[u8]) -> Result<Vec<u8>> {
        self.write(block)
    }

    fn finish_stream(&mut self) -> Result<Vec<u8>> {
        self.finish()
    }
}

impl BlockCodec for GzipDecoder {
    fn push_block(&mut self, block: &[u8]) -> Result<Vec<u8>> {
        self.write(block)
    }

    fn finish_stream(&mut self) -> Result<Vec<u8>> {
        self.finish()
    }
}

/// Gathers writes into blocks of `once_size` bytes before handing them to a codec.
pub struct ChunkWriter<C, W, F> {
    codec: C,
    sink: W,
    sink_path: Option<PathBuf>,
    chunks: Vec<Vec<u8>>,
    chunk_bytes: usize,
    once_size: usize,
    processed: u64,
    total: u64,
    on_progress: F,
}

impl<C, W, F> ChunkWriter<C, W, F>
where
    C: BlockCodec,
    W: Write,
    F: FnMut(&Progress),
{
    pub fn new(codec: C, sink: W, options: &StreamOptions, on_progress: F) -> Self {
        Self {
            codec,
            sink,
            sink_path: None,
            chunks: Vec::new(),
            chunk_bytes: 0,
            once_size: options.once_size.max(1),
            processed: 0,
            total: options.total_size,
            on_progress,
        }
    }

    /// Attach a path to sink write errors.
    pub fn with_sink_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.sink_path = Some(path.into());
        self
    }

    /// Buffer `data`; a full block is pushed through the codec immediately.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.chunks.push(data.to_vec());
        self.chunk_bytes += data.len();
        self.processed += data.len() as u64;
        if self.chunk_bytes >= self.once_size {
            self.flush_block()?;
            self.report();
        }
        Ok(data.len())
    }

    /// Push the last block, end the codec stream and flush the sink.
    pub fn finish(mut self) -> Result<W> {
        if !self.chunks.is_empty() {
            self.flush_block()?;
        }
        let tail = self.codec.finish_stream()?;
        self.emit(&tail)?;
        if let Err(e) = self.sink.flush() {
            return Err(self.sink_error(e));
        }
        self.report();
        debug!(bytes = self.processed, "stream finished");
        Ok(self.sink)
    }

    /// Source bytes accepted so far.
    pub fn bytes_processed(&self) -> u64 {
        self.processed
    }

    fn flush_block(&mut self) -> Result<()> {
        let block = self.chunks.concat();
        self.chunks.clear();
        self.chunk_bytes = 0;
        let out = self.codec.push_block(&block)?;
        trace!(block = block.len(), out = out.len(), "block flushed");
        self.emit(&out)
    }

    fn emit(&mut self, out: &[u8]) -> Result<()> {
        match self.sink.write_all(out) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.sink_error(e)),
        }
    }

    fn sink_error(&self, source: io::Error) -> CompressError {
        match &self.sink_path {
            Some(path) => CompressError::file_write(path, source),
            None => CompressError::Io(source),
        }
    }

    fn report(&mut self) {
        (self.on_progress)(&Progress {
            bytes_processed: self.processed,
            total_bytes: self.total,
        });
    }
}

/// Read `source` to its end through `writer`.
fn pump<R, C, W, F>(
    mut source: R,
    mut writer: ChunkWriter<C, W, F>,
    chunk_size: usize,
    source_path: Option<&Path>,
) -> Result<W>
where
    R: Read,
    C: BlockCodec,
    W: Write,
    F: FnMut(&Progress),
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(match source_path {
                    Some(path) => CompressError::file_read(path, e),
                    None => CompressError::Io(e),
                })
            }
        };
        writer.write(&buf[..n])?;
    }
    writer.finish()
}

/// GZIP-compress everything `source` yields into `sink`, returning the sink.
pub fn compress<R, W, F>(
    source: R,
    sink: W,
    gzip: GzipOptions,
    options: &StreamOptions,
    on_progress: F,
) -> Result<W>
where
    R: Read,
    W: Write,
    F: FnMut(&Progress),
{
    let writer = ChunkWriter::new(GzipEncoder::new(gzip)?, sink, options, on_progress);
    pump(source, writer, options.chunk_size, None)
}

/// Decompress the GZIP member `source` yields into `sink`, returning the sink.
pub fn decompress<R, W, F>(source: R, sink: W, options: &StreamOptions, on_progress: F) -> Result<W>
where
    R: Read,
    W: Write,
    F: FnMut(&Progress),
{
    let writer = ChunkWriter::new(GzipDecoder::new()?, sink, options, on_progress);
    pump(source, writer, options.chunk_size, None)
}

type ProgressCallback = Box<dyn FnMut(&Progress)>;

/// File-to-file GZIP compression with progress reporting.
///
/// ```no_run
/// use compress_rs::GzipStream;
///
/// GzipStream::new()
///     .on_progress(|p| println!("{}", p.percent()))
///     .compress("big.log", "big.log.gz")
///     .unwrap();
/// ```
#[derive(Default)]
pub struct GzipStream {
    level: CompressionLevel,
    on_progress: Option<ProgressCallback>,
}

impl GzipStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: CompressionLevel) -> Self {
        self.level = level;
        self
    }

    /// Register the progress callback.
    pub fn on_progress(mut self, callback: impl FnMut(&Progress) + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Compress `src` into `dest`, recording the file name and mtime of `src`.
    pub fn compress(&mut self, src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
        let (src, dest) = (src.as_ref(), dest.as_ref());
        let meta = fs::metadata(src).map_err(|e| CompressError::file_open(src, e))?;
        let mtime = meta
            .modified()
            .map(|t| unix_seconds(OffsetDateTime::from(t)))
            .unwrap_or(0);
        let gzip = GzipOptions {
            level: self.level,
            timestamp: Some(mtime),
            name: src.file_name().map(|n| n.to_string_lossy().into_owned()),
            os: os_code(),
        };
        debug!(src = %src.display(), dest = %dest.display(), size = meta.len(), "gzip compress");

        let options = StreamOptions::for_size(meta.len());
        let reader = File::open(src).map_err(|e| CompressError::file_open(src, e))?;
        let sink = BufWriter::new(File::create(dest).map_err(|e| CompressError::file_open(dest, e))?);
        let callback = &mut self.on_progress;
        let writer = ChunkWriter::new(GzipEncoder::new(gzip)?, sink, &options, |p: &Progress| {
            if let Some(cb) = callback.as_mut() {
                cb(p)
            }
        })
        .with_sink_path(dest);
        pump(reader, writer, options.chunk_size, Some(src))?;
        Ok(())
    }

    /// Decompress the GZIP file `src` into `dest`.
    pub fn uncompress(&mut self, src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
        let (src, dest) = (src.as_ref(), dest.as_ref());
        let meta = fs::metadata(src).map_err(|e| CompressError::file_open(src, e))?;
        debug!(src = %src.display(), dest = %dest.display(), size = meta.len(), "gzip uncompress");

        let options = StreamOptions::for_size(meta.len());
        let reader = File::open(src).map_err(|e| CompressError::file_open(src, e))?;
        let sink = BufWriter::new(File::create(dest).map_err(|e| CompressError::file_open(dest, e))?);
        let callback = &mut self.on_progress;
        let writer = ChunkWriter::new(GzipDecoder::new()?, sink, &options, |p: &Progress| {
            if let Some(cb) = callback.as_mut() {
                cb(p)
            }
        })
        .with_sink_path(dest);
        pump(reader, writer, options.chunk_size, Some(src))?;
        Ok(())
    }
}

/// Compress the file `src` into `dest`.
pub fn gzip_file(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
    GzipStream::new().compress(src, dest)
}

/// Decompress the GZIP file `src` into `dest`.
pub fn gunzip_file(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
    GzipStream::new().uncompress(src, dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gzip::{gunzip, gzip_with};

    fn fixed() -> GzipOptions {
        GzipOptions {
            timestamp: Some(1_600_000_000),
            name: Some("data.txt".to_string()),
            os: 3,
            ..GzipOptions::default()
        }
    }

    /// Hands out at most `step` bytes per read.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_percent() {
        let p = Progress {
            bytes_processed: 1,
            total_bytes: 3,
        };
        assert_eq!(p.percent(), "33.33%");
        let p = Progress {
            bytes_processed: 42,
            total_bytes: 100,
        };
        assert_eq!(p.percent(), "42.00%");
        let p = Progress {
            bytes_processed: 0,
            total_bytes: 0,
        };
        assert_eq!(p.percent(), "100.00%");
    }

    #[test]
    fn test_for_size() {
        assert_eq!(StreamOptions::for_size(10).once_size, 512 * 1024);
        assert_eq!(StreamOptions::for_size(LARGE_SOURCE).once_size, 512 * 1024);
        assert_eq!(StreamOptions::for_size(LARGE_SOURCE + 1).once_size, 1024 * 1024);
    }

    #[test]
    fn test_short_reads_are_not_end_of_stream() {
        let data = b"line of text\n".repeat(2000);
        let options = StreamOptions {
            once_size: 1000,
            chunk_size: 4096,
            total_size: data.len() as u64,
        };
        let source = Trickle {
            data: &data,
            step: 7,
        };
        let packed = compress(source, Vec::new(), fixed(), &options, |_| {}).unwrap();
        assert_eq!(packed, gzip_with(&data, fixed()).unwrap());
    }

    #[test]
    fn test_progress_reports() {
        let data = vec![b'x'; 10_000];
        let options = StreamOptions {
            once_size: 4000,
            chunk_size: 1000,
            total_size: data.len() as u64,
        };
        let mut seen = Vec::new();
        compress(&data[..], Vec::new(), fixed(), &options, |p| {
            seen.push(p.percent())
        })
        .unwrap();
        assert_eq!(seen, ["40.00%", "80.00%", "100.00%"]);
    }

    #[test]
    fn test_decompress_roundtrip() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 97) as u8).collect();
        let packed = gzip_with(&data, fixed()).unwrap();
        let options = StreamOptions {
            once_size: 3000,
            chunk_size: 512,
            total_size: packed.len() as u64,
        };
        let out = decompress(&packed[..], Vec::new(), &options, |_| {}).unwrap();
        assert_eq!(out, data);
        assert_eq!(gunzip(&packed).unwrap(), data);
    }

    #[test]
    fn test_decompress_corrupt() {
        let mut packed = gzip_with(b"payload payload payload", fixed()).unwrap();
        let len = packed.len();
        packed[len - 6] ^= 0xFF;
        let err = decompress(&packed[..], Vec::new(), &StreamOptions::default(), |_| {}).unwrap_err();
        assert!(matches!(err, CompressError::ChecksumMismatch { .. }));
    }
}
