//! GZIP container codec (RFC 1952).
//!
//! A GZIP member is a 10-byte header, optional metadata fields, a raw DEFLATE
//! payload and an 8-byte trailer holding the CRC-32 and the size (mod 2^32) of
//! the uncompressed data. Both trailer values are always verified on decode.

mod stream;

pub use stream::{
    compress, decompress, gunzip_file, gzip_file, BlockCodec, ChunkWriter, GzipStream, Progress,
    StreamOptions,
};

use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::error::{CompressError, CompressionLevel, Result, ReturnCode};
use crate::zlib::header::{FCOMMENT, FEXTRA, FHCRC, FNAME, FRESERVED, FTEXT};
use crate::zlib::{
    crc32, inflate_raw, os_code, Crc32, Deflate, DeflateOptions, Flush, GzHeader, Inflate,
    InflateOptions,
};

/// First magic byte.
pub const ID1: u8 = 0x1F;
/// Second magic byte.
pub const ID2: u8 = 0x8B;
/// The only compression method GZIP defines.
pub const CM_DEFLATE: u8 = 8;

const HEADER_LEN: usize = 10;
const TRAILER_LEN: usize = 8;

/// Options for framing a GZIP member.
#[derive(Debug, Clone)]
pub struct GzipOptions {
    pub level: CompressionLevel,
    /// MTIME in seconds since the epoch; `None` stamps the current time.
    pub timestamp: Option<u32>,
    /// Original file name; any directory part is dropped.
    pub name: Option<String>,
    /// Operating system byte.
    pub os: u8,
}

impl Default for GzipOptions {
    fn default() -> Self {
        Self {
            level: CompressionLevel::default(),
            timestamp: None,
            name: None,
            os: os_code(),
        }
    }
}

impl GzipOptions {
    fn header(&self) -> GzHeader {
        GzHeader {
            time: self.timestamp.unwrap_or_else(unix_now),
            os: self.os,
            name: self.name.as_deref().map(base_name).filter(|n| !n.is_empty()),
            ..GzHeader::default()
        }
    }
}

/// XFL byte: 4 for the fastest preset, 2 for maximum compression.
fn extra_flags(level: CompressionLevel) -> u8 {
    match level {
        CompressionLevel::FASTEST => 4,
        CompressionLevel::BEST => 2,
        _ => 0,
    }
}

fn base_name(name: &str) -> String {
    name.rsplit(['/', '\\']).next().unwrap_or(name).to_string()
}

pub(crate) fn unix_seconds(time: OffsetDateTime) -> u32 {
    time.unix_timestamp().clamp(0, u32::MAX as i64) as u32
}

fn unix_now() -> u32 {
    unix_seconds(OffsetDateTime::now_utc())
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Parse a GZIP header from the start of `buf`.
///
/// Returns the header and its length, or `None` when `buf` ends inside the
/// header. Bad magic bytes or an unknown method fail as soon as they are seen.
pub fn read_header(buf: &[u8]) -> Result<Option<(GzHeader, usize)>> {
    if buf.first().is_some_and(|&b| b != ID1) || buf.get(1).is_some_and(|&b| b != ID2) {
        return Err(CompressError::format("Not a GZIP file"));
    }
    if buf.get(2).is_some_and(|&b| b != CM_DEFLATE) {
        return Err(CompressError::format("Unsupported compression method"));
    }
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }

    let flags = buf[3];
    if flags & FRESERVED != 0 {
        return Err(CompressError::format("unknown header flags set"));
    }
    let mut header = GzHeader {
        text: flags & FTEXT != 0,
        time: le_u32(&buf[4..8]),
        xflags: buf[8],
        os: buf[9],
        ..GzHeader::default()
    };
    let mut pos = HEADER_LEN;

    if flags & FEXTRA != 0 {
        let Some(len) = buf.get(pos..pos + 2) else {
            return Ok(None);
        };
        let len = u16::from_le_bytes([len[0], len[1]]) as usize;
        pos += 2;
        let Some(extra) = buf.get(pos..pos + len) else {
            return Ok(None);
        };
        header.extra = Some(extra.to_vec());
        pos += len;
    }
    for (flag, field) in [(FNAME, &mut header.name), (FCOMMENT, &mut header.comment)] {
        if flags & flag == 0 {
            continue;
        }
        let Some(end) = buf[pos..].iter().position(|&b| b == 0) else {
            return Ok(None);
        };
        *field = Some(String::from_utf8_lossy(&buf[pos..pos + end]).into_owned());
        pos += end + 1;
    }
    if flags & FHCRC != 0 {
        let Some(stored) = buf.get(pos..pos + 2) else {
            return Ok(None);
        };
        if u16::from_le_bytes([stored[0], stored[1]]) != crc32(0, &buf[..pos]) as u16 {
            return Err(CompressError::format("header crc mismatch"));
        }
        header.hcrc = true;
        pos += 2;
    }

    header.done = true;
    Ok(Some((header, pos)))
}

/// Compare a trailer with the CRC-32 and length of the decoded data.
fn verify_trailer(trailer: &[u8], crc: u32, size: u64) -> Result<()> {
    let expected = le_u32(&trailer[..4]);
    if expected != crc {
        warn!(expected, actual = crc, "gzip checksum mismatch");
        return Err(CompressError::ChecksumMismatch {
            expected,
            actual: crc,
        });
    }
    let expected = le_u32(&trailer[4..8]);
    if u64::from(expected) != size & 0xFFFF_FFFF {
        warn!(expected, actual = size, "gzip size mismatch");
        return Err(CompressError::SizeMismatch {
            expected,
            actual: size,
        });
    }
    Ok(())
}

/// Compress `input` into a GZIP member with the default options.
pub fn gzip(input: &[u8]) -> Result<Vec<u8>> {
    gzip_with(input, GzipOptions::default())
}

/// Compress `input` into a GZIP member.
pub fn gzip_with(input: &[u8], options: GzipOptions) -> Result<Vec<u8>> {
    let mut encoder = GzipEncoder::new(options)?;
    let mut out = encoder.write(input)?;
    out.extend(encoder.finish()?);
    Ok(out)
}

/// Decompress a complete GZIP member.
///
/// Everything between the header and the last 8 bytes is inflated as raw
/// DEFLATE, then the trailer CRC-32 and size are checked.
pub fn gunzip(input: &[u8]) -> Result<Vec<u8>> {
    let (_, start) = read_header(input)?
        .ok_or_else(|| CompressError::format("Not a GZIP file: truncated header"))?;
    if input.len() < start + TRAILER_LEN {
        return Err(CompressError::format("Not a GZIP file: missing trailer"));
    }
    let body_end = input.len() - TRAILER_LEN;
    let out = inflate_raw(&input[start..body_end])?;
    verify_trailer(&input[body_end..], crc32(0, &out), out.len() as u64)?;
    Ok(out)
}

/// Push-based GZIP encoder.
///
/// The header goes out with the first call; `finish` appends the trailer.
#[derive(Debug)]
pub struct GzipEncoder {
    header: Option<Vec<u8>>,
    deflate: Deflate,
    crc: Crc32,
}

impl GzipEncoder {
    pub fn new(options: GzipOptions) -> Result<Self> {
        let deflate = Deflate::new(DeflateOptions {
            level: options.level,
            raw: true,
            ..DeflateOptions::default()
        })?;
        let header = options.header();
        debug!(
            level = options.level.as_u8(),
            mtime = header.time,
            name = ?header.name,
            "gzip encoder ready"
        );
        Ok(Self {
            header: Some(header.to_bytes(extra_flags(options.level))),
            deflate,
            crc: Crc32::new(),
        })
    }

    /// Compress one block of input. Output is buffered inside the engine
    /// until a full chunk is ready.
    pub fn write(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let body = self.deflate.push(data, Flush::NoFlush)?;
        self.crc.append(data);
        let mut out = self.header.take().unwrap_or_default();
        out.extend(body);
        Ok(out)
    }

    /// Flush the engine and append the trailer. The encoder is terminal afterwards.
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        let body = self.deflate.push(&[], Flush::Finish)?;
        let mut out = self.header.take().unwrap_or_default();
        out.extend(body);
        out.extend_from_slice(&self.crc.sum().to_le_bytes());
        out.extend_from_slice(&(self.crc.amount() as u32).to_le_bytes());
        Ok(out)
    }

    /// Uncompressed bytes consumed so far.
    pub fn bytes_in(&self) -> u64 {
        self.crc.amount()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Header,
    Body,
    Trailer,
    Done,
}

/// Push-based GZIP decoder.
///
/// Input may be split anywhere, including inside the header or the trailer.
#[derive(Debug)]
pub struct GzipDecoder {
    stage: Stage,
    pending: Vec<u8>,
    inflate: Inflate,
    header: Option<GzHeader>,
    crc: Crc32,
}

impl GzipDecoder {
    pub fn new() -> Result<Self> {
        Ok(Self {
            stage: Stage::Header,
            pending: Vec::new(),
            inflate: Inflate::new(InflateOptions {
                raw: true,
                ..InflateOptions::default()
            })?,
            header: None,
            crc: Crc32::new(),
        })
    }

    /// Feed compressed bytes, returning whatever decompressed data is ready.
    /// Bytes after the trailer are ignored.
    pub fn write(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        match self.stage {
            Stage::Header => {
                self.pending.extend_from_slice(data);
                let Some((header, len)) = read_header(&self.pending)? else {
                    return Ok(Vec::new());
                };
                debug!(name = ?header.name, mtime = header.time, "gzip header parsed");
                self.header = Some(header);
                let body = self.pending.split_off(len);
                self.pending.clear();
                self.stage = Stage::Body;
                self.write_body(&body)
            }
            Stage::Body => self.write_body(data),
            Stage::Trailer => {
                self.pending.extend_from_slice(data);
                self.check_trailer()?;
                Ok(Vec::new())
            }
            Stage::Done => Ok(Vec::new()),
        }
    }

    fn write_body(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        let out = self.inflate.push(data, Flush::NoFlush)?;
        self.crc.append(&out);
        if self.inflate.is_ended() {
            self.pending.extend_from_slice(self.inflate.remaining_input());
            self.stage = Stage::Trailer;
            self.check_trailer()?;
        }
        Ok(out)
    }

    fn check_trailer(&mut self) -> Result<()> {
        if self.pending.len() < TRAILER_LEN {
            return Ok(());
        }
        verify_trailer(&self.pending[..TRAILER_LEN], self.crc.sum(), self.crc.amount())?;
        self.stage = Stage::Done;
        Ok(())
    }

    /// Signal end of input. Fails unless a whole member, trailer included, was seen.
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        match self.stage {
            Stage::Done => Ok(Vec::new()),
            Stage::Header => Err(CompressError::format("Not a GZIP file: truncated header")),
            Stage::Body | Stage::Trailer => Err(CompressError::algorithm(
                ReturnCode::BufError,
                "unexpected end of stream",
            )),
        }
    }

    /// The member header, once parsed.
    pub fn header(&self) -> Option<&GzHeader> {
        self.header.as_ref()
    }

    /// Decompressed bytes produced so far.
    pub fn bytes_out(&self) -> u64 {
        self.crc.amount()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(level: CompressionLevel) -> GzipOptions {
        GzipOptions {
            level,
            timestamp: Some(0),
            name: None,
            os: 3,
        }
    }

    #[test]
    fn test_empty_member() {
        let out = gzip_with(b"", fixed(CompressionLevel::default())).unwrap();
        assert_eq!(
            out,
            [0x1F, 0x8B, 8, 0, 0, 0, 0, 0, 0, 3, 0x03, 0x00, 0, 0, 0, 0, 0, 0, 0, 0]
        );
        assert!(gunzip(&out).unwrap().is_empty());
    }

    #[test]
    fn test_header_fields() {
        let options = GzipOptions {
            timestamp: Some(0x5F00_0001),
            name: Some("dir/sub/report.txt".to_string()),
            ..fixed(CompressionLevel::BEST)
        };
        let out = gzip_with(b"hello world!", options).unwrap();
        assert_eq!(out[3], FNAME);
        assert_eq!(&out[4..8], &[0x01, 0x00, 0x00, 0x5F]);
        assert_eq!(out[8], 2);
        assert_eq!(&out[10..21], b"report.txt\0");

        let (header, len) = read_header(&out).unwrap().unwrap();
        assert_eq!(len, 21);
        assert_eq!(header.name.as_deref(), Some("report.txt"));
        assert_eq!(header.time, 0x5F00_0001);
        assert_eq!(gunzip(&out).unwrap(), b"hello world!");
    }

    #[test]
    fn test_extra_flags() {
        assert_eq!(extra_flags(CompressionLevel::FASTEST), 4);
        assert_eq!(extra_flags(CompressionLevel::BEST), 2);
        assert_eq!(extra_flags(CompressionLevel::NoCompression), 0);
        assert_eq!(extra_flags(CompressionLevel::Level6), 0);
    }

    #[test]
    fn test_read_header_incremental() {
        let header = GzHeader {
            extra: Some(vec![9; 5]),
            name: Some("a".to_string()),
            comment: Some("c".to_string()),
            hcrc: true,
            ..GzHeader::default()
        };
        let bytes = header.to_bytes(0);
        for cut in 0..bytes.len() {
            assert!(read_header(&bytes[..cut]).unwrap().is_none(), "cut {cut}");
        }
        let (parsed, len) = read_header(&bytes).unwrap().unwrap();
        assert_eq!(len, bytes.len());
        assert_eq!(parsed.extra, header.extra);
        assert_eq!(parsed.comment.as_deref(), Some("c"));
        assert!(parsed.hcrc);
    }

    #[test]
    fn test_bad_magic_and_method() {
        assert!(matches!(read_header(&[0x1F, 0x8C]), Err(CompressError::Format(_))));
        let err = gunzip(&[0x1F, 0x8B, 7, 0, 0, 0, 0, 0, 0, 3]).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported compression method");
        let err = gunzip(b"PK\x03\x04").unwrap_err();
        assert_eq!(err.to_string(), "Not a GZIP file");
    }

    #[test]
    fn test_corrupt_header_crc() {
        let header = GzHeader {
            hcrc: true,
            ..GzHeader::default()
        };
        let mut bytes = header.to_bytes(0);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(read_header(&bytes), Err(CompressError::Format(_))));
    }

    #[test]
    fn test_trailer_checks() {
        let mut out = gzip_with(b"some data", fixed(CompressionLevel::default())).unwrap();
        let len = out.len();

        out[len - 8] ^= 0x10;
        assert!(matches!(
            gunzip(&out),
            Err(CompressError::ChecksumMismatch { .. })
        ));
        out[len - 8] ^= 0x10;

        out[len - 1] = 0x01;
        assert!(matches!(
            gunzip(&out),
            Err(CompressError::SizeMismatch { expected: 0x0100_0009, actual: 9 })
        ));
    }

    #[test]
    fn test_decoder_split_everywhere() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i * 7 % 251) as u8).collect();
        let options = GzipOptions {
            name: Some("numbers.bin".to_string()),
            ..fixed(CompressionLevel::default())
        };
        let packed = gzip_with(&data, options).unwrap();

        for step in [1, 3, 64, 1000] {
            let mut decoder = GzipDecoder::new().unwrap();
            let mut out = Vec::new();
            for piece in packed.chunks(step) {
                out.extend(decoder.write(piece).unwrap());
            }
            out.extend(decoder.finish().unwrap());
            assert_eq!(out, data, "step {step}");
            assert_eq!(decoder.header().unwrap().name.as_deref(), Some("numbers.bin"));
        }
    }

    #[test]
    fn test_decoder_truncated() {
        let packed = gzip_with(b"truncate me please", fixed(CompressionLevel::default())).unwrap();

        let mut decoder = GzipDecoder::new().unwrap();
        decoder.write(&packed[..packed.len() - 3]).unwrap();
        let err = decoder.finish().unwrap_err();
        assert_eq!(err.code(), ReturnCode::BufError);

        let mut decoder = GzipDecoder::new().unwrap();
        decoder.write(&packed[..4]).unwrap();
        assert!(matches!(decoder.finish(), Err(CompressError::Format(_))));
    }

    #[test]
    fn test_encoder_terminal() {
        let mut encoder = GzipEncoder::new(fixed(CompressionLevel::default())).unwrap();
        encoder.write(b"abc").unwrap();
        encoder.finish().unwrap();
        assert_eq!(encoder.bytes_in(), 3);
        assert!(matches!(encoder.write(b"x"), Err(CompressError::UseAfterFinish)));
        assert!(matches!(encoder.finish(), Err(CompressError::UseAfterFinish)));
    }
}
