//! compress-rs - DEFLATE/ZLIB/GZIP 压缩库
//!
//! 纯 Rust 实现的 DEFLATE 压缩/解压引擎，以及基于它的 GZIP 容器格式。
//!
//! ## 功能
//!
//! - raw DEFLATE、ZLIB、GZIP 三种封装的一次性压缩/解压
//! - 可跨多次 `push` 增量处理的流式引擎 (NoFlush / SyncFlush / Finish)
//! - CRC-32、Adler-32 校验和 (一次性或增量)
//! - GZIP 头部解析、尾部 CRC 与长度校验
//! - 固定内存的文件级流式压缩/解压，带进度回调
//!
//! ## 示例
//!
//! ```
//! let packed = compress_rs::gzip(b"hello world!").unwrap();
//! assert_eq!(compress_rs::gunzip(&packed).unwrap(), b"hello world!");
//!
//! let packed = compress_rs::deflate(b"hello world!").unwrap();
//! assert_eq!(compress_rs::inflate(&packed).unwrap(), b"hello world!");
//! ```

pub mod error;
pub mod gzip;
pub mod zlib;

// 重导出常用类型
pub use error::{CompressError, CompressionLevel, Result, ReturnCode};
pub use gzip::{
    compress, decompress, gunzip, gunzip_file, gzip, gzip_file, GzipDecoder, GzipEncoder,
    GzipOptions, GzipStream, Progress, StreamOptions,
};
pub use zlib::{
    adler32, crc32, deflate, deflate_raw, inflate, inflate_raw, Adler32, Crc32, Deflate,
    DeflateOptions, Flush, GzHeader, Inflate, InflateOptions, Strategy,
};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_root_exports() {
        let data = b"hello world!";
        assert_eq!(inflate(&deflate(data).unwrap()).unwrap(), data);
        assert_eq!(inflate_raw(&deflate_raw(data).unwrap()).unwrap(), data);
        assert_eq!(gunzip(&gzip(data).unwrap()).unwrap(), data);
        assert_eq!(crc32(0, data), 0x03B4_C26D);
        assert_eq!(adler32(1, data), 0x1E89_047E);
    }
}
