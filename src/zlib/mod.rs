//! DEFLATE/INFLATE 流式引擎与校验和
//!
//! 纯 Rust 实现的 RFC 1950/1951/1952 编解码器，支持 raw、zlib、gzip 三种封装，
//! 以及跨多次 `push` 的增量处理。

pub mod bitstream;
pub mod crc32;
pub mod deflate;
pub mod header;
pub mod huffman;
pub mod inflate;
pub mod lz77;
pub mod stream;

pub use crc32::{crc32, Crc32};
pub use deflate::{
    deflate, deflate_raw, deflate_raw_with, deflate_with, gzip, gzip_with, Deflate,
    DeflateOptions, Strategy,
};
pub use header::{os_code, GzHeader};
pub use inflate::{
    gunzip, inflate, inflate_raw, inflate_raw_with, inflate_with, Inflate, InflateOptions,
};
pub use stream::{DataType, Flush, StreamState};

/// 默认输出块大小
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Adler32 初始值
pub const ADLER32_INIT: u32 = 1;

const ADLER_MOD: u32 = 65521;

/// 单次取模前可累加的最大字节数 (255*n*(n+1)/2 + (n+1)*(BASE-1) <= 2^32-1)
const ADLER_NMAX: usize = 5552;

/// Adler32 校验和计算
pub fn adler32(adler: u32, data: &[u8]) -> u32 {
    let mut s1 = adler & 0xFFFF;
    let mut s2 = (adler >> 16) & 0xFFFF;

    for block in data.chunks(ADLER_NMAX) {
        let mut words = block.chunks_exact(8);
        for w in &mut words {
            s1 += w[0] as u32;
            s2 += s1;
            s1 += w[1] as u32;
            s2 += s1;
            s1 += w[2] as u32;
            s2 += s1;
            s1 += w[3] as u32;
            s2 += s1;
            s1 += w[4] as u32;
            s2 += s1;
            s1 += w[5] as u32;
            s2 += s1;
            s1 += w[6] as u32;
            s2 += s1;
            s1 += w[7] as u32;
            s2 += s1;
        }
        for &b in words.remainder() {
            s1 += b as u32;
            s2 += s1;
        }

        s1 %= ADLER_MOD;
        s2 %= ADLER_MOD;
    }

    (s2 << 16) | s1
}

/// 增量 Adler32
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adler32 {
    state: u32,
    amount: u64,
}

impl Adler32 {
    pub fn new() -> Self {
        Self {
            state: ADLER32_INIT,
            amount: 0,
        }
    }

    /// 追加数据，返回当前校验和
    pub fn append(&mut self, data: &[u8]) -> u32 {
        self.state = adler32(self.state, data);
        self.amount += data.len() as u64;
        self.state
    }

    pub fn sum(&self) -> u32 {
        self.state
    }

    /// 已追加的字节数
    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}
