//! 位流读取器和写入器
//!
//! DEFLATE 按 LSB 优先打包位。写入器兼作压缩器的待输出缓冲区；
//! 读取器只在需要时从流中拉取字节，因此可以在任意字节边界暂停。

use super::stream::StreamState;

/// 位写入器
#[derive(Debug, Default)]
pub struct BitWriter {
    /// 数据缓冲区
    data: Vec<u8>,
    /// 已交给输出的字节数
    read_pos: usize,
    /// 位缓冲区
    bit_buf: u64,
    /// 缓冲区中的位数
    num_bits: u8,
}

impl BitWriter {
    /// 创建新的位写入器
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入 n 位 (小端序)，n <= 32
    #[inline]
    pub fn write_bits(&mut self, bits: u32, n: u8) {
        if n == 0 {
            return;
        }
        let bits = bits as u64 & ((1u64 << n) - 1);
        self.bit_buf |= bits << self.num_bits;
        self.num_bits += n;

        // 每 8 位写入一个字节
        while self.num_bits >= 8 {
            self.data.push((self.bit_buf & 0xFF) as u8);
            self.bit_buf >>= 8;
            self.num_bits -= 8;
        }
    }

    /// 写入多个字节
    pub fn write_bytes(&mut self, data: &[u8]) {
        if self.num_bits == 0 {
            self.data.extend_from_slice(data);
        } else {
            for &byte in data {
                self.write_bits(byte as u32, 8);
            }
        }
    }

    /// 写入 16 位大端整数 (zlib 头部和尾部使用)
    pub fn write_u16_be(&mut self, value: u16) {
        self.write_bytes(&value.to_be_bytes());
    }

    /// 对齐到字节边界
    #[inline]
    pub fn align_to_byte(&mut self) {
        let bits_to_pad = 8 - (self.num_bits % 8);
        if bits_to_pad < 8 {
            self.write_bits(0, bits_to_pad);
        }
    }

    /// 可以交给输出的完整字节
    pub fn pending(&self) -> &[u8] {
        &self.data[self.read_pos..]
    }

    /// 标记前 n 个待输出字节已交出
    pub fn consume(&mut self, n: usize) {
        self.read_pos = (self.read_pos + n).min(self.data.len());
        if self.read_pos == self.data.len() {
            self.data.clear();
            self.read_pos = 0;
        }
    }

    /// 完整字节和未满一字节的位都已交出
    pub fn is_empty(&self) -> bool {
        self.pending().is_empty() && self.num_bits == 0
    }

    /// 获取当前缓冲区的位数
    pub fn buffered_bits(&self) -> u8 {
        self.num_bits
    }
}

/// 位流读取器
///
/// 位累加器最多保存 64 位；调用方一次最多请求 48 位。
#[derive(Debug, Default, Clone, Copy)]
pub struct BitReader {
    hold: u64,
    bits: u8,
}

impl BitReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从流中拉取一个字节
    #[inline]
    fn pull_byte(&mut self, strm: &mut StreamState) -> bool {
        if self.bits > 56 {
            return false;
        }
        match strm.next_byte() {
            Some(b) => {
                self.hold |= (b as u64) << self.bits;
                self.bits += 8;
                true
            }
            None => false,
        }
    }

    /// 确保至少有 n 位可用；输入耗尽时返回 false
    #[inline]
    pub fn need(&mut self, strm: &mut StreamState, n: u8) -> bool {
        while self.bits < n {
            if !self.pull_byte(strm) {
                return false;
            }
        }
        true
    }

    /// 查看 n 位但不移除
    #[inline]
    pub fn peek(&self, n: u8) -> u32 {
        self.peek_at(0, n)
    }

    /// 跳过 skip 位后查看 n 位
    #[inline]
    pub fn peek_at(&self, skip: u8, n: u8) -> u32 {
        ((self.hold >> skip) & ((1u64 << n) - 1)) as u32
    }

    /// 移除 n 位
    #[inline]
    pub fn consume(&mut self, n: u8) {
        self.hold >>= n;
        self.bits -= n;
    }

    /// 读取 n 位；调用方已通过 `need` 保证位数足够
    #[inline]
    pub fn read_bits(&mut self, n: u8) -> u32 {
        let v = self.peek(n);
        self.consume(n);
        v
    }

    /// 丢弃到字节边界为止的位
    pub fn align_to_byte(&mut self) {
        self.consume(self.bits % 8);
    }

    /// 累加器原始内容
    pub fn hold(&self) -> u64 {
        self.hold
    }

    /// 累加器中的有效位数
    pub fn bits(&self) -> u8 {
        self.bits
    }

    pub fn clear(&mut self) {
        self.hold = 0;
        self.bits = 0;
    }
}
