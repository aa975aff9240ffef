//! 流状态：输入/输出缓冲区、游标和累计计数
//!
//! 引擎每一步都从 `input[next_in..next_in + avail_in]` 读取，写入
//! `output[next_out..next_out + avail_out]`。

/// 刷新模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flush {
    /// 尽可能多地缓存，只输出满块
    #[default]
    NoFlush,
    /// 输出所有待处理数据并对齐到字节边界，流保持打开
    SyncFlush,
    /// 输出所有数据和尾部，流结束
    Finish,
}

/// 压缩器对输入数据的猜测
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataType {
    Binary = 0,
    Text = 1,
    #[default]
    Unknown = 2,
}

/// 单个压缩或解压流的游标状态
#[derive(Debug, Default)]
pub struct StreamState {
    pub input: Vec<u8>,
    pub next_in: usize,
    pub avail_in: usize,
    pub total_in: u64,
    pub output: Vec<u8>,
    pub next_out: usize,
    pub avail_out: usize,
    pub total_out: u64,
    /// 最近一次错误信息
    pub msg: String,
    pub data_type: DataType,
    /// 运行中的 Adler32 或 CRC-32
    pub adler: u32,
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 替换输入缓冲区
    pub fn set_input(&mut self, data: &[u8]) {
        self.input.clear();
        self.input.extend_from_slice(data);
        self.next_in = 0;
        self.avail_in = data.len();
    }

    /// 尚未消费的输入
    pub fn remaining_input(&self) -> &[u8] {
        &self.input[self.next_in..self.next_in + self.avail_in]
    }

    /// 分配新的输出块
    pub fn reset_output(&mut self, chunk_size: usize) {
        self.output.clear();
        self.output.resize(chunk_size, 0);
        self.next_out = 0;
        self.avail_out = chunk_size;
    }

    /// 取出已写入的输出；满块直接转移所有权，部分块复制
    pub fn take_chunk(&mut self) -> Vec<u8> {
        if self.avail_out == 0 {
            let mut chunk = std::mem::take(&mut self.output);
            chunk.truncate(self.next_out);
            chunk
        } else {
            self.output[..self.next_out].to_vec()
        }
    }

    /// 读取一个输入字节
    #[inline]
    pub fn next_byte(&mut self) -> Option<u8> {
        if self.avail_in == 0 {
            return None;
        }
        let b = self.input[self.next_in];
        self.next_in += 1;
        self.avail_in -= 1;
        self.total_in += 1;
        Some(b)
    }

    /// 把输入复制到 `buf`，返回复制的字节数
    pub fn read_input(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.avail_in);
        buf[..n].copy_from_slice(&self.input[self.next_in..self.next_in + n]);
        self.next_in += n;
        self.avail_in -= n;
        self.total_in += n as u64;
        n
    }

    /// 退回最近读取的 `n` 个字节
    pub fn unread(&mut self, n: usize) {
        let n = n.min(self.next_in);
        self.next_in -= n;
        self.avail_in += n;
        self.total_in -= n as u64;
    }

    /// 写入尽可能多的字节，返回写入数
    pub fn write_output(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.avail_out);
        self.output[self.next_out..self.next_out + n].copy_from_slice(&data[..n]);
        self.next_out += n;
        self.avail_out -= n;
        self.total_out += n as u64;
        n
    }

    /// 写入一个字节；调用方保证 `avail_out > 0`
    #[inline]
    pub fn put_byte(&mut self, b: u8) {
        self.output[self.next_out] = b;
        self.next_out += 1;
        self.avail_out -= 1;
        self.total_out += 1;
    }
}
