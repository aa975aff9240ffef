//! DEFLATE 压缩
//!
//! `DeflateState` 是可恢复的压缩状态机，每次调用只消费 `StreamState` 中的输入、
//! 只写入剩余的输出空间；`Deflate` 在其上实现按块输出的推送接口。
//!
//! 级别 1-3 使用贪心匹配，4-9 使用惰性匹配，0 只输出存储块。
//! 不刷新时只在前瞻字节数不少于 `MIN_LOOKAHEAD` 时处理数据，
//! 所以输出与输入如何分段无关。

use tracing::{debug, warn};

use super::bitstream::BitWriter;
use super::crc32::crc32;
use super::header::GzHeader;
use super::huffman::{
    build_code_lengths, canonical_codes, dist_code, length_code, BL_CODES, DIST_BASE,
    DIST_EXTRA, D_CODES, END_BLOCK, FIXED_DISTANCE_CODE_LENGTHS, FIXED_LITLEN_CODE_LENGTHS,
    LENGTH_BASE, LENGTH_DEZIGZAG, LENGTH_EXTRA, L_CODES, MAX_BITS, MAX_BL_BITS,
};
use super::lz77::{
    Config, LZ77Encoder, LZSymbol, CONFIGURATION_TABLE, MAX_MATCH, MIN_LOOKAHEAD, MIN_MATCH,
    TOO_FAR,
};
use super::stream::{DataType, Flush, StreamState};
use super::{adler32, ADLER32_INIT, DEFAULT_CHUNK_SIZE};
use crate::error::{CompressError, CompressionLevel, Result, ReturnCode};

/// 压缩策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    #[default]
    Default,
    /// 过滤数据：丢弃短匹配，偏向 Huffman 编码
    Filtered,
    /// 只做 Huffman 编码，不查找匹配
    HuffmanOnly,
    /// 只查找距离为 1 的匹配
    Rle,
    /// 不使用动态 Huffman 块
    Fixed,
}

/// DEFLATE 压缩选项
#[derive(Debug, Clone)]
pub struct DeflateOptions {
    pub level: CompressionLevel,
    /// 8..=15 为 zlib 封装，负值为 raw，加 16 为 gzip
    pub window_bits: i32,
    /// 1..=9，决定哈希表和符号缓冲区大小
    pub mem_level: i32,
    pub strategy: Strategy,
    /// 输出块大小
    pub chunk_size: usize,
    /// 不带封装 (把正的 window_bits 取反)
    pub raw: bool,
    /// gzip 封装 (window_bits 加 16)
    pub gzip: bool,
    /// 预置字典
    pub dictionary: Option<Vec<u8>>,
    /// 自定义 gzip 头部
    pub header: Option<GzHeader>,
}

impl Default for DeflateOptions {
    fn default() -> Self {
        Self {
            level: CompressionLevel::default(),
            window_bits: 15,
            mem_level: 8,
            strategy: Strategy::Default,
            chunk_size: DEFAULT_CHUNK_SIZE,
            raw: false,
            gzip: false,
            dictionary: None,
            header: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wrap {
    Raw,
    Zlib,
    Gzip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    /// 头部尚未写出
    Init,
    Busy,
    /// 尾部已写入待输出缓冲区
    Finished,
}

/// 一轮压缩循环的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    /// 输入耗尽，需要更多数据
    NeedMore,
    /// 输出了一个块
    BlockDone,
    /// 刷新模式下所有前瞻数据都已转换成符号
    Drained,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockType {
    Stored,
    Fixed,
    Dynamic,
}

/// DEFLATE 压缩状态
#[derive(Debug)]
pub struct DeflateState {
    wrap: Wrap,
    status: Status,
    level: u8,
    strategy: Strategy,
    config: Config,
    w_bits: u8,
    lz: LZ77Encoder,
    /// 当前块的符号
    symbols: Vec<LZSymbol>,
    lit_bufsize: usize,
    /// 待输出字节
    pending: BitWriter,
    gzhead: Option<GzHeader>,
    dict_id: Option<u32>,
    /// 上次同步刷新后是否读入过输入
    dirty: bool,
    data_type: DataType,
    // 惰性匹配状态
    match_length: usize,
    prev_length: usize,
    prev_match: isize,
    match_available: bool,
}

impl DeflateState {
    /// 校验参数并分配窗口
    pub fn new(level: u8, window_bits: i32, mem_level: i32, strategy: Strategy) -> Result<Self> {
        let (wrap, mut w_bits) = if window_bits < 0 {
            (Wrap::Raw, -window_bits)
        } else if window_bits > 15 {
            (Wrap::Gzip, window_bits - 16)
        } else {
            (Wrap::Zlib, window_bits)
        };

        if level > 9 {
            return Err(CompressError::configuration(format!(
                "compression level must be 0-9, got {level}"
            )));
        }
        if !(1..=9).contains(&mem_level) {
            return Err(CompressError::configuration(format!(
                "memLevel must be 1-9, got {mem_level}"
            )));
        }
        if !(8..=15).contains(&w_bits) || (w_bits == 8 && wrap != Wrap::Zlib) {
            return Err(CompressError::configuration(format!(
                "invalid windowBits {window_bits}"
            )));
        }
        // zlib 不支持 256 字节窗口，自动提升到 512
        if w_bits == 8 {
            w_bits = 9;
        }

        Ok(Self {
            wrap,
            status: Status::Init,
            level,
            strategy,
            config: CONFIGURATION_TABLE[level as usize],
            w_bits: w_bits as u8,
            lz: LZ77Encoder::new(w_bits as u8, mem_level as u8),
            symbols: Vec::new(),
            lit_bufsize: 1 << (mem_level + 6),
            pending: BitWriter::new(),
            gzhead: None,
            dict_id: None,
            dirty: false,
            data_type: DataType::Unknown,
            match_length: MIN_MATCH - 1,
            prev_length: MIN_MATCH - 1,
            prev_match: 0,
            match_available: false,
        })
    }

    /// 设置自定义 gzip 头部，只能在 gzip 封装下、输出开始前调用
    pub fn set_header(&mut self, header: GzHeader) -> ReturnCode {
        if self.wrap != Wrap::Gzip || self.status != Status::Init {
            return ReturnCode::StreamError;
        }
        self.gzhead = Some(header);
        ReturnCode::Ok
    }

    /// 预置字典，只能在任何输入之前调用；gzip 封装不支持字典
    pub fn set_dictionary(&mut self, strm: &mut StreamState, dict: &[u8]) -> ReturnCode {
        if self.wrap == Wrap::Gzip || self.status != Status::Init || self.lz.lookahead != 0 {
            return ReturnCode::StreamError;
        }
        if self.wrap == Wrap::Zlib {
            let id = adler32(ADLER32_INIT, dict);
            self.dict_id = Some(id);
            strm.adler = id;
        }
        self.lz.set_dictionary(dict);
        ReturnCode::Ok
    }

    /// 执行一步压缩
    ///
    /// 返回 `StreamEnd` 表示尾部已全部输出；`Ok` 表示需要更多输入或输出空间。
    pub fn deflate(&mut self, strm: &mut StreamState, flush: Flush) -> ReturnCode {
        let ret = self.step(strm, flush);
        strm.data_type = self.data_type;
        ret
    }

    fn step(&mut self, strm: &mut StreamState, flush: Flush) -> ReturnCode {
        if strm.avail_out == 0 {
            strm.msg = ReturnCode::BufError.message().to_string();
            return ReturnCode::BufError;
        }
        if self.status == Status::Finished && flush != Flush::Finish {
            strm.msg = ReturnCode::StreamError.message().to_string();
            return ReturnCode::StreamError;
        }

        if self.status == Status::Init {
            self.write_header(strm);
            self.status = Status::Busy;
        }

        if self.status == Status::Busy {
            loop {
                self.flush_pending(strm);
                if strm.avail_out == 0 {
                    return ReturnCode::Ok;
                }
                match self.compress(strm, flush) {
                    BlockState::BlockDone => continue,
                    BlockState::NeedMore => {
                        self.flush_pending(strm);
                        return ReturnCode::Ok;
                    }
                    BlockState::Drained => break,
                }
            }

            match flush {
                Flush::NoFlush => {}
                Flush::SyncFlush => {
                    self.flush_block(false);
                    if self.dirty {
                        self.emit_stored(&[], false);
                        self.dirty = false;
                    }
                }
                Flush::Finish => {
                    self.flush_block(true);
                    self.write_trailer(strm);
                    self.status = Status::Finished;
                }
            }
        }

        self.flush_pending(strm);
        if self.status == Status::Finished && self.pending.is_empty() {
            ReturnCode::StreamEnd
        } else {
            ReturnCode::Ok
        }
    }

    fn compress(&mut self, strm: &mut StreamState, flush: Flush) -> BlockState {
        match (self.level, self.strategy) {
            (0, _) | (_, Strategy::HuffmanOnly) => self.deflate_literals(strm, flush),
            (_, Strategy::Rle) => self.deflate_rle(strm, flush),
            (1..=3, _) => self.deflate_fast(strm, flush),
            _ => self.deflate_slow(strm, flush),
        }
    }

    fn write_header(&mut self, strm: &mut StreamState) {
        match self.wrap {
            Wrap::Raw => {}
            Wrap::Zlib => {
                let mut header: u16 = (8 + ((self.w_bits as u16 - 8) << 4)) << 8;
                let level_flags: u16 = if matches!(
                    self.strategy,
                    Strategy::HuffmanOnly | Strategy::Rle | Strategy::Fixed
                ) || self.level < 2
                {
                    0
                } else if self.level < 6 {
                    1
                } else if self.level == 6 {
                    2
                } else {
                    3
                };
                header |= level_flags << 6;
                if self.dict_id.is_some() {
                    header |= 0x20;
                }
                header += 31 - header % 31;
                self.pending.write_u16_be(header);
                if let Some(id) = self.dict_id {
                    self.pending.write_bytes(&id.to_be_bytes());
                }
                strm.adler = ADLER32_INIT;
            }
            Wrap::Gzip => {
                let xfl = if self.level == 9 {
                    2
                } else if self.level < 2
                    || matches!(
                        self.strategy,
                        Strategy::HuffmanOnly | Strategy::Rle | Strategy::Fixed
                    )
                {
                    4
                } else {
                    0
                };
                let bytes = match &self.gzhead {
                    Some(head) => head.to_bytes(xfl),
                    None => GzHeader::default().to_bytes(xfl),
                };
                self.pending.write_bytes(&bytes);
                strm.adler = 0;
            }
        }
    }

    fn write_trailer(&mut self, strm: &StreamState) {
        match self.wrap {
            Wrap::Raw => {}
            Wrap::Zlib => self.pending.write_bytes(&strm.adler.to_be_bytes()),
            Wrap::Gzip => {
                self.pending.write_bytes(&strm.adler.to_le_bytes());
                self.pending
                    .write_bytes(&(strm.total_in as u32).to_le_bytes());
            }
        }
    }

    /// 把待输出字节复制到输出缓冲区
    fn flush_pending(&mut self, strm: &mut StreamState) {
        let n = strm.write_output(self.pending.pending());
        self.pending.consume(n);
    }

    /// 读入输入并更新校验和
    fn fill_window(&mut self, strm: &mut StreamState) {
        let range = self.lz.fill(strm);
        if range.is_empty() {
            return;
        }
        self.dirty = true;
        let data = &self.lz.window[range];
        strm.adler = match self.wrap {
            Wrap::Raw => strm.adler,
            Wrap::Zlib => adler32(strm.adler, data),
            Wrap::Gzip => crc32(strm.adler, data),
        };
    }

    /// 记录字面量，返回符号缓冲区是否已满
    #[inline]
    fn tally_lit(&mut self, c: u8) -> bool {
        self.symbols.push(LZSymbol::Literal(c));
        self.symbols.len() >= self.lit_bufsize - 1
    }

    /// 记录匹配，返回符号缓冲区是否已满
    #[inline]
    fn tally_match(&mut self, distance: usize, length: usize) -> bool {
        self.symbols.push(LZSymbol::Match {
            length: length as u16,
            distance: distance as u16,
        });
        self.symbols.len() >= self.lit_bufsize - 1
    }

    /// 级别 0 和 HuffmanOnly：逐字节输出字面量
    fn deflate_literals(&mut self, strm: &mut StreamState, flush: Flush) -> BlockState {
        loop {
            self.lz.slide_if_needed();
            if self.lz.lookahead == 0 {
                self.fill_window(strm);
                if self.lz.lookahead == 0 {
                    if flush == Flush::NoFlush {
                        return BlockState::NeedMore;
                    }
                    break;
                }
            }

            let c = self.lz.window[self.lz.strstart];
            let mut bflush = self.tally_lit(c);
            self.lz.lookahead -= 1;
            self.lz.strstart += 1;

            // 存储块必须留在窗口内
            if self.level == 0 {
                let stored = self.lz.strstart as isize - self.lz.block_start;
                bflush |= stored >= self.lz.max_dist() as isize;
            }
            if bflush {
                self.flush_block(false);
                return BlockState::BlockDone;
            }
        }
        BlockState::Drained
    }

    /// 只查找距离为 1 的匹配
    fn deflate_rle(&mut self, strm: &mut StreamState, flush: Flush) -> BlockState {
        loop {
            self.lz.slide_if_needed();
            if self.lz.lookahead <= MAX_MATCH {
                self.fill_window(strm);
                if self.lz.lookahead <= MAX_MATCH && flush == Flush::NoFlush {
                    return BlockState::NeedMore;
                }
                if self.lz.lookahead == 0 {
                    break;
                }
            }

            let run = if self.lz.lookahead >= MIN_MATCH {
                self.lz.rle_run()
            } else {
                0
            };
            let bflush = if run >= MIN_MATCH {
                let full = self.tally_match(1, run);
                self.lz.lookahead -= run;
                self.lz.strstart += run;
                full
            } else {
                let c = self.lz.window[self.lz.strstart];
                let full = self.tally_lit(c);
                self.lz.lookahead -= 1;
                self.lz.strstart += 1;
                full
            };
            if bflush {
                self.flush_block(false);
                return BlockState::BlockDone;
            }
        }
        BlockState::Drained
    }

    /// 贪心匹配：找到匹配立即输出
    fn deflate_fast(&mut self, strm: &mut StreamState, flush: Flush) -> BlockState {
        loop {
            self.lz.slide_if_needed();
            if self.lz.lookahead < MIN_LOOKAHEAD {
                self.fill_window(strm);
                if self.lz.lookahead < MIN_LOOKAHEAD && flush == Flush::NoFlush {
                    return BlockState::NeedMore;
                }
                if self.lz.lookahead == 0 {
                    break;
                }
            }

            let mut hash_head = 0;
            if self.lz.lookahead >= MIN_MATCH {
                hash_head = self.lz.insert(self.lz.strstart);
            }
            let mut match_length = 0;
            if hash_head != 0 && self.lz.strstart - hash_head <= self.lz.max_dist() {
                match_length = self.lz.longest_match(hash_head, MIN_MATCH - 1, &self.config);
            }

            let bflush = if match_length >= MIN_MATCH {
                let distance = (self.lz.strstart as isize - self.lz.match_start) as usize;
                let full = self.tally_match(distance, match_length);
                self.lz.lookahead -= match_length;

                // 短匹配把中间位置也插入哈希表
                if match_length <= self.config.max_lazy && self.lz.lookahead >= MIN_MATCH {
                    for _ in 1..match_length {
                        self.lz.strstart += 1;
                        self.lz.insert(self.lz.strstart);
                    }
                    self.lz.strstart += 1;
                } else {
                    self.lz.strstart += match_length;
                }
                full
            } else {
                let c = self.lz.window[self.lz.strstart];
                let full = self.tally_lit(c);
                self.lz.lookahead -= 1;
                self.lz.strstart += 1;
                full
            };
            if bflush {
                self.flush_block(false);
                return BlockState::BlockDone;
            }
        }
        BlockState::Drained
    }

    /// 惰性匹配：先看下一位置是否有更长的匹配再决定
    fn deflate_slow(&mut self, strm: &mut StreamState, flush: Flush) -> BlockState {
        loop {
            self.lz.slide_if_needed();
            if self.lz.lookahead < MIN_LOOKAHEAD {
                self.fill_window(strm);
                if self.lz.lookahead < MIN_LOOKAHEAD && flush == Flush::NoFlush {
                    return BlockState::NeedMore;
                }
                if self.lz.lookahead == 0 {
                    break;
                }
            }

            let mut hash_head = 0;
            if self.lz.lookahead >= MIN_MATCH {
                hash_head = self.lz.insert(self.lz.strstart);
            }

            self.prev_length = self.match_length;
            self.prev_match = self.lz.match_start;
            self.match_length = MIN_MATCH - 1;

            if hash_head != 0
                && self.prev_length < self.config.max_lazy
                && self.lz.strstart - hash_head <= self.lz.max_dist()
            {
                self.match_length =
                    self.lz
                        .longest_match(hash_head, self.prev_length, &self.config);
                let too_far = self.lz.strstart as isize - self.lz.match_start > TOO_FAR as isize;
                if self.match_length <= 5
                    && (self.strategy == Strategy::Filtered
                        || (self.match_length == MIN_MATCH && too_far))
                {
                    self.match_length = MIN_MATCH - 1;
                }
            }

            if self.prev_length >= MIN_MATCH && self.match_length <= self.prev_length {
                // 前一位置的匹配更好，输出它
                let max_insert = self.lz.strstart + self.lz.lookahead - MIN_MATCH;
                let distance = (self.lz.strstart as isize - 1 - self.prev_match) as usize;
                let bflush = self.tally_match(distance, self.prev_length);

                self.lz.lookahead -= self.prev_length - 1;
                for _ in 0..self.prev_length - 2 {
                    self.lz.strstart += 1;
                    if self.lz.strstart <= max_insert {
                        self.lz.insert(self.lz.strstart);
                    }
                }
                self.match_available = false;
                self.match_length = MIN_MATCH - 1;
                self.lz.strstart += 1;

                if bflush {
                    self.flush_block(false);
                    return BlockState::BlockDone;
                }
            } else if self.match_available {
                // 前一位置没有更好的匹配，输出它的字面量
                let c = self.lz.window[self.lz.strstart - 1];
                let bflush = self.tally_lit(c);
                if bflush {
                    self.flush_block(false);
                }
                self.lz.strstart += 1;
                self.lz.lookahead -= 1;
                if bflush {
                    return BlockState::BlockDone;
                }
            } else {
                self.match_available = true;
                self.lz.strstart += 1;
                self.lz.lookahead -= 1;
            }
        }

        if self.match_available {
            let c = self.lz.window[self.lz.strstart - 1];
            self.tally_lit(c);
            self.match_available = false;
        }
        BlockState::Drained
    }

    /// 输出当前块：在存储、固定和动态三种编码中选最短的
    fn flush_block(&mut self, last: bool) {
        if !last && self.symbols.is_empty() {
            self.lz.block_start = self.lz.strstart as isize;
            return;
        }

        let mut lit_freq = [0u32; L_CODES];
        let mut dist_freq = [0u32; D_CODES];
        for sym in &self.symbols {
            match *sym {
                LZSymbol::Literal(c) => lit_freq[c as usize] += 1,
                LZSymbol::Match { length, distance } => {
                    lit_freq[257 + length_code(length as usize)] += 1;
                    dist_freq[dist_code(distance as usize)] += 1;
                }
            }
        }
        lit_freq[END_BLOCK] = 1;

        if self.data_type == DataType::Unknown {
            self.data_type = detect_data_type(&lit_freq);
        }

        let trees = DynamicTrees::build(&lit_freq, &dist_freq);
        let fixed_bits = 3 + symbol_bits(
            &lit_freq,
            &dist_freq,
            &FIXED_LITLEN_CODE_LENGTHS,
            &FIXED_DISTANCE_CODE_LENGTHS,
        );
        let dyn_bits = 3
            + trees.header_bits
            + symbol_bits(&lit_freq, &dist_freq, &trees.lit_lengths, &trees.dist_lengths);

        let stored_len = (self.lz.strstart as isize - self.lz.block_start) as usize;
        let stored_bits = if self.lz.block_start >= 0 {
            let chunks = stored_len.div_ceil(0xFFFF).max(1);
            Some(8 * (stored_len + 5 * chunks))
        } else {
            None
        };

        let block_type = match stored_bits {
            Some(_) if self.level == 0 => BlockType::Stored,
            Some(bits) if bits <= fixed_bits.min(dyn_bits) => BlockType::Stored,
            _ if self.strategy == Strategy::Fixed || fixed_bits <= dyn_bits => BlockType::Fixed,
            _ => BlockType::Dynamic,
        };

        match block_type {
            BlockType::Stored => {
                let start = self.lz.block_start as usize;
                let end = self.lz.strstart;
                let data = self.lz.window[start..end].to_vec();
                self.emit_stored(&data, last);
            }
            BlockType::Fixed => {
                self.pending.write_bits(last as u32 | (1 << 1), 3);
                self.emit_symbols(&FIXED_LITLEN_CODE_LENGTHS, &FIXED_DISTANCE_CODE_LENGTHS);
            }
            BlockType::Dynamic => {
                self.pending.write_bits(last as u32 | (2 << 1), 3);
                trees.write_header(&mut self.pending);
                self.emit_symbols(&trees.lit_lengths, &trees.dist_lengths);
            }
        }

        self.symbols.clear();
        self.lz.block_start = self.lz.strstart as isize;
        if last {
            self.pending.align_to_byte();
        }
    }

    /// 输出存储块，超过 65535 字节时拆分
    fn emit_stored(&mut self, data: &[u8], last: bool) {
        let chunks: Vec<&[u8]> = if data.is_empty() {
            vec![data]
        } else {
            data.chunks(0xFFFF).collect()
        };
        let count = chunks.len();
        for (i, chunk) in chunks.into_iter().enumerate() {
            let is_final = last && i + 1 == count;
            self.pending.write_bits(is_final as u32, 3);
            self.pending.align_to_byte();
            let len = chunk.len() as u16;
            self.pending.write_bytes(&len.to_le_bytes());
            self.pending.write_bytes(&(!len).to_le_bytes());
            self.pending.write_bytes(chunk);
        }
    }

    /// 用给定码长输出当前块的符号和块结束符
    fn emit_symbols(&mut self, lit_lengths: &[u8], dist_lengths: &[u8]) {
        let lit_codes = canonical_codes(lit_lengths);
        let dist_codes = canonical_codes(dist_lengths);
        let out = &mut self.pending;

        for sym in &self.symbols {
            match *sym {
                LZSymbol::Literal(c) => {
                    out.write_bits(lit_codes[c as usize] as u32, lit_lengths[c as usize]);
                }
                LZSymbol::Match { length, distance } => {
                    let lc = length_code(length as usize);
                    out.write_bits(lit_codes[257 + lc] as u32, lit_lengths[257 + lc]);
                    out.write_bits((length - LENGTH_BASE[lc]) as u32, LENGTH_EXTRA[lc]);

                    let dc = dist_code(distance as usize);
                    out.write_bits(dist_codes[dc] as u32, dist_lengths[dc]);
                    out.write_bits((distance - DIST_BASE[dc]) as u32, DIST_EXTRA[dc]);
                }
            }
        }
        out.write_bits(lit_codes[END_BLOCK] as u32, lit_lengths[END_BLOCK]);
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// 待输出缓冲区中的字节数
    pub fn pending_len(&self) -> usize {
        self.pending.pending().len()
    }
}

/// 动态块的码长和头部
#[derive(Debug)]
struct DynamicTrees {
    lit_lengths: Vec<u8>,
    dist_lengths: Vec<u8>,
    bl_lengths: Vec<u8>,
    /// 码长序列的游程编码：(符号, 额外位的值)
    runs: Vec<(u8, u8)>,
    hlit: usize,
    hdist: usize,
    hclen: usize,
    header_bits: usize,
}

impl DynamicTrees {
    fn build(lit_freq: &[u32], dist_freq: &[u32]) -> Self {
        let lit_lengths = build_code_lengths(&at_least_two(lit_freq), MAX_BITS);
        let dist_lengths = build_code_lengths(&at_least_two(dist_freq), MAX_BITS);

        let hlit = last_nonzero(&lit_lengths).max(257);
        let hdist = last_nonzero(&dist_lengths).max(1);

        let mut all = lit_lengths[..hlit].to_vec();
        all.extend_from_slice(&dist_lengths[..hdist]);
        let runs = rle_code_lengths(&all);

        let mut bl_freq = [0u32; BL_CODES];
        for &(sym, _) in &runs {
            bl_freq[sym as usize] += 1;
        }
        let bl_lengths = build_code_lengths(&at_least_two(&bl_freq), MAX_BL_BITS);

        let hclen = LENGTH_DEZIGZAG
            .iter()
            .rposition(|&sym| bl_lengths[sym] != 0)
            .map_or(0, |i| i + 1)
            .max(4);

        let header_bits = 5
            + 5
            + 4
            + 3 * hclen
            + runs
                .iter()
                .map(|&(sym, _)| bl_lengths[sym as usize] as usize + repeat_extra_bits(sym) as usize)
                .sum::<usize>();

        Self {
            lit_lengths,
            dist_lengths,
            bl_lengths,
            runs,
            hlit,
            hdist,
            hclen,
            header_bits,
        }
    }

    fn write_header(&self, out: &mut BitWriter) {
        out.write_bits((self.hlit - 257) as u32, 5);
        out.write_bits((self.hdist - 1) as u32, 5);
        out.write_bits((self.hclen - 4) as u32, 4);
        for &sym in &LENGTH_DEZIGZAG[..self.hclen] {
            out.write_bits(self.bl_lengths[sym] as u32, 3);
        }

        let bl_codes = canonical_codes(&self.bl_lengths);
        for &(sym, extra) in &self.runs {
            out.write_bits(bl_codes[sym as usize] as u32, self.bl_lengths[sym as usize]);
            out.write_bits(extra as u32, repeat_extra_bits(sym));
        }
    }
}

/// 码长游程符号的额外位数
fn repeat_extra_bits(sym: u8) -> u8 {
    match sym {
        16 => 2,
        17 => 3,
        18 => 7,
        _ => 0,
    }
}

/// 最后一个非零元素之后的位置
fn last_nonzero(lengths: &[u8]) -> usize {
    lengths.iter().rposition(|&l| l != 0).map_or(0, |i| i + 1)
}

/// 保证至少两个符号有频率，使每棵树至少有两个码
fn at_least_two(freqs: &[u32]) -> Vec<u32> {
    let mut f = freqs.to_vec();
    let mut i = 0;
    while f.iter().filter(|&&x| x > 0).count() < 2 && i < f.len() {
        if f[i] == 0 {
            f[i] = 1;
        }
        i += 1;
    }
    f
}

/// 码长序列的游程编码 (符号 16/17/18)
fn rle_code_lengths(lengths: &[u8]) -> Vec<(u8, u8)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < lengths.len() {
        let cur = lengths[i];
        let mut run = 1;
        while i + run < lengths.len() && lengths[i + run] == cur {
            run += 1;
        }
        i += run;

        if cur == 0 {
            let mut r = run;
            while r >= 11 {
                let n = r.min(138);
                out.push((18, (n - 11) as u8));
                r -= n;
            }
            if r >= 3 {
                out.push((17, (r - 3) as u8));
                r = 0;
            }
            out.extend(std::iter::repeat((0, 0)).take(r));
        } else {
            out.push((cur, 0));
            let mut r = run - 1;
            while r >= 3 {
                let n = r.min(6);
                out.push((16, (n - 3) as u8));
                r -= n;
            }
            out.extend(std::iter::repeat((cur, 0)).take(r));
        }
    }
    out
}

/// 符号部分的编码位数 (含额外位)
fn symbol_bits(lit_freq: &[u32], dist_freq: &[u32], lit_lengths: &[u8], dist_lengths: &[u8]) -> usize {
    let mut bits = 0usize;
    for (sym, &f) in lit_freq.iter().enumerate() {
        if f == 0 {
            continue;
        }
        let extra = if sym > END_BLOCK {
            LENGTH_EXTRA[sym - 257] as usize
        } else {
            0
        };
        bits += f as usize * (lit_lengths[sym] as usize + extra);
    }
    for (code, &f) in dist_freq.iter().enumerate() {
        bits += f as usize * (dist_lengths[code] as usize + DIST_EXTRA[code] as usize);
    }
    bits
}

/// 根据字面量分布猜测数据是否为文本
fn detect_data_type(lit_freq: &[u32]) -> DataType {
    // 0..6、14..25、28..31 视为二进制控制字符
    const BLOCK_MASK: u32 = 0xF3FF_C07F;
    for (n, &f) in lit_freq.iter().enumerate().take(32) {
        if BLOCK_MASK >> n & 1 == 1 && f != 0 {
            return DataType::Binary;
        }
    }
    if lit_freq[9] != 0 || lit_freq[10] != 0 || lit_freq[13] != 0 {
        return DataType::Text;
    }
    if lit_freq[32..256].iter().any(|&f| f != 0) {
        return DataType::Text;
    }
    DataType::Binary
}

/// DEFLATE 压缩器
///
/// 每次 `push` 返回本次产生的完整输出块；`Flush::Finish` 后引擎结束。
#[derive(Debug)]
pub struct Deflate {
    strm: StreamState,
    state: Option<DeflateState>,
    chunk_size: usize,
    ended: bool,
}

impl Deflate {
    /// 创建新的 DEFLATE 压缩器
    pub fn new(options: DeflateOptions) -> Result<Self> {
        if options.chunk_size == 0 {
            return Err(CompressError::configuration("chunk size must be positive"));
        }

        let mut window_bits = options.window_bits;
        if options.raw && window_bits > 0 {
            window_bits = -window_bits;
        } else if options.gzip && window_bits > 0 && window_bits < 16 {
            window_bits += 16;
        }

        let mut strm = StreamState::new();
        let mut state = DeflateState::new(
            options.level.as_u8(),
            window_bits,
            options.mem_level,
            options.strategy,
        )?;

        if let Some(header) = options.header {
            if state.set_header(header) != ReturnCode::Ok {
                return Err(CompressError::configuration(
                    "gzip header requires gzip wrapping",
                ));
            }
        }
        if let Some(dict) = &options.dictionary {
            if state.set_dictionary(&mut strm, dict) != ReturnCode::Ok {
                return Err(CompressError::configuration(
                    "dictionary is not supported with gzip wrapping",
                ));
            }
        }

        debug!(
            level = options.level.as_u8(),
            window_bits,
            mem_level = options.mem_level,
            strategy = ?options.strategy,
            "deflate engine ready"
        );

        Ok(Self {
            strm,
            state: Some(state),
            chunk_size: options.chunk_size,
            ended: false,
        })
    }

    /// 压入一段输入，返回本次产生的输出
    ///
    /// `NoFlush` 只返回已填满的块；`SyncFlush` 返回全部待输出数据并对齐到字节边界；
    /// `Finish` 输出尾部并结束引擎，之后的调用返回 `UseAfterFinish`。
    pub fn push(&mut self, data: &[u8], flush: Flush) -> Result<Vec<u8>> {
        if self.ended {
            return Err(CompressError::UseAfterFinish);
        }
        let state = self.state.as_mut().ok_or(CompressError::UseAfterFinish)?;
        let strm = &mut self.strm;
        strm.set_input(data);

        let mut out = Vec::new();
        loop {
            if strm.avail_out == 0 {
                strm.reset_output(self.chunk_size);
            }

            let status = state.deflate(strm, flush);
            if status != ReturnCode::Ok && status != ReturnCode::StreamEnd {
                warn!(code = status.as_i32(), msg = %strm.msg, "deflate failed");
                let err = CompressError::algorithm(status, strm.msg.clone());
                self.ended = true;
                self.state = None;
                return Err(err);
            }

            if strm.next_out > 0
                && (strm.avail_out == 0
                    || (strm.avail_in == 0 && matches!(flush, Flush::Finish | Flush::SyncFlush)))
            {
                out.extend_from_slice(&strm.take_chunk());
                if strm.avail_out != 0 {
                    strm.next_out = 0;
                    strm.avail_out = strm.output.len();
                }
            }

            if !((strm.avail_in > 0 || strm.avail_out == 0) && status != ReturnCode::StreamEnd) {
                break;
            }
        }

        match flush {
            Flush::Finish => {
                debug!(
                    total_in = strm.total_in,
                    total_out = strm.total_out,
                    "deflate stream finished"
                );
                self.state = None;
                self.ended = true;
            }
            Flush::SyncFlush => strm.avail_out = 0,
            Flush::NoFlush => {}
        }
        Ok(out)
    }

    /// 已消费的输入字节数
    pub fn total_in(&self) -> u64 {
        self.strm.total_in
    }

    /// 已产生的输出字节数
    pub fn total_out(&self) -> u64 {
        self.strm.total_out
    }

    /// 运行中的校验和 (zlib 为 Adler32，gzip 为 CRC-32)
    pub fn adler(&self) -> u32 {
        self.strm.adler
    }

    pub fn data_type(&self) -> DataType {
        self.strm.data_type
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// 底层流状态
    pub fn stream(&self) -> &StreamState {
        &self.strm
    }
}

/// 一次性 zlib 压缩
pub fn deflate(input: &[u8]) -> Result<Vec<u8>> {
    deflate_with(input, DeflateOptions::default())
}

/// 使用指定选项一次性压缩
pub fn deflate_with(input: &[u8], options: DeflateOptions) -> Result<Vec<u8>> {
    let mut engine = Deflate::new(options)?;
    engine.push(input, Flush::Finish)
}

/// 一次性 raw DEFLATE 压缩
pub fn deflate_raw(input: &[u8]) -> Result<Vec<u8>> {
    deflate_raw_with(input, DeflateOptions::default())
}

pub fn deflate_raw_with(input: &[u8], options: DeflateOptions) -> Result<Vec<u8>> {
    deflate_with(input, DeflateOptions { raw: true, ..options })
}

/// 一次性 gzip 封装压缩
pub fn gzip(input: &[u8]) -> Result<Vec<u8>> {
    gzip_with(input, DeflateOptions::default())
}

pub fn gzip_with(input: &[u8], options: DeflateOptions) -> Result<Vec<u8>> {
    deflate_with(input, DeflateOptions { gzip: true, ..options })
}
