//! INFLATE 解压
//!
//! `InflateState` 是逐模式推进的状态机，可以在任意输入或输出边界暂停：
//! 每个模式要么一次取够所需的位，要么不消费任何位直接返回。
//! 长度/距离对作为一个整体解码 (最多 48 位)，暂停时不会留下半个符号。

use tracing::{debug, warn};

use super::bitstream::BitReader;
use super::crc32::{crc32, Crc32};
use super::header::{GzHeader, FCOMMENT, FEXTRA, FHCRC, FNAME, FRESERVED, FTEXT};
use super::huffman::{
    Decoded, HuffmanTable, DIST_BASE, DIST_EXTRA, FIXED_DISTANCE_CODE_LENGTHS,
    FIXED_LITLEN_CODE_LENGTHS, LENGTH_BASE, LENGTH_DEZIGZAG, LENGTH_EXTRA,
};
use super::stream::{Flush, StreamState};
use super::{adler32, ADLER32_INIT, DEFAULT_CHUNK_SIZE};
use crate::error::{CompressError, Result, ReturnCode};

/// 解压模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// zlib/gzip 头部，或自动检测
    Head,
    // gzip 头部各字段
    Flags,
    Time,
    Os,
    ExLen,
    Extra,
    Name,
    Comment,
    HCrc,
    /// zlib 预置字典 ID
    DictId,
    /// 等待调用方提供字典
    Dict,
    /// 块头
    Type,
    StoredLens,
    Stored,
    /// 动态块的 HLIT/HDIST/HCLEN
    Table,
    CodeLens,
    LenLens,
    /// 解码字面量/长度/距离
    Codes,
    /// 复制匹配
    Match,
    /// 校验和
    Check,
    /// gzip ISIZE
    Length,
    Done,
    Bad,
}

/// 单个符号的解码结果
enum Step {
    Symbol(usize, u8),
    NeedInput,
    Invalid,
}

/// 跳过 `skip` 位后解码一个符号，位数不足时按字节拉取输入
fn decode_symbol(
    bits: &mut BitReader,
    strm: &mut StreamState,
    table: &HuffmanTable,
    skip: u8,
) -> Step {
    loop {
        let avail = bits.bits() - skip;
        match table.decode(bits.hold() >> skip, avail) {
            Decoded::Symbol { symbol, len } => return Step::Symbol(symbol as usize, len),
            Decoded::Invalid => return Step::Invalid,
            Decoded::NeedBits => {
                if !bits.need(strm, bits.bits() + 8) {
                    return Step::NeedInput;
                }
            }
        }
    }
}

/// INFLATE 解压状态
#[derive(Debug)]
pub struct InflateState {
    mode: Mode,
    /// bit0: 接受 zlib，bit1: 接受 gzip；0 为 raw
    wrap: u8,
    /// 当前流是 gzip
    gzip: bool,
    /// gzip FLG
    flags: u8,
    wbits: u8,
    window: Vec<u8>,
    wnext: usize,
    whave: usize,
    bits: BitReader,
    /// 当前块是最后一块
    last: bool,
    havedict: bool,
    /// 运行中的校验和
    check: u32,
    /// 已输出的字节数
    total: u64,
    head: Option<GzHeader>,
    head_crc: Crc32,
    gz_buf: Vec<u8>,
    /// 存储块剩余字节、匹配剩余长度或额外字段剩余长度
    length: usize,
    /// 匹配距离
    offset: usize,
    nlen: usize,
    ndist: usize,
    ncode: usize,
    have: usize,
    cl_lens: [u8; 19],
    lens: [u8; 320],
    clcode: HuffmanTable,
    lencode: HuffmanTable,
    distcode: HuffmanTable,
}

impl InflateState {
    /// `window_bits`：负值为 raw，8..=15 为 zlib，加 16 为 gzip，加 32 为自动检测；
    /// 0 表示使用 zlib 头部声明的窗口
    pub fn new(window_bits: i32) -> Result<Self> {
        let (wrap, wbits) = if window_bits < 0 {
            if window_bits < -15 {
                return Err(CompressError::configuration(format!(
                    "invalid windowBits {window_bits}"
                )));
            }
            (0, -window_bits)
        } else {
            let wrap = (window_bits >> 4) + 1;
            let wbits = if window_bits < 48 {
                window_bits & 15
            } else {
                window_bits
            };
            (wrap, wbits)
        };
        if wrap > 3 || (wbits != 0 && !(8..=15).contains(&wbits)) {
            return Err(CompressError::configuration(format!(
                "invalid windowBits {window_bits}"
            )));
        }

        Ok(Self {
            mode: Mode::Head,
            wrap: wrap as u8,
            gzip: false,
            flags: 0,
            wbits: wbits as u8,
            window: Vec::new(),
            wnext: 0,
            whave: 0,
            bits: BitReader::new(),
            last: false,
            havedict: false,
            check: 0,
            total: 0,
            head: None,
            head_crc: Crc32::new(),
            gz_buf: Vec::new(),
            length: 0,
            offset: 0,
            nlen: 0,
            ndist: 0,
            ncode: 0,
            have: 0,
            cl_lens: [0; 19],
            lens: [0; 320],
            clcode: HuffmanTable::default(),
            lencode: HuffmanTable::default(),
            distcode: HuffmanTable::default(),
        })
    }

    /// 已解析的 gzip 头部
    pub fn header(&self) -> Option<&GzHeader> {
        self.head.as_ref()
    }

    pub fn take_header(&mut self) -> Option<GzHeader> {
        self.head.take()
    }

    /// 提供预置字典
    ///
    /// zlib 流只能在返回 `NeedDict` 之后调用，且字典的 Adler32 必须与流中的 ID 一致；
    /// raw 流可以在开始前调用。
    pub fn set_dictionary(&mut self, strm: &mut StreamState, dict: &[u8]) -> ReturnCode {
        if self.wrap != 0 && self.mode != Mode::Dict {
            return ReturnCode::StreamError;
        }
        if self.mode == Mode::Dict && adler32(ADLER32_INIT, dict) != self.check {
            strm.msg = "incorrect dictionary".to_string();
            return ReturnCode::DataError;
        }
        self.ensure_window();
        self.update_window(dict);
        self.havedict = true;
        ReturnCode::Ok
    }

    /// 执行一步解压
    pub fn inflate(&mut self, strm: &mut StreamState, _flush: Flush) -> ReturnCode {
        if strm.avail_out == 0 {
            strm.msg = ReturnCode::BufError.message().to_string();
            return ReturnCode::BufError;
        }
        let mut mark = strm.next_out;
        let ret = self.run(strm, &mut mark);
        self.update_check(strm, &mut mark);
        if self.wrap != 0 {
            strm.adler = self.check;
        }
        ret
    }

    fn run(&mut self, strm: &mut StreamState, mark: &mut usize) -> ReturnCode {
        loop {
            match self.mode {
                Mode::Head => {
                    if self.wrap == 0 {
                        self.mode = Mode::Type;
                        continue;
                    }
                    if !self.bits.need(strm, 16) {
                        return ReturnCode::Ok;
                    }
                    let hold = self.bits.peek(16);
                    if self.wrap & 2 != 0 && hold == 0x8B1F {
                        if self.wbits == 0 {
                            self.wbits = 15;
                        }
                        self.gzip = true;
                        self.check = 0;
                        self.head = Some(GzHeader::default());
                        self.head_crc.reset();
                        self.head_crc.append(&[0x1F, 0x8B]);
                        self.bits.consume(16);
                        self.mode = Mode::Flags;
                        continue;
                    }

                    let cmf = hold & 0xFF;
                    let flg = hold >> 8;
                    if self.wrap & 1 == 0 || ((cmf << 8) | flg) % 31 != 0 {
                        return self.bad(strm, "incorrect header check");
                    }
                    if cmf & 0x0F != 8 {
                        return self.bad(strm, "unknown compression method");
                    }
                    let len = (cmf >> 4) as u8 + 8;
                    if self.wbits == 0 {
                        self.wbits = len;
                    }
                    if len > 15 || len > self.wbits {
                        return self.bad(strm, "invalid window size");
                    }
                    self.bits.consume(16);
                    self.check = ADLER32_INIT;
                    strm.adler = ADLER32_INIT;
                    self.mode = if flg & 0x20 != 0 {
                        Mode::DictId
                    } else {
                        Mode::Type
                    };
                }
                Mode::Flags => {
                    if !self.bits.need(strm, 16) {
                        return ReturnCode::Ok;
                    }
                    let method = self.bits.peek(8) as u8;
                    let flags = self.bits.peek_at(8, 8) as u8;
                    if method != 8 {
                        return self.bad(strm, "unknown compression method");
                    }
                    if flags & FRESERVED != 0 {
                        return self.bad(strm, "unknown header flags set");
                    }
                    self.bits.consume(16);
                    self.flags = flags;
                    if let Some(head) = &mut self.head {
                        head.text = flags & FTEXT != 0;
                    }
                    self.head_crc.append(&[method, flags]);
                    self.mode = Mode::Time;
                }
                Mode::Time => {
                    if !self.bits.need(strm, 32) {
                        return ReturnCode::Ok;
                    }
                    let time = self.bits.read_bits(32);
                    if let Some(head) = &mut self.head {
                        head.time = time;
                    }
                    self.head_crc.append(&time.to_le_bytes());
                    self.mode = Mode::Os;
                }
                Mode::Os => {
                    if !self.bits.need(strm, 16) {
                        return ReturnCode::Ok;
                    }
                    let xflags = self.bits.read_bits(8) as u8;
                    let os = self.bits.read_bits(8) as u8;
                    if let Some(head) = &mut self.head {
                        head.xflags = xflags;
                        head.os = os;
                    }
                    self.head_crc.append(&[xflags, os]);
                    self.mode = Mode::ExLen;
                }
                Mode::ExLen => {
                    if self.flags & FEXTRA != 0 {
                        if !self.bits.need(strm, 16) {
                            return ReturnCode::Ok;
                        }
                        let len = self.bits.read_bits(16) as u16;
                        self.head_crc.append(&len.to_le_bytes());
                        self.length = len as usize;
                        self.gz_buf.clear();
                        self.mode = Mode::Extra;
                    } else {
                        self.mode = Mode::Name;
                    }
                }
                Mode::Extra => {
                    while self.length > 0 {
                        let Some(b) = self.next_byte(strm) else {
                            return ReturnCode::Ok;
                        };
                        self.gz_buf.push(b);
                        self.length -= 1;
                    }
                    let extra = std::mem::take(&mut self.gz_buf);
                    self.head_crc.append(&extra);
                    if let Some(head) = &mut self.head {
                        head.extra = Some(extra);
                    }
                    self.mode = Mode::Name;
                }
                Mode::Name => {
                    if self.flags & FNAME != 0 {
                        let Some(name) = self.read_zero_terminated(strm) else {
                            return ReturnCode::Ok;
                        };
                        if let Some(head) = &mut self.head {
                            head.name = Some(name);
                        }
                    }
                    self.mode = Mode::Comment;
                }
                Mode::Comment => {
                    if self.flags & FCOMMENT != 0 {
                        let Some(comment) = self.read_zero_terminated(strm) else {
                            return ReturnCode::Ok;
                        };
                        if let Some(head) = &mut self.head {
                            head.comment = Some(comment);
                        }
                    }
                    self.mode = Mode::HCrc;
                }
                Mode::HCrc => {
                    if self.flags & FHCRC != 0 {
                        if !self.bits.need(strm, 16) {
                            return ReturnCode::Ok;
                        }
                        let stored = self.bits.read_bits(16);
                        if stored != self.head_crc.sum() & 0xFFFF {
                            return self.bad(strm, "header crc mismatch");
                        }
                        if let Some(head) = &mut self.head {
                            head.hcrc = true;
                        }
                    }
                    if let Some(head) = &mut self.head {
                        head.done = true;
                    }
                    self.check = 0;
                    strm.adler = 0;
                    self.mode = Mode::Type;
                }
                Mode::DictId => {
                    if !self.bits.need(strm, 32) {
                        return ReturnCode::Ok;
                    }
                    let id = self.bits.read_bits(32).swap_bytes();
                    self.check = id;
                    strm.adler = id;
                    self.mode = Mode::Dict;
                }
                Mode::Dict => {
                    if !self.havedict {
                        return ReturnCode::NeedDict;
                    }
                    self.check = ADLER32_INIT;
                    strm.adler = ADLER32_INIT;
                    self.mode = Mode::Type;
                }
                Mode::Type => {
                    self.ensure_window();
                    if self.last {
                        self.bits.align_to_byte();
                        self.mode = Mode::Check;
                        continue;
                    }
                    if !self.bits.need(strm, 3) {
                        return ReturnCode::Ok;
                    }
                    self.last = self.bits.read_bits(1) == 1;
                    match self.bits.read_bits(2) {
                        0 => self.mode = Mode::StoredLens,
                        1 => {
                            match (
                                HuffmanTable::build(&FIXED_LITLEN_CODE_LENGTHS, false),
                                HuffmanTable::build(&FIXED_DISTANCE_CODE_LENGTHS, false),
                            ) {
                                (Ok(lencode), Ok(distcode)) => {
                                    self.lencode = lencode;
                                    self.distcode = distcode;
                                }
                                _ => return self.bad(strm, "invalid literal/lengths set"),
                            }
                            self.mode = Mode::Codes;
                        }
                        2 => self.mode = Mode::Table,
                        _ => return self.bad(strm, "invalid block type"),
                    }
                }
                Mode::StoredLens => {
                    self.bits.align_to_byte();
                    if !self.bits.need(strm, 32) {
                        return ReturnCode::Ok;
                    }
                    let v = self.bits.read_bits(32);
                    let len = v & 0xFFFF;
                    if len != !(v >> 16) & 0xFFFF {
                        return self.bad(strm, "invalid stored block lengths");
                    }
                    self.length = len as usize;
                    self.mode = Mode::Stored;
                }
                Mode::Stored => {
                    while self.length > 0 {
                        if strm.avail_out == 0 {
                            return ReturnCode::Ok;
                        }
                        // 先用完累加器中的整字节
                        if self.bits.bits() >= 8 {
                            let b = self.bits.read_bits(8) as u8;
                            self.put(strm, b);
                            self.length -= 1;
                            continue;
                        }
                        if strm.avail_in == 0 {
                            return ReturnCode::Ok;
                        }
                        let n = self.length.min(strm.avail_in).min(strm.avail_out);
                        self.copy_stored(strm, n);
                        self.length -= n;
                    }
                    self.mode = Mode::Type;
                }
                Mode::Table => {
                    if !self.bits.need(strm, 14) {
                        return ReturnCode::Ok;
                    }
                    self.nlen = self.bits.read_bits(5) as usize + 257;
                    self.ndist = self.bits.read_bits(5) as usize + 1;
                    self.ncode = self.bits.read_bits(4) as usize + 4;
                    if self.nlen > 286 || self.ndist > 30 {
                        return self.bad(strm, "too many length or distance symbols");
                    }
                    self.have = 0;
                    self.cl_lens = [0; 19];
                    self.mode = Mode::CodeLens;
                }
                Mode::CodeLens => {
                    while self.have < self.ncode {
                        if !self.bits.need(strm, 3) {
                            return ReturnCode::Ok;
                        }
                        self.cl_lens[LENGTH_DEZIGZAG[self.have]] = self.bits.read_bits(3) as u8;
                        self.have += 1;
                    }
                    match HuffmanTable::build(&self.cl_lens, false) {
                        Ok(table) => self.clcode = table,
                        Err(_) => return self.bad(strm, "invalid code lengths set"),
                    }
                    self.have = 0;
                    self.lens = [0; 320];
                    self.mode = Mode::LenLens;
                }
                Mode::LenLens => {
                    let total = self.nlen + self.ndist;
                    while self.have < total {
                        let (sym, len) =
                            match decode_symbol(&mut self.bits, strm, &self.clcode, 0) {
                                Step::Symbol(sym, len) => (sym, len),
                                Step::NeedInput => return ReturnCode::Ok,
                                Step::Invalid => return self.bad(strm, "invalid code lengths set"),
                            };
                        if sym < 16 {
                            self.bits.consume(len);
                            self.lens[self.have] = sym as u8;
                            self.have += 1;
                            continue;
                        }

                        let (extra, base) = match sym {
                            16 => (2, 3),
                            17 => (3, 3),
                            _ => (7, 11),
                        };
                        if !self.bits.need(strm, len + extra) {
                            return ReturnCode::Ok;
                        }
                        let repeat = base + self.bits.peek_at(len, extra) as usize;
                        let value = if sym == 16 {
                            if self.have == 0 {
                                return self.bad(strm, "invalid bit length repeat");
                            }
                            self.lens[self.have - 1]
                        } else {
                            0
                        };
                        if self.have + repeat > total {
                            return self.bad(strm, "invalid bit length repeat");
                        }
                        self.bits.consume(len + extra);
                        self.lens[self.have..self.have + repeat].fill(value);
                        self.have += repeat;
                    }

                    if self.lens[256] == 0 {
                        return self.bad(strm, "invalid code -- missing end-of-block");
                    }
                    match HuffmanTable::build(&self.lens[..self.nlen], true) {
                        Ok(table) => self.lencode = table,
                        Err(_) => return self.bad(strm, "invalid literal/lengths set"),
                    }
                    match HuffmanTable::build(&self.lens[self.nlen..total], true) {
                        Ok(table) => self.distcode = table,
                        Err(_) => return self.bad(strm, "invalid distances set"),
                    }
                    self.mode = Mode::Codes;
                }
                Mode::Codes => loop {
                    if strm.avail_out == 0 {
                        return ReturnCode::Ok;
                    }
                    let (sym, len) = match decode_symbol(&mut self.bits, strm, &self.lencode, 0) {
                        Step::Symbol(sym, len) => (sym, len),
                        Step::NeedInput => return ReturnCode::Ok,
                        Step::Invalid => return self.bad(strm, "invalid literal/length code"),
                    };
                    if sym < 256 {
                        self.bits.consume(len);
                        self.put(strm, sym as u8);
                        continue;
                    }
                    if sym == 256 {
                        self.bits.consume(len);
                        self.mode = Mode::Type;
                        break;
                    }
                    let li = sym - 257;
                    if li >= LENGTH_BASE.len() {
                        return self.bad(strm, "invalid literal/length code");
                    }

                    // 长度和距离一起解码，位数不够就整体重来
                    let lext = LENGTH_EXTRA[li];
                    if !self.bits.need(strm, len + lext) {
                        return ReturnCode::Ok;
                    }
                    let length = LENGTH_BASE[li] as usize + self.bits.peek_at(len, lext) as usize;
                    let skip = len + lext;

                    let (dsym, dlen) =
                        match decode_symbol(&mut self.bits, strm, &self.distcode, skip) {
                            Step::Symbol(sym, len) => (sym, len),
                            Step::NeedInput => return ReturnCode::Ok,
                            Step::Invalid => return self.bad(strm, "invalid distance code"),
                        };
                    if dsym >= DIST_BASE.len() {
                        return self.bad(strm, "invalid distance code");
                    }
                    let dext = DIST_EXTRA[dsym];
                    if !self.bits.need(strm, skip + dlen + dext) {
                        return ReturnCode::Ok;
                    }
                    let distance =
                        DIST_BASE[dsym] as usize + self.bits.peek_at(skip + dlen, dext) as usize;
                    self.bits.consume(skip + dlen + dext);

                    if distance > self.whave {
                        return self.bad(strm, "invalid distance too far back");
                    }
                    self.length = length;
                    self.offset = distance;
                    self.mode = Mode::Match;
                    break;
                },
                Mode::Match => {
                    let mask = self.window.len() - 1;
                    while self.length > 0 {
                        if strm.avail_out == 0 {
                            return ReturnCode::Ok;
                        }
                        let b = self.window[(self.wnext + self.window.len() - self.offset) & mask];
                        self.put(strm, b);
                        self.length -= 1;
                    }
                    self.mode = Mode::Codes;
                }
                Mode::Check => {
                    self.update_check(strm, mark);
                    if self.wrap != 0 {
                        if !self.bits.need(strm, 32) {
                            return ReturnCode::Ok;
                        }
                        let raw = self.bits.read_bits(32);
                        let stored = if self.gzip { raw } else { raw.swap_bytes() };
                        if stored != self.check {
                            return self.bad(strm, "incorrect data check");
                        }
                    }
                    if self.gzip {
                        self.mode = Mode::Length;
                    } else {
                        self.finish(strm);
                    }
                }
                Mode::Length => {
                    if !self.bits.need(strm, 32) {
                        return ReturnCode::Ok;
                    }
                    if self.bits.read_bits(32) != self.total as u32 {
                        return self.bad(strm, "incorrect length check");
                    }
                    self.finish(strm);
                }
                Mode::Done => return ReturnCode::StreamEnd,
                Mode::Bad => return ReturnCode::DataError,
            }
        }
    }

    /// 进入结束状态，把累加器中未用的整字节退回输入
    fn finish(&mut self, strm: &mut StreamState) {
        self.bits.align_to_byte();
        strm.unread((self.bits.bits() / 8) as usize);
        self.bits.clear();
        self.mode = Mode::Done;
    }

    fn bad(&mut self, strm: &mut StreamState, msg: &str) -> ReturnCode {
        strm.msg = msg.to_string();
        self.mode = Mode::Bad;
        ReturnCode::DataError
    }

    /// 读取一个字节 (可能来自累加器)
    fn next_byte(&mut self, strm: &mut StreamState) -> Option<u8> {
        if !self.bits.need(strm, 8) {
            return None;
        }
        Some(self.bits.read_bits(8) as u8)
    }

    /// 读取 NUL 结尾的头部字段；输入不足时保留已读部分并返回 None
    fn read_zero_terminated(&mut self, strm: &mut StreamState) -> Option<String> {
        loop {
            let b = self.next_byte(strm)?;
            if b == 0 {
                break;
            }
            self.gz_buf.push(b);
        }
        let field = std::mem::take(&mut self.gz_buf);
        self.head_crc.append(&field);
        self.head_crc.append(&[0]);
        Some(String::from_utf8_lossy(&field).into_owned())
    }

    fn ensure_window(&mut self) {
        if self.window.is_empty() {
            let wbits = if self.wbits == 0 { 15 } else { self.wbits };
            self.window = vec![0; 1 << wbits];
        }
    }

    /// 输出一个字节并记入窗口
    #[inline]
    fn put(&mut self, strm: &mut StreamState, b: u8) {
        strm.put_byte(b);
        let wsize = self.window.len();
        self.window[self.wnext] = b;
        self.wnext = (self.wnext + 1) & (wsize - 1);
        if self.whave < wsize {
            self.whave += 1;
        }
    }

    /// 存储块：输入直接复制到输出
    fn copy_stored(&mut self, strm: &mut StreamState, n: usize) {
        let (start, out) = (strm.next_in, strm.next_out);
        strm.output[out..out + n].copy_from_slice(&strm.input[start..start + n]);
        strm.next_in += n;
        strm.avail_in -= n;
        strm.total_in += n as u64;
        strm.next_out += n;
        strm.avail_out -= n;
        strm.total_out += n as u64;

        let copied = strm.output[out..out + n].to_vec();
        self.update_window(&copied);
    }

    fn update_window(&mut self, data: &[u8]) {
        let wsize = self.window.len();
        if data.len() >= wsize {
            self.window.copy_from_slice(&data[data.len() - wsize..]);
            self.wnext = 0;
            self.whave = wsize;
            return;
        }
        let first = (wsize - self.wnext).min(data.len());
        self.window[self.wnext..self.wnext + first].copy_from_slice(&data[..first]);
        let rest = data.len() - first;
        self.window[..rest].copy_from_slice(&data[first..]);
        self.wnext = (self.wnext + data.len()) & (wsize - 1);
        self.whave = (self.whave + data.len()).min(wsize);
    }

    /// 对 `mark` 之后的新输出更新校验和与计数
    fn update_check(&mut self, strm: &StreamState, mark: &mut usize) {
        let out = &strm.output[*mark..strm.next_out];
        if !out.is_empty() {
            self.total += out.len() as u64;
            if self.wrap != 0 {
                self.check = if self.gzip {
                    crc32(self.check, out)
                } else {
                    adler32(self.check, out)
                };
            }
        }
        *mark = strm.next_out;
    }
}

/// INFLATE 解压选项
#[derive(Debug, Clone)]
pub struct InflateOptions {
    /// 0 表示自动检测 zlib/gzip 并使用头部声明的窗口
    pub window_bits: i32,
    /// 输出块大小
    pub chunk_size: usize,
    /// 不带封装
    pub raw: bool,
    /// 预置字典
    pub dictionary: Option<Vec<u8>>,
}

impl Default for InflateOptions {
    fn default() -> Self {
        Self {
            window_bits: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            raw: false,
            dictionary: None,
        }
    }
}

/// INFLATE 解压器
#[derive(Debug)]
pub struct Inflate {
    strm: StreamState,
    state: Option<InflateState>,
    chunk_size: usize,
    dictionary: Option<Vec<u8>>,
    header: Option<GzHeader>,
    ended: bool,
}

impl Inflate {
    /// 创建新的 INFLATE 解压器
    pub fn new(options: InflateOptions) -> Result<Self> {
        if options.chunk_size == 0 {
            return Err(CompressError::configuration("chunk size must be positive"));
        }

        let mut window_bits = options.window_bits;
        if options.raw && (0..16).contains(&window_bits) {
            window_bits = -window_bits;
            if window_bits == 0 {
                window_bits = -15;
            }
        }
        // 未指定窗口时自动检测 zlib/gzip
        if (0..16).contains(&window_bits) && options.window_bits == 0 {
            window_bits += 32;
        }
        if window_bits > 15 && window_bits < 48 && window_bits & 15 == 0 {
            window_bits |= 15;
        }

        let mut strm = StreamState::new();
        let mut state = InflateState::new(window_bits)?;
        if options.raw {
            if let Some(dict) = &options.dictionary {
                if state.set_dictionary(&mut strm, dict) != ReturnCode::Ok {
                    return Err(CompressError::configuration("dictionary rejected"));
                }
            }
        }

        debug!(window_bits, raw = options.raw, "inflate engine ready");

        Ok(Self {
            strm,
            state: Some(state),
            chunk_size: options.chunk_size,
            dictionary: options.dictionary,
            header: None,
            ended: false,
        })
    }

    /// 压入一段压缩数据，返回本次解出的数据
    ///
    /// 流结束后引擎停止，多余的输入留在 `remaining_input()`。
    /// `Flush::Finish` 时如果流尚未结束，返回 `BufError`。
    pub fn push(&mut self, data: &[u8], flush: Flush) -> Result<Vec<u8>> {
        if self.ended {
            return Err(CompressError::UseAfterFinish);
        }
        let state = self.state.as_mut().ok_or(CompressError::UseAfterFinish)?;
        let strm = &mut self.strm;
        strm.set_input(data);

        let mut out = Vec::new();
        let mut status;
        loop {
            if strm.avail_out == 0 {
                strm.reset_output(self.chunk_size);
            }

            status = state.inflate(strm, flush);
            if status == ReturnCode::NeedDict {
                if let Some(dict) = &self.dictionary {
                    status = state.set_dictionary(strm, dict);
                }
            }
            if status != ReturnCode::Ok && status != ReturnCode::StreamEnd {
                warn!(code = status.as_i32(), msg = %strm.msg, "inflate failed");
                let err = CompressError::algorithm(status, strm.msg.clone());
                self.ended = true;
                self.state = None;
                return Err(err);
            }

            if strm.next_out > 0
                && (strm.avail_out == 0
                    || status == ReturnCode::StreamEnd
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

        if status == ReturnCode::StreamEnd {
            debug!(
                total_in = strm.total_in,
                total_out = strm.total_out,
                "inflate stream finished"
            );
            self.header = state.take_header();
            self.state = None;
            self.ended = true;
        } else if flush == Flush::Finish {
            self.state = None;
            self.ended = true;
            return Err(CompressError::algorithm(
                ReturnCode::BufError,
                "unexpected end of stream",
            ));
        } else if flush == Flush::SyncFlush {
            strm.avail_out = 0;
        }
        Ok(out)
    }

    /// gzip 头部 (解析完成后可用)
    pub fn header(&self) -> Option<&GzHeader> {
        self.state
            .as_ref()
            .and_then(|s| s.header())
            .or(self.header.as_ref())
    }

    /// 流结束后未消费的输入
    pub fn remaining_input(&self) -> &[u8] {
        self.strm.remaining_input()
    }

    pub fn total_in(&self) -> u64 {
        self.strm.total_in
    }

    pub fn total_out(&self) -> u64 {
        self.strm.total_out
    }

    /// 运行中的校验和
    pub fn adler(&self) -> u32 {
        self.strm.adler
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

/// 一次性解压 zlib 或 gzip 数据 (自动检测)
pub fn inflate(input: &[u8]) -> Result<Vec<u8>> {
    inflate_with(input, InflateOptions::default())
}

/// 使用指定选项一次性解压
pub fn inflate_with(input: &[u8], options: InflateOptions) -> Result<Vec<u8>> {
    let mut engine = Inflate::new(options)?;
    engine.push(input, Flush::Finish)
}

/// 一次性解压 raw DEFLATE 数据
pub fn inflate_raw(input: &[u8]) -> Result<Vec<u8>> {
    inflate_raw_with(input, InflateOptions::default())
}

pub fn inflate_raw_with(input: &[u8], options: InflateOptions) -> Result<Vec<u8>> {
    inflate_with(input, InflateOptions { raw: true, ..options })
}

/// 一次性解压 gzip 封装的数据
pub fn gunzip(input: &[u8]) -> Result<Vec<u8>> {
    inflate(input)
}
