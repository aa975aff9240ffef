//! Huffman 编码/解码
//!
//! RFC 1951 DEFLATE Huffman 码实现：解码端是 9 位快速查找表加规范码慢速路径，
//! 编码端按频率计算限长码长并生成位反转后的规范码。

use std::fmt;

/// Huffman 解码错误
#[derive(Debug, PartialEq, Eq)]
pub enum HuffmanError {
    /// 无效码长
    InvalidCodeLength,
    /// 码不完整
    Incomplete,
    /// 码长超额订阅
    Overflow,
}

impl fmt::Display for HuffmanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HuffmanError::InvalidCodeLength => write!(f, "invalid code length"),
            HuffmanError::Incomplete => write!(f, "incomplete code"),
            HuffmanError::Overflow => write!(f, "over-subscribed code"),
        }
    }
}

impl std::error::Error for HuffmanError {}

/// 最大码长
pub const MAX_BITS: u8 = 15;

/// 码长码的最大码长
pub const MAX_BL_BITS: u8 = 7;

/// 字面/长度符号数 (不含两个保留符号)
pub const L_CODES: usize = 286;

/// 距离符号数
pub const D_CODES: usize = 30;

/// 码长码符号数
pub const BL_CODES: usize = 19;

/// 块结束符号
pub const END_BLOCK: usize = 256;

/// 长度码基础值表 (RFC 1951)
pub const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99,
    115, 131, 163, 195, 227, 258,
];

/// 长度码额外位数表
pub const LENGTH_EXTRA: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

/// 距离码基础值表
pub const DIST_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025,
    1537, 2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];

/// 距离码额外位数表
pub const DIST_EXTRA: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12,
    12, 13, 13,
];

/// 码长序列的解码顺序 (用于动态 Huffman 块)
pub const LENGTH_DEZIGZAG: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// 固定 Huffman 码的字面/长度码长
/// 0-143: 8 bits, 144-255: 9 bits, 256-279: 7 bits, 280-287: 8 bits
pub const FIXED_LITLEN_CODE_LENGTHS: [u8; 288] = fixed_litlen_lengths();

/// 固定 Huffman 码的距离码长；30、31 号符号在数据中出现即为错误
pub const FIXED_DISTANCE_CODE_LENGTHS: [u8; 32] = [5; 32];

const fn fixed_litlen_lengths() -> [u8; 288] {
    let mut lengths = [0u8; 288];
    let mut i = 0;
    while i < 288 {
        lengths[i] = if i < 144 {
            8
        } else if i < 256 {
            9
        } else if i < 280 {
            7
        } else {
            8
        };
        i += 1;
    }
    lengths
}

/// 长度 (3..=258) 到长度码索引 (0..29) 的映射
const LENGTH_CODE: [u8; 256] = length_code_table();

const fn length_code_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut code = 0;
    while code < 28 {
        let base = LENGTH_BASE[code] as usize - 3;
        let count = 1usize << LENGTH_EXTRA[code];
        let mut i = 0;
        while i < count {
            table[base + i] = code as u8;
            i += 1;
        }
        code += 1;
    }
    // 258 单独使用 285 号符号
    table[255] = 28;
    table
}

/// 长度 (3..=258) 对应的长度码索引
#[inline]
pub fn length_code(len: usize) -> usize {
    LENGTH_CODE[len - 3] as usize
}

/// 距离 (1..=32768) 对应的距离码
#[inline]
pub fn dist_code(dist: usize) -> usize {
    DIST_BASE.partition_point(|&base| base as usize <= dist) - 1
}

/// 反转低 len 位
#[inline]
pub fn reverse_bits(code: u32, len: u8) -> u32 {
    if len == 0 {
        return 0;
    }
    code.reverse_bits() >> (32 - len as u32)
}

const FAST_BITS: u8 = 9;
const FAST_SIZE: usize = 1 << FAST_BITS;

/// 解码结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    Symbol { symbol: u16, len: u8 },
    /// 可用位不足以确定符号
    NeedBits,
    /// 位模式不对应任何符号
    Invalid,
}

/// Huffman 解码表
#[derive(Debug, Clone)]
pub struct HuffmanTable {
    /// 快速查找表：低 9 位 -> (码长 << 9) | 符号，0 表示走慢速路径
    lookup: Vec<u16>,
    /// 每种码长的符号数
    counts: [u16; MAX_BITS as usize + 1],
    /// 按 (码长, 符号) 排序的符号
    symbols: Vec<u16>,
}

impl HuffmanTable {
    /// 从码长构建解码表
    ///
    /// `allow_single` 为真时接受只有一个 1 位码的不完整码 (字面/长度、距离表)。
    /// 全零码长得到一个空表，解码任何位都失败。
    pub fn build(lengths: &[u8], allow_single: bool) -> Result<Self, HuffmanError> {
        let mut counts = [0u16; MAX_BITS as usize + 1];
        for &len in lengths {
            if len > MAX_BITS {
                return Err(HuffmanError::InvalidCodeLength);
            }
            counts[len as usize] += 1;
        }
        let used = lengths.len() - counts[0] as usize;
        counts[0] = 0;

        let mut left: i32 = 1;
        let mut max = 0;
        for len in 1..=MAX_BITS as usize {
            left <<= 1;
            left -= counts[len] as i32;
            if left < 0 {
                return Err(HuffmanError::Overflow);
            }
            if counts[len] > 0 {
                max = len;
            }
        }
        if left > 0 && used > 0 && !(allow_single && max == 1) {
            return Err(HuffmanError::Incomplete);
        }

        let mut offs = [0u16; MAX_BITS as usize + 2];
        for len in 1..=MAX_BITS as usize {
            offs[len + 1] = offs[len] + counts[len];
        }
        let mut symbols = vec![0u16; used];
        for (sym, &len) in lengths.iter().enumerate() {
            if len != 0 {
                symbols[offs[len as usize] as usize] = sym as u16;
                offs[len as usize] += 1;
            }
        }

        // 计算每个长度的第一个码
        let mut next_code = [0u32; MAX_BITS as usize + 1];
        let mut code = 0u32;
        for len in 1..=MAX_BITS as usize {
            code = (code + counts[len - 1] as u32) << 1;
            next_code[len] = code;
        }

        // 短代码使用快速查找表
        let mut lookup = vec![0u16; FAST_SIZE];
        for (sym, &len) in lengths.iter().enumerate() {
            if len == 0 || len > FAST_BITS {
                continue;
            }
            let rev = reverse_bits(next_code[len as usize], len) as usize;
            next_code[len as usize] += 1;
            let entry = ((len as u16) << 9) | sym as u16;
            let mut idx = rev;
            while idx < FAST_SIZE {
                lookup[idx] = entry;
                idx += 1 << len;
            }
        }

        Ok(Self {
            lookup,
            counts,
            symbols,
        })
    }

    /// 从累加器低位解码一个符号，不消费任何位
    ///
    /// `avail` 为 `hold` 中的有效位数。
    pub fn decode(&self, hold: u64, avail: u8) -> Decoded {
        let entry = self.lookup[(hold as usize) & (FAST_SIZE - 1)];
        if entry != 0 {
            let len = (entry >> 9) as u8;
            return if len <= avail {
                Decoded::Symbol {
                    symbol: entry & 0x1FF,
                    len,
                }
            } else {
                Decoded::NeedBits
            };
        }

        // 规范码逐位比较
        let mut code: i32 = 0;
        let mut first: i32 = 0;
        let mut index: i32 = 0;
        for len in 1..=MAX_BITS {
            if len > avail {
                return Decoded::NeedBits;
            }
            code |= ((hold >> (len - 1)) & 1) as i32;
            let count = self.counts[len as usize] as i32;
            if code - count < first {
                return Decoded::Symbol {
                    symbol: self.symbols[(index + (code - first)) as usize],
                    len,
                };
            }
            index += count;
            first += count;
            first <<= 1;
            code <<= 1;
        }
        Decoded::Invalid
    }
}

impl Default for HuffmanTable {
    /// 空表，解码任何位都失败
    fn default() -> Self {
        Self {
            lookup: vec![0; FAST_SIZE],
            counts: [0; MAX_BITS as usize + 1],
            symbols: Vec::new(),
        }
    }
}

/// 按频率计算码长，最长不超过 `max_bits`
///
/// 使用 Moffat 原地算法求最优码长，再把超长码压回 `max_bits` 并保持 Kraft 等式。
/// 频率为零的符号码长为零。
pub fn build_code_lengths(freqs: &[u32], max_bits: u8) -> Vec<u8> {
    let mut lengths = vec![0u8; freqs.len()];

    // (频率, 符号) 按频率升序
    let mut syms: Vec<(u32, usize)> = freqs
        .iter()
        .enumerate()
        .filter(|(_, &f)| f > 0)
        .map(|(s, &f)| (f, s))
        .collect();
    syms.sort_unstable();

    let n = syms.len();
    match n {
        0 => return lengths,
        1 => {
            lengths[syms[0].1] = 1;
            return lengths;
        }
        _ => {}
    }

    let mut key: Vec<u32> = syms.iter().map(|&(f, _)| f).collect();
    minimum_redundancy(&mut key);

    // 每个码长的符号数
    let depth = key.iter().copied().max().unwrap_or(0) as usize;
    let mut num_codes = vec![0u32; depth.max(max_bits as usize) + 1];
    for &k in &key {
        num_codes[k as usize] += 1;
    }
    enforce_max_code_size(&mut num_codes, max_bits as usize);

    // 高频符号分到短码
    let mut j = n;
    for (len, &count) in num_codes.iter().enumerate().take(max_bits as usize + 1).skip(1) {
        for _ in 0..count {
            j -= 1;
            lengths[syms[j].1] = len as u8;
        }
    }
    lengths
}

/// 对升序频率原地计算 Huffman 码长
fn minimum_redundancy(a: &mut [u32]) {
    let n = a.len();
    a[0] += a[1];
    let mut root = 0usize;
    let mut leaf = 2usize;
    for next in 1..n - 1 {
        if leaf >= n || a[root] < a[leaf] {
            a[next] = a[root];
            a[root] = next as u32;
            root += 1;
        } else {
            a[next] = a[leaf];
            leaf += 1;
        }
        if leaf >= n || (root < next && a[root] < a[leaf]) {
            a[next] += a[root];
            a[root] = next as u32;
            root += 1;
        } else {
            a[next] += a[leaf];
            leaf += 1;
        }
    }

    a[n - 2] = 0;
    for next in (0..n.saturating_sub(2)).rev() {
        a[next] = a[a[next] as usize] + 1;
    }

    let mut avbl: i64 = 1;
    let mut used: i64 = 0;
    let mut dpth: u32 = 0;
    let mut root = n as i64 - 2;
    let mut next = n as i64 - 1;
    while avbl > 0 {
        while root >= 0 && a[root as usize] == dpth {
            used += 1;
            root -= 1;
        }
        while avbl > used {
            a[next as usize] = dpth;
            next -= 1;
            avbl -= 1;
        }
        avbl = 2 * used;
        dpth += 1;
        used = 0;
    }
}

/// 把超过 `max` 的码长折回，并调整到恰好满足 Kraft 等式
fn enforce_max_code_size(num_codes: &mut [u32], max: usize) {
    let overflow: u32 = num_codes[max + 1..].iter().sum();
    if overflow == 0 {
        return;
    }
    num_codes[max] += overflow;
    for c in &mut num_codes[max + 1..] {
        *c = 0;
    }

    let mut total: u64 = (1..=max)
        .map(|i| (num_codes[i] as u64) << (max - i))
        .sum();
    while total != 1u64 << max {
        num_codes[max] -= 1;
        for i in (1..max).rev() {
            if num_codes[i] != 0 {
                num_codes[i] -= 1;
                num_codes[i + 1] += 2;
                break;
            }
        }
        total -= 1;
    }
}

/// 生成位反转后的规范码，可直接按 LSB 优先写出
pub fn canonical_codes(lengths: &[u8]) -> Vec<u16> {
    let mut bl_count = [0u32; MAX_BITS as usize + 1];
    for &len in lengths {
        bl_count[len as usize] += 1;
    }
    bl_count[0] = 0;

    let mut next_code = [0u32; MAX_BITS as usize + 1];
    let mut code = 0u32;
    for bits in 1..=MAX_BITS as usize {
        code = (code + bl_count[bits - 1]) << 1;
        next_code[bits] = code;
    }

    lengths
        .iter()
        .map(|&len| {
            if len == 0 {
                return 0;
            }
            let c = next_code[len as usize];
            next_code[len as usize] += 1;
            reverse_bits(c, len) as u16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kraft_sum(lengths: &[u8], max: u8) -> u64 {
        lengths
            .iter()
            .filter(|&&l| l > 0)
            .map(|&l| 1u64 << (max - l))
            .sum()
    }

    #[test]
    fn test_length_base() {
        assert_eq!(LENGTH_BASE[0], 3);
        assert_eq!(LENGTH_BASE[25], 163); // 符号 282
        assert_eq!(LENGTH_BASE[28], 258); // 符号 285
        assert_eq!(LENGTH_EXTRA[0], 0);
        assert_eq!(LENGTH_EXTRA[8], 1);
    }

    #[test]
    fn test_dist_base() {
        assert_eq!(DIST_BASE[0], 1);
        assert_eq!(DIST_BASE[29], 24577);
        assert_eq!(DIST_EXTRA[0], 0);
        assert_eq!(DIST_EXTRA[4], 1);
    }

    #[test]
    fn test_length_and_dist_codes() {
        assert_eq!(length_code(3), 0);
        assert_eq!(length_code(10), 7);
        assert_eq!(length_code(11), 8);
        assert_eq!(length_code(12), 8);
        assert_eq!(length_code(257), 27);
        assert_eq!(length_code(258), 28);

        assert_eq!(dist_code(1), 0);
        assert_eq!(dist_code(4), 3);
        assert_eq!(dist_code(5), 4);
        assert_eq!(dist_code(6), 4);
        assert_eq!(dist_code(24577), 29);
        assert_eq!(dist_code(32768), 29);
    }

    #[test]
    fn test_fixed_table_decode() {
        let table = HuffmanTable::build(&FIXED_LITLEN_CODE_LENGTHS, false).unwrap();
        // 符号 0 的码是 00110000，LSB 优先存放
        let hold = reverse_bits(0b0011_0000, 8) as u64;
        assert_eq!(
            table.decode(hold, 8),
            Decoded::Symbol { symbol: 0, len: 8 }
        );
        // 块结束符号是 7 位全零
        assert_eq!(
            table.decode(0, 7),
            Decoded::Symbol {
                symbol: 256,
                len: 7
            }
        );
        assert_eq!(table.decode(0, 6), Decoded::NeedBits);
    }

    #[test]
    fn test_long_codes_use_slow_path() {
        // 码长 1..=14 再加两个 15 位码，构成完整码
        let mut lengths: Vec<u8> = (1..=15).collect();
        lengths.push(15);
        let table = HuffmanTable::build(&lengths, false).unwrap();
        let codes = canonical_codes(&lengths);

        for (sym, (&code, &len)) in codes.iter().zip(&lengths).enumerate() {
            assert_eq!(
                table.decode(code as u64, 15),
                Decoded::Symbol {
                    symbol: sym as u16,
                    len
                }
            );
        }
    }

    #[test]
    fn test_rejects_bad_codes() {
        assert_eq!(
            HuffmanTable::build(&[1, 1, 1], false).unwrap_err(),
            HuffmanError::Overflow
        );
        assert_eq!(
            HuffmanTable::build(&[2, 2, 2], true).unwrap_err(),
            HuffmanError::Incomplete
        );
        assert_eq!(
            HuffmanTable::build(&[1, 0], false).unwrap_err(),
            HuffmanError::Incomplete
        );
        assert!(HuffmanTable::build(&[1, 0], true).is_ok());
        assert!(HuffmanTable::build(&[0, 0, 0], false).is_ok());
    }

    #[test]
    fn test_build_code_lengths_complete() {
        let freqs = [10u32, 1, 1, 5, 0, 7, 2, 30];
        let lengths = build_code_lengths(&freqs, 15);
        assert_eq!(lengths[4], 0);
        assert_eq!(kraft_sum(&lengths, 15), 1 << 15);
        // 最高频符号码最短
        let shortest = lengths.iter().filter(|&&l| l > 0).min().copied();
        assert_eq!(Some(lengths[7]), shortest);
    }

    #[test]
    fn test_build_code_lengths_limited() {
        // Fibonacci 频率会产生很深的树
        let mut freqs = vec![0u32; 30];
        let (mut a, mut b) = (1u32, 1u32);
        for f in freqs.iter_mut() {
            *f = a;
            let c = a + b;
            a = b;
            b = c;
        }
        let lengths = build_code_lengths(&freqs, 7);
        assert!(lengths.iter().all(|&l| l >= 1 && l <= 7));
        assert_eq!(kraft_sum(&lengths, 7), 1 << 7);
        assert!(HuffmanTable::build(&lengths, false).is_ok());
    }

    #[test]
    fn test_single_symbol() {
        let lengths = build_code_lengths(&[0, 0, 9], 15);
        assert_eq!(lengths, vec![0, 0, 1]);
    }
}
