//! LZ77 滑动窗口与哈希链匹配
//!
//! 窗口大小为 2 * w_size；当前位置越过 w_size + max_dist 时把上半部分移到下半部分。
//! 哈希链记录每个 3 字节序列最近出现的位置，位置 0 表示链结束。

use super::stream::StreamState;

/// 最短匹配
pub const MIN_MATCH: usize = 3;
/// 最长匹配
pub const MAX_MATCH: usize = 258;
/// 处理一个位置前需要的最少前瞻字节数
pub const MIN_LOOKAHEAD: usize = MAX_MATCH + MIN_MATCH + 1;
/// 长度为 3 的匹配距离超过此值时不划算
pub const TOO_FAR: usize = 4096;

/// 每个压缩级别的匹配参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// 已有匹配达到此长度时缩短搜索
    pub good_length: usize,
    /// 惰性匹配：已有匹配达到此长度时不再尝试下一位置；贪心匹配：插入哈希的最大匹配长度
    pub max_lazy: usize,
    /// 匹配达到此长度时停止搜索
    pub nice_length: usize,
    /// 最长搜索链
    pub max_chain: usize,
}

/// zlib 的级别配置表
pub const CONFIGURATION_TABLE: [Config; 10] = [
    Config { good_length: 0, max_lazy: 0, nice_length: 0, max_chain: 0 },
    Config { good_length: 4, max_lazy: 4, nice_length: 8, max_chain: 4 },
    Config { good_length: 4, max_lazy: 5, nice_length: 16, max_chain: 8 },
    Config { good_length: 4, max_lazy: 6, nice_length: 32, max_chain: 32 },
    Config { good_length: 4, max_lazy: 4, nice_length: 16, max_chain: 16 },
    Config { good_length: 8, max_lazy: 16, nice_length: 32, max_chain: 32 },
    Config { good_length: 8, max_lazy: 16, nice_length: 128, max_chain: 128 },
    Config { good_length: 8, max_lazy: 32, nice_length: 128, max_chain: 256 },
    Config { good_length: 32, max_lazy: 128, nice_length: 258, max_chain: 1024 },
    Config { good_length: 32, max_lazy: 258, nice_length: 258, max_chain: 4096 },
];

/// LZ77 符号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LZSymbol {
    Literal(u8),
    /// 长度 3..=258，距离 1..=32768
    Match { length: u16, distance: u16 },
}

/// LZ77 压缩器
#[derive(Debug)]
pub struct LZ77Encoder {
    /// 滑动窗口 (2 * w_size)
    pub window: Vec<u8>,
    pub w_size: usize,
    w_mask: usize,
    head: Vec<u16>,
    prev: Vec<u16>,
    hash_mask: usize,
    hash_shift: u32,
    /// 当前处理位置
    pub strstart: usize,
    /// strstart 之后的有效字节数
    pub lookahead: usize,
    /// 当前块起始位置；滑动后可能为负，此时不能输出存储块
    pub block_start: isize,
    /// 最近一次匹配的起点
    pub match_start: isize,
}

impl LZ77Encoder {
    /// 创建新的 LZ77 编码器
    pub fn new(w_bits: u8, mem_level: u8) -> Self {
        let w_size = 1usize << w_bits;
        let hash_bits = mem_level as u32 + 7;
        let hash_size = 1usize << hash_bits;
        Self {
            window: vec![0; 2 * w_size],
            w_size,
            w_mask: w_size - 1,
            head: vec![0; hash_size],
            prev: vec![0; w_size],
            hash_mask: hash_size - 1,
            hash_shift: (hash_bits + MIN_MATCH as u32 - 1) / MIN_MATCH as u32,
            strstart: 0,
            lookahead: 0,
            block_start: 0,
            match_start: 0,
        }
    }

    /// 匹配允许的最大距离
    #[inline]
    pub fn max_dist(&self) -> usize {
        self.w_size - MIN_LOOKAHEAD
    }

    #[inline]
    fn hash(&self, pos: usize) -> usize {
        let w = &self.window;
        (((w[pos] as usize) << (2 * self.hash_shift))
            ^ ((w[pos + 1] as usize) << self.hash_shift)
            ^ w[pos + 2] as usize)
            & self.hash_mask
    }

    /// 把 pos 处的 3 字节序列插入哈希链，返回链上前一个位置
    #[inline]
    pub fn insert(&mut self, pos: usize) -> usize {
        let h = self.hash(pos);
        let head = self.head[h];
        self.prev[pos & self.w_mask] = head;
        self.head[h] = pos as u16;
        head as usize
    }

    /// 沿哈希链查找最长匹配，返回长度并设置 `match_start`
    ///
    /// `prev_length` 是已知匹配长度，只接受更长的匹配。
    pub fn longest_match(&mut self, mut cur_match: usize, prev_length: usize, config: &Config) -> usize {
        let scan = self.strstart;
        let mut chain_length = config.max_chain;
        let mut best_len = prev_length;
        let mut nice_match = config.nice_length;
        let limit = self.strstart.saturating_sub(self.max_dist());

        if prev_length >= config.good_length {
            chain_length >>= 2;
        }
        if nice_match > self.lookahead {
            nice_match = self.lookahead;
        }

        let w = &self.window;
        let max_len = MAX_MATCH.min(w.len() - scan);
        loop {
            let m = cur_match;
            if w[m + best_len] == w[scan + best_len]
                && w[m + best_len - 1] == w[scan + best_len - 1]
                && w[m] == w[scan]
                && w[m + 1] == w[scan + 1]
            {
                let len = w[m..m + max_len]
                    .iter()
                    .zip(&w[scan..scan + max_len])
                    .take_while(|(a, b)| a == b)
                    .count();
                if len > best_len {
                    self.match_start = cur_match as isize;
                    best_len = len;
                    if len >= nice_match {
                        break;
                    }
                }
            }

            cur_match = self.prev[cur_match & self.w_mask] as usize;
            chain_length -= 1;
            if cur_match <= limit || chain_length == 0 {
                break;
            }
        }

        best_len.min(self.lookahead)
    }

    /// 当前位置重复前一字节的长度 (距离为 1 的匹配)
    pub fn rle_run(&self) -> usize {
        if self.strstart == 0 {
            return 0;
        }
        let w = &self.window;
        let prev = w[self.strstart - 1];
        let max = MAX_MATCH.min(self.lookahead);
        w[self.strstart..self.strstart + max]
            .iter()
            .take_while(|&&b| b == prev)
            .count()
    }

    /// 当前位置越过 w_size + max_dist 时滑动窗口
    pub fn slide_if_needed(&mut self) -> bool {
        if self.strstart < self.w_size + self.max_dist() {
            return false;
        }
        let w_size = self.w_size;
        self.window.copy_within(w_size.., 0);
        self.match_start -= w_size as isize;
        self.strstart -= w_size;
        self.block_start -= w_size as isize;

        for p in self.head.iter_mut().chain(self.prev.iter_mut()) {
            *p = if *p as usize >= w_size {
                *p - w_size as u16
            } else {
                0
            };
        }
        true
    }

    /// 从流中读取输入填满窗口，返回新数据在窗口中的范围
    pub fn fill(&mut self, strm: &mut StreamState) -> std::ops::Range<usize> {
        let start = self.strstart + self.lookahead;
        let n = strm.read_input(&mut self.window[start..]);
        self.lookahead += n;
        start..start + n
    }

    /// 预置字典：只保留最后 w_size 字节并建立哈希链
    pub fn set_dictionary(&mut self, dict: &[u8]) {
        let dict = &dict[dict.len().saturating_sub(self.w_size)..];
        let n = dict.len();
        self.window[..n].copy_from_slice(dict);
        self.strstart = n;
        self.block_start = n as isize;
        for pos in 0..n.saturating_sub(MIN_MATCH - 1) {
            self.insert(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(data: &[u8]) -> LZ77Encoder {
        let mut lz = LZ77Encoder::new(15, 8);
        let mut strm = StreamState::new();
        strm.set_input(data);
        lz.fill(&mut strm);
        lz
    }

    #[test]
    fn test_finds_repeat() {
        let mut lz = loaded(b"xabcdefabcdefabcdef");
        let config = CONFIGURATION_TABLE[6];
        for pos in 1..7 {
            lz.insert(pos);
        }
        lz.strstart = 7;
        lz.lookahead -= 7;
        let head = lz.insert(7);
        assert_eq!(head, 1);
        let len = lz.longest_match(head, MIN_MATCH - 1, &config);
        assert_eq!(len, 12);
        assert_eq!(lz.match_start, 1);
    }

    #[test]
    fn test_rle_run() {
        let mut lz = loaded(b"aaaaab");
        lz.strstart = 1;
        lz.lookahead = 5;
        assert_eq!(lz.rle_run(), 4);
    }

    #[test]
    fn test_slide() {
        let mut lz = LZ77Encoder::new(9, 1);
        let threshold = lz.w_size + lz.max_dist();
        lz.window[lz.w_size] = 7;
        lz.strstart = threshold;
        lz.block_start = threshold as isize;
        assert!(lz.slide_if_needed());
        assert_eq!(lz.window[0], 7);
        assert_eq!(lz.strstart, threshold - lz.w_size);
        assert!(!lz.slide_if_needed());
    }

    #[test]
    fn test_dictionary_keeps_tail() {
        let mut lz = LZ77Encoder::new(9, 1);
        let dict: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();
        lz.set_dictionary(&dict);
        assert_eq!(lz.strstart, 512);
        assert_eq!(lz.window[0], dict[488]);
    }
}
