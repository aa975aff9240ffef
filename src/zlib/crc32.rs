//! CRC-32 校验和 (IEEE 802.3, 反射多项式 0xEDB88320)

const POLY: u32 = 0xEDB8_8320;

/// 查找表，编译期生成
pub static CRC32_TABLE: [u32; 256] = make_table();

const fn make_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { POLY ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

#[inline]
fn update(mut raw: u32, data: &[u8]) -> u32 {
    for &b in data {
        raw = (raw >> 8) ^ CRC32_TABLE[((raw ^ b as u32) & 0xFF) as usize];
    }
    raw
}

/// 计算 CRC-32
///
/// `crc` 为前一段的结果 (新数据从 0 开始)，因此可以分段计算：
/// `crc32(crc32(0, a), b) == crc32(0, a ++ b)`
pub fn crc32(crc: u32, data: &[u8]) -> u32 {
    !update(!crc, data)
}

/// 增量 CRC-32
///
/// 内部保存未取反的寄存器值；`raw()` 返回寄存器，`sum()` 返回标准校验值。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc32 {
    state: u32,
    amount: u64,
}

impl Crc32 {
    pub fn new() -> Self {
        Self {
            state: !0,
            amount: 0,
        }
    }

    /// 追加数据，返回当前标准校验值
    pub fn append(&mut self, data: &[u8]) -> u32 {
        self.state = update(self.state, data);
        self.amount += data.len() as u64;
        self.sum()
    }

    /// 寄存器原始值
    pub fn raw(&self) -> u32 {
        self.state
    }

    /// 标准 (取反后) 校验值
    pub fn sum(&self) -> u32 {
        !self.state
    }

    /// 已追加的字节数
    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}
