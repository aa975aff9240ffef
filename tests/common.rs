// 公共测试辅助函数

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// 可重复的混合文本/二进制数据
pub fn sample_data(len: usize) -> Vec<u8> {
    let words: [&[u8]; 6] = [
        b"deflate ",
        b"gzip ",
        b"stream\n",
        b"checksum ",
        b"\x00\xff\x10",
        b"window ",
    ];
    let mut out = Vec::with_capacity(len);
    let mut seed = 0x2545_F491u32;
    while out.len() < len {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        let word = words[seed as usize % words.len()];
        out.extend_from_slice(word);
        if seed % 7 == 0 {
            out.push((seed >> 8) as u8);
        }
    }
    out.truncate(len);
    out
}

/// 几乎不可压缩的数据
pub fn noise(len: usize) -> Vec<u8> {
    let mut seed = 0x9E37_79B9u32;
    (0..len)
        .map(|_| {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (seed >> 24) as u8
        })
        .collect()
}

/// 以空格分隔的十六进制，用于快照
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// 创建临时测试目录
pub fn test_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

/// 在临时目录中写入一个文件
pub fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("Failed to write fixture");
    path
}
