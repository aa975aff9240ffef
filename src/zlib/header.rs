//! GZIP 头部信息 (RFC 1952)

/// 文本标志
pub const FTEXT: u8 = 0x01;
/// 头部 CRC16 标志
pub const FHCRC: u8 = 0x02;
/// 额外字段标志
pub const FEXTRA: u8 = 0x04;
/// 文件名标志
pub const FNAME: u8 = 0x08;
/// 注释标志
pub const FCOMMENT: u8 = 0x10;
/// 保留位，必须为零
pub const FRESERVED: u8 = 0xE0;

/// FAT 文件系统 (Windows)
pub const OS_FAT: u8 = 0;
/// Unix
pub const OS_UNIX: u8 = 3;
/// 未知系统
pub const OS_UNKNOWN: u8 = 255;

/// 当前平台的 OS 字节
pub fn os_code() -> u8 {
    if cfg!(any(target_os = "linux", target_os = "macos")) {
        OS_UNIX
    } else if cfg!(windows) {
        OS_FAT
    } else {
        OS_UNKNOWN
    }
}

/// GZIP 头部
///
/// 压缩时作为自定义头部写出；解压时由解码器填充，`done` 表示头部已完整读取。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GzHeader {
    /// 数据可能是文本
    pub text: bool,
    /// 修改时间 (Unix 秒)
    pub time: u32,
    /// 额外标志 (XFL)
    pub xflags: u8,
    /// 操作系统
    pub os: u8,
    pub extra: Option<Vec<u8>>,
    pub name: Option<String>,
    pub comment: Option<String>,
    /// 是否带头部 CRC16
    pub hcrc: bool,
    pub done: bool,
}

impl Default for GzHeader {
    fn default() -> Self {
        Self {
            text: false,
            time: 0,
            xflags: 0,
            os: os_code(),
            extra: None,
            name: None,
            comment: None,
            hcrc: false,
            done: false,
        }
    }
}

impl GzHeader {
    /// 头部对应的 FLG 字节
    pub fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.text {
            flags |= FTEXT;
        }
        if self.hcrc {
            flags |= FHCRC;
        }
        if self.extra.is_some() {
            flags |= FEXTRA;
        }
        if self.name.is_some() {
            flags |= FNAME;
        }
        if self.comment.is_some() {
            flags |= FCOMMENT;
        }
        flags
    }

    /// 序列化头部，`xfl` 由压缩级别决定
    ///
    /// 名称和注释以 NUL 结尾；额外字段长度截断到 65535 字节。
    pub fn to_bytes(&self, xfl: u8) -> Vec<u8> {
        let mut out = Vec::with_capacity(10);
        out.extend_from_slice(&[0x1F, 0x8B, 8, self.flags()]);
        out.extend_from_slice(&self.time.to_le_bytes());
        out.push(xfl);
        out.push(self.os);
        if let Some(extra) = &self.extra {
            let extra = &extra[..extra.len().min(0xFFFF)];
            out.extend_from_slice(&(extra.len() as u16).to_le_bytes());
            out.extend_from_slice(extra);
        }
        for field in [&self.name, &self.comment].into_iter().flatten() {
            out.extend(field.bytes().filter(|&b| b != 0));
            out.push(0);
        }
        if self.hcrc {
            let crc = super::crc32(0, &out);
            out.extend_from_slice(&(crc as u16).to_le_bytes());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_header() {
        let header = GzHeader {
            os: OS_UNIX,
            ..GzHeader::default()
        };
        assert_eq!(header.flags(), 0);
        assert_eq!(
            header.to_bytes(0),
            vec![0x1F, 0x8B, 8, 0, 0, 0, 0, 0, 0, 3]
        );
    }

    #[test]
    fn test_optional_fields() {
        let header = GzHeader {
            time: 0x0102_0304,
            os: OS_UNKNOWN,
            extra: Some(vec![b'A', b'B', 0, 0]),
            name: Some("a.txt".to_string()),
            comment: Some("hi".to_string()),
            ..GzHeader::default()
        };
        let bytes = header.to_bytes(2);
        assert_eq!(bytes[3], FEXTRA | FNAME | FCOMMENT);
        assert_eq!(&bytes[4..8], &[4, 3, 2, 1]);
        assert_eq!(bytes[8], 2);
        assert_eq!(bytes[9], 255);
        assert_eq!(&bytes[10..12], &[4, 0]);
        assert_eq!(&bytes[16..], b"a.txt\0hi\0");
    }
}
