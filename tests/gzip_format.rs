// GZIP 容器格式测试

mod common;

use rstest::rstest;

use common::{hex, sample_data};
use compress_rs::gzip::read_header;
use compress_rs::{
    deflate, gunzip, gzip, CompressError, CompressionLevel, GzipDecoder, GzipOptions, ReturnCode,
};

fn unix_options(level: CompressionLevel) -> GzipOptions {
    GzipOptions {
        level,
        timestamp: Some(0),
        name: None,
        os: 3,
    }
}

#[test]
fn test_empty_member_bytes() {
    let out = compress_rs::gzip::gzip_with(b"", unix_options(CompressionLevel::default())).unwrap();
    assert_eq!(out.len(), 20);
    insta::assert_snapshot!(hex(&out), @"1f 8b 08 00 00 00 00 00 00 03 03 00 00 00 00 00 00 00 00 00");
}

#[test]
fn test_zlib_hello_world_bytes() {
    let out = deflate(b"hello world!").unwrap();
    insta::assert_snapshot!(hex(&out), @"78 9c cb 48 cd c9 c9 57 28 cf 2f ca 49 51 04 00 1e 89 04 7e");
}

#[test]
fn test_named_member_header() {
    let options = GzipOptions {
        timestamp: Some(1_700_000_000),
        name: Some("/var/log/app.log".to_string()),
        ..unix_options(CompressionLevel::FASTEST)
    };
    let out = compress_rs::gzip::gzip_with(b"hello world!", options).unwrap();
    insta::assert_snapshot!(hex(&out[..18]), @"1f 8b 08 08 00 f1 53 65 04 03 61 70 70 2e 6c 6f 67 00");

    let (header, len) = read_header(&out).unwrap().unwrap();
    assert_eq!(len, 18);
    assert_eq!(header.name.as_deref(), Some("app.log"));
    assert_eq!(header.time, 1_700_000_000);
    assert_eq!(header.xflags, 4);
    assert_eq!(header.os, 3);
}

#[test]
fn test_default_timestamp_is_now() {
    let out = gzip(b"x").unwrap();
    let (header, _) = read_header(&out).unwrap().unwrap();
    // 2020-01-01 之后
    assert!(header.time > 1_577_836_800);
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(2)]
#[case(3)]
fn test_trailer_crc_corruption_detected(#[case] offset: usize) {
    let data = sample_data(5_000);
    let mut packed = gzip(&data).unwrap();
    let pos = packed.len() - 8 + offset;
    packed[pos] ^= 0x5A;
    assert!(matches!(
        gunzip(&packed),
        Err(CompressError::ChecksumMismatch { .. })
    ));
}

#[test]
fn test_trailer_size_corruption_detected() {
    let mut packed = gzip(b"twelve bytes").unwrap();
    let pos = packed.len() - 4;
    packed[pos] = 13;
    let err = gunzip(&packed).unwrap_err();
    assert!(matches!(
        err,
        CompressError::SizeMismatch {
            expected: 13,
            actual: 12
        }
    ));
    insta::assert_snapshot!(err.to_string(), @"size of decompressed data not correct: trailer 13, computed 12");
}

#[rstest]
#[case::header_only(10)]
#[case::mid_payload(200)]
#[case::before_trailer(8)]
#[case::one_byte_short(1)]
fn test_truncation_fails(#[case] cut: usize) {
    let data = sample_data(20_000);
    let packed = gzip(&data).unwrap();
    let truncated = if cut == 10 {
        &packed[..10]
    } else {
        &packed[..packed.len() - cut]
    };
    assert!(gunzip(truncated).is_err());

    let mut decoder = GzipDecoder::new().unwrap();
    let result = decoder.write(truncated).and_then(|_| decoder.finish());
    assert!(result.is_err());
}

#[test]
fn test_not_gzip() {
    let err = gunzip(b"plain text is not gzip").unwrap_err();
    assert_eq!(err.code(), ReturnCode::DataError);
    insta::assert_snapshot!(err.to_string(), @"Not a GZIP file");

    let err = gunzip(&[0x1F, 0x8B]).unwrap_err();
    assert!(matches!(err, CompressError::Format(_)));
}

#[test]
fn test_engine_and_container_agree() {
    let data = sample_data(30_000);
    let packed = gzip(&data).unwrap();
    assert_eq!(compress_rs::zlib::gunzip(&packed).unwrap(), data);

    let packed = compress_rs::zlib::gzip(&data).unwrap();
    assert_eq!(gunzip(&packed).unwrap(), data);
}
