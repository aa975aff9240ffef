// 错误处理测试

mod common;

use rstest::rstest;

use common::sample_data;
use compress_rs::zlib::{deflate_with, inflate_raw, inflate_with};
use compress_rs::{
    deflate, inflate, CompressError, Deflate, DeflateOptions, Flush, Inflate, InflateOptions,
    ReturnCode,
};

#[rstest]
#[case::bad_header(vec![0x78, 0x00, 0x00, 0x00], "incorrect header check")]
#[case::bad_method(vec![0x77, 0x85, 0x00, 0x00], "unknown compression method")]
#[case::bad_window(vec![0x88, 0x98, 0x00, 0x00], "invalid window size")]
#[case::bad_flags(vec![0x1F, 0x8B, 0x08, 0xE0, 0, 0, 0, 0, 0, 3], "unknown header flags set")]
fn test_header_errors(#[case] input: Vec<u8>, #[case] message: &str) {
    let err = inflate(&input).unwrap_err();
    assert_eq!(err.code(), ReturnCode::DataError);
    assert_eq!(err.to_string(), message);
}

#[rstest]
#[case::block_type(vec![0x07], "invalid block type")]
#[case::stored_lengths(vec![0x01, 0x05, 0x00, 0x00, 0x00], "invalid stored block lengths")]
#[case::too_far_back(vec![0x03, 0x02, 0x00], "invalid distance too far back")]
fn test_block_errors(#[case] input: Vec<u8>, #[case] message: &str) {
    let err = inflate_raw(&input).unwrap_err();
    assert_eq!(err.code(), ReturnCode::DataError);
    assert_eq!(err.to_string(), message);
}

#[test]
fn test_adler_mismatch() {
    let mut packed = deflate(&sample_data(1000)).unwrap();
    let last = packed.len() - 1;
    packed[last] ^= 1;
    let err = inflate(&packed).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"incorrect data check");
}

#[test]
fn test_truncated_finish_is_buffer_error() {
    let packed = deflate(&sample_data(5000)).unwrap();
    let err = inflate(&packed[..packed.len() - 5]).unwrap_err();
    assert_eq!(err.code(), ReturnCode::BufError);
    insta::assert_snapshot!(err.to_string(), @"unexpected end of stream");
}

#[test]
fn test_use_after_finish() {
    let mut engine = Deflate::new(DeflateOptions::default()).unwrap();
    engine.push(b"data", Flush::Finish).unwrap();
    assert!(engine.is_ended());
    let err = engine.push(b"more", Flush::NoFlush).unwrap_err();
    assert!(matches!(err, CompressError::UseAfterFinish));
    insta::assert_snapshot!(err.to_string(), @"can not call after ended");

    let packed = deflate(b"data").unwrap();
    let mut engine = Inflate::new(InflateOptions::default()).unwrap();
    engine.push(&packed, Flush::Finish).unwrap();
    assert!(matches!(
        engine.push(&packed, Flush::Finish),
        Err(CompressError::UseAfterFinish)
    ));
}

#[test]
fn test_errored_engine_is_terminal() {
    let mut engine = Inflate::new(InflateOptions::default()).unwrap();
    assert!(engine.push(&[0x78, 0x00], Flush::NoFlush).is_err());
    assert!(engine.is_ended());
    assert!(matches!(
        engine.push(&[0x03, 0x00], Flush::Finish),
        Err(CompressError::UseAfterFinish)
    ));
}

#[rstest]
#[case::window_too_small(DeflateOptions { window_bits: 7, ..DeflateOptions::default() })]
#[case::window_too_large(DeflateOptions { window_bits: 16, ..DeflateOptions::default() })]
#[case::raw_window_8(DeflateOptions { window_bits: 8, raw: true, ..DeflateOptions::default() })]
#[case::mem_level(DeflateOptions { mem_level: 10, ..DeflateOptions::default() })]
#[case::gzip_dictionary(DeflateOptions { gzip: true, dictionary: Some(b"dict".to_vec()), ..DeflateOptions::default() })]
fn test_invalid_deflate_options(#[case] options: DeflateOptions) {
    let err = Deflate::new(options).unwrap_err();
    assert!(matches!(err, CompressError::Configuration(_)));
    assert_eq!(err.code(), ReturnCode::StreamError);
}

#[test]
fn test_missing_dictionary() {
    let options = DeflateOptions {
        dictionary: Some(b"shared vocabulary".to_vec()),
        ..DeflateOptions::default()
    };
    let packed = deflate_with(b"shared vocabulary again", options).unwrap();

    let err = inflate(&packed).unwrap_err();
    assert_eq!(err.code(), ReturnCode::NeedDict);
    insta::assert_snapshot!(err.to_string(), @"need dictionary");

    let options = InflateOptions {
        dictionary: Some(b"shared vocabulary".to_vec()),
        ..InflateOptions::default()
    };
    assert_eq!(inflate_with(&packed, options).unwrap(), b"shared vocabulary again");
}
