// 压缩/解压往返测试

mod common;

use rstest::rstest;

use common::{noise, sample_data};
use compress_rs::zlib::{self, Adler32, Crc32};
use compress_rs::{
    adler32, crc32, deflate, deflate_raw, gunzip, gzip, inflate, inflate_raw, CompressionLevel,
    Deflate, DeflateOptions, Flush, Inflate, InflateOptions, Strategy,
};

#[test]
fn test_hello_world() {
    let packed = deflate(b"hello world!").unwrap();
    assert_eq!(inflate(&packed).unwrap(), b"hello world!");
    assert_eq!(inflate(&packed).unwrap().len(), 12);
}

#[rstest]
fn test_levels_and_strategies(
    #[values(0, 1, 2, 3, 4, 5, 6, 7, 8, 9)] level: u8,
    #[values(
        Strategy::Default,
        Strategy::Filtered,
        Strategy::HuffmanOnly,
        Strategy::Rle,
        Strategy::Fixed
    )]
    strategy: Strategy,
) {
    let data = sample_data(70_000);
    let options = DeflateOptions {
        level: CompressionLevel::from_u8(level).unwrap(),
        strategy,
        ..DeflateOptions::default()
    };

    let zlib_packed = zlib::deflate_with(&data, options.clone()).unwrap();
    assert_eq!(inflate(&zlib_packed).unwrap(), data);

    let gzip_packed = zlib::gzip_with(&data, options.clone()).unwrap();
    assert_eq!(gunzip(&gzip_packed).unwrap(), data);
    assert_eq!(zlib::gunzip(&gzip_packed).unwrap(), data);

    let raw_packed = zlib::deflate_raw_with(&data, options).unwrap();
    assert_eq!(inflate_raw(&raw_packed).unwrap(), data);
}

#[rstest]
#[case::empty(Vec::new())]
#[case::one_byte(vec![0x42])]
#[case::zeros(vec![0; 100_000])]
#[case::noise(noise(100_000))]
#[case::text(sample_data(300_000))]
fn test_edge_payloads(#[case] data: Vec<u8>) {
    assert_eq!(inflate(&deflate(&data).unwrap()).unwrap(), data);
    assert_eq!(inflate_raw(&deflate_raw(&data).unwrap()).unwrap(), data);
    assert_eq!(gunzip(&gzip(&data).unwrap()).unwrap(), data);
}

#[test]
fn test_incompressible_stays_small() {
    let data = noise(50_000);
    let packed = deflate(&data).unwrap();
    // 存储块开销：每块 5 字节
    assert!(packed.len() < data.len() + data.len() / 1000 + 32);
}

#[rstest]
#[case(1)]
#[case(100)]
#[case(4096)]
#[case(65_537)]
fn test_chunked_streaming_matches_one_shot(#[case] piece: usize) {
    let data = sample_data(200_000);
    let expected = deflate(&data).unwrap();

    let mut engine = Deflate::new(DeflateOptions::default()).unwrap();
    let mut packed = Vec::new();
    for chunk in data.chunks(piece) {
        packed.extend(engine.push(chunk, Flush::NoFlush).unwrap());
    }
    packed.extend(engine.push(&[], Flush::Finish).unwrap());
    assert_eq!(packed, expected);
    assert_eq!(engine.total_in(), data.len() as u64);
    assert_eq!(engine.total_out(), expected.len() as u64);

    let mut engine = Inflate::new(InflateOptions::default()).unwrap();
    let mut out = Vec::new();
    for chunk in packed.chunks(piece) {
        out.extend(engine.push(chunk, Flush::NoFlush).unwrap());
    }
    assert!(engine.is_ended());
    assert_eq!(out, data);
}

#[test]
fn test_sync_flush_is_decodable_mid_stream() {
    let mut engine = Deflate::new(DeflateOptions::default()).unwrap();
    let mut inflater = Inflate::new(InflateOptions::default()).unwrap();

    let mut decoded = Vec::new();
    for message in [&b"first message "[..], b"second message ", b"third"] {
        let packed = engine.push(message, Flush::SyncFlush).unwrap();
        assert!(packed.ends_with(&[0x00, 0x00, 0xFF, 0xFF]));
        decoded.extend(inflater.push(&packed, Flush::SyncFlush).unwrap());
        assert!(decoded.ends_with(message));
    }
    let tail = engine.push(&[], Flush::Finish).unwrap();
    decoded.extend(inflater.push(&tail, Flush::Finish).unwrap());
    assert_eq!(decoded, b"first message second message third");
}

#[test]
fn test_checksum_accumulators() {
    let data = sample_data(10_000);
    let (a, b) = data.split_at(3_333);

    let mut crc = Crc32::new();
    crc.append(a);
    crc.append(b);
    assert_eq!(crc.sum(), crc32(0, &data));
    assert_eq!(crc.amount(), data.len() as u64);

    let mut adler = Adler32::new();
    adler.append(a);
    adler.append(b);
    assert_eq!(adler.sum(), adler32(1, &data));
}

quickcheck::quickcheck! {
    fn prop_zlib_roundtrip(data: Vec<u8>) -> bool {
        inflate(&deflate(&data).unwrap()).unwrap() == data
    }

    fn prop_gzip_roundtrip(data: Vec<u8>) -> bool {
        gunzip(&gzip(&data).unwrap()).unwrap() == data
    }

    fn prop_crc32_composes(a: Vec<u8>, b: Vec<u8>) -> bool {
        let joined = [a.as_slice(), b.as_slice()].concat();
        crc32(crc32(0, &a), &b) == crc32(0, &joined)
    }

    fn prop_adler32_composes(a: Vec<u8>, b: Vec<u8>) -> bool {
        let joined = [a.as_slice(), b.as_slice()].concat();
        adler32(adler32(1, &a), &b) == adler32(1, &joined)
    }

    fn prop_split_independent(seed: Vec<u8>, cuts: Vec<u16>) -> bool {
        let data = seed.repeat(50);
        let mut engine = Deflate::new(DeflateOptions::default()).unwrap();
        let mut packed = Vec::new();
        let mut rest = data.as_slice();
        for cut in cuts {
            let (head, tail) = rest.split_at((cut as usize).min(rest.len()));
            packed.extend(engine.push(head, Flush::NoFlush).unwrap());
            rest = tail;
        }
        packed.extend(engine.push(rest, Flush::Finish).unwrap());
        packed == deflate(&data).unwrap()
    }
}
