//! MPEG-4 Part 2 解码集成测试
//!
//! 通过 ling 门面组装真实位串走完整解码流水:
//! - 注册表创建解码器与 open 配置
//! - VOL/VOP 头部解析 + 逐宏块熵解码
//! - resync 视频分组边界
//! - 截断码流的容错 (错误区间记录, 不 panic)

use ling::codec::{CodecParamsType, VideoCodecParams};
use ling::{
    CodecId, CodecParameters, Decoder, LingError, MbKind, Packet, PictureType, PixelFormat,
    Rational,
};

fn push_bits(s: &mut String, value: u32, n: u8) {
    for i in (0..n).rev() {
        s.push(if (value >> i) & 1 == 1 { '1' } else { '0' });
    }
}

fn bits_to_bytes(bits: &str) -> Vec<u8> {
    let mut out = Vec::new();
    let mut acc = 0u8;
    let mut n = 0;
    for c in bits.chars() {
        acc = (acc << 1) | (c == '1') as u8;
        n += 1;
        if n == 8 {
            out.push(acc);
            acc = 0;
            n = 0;
        }
    }
    if n > 0 {
        out.push(acc << (8 - n));
    }
    out
}

/// 最小 VOL 头 (矩形, tir=25); `resync` 控制 resync_marker_disable 位
fn vol_bits(width: u32, height: u32, resync: bool) -> String {
    let mut s = String::new();
    s.push('0');
    push_bits(&mut s, 1, 8); // vo_type = simple
    s.push('0');
    push_bits(&mut s, 1, 4); // aspect 1:1
    s.push('0');
    push_bits(&mut s, 0, 2); // rectangular
    s.push('1');
    push_bits(&mut s, 25, 16);
    s.push('1');
    s.push('0'); // fixed_vop_rate
    s.push('1');
    push_bits(&mut s, width, 13);
    s.push('1');
    push_bits(&mut s, height, 13);
    s.push('1');
    s.push('0'); // interlaced
    s.push('1'); // obmc_disable
    s.push('0'); // sprite_usage
    s.push('0'); // not_8_bit
    s.push('0'); // mpeg_quant
    s.push('1'); // complexity_estimation_disable
    s.push(if resync { '0' } else { '1' }); // resync_marker_disable
    s.push('0'); // data_partitioned
    s.push('0'); // scalability
    s
}

fn i_vop_header_bits(qscale: u32) -> String {
    let mut s = String::new();
    push_bits(&mut s, 0, 2); // I
    s.push('0');
    s.push('1');
    push_bits(&mut s, 1, 5); // time_increment
    s.push('1');
    s.push('1'); // vop_coded
    push_bits(&mut s, 0, 3); // intra_dc_vlc_thr
    push_bits(&mut s, qscale, 5);
    s
}

/// 帧内宏块, cbp=0, DC 差分全零
fn intra_mb_bits(s: &mut String) {
    s.push('1'); // MCBPC: Intra, cbpc=0
    s.push('0'); // ac_pred
    s.push_str("0011"); // CBPY = 0
    for _ in 0..4 {
        s.push_str("011"); // 亮度 DC size=0
    }
    s.push_str("1111"); // 色度 DC size=0 x2
}

fn pad_stuffing(s: &mut String) {
    s.push('0');
    while s.len() % 8 != 0 {
        s.push('1');
    }
}

fn create_decoder() -> Box<dyn Decoder> {
    let _ = env_logger::builder().is_test(true).try_init();
    let registry = ling::default_codec_registry();
    registry.create_decoder(CodecId::Mpeg4).expect("创建 mpeg4 解码器失败")
}

#[test]
fn test_解码器创建与打开() {
    let mut decoder = create_decoder();
    assert_eq!(decoder.codec_id(), CodecId::Mpeg4);

    let params = CodecParameters {
        codec_id: CodecId::Mpeg4,
        codec_tag: 0,
        extra_data: Vec::new(),
        bit_rate: 0,
        params: CodecParamsType::Video(VideoCodecParams {
            width: 640,
            height: 480,
            pixel_format: PixelFormat::Yuv420p,
            frame_rate: Rational::new(30, 1),
            sample_aspect_ratio: Rational::new(1, 1),
        }),
    };
    assert!(decoder.open(&params).is_ok());
    assert!(matches!(
        decoder.receive_picture(),
        Err(LingError::NeedMoreData)
    ));
}

#[test]
fn test_i帧带内vol解码() {
    let mut data = vec![0x00, 0x00, 0x01, 0x20];
    data.extend(bits_to_bytes(&vol_bits(16, 16, false)));
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0xB6]);
    let mut s = i_vop_header_bits(5);
    intra_mb_bits(&mut s);
    pad_stuffing(&mut s);
    data.extend(bits_to_bytes(&s));

    let mut decoder = create_decoder();
    decoder.send_packet(&Packet::from_data(data)).unwrap();
    let picture = decoder.receive_picture().unwrap();

    assert_eq!(picture.picture_type, PictureType::I);
    assert!(picture.is_keyframe);
    assert_eq!((picture.width, picture.height), (16, 16));
    assert_eq!(picture.pixel_format, PixelFormat::Yuv420p);
    assert!(picture.error_spans.is_empty());
    assert_eq!(
        picture.macroblocks[0].kind,
        MbKind::Intra { ac_pred: false }
    );
    assert_eq!(picture.macroblocks[0].quant, 5);
}

#[test]
fn test_两个视频分组的i帧() {
    // 32x16: 两个宏块, 第二个在独立的视频分组里
    let mut data = vec![0x00, 0x00, 0x01, 0x20];
    data.extend(bits_to_bytes(&vol_bits(32, 16, true)));
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0xB6]);

    let mut s = i_vop_header_bits(5);
    intra_mb_bits(&mut s);
    pad_stuffing(&mut s);
    // resync marker: 16 个零 + 1, mb_num (1 位) = 1, qscale, 无扩展
    s.push_str(&"0".repeat(16));
    s.push('1');
    s.push('1'); // mb_num = 1
    push_bits(&mut s, 7, 5); // 分组 qscale
    s.push('0'); // header_extension
    intra_mb_bits(&mut s);
    pad_stuffing(&mut s);
    data.extend(bits_to_bytes(&s));

    let mut decoder = create_decoder();
    decoder.send_packet(&Packet::from_data(data)).unwrap();
    let picture = decoder.receive_picture().unwrap();

    assert!(picture.error_spans.is_empty(), "{:?}", picture.error_spans);
    assert_eq!(picture.mb_count(), 2);
    assert_eq!(
        picture.macroblocks[0].kind,
        MbKind::Intra { ac_pred: false }
    );
    assert_eq!(
        picture.macroblocks[1].kind,
        MbKind::Intra { ac_pred: false }
    );
    // 分组头的 qscale 覆盖第二个宏块
    assert_eq!(picture.macroblocks[0].quant, 5);
    assert_eq!(picture.macroblocks[1].quant, 7);
}

#[test]
fn test_截断码流记录错误区间() {
    let mut data = vec![0x00, 0x00, 0x01, 0x20];
    data.extend(bits_to_bytes(&vol_bits(16, 16, false)));
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0xB6]);
    let mut s = i_vop_header_bits(5);
    intra_mb_bits(&mut s);
    pad_stuffing(&mut s);
    let payload = bits_to_bytes(&s);
    // VOP 头完整, 宏块数据被截断
    data.extend_from_slice(&payload[..3]);

    let mut decoder = create_decoder();
    decoder.send_packet(&Packet::from_data(data)).unwrap();
    let picture = decoder.receive_picture().unwrap();
    assert!(!picture.error_spans.is_empty());
}

#[test]
fn test_排空后eof() {
    let mut decoder = create_decoder();
    decoder.send_packet(&Packet::empty()).unwrap();
    assert!(matches!(decoder.receive_picture(), Err(LingError::Eof)));
}
