//! 解码器端到端测试: 组装真实位串走 Decoder 接口.

use super::*;
use crate::codec_parameters::CodecParamsType;
use crate::picture::MbKind;
use ling_core::PixelFormat;
use ling_core::Rational;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

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

/// 最小合法 VOL 头位串 (不带起始码), 矩形, 无数据分区
fn minimal_vol_bits(width: u32, height: u32, tir: u32) -> String {
    let mut s = String::new();
    s.push('0'); // random_accessible_vol
    push_bits(&mut s, 1, 8); // vo_type = simple
    s.push('0'); // is_ol_id
    push_bits(&mut s, 1, 4); // aspect_ratio_info = 1:1
    s.push('0'); // vol_control_parameters
    push_bits(&mut s, 0, 2); // shape = rectangular
    s.push('1');
    push_bits(&mut s, tir, 16);
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
    s.push('1'); // resync_marker_disable
    s.push('0'); // data_partitioned
    s.push('0'); // scalability
    s
}

/// I-VOP 头位串 (tir=25 → 5 位 time_increment)
fn i_vop_header_bits(qscale: u32) -> String {
    let mut s = String::new();
    push_bits(&mut s, 0, 2); // coding_type = I
    s.push('0'); // modulo_time_base 结束
    s.push('1');
    push_bits(&mut s, 1, 5); // time_increment
    s.push('1');
    s.push('1'); // vop_coded
    push_bits(&mut s, 0, 3); // intra_dc_vlc_thr
    push_bits(&mut s, qscale, 5);
    s
}

/// 追加字节对齐 stuffing ('0' 后补 '1')
fn pad_stuffing(s: &mut String) {
    s.push('0');
    while s.len() % 8 != 0 {
        s.push('1');
    }
}

/// 16x16 (单宏块) 码流: VOL + I-VOP + 一个无 AC 系数的帧内宏块
fn single_mb_stream() -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0x20]);
    data.extend(bits_to_bytes(&minimal_vol_bits(16, 16, 25)));
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0xB6]);

    let mut s = i_vop_header_bits(5);
    // 宏块: MCBPC "1" (Intra, cbpc=0), ac_pred=0, CBPY=0 ("0011"),
    // 亮度 DC size=0 "011" x4, 色度 DC size=0 "11" x2
    s.push('1');
    s.push('0');
    s.push_str("0011");
    for _ in 0..4 {
        s.push_str("011");
    }
    for _ in 0..2 {
        s.push_str("11");
    }
    pad_stuffing(&mut s);
    data.extend(bits_to_bytes(&s));
    data
}

#[test]
fn test_工厂与标识() {
    let dec = Mpeg4Decoder::create().unwrap();
    assert_eq!(dec.codec_id(), CodecId::Mpeg4);
    assert_eq!(dec.name(), "mpeg4");
}

#[test]
fn test_extradata_配置() {
    let mut extra = vec![0x00, 0x00, 0x01, 0x20];
    extra.extend(bits_to_bytes(&minimal_vol_bits(176, 144, 30)));
    let params = CodecParameters {
        codec_id: CodecId::Mpeg4,
        codec_tag: 0,
        extra_data: extra,
        bit_rate: 0,
        params: CodecParamsType::None,
    };

    let mut dec = Mpeg4Decoder::new();
    dec.open(&params).unwrap();
    assert_eq!((dec.mb_width, dec.mb_height), (11, 9));
    assert!(dec.state.vol_found);
    assert!(matches!(dec.receive_picture(), Err(LingError::NeedMoreData)));
}

#[test]
fn test_单宏块i帧端到端() {
    init_logs();
    let mut dec = Mpeg4Decoder::new();
    dec.send_packet(&Packet::from_data(single_mb_stream())).unwrap();

    let picture = dec.receive_picture().unwrap();
    assert_eq!(picture.picture_type, PictureType::I);
    assert!(picture.is_keyframe);
    assert_eq!(picture.pixel_format, PixelFormat::Yuv420p);
    assert_eq!(picture.mb_count(), 1);
    assert_eq!(picture.qscale, 5);
    assert!(picture.error_spans.is_empty());

    let mb = &picture.macroblocks[0];
    assert_eq!(mb.kind, MbKind::Intra { ac_pred: false });
    assert_eq!(mb.quant, 5);
    assert_eq!(mb.cbp, 0);
    // DC 差分全零: 块内只有预测得到的 DC, 无 AC
    assert!(mb.blocks[0][1..].iter().all(|&c| c == 0));

    assert!(matches!(dec.receive_picture(), Err(LingError::NeedMoreData)));
}

#[test]
fn test_未编码vop不出帧() {
    let mut data = vec![0x00, 0x00, 0x01, 0x20];
    data.extend(bits_to_bytes(&minimal_vol_bits(64, 64, 25)));
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0xB6]);
    let mut s = String::new();
    push_bits(&mut s, 1, 2); // P
    s.push('0');
    s.push('1');
    push_bits(&mut s, 3, 5);
    s.push('1');
    s.push('0'); // vop_coded = 0
    pad_stuffing(&mut s);
    data.extend(bits_to_bytes(&s));

    let mut dec = Mpeg4Decoder::new();
    dec.send_packet(&Packet::from_data(data)).unwrap();
    assert!(matches!(dec.receive_picture(), Err(LingError::NeedMoreData)));

    dec.send_packet(&Packet::empty()).unwrap();
    assert!(matches!(dec.receive_picture(), Err(LingError::Eof)));
}

#[test]
fn test_无vol尺寸未知时报错() {
    let mut data = vec![0x00, 0x00, 0x01, 0xB6];
    let mut s = i_vop_header_bits(5);
    pad_stuffing(&mut s);
    data.extend(bits_to_bytes(&s));

    let mut dec = Mpeg4Decoder::new();
    assert!(dec.send_packet(&Packet::from_data(data)).is_err());
}

#[test]
fn test_packed_后缀探测() {
    // 两个 VOP: 第二个类型位 "10" (B-VOP), 应在其起始码处拆分
    let data = [
        0x00, 0x00, 0x01, 0xB6, 0xC5, 0x11, 0x22, //
        0x00, 0x00, 0x01, 0xB6, 0x85, 0x33,
    ];
    assert_eq!(Mpeg4Decoder::find_packed_suffix(&data), Some(7));

    // 第二个 VOP 类型位不匹配时不拆分
    let data2 = [
        0x00, 0x00, 0x01, 0xB6, 0xC5, //
        0x00, 0x00, 0x01, 0xB6, 0x45,
    ];
    assert_eq!(Mpeg4Decoder::find_packed_suffix(&data2), None);
}

#[test]
fn test_帧级并行快照共享锚点() {
    let mut dec = Mpeg4Decoder::new();
    let mut extra = vec![0x00, 0x00, 0x01, 0x20];
    extra.extend(bits_to_bytes(&minimal_vol_bits(64, 64, 25)));
    let params = CodecParameters {
        codec_id: CodecId::Mpeg4,
        codec_tag: 0,
        extra_data: extra,
        bit_rate: 0,
        params: CodecParamsType::None,
    };
    dec.open(&params).unwrap();

    let child = dec.split_for_frame_parallel();
    assert!(dec.publish_progress.is_some());
    assert!(child.anchor_progress.is_some());
    assert_eq!((child.mb_width, child.mb_height), (4, 4));
    assert_eq!(child.state.framerate, Rational::new(25, 1));
}
