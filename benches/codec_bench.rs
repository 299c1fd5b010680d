//! Ling 解码核心性能基准测试.
//!
//! 覆盖头部解析与逐宏块熵解码两条核心路径. 码流由基准自行组装:
//! 全帧内、无 AC 系数的合成 I-VOP, 宏块数随分辨率变化.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ling::codec::{CodecId, Packet};
use ling::{Decoder, PictureType};

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

/// 组装 VOL + I-VOP 码流, 宏块全部为帧内、CBP=0
fn make_intra_stream(width: u32, height: u32) -> Vec<u8> {
    let mut vol = String::new();
    vol.push('0'); // random_accessible_vol
    push_bits(&mut vol, 1, 8); // vo_type = simple
    vol.push('0');
    push_bits(&mut vol, 1, 4); // aspect 1:1
    vol.push('0');
    push_bits(&mut vol, 0, 2); // rectangular
    vol.push('1');
    push_bits(&mut vol, 25, 16); // time_increment_resolution
    vol.push('1');
    vol.push('0');
    vol.push('1');
    push_bits(&mut vol, width, 13);
    vol.push('1');
    push_bits(&mut vol, height, 13);
    vol.push('1');
    vol.push_str("010001100"); // interlaced..scalability 固定尾部

    let mut vop = String::new();
    push_bits(&mut vop, 0, 2); // I
    vop.push('0');
    vop.push('1');
    push_bits(&mut vop, 1, 5); // time_increment
    vop.push('1');
    vop.push('1'); // vop_coded
    push_bits(&mut vop, 0, 3); // intra_dc_vlc_thr
    push_bits(&mut vop, 5, 5); // qscale

    let mb_count = width.div_ceil(16) * height.div_ceil(16);
    for _ in 0..mb_count {
        // MCBPC=Intra/cbpc0, ac_pred=0, CBPY=0, 6 个 DC size=0
        vop.push_str("100011");
        for _ in 0..4 {
            vop.push_str("011");
        }
        vop.push_str("1111");
    }
    vop.push('0'); // stuffing
    while vop.len() % 8 != 0 {
        vop.push('1');
    }

    let mut data = vec![0x00, 0x00, 0x01, 0x20];
    data.extend(bits_to_bytes(&vol));
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0xB6]);
    data.extend(bits_to_bytes(&vop));
    data
}

fn bench_header_parse(c: &mut Criterion) {
    c.bench_function("mpeg4_header_parse_qcif", |b| {
        let registry = ling::default_codec_registry();
        let stream = make_intra_stream(176, 144);
        // 只有 VOL 部分 (不含 VOP 起始码) 作为 extradata
        let vol_len = stream
            .windows(4)
            .position(|w| w == [0x00, 0x00, 0x01, 0xB6])
            .unwrap_or(stream.len());
        let extra = stream[..vol_len].to_vec();

        b.iter(|| {
            let mut dec = registry.create_decoder(CodecId::Mpeg4).unwrap();
            let params = ling::CodecParameters {
                codec_id: CodecId::Mpeg4,
                codec_tag: 0,
                extra_data: black_box(extra.clone()),
                bit_rate: 0,
                params: ling::codec::CodecParamsType::None,
            };
            dec.open(&params).unwrap();
        });
    });
}

fn bench_intra_decode(c: &mut Criterion) {
    for (name, w, h) in [("qcif", 176u32, 144u32), ("cif", 352, 288)] {
        c.bench_function(&format!("mpeg4_intra_decode_{name}"), |b| {
            let registry = ling::default_codec_registry();
            let stream = make_intra_stream(w, h);

            b.iter(|| {
                let mut dec = registry.create_decoder(CodecId::Mpeg4).unwrap();
                dec.send_packet(&Packet::from_data(black_box(stream.clone())))
                    .unwrap();
                let picture = dec.receive_picture().unwrap();
                assert_eq!(picture.picture_type, PictureType::I);
                black_box(picture);
            });
        });
    }
}

criterion_group!(benches, bench_header_parse, bench_intra_decode);
criterion_main!(benches);
