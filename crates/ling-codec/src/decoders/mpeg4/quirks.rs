//! 编码器识别与兼容性修正
//!
//! user_data 起始码后的编码器签名字符串 (DivX / Xvid / FFmpeg libavcodec)
//! 决定一组兼容性修正标志. 识别逻辑集中在本模块, 解码核心只消费
//! [`Workarounds`] 位集, 不感知具体的编码器版本.

use bitflags::bitflags;
use log::{debug, info};

use super::bitreader::BitReader;

bitflags! {
    /// 针对历史编码器缺陷的修正标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub(super) struct Workarounds: u32 {
        /// 由版本信息自动推导 (默认开启)
        const AUTODETECT = 1 << 0;
        /// 旧 Xvid 的隔行缺陷: cbp=0 的隔行宏块仍携带 dct_type 位
        const XVID_ILACE = 1 << 1;
        /// UMP4 时间基不单调, 需要递增修正
        const UMP4 = 1 << 2;
        /// 码流末尾无 stuffing 填充 (resync 末尾判定要放宽)
        const NO_PADDING = 1 << 3;
        /// quarter-pel 色度取整缺陷 (DivX 500+/旧 Xvid)
        const QPEL_CHROMA = 1 << 4;
        /// 标准 qpel 与旧 lavc qpel 的差异
        const STD_QPEL = 1 << 5;
        /// 第二种 qpel 色度缺陷 (DivX >502)
        const QPEL_CHROMA2 = 1 << 6;
        /// 直接模式块尺寸缺陷 (旧 lavc / DivX)
        const DIRECT_BLOCKSIZE = 1 << 7;
        /// 边缘扩展缺陷
        const EDGE = 1 << 8;
        /// half-pel 色度缺陷 (DivX 全系)
        const HPEL_CHROMA = 1 << 9;
        /// 帧内 DC 不裁剪 (旧 lavc / 旧 Xvid)
        const DC_CLIP = 1 << 10;
        /// 隔行边缘缺陷 (特定 lavc 3.2.x 区间)
        const IEDGE = 1 << 11;
        /// AMV (GMC 均值 MV) 取整缺陷
        const AMV = 1 << 12;
    }
}

/// 从 user_data 字符串识别出的编码器版本信息
///
/// -1 表示未识别; 每个流可以出现多段 user_data, 字段按出现逐步填充.
#[derive(Debug, Clone, Copy)]
pub(super) struct EncoderIdent {
    pub divx_version: i32,
    pub divx_build: i32,
    /// DivX packed bitstream ("...p" 后缀)
    pub divx_packed: bool,
    pub xvid_build: i32,
    pub lavc_build: i32,
}

impl Default for EncoderIdent {
    fn default() -> Self {
        Self {
            divx_version: -1,
            divx_build: -1,
            divx_packed: false,
            xvid_build: -1,
            lavc_build: -1,
        }
    }
}

/// 解析 user_data (起始码 0x1B2 之后的内容), 更新编码器识别信息
///
/// 读到下一个起始码前缀 (23 个零位) 或 255 字节为止.
pub(super) fn parse_user_data(reader: &mut BitReader, ident: &mut EncoderIdent) {
    let mut buf = Vec::with_capacity(255);
    while buf.len() < 255 && reader.bits_left() >= 8 {
        if reader.bits_left() >= 23 && reader.peek_bits(23) == Some(0) {
            break;
        }
        match reader.read_bits(8) {
            Some(b) => buf.push(b as u8),
            None => break,
        }
    }
    let text = String::from_utf8_lossy(&buf);
    debug!("user_data: {text:?}");

    // DivX: "DivX{ver}Build{build}{p?}" 或 "DivX{ver}b{build}{p?}"
    if let Some(rest) = text.strip_prefix("DivX") {
        let (ver, rest) = take_int(rest);
        let rest = rest
            .strip_prefix("Build")
            .or_else(|| rest.strip_prefix('b'));
        if let (Some(ver), Some(rest)) = (ver, rest) {
            let (build, rest) = take_int(rest);
            if let Some(build) = build {
                ident.divx_version = ver;
                ident.divx_build = build;
                ident.divx_packed = rest.starts_with('p');
            }
        }
    }

    // libavcodec: "Lavc{a}.{b}.{c}" / "FFmpe...b{build}" / 裸 "ffmpeg"
    if let Some(rest) = text.strip_prefix("Lavc") {
        let (a, rest) = take_int(rest);
        let (b, rest) = take_int(rest.strip_prefix('.').unwrap_or(rest));
        let (c, _) = take_int(rest.strip_prefix('.').unwrap_or(rest));
        if let (Some(a), Some(b), Some(c)) = (a, b, c) {
            ident.lavc_build = ((a & 0xFF) << 16) + ((b & 0xFF) << 8) + (c & 0xFF);
        }
    } else if let Some(pos) = text.find("build") {
        if text.starts_with("FFmpe") {
            let (build, _) = take_int(text[pos + 5..].trim_start_matches([' ', ':']));
            if let Some(build) = build {
                ident.lavc_build = build;
            }
        }
    } else if text.as_ref() == "ffmpeg" {
        ident.lavc_build = 4600;
    }

    // Xvid: "XviD{build}"
    if let Some(rest) = text.strip_prefix("XviD") {
        let (build, _) = take_int(rest);
        if let Some(build) = build {
            ident.xvid_build = build;
        }
    }
}

/// 从字符串头部取一段十进制整数
fn take_int(s: &str) -> (Option<i32>, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        return (None, s);
    }
    (s[..end].parse().ok(), &s[end..])
}

/// 由 FourCC 与编码器版本推导修正标志集
///
/// 仅在 AUTODETECT 置位时推导; 推导前先用 FourCC 补全未识别的编码器
/// (容器改封装时 user_data 可能丢失). Xvid 会伪装 DivX 的 user_data,
/// 同时识别到两者时丢弃 DivX 信息.
pub(super) fn derive_workarounds(
    flags: Workarounds,
    ident: &mut EncoderIdent,
    codec_tag: u32,
    vo_type: u8,
    vol_control_parameters: bool,
) -> (Workarounds, bool) {
    let mut bugs = flags;
    let mut padding_bug = false;

    let tag = codec_tag.to_le_bytes();
    let unidentified =
        ident.xvid_build == -1 && ident.divx_version == -1 && ident.lavc_build == -1;
    if unidentified
        && matches!(&tag, b"XVID" | b"XVIX" | b"RMP4" | b"ZMP4" | b"SIPP")
    {
        ident.xvid_build = 0;
    }
    if unidentified
        && ident.xvid_build == -1
        && &tag == b"DIVX"
        && vo_type == 0
        && !vol_control_parameters
    {
        ident.divx_version = 400;
    }

    if ident.xvid_build >= 0 && ident.divx_version >= 0 {
        ident.divx_version = -1;
        ident.divx_build = -1;
    }

    if bugs.contains(Workarounds::AUTODETECT) {
        if &tag == b"XVIX" {
            bugs |= Workarounds::XVID_ILACE;
        }
        if &tag == b"UMP4" {
            bugs |= Workarounds::UMP4;
        }

        if ident.divx_version >= 500 && ident.divx_build < 1814 {
            bugs |= Workarounds::QPEL_CHROMA;
        }
        if ident.divx_version > 502 && ident.divx_build < 1814 {
            bugs |= Workarounds::QPEL_CHROMA2;
        }

        if (0..=3).contains(&ident.xvid_build) {
            padding_bug = true;
        }
        if (0..=1).contains(&ident.xvid_build) {
            bugs |= Workarounds::QPEL_CHROMA;
        }
        if (0..=12).contains(&ident.xvid_build) {
            bugs |= Workarounds::EDGE;
        }
        if (0..=32).contains(&ident.xvid_build) {
            bugs |= Workarounds::DC_CLIP;
        }

        if (0..4653).contains(&ident.lavc_build) {
            bugs |= Workarounds::STD_QPEL;
        }
        if (0..4655).contains(&ident.lavc_build) {
            bugs |= Workarounds::DIRECT_BLOCKSIZE;
        }
        if (0..4670).contains(&ident.lavc_build) {
            bugs |= Workarounds::EDGE;
        }
        if (0..=4712).contains(&ident.lavc_build) {
            bugs |= Workarounds::DC_CLIP;
        }
        if (ident.lavc_build & 0xFF) >= 100
            && ident.lavc_build > 3621476
            && ident.lavc_build < 3752552
            && !(3752037..=3752191).contains(&ident.lavc_build)
        {
            bugs |= Workarounds::IEDGE;
        }

        if ident.divx_version >= 0 {
            bugs |= Workarounds::DIRECT_BLOCKSIZE | Workarounds::HPEL_CHROMA;
        }
        if ident.divx_version == 501 && ident.divx_build == 20020416 {
            padding_bug = true;
        }
        if (0..500).contains(&ident.divx_version) {
            bugs |= Workarounds::EDGE;
        }

        info!(
            "兼容性修正: {bugs:?} lavc:{} xvid:{} divx:{}.{}{}",
            ident.lavc_build,
            ident.xvid_build,
            ident.divx_version,
            ident.divx_build,
            if ident.divx_packed { " packed" } else { "" }
        );
    }

    (bugs, padding_bug)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(s: &str) -> EncoderIdent {
        let mut ident = EncoderIdent::default();
        let mut reader = BitReader::new(s.as_bytes());
        parse_user_data(&mut reader, &mut ident);
        ident
    }

    #[test]
    fn test_divx_packed_签名识别() {
        let ident = parse_str("DivX503b1393p");
        assert_eq!(ident.divx_version, 503);
        assert_eq!(ident.divx_build, 1393);
        assert!(ident.divx_packed);

        let ident = parse_str("DivX500Build413");
        assert_eq!(ident.divx_version, 500);
        assert_eq!(ident.divx_build, 413);
        assert!(!ident.divx_packed);
    }

    #[test]
    fn test_lavc_版本识别() {
        let ident = parse_str("Lavc58.54.100");
        assert_eq!(ident.lavc_build, (58 << 16) + (54 << 8) + 100);

        let ident = parse_str("ffmpeg");
        assert_eq!(ident.lavc_build, 4600);
    }

    #[test]
    fn test_xvid_识别与伪装divx() {
        let mut ident = parse_str("XviD0050");
        assert_eq!(ident.xvid_build, 50);

        // Xvid 伪装的 DivX user_data: 两者同时出现时丢弃 DivX
        ident.divx_version = 500;
        ident.divx_build = 413;
        let (_, _) = derive_workarounds(Workarounds::AUTODETECT, &mut ident, 0, 1, true);
        assert_eq!(ident.divx_version, -1);
    }

    #[test]
    fn test_旧xvid修正标志() {
        let mut ident = EncoderIdent {
            xvid_build: 1,
            ..Default::default()
        };
        let (bugs, padding) =
            derive_workarounds(Workarounds::AUTODETECT, &mut ident, 0, 1, true);
        assert!(bugs.contains(Workarounds::QPEL_CHROMA));
        assert!(bugs.contains(Workarounds::EDGE));
        assert!(bugs.contains(Workarounds::DC_CLIP));
        assert!(padding);
    }

    #[test]
    fn test_fourcc推导() {
        let mut ident = EncoderIdent::default();
        let tag = u32::from_le_bytes(*b"XVID");
        let (_, _) = derive_workarounds(Workarounds::AUTODETECT, &mut ident, tag, 1, true);
        assert_eq!(ident.xvid_build, 0);

        let mut ident = EncoderIdent::default();
        let tag = u32::from_le_bytes(*b"DIVX");
        let (_, _) = derive_workarounds(Workarounds::AUTODETECT, &mut ident, tag, 0, false);
        assert_eq!(ident.divx_version, 400);
    }
}
