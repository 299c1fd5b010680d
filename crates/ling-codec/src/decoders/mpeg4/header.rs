//! VOS/VOL/GOP/VOP 头解析
//!
//! 入口是 [`HeaderState::parse_picture_header`]: 字节对齐后滚动匹配
//! 起始码, 依次处理序列头 (profile/level)、视觉对象、VOL、GOP 与
//! user_data, 遇到 VOP 起始码后解析 VOP 头并停在宏块数据起点.
//!
//! 时间基算术与 time_increment_bits 的码流分析恢复逻辑都在本模块;
//! VOL 缺失时按默认值解码并在首个 VOP 处修正.

use ling_core::{LingError, LingResult, PixelFormat, Rational};
use log::{debug, error, info, warn};

use super::bitreader::BitReader;
use super::quirks::{self, EncoderIdent, Workarounds};
use super::sprite;
use super::tables::{rounded_div, DC_THRESHOLD_TABLE, ZIGZAG_SCAN};
use super::types::{SpriteGeometry, SpriteUsage, StudioInfo, VolInfo, VolShape, VopInfo};
use crate::packet::NOPTS_VALUE;
use crate::picture::PictureType;

// 起始码 (0x100 | 以下码值)
const VOS_STARTCODE: u32 = 0x1B0;
const USER_DATA_STARTCODE: u32 = 0x1B2;
const GOP_STARTCODE: u32 = 0x1B3;
const VISUAL_OBJ_STARTCODE: u32 = 0x1B5;
const VOP_STARTCODE: u32 = 0x1B6;
const EXT_STARTCODE: u32 = 0x1B8;
const QUANT_MATRIX_EXT_ID: u32 = 1;

// vo_type 取值
const SIMPLE_VO_TYPE: u8 = 1;
const ADV_SIMPLE_VO_TYPE: u8 = 17;
const SIMPLE_STUDIO_VO_TYPE: u8 = 14;
const CORE_STUDIO_VO_TYPE: u8 = 15;

/// simple studio profile 在 profile_and_level 中的 profile 半字节
const PROFILE_SIMPLE_STUDIO: u8 = 14;

/// 扩展宽高比标志 (aspect_ratio_info == 15 时显式携带 par)
const ASPECT_EXTENDED: u32 = 15;

/// H.263/MPEG-4 预定义像素宽高比表
const PIXEL_ASPECT: [Rational; 6] = [
    Rational::new(0, 1),
    Rational::new(1, 1),
    Rational::new(12, 11),
    Rational::new(10, 11),
    Rational::new(16, 11),
    Rational::new(40, 33),
];

/// 头解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum HeaderOutcome {
    /// 找到并解析了 VOP 头, 读取器停在宏块数据起点
    Vop,
    /// VOP 未编码或时间基错乱, 本帧跳过
    Skipped,
    /// 配置数据 (extradata) 解析完毕, 无 VOP
    ConfigOnly,
}

/// 时间基状态 (跨 VOP 持续)
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct Timing {
    pub time_base: i64,
    pub last_time_base: i64,
    pub time: i64,
    pub last_non_b_time: i64,
    /// 前后两个锚点帧之间的距离
    pub pp_time: i64,
    /// 上一锚点帧到当前 B 帧的距离
    pub pb_time: i64,
    pub t_frame: i64,
    pub pp_field_time: i64,
    pub pb_field_time: i64,
}

/// 头解析器状态: VOL/VOP 参数, 编码器识别与时间基
///
/// 解码核心持有一份; 并发任务的快照复制只拷贝本结构 (见快照构造).
#[derive(Debug, Clone)]
pub(super) struct HeaderState {
    pub vol_found: bool,
    pub vol: VolInfo,
    pub vop: VopInfo,
    pub studio_profile: bool,
    pub studio: StudioInfo,
    pub width: u32,
    pub height: u32,
    pub sample_aspect_ratio: Rational,
    /// num = time_increment_resolution, den = 固定 VOP 间隔 (无则 1)
    pub framerate: Rational,
    pub progressive_sequence: bool,
    /// 自定义量化矩阵 (光栅顺序)
    pub intra_matrix: [u8; 64],
    pub inter_matrix: [u8; 64],
    pub ident: EncoderIdent,
    pub workarounds: Workarounds,
    pub padding_bug: bool,
    pub codec_tag: u32,
    pub low_delay: bool,
    pub picture_number: u32,
    pub timing: Timing,
    pub partitioned_frame: bool,
    pub sprite: SpriteGeometry,
    /// 上一次调用遇到了未编码 VOP
    pub skipped_last_frame: bool,
    /// 当前 VOP 的显示时间戳 (framerate.den 为时间基)
    pub vop_pts: i64,
}

impl HeaderState {
    pub fn new(codec_tag: u32) -> Self {
        Self {
            vol_found: false,
            vol: VolInfo::default(),
            vop: VopInfo::default(),
            studio_profile: false,
            studio: StudioInfo::default(),
            width: 0,
            height: 0,
            sample_aspect_ratio: Rational::new(1, 1),
            framerate: Rational::new(1, 1),
            progressive_sequence: true,
            intra_matrix: super::tables::STD_INTRA_QUANT_MATRIX,
            inter_matrix: super::tables::STD_INTER_QUANT_MATRIX,
            ident: EncoderIdent::default(),
            workarounds: Workarounds::AUTODETECT,
            padding_bug: false,
            codec_tag,
            low_delay: false,
            picture_number: 0,
            timing: Timing::default(),
            partitioned_frame: false,
            sprite: SpriteGeometry::default(),
            skipped_last_frame: false,
            vop_pts: NOPTS_VALUE,
        }
    }

    /// 由 VOL 声明推导输出像素格式
    pub fn pixel_format(&self) -> PixelFormat {
        if self.studio_profile {
            match self.studio.chroma_format {
                3 => PixelFormat::Yuv444p10le,
                _ => PixelFormat::Yuv422p10le,
            }
        } else {
            PixelFormat::Yuv420p
        }
    }

    // ========================================================================
    // 起始码扫描
    // ========================================================================

    /// 扫描并解析到下一个 VOP 头
    ///
    /// `config_only` 为 true 时用于 extradata: 缺少 VOP 不算错误.
    pub fn parse_picture_header(
        &mut self,
        reader: &mut BitReader,
        config_only: bool,
    ) -> LingResult<HeaderOutcome> {
        reader.align_to_byte();
        let total_bits = reader.bit_position() + reader.bits_left();

        let mut vol_seen = false;
        let mut window = 0xFFu32;
        loop {
            if reader.bits_left() < 8 {
                // 1 字节的占位包是 divx/xvid 的 N-VOP 填充
                if total_bits == 8
                    && (self.ident.divx_version >= 0 || self.ident.xvid_build >= 0)
                    || self.codec_tag == u32::from_le_bytes(*b"QMP4")
                {
                    debug!("1 字节占位包, 跳帧");
                    return Ok(HeaderOutcome::Skipped);
                }
                if config_only && reader.bits_left() == 0 {
                    return Ok(HeaderOutcome::ConfigOnly);
                }
                return Err(LingError::InvalidData("未找到 VOP 起始码".into()));
            }

            let byte = reader
                .read_bits(8)
                .ok_or_else(|| LingError::InvalidData("码流截断".into()))?;
            window = (window << 8) | byte;
            if (window & 0xFFFF_FF00) != 0x100 {
                continue;
            }
            let startcode = window;

            if (0x120..=0x12F).contains(&startcode) {
                if vol_seen {
                    warn!("忽略重复的 VOL 头");
                    continue;
                }
                vol_seen = true;
                self.decode_vol_header(reader)?;
            } else if startcode == USER_DATA_STARTCODE {
                quirks::parse_user_data(reader, &mut self.ident);
                let (bugs, padding_bug) = quirks::derive_workarounds(
                    self.workarounds,
                    &mut self.ident,
                    self.codec_tag,
                    self.vol.vo_type,
                    self.vol.vol_control_parameters,
                );
                self.workarounds = bugs;
                self.padding_bug |= padding_bug;
            } else if startcode == GOP_STARTCODE {
                self.decode_gop_header(reader);
            } else if startcode == VOS_STARTCODE {
                self.decode_profile_level(reader)?;
            } else if startcode == VISUAL_OBJ_STARTCODE {
                self.decode_visual_object(reader)?;
            } else if startcode == VOP_STARTCODE {
                break;
            }

            reader.align_to_byte();
            window = 0xFF;
        }

        if self.studio_profile {
            if self.studio.bits_per_raw_sample == 0 {
                return Err(LingError::InvalidData("studio VOL 头缺失".into()));
            }
            self.decode_studio_vop_header(reader)
        } else {
            self.decode_vop_header(reader, config_only)
        }
    }

    // ========================================================================
    // 序列级头
    // ========================================================================

    /// VOS 头 (0x1B0): profile_and_level, studio 档判定
    fn decode_profile_level(&mut self, reader: &mut BitReader) -> LingResult<()> {
        let profile = reader
            .read_bits(4)
            .ok_or_else(|| LingError::InvalidData("VOS 头截断".into()))? as u8;
        let mut level = reader
            .read_bits(4)
            .ok_or_else(|| LingError::InvalidData("VOS 头截断".into()))? as u8;
        // simple profile 的 level 0 编码为 8
        if profile == 0 && level == 8 {
            level = 0;
        }
        if profile == PROFILE_SIMPLE_STUDIO && (1..9).contains(&level) {
            self.studio_profile = true;
        } else if self.studio_profile {
            return Err(LingError::Unsupported(
                "studio 与非 studio 档混用".into(),
            ));
        }
        debug!("VOS: profile={profile} level={level}");
        Ok(())
    }

    /// 视觉对象头 (0x1B5): 只消费字段, 色彩描述不进入输出模型
    fn decode_visual_object(&mut self, reader: &mut BitReader) -> LingResult<()> {
        let err = || LingError::InvalidData("视觉对象头截断".into());
        if reader.read_bit().ok_or_else(err)? {
            reader.skip_bits(4 + 3); // verid + priority
        }
        let visual_object_type = reader.read_bits(4).ok_or_else(err)?;
        // video (1) 与 still texture (2) 携带信号类型描述
        if visual_object_type == 1 || visual_object_type == 2 {
            if self.studio_profile {
                return Ok(());
            }
            if reader.read_bit().ok_or_else(err)? {
                reader.skip_bits(3); // video_format
                let _video_range = reader.read_bit().ok_or_else(err)?;
                if reader.read_bit().ok_or_else(err)? {
                    reader.skip_bits(24); // primaries/trc/matrix
                }
            }
        }
        Ok(())
    }

    /// GOP 头 (0x1B3): 时间码推进时间基
    fn decode_gop_header(&mut self, reader: &mut BitReader) {
        if reader.peek_bits(23) == Some(0) {
            warn!("GOP 头无效");
            return;
        }
        let Some(hours) = reader.read_bits(5) else {
            return;
        };
        let Some(minutes) = reader.read_bits(6) else {
            return;
        };
        reader.check_marker("GOP 时间码");
        let Some(seconds) = reader.read_bits(6) else {
            return;
        };
        let time = (seconds + 60 * (minutes + 60 * hours)) as i64;
        self.timing.time_base = time.max(self.timing.last_time_base);
        reader.skip_bits(2); // closed_gov + broken_link
    }

    // ========================================================================
    // VOL 头
    // ========================================================================

    pub(super) fn decode_vol_header(&mut self, reader: &mut BitReader) -> LingResult<()> {
        let err = || LingError::InvalidData("VOL 头截断".into());

        reader.skip_bits(1); // random_accessible_vol
        self.vol.vo_type = reader.read_bits(8).ok_or_else(err)? as u8;

        if self.vol.vo_type == SIMPLE_STUDIO_VO_TYPE
            || self.vol.vo_type == CORE_STUDIO_VO_TYPE
        {
            self.studio_profile = true;
            return self.decode_studio_vol_header(reader);
        } else if self.studio_profile {
            return Err(LingError::Unsupported(
                "studio 档中的非 studio VOL".into(),
            ));
        }

        let vo_ver_id = if reader.read_bit().ok_or_else(err)? {
            let id = reader.read_bits(4).ok_or_else(err)?;
            reader.skip_bits(3); // vo_priority
            id
        } else {
            1
        };

        let aspect_ratio_info = reader.read_bits(4).ok_or_else(err)?;
        self.sample_aspect_ratio = if aspect_ratio_info == ASPECT_EXTENDED {
            let num = reader.read_bits(8).ok_or_else(err)? as i32;
            let den = reader.read_bits(8).ok_or_else(err)? as i32;
            Rational::new(num, den)
        } else {
            PIXEL_ASPECT
                .get(aspect_ratio_info as usize)
                .copied()
                .unwrap_or(Rational::new(0, 1))
        };

        self.vol.vol_control_parameters = reader.read_bit().ok_or_else(err)?;
        if self.vol.vol_control_parameters {
            let chroma_format = reader.read_bits(2).ok_or_else(err)?;
            if chroma_format != 1 {
                error!("非法的色度采样结构 {chroma_format}");
            }
            self.low_delay = reader.read_bit().ok_or_else(err)?;
            self.vol.low_delay = self.low_delay;
            if reader.read_bit().ok_or_else(err)? {
                // vbv 参数
                reader.skip_bits(15);
                reader.check_marker("first_half_bitrate 之后");
                reader.skip_bits(15);
                reader.check_marker("latter_half_bitrate 之后");
                reader.skip_bits(15);
                reader.check_marker("first_half_vbv_buffer_size 之后");
                reader.skip_bits(3 + 11);
                reader.check_marker("first_half_vbv_occupancy 之后");
                reader.skip_bits(15);
                reader.check_marker("latter_half_vbv_occupancy 之后");
            }
        } else if self.picture_number == 0 {
            // low_delay 只在首帧前推测一次, 之后不再覆盖
            self.low_delay = matches!(
                self.vol.vo_type,
                SIMPLE_VO_TYPE | ADV_SIMPLE_VO_TYPE
            );
            self.vol.low_delay = self.low_delay;
        }

        let shape = reader.read_bits(2).ok_or_else(err)?;
        self.vol.shape = match shape {
            0 => VolShape::Rectangular,
            1 => VolShape::Binary,
            2 => VolShape::BinaryOnly,
            _ => VolShape::Grayscale,
        };
        if self.vol.shape != VolShape::Rectangular {
            error!("仅支持矩形 VOL");
        }
        if self.vol.shape == VolShape::Grayscale && vo_ver_id != 1 {
            error!("灰度形状不支持");
            reader.skip_bits(4); // shape_extension
        }

        reader.check_marker("time_increment_resolution 之前");

        let tir = reader.read_bits(16).ok_or_else(err)?;
        if tir == 0 {
            return Err(LingError::InvalidData("时间增量分辨率为 0".into()));
        }
        self.vol.time_increment_resolution = tir as u16;
        self.vol.time_increment_bits = (floor_log2(tir.wrapping_sub(1)) + 1).max(1);

        reader.check_marker("fixed_vop_rate 之前");

        self.vol.fixed_vop_rate = reader.read_bit().ok_or_else(err)?;
        let framerate_den = if self.vol.fixed_vop_rate {
            reader
                .read_bits(self.vol.time_increment_bits)
                .ok_or_else(err)? as i32
        } else {
            1
        };
        self.framerate = Rational::new(tir as i32, framerate_den);
        self.timing.t_frame = 0;

        if self.vol.shape == VolShape::BinaryOnly {
            return Ok(());
        }

        if self.vol.shape == VolShape::Rectangular {
            reader.check_marker("width 之前");
            let width = reader.read_bits(13).ok_or_else(err)?;
            reader.check_marker("height 之前");
            let height = reader.read_bits(13).ok_or_else(err)?;
            reader.check_marker("height 之后");
            if width != 0 && height != 0 {
                self.width = width;
                self.height = height;
            }
        }

        self.progressive_sequence = !reader.read_bit().ok_or_else(err)?;
        if !reader.read_bit().ok_or_else(err)? {
            debug!("OBMC 禁用位为 0 (大概率是有缺陷的编码器)");
        }

        let sprite_usage = if vo_ver_id == 1 {
            reader.read_bits(1).ok_or_else(err)?
        } else {
            reader.read_bits(2).ok_or_else(err)?
        };
        self.vol.sprite_usage = match sprite_usage {
            0 => SpriteUsage::None,
            1 => SpriteUsage::Static,
            _ => SpriteUsage::Gmc,
        };
        if self.vol.sprite_usage == SpriteUsage::Static {
            error!("静态 sprite 不支持");
        }
        if self.vol.sprite_usage != SpriteUsage::None {
            if self.vol.sprite_usage == SpriteUsage::Static {
                // sprite 宽高与偏移
                for what in ["sprite_width", "sprite_height", "sprite_left", "sprite_top"] {
                    reader.skip_bits(13);
                    reader.check_marker(what);
                }
            }
            let points = reader.read_bits(6).ok_or_else(err)? as u8;
            if points > 3 {
                self.vol.sprite_warping_points = 0;
                return Err(LingError::InvalidData(format!(
                    "sprite warping 点数非法: {points}"
                )));
            }
            self.vol.sprite_warping_points = points;
            self.vol.sprite_warping_accuracy = reader.read_bits(2).ok_or_else(err)? as u8;
            self.vol.sprite_brightness_change = reader.read_bit().ok_or_else(err)?;
            if self.vol.sprite_usage == SpriteUsage::Static {
                reader.skip_bits(1); // low_latency_sprite
            }
        }

        if reader.read_bit().ok_or_else(err)? {
            // not_8_bit
            let qp = reader.read_bits(4).ok_or_else(err)? as u8;
            if reader.read_bits(4).ok_or_else(err)? != 8 {
                error!("非 8 位像素不支持");
            }
            if qp != 5 {
                error!("量化精度 {qp}");
            }
            self.vol.quant_precision = if (3..=9).contains(&qp) { qp } else { 5 };
        } else {
            self.vol.quant_precision = 5;
        }

        self.vol.mpeg_quant = reader.read_bit().ok_or_else(err)?;
        if self.vol.mpeg_quant {
            self.intra_matrix = super::tables::STD_INTRA_QUANT_MATRIX;
            self.inter_matrix = super::tables::STD_INTER_QUANT_MATRIX;
            if reader.read_bit().ok_or_else(err)? {
                read_custom_matrix(reader, &mut self.intra_matrix)?;
            }
            if reader.read_bit().ok_or_else(err)? {
                read_custom_matrix(reader, &mut self.inter_matrix)?;
            }
        }

        self.vol.quarter_sample = if vo_ver_id != 1 {
            reader.read_bit().ok_or_else(err)?
        } else {
            false
        };

        if reader.bits_left() < 4 {
            return Err(LingError::InvalidData("VOL 头截断".into()));
        }

        if !reader.read_bit().ok_or_else(err)? {
            self.decode_complexity_estimation(reader)?;
        } else {
            self.vol.cplx_estimation_trash_i = 0;
            self.vol.cplx_estimation_trash_p = 0;
            self.vol.cplx_estimation_trash_b = 0;
        }

        self.vol.resync_marker = !reader.read_bit().ok_or_else(err)?;

        self.vol.data_partitioned = reader.read_bit().ok_or_else(err)?;
        if self.vol.data_partitioned {
            self.vol.rvlc = reader.read_bit().ok_or_else(err)?;
        }

        if vo_ver_id != 1 {
            self.vol.new_pred = reader.read_bit().ok_or_else(err)?;
            if self.vol.new_pred {
                error!("new pred 不支持");
                reader.skip_bits(2 + 1);
            }
            if reader.read_bit().ok_or_else(err)? {
                error!("降分辨率 VOP 不支持");
            }
        } else {
            self.vol.new_pred = false;
        }

        self.vol.scalability = reader.read_bit().ok_or_else(err)?;
        if self.vol.scalability {
            let rewind_pos = reader.bit_position();
            reader.skip_bits(1 + 4 + 1); // hierarchy_type, ref_layer_id, sampling_dir
            let h_n = reader.read_bits(5).ok_or_else(err)?;
            let h_m = reader.read_bits(5).ok_or_else(err)?;
            let v_n = reader.read_bits(5).ok_or_else(err)?;
            let v_m = reader.read_bits(5).ok_or_else(err)?;
            self.vol.enhancement_type = reader.read_bit().ok_or_else(err)?;
            if h_n == 0 || h_m == 0 || v_n == 0 || v_m == 0 {
                // 非法的可伸缩头 (损坏严重的编码器), 回退按不可伸缩处理
                self.vol.scalability = false;
                self.vol.enhancement_type = false;
                reader.seek_to_bit(rewind_pos);
            } else {
                error!("可伸缩编码不支持");
            }
        }

        self.vol_found = true;
        info!(
            "VOL: {}x{} tir={} tib={} qp_prec={} {}{}{}{}",
            self.width,
            self.height,
            self.vol.time_increment_resolution,
            self.vol.time_increment_bits,
            self.vol.quant_precision,
            if self.vol.quarter_sample { "qpel " } else { "" },
            if self.vol.data_partitioned { "partition " } else { "" },
            if self.vol.rvlc { "rvlc " } else { "" },
            if self.low_delay { "low_delay" } else { "" },
        );
        Ok(())
    }

    /// 复杂度估计头: 记录各图类型要跳过的位数
    fn decode_complexity_estimation(&mut self, reader: &mut BitReader) -> LingResult<()> {
        let err = || LingError::InvalidData("复杂度估计头截断".into());
        let estimation_method = reader.read_bits(2).ok_or_else(err)?;
        if estimation_method >= 2 {
            error!("复杂度估计方法 {estimation_method} 非法");
            return Ok(());
        }
        let mut trash_i = 0u8;
        let mut trash_p = 0u8;
        let mut trash_b = 0u8;
        fn bit(r: &mut BitReader) -> LingResult<u8> {
            r.read_bit()
                .map(|b| b as u8)
                .ok_or_else(|| LingError::InvalidData("复杂度估计头截断".into()))
        }

        if bit(reader)? == 0 {
            for _ in 0..6 {
                trash_i += 8 * bit(reader)?;
            }
        }
        if bit(reader)? == 0 {
            trash_i += 8 * bit(reader)?;
            trash_p += 8 * bit(reader)?;
            trash_p += 8 * bit(reader)?;
            trash_i += 8 * bit(reader)?;
        }
        if !reader.check_marker("复杂度估计第 1 部分") {
            self.vol.cplx_estimation_trash_i = 0;
            self.vol.cplx_estimation_trash_p = 0;
            self.vol.cplx_estimation_trash_b = 0;
            return Ok(());
        }
        if bit(reader)? == 0 {
            trash_i += 8 * bit(reader)?;
            trash_i += 8 * bit(reader)?;
            trash_i += 8 * bit(reader)?;
            trash_i += 4 * bit(reader)?;
        }
        if bit(reader)? == 0 {
            trash_p += 8 * bit(reader)?;
            trash_p += 8 * bit(reader)?;
            trash_b += 8 * bit(reader)?;
            trash_p += 8 * bit(reader)?;
            trash_p += 8 * bit(reader)?;
            trash_p += 8 * bit(reader)?;
        }
        if !reader.check_marker("复杂度估计第 2 部分") {
            self.vol.cplx_estimation_trash_i = 0;
            self.vol.cplx_estimation_trash_p = 0;
            self.vol.cplx_estimation_trash_b = 0;
            return Ok(());
        }
        if estimation_method == 1 {
            trash_i += 8 * bit(reader)?;
            trash_p += 8 * bit(reader)?;
        }
        self.vol.cplx_estimation_trash_i = trash_i;
        self.vol.cplx_estimation_trash_p = trash_p;
        self.vol.cplx_estimation_trash_b = trash_b;
        Ok(())
    }

    // ========================================================================
    // VOP 头
    // ========================================================================

    pub(super) fn decode_vop_header(
        &mut self,
        reader: &mut BitReader,
        config_only: bool,
    ) -> LingResult<HeaderOutcome> {
        let err = || LingError::InvalidData("VOP 头截断".into());

        self.vop = VopInfo {
            intra_dc_threshold: self.vop.intra_dc_threshold,
            ..VopInfo::default()
        };

        let pict_type = match reader.read_bits(2).ok_or_else(err)? {
            0 => PictureType::I,
            1 => PictureType::P,
            2 => PictureType::B,
            _ => PictureType::S,
        };
        self.vop.picture_type = pict_type;
        if pict_type == PictureType::B && self.low_delay && !self.vol.vol_control_parameters {
            error!("low_delay 标志设置错误, 清除");
            self.low_delay = false;
        }

        self.partitioned_frame = self.vol.data_partitioned && pict_type != PictureType::B;

        let mut time_incr = 0i64;
        loop {
            match reader.read_bit() {
                Some(true) => time_incr += 1,
                Some(false) => break,
                None => return Err(err()),
            }
        }

        reader.check_marker("time_increment 之前");

        self.recover_time_increment_bits(reader, pict_type);

        let time_increment = reader
            .read_bits(self.vol.time_increment_bits)
            .ok_or_else(err)? as i64;

        let t = &mut self.timing;
        let tir = self.vol.time_increment_resolution as i64;
        if pict_type != PictureType::B {
            t.last_time_base = t.time_base;
            t.time_base += time_incr;
            t.time = t.time_base * tir + time_increment;
            if self.workarounds.contains(Workarounds::UMP4) && t.time < t.last_non_b_time {
                // 时间基不单调的 UMP4 码流, 递增一个完整周期补偿
                t.time_base += 1;
                t.time += tir;
            }
            t.pp_time = t.time - t.last_non_b_time;
            t.last_non_b_time = t.time;
        } else {
            t.time = (t.last_time_base + time_incr) * tir + time_increment;
            t.pb_time = t.pp_time - (t.last_non_b_time - t.time);
            if t.pp_time <= t.pb_time || t.pp_time <= t.pp_time - t.pb_time || t.pp_time <= 0 {
                // 时序错乱 (大概率是 seek 之后), 跳过这个 B 帧
                return Ok(HeaderOutcome::Skipped);
            }
            if t.t_frame == 0 {
                t.t_frame = t.pb_time;
            }
            if t.t_frame == 0 {
                t.t_frame = 1;
            }
            t.pp_field_time = (rounded_div(t.last_non_b_time, t.t_frame)
                - rounded_div(t.last_non_b_time - t.pp_time, t.t_frame))
                * 2;
            t.pb_field_time = (rounded_div(t.time, t.t_frame)
                - rounded_div(t.last_non_b_time - t.pp_time, t.t_frame))
                * 2;
            if t.pp_field_time <= t.pb_field_time || t.pb_field_time <= 1 {
                t.pb_field_time = 2;
                t.pp_field_time = 4;
                if !self.progressive_sequence {
                    return Ok(HeaderOutcome::Skipped);
                }
            }
        }

        self.vop_pts = if self.framerate.den != 0 {
            rounded_div(self.timing.time, self.framerate.den as i64)
        } else {
            NOPTS_VALUE
        };

        reader.check_marker("vop_coded 之前");

        if !reader.read_bit().ok_or_else(err)? {
            debug!("VOP 未编码");
            self.skipped_last_frame = true;
            return Ok(HeaderOutcome::Skipped);
        }
        if self.vol.new_pred {
            self.decode_new_pred(reader)?;
        }

        let gmc_vop = pict_type == PictureType::S && self.vol.sprite_usage == SpriteUsage::Gmc;
        self.vop.rounding = if self.vol.shape != VolShape::BinaryOnly
            && (pict_type == PictureType::P || gmc_vop)
        {
            reader.read_bit().ok_or_else(err)? as u8
        } else {
            0
        };

        if self.vol.shape != VolShape::Rectangular {
            if !(self.vol.sprite_usage == SpriteUsage::Static && pict_type == PictureType::I) {
                for what in ["width", "height", "hor_spat_ref"] {
                    reader.skip_bits(13);
                    reader.check_marker(what);
                }
                reader.skip_bits(13); // ver_spat_ref
            }
            reader.skip_bits(1); // change_CR_disable
            if reader.read_bit().ok_or_else(err)? {
                reader.skip_bits(8); // constant_alpha_value
            }
        }

        if self.vol.shape != VolShape::BinaryOnly {
            reader.skip_bits(self.vol.cplx_estimation_trash_i as u32);
            if pict_type != PictureType::I {
                reader.skip_bits(self.vol.cplx_estimation_trash_p as u32);
            }
            if pict_type == PictureType::B {
                reader.skip_bits(self.vol.cplx_estimation_trash_b as u32);
            }

            if reader.bits_left() < 3 {
                return Err(LingError::InvalidData("VOP 头截断".into()));
            }
            let thr = reader.read_bits(3).ok_or_else(err)? as usize;
            self.vop.intra_dc_threshold = DC_THRESHOLD_TABLE[thr];
            if !self.progressive_sequence {
                self.vop.top_field_first = reader.read_bit().ok_or_else(err)?;
                self.vop.alternate_scan = reader.read_bit().ok_or_else(err)?;
            } else {
                self.vop.alternate_scan = false;
            }
        }

        if !config_only {
            if pict_type == PictureType::S {
                if self.vol.sprite_usage != SpriteUsage::None {
                    let divx500b413 =
                        self.ident.divx_version == 500 && self.ident.divx_build == 413;
                    self.sprite = sprite::decode_sprite_trajectory(
                        reader,
                        &self.vol,
                        self.width,
                        self.height,
                        divx500b413,
                    )?;
                    if self.vol.sprite_brightness_change {
                        error!("sprite 亮度变化不支持");
                    }
                    if self.vol.sprite_usage == SpriteUsage::Static {
                        error!("静态 sprite 不支持");
                    }
                } else {
                    self.sprite = SpriteGeometry::default();
                }
            }

            self.vop.f_code = 1;
            self.vop.b_code = 1;
            if self.vol.shape != VolShape::BinaryOnly {
                let qscale = reader
                    .read_bits(self.vol.quant_precision)
                    .ok_or_else(err)? as u8;
                if qscale == 0 {
                    return Err(LingError::InvalidData(
                        "头损坏或不是 MPEG-4 头 (qscale=0)".into(),
                    ));
                }
                self.vop.qscale = qscale;

                if pict_type != PictureType::I {
                    let f_code = reader.read_bits(3).ok_or_else(err)? as u8;
                    if f_code == 0 {
                        self.vop.f_code = 1;
                        return Err(LingError::InvalidData(
                            "头损坏或不是 MPEG-4 头 (f_code=0)".into(),
                        ));
                    }
                    self.vop.f_code = f_code;
                }
                if pict_type == PictureType::B {
                    let b_code = reader.read_bits(3).ok_or_else(err)? as u8;
                    if b_code == 0 {
                        self.vop.b_code = 1;
                        return Err(LingError::InvalidData(
                            "头损坏或不是 MPEG-4 头 (b_code=0)".into(),
                        ));
                    }
                    self.vop.b_code = b_code;
                }

                if !self.vol.scalability {
                    if self.vol.shape != VolShape::Rectangular && pict_type != PictureType::I {
                        reader.skip_bits(1); // vop_shape_coding_type
                    }
                } else {
                    if self.vol.enhancement_type && reader.read_bit().ok_or_else(err)? {
                        error!("load_backward_shape 不支持");
                    }
                    reader.skip_bits(2); // ref_select_code
                }
            }
        }

        // divx4/旧 xvid/opendivx 不设置 low_delay 标志, 按启发式补上
        if self.vol.vo_type == 0
            && !self.vol.vol_control_parameters
            && self.ident.divx_version == -1
            && self.picture_number == 0
        {
            warn!("疑似 divx4/(旧)xvid/opendivx 编码, 强制 low_delay");
            self.low_delay = true;
        }

        self.picture_number += 1;
        Ok(HeaderOutcome::Vop)
    }

    /// time_increment_bits 与码流不符时, 通过后继固定位模式分析恢复
    ///
    /// P/S(GMC) 的 VOP 头在时间增量后是 marker + vop_coded + rounding
    /// 的固定位型, 其余图类型少一位. 从 1 位开始逐位尝试直到匹配.
    fn recover_time_increment_bits(&mut self, reader: &BitReader, pict_type: PictureType) {
        let tib = self.vol.time_increment_bits;
        let consistent = tib != 0
            && reader
                .peek_bits(tib + 1)
                .is_some_and(|v| v & 1 == 1);
        if consistent {
            return;
        }
        warn!(
            "time_increment_bits {tib} 与码流不符, 大概率缺失 VOL 头, 开始码流分析"
        );
        let gmc_vop =
            pict_type == PictureType::S && self.vol.sprite_usage == SpriteUsage::Gmc;
        for bits in 1..16u8 {
            let matched = if pict_type == PictureType::P || gmc_vop {
                reader
                    .peek_bits(bits + 6)
                    .is_some_and(|v| v & 0x37 == 0x30)
            } else {
                reader
                    .peek_bits(bits + 5)
                    .is_some_and(|v| v & 0x1F == 0x18)
            };
            self.vol.time_increment_bits = bits;
            if matched {
                break;
            }
        }
        warn!(
            "time_increment_bits 依码流分析修正为 {}",
            self.vol.time_increment_bits
        );
    }

    /// new_pred 头: 只消费字段
    pub(super) fn decode_new_pred(&mut self, reader: &mut BitReader) -> LingResult<()> {
        let err = || LingError::InvalidData("new_pred 头截断".into());
        let vop_id_len = (self.vol.time_increment_bits + 3).min(15);
        reader.skip_bits(vop_id_len as u32); // vop_id
        if reader.read_bit().ok_or_else(err)? {
            reader.skip_bits(vop_id_len as u32); // vop_id_for_prediction
        }
        reader.check_marker("vop_id_for_prediction 之后");
        Ok(())
    }

    // ========================================================================
    // studio profile 头
    // ========================================================================

    fn decode_studio_vol_header(&mut self, reader: &mut BitReader) -> LingResult<()> {
        let err = || LingError::InvalidData("studio VOL 头截断".into());

        reader.skip_bits(4); // verid
        let shape = reader.read_bits(2).ok_or_else(err)?;
        reader.skip_bits(4); // shape_extension
        reader.skip_bits(1); // progressive_sequence
        if shape != 0 {
            return Err(LingError::Unsupported("studio 档非矩形形状".into()));
        }
        self.vol.shape = VolShape::Rectangular;

        let rgb = reader.read_bit().ok_or_else(err)?;
        let chroma_format = reader.read_bits(2).ok_or_else(err)? as u8;
        if chroma_format < 2 || (rgb && chroma_format != 3) {
            return Err(LingError::InvalidData(format!(
                "studio 档非法色度采样结构 {chroma_format}"
            )));
        }
        let bits_per_raw_sample = reader.read_bits(4).ok_or_else(err)? as u8;
        if bits_per_raw_sample != 10 {
            return Err(LingError::Unsupported(format!(
                "studio 档位深 {bits_per_raw_sample}"
            )));
        }
        if rgb {
            return Err(LingError::Unsupported("studio 档 RGB 分量".into()));
        }
        self.studio.rgb = rgb;
        self.studio.chroma_format = chroma_format;
        self.studio.bits_per_raw_sample = bits_per_raw_sample;

        reader.check_marker("studio width 之前");
        let width = reader.read_bits(14).ok_or_else(err)?;
        reader.check_marker("studio height 之前");
        let height = reader.read_bits(14).ok_or_else(err)?;
        reader.check_marker("studio height 之后");
        if width != 0 && height != 0 {
            self.width = width;
            self.height = height;
        }

        let aspect_ratio_info = reader.read_bits(4).ok_or_else(err)?;
        self.sample_aspect_ratio = if aspect_ratio_info == ASPECT_EXTENDED {
            let num = reader.read_bits(8).ok_or_else(err)? as i32;
            let den = reader.read_bits(8).ok_or_else(err)? as i32;
            Rational::new(num, den)
        } else {
            PIXEL_ASPECT
                .get(aspect_ratio_info as usize)
                .copied()
                .unwrap_or(Rational::new(0, 1))
        };

        reader.skip_bits(4); // frame_rate_code
        reader.skip_bits(15);
        reader.check_marker("first_half_bit_rate 之后");
        reader.skip_bits(15);
        reader.check_marker("latter_half_bit_rate 之后");
        reader.skip_bits(15);
        reader.check_marker("first_half_vbv_buffer_size 之后");
        reader.skip_bits(3 + 11);
        reader.check_marker("first_half_vbv_occupancy 之后");
        reader.skip_bits(15);
        reader.check_marker("latter_half_vbv_occupancy 之后");
        self.low_delay = reader.read_bit().ok_or_else(err)?;
        self.vol.mpeg_quant = reader.read_bit().ok_or_else(err)?; // mpeg2_stream

        self.intra_matrix = super::tables::STD_INTRA_QUANT_MATRIX;
        self.inter_matrix = super::tables::STD_INTER_QUANT_MATRIX;
        reader.align_to_byte();
        self.extension_and_user_data(reader, true);
        self.vol_found = true;
        Ok(())
    }

    fn decode_studio_vop_header(&mut self, reader: &mut BitReader) -> LingResult<HeaderOutcome> {
        let err = || LingError::InvalidData("studio VOP 头截断".into());
        if reader.bits_left() <= 32 {
            return Ok(HeaderOutcome::ConfigOnly);
        }

        self.partitioned_frame = false;

        // SMPTE 时间码, 4x16 位 + marker + 保留位
        for part in 0..4 {
            reader.skip_bits(16);
            reader.check_marker(match part {
                0 => "Time_code[63..48] 之后",
                1 => "Time_code[47..32] 之后",
                2 => "Time_code[31..16] 之后",
                _ => "Time_code[15..0] 之后",
            });
        }
        reader.skip_bits(4); // reserved

        reader.skip_bits(10); // temporal_reference
        reader.skip_bits(2); // vop_structure
        self.vop.picture_type = match reader.read_bits(2).ok_or_else(err)? {
            0 => PictureType::I,
            1 => PictureType::P,
            2 => PictureType::B,
            _ => PictureType::S,
        };
        self.vop.coded = true;
        if reader.read_bit().ok_or_else(err)? {
            reader.skip_bits(1); // top_field_first
            reader.skip_bits(1); // repeat_first_field
            self.studio.progressive_frame = !reader.read_bit().ok_or_else(err)?;
        }

        if self.vop.picture_type == PictureType::I && reader.read_bit().ok_or_else(err)? {
            // 显式 DC 预测器复位由宏块层在行首执行
            debug!("studio I 帧请求复位 DC 预测器");
        }

        if self.vol.shape != VolShape::BinaryOnly {
            self.vop.alternate_scan = reader.read_bit().ok_or_else(err)?;
            self.studio.frame_pred_frame_dct = reader.read_bit().ok_or_else(err)?;
            self.studio.dct_precision = reader.read_bits(2).ok_or_else(err)? as u8;
            self.studio.intra_dc_precision = reader.read_bits(2).ok_or_else(err)? as u8;
            self.studio.q_scale_type = reader.read_bit().ok_or_else(err)?;
        }

        reader.align_to_byte();
        self.extension_and_user_data(reader, true);
        self.picture_number += 1;
        Ok(HeaderOutcome::Vop)
    }

    /// studio 档的扩展数据: 量化矩阵扩展 (0x1B8 + 扩展类型 1)
    fn extension_and_user_data(&mut self, reader: &mut BitReader, allow_quant_ext: bool) {
        if reader.bits_left() < 32 {
            return;
        }
        let Some(startcode) = reader.peek_bits(32) else {
            return;
        };
        if startcode == EXT_STARTCODE && allow_quant_ext {
            reader.skip_bits(32);
            let Some(extension_type) = reader.read_bits(4) else {
                return;
            };
            if extension_type == QUANT_MATRIX_EXT_ID {
                self.read_quant_matrix_ext(reader);
            }
        }
    }

    /// 量化矩阵扩展: 4 组可选的 64x8 位矩阵, 只保留亮度 intra/inter
    fn read_quant_matrix_ext(&mut self, reader: &mut BitReader) {
        for group in 0..4 {
            match reader.read_bit() {
                Some(true) => {
                    if reader.bits_left() < 64 * 8 {
                        warn!("量化矩阵扩展截断");
                        return;
                    }
                    for i in 0..64 {
                        let Some(v) = reader.read_bits(8) else {
                            return;
                        };
                        if group == 0 {
                            self.intra_matrix[ZIGZAG_SCAN[i]] = v as u8;
                        } else if group == 1 {
                            self.inter_matrix[ZIGZAG_SCAN[i]] = v as u8;
                        }
                        // 色度矩阵不保留
                    }
                }
                Some(false) => {}
                None => return,
            }
        }
        reader.align_to_byte();
    }
}

/// 向下取整的 log2 (0 视为 0)
fn floor_log2(v: u32) -> u8 {
    if v == 0 {
        0
    } else {
        (31 - v.leading_zeros()) as u8
    }
}

/// zig-zag 顺序读入自定义量化矩阵, 0 终止后用最后值填满
fn read_custom_matrix(reader: &mut BitReader, matrix: &mut [u8; 64]) -> LingResult<()> {
    let mut last = 0u8;
    let mut i = 0;
    while i < 64 {
        if reader.bits_left() < 8 {
            return Err(LingError::InvalidData("自定义量化矩阵数据不足".into()));
        }
        let v = reader
            .read_bits(8)
            .ok_or_else(|| LingError::InvalidData("自定义量化矩阵数据不足".into()))?
            as u8;
        if v == 0 {
            break;
        }
        last = v;
        matrix[ZIGZAG_SCAN[i]] = v;
        i += 1;
    }
    for j in i..64 {
        matrix[ZIGZAG_SCAN[j]] = last;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 把 '0'/'1' 字符串打包为字节 (尾部补 0)
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

    fn push_bits(s: &mut String, value: u32, n: u8) {
        for i in (0..n).rev() {
            s.push(if (value >> i) & 1 == 1 { '1' } else { '0' });
        }
    }

    /// 组装一个最小合法的 VOL 头位串 (不带起始码)
    fn minimal_vol_bits(width: u32, height: u32, tir: u32) -> String {
        let mut s = String::new();
        s.push('0'); // random_accessible_vol
        push_bits(&mut s, 1, 8); // vo_type = simple
        s.push('0'); // is_ol_id
        push_bits(&mut s, 1, 4); // aspect_ratio_info = 1:1
        s.push('0'); // vol_control_parameters
        push_bits(&mut s, 0, 2); // shape = rectangular
        s.push('1'); // marker
        push_bits(&mut s, tir, 16);
        s.push('1'); // marker
        s.push('0'); // fixed_vop_rate
        s.push('1'); // marker
        push_bits(&mut s, width, 13);
        s.push('1'); // marker
        push_bits(&mut s, height, 13);
        s.push('1'); // marker
        s.push('0'); // interlaced
        s.push('1'); // obmc_disable
        s.push('0'); // sprite_usage (verid=1, 1 位)
        s.push('0'); // not_8_bit
        s.push('0'); // mpeg_quant
        s.push('1'); // complexity_estimation_disable
        s.push('1'); // resync_marker_disable
        s.push('0'); // data_partitioned
        s.push('0'); // scalability
        s
    }

    #[test]
    fn test_vol_头基本字段() {
        let data = bits_to_bytes(&minimal_vol_bits(352, 288, 30000));
        let mut state = HeaderState::new(0);
        let mut reader = BitReader::new(&data);
        state.decode_vol_header(&mut reader).unwrap();
        assert_eq!(state.width, 352);
        assert_eq!(state.height, 288);
        assert_eq!(state.vol.time_increment_resolution, 30000);
        // ceil(log2(30000)) = 15
        assert_eq!(state.vol.time_increment_bits, 15);
        assert!(!state.vol.resync_marker);
        assert!(state.low_delay); // vo_type simple 且无控制参数
    }

    #[test]
    fn test_vop_时间基推进() {
        // VOL: tir=25 → tib=5
        let data = bits_to_bytes(&minimal_vol_bits(64, 64, 25));
        let mut state = HeaderState::new(0);
        let mut reader = BitReader::new(&data);
        state.decode_vol_header(&mut reader).unwrap();

        // I-VOP: type=00, 无 time_incr, marker, increment=7, marker,
        // coded=1, dc_thr=000, qscale=5
        let mut s = String::new();
        push_bits(&mut s, 0, 2);
        s.push('0'); // time_incr 结束
        s.push('1'); // marker
        push_bits(&mut s, 7, 5);
        s.push('1'); // marker
        s.push('1'); // vop_coded
        push_bits(&mut s, 0, 3); // intra_dc_vlc_thr
        push_bits(&mut s, 5, 5); // qscale
        let vop = bits_to_bytes(&s);
        let mut reader = BitReader::new(&vop);
        let outcome = state.decode_vop_header(&mut reader, false).unwrap();
        assert_eq!(outcome, HeaderOutcome::Vop);
        assert_eq!(state.vop.picture_type, PictureType::I);
        assert_eq!(state.vop.qscale, 5);
        assert_eq!(state.timing.time, 7);
        assert_eq!(state.timing.last_non_b_time, 7);
    }

    #[test]
    fn test_vop_未编码跳帧() {
        let data = bits_to_bytes(&minimal_vol_bits(64, 64, 25));
        let mut state = HeaderState::new(0);
        let mut reader = BitReader::new(&data);
        state.decode_vol_header(&mut reader).unwrap();

        let mut s = String::new();
        push_bits(&mut s, 1, 2); // P
        s.push('0');
        s.push('1');
        push_bits(&mut s, 3, 5);
        s.push('1');
        s.push('0'); // vop_coded = 0
        let vop = bits_to_bytes(&s);
        let mut reader = BitReader::new(&vop);
        let outcome = state.decode_vop_header(&mut reader, false).unwrap();
        assert_eq!(outcome, HeaderOutcome::Skipped);
        assert!(state.skipped_last_frame);
    }

    #[test]
    fn test_qscale_为零判错() {
        let data = bits_to_bytes(&minimal_vol_bits(64, 64, 25));
        let mut state = HeaderState::new(0);
        let mut reader = BitReader::new(&data);
        state.decode_vol_header(&mut reader).unwrap();

        let mut s = String::new();
        push_bits(&mut s, 0, 2);
        s.push('0');
        s.push('1');
        push_bits(&mut s, 1, 5);
        s.push('1');
        s.push('1');
        push_bits(&mut s, 0, 3);
        push_bits(&mut s, 0, 5); // qscale = 0
        let vop = bits_to_bytes(&s);
        let mut reader = BitReader::new(&vop);
        assert!(matches!(
            state.decode_vop_header(&mut reader, false),
            Err(LingError::InvalidData(_))
        ));
    }

    #[test]
    fn test_缺失vol时恢复time_increment_bits() {
        // 默认 tib=4 与码流不符时, 按 I 帧模式 (tib+5 位窗口 & 0x1F == 0x18)
        // 搜索正确位宽. 构造 tib=7, increment=0b0000001 的 I-VOP 头.
        let mut s = String::new();
        push_bits(&mut s, 0, 2); // I
        s.push('0'); // time_incr 结束
        s.push('1'); // marker
        push_bits(&mut s, 1, 7); // time_increment, 7 位
        s.push('1'); // marker
        s.push('1'); // vop_coded
        push_bits(&mut s, 0, 3);
        push_bits(&mut s, 10, 5); // qscale
        let vop = bits_to_bytes(&s);

        let mut state = HeaderState::new(0);
        state.vol.time_increment_bits = 4; // 与码流不匹配
        state.vol.time_increment_resolution = 100;
        let mut reader = BitReader::new(&vop);
        let outcome = state.decode_vop_header(&mut reader, false).unwrap();
        assert_eq!(outcome, HeaderOutcome::Vop);
        assert_eq!(state.vol.time_increment_bits, 7);
        assert_eq!(state.vop.qscale, 10);
    }

    #[test]
    fn test_起始码扫描到vop() {
        // VOS + 视觉对象 + VOL + VOP 的完整序列
        let mut payload = Vec::new();
        payload.extend_from_slice(&[0x00, 0x00, 0x01, 0xB0, 0x01]); // VOS: simple/L1
        payload.extend_from_slice(&[0x00, 0x00, 0x01, 0x20]); // VOL 起始码
        payload.extend(bits_to_bytes(&minimal_vol_bits(64, 64, 25)));
        payload.extend_from_slice(&[0x00, 0x00, 0x01, 0xB6]); // VOP 起始码
        let mut s = String::new();
        push_bits(&mut s, 0, 2);
        s.push('0');
        s.push('1');
        push_bits(&mut s, 3, 5);
        s.push('1');
        s.push('1');
        push_bits(&mut s, 0, 3);
        push_bits(&mut s, 8, 5);
        payload.extend(bits_to_bytes(&s));

        let mut state = HeaderState::new(0);
        let mut reader = BitReader::new(&payload);
        let outcome = state.parse_picture_header(&mut reader, false).unwrap();
        assert_eq!(outcome, HeaderOutcome::Vop);
        assert!(state.vol_found);
        assert_eq!(state.vop.qscale, 8);
    }

    #[test]
    fn test_extradata_无vop正常返回() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&[0x00, 0x00, 0x01, 0x20]);
        payload.extend(bits_to_bytes(&minimal_vol_bits(176, 144, 30)));

        let mut state = HeaderState::new(0);
        let mut reader = BitReader::new(&payload);
        let outcome = state.parse_picture_header(&mut reader, true).unwrap();
        assert_eq!(outcome, HeaderOutcome::ConfigOnly);
        assert_eq!(state.width, 176);
        assert_eq!(state.height, 144);
    }
}
