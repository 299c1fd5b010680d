//! MPEG-4 Part 2 解码器类型定义

use crate::picture::{MotionVector, PictureType};

/// 宏块类型 (I/P/S-VOP, MCBPC 解出)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum MbType {
    Intra,
    IntraQ,
    Inter,
    InterQ,
    Inter4V,
    /// MCBPC stuffing code, 调用方丢弃后重新解码
    Stuffing,
}

impl MbType {
    pub fn is_intra(self) -> bool {
        matches!(self, Self::Intra | Self::IntraQ)
    }

    pub fn has_dquant(self) -> bool {
        matches!(self, Self::IntraQ | Self::InterQ)
    }
}

/// B 帧宏块模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum BframeMbMode {
    /// 直接模式: MV 从共定位锚点宏块 MV 按 TRB/TRD 缩放
    Direct,
    /// 前向预测
    Forward,
    /// 后向预测
    Backward,
    /// 双向插值
    Interpolate,
    /// 直接模式且无 delta MV (MODB 短路)
    DirectNoneMv,
}

/// DC/AC 预测方向
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum PredictorDirection {
    None,
    /// 从左邻块预测
    Horizontal,
    /// 从上邻块预测
    Vertical,
}

/// VOL 视频对象形状
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum VolShape {
    Rectangular,
    Binary,
    BinaryOnly,
    Grayscale,
}

/// sprite 使能方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) enum SpriteUsage {
    #[default]
    None,
    Static,
    Gmc,
}

/// VOL (Video Object Layer) 信息
#[derive(Debug, Clone)]
pub(super) struct VolInfo {
    /// 视频对象类型 (vo_type); 0 配合无 VOL 控制参数用于识别旧编码器
    pub vo_type: u8,
    pub shape: VolShape,
    pub time_increment_resolution: u16,
    /// vop_time_increment 字段位宽, 由分辨率 log2 向上取整得到
    pub time_increment_bits: u8,
    #[allow(dead_code)]
    pub fixed_vop_rate: bool,
    /// 量化参数字段位宽 (3..=9, 默认 5)
    pub quant_precision: u8,
    /// 量化类型: false=H.263, true=MPEG (自定义矩阵)
    pub mpeg_quant: bool,
    /// 是否支持隔行扫描
    pub interlaced: bool,
    /// 是否启用 quarter-pixel
    pub quarter_sample: bool,
    pub sprite_usage: SpriteUsage,
    /// sprite warping 点数 (0..=3, >3 为硬错误)
    pub sprite_warping_points: u8,
    /// warping 精度 (0=1/2 像素 .. 3=1/16 像素)
    pub sprite_warping_accuracy: u8,
    pub sprite_brightness_change: bool,
    /// resync marker 是否启用 (VOL 中存的是 disable 位)
    pub resync_marker: bool,
    pub data_partitioned: bool,
    /// 分区 B 使用可逆 VLC
    pub rvlc: bool,
    pub new_pred: bool,
    pub scalability: bool,
    pub enhancement_type: bool,
    /// VOL 控制参数是否出现
    pub vol_control_parameters: bool,
    pub low_delay: bool,
    /// 复杂度估计头在 VOP 中占用的位数 (解码时跳过)
    pub cplx_estimation_trash_i: u8,
    pub cplx_estimation_trash_p: u8,
    pub cplx_estimation_trash_b: u8,
}

impl Default for VolInfo {
    fn default() -> Self {
        Self {
            vo_type: 0,
            shape: VolShape::Rectangular,
            time_increment_resolution: 1,
            // 缺失 VOL 头时的默认值, 之后可由码流分析修正
            time_increment_bits: 4,
            fixed_vop_rate: false,
            quant_precision: 5,
            mpeg_quant: false,
            interlaced: false,
            quarter_sample: false,
            sprite_usage: SpriteUsage::None,
            sprite_warping_points: 0,
            sprite_warping_accuracy: 0,
            sprite_brightness_change: false,
            resync_marker: true,
            data_partitioned: false,
            rvlc: false,
            new_pred: false,
            scalability: false,
            enhancement_type: false,
            vol_control_parameters: false,
            low_delay: false,
            cplx_estimation_trash_i: 0,
            cplx_estimation_trash_p: 0,
            cplx_estimation_trash_b: 0,
        }
    }
}

/// VOP (Video Object Plane) 头信息
#[derive(Debug, Clone)]
pub(super) struct VopInfo {
    pub picture_type: PictureType,
    pub coded: bool,
    /// 运动估计舍入控制
    pub rounding: u8,
    /// 帧内 DC VLC 量化门限 (宏块 qscale >= 门限时 DC 用 AC 表)
    pub intra_dc_threshold: u8,
    pub f_code: u8,
    pub b_code: u8,
    pub qscale: u8,
    pub alternate_scan: bool,
    #[allow(dead_code)]
    pub top_field_first: bool,
}

impl Default for VopInfo {
    fn default() -> Self {
        Self {
            picture_type: PictureType::I,
            coded: true,
            rounding: 0,
            intra_dc_threshold: 99,
            f_code: 1,
            b_code: 1,
            qscale: 1,
            alternate_scan: false,
            top_field_first: false,
        }
    }
}

/// studio profile 特有的层/图参数
#[derive(Debug, Clone, Default)]
pub(super) struct StudioInfo {
    /// 分量位深 (仅支持 10)
    pub bits_per_raw_sample: u8,
    /// RGB 分量排列 (否则 YUV)
    pub rgb: bool,
    /// 色度采样结构 (1=420 非法, 2=422, 3=444)
    pub chroma_format: u8,
    pub frame_pred_frame_dct: bool,
    /// DCT 系数附加精度 (0..=3)
    pub dct_precision: u8,
    /// 帧内 DC 精度 (0..=3, 对应 8..11 位)
    pub intra_dc_precision: u8,
    /// 非线性量化阶表选择
    pub q_scale_type: bool,
    pub progressive_frame: bool,
}

/// sprite 几何: 轨迹点与推导出的 offset/delta/shift
///
/// 每幅 S-VOP 重新计算一次; 溢出时整体归零降级.
#[derive(Debug, Clone, Default)]
pub(super) struct SpriteGeometry {
    /// 解码出的轨迹位移 (像素域, 最多 3 点)
    pub trajectory: [[i32; 2]; 4],
    /// 化简后的有效 warp 点数 (0/1/2/3; 2/3 点退化时降为 1)
    pub real_warping_points: u8,
    pub offset: [[i32; 2]; 2],
    pub delta: [[i32; 2]; 2],
    pub shift: [u8; 2],
}

/// 数据分区模式下分区 A 产出的半成品宏块
///
/// 分区 A 给出模式/量化/DC (I) 或模式/运动向量 (P), 分区 B 补齐
/// ac_pred/CBPY/AC 系数后才允许写入最终的宏块记录.
#[derive(Debug, Clone)]
pub(super) struct PartialMacroblock {
    pub mb_type: MbType,
    /// 6 位 CBP; 分区 A 写入色度低 2 位, 分区 B 补齐亮度高 4 位
    pub cbp: u8,
    /// 帧内: 量化域 DC (含预测还原), 6 块
    pub dc_levels: [i16; 6],
    /// 帧内 DC 预测方向, bit (5-n) 置位表示块 n 用上方预测
    pub dc_dirs: u8,
    pub ac_pred: bool,
    /// 全局运动补偿 (S-VOP 中显式 mcsel 或跳过宏块)
    pub gmc: bool,
    /// P 帧分区 A 解出的运动向量
    pub motion: [MotionVector; 4],
    /// P 帧 not_coded 跳过宏块
    pub skipped: bool,
}

impl Default for PartialMacroblock {
    fn default() -> Self {
        Self {
            mb_type: MbType::Intra,
            cbp: 0,
            dc_levels: [0; 6],
            dc_dirs: 0,
            ac_pred: false,
            gmc: false,
            motion: [MotionVector::default(); 4],
            skipped: false,
        }
    }
}
