//! 解码输出: 宏块级符号面 (Picture).
//!
//! 解码核心不重建像素, 每幅图像的输出是逐宏块的符号记录: 宏块模式、
//! 量化参数、CBP、运动向量与 6 个 64 系数的 DCT 域块 (光栅顺序,
//! 扫描置换已在熵解码时完成).
//! 下游的重建协作者 (IDCT + 运动补偿) 消费这些记录; 错误隐藏逻辑消费
//! resync 层记录的错误区间.

use ling_core::{PixelFormat, Rational};

/// 图片类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PictureType {
    /// 未指定
    #[default]
    None,
    /// I-VOP (帧内编码)
    I,
    /// P-VOP (前向预测)
    P,
    /// B-VOP (双向预测)
    B,
    /// S-VOP (sprite / GMC)
    S,
}

/// 运动向量 (半像素或 1/4 像素单位, 由码流的 quarter_sample 决定)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotionVector {
    pub x: i16,
    pub y: i16,
}

/// 宏块模式 (带标签变体, 而非位掩码)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MbKind {
    /// 帧内编码
    Intra {
        /// AC 预测是否启用
        ac_pred: bool,
    },
    /// 帧间编码 (1 或 4 个前向 MV)
    Inter {
        /// 4MV 模式 (每 8x8 块一个 MV)
        four_mv: bool,
        /// 场预测 (隔行)
        field: bool,
    },
    /// 全局运动补偿 (S-VOP 中 mcsel=1 的宏块)
    Gmc,
    /// B 帧直接模式 (MV 由共定位锚点宏块缩放得到)
    BDirect,
    /// B 帧前向预测
    BForward,
    /// B 帧后向预测
    BBackward,
    /// B 帧双向插值
    BInterpolate,
    /// 未编码 (跳过)
    #[default]
    Skipped,
}

/// 单个宏块的解码记录
///
/// 按光栅顺序写入 [`Picture::macroblocks`]; 数据分区模式下由分区 A/B
/// 两趟填充 (见解码器内部的 PartialMacroblock 中间类型).
#[derive(Debug, Clone)]
pub struct Macroblock {
    /// 宏块模式
    pub kind: MbKind,
    /// 量化参数 (1..=31, studio profile 下为 1..=111)
    pub quant: u8,
    /// 编码块模式位图, bit5..bit0 依次对应 Y0 Y1 Y2 Y3 Cb Cr
    pub cbp: u8,
    /// 前向运动向量 (1MV 模式下 [0] 复制到全部 4 个)
    pub motion: [MotionVector; 4],
    /// 后向运动向量 (仅 B 帧双向/后向/直接模式有效)
    pub motion_backward: [MotionVector; 4],
    /// 6 个 DCT 域系数块, 光栅顺序 (熵解码时已按扫描表置换)
    pub blocks: [[i16; 64]; 6],
}

impl Default for Macroblock {
    fn default() -> Self {
        Self {
            kind: MbKind::Skipped,
            quant: 1,
            cbp: 0,
            motion: [MotionVector::default(); 4],
            motion_backward: [MotionVector::default(); 4],
            blocks: [[0; 64]; 6],
        }
    }
}

/// 错误类别 (哪一类符号在区间内不可信)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 纹理 (AC/CBP) 损坏, 运动数据仍可用 (数据分区 B 区损坏的典型情况)
    Texture,
    /// 运动/DC 数据损坏
    Motion,
    /// 整个区间不可信
    Whole,
}

/// 一段解码失败的宏块区间, 供错误隐藏协作者消费
#[derive(Debug, Clone, Copy)]
pub struct ErrorSpan {
    /// 起始宏块号 (含)
    pub start_mb: usize,
    /// 结束宏块号 (不含)
    pub end_mb: usize,
    /// 错误类别
    pub class: ErrorClass,
}

/// studio 档宏块: 高位深帧内 DCT 系数或无损 DPCM 样本
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudioMacroblock {
    /// DCT 编码: 每块 64 个 32 位系数 (4:2:2 为 8 块, 4:4:4 为 12 块)
    Dct { blocks: Vec<[i32; 64]> },
    /// DPCM 编码: 三个分量的样本面, 行优先
    Dpcm {
        /// 扫描方向 (1 正向, -1 反向)
        direction: i8,
        samples: [Vec<i16>; 3],
    },
}

/// 一幅解码输出图像
#[derive(Debug, Clone)]
pub struct Picture {
    /// 图片类型
    pub picture_type: PictureType,
    /// vop_coded 标志; false 表示该 VOP 未携带宏块数据 (N-VOP)
    pub coded: bool,
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 水平宏块数
    pub mb_width: usize,
    /// 垂直宏块数
    pub mb_height: usize,
    /// 像素格式 (由 VOL 声明的采样结构与位深)
    pub pixel_format: PixelFormat,
    /// 图片级量化参数
    pub qscale: u8,
    /// 宏块记录, 光栅顺序, 长度为 mb_width * mb_height
    pub macroblocks: Vec<Macroblock>,
    /// studio 档宏块记录 (非 studio 码流恒为空)
    pub studio_macroblocks: Vec<StudioMacroblock>,
    /// resync 层记录的错误区间
    pub error_spans: Vec<ErrorSpan>,
    /// 显示时间戳
    pub pts: i64,
    /// 时间基
    pub time_base: Rational,
    /// 是否为关键帧
    pub is_keyframe: bool,
}

impl Picture {
    /// 创建所有宏块为 Skipped 的空图像
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        let mb_width = (width as usize).div_ceil(16);
        let mb_height = (height as usize).div_ceil(16);
        Self {
            picture_type: PictureType::None,
            coded: true,
            width,
            height,
            mb_width,
            mb_height,
            pixel_format,
            qscale: 1,
            macroblocks: vec![Macroblock::default(); mb_width * mb_height],
            studio_macroblocks: Vec::new(),
            error_spans: Vec::new(),
            pts: crate::packet::NOPTS_VALUE,
            time_base: Rational::UNDEFINED,
            is_keyframe: false,
        }
    }

    /// 宏块总数
    pub fn mb_count(&self) -> usize {
        self.mb_width * self.mb_height
    }
}
