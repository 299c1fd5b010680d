//! 像素格式定义.
//!
//! 定义了视频帧中像素的存储格式. 解码核心本身不重建像素,
//! 但头部解析需要向下游描述码流声明的采样结构与位深.

use std::fmt;

/// 像素格式
///
/// 命名规则: 颜色空间 + 采样结构 + 位深 (P=Planar, LE=小端).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// 未指定
    None,
    /// YUV 4:2:0 平面格式, 8 位 (MPEG-4 Part 2 常规 profile 默认)
    Yuv420p,
    /// YUV 4:2:2 平面格式, 8 位
    Yuv422p,
    /// YUV 4:4:4 平面格式, 8 位
    Yuv444p,
    /// YUV 4:2:0 平面格式, 10 位小端 (studio profile)
    Yuv420p10le,
    /// YUV 4:2:2 平面格式, 10 位小端 (studio profile)
    Yuv422p10le,
    /// YUV 4:4:4 平面格式, 10 位小端 (studio profile)
    Yuv444p10le,
}

impl PixelFormat {
    /// 获取单个分量的位深
    pub const fn bits_per_component(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Yuv420p | Self::Yuv422p | Self::Yuv444p => 8,
            Self::Yuv420p10le | Self::Yuv422p10le | Self::Yuv444p10le => 10,
        }
    }

    /// 获取色度子采样 (log2 水平, log2 垂直)
    ///
    /// 例如 YUV420 返回 (1, 1), 表示色度分辨率为亮度的 1/2 x 1/2.
    pub const fn chroma_subsampling(&self) -> (u32, u32) {
        match self {
            Self::Yuv420p | Self::Yuv420p10le => (1, 1),
            Self::Yuv422p | Self::Yuv422p10le => (1, 0),
            _ => (0, 0),
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Yuv420p => "yuv420p",
            Self::Yuv422p => "yuv422p",
            Self::Yuv444p => "yuv444p",
            Self::Yuv420p10le => "yuv420p10le",
            Self::Yuv422p10le => "yuv422p10le",
            Self::Yuv444p10le => "yuv444p10le",
        };
        f.write_str(name)
    }
}
