//! 编解码器标识符.
//!
//! 为每种编解码算法分配唯一标识, 与容器格式无关.

use std::fmt;

/// 编解码器标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecId {
    /// 未知编解码器
    None,
    /// MPEG-4 Part 2 (ASP / Simple Studio)
    Mpeg4,
    /// H.263 (短头 MPEG-4 码流回落到此标识)
    H263,
    /// MPEG-1 Video
    Mpeg1Video,
    /// MPEG-2 Video
    Mpeg2Video,
    /// H.264 / AVC / MPEG-4 Part 10
    H264,
}

impl CodecId {
    /// 获取编解码器的人类可读名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Mpeg4 => "mpeg4",
            Self::H263 => "h263",
            Self::Mpeg1Video => "mpeg1video",
            Self::Mpeg2Video => "mpeg2video",
            Self::H264 => "h264",
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
