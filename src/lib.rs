//! # Ling (灵)
//!
//! 纯 Rust 实现的 MPEG-4 Part 2 视频码流解码核心.
//!
//! Ling 把码流解码与像素重建分离: 本仓库覆盖头部解析 (VOS/VOL/VOP)、
//! 逐宏块熵解码 (VLC DC/AC 系数与运动向量)、sprite (GMC) 全局运动轨迹
//! 求解、resync/数据分区容错以及 studio 档高位深码流, 输出为宏块级
//! 符号面; IDCT、运动补偿与色彩转换由下游协作者完成.
//!
//! # 快速开始
//!
//! ```rust
//! use ling::{CodecId, Decoder};
//!
//! let registry = ling::default_codec_registry();
//! let decoder = registry.create_decoder(CodecId::Mpeg4).unwrap();
//! assert_eq!(decoder.name(), "mpeg4");
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `ling-core` | 核心类型与工具 (错误、有理数、像素格式) |
//! | `ling-codec` | 解码器注册框架与 MPEG-4 Part 2 解码核心 |

/// 核心类型与工具 (错误、有理数、像素格式)
pub use ling_core as core;

/// 编解码器框架与 MPEG-4 Part 2 解码核心
pub use ling_codec as codec;

// 常用类型平铺导出
pub use ling_codec::{
    CodecId, CodecParameters, CodecRegistry, Decoder, Macroblock, MbKind, Packet, Picture,
    PictureType,
};
pub use ling_core::{LingError, LingResult, PixelFormat, Rational};

/// 获取 Ling 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 创建已注册所有内置解码器的注册表
pub fn default_codec_registry() -> CodecRegistry {
    let mut registry = CodecRegistry::new();
    ling_codec::register_all(&mut registry);
    registry
}
