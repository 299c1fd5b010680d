//! # ling-codec
//!
//! Ling 解码框架编解码器库, 提供解码器注册框架与 Packet/Picture 抽象.
//!
//! 本 crate 的核心是 MPEG-4 Part 2 视频码流解码核心: 头部解析、逐宏块
//! 熵解码 (VLC DC/AC 系数、运动向量)、resync 容错层与 sprite (GMC)
//! 轨迹求解. 解码输出为宏块级符号面 ([`Picture`]), 像素重建 (IDCT/
//! 运动补偿) 由下游协作者完成.
//!
//! ## 使用示例
//!
//! ```rust
//! use ling_codec::{CodecRegistry, CodecId, Decoder};
//!
//! let mut reg = CodecRegistry::new();
//! ling_codec::register_all(&mut reg);
//!
//! let decoder = reg.create_decoder(CodecId::Mpeg4).unwrap();
//! assert_eq!(decoder.codec_id(), CodecId::Mpeg4);
//! ```

pub mod codec_id;
pub mod codec_parameters;
pub mod decoder;
pub mod decoders;
pub mod packet;
pub mod picture;
pub mod registry;

// 重导出常用类型
pub use codec_id::CodecId;
pub use codec_parameters::{CodecParameters, CodecParamsType, VideoCodecParams};
pub use decoder::Decoder;
pub use packet::Packet;
pub use picture::{
    ErrorClass, ErrorSpan, Macroblock, MbKind, MotionVector, Picture, PictureType,
    StudioMacroblock,
};
pub use registry::CodecRegistry;

/// 注册所有内置解码器
pub fn register_all(registry: &mut CodecRegistry) {
    decoders::register_all_decoders(registry);
}
