//! # ling-core
//!
//! Ling 解码框架核心库, 提供基础类型定义、错误处理和工具函数.
//!
//! 本 crate 为整个 Ling 框架提供底层基础设施: 统一错误类型、有理数
//! (时间基/帧率) 以及像素格式描述.

pub mod error;
pub mod pixel_format;
pub mod rational;

// 重导出常用类型
pub use error::{LingError, LingResult};
pub use pixel_format::PixelFormat;
pub use rational::Rational;
