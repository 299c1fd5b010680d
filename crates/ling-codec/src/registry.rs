//! 编解码器注册表.
//!
//! 支持按 CodecId 动态查找和实例化解码器.

use std::collections::HashMap;

use ling_core::LingResult;

use crate::codec_id::CodecId;
use crate::decoder::Decoder;

/// 解码器工厂函数类型
pub type DecoderFactory = fn() -> LingResult<Box<dyn Decoder>>;

/// 编解码器注册表
///
/// 管理所有已注册的解码器, 支持按 CodecId 查找并创建实例.
pub struct CodecRegistry {
    /// 解码器工厂映射
    decoders: HashMap<CodecId, Vec<DecoderEntry>>,
}

/// 解码器注册条目
struct DecoderEntry {
    /// 解码器名称
    name: String,
    /// 工厂函数
    factory: DecoderFactory,
}

impl CodecRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// 注册一个解码器
    pub fn register_decoder(
        &mut self,
        codec_id: CodecId,
        name: impl Into<String>,
        factory: DecoderFactory,
    ) {
        self.decoders
            .entry(codec_id)
            .or_default()
            .push(DecoderEntry {
                name: name.into(),
                factory,
            });
    }

    /// 创建指定编解码器 ID 的解码器实例
    pub fn create_decoder(&self, codec_id: CodecId) -> LingResult<Box<dyn Decoder>> {
        let entries = self.decoders.get(&codec_id).ok_or_else(|| {
            ling_core::LingError::CodecNotFound(format!("未找到 {} 的解码器", codec_id))
        })?;
        // 使用第一个注册的解码器 (优先级最高)
        let entry = &entries[0];
        (entry.factory)()
    }

    /// 获取所有已注册的解码器名称
    pub fn list_decoders(&self) -> Vec<(CodecId, &str)> {
        let mut result = Vec::new();
        for (id, entries) in &self.decoders {
            for entry in entries {
                result.push((*id, entry.name.as_str()));
            }
        }
        result
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_注册所有解码器() {
        let mut registry = CodecRegistry::new();
        crate::register_all(&mut registry);

        let decoders = registry.list_decoders();
        assert_eq!(decoders.len(), 1);
        assert_eq!(decoders[0].0, CodecId::Mpeg4);
    }

    #[test]
    fn test_按codec_id创建解码器() {
        let mut registry = CodecRegistry::new();
        crate::register_all(&mut registry);

        let dec = registry.create_decoder(CodecId::Mpeg4);
        assert!(dec.is_ok(), "创建 mpeg4 解码器失败");
        assert_eq!(dec.unwrap().codec_id(), CodecId::Mpeg4);
    }

    #[test]
    fn test_未注册的编解码器返回错误() {
        let registry = CodecRegistry::new();
        assert!(registry.create_decoder(CodecId::H264).is_err());
    }
}
