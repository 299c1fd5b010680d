//! 解码器 trait 定义.
//!
//! 所有解码器实现必须实现 `Decoder` trait.

use ling_core::LingResult;

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::packet::Packet;
use crate::picture::Picture;

/// 解码器 trait
///
/// 定义了解码器的统一接口.
///
/// 解码流程:
/// 1. 调用 `send_packet()` 送入压缩数据
/// 2. 调用 `receive_picture()` 取出解码后的宏块符号面
/// 3. 重复以上步骤直到所有数据处理完毕
/// 4. 送入空包 (flush) 以获取解码器中缓存的图像
pub trait Decoder: Send {
    /// 获取解码器标识
    fn codec_id(&self) -> CodecId;

    /// 获取解码器名称
    fn name(&self) -> &str;

    /// 使用参数配置解码器
    ///
    /// extra_data 中携带 VOL 头的码流在此处完成序列级解析.
    /// 默认实现为空操作.
    fn open(&mut self, _params: &CodecParameters) -> LingResult<()> {
        Ok(())
    }

    /// 送入一个压缩数据包进行解码
    ///
    /// # 返回
    /// - `Ok(())`: 数据包已接受
    /// - `Err(LingError::NeedMoreData)`: 内部缓冲已满, 需要先取出图像
    fn send_packet(&mut self, packet: &Packet) -> LingResult<()>;

    /// 从解码器取出一幅解码完成的图像 (宏块级符号面)
    ///
    /// # 返回
    /// - `Ok(picture)`: 成功取出一幅
    /// - `Err(LingError::NeedMoreData)`: 需要送入更多数据包
    /// - `Err(LingError::Eof)`: 所有图像已取出
    fn receive_picture(&mut self) -> LingResult<Picture>;

    /// 刷新解码器, 清空内部状态
    ///
    /// 用于 seek 后重置解码器状态.
    fn flush(&mut self);
}
