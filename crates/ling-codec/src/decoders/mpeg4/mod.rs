//! MPEG-4 Part 2 视频解码器
//!
//! 覆盖头部解析 (VOS/VO/VOL/GOP/VOP)、逐宏块熵解码 (I/P/S/B 帧)、
//! sprite (GMC) 轨迹求解、resync 视频分组容错、数据分区与 studio 档.
//! 输出为宏块级符号面: 系数块、运动向量与模式记录, 像素重建由下游
//! 完成.

mod bframe;
mod bitreader;
mod block;
mod header;
mod macroblock;
mod motion;
mod partitioned;
mod progress;
mod quirks;
mod resync;
mod sprite;
mod studio;
mod tables;
mod types;
mod vlc;

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, warn};

use ling_core::{LingError, LingResult};

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::decoder::Decoder;
use crate::packet::{self, Packet};
use crate::picture::{
    ErrorClass, ErrorSpan, MbKind, Picture, PictureType, StudioMacroblock,
};

use bitreader::BitReader;
use block::TextureState;
use header::{HeaderOutcome, HeaderState};
use motion::MotionGrid;
use progress::RowProgress;
use types::PartialMacroblock;

/// MPEG-4 Part 2 解码器上下文
///
/// 跨包持续的码流状态 (头信息、时间基、预测网格) 都在这里; 每幅
/// 图像的解码以 [`Picture`] 形式排入输出队列.
pub struct Mpeg4Decoder {
    state: HeaderState,
    mb_width: usize,
    mb_height: usize,

    /// 帧内 DC/AC 预测网格与逐宏块量化表
    texture: TextureState,
    /// 当前帧 MV 网格 (中值预测)
    motion: MotionGrid,
    /// 未来锚点帧的 MV 网格 (B 帧直接模式)
    next_motion: MotionGrid,
    /// 未来锚点帧各宏块是否跳过
    next_skip: Vec<bool>,
    /// 未来锚点帧各宏块是否 4MV
    next_four_mv: Vec<bool>,
    /// 锚点帧行进度 (帧级并行时等待, 单线程恒为 None)
    anchor_progress: Option<Arc<RowProgress>>,
    /// 本帧行进度发布端 (有下游 B 帧等待时置位)
    publish_progress: Option<Arc<RowProgress>>,

    qscale: u8,
    resync_mb_x: usize,
    resync_mb_y: usize,
    first_slice_line: bool,
    /// B 帧行内 MV 历史 [方向][场][分量]
    last_mv: [[[i16; 2]; 2]; 2],
    /// 数据分区模式的半成品宏块表
    partial: Vec<PartialMacroblock>,
    /// studio 档分量 DC 预测器
    studio_dc: [i32; 3],

    /// DivX packed bitstream 暂存的后续子图
    pending: Option<Bytes>,
    output: VecDeque<Picture>,
    draining: bool,
}

impl Mpeg4Decoder {
    pub fn new() -> Self {
        Self::with_codec_tag(0)
    }

    fn with_codec_tag(codec_tag: u32) -> Self {
        Self {
            state: HeaderState::new(codec_tag),
            mb_width: 0,
            mb_height: 0,
            texture: TextureState::new(1, 1),
            motion: MotionGrid::new(1, 1),
            next_motion: MotionGrid::new(1, 1),
            next_skip: Vec::new(),
            next_four_mv: Vec::new(),
            anchor_progress: None,
            publish_progress: None,
            qscale: 1,
            resync_mb_x: 0,
            resync_mb_y: 0,
            first_slice_line: true,
            last_mv: [[[0; 2]; 2]; 2],
            partial: Vec::new(),
            studio_dc: [0; 3],
            pending: None,
            output: VecDeque::new(),
            draining: false,
        }
    }

    /// 注册表工厂
    pub fn create() -> LingResult<Box<dyn Decoder>> {
        Ok(Box::new(Self::new()))
    }

    /// 帧级并行切换点: 克隆标量码流状态, 锚点进度经屏障共享
    ///
    /// 返回的解码器把本解码器当前正在解码的帧当作未来锚点, 其 B 帧
    /// 直接模式按行等待本解码器的进度报告.
    pub fn split_for_frame_parallel(&mut self) -> Self {
        let progress = Arc::new(RowProgress::new());
        self.publish_progress = Some(Arc::clone(&progress));

        let mut child = Self::with_codec_tag(self.state.codec_tag);
        child.state = self.state.clone();
        child.set_dimensions();
        child.next_motion = self.motion.clone();
        child.next_skip = self.next_skip.clone();
        child.next_four_mv = self.next_four_mv.clone();
        child.anchor_progress = Some(progress);
        child.qscale = self.qscale;
        child
    }

    #[cfg(test)]
    fn new_for_test(mb_width: usize, mb_height: usize) -> Self {
        let mut dec = Self::new();
        dec.state.width = (mb_width * 16) as u32;
        dec.state.height = (mb_height * 16) as u32;
        dec.set_dimensions();
        dec
    }

    /// 按头部声明的尺寸 (重新) 分配各预测网格
    fn set_dimensions(&mut self) {
        let mb_width = (self.state.width as usize).div_ceil(16);
        let mb_height = (self.state.height as usize).div_ceil(16);
        if mb_width == self.mb_width && mb_height == self.mb_height {
            return;
        }
        self.mb_width = mb_width;
        self.mb_height = mb_height;
        let count = mb_width * mb_height;
        self.texture = TextureState::new(mb_width, mb_height);
        self.motion = MotionGrid::new(mb_width, mb_height);
        self.next_motion = MotionGrid::new(mb_width, mb_height);
        self.next_skip = vec![false; count];
        self.next_four_mv = vec![false; count];
        self.partial = vec![PartialMacroblock::default(); count];
    }

    // ========================================================================
    // 帧解码
    // ========================================================================

    fn decode_frame(&mut self, data: &[u8], packet: &Packet) -> LingResult<()> {
        let mut reader = BitReader::new(data);
        match self.state.parse_picture_header(&mut reader, false)? {
            HeaderOutcome::Vop => {}
            HeaderOutcome::Skipped | HeaderOutcome::ConfigOnly => return Ok(()),
        }
        if self.state.width == 0 || self.state.height == 0 {
            return Err(LingError::InvalidData("VOP 之前未见有效尺寸".into()));
        }
        self.set_dimensions();

        let mut picture = Picture::new(
            self.state.width,
            self.state.height,
            self.state.pixel_format(),
        );
        picture.picture_type = self.state.vop.picture_type;
        picture.qscale = self.state.vop.qscale;
        picture.is_keyframe = self.state.vop.picture_type == PictureType::I;
        picture.pts = if packet.pts != packet::NOPTS_VALUE {
            packet.pts
        } else {
            self.state.vop_pts
        };
        picture.time_base = packet.time_base;

        if self.state.studio_profile {
            self.decode_studio_frame(&mut reader, &mut picture)?;
        } else {
            self.decode_vop(&mut reader, &mut picture)?;
        }

        // 本帧成为后续 B 帧的未来锚点
        if !self.state.studio_profile && self.state.vop.picture_type != PictureType::B {
            std::mem::swap(&mut self.next_motion, &mut self.motion);
            for (xy, mb) in picture.macroblocks.iter().enumerate() {
                self.next_skip[xy] = matches!(mb.kind, MbKind::Skipped);
                self.next_four_mv[xy] =
                    matches!(mb.kind, MbKind::Inter { four_mv: true, .. });
            }
        }
        if let Some(progress) = &self.publish_progress {
            progress.finish(self.mb_height);
        }

        self.output.push_back(picture);
        Ok(())
    }

    fn decode_vop(&mut self, reader: &mut BitReader, picture: &mut Picture) -> LingResult<()> {
        let pict_type = self.state.vop.picture_type;
        let total = self.mb_width * self.mb_height;

        self.set_qscale(self.state.vop.qscale as i32);
        self.texture
            .reset(self.state.workarounds.contains(quirks::Workarounds::DC_CLIP));
        self.motion.clear();
        self.resync_mb_x = 0;
        self.resync_mb_y = 0;
        self.first_slice_line = true;
        self.last_mv = [[[0; 2]; 2]; 2];

        if self.state.partitioned_frame {
            self.decode_partitioned_vop(reader, picture)
        } else {
            self.decode_slices(reader, picture, pict_type, total)
        }
    }

    fn decode_slices(
        &mut self,
        reader: &mut BitReader,
        picture: &mut Picture,
        pict_type: PictureType,
        total: usize,
    ) -> LingResult<()> {
        let mut xy = 0usize;
        let mut slice_start = 0usize;

        while xy < total {
            let mb_x = xy % self.mb_width;
            let mb_y = xy / self.mb_width;
            if mb_x == self.resync_mb_x && mb_y == self.resync_mb_y + 1 {
                self.first_slice_line = false;
            }

            let decoded = match pict_type {
                PictureType::I => self.decode_i_mb(reader, mb_x, mb_y),
                PictureType::P | PictureType::S => self.decode_p_mb(reader, mb_x, mb_y),
                PictureType::B => self.decode_b_mb(reader, mb_x, mb_y),
                PictureType::None => {
                    return Err(LingError::Internal("VOP 类型未初始化".into()));
                }
            };
            match decoded {
                Ok(mb) => picture.macroblocks[xy] = mb,
                Err(e) => {
                    warn!("宏块解码失败: {e}");
                    picture.error_spans.push(ErrorSpan {
                        start_mb: slice_start,
                        end_mb: xy + 1,
                        class: ErrorClass::Whole,
                    });
                    match self.recover_to_next_packet(reader) {
                        Some(next_xy) => {
                            slice_start = next_xy;
                            xy = next_xy;
                            continue;
                        }
                        None => return Ok(()),
                    }
                }
            }

            if mb_x + 1 == self.mb_width
                && let Some(progress) = &self.publish_progress
            {
                progress.report(mb_y);
            }

            // 每宏块探测分组尾
            if let Some(next) = self.is_resync(reader) {
                let at_end = next < 0 || xy as i64 + 1 >= next;
                let b_colocated_skip = !at_end && pict_type == PictureType::B && {
                    let delta = if mb_x + 1 == self.mb_width { 2 } else { 1 };
                    xy + delta < total && self.next_skip[xy + delta]
                };
                if !b_colocated_skip && (at_end || next > 0) {
                    if next >= total as i64 {
                        return Ok(()); // 整帧收尾
                    }
                    if next > xy as i64 + 1 {
                        // marker 宣告的起点跳过了若干宏块
                        picture.error_spans.push(ErrorSpan {
                            start_mb: xy + 1,
                            end_mb: next as usize,
                            class: ErrorClass::Whole,
                        });
                    }
                    Self::skip_to_packet_start(reader);
                    match self.decode_video_packet_header(reader) {
                        Ok(mb_num) => {
                            slice_start = mb_num;
                            xy = mb_num;
                            continue;
                        }
                        Err(e) => {
                            warn!("视频分组头解码失败: {e}");
                            match self.recover_to_next_packet(reader) {
                                Some(next_xy) => {
                                    slice_start = next_xy;
                                    xy = next_xy;
                                    continue;
                                }
                                None => return Ok(()),
                            }
                        }
                    }
                }
            }
            xy += 1;
        }
        Ok(())
    }

    fn decode_partitioned_vop(
        &mut self,
        reader: &mut BitReader,
        picture: &mut Picture,
    ) -> LingResult<()> {
        let total = self.mb_width * self.mb_height;
        let intra_vop = self.state.vop.picture_type == PictureType::I;

        loop {
            let start = self.resync_mb_y * self.mb_width + self.resync_mb_x;
            let count = match self.decode_partitions(reader) {
                Ok(count) => count,
                Err(e) => {
                    warn!("数据分区解码失败: {e}");
                    picture.error_spans.push(ErrorSpan {
                        start_mb: start,
                        end_mb: total,
                        class: if intra_vop {
                            ErrorClass::Whole
                        } else {
                            ErrorClass::Motion
                        },
                    });
                    match self.recover_to_next_packet(reader) {
                        Some(_) => continue,
                        None => return Ok(()),
                    }
                }
            };

            // 纹理段按宏块顺序
            self.first_slice_line = true;
            for i in 0..count {
                let xy = start + i;
                let mb_x = xy % self.mb_width;
                let mb_y = xy / self.mb_width;
                if mb_x == self.resync_mb_x && mb_y == self.resync_mb_y + 1 {
                    self.first_slice_line = false;
                }
                match self.decode_partitioned_mb(reader, mb_x, mb_y) {
                    Ok(mb) => picture.macroblocks[xy] = mb,
                    Err(e) => {
                        // 模式与运动已在分区 A 恢复, 只有纹理损失
                        warn!("分区纹理解码失败: {e}");
                        picture.error_spans.push(ErrorSpan {
                            start_mb: xy,
                            end_mb: start + count,
                            class: ErrorClass::Texture,
                        });
                        break;
                    }
                }
            }

            match self.is_resync(reader) {
                Some(next) if next >= total as i64 => return Ok(()),
                Some(next) if next > 0 => {
                    Self::skip_to_packet_start(reader);
                    if self.decode_video_packet_header(reader).is_err()
                        && self.recover_to_next_packet(reader).is_none()
                    {
                        return Ok(());
                    }
                }
                _ => match self.recover_to_next_packet(reader) {
                    Some(_) => {}
                    None => return Ok(()),
                },
            }
        }
    }

    /// 跳过 resync marker 之前的字节对齐 stuffing
    ///
    /// marker 的零游程从字节边界开始; 对齐后若当前字节是整字节
    /// stuffing (0x7F 形式) 再前进一个字节.
    fn skip_to_packet_start(reader: &mut BitReader) {
        reader.align_to_byte();
        while reader.bits_left() >= 16 && reader.peek_bits(16) != Some(0) {
            reader.skip_bits(8);
        }
    }

    /// 解码出错后逐字节前进找下一个可用的视频分组
    ///
    /// 找到则消费分组头并返回其首宏块号.
    fn recover_to_next_packet(&mut self, reader: &mut BitReader) -> Option<usize> {
        reader.align_to_byte();
        while reader.bits_left() >= 16 + 17 {
            if reader.peek_bits(16) == Some(0) {
                let saved = reader.bit_position();
                match self.decode_video_packet_header(reader) {
                    Ok(mb_num) => return Some(mb_num),
                    Err(_) => reader.seek_to_bit(saved),
                }
            }
            reader.skip_bits(8);
        }
        None
    }

    fn decode_studio_frame(
        &mut self,
        reader: &mut BitReader,
        picture: &mut Picture,
    ) -> LingResult<()> {
        let total = self.mb_width * self.mb_height;
        picture.studio_macroblocks = vec![StudioMacroblock::Dct { blocks: Vec::new() }; total];

        loop {
            let mb_num = self.decode_studio_slice_header(reader)?;
            let mut xy = mb_num;
            loop {
                let (mb, slice_end) = self.decode_studio_mb(reader)?;
                picture.studio_macroblocks[xy] = mb;
                xy += 1;
                if slice_end || xy >= total {
                    break;
                }
            }
            if reader.bits_left() < 32 || reader.peek_bits(32) != Some(studio::SLICE_STARTCODE)
            {
                return Ok(());
            }
        }
    }

    // ========================================================================
    // packed bitstream
    // ========================================================================

    /// 在 DivX packed bitstream 包里找第二个 VOP 起始码
    ///
    /// packed 包形如 [P-VOP][B-VOP]; 后一子图暂存到下一次调用, N-VOP
    /// 占位子图 (vop_coded=0) 不触发拆分.
    fn find_packed_suffix(data: &[u8]) -> Option<usize> {
        let mut seen_vop = false;
        let mut i = 0usize;
        while i + 4 < data.len() {
            if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 && data[i + 3] == 0xB6 {
                if seen_vop && data[i + 4] & 0x40 == 0 {
                    return Some(i);
                }
                seen_vop = true;
                i += 4;
                continue;
            }
            i += 1;
        }
        None
    }
}

impl Default for Mpeg4Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for Mpeg4Decoder {
    fn codec_id(&self) -> CodecId {
        CodecId::Mpeg4
    }

    fn name(&self) -> &str {
        "mpeg4"
    }

    fn open(&mut self, params: &CodecParameters) -> LingResult<()> {
        self.state = HeaderState::new(params.codec_tag);
        if let Some(video) = params.video() {
            self.state.width = video.width;
            self.state.height = video.height;
            self.set_dimensions();
        }
        if !params.extra_data.is_empty() {
            let mut reader = BitReader::new(&params.extra_data);
            match self.state.parse_picture_header(&mut reader, true) {
                Ok(_) => {}
                Err(e) => {
                    // extradata 损坏不致命, VOL 也可能在带内出现
                    warn!("extradata 解析失败: {e}");
                }
            }
            self.set_dimensions();
        }
        Ok(())
    }

    fn send_packet(&mut self, packet: &Packet) -> LingResult<()> {
        if packet.is_empty() {
            self.draining = true;
            return Ok(());
        }

        // 上一包暂存的 packed 子图先解
        if let Some(prev) = self.pending.take() {
            self.decode_frame(&prev, packet)?;
        }

        let data = packet.data.clone();
        let mut head = &data[..];
        if self.state.ident.divx_packed
            && let Some(pos) = Self::find_packed_suffix(&data)
        {
            debug!("packed bitstream: 拆分第二子图 ({pos} 字节处)");
            self.pending = Some(data.slice(pos..));
            head = &data[..pos];
        }
        self.decode_frame(head, packet)
    }

    fn receive_picture(&mut self) -> LingResult<Picture> {
        match self.output.pop_front() {
            Some(picture) => Ok(picture),
            None if self.draining => Err(LingError::Eof),
            None => Err(LingError::NeedMoreData),
        }
    }

    fn flush(&mut self) {
        self.output.clear();
        self.pending = None;
        self.draining = false;
        self.state.timing = header::Timing::default();
        self.state.skipped_last_frame = false;
        self.anchor_progress = None;
        self.publish_progress = None;
    }
}

#[cfg(test)]
mod tests;
