//! 视频分组 (video packet) 重同步
//!
//! resync marker 是字节对齐的零游程加一个终止 1, 零游程长度由帧类型
//! 与 f_code 决定. 宏块解码循环每解完一个宏块就探测一次 marker, 探测
//! 不移动读取位置; 命中后由 `decode_video_packet_header` 消费 marker
//! 并重置预测状态 (resync_mb_x/y 与首行标记).

use log::warn;

use ling_core::{LingError, LingResult};

use super::Mpeg4Decoder;
use super::bitreader::BitReader;
use super::quirks::Workarounds;
use super::tables::RESYNC_PREFIX;
use super::types::{SpriteUsage, VolShape};
use crate::picture::PictureType;

/// 末尾越界按零填充的 peek (缓冲区尾部按零延伸的读取语义)
fn show_bits_padded(reader: &BitReader, n: u8) -> u32 {
    let avail = reader.bits_left().min(n as usize) as u8;
    if avail == 0 {
        return 0;
    }
    reader.peek_bits(avail).unwrap_or(0) << (n - avail)
}

/// mb_num 字段位宽: 覆盖 0..mb_count-1 所需的最少位数, 至少 1 位
fn mb_num_bits(mb_count: usize) -> u8 {
    let v = mb_count.saturating_sub(1) as u32;
    ((32 - v.leading_zeros()) as u8).max(1)
}

impl Mpeg4Decoder {
    /// resync marker 的零游程长度
    pub(super) fn video_packet_prefix_length(&self) -> u32 {
        let vop = &self.state.vop;
        match vop.picture_type {
            PictureType::P | PictureType::S => vop.f_code as u32 + 15,
            PictureType::B => vop.f_code.max(vop.b_code).max(2) as u32 + 15,
            _ => 16,
        }
    }

    /// 探测当前位置是否处于 resync marker (或码流末尾的填充)
    ///
    /// 返回 `None` 表示不是; `Some(next_mb)` 表示下一个分组从宏块
    /// `next_mb` 开始 (末尾填充按宏块总数, marker 损坏按 -1 以便调用
    /// 方无条件结束当前分组). 探测会顺带消耗分组间的 stuffing 码.
    pub(super) fn is_resync(&mut self, reader: &mut BitReader) -> Option<i64> {
        if self.state.workarounds.contains(Workarounds::NO_PADDING)
            && !self.state.vol.resync_marker
        {
            return None;
        }

        let size_in_bits = reader.bit_position() + reader.bits_left();
        let mut bits_count = reader.bit_position();
        let mut v = show_bits_padded(reader, 16);

        // not_coded + MCBPC stuffing (P/S) 或纯 MCBPC stuffing (I) 的
        // 固定前缀: 零游程后一个 1, 总长 8 + 帧类型码
        let pict_code: u32 = match self.state.vop.picture_type {
            PictureType::I => 1,
            PictureType::P => 2,
            PictureType::B => 3,
            PictureType::S => 4,
            PictureType::None => 0,
        };
        while v <= 0xFF {
            if self.state.vop.picture_type == PictureType::B
                || pict_code == 0
                || v >> (8 - pict_code) != 1
                || self.state.partitioned_frame
            {
                break;
            }
            reader.skip_bits(8 + pict_code);
            bits_count += (8 + pict_code) as usize;
            v = show_bits_padded(reader, 16);
        }

        let mb_count = self.mb_width * self.mb_height;
        if bits_count + 8 >= size_in_bits {
            // 末尾: 剩余位全为字节对齐的 stuffing 时按"解完整帧"处理
            let mut v = v >> 8;
            v |= 0x7F >> (7 - (bits_count & 7));
            if v == 0x7F {
                return Some(mb_count as i64);
            }
        } else if v == RESYNC_PREFIX[bits_count & 7] as u32 {
            let saved = reader.bit_position();
            reader.skip_bits(1);
            reader.align_to_byte();

            let mut len = 0u32;
            while len < 32 {
                if reader.read_bit().unwrap_or(false) {
                    break;
                }
                len += 1;
            }

            let mut mb_num = reader
                .read_bits(mb_num_bits(mb_count))
                .map(|x| x as i64)
                .unwrap_or(0);
            if mb_num == 0
                || mb_num > mb_count as i64
                || reader.bit_position() + 6 > size_in_bits
            {
                mb_num = -1;
            }
            reader.seek_to_bit(saved);

            if len >= self.video_packet_prefix_length() {
                return Some(mb_num);
            }
        }
        None
    }

    /// 消费 resync marker 与视频分组头, 重置分组内预测状态
    ///
    /// 返回分组首宏块的序号.
    pub(super) fn decode_video_packet_header(
        &mut self,
        reader: &mut BitReader,
    ) -> LingResult<usize> {
        let size_in_bits = reader.bit_position() + reader.bits_left();
        // 分组头本身至少 20 位
        if reader.bit_position() + 20 > size_in_bits {
            return Err(LingError::InvalidData("视频分组头截断".into()));
        }

        let mut len = 0u32;
        while len < 32 {
            if reader.read_bit().unwrap_or(false) {
                break;
            }
            len += 1;
        }
        if len != self.video_packet_prefix_length() {
            return Err(LingError::InvalidData(format!(
                "resync marker 与 f_code 不符: 零游程 {len}"
            )));
        }

        let shape = self.state.vol.shape;
        let mut header_extension = false;
        if shape != VolShape::Rectangular {
            header_extension = reader
                .read_bit()
                .ok_or_else(|| LingError::InvalidData("视频分组头截断".into()))?;
        }

        let mb_count = self.mb_width * self.mb_height;
        let mb_num = reader
            .read_bits(mb_num_bits(mb_count))
            .ok_or_else(|| LingError::InvalidData("视频分组头截断".into()))?
            as usize;
        if mb_num == 0 || mb_num >= mb_count {
            return Err(LingError::InvalidData(format!(
                "视频分组 mb_num 非法: {mb_num} (共 {mb_count})"
            )));
        }
        self.resync_mb_x = mb_num % self.mb_width;
        self.resync_mb_y = mb_num / self.mb_width;
        self.first_slice_line = true;

        if shape != VolShape::BinaryOnly {
            let qscale = reader
                .read_bits(self.state.vol.quant_precision)
                .ok_or_else(|| LingError::InvalidData("视频分组头截断".into()))?;
            if qscale != 0 {
                self.set_qscale(qscale as i32);
            }
        }

        if shape == VolShape::Rectangular {
            header_extension = reader
                .read_bit()
                .ok_or_else(|| LingError::InvalidData("视频分组头截断".into()))?;
        }

        if header_extension {
            self.decode_packet_header_extension(reader)?;
        }
        if self.state.vol.new_pred {
            self.state.decode_new_pred(reader)?;
        }
        Ok(mb_num)
    }

    /// 分组头扩展: 重复 VOP 头的时间与编码参数字段 (只消费, 不覆盖
    /// VOP 级状态; sprite 轨迹例外, 分组内重新求解)
    fn decode_packet_header_extension(&mut self, reader: &mut BitReader) -> LingResult<()> {
        let err = || LingError::InvalidData("视频分组头扩展截断".into());

        while reader.read_bit().ok_or_else(err)? {} // modulo_time_base
        reader.check_marker("分组头 time_increment 之前");
        reader.skip_bits(self.state.vol.time_increment_bits as u32);
        reader.check_marker("分组头 time_increment 之后");
        reader.skip_bits(2); // vop_coding_type

        if self.state.vol.shape != VolShape::BinaryOnly {
            reader.skip_bits(3); // intra_dc_vlc_threshold
            if self.state.vop.picture_type == PictureType::S
                && self.state.vol.sprite_usage == SpriteUsage::Gmc
            {
                let divx500b413 = self.state.ident.divx_version == 500
                    && self.state.ident.divx_build == 413;
                self.state.sprite = super::sprite::decode_sprite_trajectory(
                    reader,
                    &self.state.vol,
                    self.state.width,
                    self.state.height,
                    divx500b413,
                )?;
                warn!("视频分组头中的 sprite 轨迹: 罕见路径");
            }
            if self.state.vop.picture_type != PictureType::I {
                let f_code = reader.read_bits(3).ok_or_else(err)?;
                if f_code == 0 {
                    warn!("视频分组头损坏 (f_code=0)");
                }
            }
            if self.state.vop.picture_type == PictureType::B {
                let b_code = reader.read_bits(3).ok_or_else(err)?;
                if b_code == 0 {
                    warn!("视频分组头损坏 (b_code=0)");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_decoder() -> Mpeg4Decoder {
        let mut dec = Mpeg4Decoder::new_for_test(6, 5);
        dec.state.vop.picture_type = PictureType::P;
        dec.state.vop.f_code = 1;
        dec
    }

    /// mb_num=7, 30 个宏块 → 5 位字段; P f_code=1 → 零游程 16
    fn packet_bytes(qscale_bits: u8) -> Vec<u8> {
        let mut bits = String::new();
        bits.push_str(&"0".repeat(16));
        bits.push('1');
        bits.push_str("00111"); // mb_num = 7
        bits.push_str(&format!("{:05b}", qscale_bits)); // quant_precision=5
        bits.push('0'); // 无 header_extension
        bits.push_str("101010"); // 后续宏块数据占位
        while bits.len() % 8 != 0 {
            bits.push('0');
        }
        bits.as_bytes()
            .chunks(8)
            .map(|c| {
                c.iter()
                    .fold(0u8, |acc, &b| (acc << 1) | (b - b'0'))
            })
            .collect()
    }

    #[test]
    fn test_分组头解析() {
        let mut dec = mk_decoder();
        let data = packet_bytes(12);
        let mut reader = BitReader::new(&data);
        let mb_num = dec.decode_video_packet_header(&mut reader).unwrap();
        assert_eq!(mb_num, 7);
        assert_eq!((dec.resync_mb_x, dec.resync_mb_y), (1, 1));
        assert!(dec.first_slice_line);
        assert_eq!(dec.qscale, 12);
    }

    #[test]
    fn test_分组头量化为零不覆盖() {
        let mut dec = mk_decoder();
        dec.set_qscale(9);
        let data = packet_bytes(0);
        let mut reader = BitReader::new(&data);
        dec.decode_video_packet_header(&mut reader).unwrap();
        assert_eq!(dec.qscale, 9);
    }

    #[test]
    fn test_零游程与前缀不符() {
        let mut dec = mk_decoder();
        // 只有 10 个零的游程
        let data = [0x00, 0x20, 0x57, 0x00];
        let mut reader = BitReader::new(&data);
        assert!(dec.decode_video_packet_header(&mut reader).is_err());
    }

    #[test]
    fn test_resync_探测命中且不移动() {
        let mut dec = mk_decoder();
        // 字节对齐位置的 marker 前带整字节 stuffing (0x7F)
        let mut data = vec![0x7F];
        data.extend(packet_bytes(12));
        let mut reader = BitReader::new(&data);
        let next = dec.is_resync(&mut reader);
        assert_eq!(next, Some(7));
        assert_eq!(reader.bit_position(), 0);
    }

    #[test]
    fn test_resync_非对齐位置不命中() {
        let mut dec = mk_decoder();
        let mut data = vec![0x7F];
        data.extend(packet_bytes(12));
        let mut reader = BitReader::new(&data);
        reader.skip_bits(3);
        // 偏移 3 位后 stuffing 剩余位与前缀表项不匹配
        assert_eq!(dec.is_resync(&mut reader), None);
    }

    #[test]
    fn test_末尾填充按整帧结束() {
        let mut dec = mk_decoder();
        // 最后一个字节是 0111 1111 形式的 stuffing
        let data = [0x7F];
        let mut reader = BitReader::new(&data);
        assert_eq!(dec.is_resync(&mut reader), Some(30));
    }
}
