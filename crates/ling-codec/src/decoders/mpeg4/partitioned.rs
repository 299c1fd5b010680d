//! 数据分区 (data partitioning) 解码
//!
//! 分区模式下一个视频分组分三段: 分区 A 携带全部宏块的模式/量化/DC
//! (I) 或模式/运动向量 (P/S), 以 DC marker 或 motion marker 收尾;
//! 分区 B 补齐 ac_pred/CBPY 与帧内 DC (P 帧); 纹理系数随后按宏块顺序
//! 排列. 重要信息前移, 使纹理段受损时模式与运动仍可恢复.

use ling_core::{LingError, LingResult};

use super::Mpeg4Decoder;
use super::bitreader::BitReader;
use super::block::IntraDcMode;
use super::motion::decode_motion;
use super::tables::DQUANT_TABLE;
use super::types::{MbType, PartialMacroblock, PredictorDirection};
use super::vlc;
use crate::picture::{Macroblock, MbKind, PictureType};

/// I-VOP 分区 A 结束标记 (19 位)
const DC_MARKER: u32 = 0x6B001;
/// P/S-VOP 分区 A 结束标记 (17 位)
const MOTION_MARKER: u32 = 0x1F001;

/// 分区 A 中单个宏块的解码结果
#[derive(PartialEq, Eq)]
enum PartitionStep {
    Mb,
    Marker,
}

impl Mpeg4Decoder {
    /// 解码一个分组的分区 A 与分区 B, 返回分组内宏块数
    ///
    /// 纹理系数留在读取器中, 由调用方按宏块顺序经
    /// [`Self::decode_partitioned_mb`] 消费.
    pub(super) fn decode_partitions(&mut self, reader: &mut BitReader) -> LingResult<usize> {
        let mb_count = self.decode_partition_a(reader)?;
        if mb_count == 0 {
            return Err(LingError::InvalidData("分区 A 为空".into()));
        }
        let start = self.resync_mb_y * self.mb_width + self.resync_mb_x;
        if start + mb_count > self.mb_width * self.mb_height {
            return Err(LingError::InvalidData(format!(
                "分区越过帧尾: 起点 {start} + {mb_count} 个宏块"
            )));
        }

        // 分区 A 与 marker 之间允许 MCBPC stuffing
        if self.state.vop.picture_type == PictureType::I {
            while reader.peek_bits(9) == Some(1) {
                reader.skip_bits(9);
            }
            if reader.read_bits(19) != Some(DC_MARKER) {
                return Err(LingError::InvalidData("I 分区后缺少 DC marker".into()));
            }
        } else {
            while reader.peek_bits(10) == Some(1) {
                reader.skip_bits(10);
            }
            if reader.read_bits(17) != Some(MOTION_MARKER) {
                return Err(LingError::InvalidData("P 分区后缺少 motion marker".into()));
            }
        }

        self.decode_partition_b(reader, mb_count)?;
        Ok(mb_count)
    }

    fn decode_partition_a(&mut self, reader: &mut BitReader) -> LingResult<usize> {
        let intra_vop = self.state.vop.picture_type == PictureType::I;
        let mut mb_count = 0usize;
        let mut mb_x = self.resync_mb_x;
        self.first_slice_line = true;

        for mb_y in self.resync_mb_y..self.mb_height {
            while mb_x < self.mb_width {
                if mb_x == self.resync_mb_x && mb_y == self.resync_mb_y + 1 {
                    self.first_slice_line = false;
                }
                let step = if intra_vop {
                    self.partition_a_i_mb(reader, mb_x, mb_y)?
                } else {
                    self.partition_a_p_mb(reader, mb_x, mb_y)?
                };
                if step == PartitionStep::Marker {
                    return Ok(mb_count);
                }
                mb_count += 1;
                mb_x += 1;
            }
            mb_x = 0;
        }
        Ok(mb_count)
    }

    fn partition_a_i_mb(
        &mut self,
        reader: &mut BitReader,
        mb_x: usize,
        mb_y: usize,
    ) -> LingResult<PartitionStep> {
        let (mb_type, cbpc) = loop {
            if reader.peek_bits(19) == Some(DC_MARKER) {
                return Ok(PartitionStep::Marker);
            }
            match vlc::decode_mcbpc_i(reader) {
                Some((MbType::Stuffing, _)) => continue,
                Some(entry) => break entry,
                None => return Err(self.mb_err("I MCBPC 损坏", mb_x, mb_y)),
            }
        };

        let mut part = PartialMacroblock {
            mb_type,
            cbp: cbpc & 3,
            ..PartialMacroblock::default()
        };
        if mb_type.has_dquant() {
            let code = reader
                .read_bits(2)
                .ok_or_else(|| self.mb_err("码流截断", mb_x, mb_y))? as usize;
            self.set_qscale(self.qscale as i32 + DQUANT_TABLE[code] as i32);
        }
        self.texture.set_mb_qscale(mb_x, mb_y, self.qscale);

        for n in 0..6 {
            let (level, dir) = self.texture.decode_dc(
                reader,
                n,
                mb_x,
                mb_y,
                self.qscale,
                self.first_slice_line,
                self.resync_mb_x,
                self.resync_mb_y,
            )?;
            part.dc_levels[n] = level;
            part.dc_dirs <<= 1;
            if dir == PredictorDirection::Vertical {
                part.dc_dirs |= 1;
            }
        }
        self.partial[mb_y * self.mb_width + mb_x] = part;
        Ok(PartitionStep::Mb)
    }

    fn partition_a_p_mb(
        &mut self,
        reader: &mut BitReader,
        mb_x: usize,
        mb_y: usize,
    ) -> LingResult<PartitionStep> {
        let xy = mb_y * self.mb_width + mb_x;
        let s_gmc = self.is_sgmc();
        let f_code = self.state.vop.f_code;

        let (mb_type, cbpc) = loop {
            if reader.peek_bits(17) == Some(MOTION_MARKER) {
                return Ok(PartitionStep::Marker);
            }
            let skipped = reader
                .read_bit()
                .ok_or_else(|| self.mb_err("码流截断", mb_x, mb_y))?;
            if skipped {
                let mut part = PartialMacroblock {
                    mb_type: MbType::Inter,
                    skipped: true,
                    ..PartialMacroblock::default()
                };
                if s_gmc {
                    part.gmc = true;
                    part.motion = [self.amv(mb_x, mb_y); 4];
                    self.motion.set_mb(mb_x, mb_y, &part.motion);
                } else {
                    self.motion.zero_mb(mb_x, mb_y);
                }
                self.texture.clean_inter_mb(mb_x, mb_y);
                self.partial[xy] = part;
                return Ok(PartitionStep::Mb);
            }
            match vlc::decode_mcbpc_p(reader) {
                // stuffing 丢弃后连 marker 探测与 not_coded 位一起重来
                Some((MbType::Stuffing, _)) => continue,
                Some(entry) => break entry,
                None => return Err(self.mb_err("P MCBPC 损坏", mb_x, mb_y)),
            }
        };

        let mut part = PartialMacroblock {
            mb_type,
            cbp: cbpc & 3,
            ..PartialMacroblock::default()
        };

        if mb_type.is_intra() {
            // DC 与 dquant 在分区 B
            self.motion.zero_mb(mb_x, mb_y);
        } else {
            self.texture.clean_inter_mb(mb_x, mb_y);
            if mb_type == MbType::Inter4V {
                for n in 0..4 {
                    let (px, py) =
                        self.motion
                            .predict(mb_x, mb_y, n, self.first_slice_line, self.resync_mb_x);
                    let mx = decode_motion(reader, px, f_code)
                        .ok_or_else(|| self.mb_err("MVD 损坏", mb_x, mb_y))?;
                    let my = decode_motion(reader, py, f_code)
                        .ok_or_else(|| self.mb_err("MVD 损坏", mb_x, mb_y))?;
                    let mv = crate::picture::MotionVector { x: mx, y: my };
                    part.motion[n] = mv;
                    self.motion.set_block(mb_x, mb_y, n, mv);
                }
            } else {
                let mcsel = if s_gmc {
                    reader
                        .read_bit()
                        .ok_or_else(|| self.mb_err("码流截断", mb_x, mb_y))?
                } else {
                    false
                };
                let mv = if mcsel {
                    part.gmc = true;
                    self.amv(mb_x, mb_y)
                } else {
                    let (px, py) =
                        self.motion
                            .predict(mb_x, mb_y, 0, self.first_slice_line, self.resync_mb_x);
                    let mx = decode_motion(reader, px, f_code)
                        .ok_or_else(|| self.mb_err("MVD 损坏", mb_x, mb_y))?;
                    let my = decode_motion(reader, py, f_code)
                        .ok_or_else(|| self.mb_err("MVD 损坏", mb_x, mb_y))?;
                    crate::picture::MotionVector { x: mx, y: my }
                };
                part.motion = [mv; 4];
                self.motion.set_mb(mb_x, mb_y, &part.motion);
            }
        }
        self.partial[xy] = part;
        Ok(PartitionStep::Mb)
    }

    fn decode_partition_b(&mut self, reader: &mut BitReader, mb_count: usize) -> LingResult<()> {
        let intra_vop = self.state.vop.picture_type == PictureType::I;
        let mut done = 0usize;
        let mut mb_x = self.resync_mb_x;
        let mut mb_y = self.resync_mb_y;
        self.first_slice_line = true;

        while done < mb_count {
            while mb_x < self.mb_width && done < mb_count {
                if mb_x == self.resync_mb_x && mb_y == self.resync_mb_y + 1 {
                    self.first_slice_line = false;
                }
                let xy = mb_y * self.mb_width + mb_x;

                if intra_vop {
                    let ac_pred = reader
                        .read_bit()
                        .ok_or_else(|| self.mb_err("码流截断", mb_x, mb_y))?;
                    let cbpy = vlc::decode_cbpy(reader, true)
                        .ok_or_else(|| self.mb_err("I CBPY 损坏", mb_x, mb_y))?;
                    self.partial[xy].cbp |= cbpy << 2;
                    self.partial[xy].ac_pred = ac_pred;
                } else if self.partial[xy].mb_type.is_intra() {
                    let ac_pred = reader
                        .read_bit()
                        .ok_or_else(|| self.mb_err("码流截断", mb_x, mb_y))?;
                    let cbpy = vlc::decode_cbpy(reader, true)
                        .ok_or_else(|| self.mb_err("I CBPY 损坏", mb_x, mb_y))?;
                    if self.partial[xy].mb_type.has_dquant() {
                        let code = reader
                            .read_bits(2)
                            .ok_or_else(|| self.mb_err("码流截断", mb_x, mb_y))?
                            as usize;
                        self.set_qscale(self.qscale as i32 + DQUANT_TABLE[code] as i32);
                    }
                    self.texture.set_mb_qscale(mb_x, mb_y, self.qscale);

                    for n in 0..6 {
                        let (level, dir) = self.texture.decode_dc(
                            reader,
                            n,
                            mb_x,
                            mb_y,
                            self.qscale,
                            self.first_slice_line,
                            self.resync_mb_x,
                            self.resync_mb_y,
                        )?;
                        self.partial[xy].dc_levels[n] = level;
                        self.partial[xy].dc_dirs <<= 1;
                        if dir == PredictorDirection::Vertical {
                            self.partial[xy].dc_dirs |= 1;
                        }
                    }
                    self.partial[xy].cbp = (self.partial[xy].cbp & 3) | (cbpy << 2);
                    self.partial[xy].ac_pred = ac_pred;
                } else if self.partial[xy].skipped {
                    self.texture.set_mb_qscale(mb_x, mb_y, self.qscale);
                    self.partial[xy].cbp = 0;
                } else {
                    let cbpy = vlc::decode_cbpy(reader, false)
                        .ok_or_else(|| self.mb_err("P CBPY 损坏", mb_x, mb_y))?;
                    if self.partial[xy].mb_type.has_dquant() {
                        let code = reader
                            .read_bits(2)
                            .ok_or_else(|| self.mb_err("码流截断", mb_x, mb_y))?
                            as usize;
                        self.set_qscale(self.qscale as i32 + DQUANT_TABLE[code] as i32);
                    }
                    self.texture.set_mb_qscale(mb_x, mb_y, self.qscale);
                    self.partial[xy].cbp = (self.partial[xy].cbp & 3) | (cbpy << 2);
                }

                done += 1;
                mb_x += 1;
            }
            mb_x = 0;
            mb_y += 1;
        }
        Ok(())
    }

    /// 纹理段: 按宏块顺序消费 AC 系数 (帧内且 DC 随纹理编码时含 DC)
    pub(super) fn decode_partitioned_mb(
        &mut self,
        reader: &mut BitReader,
        mb_x: usize,
        mb_y: usize,
    ) -> LingResult<Macroblock> {
        let xy = mb_y * self.mb_width + mb_x;
        let part = self.partial[xy].clone();
        let rvlc = self.state.vol.rvlc;
        let alternate_scan = self.state.vop.alternate_scan;

        // DC VLC 选择用分组当前量化参数, 宏块自身的量化随后生效
        let use_dc_vlc = self.qscale < self.state.vop.intra_dc_threshold;
        let mb_qscale = self.texture.mb_qscale(mb_x, mb_y);
        if mb_qscale != self.qscale && mb_qscale != 0 {
            self.set_qscale(mb_qscale as i32);
        }

        let mut mb = Macroblock {
            quant: self.qscale,
            cbp: part.cbp,
            motion: part.motion,
            ..Macroblock::default()
        };

        if part.skipped {
            mb.kind = if part.gmc {
                MbKind::Gmc
            } else {
                MbKind::Skipped
            };
            return Ok(mb);
        }

        if part.mb_type.is_intra() {
            mb.kind = MbKind::Intra {
                ac_pred: part.ac_pred,
            };
            for n in 0..6 {
                let coded = part.cbp & (1 << (5 - n)) != 0;
                let dc_mode = if use_dc_vlc {
                    IntraDcMode::Predecoded {
                        level: part.dc_levels[n],
                        dir: if part.dc_dirs & (1 << (5 - n)) != 0 {
                            PredictorDirection::Vertical
                        } else {
                            PredictorDirection::Horizontal
                        },
                    }
                } else {
                    IntraDcMode::InBand
                };
                self.texture.decode_intra_block(
                    reader,
                    &mut mb.blocks[n],
                    n,
                    mb_x,
                    mb_y,
                    coded,
                    dc_mode,
                    part.ac_pred,
                    rvlc,
                    alternate_scan,
                    self.qscale,
                    self.first_slice_line,
                    self.resync_mb_x,
                    self.resync_mb_y,
                )?;
            }
        } else {
            mb.kind = if part.gmc {
                MbKind::Gmc
            } else {
                MbKind::Inter {
                    four_mv: part.mb_type == MbType::Inter4V,
                    field: false,
                }
            };
            for n in 0..6 {
                if part.cbp & (1 << (5 - n)) != 0 {
                    self.texture.decode_inter_block(
                        reader,
                        &mut mb.blocks[n],
                        rvlc,
                        alternate_scan,
                        mb_x,
                        mb_y,
                    )?;
                }
            }
        }
        Ok(mb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picture::MotionVector;

    fn bits_to_bytes(bits: &str) -> Vec<u8> {
        let mut padded = bits.to_string();
        while padded.len() % 8 != 0 {
            padded.push('0');
        }
        padded
            .as_bytes()
            .chunks(8)
            .map(|c| c.iter().fold(0u8, |acc, &b| (acc << 1) | (b - b'0')))
            .collect()
    }

    #[test]
    fn test_p_分区_全跳过() {
        let mut dec = Mpeg4Decoder::new_for_test(3, 2);
        dec.state.vop.picture_type = PictureType::P;
        dec.state.vop.f_code = 1;
        dec.set_qscale(6);

        // 两个 not_coded 宏块 + motion marker; 分区 B 对跳过宏块无码字
        let bits = format!("11{:017b}", MOTION_MARKER);
        let data = bits_to_bytes(&bits);
        let mut reader = BitReader::new(&data);

        let count = dec.decode_partitions(&mut reader).unwrap();
        assert_eq!(count, 2);
        assert!(dec.partial[0].skipped);
        assert!(dec.partial[1].skipped);

        let mb = dec.decode_partitioned_mb(&mut reader, 0, 0).unwrap();
        assert_eq!(mb.kind, MbKind::Skipped);
        assert_eq!(mb.quant, 6);
        assert_eq!(mb.motion[0], MotionVector::default());
    }

    #[test]
    fn test_i_分区_空分区报错() {
        let mut dec = Mpeg4Decoder::new_for_test(3, 2);
        dec.state.vop.picture_type = PictureType::I;

        // 码流直接以 DC marker 开始 → 分区 A 无宏块
        let bits = format!("{:019b}", DC_MARKER);
        let data = bits_to_bytes(&bits);
        let mut reader = BitReader::new(&data);
        assert!(dec.decode_partitions(&mut reader).is_err());
    }

    #[test]
    fn test_p_分区_marker缺失报错() {
        let mut dec = Mpeg4Decoder::new_for_test(2, 1);
        dec.state.vop.picture_type = PictureType::P;

        // 两个跳过宏块后没有 motion marker, 只有零填充
        let data = bits_to_bytes("1100000000000000000");
        let mut reader = BitReader::new(&data);
        assert!(dec.decode_partitions(&mut reader).is_err());
    }
}
