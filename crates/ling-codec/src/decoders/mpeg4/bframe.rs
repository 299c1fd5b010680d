//! B-VOP 宏块解码
//!
//! B 帧宏块不含帧内块; MV 预测不走中值网格, 而是同一宏块行内上一个
//! 显式 MV (last_mv, 每行行首清零). 直接模式的 MV 由未来锚点图像中
//! 共定位宏块的 MV 按 TRB/TRD 时距缩放得到, 共定位宏块被跳过时本
//! 宏块也跳过.

use ling_core::LingResult;

use super::Mpeg4Decoder;
use super::bitreader::BitReader;
use super::motion::decode_motion;
use super::types::BframeMbMode;
use super::vlc;
use crate::picture::{Macroblock, MbKind, MotionVector};

fn has_forward(mode: BframeMbMode) -> bool {
    matches!(mode, BframeMbMode::Forward | BframeMbMode::Interpolate)
}

fn has_backward(mode: BframeMbMode) -> bool {
    matches!(mode, BframeMbMode::Backward | BframeMbMode::Interpolate)
}

impl Mpeg4Decoder {
    /// 解码 B-VOP 宏块
    pub(super) fn decode_b_mb(
        &mut self,
        reader: &mut BitReader,
        mb_x: usize,
        mb_y: usize,
    ) -> LingResult<Macroblock> {
        let xy = mb_y * self.mb_width + mb_x;
        if mb_x == 0 {
            self.last_mv = [[[0; 2]; 2]; 2];
            if let Some(progress) = &self.anchor_progress {
                progress.wait_for(mb_y);
            }
        }

        // 未来锚点中共定位宏块被跳过时本宏块也跳过 (GMC 跳过不算)
        if self.next_skip[xy] {
            return Ok(Macroblock {
                kind: MbKind::Skipped,
                quant: self.qscale,
                ..Macroblock::default()
            });
        }

        let f_code = self.state.vop.f_code;
        let b_code = self.state.vop.b_code;
        let (mb_type_present, cbp_present) = vlc::decode_modb(reader);

        let mut mb = Macroblock::default();
        let mut cbp = 0u8;
        let mut mode = BframeMbMode::DirectNoneMv;
        let mut field = false;

        if mb_type_present {
            mode = vlc::decode_b_mb_type(reader);
            if cbp_present {
                cbp = reader
                    .read_bits(6)
                    .ok_or_else(|| self.mb_err("码流截断", mb_x, mb_y))? as u8;
            }
            let direct = matches!(mode, BframeMbMode::Direct | BframeMbMode::DirectNoneMv);
            if !direct && cbp != 0 {
                let dbquant = vlc::decode_dbquant(reader);
                self.set_qscale(self.qscale as i32 + dbquant);
            }
            if !self.state.progressive_sequence {
                if cbp != 0 {
                    let _interlaced_dct = reader.read_bit();
                }
                if !direct
                    && reader
                        .read_bit()
                        .ok_or_else(|| self.mb_err("码流截断", mb_x, mb_y))?
                {
                    field = true;
                    if has_forward(mode) {
                        let _field_select = (reader.read_bit(), reader.read_bit());
                    }
                    if has_backward(mode) {
                        let _field_select = (reader.read_bit(), reader.read_bit());
                    }
                }
            }

            if !direct && !field {
                if has_forward(mode) {
                    let mx = decode_motion(reader, self.last_mv[0][0][0], f_code)
                        .ok_or_else(|| self.mb_err("B 前向 MVD 损坏", mb_x, mb_y))?;
                    let my = decode_motion(reader, self.last_mv[0][0][1], f_code)
                        .ok_or_else(|| self.mb_err("B 前向 MVD 损坏", mb_x, mb_y))?;
                    self.last_mv[0] = [[mx, my]; 2];
                    mb.motion = [MotionVector { x: mx, y: my }; 4];
                }
                if has_backward(mode) {
                    let mx = decode_motion(reader, self.last_mv[1][0][0], b_code)
                        .ok_or_else(|| self.mb_err("B 后向 MVD 损坏", mb_x, mb_y))?;
                    let my = decode_motion(reader, self.last_mv[1][0][1], b_code)
                        .ok_or_else(|| self.mb_err("B 后向 MVD 损坏", mb_x, mb_y))?;
                    self.last_mv[1] = [[mx, my]; 2];
                    mb.motion_backward = [MotionVector { x: mx, y: my }; 4];
                }
            } else if !direct {
                // 场预测: 每方向两个场 MV, 垂直预测折半, 历史按帧单位记录
                if has_forward(mode) {
                    for i in 0..2 {
                        let mx = decode_motion(reader, self.last_mv[0][i][0], f_code)
                            .ok_or_else(|| self.mb_err("B 场 MVD 损坏", mb_x, mb_y))?;
                        let my = decode_motion(reader, self.last_mv[0][i][1] / 2, f_code)
                            .ok_or_else(|| self.mb_err("B 场 MVD 损坏", mb_x, mb_y))?;
                        self.last_mv[0][i] = [mx, my * 2];
                        mb.motion[i] = MotionVector { x: mx, y: my };
                    }
                }
                if has_backward(mode) {
                    for i in 0..2 {
                        let mx = decode_motion(reader, self.last_mv[1][i][0], b_code)
                            .ok_or_else(|| self.mb_err("B 场 MVD 损坏", mb_x, mb_y))?;
                        let my = decode_motion(reader, self.last_mv[1][i][1] / 2, b_code)
                            .ok_or_else(|| self.mb_err("B 场 MVD 损坏", mb_x, mb_y))?;
                        self.last_mv[1][i] = [mx, my * 2];
                        mb.motion_backward[i] = MotionVector { x: mx, y: my };
                    }
                }
            }
        }

        mb.kind = match mode {
            BframeMbMode::Forward => MbKind::BForward,
            BframeMbMode::Backward => MbKind::BBackward,
            BframeMbMode::Interpolate => MbKind::BInterpolate,
            BframeMbMode::Direct | BframeMbMode::DirectNoneMv => MbKind::BDirect,
        };

        if matches!(mode, BframeMbMode::Direct | BframeMbMode::DirectNoneMv) {
            let (dx, dy) = if mode == BframeMbMode::DirectNoneMv {
                (0, 0)
            } else {
                let dx = decode_motion(reader, 0, 1)
                    .ok_or_else(|| self.mb_err("直接模式 MVD 损坏", mb_x, mb_y))?;
                let dy = decode_motion(reader, 0, 1)
                    .ok_or_else(|| self.mb_err("直接模式 MVD 损坏", mb_x, mb_y))?;
                (dx, dy)
            };
            self.set_direct_mv(mb_x, mb_y, dx as i32, dy as i32, &mut mb);
        }

        mb.quant = self.qscale;
        mb.cbp = cbp;
        for n in 0..6 {
            if cbp & (1 << (5 - n)) != 0 {
                self.texture.decode_inter_block(
                    reader,
                    &mut mb.blocks[n],
                    false,
                    self.state.vop.alternate_scan,
                    mb_x,
                    mb_y,
                )?;
            }
        }
        Ok(mb)
    }

    /// 直接模式: 共定位 MV 按 TRB/TRD 缩放, 加增量后求反向分量
    ///
    /// 增量分量为零时反向分量用 (TRB - TRD) 缩放式, 非零时用差式;
    /// 两式在增量为零时等价, 但整数截断方向不同, 不可合并.
    fn set_direct_mv(
        &mut self,
        mb_x: usize,
        mb_y: usize,
        dx: i32,
        dy: i32,
        mb: &mut Macroblock,
    ) {
        let xy = mb_y * self.mb_width + mb_x;
        let time_pp = (self.state.timing.pp_time as i32).max(1);
        let time_pb = self.state.timing.pb_time as i32;
        let four = self.next_four_mv[xy];

        mb.kind = MbKind::BDirect;
        for n in 0..4 {
            let col = self.next_motion.get(mb_x, mb_y, if four { n } else { 0 });
            let fx = col.x as i32 * time_pb / time_pp + dx;
            let fy = col.y as i32 * time_pb / time_pp + dy;
            let bx = if dx != 0 {
                fx - col.x as i32
            } else {
                col.x as i32 * (time_pb - time_pp) / time_pp
            };
            let by = if dy != 0 {
                fy - col.y as i32
            } else {
                col.y as i32 * (time_pb - time_pp) / time_pp
            };
            mb.motion[n] = MotionVector {
                x: fx as i16,
                y: fy as i16,
            };
            mb.motion_backward[n] = MotionVector {
                x: bx as i16,
                y: by as i16,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picture::PictureType;

    fn mk_decoder() -> Mpeg4Decoder {
        let mut dec = Mpeg4Decoder::new_for_test(2, 1);
        dec.state.vop.picture_type = PictureType::B;
        dec.state.timing.pp_time = 4;
        dec.state.timing.pb_time = 1;
        dec
    }

    #[test]
    fn test_直接模式时距缩放() {
        let mut dec = mk_decoder();
        dec.next_motion
            .set_mb(0, 0, &[MotionVector { x: 8, y: -4 }; 4]);

        let mut mb = Macroblock::default();
        dec.set_direct_mv(0, 0, 0, 0, &mut mb);
        // TRB/TRD = 1/4: 前向 8*1/4 = 2, 反向 8*(1-4)/4 = -6
        assert_eq!(mb.motion[0], MotionVector { x: 2, y: -1 });
        assert_eq!(mb.motion_backward[0], MotionVector { x: -6, y: 3 });

        // 增量非零时反向用差式: fx = 2+2 = 4, bx = 4-8 = -4
        let mut mb = Macroblock::default();
        dec.set_direct_mv(0, 0, 2, 0, &mut mb);
        assert_eq!(mb.motion[0], MotionVector { x: 4, y: -1 });
        assert_eq!(mb.motion_backward[0], MotionVector { x: -4, y: 3 });
    }

    #[test]
    fn test_共定位跳过宏块不读码流() {
        let mut dec = mk_decoder();
        dec.next_skip[1] = true;

        let mut reader = BitReader::new(&[]);
        let mb = dec.decode_b_mb(&mut reader, 1, 0).unwrap();
        assert_eq!(mb.kind, MbKind::Skipped);
    }
}
