//! I/P/S-VOP 宏块解码 (非数据分区路径)
//!
//! 每个宏块按 not_coded / MCBPC / CBPY / DQUANT / MV / 纹理块的顺序
//! 解码; MCBPC stuffing 丢弃后整个序列重来 (P-VOP 中 not_coded 位也
//! 要重读). S-VOP 的 GMC 宏块不携带 MVD, 运动向量由 sprite 几何推出.

use ling_core::{LingError, LingResult};

use super::Mpeg4Decoder;
use super::bitreader::BitReader;
use super::block::IntraDcMode;
use super::motion::decode_motion;
use super::quirks::Workarounds;
use super::sprite::gmc_motion_vector;
use super::tables::DQUANT_TABLE;
use super::types::{MbType, SpriteUsage};
use super::vlc;
use crate::picture::{Macroblock, MbKind, MotionVector, PictureType};

impl Mpeg4Decoder {
    /// 量化参数更新, 钳位到 1..=31
    pub(super) fn set_qscale(&mut self, qscale: i32) {
        self.qscale = qscale.clamp(1, 31) as u8;
    }

    pub(super) fn mb_err(&self, what: &str, mb_x: usize, mb_y: usize) -> LingError {
        LingError::InvalidData(format!("{what}: 宏块 ({mb_x}, {mb_y})"))
    }

    pub(super) fn is_sgmc(&self) -> bool {
        self.state.vop.picture_type == PictureType::S
            && self.state.vol.sprite_usage == SpriteUsage::Gmc
    }

    pub(super) fn amv(&self, mb_x: usize, mb_y: usize) -> MotionVector {
        let (x, y) = gmc_motion_vector(
            &self.state.sprite,
            self.state.vol.sprite_warping_accuracy,
            self.state.vol.quarter_sample,
            mb_x,
            mb_y,
        );
        MotionVector { x, y }
    }

    /// 解码 I-VOP 宏块
    pub(super) fn decode_i_mb(
        &mut self,
        reader: &mut BitReader,
        mb_x: usize,
        mb_y: usize,
    ) -> LingResult<Macroblock> {
        let (mb_type, cbpc) = loop {
            match vlc::decode_mcbpc_i(reader) {
                Some((MbType::Stuffing, _)) => continue,
                Some(entry) => break entry,
                None => return Err(self.mb_err("I MCBPC 损坏", mb_x, mb_y)),
            }
        };
        self.decode_intra_mb_body(reader, mb_x, mb_y, cbpc, mb_type.has_dquant())
    }

    /// 帧内宏块公共尾部 (I-VOP 以及 P/S-VOP 中的帧内宏块)
    fn decode_intra_mb_body(
        &mut self,
        reader: &mut BitReader,
        mb_x: usize,
        mb_y: usize,
        cbpc: u8,
        dquant: bool,
    ) -> LingResult<Macroblock> {
        let ac_pred = reader
            .read_bit()
            .ok_or_else(|| self.mb_err("码流截断", mb_x, mb_y))?;
        let cbpy = vlc::decode_cbpy(reader, true)
            .ok_or_else(|| self.mb_err("I CBPY 损坏", mb_x, mb_y))?;
        let cbp = (cbpc & 3) | (cbpy << 2);

        // DC VLC 的选择用 DQUANT 之前的量化参数
        let use_dc_vlc = self.qscale < self.state.vop.intra_dc_threshold;
        if dquant {
            let code = reader
                .read_bits(2)
                .ok_or_else(|| self.mb_err("码流截断", mb_x, mb_y))? as usize;
            self.set_qscale(self.qscale as i32 + DQUANT_TABLE[code] as i32);
        }
        if !self.state.progressive_sequence {
            let _interlaced_dct = reader.read_bit();
        }

        self.texture.set_mb_qscale(mb_x, mb_y, self.qscale);
        self.motion.zero_mb(mb_x, mb_y);

        let mut mb = Macroblock {
            kind: MbKind::Intra { ac_pred },
            quant: self.qscale,
            cbp,
            ..Macroblock::default()
        };
        let dc_mode = if use_dc_vlc {
            IntraDcMode::Vlc
        } else {
            IntraDcMode::InBand
        };
        for n in 0..6 {
            let coded = cbp & (1 << (5 - n)) != 0;
            self.texture.decode_intra_block(
                reader,
                &mut mb.blocks[n],
                n,
                mb_x,
                mb_y,
                coded,
                dc_mode,
                ac_pred,
                false,
                self.state.vop.alternate_scan,
                self.qscale,
                self.first_slice_line,
                self.resync_mb_x,
                self.resync_mb_y,
            )?;
        }
        Ok(mb)
    }

    /// 解码 P/S-VOP 宏块
    pub(super) fn decode_p_mb(
        &mut self,
        reader: &mut BitReader,
        mb_x: usize,
        mb_y: usize,
    ) -> LingResult<Macroblock> {
        let s_gmc = self.is_sgmc();
        let f_code = self.state.vop.f_code;

        let (mb_type, cbpc) = loop {
            let skipped = reader
                .read_bit()
                .ok_or_else(|| self.mb_err("码流截断", mb_x, mb_y))?;
            if skipped {
                let mut mb = Macroblock {
                    quant: self.qscale,
                    ..Macroblock::default()
                };
                self.texture.set_mb_qscale(mb_x, mb_y, self.qscale);
                self.texture.clean_inter_mb(mb_x, mb_y);
                if s_gmc {
                    // GMC 跳过宏块不是真正的 skip, 仍按全局运动补偿
                    let mv = self.amv(mb_x, mb_y);
                    mb.kind = MbKind::Gmc;
                    mb.motion = [mv; 4];
                    self.motion.set_mb(mb_x, mb_y, &mb.motion);
                } else {
                    mb.kind = MbKind::Skipped;
                    self.motion.zero_mb(mb_x, mb_y);
                }
                return Ok(mb);
            }
            match vlc::decode_mcbpc_p(reader) {
                Some((MbType::Stuffing, _)) => continue,
                Some(entry) => break entry,
                None => return Err(self.mb_err("P MCBPC 损坏", mb_x, mb_y)),
            }
        };

        if mb_type.is_intra() {
            return self.decode_intra_mb_body(reader, mb_x, mb_y, cbpc, mb_type.has_dquant());
        }

        let mut mcsel = false;
        if s_gmc && mb_type != MbType::Inter4V {
            mcsel = reader
                .read_bit()
                .ok_or_else(|| self.mb_err("码流截断", mb_x, mb_y))?;
        }
        let cbpy = vlc::decode_cbpy(reader, false)
            .ok_or_else(|| self.mb_err("P CBPY 损坏", mb_x, mb_y))?;
        let cbp = (cbpc & 3) | (cbpy << 2);
        if mb_type.has_dquant() {
            let code = reader
                .read_bits(2)
                .ok_or_else(|| self.mb_err("码流截断", mb_x, mb_y))? as usize;
            self.set_qscale(self.qscale as i32 + DQUANT_TABLE[code] as i32);
        }
        self.texture.set_mb_qscale(mb_x, mb_y, self.qscale);
        if !self.state.progressive_sequence
            && (cbp != 0 || self.state.workarounds.contains(Workarounds::XVID_ILACE))
        {
            let _interlaced_dct = reader
                .read_bit()
                .ok_or_else(|| self.mb_err("码流截断", mb_x, mb_y))?;
        }

        let mut mb = Macroblock {
            quant: self.qscale,
            cbp,
            ..Macroblock::default()
        };

        if mb_type == MbType::Inter4V {
            for n in 0..4 {
                let (px, py) =
                    self.motion
                        .predict(mb_x, mb_y, n, self.first_slice_line, self.resync_mb_x);
                let mx = decode_motion(reader, px, f_code)
                    .ok_or_else(|| self.mb_err("MVD 损坏", mb_x, mb_y))?;
                let my = decode_motion(reader, py, f_code)
                    .ok_or_else(|| self.mb_err("MVD 损坏", mb_x, mb_y))?;
                let mv = MotionVector { x: mx, y: my };
                mb.motion[n] = mv;
                self.motion.set_block(mb_x, mb_y, n, mv);
            }
            mb.kind = MbKind::Inter {
                four_mv: true,
                field: false,
            };
        } else if mcsel {
            let mv = self.amv(mb_x, mb_y);
            mb.kind = MbKind::Gmc;
            mb.motion = [mv; 4];
            self.motion.set_mb(mb_x, mb_y, &mb.motion);
        } else if !self.state.progressive_sequence
            && reader
                .read_bit()
                .ok_or_else(|| self.mb_err("码流截断", mb_x, mb_y))?
        {
            // 16x8 场预测: 两个场 MV, 垂直预测值折半
            let _field_select_top = reader.read_bit();
            let _field_select_bottom = reader.read_bit();
            let (px, py) =
                self.motion
                    .predict(mb_x, mb_y, 0, self.first_slice_line, self.resync_mb_x);
            let mut field_mv = [MotionVector::default(); 2];
            for entry in &mut field_mv {
                let mx = decode_motion(reader, px, f_code)
                    .ok_or_else(|| self.mb_err("场 MVD 损坏", mb_x, mb_y))?;
                let my = decode_motion(reader, py / 2, f_code)
                    .ok_or_else(|| self.mb_err("场 MVD 损坏", mb_x, mb_y))?;
                *entry = MotionVector { x: mx, y: my };
            }
            mb.kind = MbKind::Inter {
                four_mv: false,
                field: true,
            };
            mb.motion[0] = field_mv[0];
            mb.motion[1] = field_mv[1];
            // 预测网格记录两场均值, 向奇数归整
            let sx = field_mv[0].x + field_mv[1].x;
            let sy = field_mv[0].y + field_mv[1].y;
            let avg = MotionVector {
                x: (sx >> 1) | (sx & 1),
                y: (sy >> 1) | (sy & 1),
            };
            self.motion.set_mb(mb_x, mb_y, &[avg; 4]);
        } else {
            let (px, py) =
                self.motion
                    .predict(mb_x, mb_y, 0, self.first_slice_line, self.resync_mb_x);
            let mx = decode_motion(reader, px, f_code)
                .ok_or_else(|| self.mb_err("MVD 损坏", mb_x, mb_y))?;
            let my = decode_motion(reader, py, f_code)
                .ok_or_else(|| self.mb_err("MVD 损坏", mb_x, mb_y))?;
            let mv = MotionVector { x: mx, y: my };
            mb.kind = MbKind::Inter {
                four_mv: false,
                field: false,
            };
            mb.motion = [mv; 4];
            self.motion.set_mb(mb_x, mb_y, &[mv; 4]);
        }

        self.texture.clean_inter_mb(mb_x, mb_y);
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
}
