//! studio 档解码 (simple studio profile)
//!
//! 高位深帧内码流: 宏块要么是 DCT 编码 (上下文相关的 22 类 AC 码,
//! 32 位系数精度), 要么是 DPCM 编码 (Rice 前缀码残差 + 中值空间预测,
//! 用于无损中间格式). 切片以独立起始码 0x1B7 开始, DC 预测器按切片
//! 复位.

use ling_core::{LingError, LingResult};

use super::Mpeg4Decoder;
use super::bitreader::BitReader;
use super::tables::{ALTERNATE_VERTICAL_SCAN, ZIGZAG_SCAN};
use super::vlc;
use crate::picture::StudioMacroblock;

/// studio 切片起始码 (低 32 位)
pub(super) const SLICE_STARTCODE: u32 = 0x0000_01B7;

/// q_scale_type = 1 时的非线性量化阶
const NON_LINEAR_QSCALE: [u8; 32] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 12, 14, 16, 18, 20, 22, 24, 28, 32, 36, 40, 44, 48, 52, 56,
    64, 72, 80, 88, 96, 104, 112,
];

/// 符号折叠: 首位为 0 的码表示负数
fn read_xbits(reader: &mut BitReader, n: u8) -> Option<i32> {
    let v = reader.read_bits(n)? as i32;
    if v >> (n - 1) == 0 {
        Some(v - ((1 << n) - 1))
    } else {
        Some(v)
    }
}

impl Mpeg4Decoder {
    fn studio_block_count(&self) -> usize {
        match self.state.studio.chroma_format {
            3 => 12,
            2 => 8,
            _ => 6,
        }
    }

    fn reset_studio_dc_predictors(&mut self) {
        let studio = &self.state.studio;
        let neutral = 1i32
            << (studio.bits_per_raw_sample + studio.dct_precision + studio.intra_dc_precision
                - 1);
        self.studio_dc = [neutral; 3];
    }

    /// 5 位量化码, q_scale_type 选择线性或非线性阶表
    fn read_studio_qscale(&mut self, reader: &mut BitReader) -> LingResult<()> {
        let code = reader
            .read_bits(5)
            .ok_or_else(|| LingError::InvalidData("studio 量化码截断".into()))?
            as usize;
        let qscale = if self.state.studio.q_scale_type {
            NON_LINEAR_QSCALE[code]
        } else {
            (code << 1) as u8
        };
        self.qscale = qscale.max(1);
        Ok(())
    }

    /// studio 切片头: 起始码 + 宏块号 + 量化 + 可选扩展
    ///
    /// 返回切片首宏块的序号.
    pub(super) fn decode_studio_slice_header(
        &mut self,
        reader: &mut BitReader,
    ) -> LingResult<usize> {
        if reader.bits_left() < 32 || reader.read_bits(32) != Some(SLICE_STARTCODE) {
            return Err(LingError::InvalidData("studio 切片起始码缺失".into()));
        }

        let mb_count = self.mb_width * self.mb_height;
        let len = (usize::BITS - mb_count.leading_zeros()) as u8;
        let mb_num = reader
            .read_bits(len)
            .ok_or_else(|| LingError::InvalidData("studio 切片头截断".into()))?
            as usize;
        if mb_num >= mb_count {
            return Err(LingError::InvalidData(format!(
                "studio 切片宏块号非法: {mb_num} (共 {mb_count})"
            )));
        }
        self.resync_mb_x = mb_num % self.mb_width;
        self.resync_mb_y = mb_num / self.mb_width;

        self.read_studio_qscale(reader)?;

        let err = || LingError::InvalidData("studio 切片头截断".into());
        if reader.read_bit().ok_or_else(err)? {
            reader.skip_bits(1); // intra_slice
            reader.skip_bits(1); // slice_VOP_id_enable
            reader.skip_bits(6); // slice_VOP_id
            while reader.read_bit().ok_or_else(err)? {
                reader.skip_bits(8); // extra_information_slice
            }
        }

        self.reset_studio_dc_predictors();
        Ok(mb_num)
    }

    /// 解码一个 studio 宏块; 返回宏块与切片是否结束
    pub(super) fn decode_studio_mb(
        &mut self,
        reader: &mut BitReader,
    ) -> LingResult<(StudioMacroblock, bool)> {
        let err = || LingError::InvalidData("studio 宏块截断".into());

        let mb = if reader.read_bit().ok_or_else(err)? {
            // DCT 编码; macroblock_type 为 1 或 2 位码
            if !reader.read_bit().ok_or_else(err)? {
                reader.skip_bits(1);
                self.read_studio_qscale(reader)?;
            }
            let mut blocks = Vec::with_capacity(self.studio_block_count());
            for n in 0..self.studio_block_count() {
                blocks.push(self.decode_studio_block(reader, n)?);
            }
            StudioMacroblock::Dct { blocks }
        } else {
            reader.check_marker("DPCM 宏块之前");
            let direction = if reader.read_bit().ok_or_else(err)? {
                -1
            } else {
                1
            };
            let samples = [
                self.decode_dpcm_macroblock(reader, 0)?,
                self.decode_dpcm_macroblock(reader, 1)?,
                self.decode_dpcm_macroblock(reader, 2)?,
            ];
            StudioMacroblock::Dpcm { direction, samples }
        };

        // 切片尾判定: 23 个零位预示下一个起始码, 或码流耗尽
        let left = reader.bits_left();
        if left >= 24 && reader.peek_bits(23) == Some(0) {
            self.next_start_code_studio(reader);
            return Ok((mb, true));
        }
        if left == 0 || (left < 8 && reader.peek_bits(left as u8) == Some(0)) {
            return Ok((mb, true));
        }
        Ok((mb, false))
    }

    /// studio 起始码重对齐: 字节对齐后逐字节找 0x000001 前缀
    fn next_start_code_studio(&mut self, reader: &mut BitReader) {
        reader.align_to_byte();
        while reader.bits_left() >= 24 && reader.peek_bits(24) != Some(1) {
            reader.skip_bits(8);
        }
    }

    fn decode_studio_block(&mut self, reader: &mut BitReader, n: usize) -> LingResult<[i32; 64]> {
        let studio = self.state.studio.clone();
        let bits = studio.bits_per_raw_sample;
        let min = -(1i32 << (bits + 6));
        let max = (1i32 << (bits + 6)) - 1;
        let shift = 3 - studio.dct_precision;
        let scan: &[usize; 64] = if self.state.vop.alternate_scan {
            &ALTERNATE_VERTICAL_SCAN
        } else {
            &ZIGZAG_SCAN
        };

        let mut block = [0i32; 64];
        let mut mismatch = 1i32;

        // DC: 尺寸码 + 符号折叠差分, 分量内跨宏块预测
        let (cc, luma) = if n < 4 { (0, true) } else { ((n & 1) + 1, false) };
        let dc_size = vlc::decode_studio_dc_size(reader, luma)
            .ok_or_else(|| LingError::InvalidData("studio DC 尺寸码损坏".into()))?;
        let dct_diff = if dc_size == 0 {
            0
        } else {
            let diff = read_xbits(reader, dc_size)
                .ok_or_else(|| LingError::InvalidData("studio DC 差分截断".into()))?;
            if dc_size > 8 && !reader.check_marker("dct_dc_size > 8") {
                return Err(LingError::InvalidData("studio DC marker 缺失".into()));
            }
            diff
        };
        self.studio_dc[cc] += dct_diff;

        block[0] = self.studio_dc[cc] * (8 >> studio.intra_dc_precision);
        if !self.state.vol.mpeg_quant {
            block[0] *= 8 >> studio.dct_precision;
        }
        block[0] = block[0].clamp(min, max);
        mismatch ^= block[0];

        let quant_matrix = &self.state.intra_matrix;
        let mut context = 0usize;
        let mut idx = 1usize;
        loop {
            let group = vlc::decode_studio_ac_group(reader, context)
                .ok_or_else(|| LingError::InvalidData("studio AC 类码损坏".into()))?
                as usize;
            let (additional_len, next_context) = vlc::STUDIO_AC_STATE[group];
            context = next_context as usize;

            let j;
            match group {
                0 => break,
                1..=6 => {
                    // 纯零游程
                    let mut run = 1usize << additional_len;
                    if additional_len > 0 {
                        run += reader
                            .read_bits(additional_len)
                            .ok_or_else(|| LingError::InvalidData("studio 游程截断".into()))?
                            as usize;
                    }
                    idx += run;
                    continue;
                }
                7..=12 => {
                    // 零游程 + ±1 电平
                    let code = reader
                        .read_bits(additional_len)
                        .ok_or_else(|| LingError::InvalidData("studio 游程截断".into()))?;
                    let sign = code & 1 != 0;
                    let run = (1usize << (additional_len - 1)) + (code >> 1) as usize;
                    idx += run;
                    if idx > 63 {
                        return Err(LingError::InvalidData("studio AC 游程越界".into()));
                    }
                    j = scan[idx];
                    idx += 1;
                    block[j] = if sign { 1 } else { -1 };
                }
                13..=20 => {
                    if idx > 63 {
                        return Err(LingError::InvalidData("studio AC 游程越界".into()));
                    }
                    j = scan[idx];
                    idx += 1;
                    block[j] = read_xbits(reader, additional_len)
                        .ok_or_else(|| LingError::InvalidData("studio 电平截断".into()))?;
                }
                _ => {
                    // 逃逸: 全长定长码
                    if idx > 63 {
                        return Err(LingError::InvalidData("studio AC 游程越界".into()));
                    }
                    j = scan[idx];
                    idx += 1;
                    let flc_len = bits + studio.dct_precision + 4;
                    let flc = reader
                        .read_bits(flc_len)
                        .ok_or_else(|| LingError::InvalidData("studio 逃逸码截断".into()))?;
                    block[j] = if flc >> (flc_len - 1) != 0 {
                        -(((flc ^ ((1 << flc_len) - 1)) + 1) as i32)
                    } else {
                        flc as i32
                    };
                }
            }
            block[j] = (block[j] * quant_matrix[j] as i32 * self.qscale as i32) * (1 << shift)
                / 16;
            block[j] = block[j].clamp(min, max);
            mismatch ^= block[j];
        }

        // 奇偶校正, 抵消反变换的舍入漂移
        block[63] ^= mismatch & 1;
        Ok(block)
    }

    /// Rice 前缀码 DPCM 样本面, 中值预测
    fn decode_dpcm_macroblock(
        &mut self,
        reader: &mut BitReader,
        component: usize,
    ) -> LingResult<Vec<i16>> {
        let studio = &self.state.studio;
        let bits = studio.bits_per_raw_sample;
        let (w, h) = if component == 0 || studio.chroma_format == 3 {
            (16usize, 16usize)
        } else {
            // 4:2:2 色度: 水平减半
            (8, 16)
        };

        let block_mean = reader
            .read_bits(bits)
            .ok_or_else(|| LingError::InvalidData("DPCM block_mean 截断".into()))?
            as i32;
        if block_mean == 0 {
            return Err(LingError::InvalidData("DPCM block_mean 为零".into()));
        }
        self.studio_dc[component] =
            block_mean << (studio.dct_precision + studio.intra_dc_precision);

        let mut rice_parameter = reader
            .read_bits(4)
            .ok_or_else(|| LingError::InvalidData("DPCM rice_parameter 截断".into()))?
            as u8;
        if rice_parameter == 0 || (rice_parameter > 11 && rice_parameter != 15) {
            return Err(LingError::InvalidData(format!(
                "DPCM rice_parameter 非法: {rice_parameter}"
            )));
        }
        if rice_parameter == 15 {
            rice_parameter = 0;
        }

        let mask = (1i32 << bits) - 1;
        let mut samples = vec![0i16; w * h];
        let mut idx = 0usize;
        for i in 0..h {
            let mut output = 1i32 << (bits - 1);
            let mut top = 1i32 << (bits - 1);
            for _j in 0..w {
                let left = output;
                let topleft = top;

                // 一元前缀, 上限 12; 11 为逃逸, 12 非法
                let mut prefix = 0u32;
                while prefix < 12 {
                    match reader.read_bit() {
                        Some(true) => break,
                        Some(false) => prefix += 1,
                        None => {
                            return Err(LingError::InvalidData("DPCM 前缀码截断".into()));
                        }
                    }
                }
                let mut residual = if prefix == 11 {
                    reader
                        .read_bits(bits)
                        .ok_or_else(|| LingError::InvalidData("DPCM 逃逸码截断".into()))?
                        as i32
                } else {
                    if prefix == 12 {
                        return Err(LingError::InvalidData("DPCM 前缀码非法".into()));
                    }
                    let suffix = if rice_parameter > 0 {
                        reader
                            .read_bits(rice_parameter)
                            .ok_or_else(|| LingError::InvalidData("DPCM 后缀码截断".into()))?
                            as i32
                    } else {
                        0
                    };
                    ((prefix as i32) << rice_parameter) + suffix
                };

                // 奇偶折叠到有符号残差
                residual = if residual & 1 != 0 {
                    -residual >> 1
                } else {
                    residual >> 1
                };

                if i != 0 {
                    top = samples[idx - w] as i32;
                }

                let min_lt = left.min(top);
                let max_lt = left.max(top);
                let p = (left + top - topleft).clamp(min_lt, max_lt);
                let mut p2 = (min_lt.min(topleft) + max_lt.max(topleft)) >> 1;
                if p2 == p {
                    p2 = block_mean;
                }
                if p2 > p {
                    residual = -residual;
                }

                output = (residual + p) & mask;
                samples[idx] = output as i16;
                idx += 1;
            }
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn mk_studio_decoder() -> Mpeg4Decoder {
        let mut dec = Mpeg4Decoder::new_for_test(3, 2);
        dec.state.studio_profile = true;
        dec.state.studio.bits_per_raw_sample = 10;
        dec.state.studio.chroma_format = 2;
        dec.state.studio.dct_precision = 0;
        dec.state.studio.intra_dc_precision = 0;
        dec.reset_studio_dc_predictors();
        dec
    }

    #[test]
    fn test_切片头与dc复位() {
        let mut dec = mk_studio_decoder();
        dec.studio_dc = [7; 3];
        // 起始码 + 宏块号 (6 块 → 3 位) + 量化 "00100" (线性 → 8) + 无扩展
        let bits = format!("{:032b}{}{}0", SLICE_STARTCODE, "010", "00100");
        let data = bits_to_bytes(&bits);
        let mut reader = BitReader::new(&data);
        let mb_num = dec.decode_studio_slice_header(&mut reader).unwrap();
        assert_eq!(mb_num, 2);
        assert_eq!((dec.resync_mb_x, dec.resync_mb_y), (2, 0));
        assert_eq!(dec.qscale, 8);
        assert_eq!(dec.studio_dc, [512; 3]);
    }

    #[test]
    fn test_切片宏块号越界() {
        let mut dec = mk_studio_decoder();
        let bits = format!("{:032b}{}{}0", SLICE_STARTCODE, "111", "00100");
        let data = bits_to_bytes(&bits);
        let mut reader = BitReader::new(&data);
        assert!(dec.decode_studio_slice_header(&mut reader).is_err());
    }

    #[test]
    fn test_studio_dct_块_dc与奇偶校正() {
        let mut dec = mk_studio_decoder();
        dec.qscale = 8;
        // 亮度 DC 尺寸 0 ("100") + 上下文 0 的 EOB (序号 1 → "010")
        let data = bits_to_bytes("100010");
        let mut reader = BitReader::new(&data);
        let block = dec.decode_studio_block(&mut reader, 0).unwrap();
        // DC = 512 * 8 * 8 = 32768 → 钳位上限 65535 内
        assert_eq!(block[0], 32768);
        // mismatch = 1 ^ 32768 为奇数 → block[63] 翻转
        assert_eq!(block[63], 1);
        assert!(block[1..63].iter().all(|&v| v == 0));
    }

    #[test]
    fn test_dpcm_恒定残差零() {
        let mut dec = mk_studio_decoder();
        // block_mean = 512, rice_parameter 15 → 0, 之后每样本前缀 "1" (残差 0)
        let mut bits = format!("{:010b}1111", 512);
        bits.push_str(&"1".repeat(256));
        let data = bits_to_bytes(&bits);
        let mut reader = BitReader::new(&data);
        let samples = dec.decode_dpcm_macroblock(&mut reader, 0).unwrap();
        assert_eq!(samples.len(), 256);
        assert!(samples.iter().all(|&s| s == 512));
        assert_eq!(dec.studio_dc[0], 512);
    }

    #[test]
    fn test_dpcm_禁止的均值与参数() {
        let mut dec = mk_studio_decoder();
        let data = bits_to_bytes(&format!("{:010b}1111", 0));
        let mut reader = BitReader::new(&data);
        assert!(dec.decode_dpcm_macroblock(&mut reader, 0).is_err());

        let data = bits_to_bytes(&format!("{:010b}0000", 512));
        let mut reader = BitReader::new(&data);
        assert!(dec.decode_dpcm_macroblock(&mut reader, 0).is_err());
    }
}
