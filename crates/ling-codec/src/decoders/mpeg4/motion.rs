//! 运动向量解码与中值预测
//!
//! MVD 用长度前缀 VLC 编码, f_code > 1 时附加精细位; 预测值取左/上/
//! 右上三个 8x8 块 MV 的分量中值, 预测加差分后在 (5 + f_code) 位宽内
//! 模回绕. 8x8 块 MV 网格带一圈零哨兵, 视频分组边界处的可用性规则
//! 与逐行解码一致.

use log::warn;

use super::bitreader::BitReader;
use super::vlc::MVD_VLC;
use crate::picture::MotionVector;

/// 候选 C 相对上一行的块偏移, 按块号索引
const PRED_C_OFF: [isize; 4] = [2, 1, 1, -1];

/// 三数中值
fn mid_pred(a: i16, b: i16, c: i16) -> i16 {
    a.max(b.min(c)).min(b.max(c))
}

/// 在 bits 位宽内做符号回绕 (模解码)
fn sign_extend(value: i32, bits: u8) -> i32 {
    let shift = 32 - bits as u32;
    (value << shift) >> shift
}

/// 解码一个 MVD 分量 (不含预测)
///
/// 返回半像素 (或 1/4 像素) 域的差分值; VLC 非法时返回 `None`.
pub(super) fn decode_mvd(reader: &mut BitReader, f_code: u8) -> Option<i32> {
    let mut code = None;
    for &(len, codeword, value) in MVD_VLC {
        if let Some(bits) = reader.peek_bits(len)
            && bits as u16 == codeword
        {
            reader.skip_bits(len as u32);
            code = Some(value as i32);
            break;
        }
    }
    let code = match code {
        Some(c) => c,
        None => {
            warn!("MVD VLC 解码失败: 字节位置 = {}", reader.byte_position());
            return None;
        }
    };
    if code == 0 {
        return Some(0);
    }

    let sign = reader.read_bit()?;
    let shift = f_code - 1;
    let mut val = code;
    if shift > 0 {
        val = (val - 1) << shift;
        val |= reader.read_bits(shift)? as i32;
        val += 1;
    }
    Some(if sign { -val } else { val })
}

/// 预测值加差分并模回绕
pub(super) fn apply_prediction(mvd: i32, pred: i16, f_code: u8) -> i16 {
    sign_extend(mvd + pred as i32, 5 + f_code) as i16
}

/// 解码一个完整 MV 分量 (差分 + 预测 + 回绕)
pub(super) fn decode_motion(reader: &mut BitReader, pred: i16, f_code: u8) -> Option<i16> {
    let mvd = decode_mvd(reader, f_code)?;
    Some(apply_prediction(mvd, pred, f_code))
}

/// 8x8 块粒度的 MV 网格, 供中值预测与 B 帧直接模式查询
///
/// 左侧与顶部各留一圈零哨兵; 帧内与跳过宏块写入零 MV, 使其作为
/// 预测候选时按零参与.
#[derive(Debug, Clone)]
pub(super) struct MotionGrid {
    stride: usize,
    mv: Vec<MotionVector>,
}

impl MotionGrid {
    pub fn new(mb_width: usize, mb_height: usize) -> Self {
        let stride = mb_width * 2 + 2;
        Self {
            stride,
            mv: vec![MotionVector::default(); stride * (mb_height * 2 + 1)],
        }
    }

    pub fn clear(&mut self) {
        self.mv.fill(MotionVector::default());
    }

    fn index(&self, mb_x: usize, mb_y: usize, block: usize) -> usize {
        let bx = mb_x * 2 + 1 + (block & 1);
        let by = mb_y * 2 + 1 + (block >> 1);
        by * self.stride + bx
    }

    /// 写入宏块的 4 个块 MV (1MV 模式下调用方复制到 4 个)
    pub fn set_mb(&mut self, mb_x: usize, mb_y: usize, mvs: &[MotionVector; 4]) {
        for (block, mv) in mvs.iter().enumerate() {
            let idx = self.index(mb_x, mb_y, block);
            self.mv[idx] = *mv;
        }
    }

    /// 写入单个块 MV (4MV 模式下块间预测依赖前面块的已解码值)
    pub fn set_block(&mut self, mb_x: usize, mb_y: usize, block: usize, mv: MotionVector) {
        let idx = self.index(mb_x, mb_y, block);
        self.mv[idx] = mv;
    }

    /// 帧内/跳过宏块按零 MV 记录
    pub fn zero_mb(&mut self, mb_x: usize, mb_y: usize) {
        self.set_mb(mb_x, mb_y, &[MotionVector::default(); 4]);
    }

    /// 读取块 MV (B 帧直接模式的共定位查询)
    pub fn get(&self, mb_x: usize, mb_y: usize, block: usize) -> MotionVector {
        self.mv[self.index(mb_x, mb_y, block)]
    }

    /// 中值预测
    ///
    /// `first_packet_row` 表示当前宏块行是本视频分组的首行 (上方候选
    /// 不可用), `packet_start_x` 是该分组首个宏块的横坐标 (左侧候选
    /// 的可用边界).
    pub fn predict(
        &self,
        mb_x: usize,
        mb_y: usize,
        block: usize,
        first_packet_row: bool,
        packet_start_x: usize,
    ) -> (i16, i16) {
        let xy = self.index(mb_x, mb_y, block);
        let a = self.mv[xy - 1];

        if first_packet_row && block < 3 {
            match block {
                0 => {
                    if mb_x == packet_start_x {
                        (0, 0)
                    } else if mb_x + 1 == packet_start_x {
                        let c = self.mv[(xy as isize + PRED_C_OFF[block]
                            - self.stride as isize)
                            as usize];
                        if mb_x == 0 {
                            (c.x, c.y)
                        } else {
                            (mid_pred(a.x, 0, c.x), mid_pred(a.y, 0, c.y))
                        }
                    } else {
                        (a.x, a.y)
                    }
                }
                1 => {
                    if mb_x + 1 == packet_start_x {
                        let c = self.mv[(xy as isize + PRED_C_OFF[block]
                            - self.stride as isize)
                            as usize];
                        (mid_pred(a.x, 0, c.x), mid_pred(a.y, 0, c.y))
                    } else {
                        (a.x, a.y)
                    }
                }
                _ => {
                    // block 2: 上方候选在同一宏块内, 始终可用
                    let b = self.mv[xy - self.stride];
                    let c = self.mv
                        [(xy as isize + PRED_C_OFF[block] - self.stride as isize) as usize];
                    let a = if mb_x == packet_start_x {
                        MotionVector::default()
                    } else {
                        a
                    };
                    (mid_pred(a.x, b.x, c.x), mid_pred(a.y, b.y, c.y))
                }
            }
        } else {
            let b = self.mv[xy - self.stride];
            let c =
                self.mv[(xy as isize + PRED_C_OFF[block] - self.stride as isize) as usize];
            (mid_pred(a.x, b.x, c.x), mid_pred(a.y, b.y, c.y))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mvd_零差分() {
        // 码 "1" → 差分 0, 无符号位
        let data = [0b1000_0000];
        let mut reader = BitReader::new(&data);
        assert_eq!(decode_mvd(&mut reader, 1), Some(0));
        assert_eq!(reader.bit_position(), 1);
    }

    #[test]
    fn test_mvd_带精细位() {
        // f_code=2: 码 "01" (值 1) + 符号 0 + 1 位精细位 1
        // val = (1-1)<<1 | 1 + 1 = 2
        let data = [0b0101_0000];
        let mut reader = BitReader::new(&data);
        assert_eq!(decode_mvd(&mut reader, 2), Some(2));
    }

    #[test]
    fn test_模回绕() {
        // f_code=1: 回绕在 6 位宽 [-32, 31]
        assert_eq!(apply_prediction(30, 10, 1), -24);
        assert_eq!(apply_prediction(-30, -10, 1), 24);
        assert_eq!(apply_prediction(5, 3, 1), 8);
    }

    #[test]
    fn test_中值预测候选() {
        let mut grid = MotionGrid::new(4, 4);
        grid.set_mb(0, 0, &[MotionVector { x: 4, y: 2 }; 4]);
        grid.set_mb(1, 0, &[MotionVector { x: 8, y: -2 }; 4]);
        grid.set_mb(2, 0, &[MotionVector { x: 2, y: 6 }; 4]);

        // (1,1) 块 0: A=左(零), B=上 (8,-2), C=右上 (2,6) → 中值 (2, 0)
        let (px, py) = grid.predict(1, 1, 0, false, 0);
        assert_eq!((px, py), (2, 0));
    }

    #[test]
    fn test_分组首行预测退化() {
        let mut grid = MotionGrid::new(4, 4);
        grid.set_mb(0, 1, &[MotionVector { x: 6, y: 4 }; 4]);
        // 分组从 (0,1) 开始, 首行块 0: 分组首宏块 → 预测 0
        assert_eq!(grid.predict(0, 1, 0, true, 0), (0, 0));
        // 同行下一宏块块 0: 只剩左候选
        assert_eq!(grid.predict(1, 1, 0, true, 0), (6, 4));
    }
}
