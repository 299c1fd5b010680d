//! 纹理块解码: DC/AC 预测网格与 8x8 系数块的熵解码
//!
//! DC 预测在 8x8 块粒度的网格上进行 (亮度网格 2*mb_width 宽, 色度
//! 每宏块一项), 左/左上/上三个邻居值带一圈 1024 哨兵; AC 预测网格
//! 每块存 16 个值 (1..=7 为左列, 9..=15 为上行). 系数按扫描表置换后
//! 以光栅顺序写入输出块.

use log::warn;

use ling_core::{LingError, LingResult};

use super::bitreader::BitReader;
use super::tables::{
    ALTERNATE_HORIZONTAL_SCAN, ALTERNATE_VERTICAL_SCAN, ZIGZAG_SCAN, c_dc_scale, rounded_div,
    y_dc_scale,
};
use super::types::PredictorDirection;
use super::vlc;

/// 帧内块 DC 的来源
#[derive(Debug, Clone, Copy)]
pub(super) enum IntraDcMode {
    /// 专用 DC VLC (宏块 qscale < intra_dc_threshold)
    Vlc,
    /// DC 作为扫描位置 0 的 AC 系数随纹理一起编码
    InBand,
    /// 数据分区模式: 分区 A 已解出 DC 与预测方向
    Predecoded {
        level: i16,
        dir: PredictorDirection,
    },
}

/// 帧级纹理预测状态
///
/// 每幅图像开始时重置; 帧内宏块写入真实 DC/AC, 帧间与跳过宏块写入
/// 中性值 (DC 1024, AC 0), 使其作为预测邻居时不引入偏差.
pub(super) struct TextureState {
    mb_width: usize,
    /// 亮度网格行宽 (2 * mb_width + 2, 含哨兵)
    stride_y: usize,
    /// 色度网格行宽 (mb_width + 2, 含哨兵)
    stride_c: usize,
    dc_y: Vec<i16>,
    dc_cb: Vec<i16>,
    dc_cr: Vec<i16>,
    ac_y: Vec<[i16; 16]>,
    ac_cb: Vec<[i16; 16]>,
    ac_cr: Vec<[i16; 16]>,
    /// 每宏块量化参数 (AC 预测跨量化边界时重缩放用)
    qscale_table: Vec<u8>,
    /// 旧编码器 DC 不做 2047 上限钳位
    dc_clip_relaxed: bool,
}

impl TextureState {
    pub fn new(mb_width: usize, mb_height: usize) -> Self {
        let stride_y = mb_width * 2 + 2;
        let stride_c = mb_width + 2;
        let luma_cells = stride_y * (mb_height * 2 + 1);
        let chroma_cells = stride_c * (mb_height + 1);
        Self {
            mb_width,
            stride_y,
            stride_c,
            dc_y: vec![1024; luma_cells],
            dc_cb: vec![1024; chroma_cells],
            dc_cr: vec![1024; chroma_cells],
            ac_y: vec![[0; 16]; luma_cells],
            ac_cb: vec![[0; 16]; chroma_cells],
            ac_cr: vec![[0; 16]; chroma_cells],
            qscale_table: vec![0; mb_width * mb_height],
            dc_clip_relaxed: false,
        }
    }

    /// 每幅图像开始时调用
    pub fn reset(&mut self, dc_clip_relaxed: bool) {
        self.dc_y.fill(1024);
        self.dc_cb.fill(1024);
        self.dc_cr.fill(1024);
        self.ac_y.fill([0; 16]);
        self.ac_cb.fill([0; 16]);
        self.ac_cr.fill([0; 16]);
        self.qscale_table.fill(0);
        self.dc_clip_relaxed = dc_clip_relaxed;
    }

    pub fn set_mb_qscale(&mut self, mb_x: usize, mb_y: usize, qscale: u8) {
        self.qscale_table[mb_y * self.mb_width + mb_x] = qscale;
    }

    pub fn mb_qscale(&self, mb_x: usize, mb_y: usize) -> u8 {
        self.qscale_table[mb_y * self.mb_width + mb_x]
    }

    fn wrap(&self, n: usize) -> usize {
        if n < 4 { self.stride_y } else { self.stride_c }
    }

    /// 块 n 在预测网格中的下标 (0..=3 亮度, 4 Cb, 5 Cr)
    fn grid_index(&self, n: usize, mb_x: usize, mb_y: usize) -> usize {
        if n < 4 {
            let bx = mb_x * 2 + 1 + (n & 1);
            let by = mb_y * 2 + 1 + (n >> 1);
            by * self.stride_y + bx
        } else {
            (mb_y + 1) * self.stride_c + mb_x + 1
        }
    }

    fn dc_plane(&self, n: usize) -> &[i16] {
        match n {
            0..=3 => &self.dc_y,
            4 => &self.dc_cb,
            _ => &self.dc_cr,
        }
    }

    fn dc_plane_mut(&mut self, n: usize) -> &mut [i16] {
        match n {
            0..=3 => &mut self.dc_y,
            4 => &mut self.dc_cb,
            _ => &mut self.dc_cr,
        }
    }

    fn ac_plane(&self, n: usize) -> &[[i16; 16]] {
        match n {
            0..=3 => &self.ac_y,
            4 => &self.ac_cb,
            _ => &self.ac_cr,
        }
    }

    fn ac_plane_mut(&mut self, n: usize) -> &mut [[i16; 16]] {
        match n {
            0..=3 => &mut self.ac_y,
            4 => &mut self.ac_cb,
            _ => &mut self.ac_cr,
        }
    }

    /// 帧间/跳过宏块写入中性预测值
    pub fn clean_inter_mb(&mut self, mb_x: usize, mb_y: usize) {
        for n in 0..6 {
            let idx = self.grid_index(n, mb_x, mb_y);
            self.dc_plane_mut(n)[idx] = 1024;
            self.ac_plane_mut(n)[idx] = [0; 16];
        }
    }

    /// DC 预测: 从左 (A) / 左上 (B) / 上 (C) 邻居选择
    ///
    /// |A - B| < |B - C| 时取 C (方向为垂直), 否则取 A (水平).
    /// 视频分组边界处不可用的邻居以中性值 1024 参与.
    pub fn predict_dc(
        &self,
        n: usize,
        mb_x: usize,
        mb_y: usize,
        first_slice_line: bool,
        resync_mb_x: usize,
        resync_mb_y: usize,
    ) -> (i32, PredictorDirection) {
        let plane = self.dc_plane(n);
        let wrap = self.wrap(n);
        let idx = self.grid_index(n, mb_x, mb_y);
        let mut a = plane[idx - 1] as i32;
        let mut b = plane[idx - 1 - wrap] as i32;
        let mut c = plane[idx - wrap] as i32;

        if first_slice_line && n != 3 {
            if n != 2 {
                b = 1024;
                c = 1024;
            }
            if n != 1 && mb_x == resync_mb_x {
                b = 1024;
                a = 1024;
            }
        }
        if mb_x == resync_mb_x && mb_y == resync_mb_y + 1 && (n == 0 || n == 4 || n == 5) {
            b = 1024;
        }

        if (a - b).abs() < (b - c).abs() {
            (c, PredictorDirection::Vertical)
        } else {
            (a, PredictorDirection::Horizontal)
        }
    }

    /// 预测值缩放、加差分、存回网格
    ///
    /// 返回量化域 DC; 存入网格的是乘回缩放因子后的值, 上限钳位到
    /// 2047 (旧编码器兼容模式下不钳位), 为负判定数据损坏.
    pub fn finish_dc(
        &mut self,
        n: usize,
        mb_x: usize,
        mb_y: usize,
        pred: i32,
        level: i32,
        qscale: u8,
    ) -> LingResult<i16> {
        let scale = if n < 4 {
            y_dc_scale(qscale)
        } else {
            c_dc_scale(qscale)
        };
        let pred = (pred + (scale >> 1)) / scale;
        let level = level + pred;
        let mut stored = level * scale;
        if stored & !2047 != 0 {
            if stored < 0 {
                warn!("帧内 DC 为负: 宏块 ({mb_x}, {mb_y})");
                return Err(LingError::InvalidData(format!(
                    "帧内 DC 为负: 宏块 ({mb_x}, {mb_y})"
                )));
            }
            if !self.dc_clip_relaxed {
                stored = 2047;
            }
        }
        let idx = self.grid_index(n, mb_x, mb_y);
        self.dc_plane_mut(n)[idx] = stored as i16;
        Ok(level as i16)
    }

    /// 用专用 VLC 解码一个块的 DC (含预测还原与网格更新)
    #[allow(clippy::too_many_arguments)]
    pub fn decode_dc(
        &mut self,
        reader: &mut BitReader,
        n: usize,
        mb_x: usize,
        mb_y: usize,
        qscale: u8,
        first_slice_line: bool,
        resync_mb_x: usize,
        resync_mb_y: usize,
    ) -> LingResult<(i16, PredictorDirection)> {
        let diff = vlc::decode_intra_dc(reader, n < 4).ok_or_else(|| {
            LingError::InvalidData(format!("帧内 DC VLC 解码失败: 宏块 ({mb_x}, {mb_y})"))
        })?;
        let (pred, dir) = self.predict_dc(n, mb_x, mb_y, first_slice_line, resync_mb_x, resync_mb_y);
        let level = self.finish_dc(n, mb_x, mb_y, pred, diff as i32, qscale)?;
        Ok((level, dir))
    }

    /// AC 预测 (按方向加邻居行/列) 并把本块的首行首列存回网格
    ///
    /// 邻居宏块量化参数不同且邻居不在本宏块内时, 预测值按量化比
    /// 重缩放.
    pub fn apply_ac(
        &mut self,
        block: &mut [i16; 64],
        n: usize,
        mb_x: usize,
        mb_y: usize,
        dir: PredictorDirection,
        ac_pred: bool,
        qscale: u8,
    ) {
        let idx = self.grid_index(n, mb_x, mb_y);
        let wrap = self.wrap(n);

        if ac_pred {
            match dir {
                PredictorDirection::Horizontal => {
                    let left = self.ac_plane(n)[idx - 1];
                    let same_q = mb_x == 0
                        || n == 1
                        || n == 3
                        || self.qscale_table[mb_y * self.mb_width + mb_x - 1] == qscale;
                    if same_q {
                        for i in 1..8 {
                            block[i << 3] = block[i << 3].wrapping_add(left[i]);
                        }
                    } else {
                        let nq = self.qscale_table[mb_y * self.mb_width + mb_x - 1] as i64;
                        for i in 1..8 {
                            block[i << 3] = block[i << 3]
                                .wrapping_add(rounded_div(left[i] as i64 * nq, qscale as i64)
                                    as i16);
                        }
                    }
                }
                PredictorDirection::Vertical => {
                    let top = self.ac_plane(n)[idx - wrap];
                    let same_q = mb_y == 0
                        || n == 2
                        || n == 3
                        || self.qscale_table[(mb_y - 1) * self.mb_width + mb_x] == qscale;
                    if same_q {
                        for i in 1..8 {
                            block[i] = block[i].wrapping_add(top[8 + i]);
                        }
                    } else {
                        let nq = self.qscale_table[(mb_y - 1) * self.mb_width + mb_x] as i64;
                        for i in 1..8 {
                            block[i] = block[i]
                                .wrapping_add(rounded_div(top[8 + i] as i64 * nq, qscale as i64)
                                    as i16);
                        }
                    }
                }
                PredictorDirection::None => {}
            }
        }

        let entry = &mut self.ac_plane_mut(n)[idx];
        for i in 1..8 {
            entry[i] = block[i << 3];
            entry[8 + i] = block[i];
        }
    }

    /// 解码一个帧内 8x8 块 (DC + AC + 预测)
    #[allow(clippy::too_many_arguments)]
    pub fn decode_intra_block(
        &mut self,
        reader: &mut BitReader,
        block: &mut [i16; 64],
        n: usize,
        mb_x: usize,
        mb_y: usize,
        coded: bool,
        dc_mode: IntraDcMode,
        ac_pred: bool,
        rvlc: bool,
        alternate_scan: bool,
        qscale: u8,
        first_slice_line: bool,
        resync_mb_x: usize,
        resync_mb_y: usize,
    ) -> LingResult<()> {
        let (start, dir, pending_pred) = match dc_mode {
            IntraDcMode::Vlc => {
                let (level, dir) = self.decode_dc(
                    reader,
                    n,
                    mb_x,
                    mb_y,
                    qscale,
                    first_slice_line,
                    resync_mb_x,
                    resync_mb_y,
                )?;
                block[0] = level;
                (0i32, dir, None)
            }
            IntraDcMode::Predecoded { level, dir } => {
                block[0] = level;
                (0i32, dir, None)
            }
            IntraDcMode::InBand => {
                // DC 在扫描位置 0 随纹理解出, 预测值在 AC 环之后补加
                let (pred, dir) =
                    self.predict_dc(n, mb_x, mb_y, first_slice_line, resync_mb_x, resync_mb_y);
                (-1i32, dir, Some(pred))
            }
        };

        if coded {
            let scan: &[usize; 64] = if ac_pred {
                match dir {
                    PredictorDirection::Horizontal => &ALTERNATE_VERTICAL_SCAN,
                    _ => &ALTERNATE_HORIZONTAL_SCAN,
                }
            } else if alternate_scan {
                &ALTERNATE_VERTICAL_SCAN
            } else {
                &ZIGZAG_SCAN
            };
            decode_ac_run(reader, block, scan, start, true, rvlc, mb_x, mb_y)?;
        }

        if let Some(pred) = pending_pred {
            let level = self.finish_dc(n, mb_x, mb_y, pred, block[0] as i32, qscale)?;
            block[0] = level;
        }
        self.apply_ac(block, n, mb_x, mb_y, dir, ac_pred, qscale);
        Ok(())
    }

    /// 解码一个帧间 8x8 块 (仅在 CBP 对应位为 1 时调用)
    pub fn decode_inter_block(
        &mut self,
        reader: &mut BitReader,
        block: &mut [i16; 64],
        rvlc: bool,
        alternate_scan: bool,
        mb_x: usize,
        mb_y: usize,
    ) -> LingResult<()> {
        let scan: &[usize; 64] = if alternate_scan {
            &ALTERNATE_VERTICAL_SCAN
        } else {
            &ZIGZAG_SCAN
        };
        decode_ac_run(reader, block, scan, -1, false, rvlc, mb_x, mb_y)
    }
}

/// AC 系数环: 游程展开并按扫描表写入
///
/// 扫描游标越过 62 (末系数允许到 63) 即 AC 纹理损坏.
#[allow(clippy::too_many_arguments)]
fn decode_ac_run(
    reader: &mut BitReader,
    block: &mut [i16; 64],
    scan: &[usize; 64],
    start: i32,
    is_intra: bool,
    rvlc: bool,
    mb_x: usize,
    mb_y: usize,
) -> LingResult<()> {
    let mut i = start;
    loop {
        let coeff = if rvlc {
            vlc::decode_ac_coeff_rvlc(reader, is_intra)
        } else {
            vlc::decode_ac_coeff(reader, is_intra)
        };
        let (last, run, level) = coeff.map_err(|_| {
            LingError::InvalidData(format!("AC 系数解码失败: 宏块 ({mb_x}, {mb_y})"))
        })?;
        i += run as i32 + 1;
        if (last && i > 63) || (!last && i > 62) {
            warn!("AC 纹理损坏: 宏块 ({mb_x}, {mb_y})");
            return Err(LingError::InvalidData(format!(
                "AC 纹理损坏: 宏块 ({mb_x}, {mb_y})"
            )));
        }
        block[scan[i as usize]] = level;
        if last {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dc_预测方向选择() {
        let mut ts = TextureState::new(4, 4);
        // MB (1,1) 块 0 的邻居: A=左, B=左上, C=上
        let idx = ts.grid_index(0, 1, 1);
        let wrap = ts.stride_y;
        ts.dc_y[idx - 1] = 500; // A
        ts.dc_y[idx - 1 - wrap] = 1000; // B
        ts.dc_y[idx - wrap] = 1500; // C

        // |A-B| = 500, |B-C| = 500 → 不满足严格小于, 取 A (水平)
        let (pred, dir) = ts.predict_dc(0, 1, 1, false, 0, 0);
        assert_eq!(pred, 500);
        assert_eq!(dir, PredictorDirection::Horizontal);

        // |A-B| = 100 < |B-C| = 500 → 取 C (垂直)
        ts.dc_y[idx - 1] = 900;
        let (pred, dir) = ts.predict_dc(0, 1, 1, false, 0, 0);
        assert_eq!(pred, 1500);
        assert_eq!(dir, PredictorDirection::Vertical);
    }

    #[test]
    fn test_分组首行预测回落() {
        let ts = TextureState::new(4, 4);
        // 帧首个宏块: 三个邻居都是哨兵/回落值 1024
        let (pred, dir) = ts.predict_dc(0, 0, 0, true, 0, 0);
        assert_eq!(pred, 1024);
        assert_eq!(dir, PredictorDirection::Horizontal);
    }

    #[test]
    fn test_dc_上限钳位与负值() {
        let mut ts = TextureState::new(2, 2);
        // qscale=31 → y_dc_scale=46, pred 1024 → 22; 22+60=82, 82*46=3772 钳位 2047
        let level = ts.finish_dc(0, 0, 0, 1024, 60, 31).unwrap();
        assert_eq!(level, 82);
        let idx = ts.grid_index(0, 0, 0);
        assert_eq!(ts.dc_y[idx], 2047);

        // 负 DC 判定数据损坏
        assert!(ts.finish_dc(1, 0, 0, 1024, -4000, 1).is_err());
    }

    #[test]
    fn test_dc_兼容模式不钳位() {
        let mut ts = TextureState::new(2, 2);
        ts.reset(true);
        ts.finish_dc(0, 0, 0, 1024, 60, 31).unwrap();
        let idx = ts.grid_index(0, 0, 0);
        assert_eq!(ts.dc_y[idx], 3772);
    }

    #[test]
    fn test_帧内块_dc_vlc路径() {
        // 亮度 dc_size=2 (码 "10") + 差分 "01" (= -2)
        // + AC 码 "0111" (last=1, run=0, level=1) + 符号 0
        let data = [0b1001_0111, 0b0000_0000];
        let mut reader = BitReader::new(&data);
        let mut ts = TextureState::new(2, 2);
        let mut block = [0i16; 64];
        ts.decode_intra_block(
            &mut reader,
            &mut block,
            0,
            0,
            0,
            true,
            IntraDcMode::Vlc,
            false,
            false,
            false,
            1,
            true,
            0,
            0,
        )
        .unwrap();
        // 预测 1024/8 = 128, 128 - 2 = 126
        assert_eq!(block[0], 126);
        assert_eq!(block[1], 1);
    }

    #[test]
    fn test_ac游程越界判损() {
        // 逃逸模式 3: last=0, run=63 → 游标越过 62
        let mut bits = String::new();
        bits.push_str("0000011"); // escape
        bits.push_str("11"); // 模式 3
        bits.push('0'); // last
        bits.push_str("111111"); // run = 63
        bits.push('1'); // marker
        bits.push_str("000000000001"); // level = 1
        bits.push('1'); // marker
        let data = bits_to_bytes(&bits);
        let mut reader = BitReader::new(&data);
        let mut ts = TextureState::new(2, 2);
        let mut block = [0i16; 64];
        assert!(
            ts.decode_inter_block(&mut reader, &mut block, false, false, 0, 0)
                .is_err()
        );
    }

    #[test]
    fn test_ac左预测跨块() {
        let mut ts = TextureState::new(2, 2);
        // 块 0 首列存入网格
        let mut block0 = [0i16; 64];
        block0[8] = 5;
        block0[16] = -3;
        ts.apply_ac(&mut block0, 0, 0, 0, PredictorDirection::None, false, 4);

        // 块 1 (同宏块, 左邻为块 0) 启用 AC 预测, 水平方向
        let mut block1 = [0i16; 64];
        ts.apply_ac(&mut block1, 1, 0, 0, PredictorDirection::Horizontal, true, 4);
        assert_eq!(block1[8], 5);
        assert_eq!(block1[16], -3);
    }

    #[test]
    fn test_ac预测量化重缩放() {
        let mut ts = TextureState::new(2, 1);
        ts.set_mb_qscale(0, 0, 4);
        // MB (0,0) 块 1 的首列 (作为 MB (1,0) 块 0 的左邻)
        let idx = ts.grid_index(1, 0, 0);
        ts.ac_y[idx][1] = 10;

        let mut block = [0i16; 64];
        ts.apply_ac(&mut block, 0, 1, 0, PredictorDirection::Horizontal, true, 8);
        // 重缩放: round(10 * 4 / 8) = 5
        assert_eq!(block[8], 5);
    }

    /// 把 '0'/'1' 字符串打包为字节 (高位在前, 尾部补 0)
    fn bits_to_bytes(bits: &str) -> Vec<u8> {
        let mut out = Vec::new();
        let mut acc = 0u8;
        let mut n = 0;
        for c in bits.chars() {
            acc = (acc << 1) | (c == '1') as u8;
            n += 1;
            if n == 8 {
                out.push(acc);
                acc = 0;
                n = 0;
            }
        }
        if n > 0 {
            out.push(acc << (8 - n));
        }
        out
    }
}
