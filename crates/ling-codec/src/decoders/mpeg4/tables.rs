//! MPEG-4 Part 2 静态数据表
//!
//! 扫描表、默认量化矩阵、DC 缩放、DC VLC 门限与 resync 前缀表.

/// Zig-zag 扫描表 (渐进序列默认)
pub(super) const ZIGZAG_SCAN: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, //
    17, 24, 32, 25, 18, 11, 4, 5, //
    12, 19, 26, 33, 40, 48, 41, 34, //
    27, 20, 13, 6, 7, 14, 21, 28, //
    35, 42, 49, 56, 57, 50, 43, 36, //
    29, 22, 15, 23, 30, 37, 44, 51, //
    58, 59, 52, 45, 38, 31, 39, 46, //
    53, 60, 61, 54, 47, 55, 62, 63,
];

/// 垂直交替扫描表 (隔行 alternate_scan, 以及 AC 预测方向为水平时使用)
pub(super) const ALTERNATE_VERTICAL_SCAN: [usize; 64] = [
    0, 8, 16, 24, 1, 9, 2, 10, //
    17, 25, 32, 40, 48, 56, 57, 49, //
    41, 33, 26, 18, 3, 11, 4, 12, //
    19, 27, 34, 42, 50, 58, 35, 43, //
    51, 59, 20, 28, 5, 13, 6, 14, //
    21, 29, 36, 44, 52, 60, 37, 45, //
    53, 61, 22, 30, 7, 15, 23, 31, //
    38, 46, 54, 62, 39, 47, 55, 63,
];

/// 水平交替扫描表 (AC 预测方向为垂直时使用; 垂直表的转置)
pub(super) const ALTERNATE_HORIZONTAL_SCAN: [usize; 64] = [
    0, 1, 2, 3, 8, 9, 16, 17, //
    10, 11, 4, 5, 6, 7, 15, 14, //
    13, 12, 19, 18, 24, 25, 32, 33, //
    26, 27, 20, 21, 22, 23, 28, 29, //
    30, 31, 34, 35, 40, 41, 48, 49, //
    42, 43, 36, 37, 38, 39, 44, 45, //
    46, 47, 50, 51, 56, 57, 58, 59, //
    52, 53, 54, 55, 60, 61, 62, 63,
];

/// 默认 Intra 量化矩阵 (光栅顺序)
pub(super) const STD_INTRA_QUANT_MATRIX: [u8; 64] = [
    8, 17, 18, 19, 21, 23, 25, 27, //
    17, 18, 19, 21, 23, 25, 27, 28, //
    20, 21, 22, 23, 24, 26, 28, 30, //
    21, 22, 23, 24, 26, 28, 30, 32, //
    22, 23, 24, 26, 28, 30, 32, 35, //
    23, 24, 26, 28, 30, 32, 35, 38, //
    25, 26, 28, 30, 32, 35, 38, 41, //
    27, 28, 30, 32, 35, 38, 41, 45,
];

/// 默认 Inter (non-intra) 量化矩阵 (光栅顺序)
pub(super) const STD_INTER_QUANT_MATRIX: [u8; 64] = [
    16, 17, 18, 19, 20, 21, 22, 23, //
    17, 18, 19, 20, 21, 22, 23, 24, //
    18, 19, 20, 21, 22, 23, 24, 25, //
    19, 20, 21, 22, 23, 24, 26, 27, //
    20, 21, 22, 23, 25, 26, 27, 28, //
    21, 22, 23, 24, 26, 27, 28, 30, //
    22, 23, 24, 26, 27, 28, 30, 31, //
    23, 24, 25, 27, 28, 30, 31, 33,
];

/// intra_dc_vlc_thr 的 3 位码到量化门限的映射
///
/// 宏块量化参数 >= 门限时, 帧内 DC 改用 AC VLC 表编码 (99 表示永远
/// 使用 DC VLC, 0 表示永远使用 AC VLC).
pub(super) const DC_THRESHOLD_TABLE: [u8; 8] = [99, 13, 15, 17, 19, 21, 23, 0];

/// DQUANT 2 位码到量化参数增量的映射
pub(super) const DQUANT_TABLE: [i8; 4] = [-1, -2, 1, 2];

/// resync marker 前缀检测表
///
/// 按 (已读位数 & 7) 索引, 给出 16 位窗口中剩余 stuffing 位的掩码
/// 期望值. 必须与 resync 扫描逐位保持一致, 不可化简.
pub(super) const RESYNC_PREFIX: [u16; 8] = [
    0x7F00, 0x7E00, 0x7C00, 0x7800, 0x7000, 0x6000, 0x4000, 0x0000,
];

/// 亮度 DC 缩放因子 (随量化参数分段线性)
pub(super) fn y_dc_scale(qscale: u8) -> i32 {
    let q = qscale as i32;
    if q < 5 {
        8
    } else if q < 9 {
        2 * q
    } else if q < 25 {
        q + 8
    } else {
        2 * q - 16
    }
}

/// 色度 DC 缩放因子
pub(super) fn c_dc_scale(qscale: u8) -> i32 {
    let q = qscale as i32;
    if q < 5 {
        8
    } else if q < 25 {
        (q + 13) / 2
    } else {
        q - 6
    }
}

/// 向上取整的 log2 (用于 sprite 几何与 mb_num 位宽)
pub(super) fn log2_ceil(v: u32) -> u8 {
    let mut n = 0u8;
    let mut acc = 1u32;
    while acc < v {
        acc <<= 1;
        n += 1;
    }
    n
}

/// 有符号整除, 向最近整数取整 (ties away from zero)
pub(super) fn rounded_div(a: i64, b: i64) -> i64 {
    if (a < 0) == (b < 0) {
        (a + b / 2) / b
    } else {
        (a - b / 2) / b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_tables_are_permutations() {
        for table in [
            &ZIGZAG_SCAN,
            &ALTERNATE_VERTICAL_SCAN,
            &ALTERNATE_HORIZONTAL_SCAN,
        ] {
            let mut seen = [false; 64];
            for &idx in table.iter() {
                assert!(idx < 64);
                assert!(!seen[idx], "扫描表中重复索引 {idx}");
                seen[idx] = true;
            }
        }
    }

    #[test]
    fn test_horizontal_scan_is_vertical_transpose() {
        for i in 0..64 {
            let v = ALTERNATE_VERTICAL_SCAN[i];
            let transposed = (v % 8) * 8 + v / 8;
            assert_eq!(ALTERNATE_HORIZONTAL_SCAN[i], transposed);
        }
    }

    #[test]
    fn test_dc_scale_breakpoints() {
        assert_eq!(y_dc_scale(1), 8);
        assert_eq!(y_dc_scale(8), 16);
        assert_eq!(y_dc_scale(24), 32);
        assert_eq!(y_dc_scale(31), 46);
        assert_eq!(c_dc_scale(1), 8);
        assert_eq!(c_dc_scale(24), 18);
        assert_eq!(c_dc_scale(31), 25);
    }

    #[test]
    fn test_log2_ceil() {
        assert_eq!(log2_ceil(1), 0);
        assert_eq!(log2_ceil(2), 1);
        assert_eq!(log2_ceil(3), 2);
        assert_eq!(log2_ceil(99), 7);
    }

    #[test]
    fn test_rounded_div() {
        assert_eq!(rounded_div(7, 2), 4);
        assert_eq!(rounded_div(-7, 2), -4);
        assert_eq!(rounded_div(6, 3), 2);
    }
}
