//! VLC (变长编码) 表定义与解码函数
//!
//! 包含 MCBPC, CBPY, Intra DC, MVD, AC 系数 (含可逆 VLC 逃逸) 的码表
//! 与解码逻辑. AC 表附带一个进程级延迟构建的 12 位一级快速查找表,
//! 以及从码表推导的 max_level/max_run 界限 (逃逸模式 1/2 的偏置).

use std::sync::OnceLock;

use log::warn;

use super::bitreader::BitReader;
use super::types::{BframeMbMode, MbType};

// ============================================================================
// VLC 表定义
// ============================================================================

/// Intra DC VLC 表 (Y 亮度通道)
/// 格式: (位数, 码字, dc_size)
pub(super) const INTRA_DC_VLC_Y: &[(u8, u16, i16)] = &[
    (3, 0b011, 0),
    (2, 0b11, 1),
    (2, 0b10, 2),
    (3, 0b010, 3),
    (3, 0b001, 4),
    (4, 0b0001, 5),
    (5, 0b00001, 6),
    (6, 0b000001, 7),
    (7, 0b0000001, 8),
    (8, 0b00000001, 9),
    (9, 0b000000001, 10),
    (10, 0b0000000001, 11),
    (11, 0b00000000001, 12),
];

/// Intra DC VLC 表 (UV 色度通道)
pub(super) const INTRA_DC_VLC_UV: &[(u8, u16, i16)] = &[
    (2, 0b11, 0),
    (2, 0b10, 1),
    (2, 0b01, 2),
    (3, 0b001, 3),
    (4, 0b0001, 4),
    (5, 0b00001, 5),
    (6, 0b000001, 6),
    (7, 0b0000001, 7),
    (8, 0b00000001, 8),
    (9, 0b000000001, 9),
    (10, 0b0000000001, 10),
    (11, 0b00000000001, 11),
    (12, 0b000000000001, 12),
];

/// Intra AC VLC 表
/// 格式: (位数, 码字, last, run, level); (last=0,run=0,level=0) 为逃逸
/// 哨兵行. 没有 EOB 码, 块的终止由 last=1 的码字自身携带.
pub(super) const INTRA_AC_VLC: &[(u8, u16, bool, u8, i8)] = &[
    (2, 0x2, false, 0, 1), // last=0
    (3, 0x6, false, 0, 2),
    (4, 0xF, false, 0, 3),
    (5, 0xD, false, 0, 4),
    (5, 0xC, false, 0, 5),
    (6, 0x15, false, 0, 6),
    (6, 0x13, false, 0, 7),
    (6, 0x12, false, 0, 8),
    (7, 0x17, false, 0, 9),
    (8, 0x1F, false, 0, 10),
    (8, 0x1E, false, 0, 11),
    (8, 0x1D, false, 0, 12),
    (9, 0x25, false, 0, 13),
    (9, 0x24, false, 0, 14),
    (9, 0x23, false, 0, 15),
    (9, 0x21, false, 0, 16),
    (10, 0x21, false, 0, 17),
    (10, 0x20, false, 0, 18),
    (10, 0xF, false, 0, 19),
    (10, 0xE, false, 0, 20),
    (11, 0x7, false, 0, 21),
    (11, 0x6, false, 0, 22),
    (11, 0x20, false, 0, 23),
    (11, 0x21, false, 0, 24),
    (12, 0x50, false, 0, 25),
    (12, 0x51, false, 0, 26),
    (12, 0x52, false, 0, 27),
    (4, 0xE, false, 1, 1),
    (6, 0x14, false, 1, 2),
    (7, 0x16, false, 1, 3),
    (8, 0x1C, false, 1, 4),
    (9, 0x20, false, 1, 5),
    (9, 0x1F, false, 1, 6),
    (10, 0xD, false, 1, 7),
    (11, 0x22, false, 1, 8),
    (12, 0x53, false, 1, 9),
    (12, 0x54, false, 1, 10),
    (5, 0xB, false, 2, 1),
    (7, 0x15, false, 2, 2),
    (8, 0x1B, false, 2, 3),
    (9, 0x1E, false, 2, 4),
    (10, 0xC, false, 2, 5),
    (6, 0x11, false, 3, 1),
    (7, 0x14, false, 3, 2),
    (8, 0x1A, false, 3, 3),
    (10, 0xB, false, 3, 4),
    (6, 0x10, false, 4, 1),
    (7, 0x13, false, 4, 2),
    (8, 0x19, false, 4, 3),
    (6, 0xF, false, 5, 1),
    (7, 0x12, false, 5, 2),
    (8, 0x18, false, 5, 3),
    (6, 0xE, false, 6, 1),
    (7, 0x11, false, 6, 2),
    (8, 0x17, false, 6, 3),
    (6, 0xD, false, 7, 1),
    (7, 0x10, false, 7, 2),
    (8, 0x16, false, 7, 3),
    (6, 0xC, false, 8, 1),
    (8, 0x15, false, 8, 2),
    (8, 0x14, false, 9, 1),
    (9, 0x22, false, 9, 2),
    (8, 0x13, false, 10, 1),
    (9, 0x1D, false, 11, 1),
    (9, 0x1C, false, 12, 1),
    (9, 0x1B, false, 13, 1),
    (9, 0x1A, false, 14, 1),
    (4, 0x7, true, 0, 1), // last=1
    (9, 0x19, true, 0, 2),
    (9, 0x18, true, 0, 3),
    (9, 0x17, true, 0, 4),
    (10, 0xA, true, 0, 5),
    (11, 0x23, true, 0, 6),
    (12, 0x55, true, 0, 7),
    (12, 0x56, true, 0, 8),
    (9, 0x16, true, 1, 1),
    (10, 0x9, true, 1, 2),
    (11, 0x24, true, 1, 3),
    (9, 0x15, true, 2, 1),
    (10, 0x8, true, 2, 2),
    (9, 0x14, true, 3, 1),
    (10, 0x7, true, 3, 2),
    (9, 0x13, true, 4, 1),
    (10, 0x6, true, 4, 2),
    (9, 0x12, true, 5, 1),
    (10, 0x5, true, 5, 2),
    (9, 0x11, true, 6, 1),
    (10, 0x4, true, 6, 2),
    (11, 0x25, true, 7, 1),
    (11, 0x26, true, 8, 1),
    (11, 0x27, true, 9, 1),
    (11, 0x4, true, 10, 1),
    (11, 0x5, true, 11, 1),
    (12, 0x57, true, 12, 1),
    (12, 0x58, true, 13, 1),
    (12, 0x59, true, 14, 1),
    (12, 0x5A, true, 15, 1),
    (12, 0x5B, true, 16, 1),
    (12, 0x5C, true, 17, 1),
    (12, 0x5D, true, 18, 1),
    (12, 0x5E, true, 19, 1),
    (12, 0x5F, true, 20, 1),
    (7, 0x3, false, 0, 0), // Escape
];

/// MCBPC VLC 表 (I-VOP); mb_type=255 为 stuffing
const MCBPC_I: &[(u8, u16, u8, u8)] = &[
    (1, 0b1, 0, 0),
    (3, 0b001, 0, 1),
    (3, 0b010, 0, 2),
    (3, 0b011, 0, 3),
    (4, 0b0001, 1, 0),
    (6, 0b000001, 1, 1),
    (6, 0b000010, 1, 2),
    (6, 0b000011, 1, 3),
    (9, 0b000000001, 255, 0),
];

/// MCBPC VLC 表 (P-VOP)
const MCBPC_P: &[(u8, u16, u8, u8)] = &[
    (1, 1, 0, 0),
    (3, 0b001, 0, 1),
    (3, 0b010, 0, 2),
    (3, 0b011, 0, 3),
    (4, 0b0001, 1, 0),
    (5, 0b00001, 1, 1),
    (5, 0b00000, 1, 2),
    (6, 0b000110, 1, 3),
    (6, 0b000111, 3, 0),
    (7, 0b0001000, 3, 1),
    (7, 0b0001001, 3, 2),
    (7, 0b0001010, 3, 3),
    (8, 0b00010110, 4, 0),
    (8, 0b00010111, 4, 1),
    (9, 0b000110000, 4, 2),
    (9, 0b000110001, 4, 3),
    (7, 0b0001011, 2, 0),
    (8, 0b00011000, 2, 1),
    (8, 0b00011001, 2, 2),
    (8, 0b00011010, 2, 3),
    (9, 0b000000001, 255, 0),
];

/// CBPY VLC 表 (Intra 直接使用; Inter 取反 15 - cbpy)
const CBPY: &[(u8, u16, u8)] = &[
    (4, 0x3, 0),
    (5, 0x5, 1),
    (5, 0x4, 2),
    (4, 0x9, 3),
    (5, 0x3, 4),
    (4, 0x7, 5),
    (6, 0x2, 6),
    (6, 0xC, 7),
    (10, 0x1, 8),
    (7, 0x1, 9),
    (8, 0x1, 10),
    (10, 0x2, 11),
    (10, 0x3, 12),
    (7, 0x0, 13),
    (8, 0x0, 14),
    (4, 0xB, 15),
];

/// MVD VLC 表 (符号位单独编码)
pub(super) const MVD_VLC: &[(u8, u16, u8)] = &[
    (1, 0b1, 0),
    (2, 0b01, 1),
    (3, 0b001, 2),
    (4, 0b0001, 3),
    (6, 0b000011, 4),
    (7, 0b0000101, 5),
    (7, 0b0000100, 6),
    (7, 0b0000011, 7),
    (8, 0b00000101, 8),
    (8, 0b00000100, 9),
    (8, 0b00000011, 10),
    (10, 0b0000001001, 11),
    (10, 0b0000001000, 12),
    (10, 0b0000000111, 13),
    (10, 0b0000000110, 14),
    (10, 0b0000000101, 15),
    (10, 0b0000000100, 16),
    (10, 0b0000000011, 17),
    (10, 0b0000000010, 18),
    (10, 0b0000000001, 19),
    (10, 0b0000000000, 20),
    (10, 0b0000010011, 21),
    (10, 0b0000010010, 22),
    (10, 0b0000010001, 23),
    (10, 0b0000010000, 24),
    (11, 0b00000101011, 25),
    (11, 0b00000101010, 26),
    (11, 0b00000101001, 27),
    (11, 0b00000101000, 28),
    (11, 0b00000101111, 29),
    (11, 0b00000101110, 30),
    (12, 0b000001011011, 31),
    (12, 0b000001011010, 32),
];

/// Inter AC VLC 表
pub(super) const INTER_AC_VLC: &[(u8, u16, bool, u8, i8)] = &[
    (2, 0x2, false, 0, 1),
    (4, 0xf, false, 0, 2),
    (6, 0x15, false, 0, 3),
    (7, 0x17, false, 0, 4),
    (8, 0x1f, false, 0, 5),
    (9, 0x25, false, 0, 6),
    (9, 0x24, false, 0, 7),
    (10, 0x21, false, 0, 8),
    (10, 0x20, false, 0, 9),
    (11, 0x7, false, 0, 10),
    (11, 0x6, false, 0, 11),
    (11, 0x20, false, 0, 12),
    (3, 0x6, false, 1, 1),
    (6, 0x14, false, 1, 2),
    (8, 0x1e, false, 1, 3),
    (10, 0xf, false, 1, 4),
    (11, 0x21, false, 1, 5),
    (12, 0x50, false, 1, 6),
    (4, 0xe, false, 2, 1),
    (8, 0x1d, false, 2, 2),
    (10, 0xe, false, 2, 3),
    (12, 0x51, false, 2, 4),
    (5, 0xd, false, 3, 1),
    (9, 0x23, false, 3, 2),
    (10, 0xd, false, 3, 3),
    (5, 0xc, false, 4, 1),
    (9, 0x22, false, 4, 2),
    (12, 0x52, false, 4, 3),
    (5, 0xb, false, 5, 1),
    (10, 0xc, false, 5, 2),
    (12, 0x53, false, 5, 3),
    (6, 0x13, false, 6, 1),
    (10, 0xb, false, 6, 2),
    (12, 0x54, false, 6, 3),
    (6, 0x12, false, 7, 1),
    (10, 0xa, false, 7, 2),
    (6, 0x11, false, 8, 1),
    (10, 0x9, false, 8, 2),
    (6, 0x10, false, 9, 1),
    (10, 0x8, false, 9, 2),
    (7, 0x16, false, 10, 1),
    (12, 0x55, false, 10, 2),
    (7, 0x15, false, 11, 1),
    (7, 0x14, false, 12, 1),
    (8, 0x1c, false, 13, 1),
    (8, 0x1b, false, 14, 1),
    (9, 0x21, false, 15, 1),
    (9, 0x20, false, 16, 1),
    (9, 0x1f, false, 17, 1),
    (9, 0x1e, false, 18, 1),
    (9, 0x1d, false, 19, 1),
    (9, 0x1c, false, 20, 1),
    (9, 0x1b, false, 21, 1),
    (9, 0x1a, false, 22, 1),
    (11, 0x22, false, 23, 1),
    (11, 0x23, false, 24, 1),
    (12, 0x56, false, 25, 1),
    (12, 0x57, false, 26, 1),
    (4, 0x7, true, 0, 1),
    (9, 0x19, true, 0, 2),
    (11, 0x5, true, 0, 3),
    (6, 0xf, true, 1, 1),
    (11, 0x4, true, 1, 2),
    (6, 0xe, true, 2, 1),
    (6, 0xd, true, 3, 1),
    (6, 0xc, true, 4, 1),
    (7, 0x13, true, 5, 1),
    (7, 0x12, true, 6, 1),
    (7, 0x11, true, 7, 1),
    (7, 0x10, true, 8, 1),
    (8, 0x1a, true, 9, 1),
    (8, 0x19, true, 10, 1),
    (8, 0x18, true, 11, 1),
    (8, 0x17, true, 12, 1),
    (8, 0x16, true, 13, 1),
    (8, 0x15, true, 14, 1),
    (8, 0x14, true, 15, 1),
    (8, 0x13, true, 16, 1),
    (9, 0x18, true, 17, 1),
    (9, 0x17, true, 18, 1),
    (9, 0x16, true, 19, 1),
    (9, 0x15, true, 20, 1),
    (9, 0x14, true, 21, 1),
    (9, 0x13, true, 22, 1),
    (9, 0x12, true, 23, 1),
    (9, 0x11, true, 24, 1),
    (10, 0x7, true, 25, 1),
    (10, 0x6, true, 26, 1),
    (10, 0x5, true, 27, 1),
    (10, 0x4, true, 28, 1),
    (11, 0x24, true, 29, 1),
    (11, 0x25, true, 30, 1),
    (11, 0x26, true, 31, 1),
    (11, 0x27, true, 32, 1),
    (12, 0x58, true, 33, 1),
    (12, 0x59, true, 34, 1),
    (12, 0x5a, true, 35, 1),
    (12, 0x5b, true, 36, 1),
    (12, 0x5c, true, 37, 1),
    (12, 0x5d, true, 38, 1),
    (12, 0x5e, true, 39, 1),
    (12, 0x5f, true, 40, 1),
    (7, 0x3, false, 0, 0), // Escape
];

/// 可逆 VLC Intra AC 表 (数据分区流的分区 B)
///
/// 所有码字形如 `1 0^a 1 0^b 1`, 首尾各一个 1, 中间恰好再一个 1,
/// 因此既无前缀冲突也无后缀冲突, 可以从任一端解码. 逃逸码字为
/// 10011 (5 位), 同属该码字族. (last=0,run=0,level=0) 为逃逸哨兵行.
pub(super) const RVLC_INTRA_AC_VLC: &[(u8, u16, bool, u8, i8)] = &[
    (3, 0x7, false, 0, 1), // last=0
    (4, 0xD, false, 0, 2),
    (4, 0xB, false, 0, 3),
    (5, 0x19, false, 1, 1),
    (5, 0x15, false, 0, 4),
    (6, 0x31, false, 1, 2),
    (6, 0x29, false, 0, 5),
    (6, 0x25, false, 1, 3),
    (6, 0x23, false, 2, 1),
    (7, 0x61, false, 0, 6),
    (7, 0x51, false, 1, 4),
    (7, 0x49, false, 2, 2),
    (7, 0x45, true, 0, 1), // last=1
    (7, 0x43, false, 0, 7), // last=0
    (8, 0xC1, false, 1, 5),
    (8, 0xA1, false, 2, 3),
    (8, 0x91, false, 3, 1),
    (8, 0x89, true, 0, 2), // last=1
    (8, 0x85, false, 0, 8), // last=0
    (8, 0x83, false, 1, 6),
    (9, 0x181, false, 2, 4),
    (9, 0x141, false, 3, 2),
    (9, 0x121, true, 0, 3), // last=1
    (9, 0x111, false, 0, 9), // last=0
    (9, 0x109, true, 1, 1), // last=1
    (9, 0x105, false, 1, 7), // last=0
    (9, 0x103, false, 2, 5),
    (10, 0x301, false, 3, 3),
    (10, 0x281, false, 4, 1),
    (10, 0x241, true, 0, 4), // last=1
    (10, 0x221, false, 0, 10), // last=0
    (10, 0x211, true, 1, 2), // last=1
    (10, 0x209, false, 1, 8), // last=0
    (10, 0x205, false, 3, 4),
    (10, 0x203, false, 4, 2),
    (11, 0x601, true, 0, 5), // last=1
    (11, 0x501, false, 0, 11), // last=0
    (11, 0x481, true, 1, 3), // last=1
    (11, 0x441, false, 1, 9), // last=0
    (11, 0x421, true, 2, 1), // last=1
    (11, 0x411, false, 4, 3), // last=0
    (11, 0x409, false, 5, 1),
    (11, 0x405, true, 0, 6), // last=1
    (11, 0x403, false, 0, 12), // last=0
    (12, 0xC01, false, 1, 10),
    (12, 0xA01, true, 2, 2), // last=1
    (12, 0x901, false, 5, 2), // last=0
    (12, 0x881, true, 0, 7), // last=1
    (12, 0x841, false, 0, 13), // last=0
    (12, 0x821, true, 3, 1), // last=1
    (12, 0x811, false, 5, 3), // last=0
    (12, 0x809, false, 6, 1),
    (12, 0x805, true, 0, 8), // last=1
    (12, 0x803, false, 0, 14), // last=0
    (13, 0x1801, true, 3, 2), // last=1
    (13, 0x1401, false, 6, 2), // last=0
    (13, 0x1201, false, 0, 15),
    (13, 0x1101, true, 4, 1), // last=1
    (13, 0x1081, false, 6, 3), // last=0
    (13, 0x1041, false, 7, 1),
    (13, 0x1021, false, 0, 16),
    (13, 0x1011, true, 4, 2), // last=1
    (13, 0x1009, false, 7, 2), // last=0
    (13, 0x1005, false, 0, 17),
    (13, 0x1003, true, 5, 1), // last=1
    (14, 0x3001, false, 7, 3), // last=0
    (14, 0x2801, false, 8, 1),
    (14, 0x2401, false, 0, 18),
    (14, 0x2201, true, 5, 2), // last=1
    (14, 0x2101, false, 8, 2), // last=0
    (14, 0x2081, false, 0, 19),
    (14, 0x2041, true, 6, 1), // last=1
    (14, 0x2021, false, 9, 1), // last=0
    (14, 0x2011, false, 0, 20),
    (14, 0x2009, true, 6, 2), // last=1
    (14, 0x2005, false, 9, 2), // last=0
    (14, 0x2003, false, 0, 21),
    (15, 0x6001, true, 7, 1), // last=1
    (15, 0x5001, false, 10, 1), // last=0
    (15, 0x4801, false, 0, 22),
    (15, 0x4401, false, 0, 23),
    (15, 0x4201, true, 8, 1), // last=1
    (15, 0x4101, false, 11, 1), // last=0
    (15, 0x4081, false, 0, 24),
    (15, 0x4041, false, 0, 25),
    (15, 0x4021, true, 9, 1), // last=1
    (15, 0x4011, false, 12, 1), // last=0
    (15, 0x4009, false, 0, 26),
    (15, 0x4005, false, 0, 27),
    (15, 0x4003, true, 10, 1), // last=1
    (16, 0xC001, false, 13, 1), // last=0
    (16, 0xA001, true, 11, 1), // last=1
    (16, 0x9001, false, 14, 1), // last=0
    (16, 0x8801, true, 12, 1), // last=1
    (16, 0x8401, true, 13, 1),
    (16, 0x8201, true, 14, 1),
    (16, 0x8101, true, 15, 1),
    (16, 0x8081, true, 16, 1),
    (16, 0x8041, true, 17, 1),
    (16, 0x8021, true, 18, 1),
    (16, 0x8011, true, 19, 1),
    (16, 0x8009, true, 20, 1),
    (5, 0x13, false, 0, 0), // Escape
];

/// 可逆 VLC Inter AC 表
///
/// 码字集与 [`RVLC_INTRA_AC_VLC`] 相同, 事件映射不同 (Inter 分布
/// 偏向长游程小级别).
pub(super) const RVLC_INTER_AC_VLC: &[(u8, u16, bool, u8, i8)] = &[
    (3, 0x7, false, 0, 1), // last=0
    (4, 0xD, false, 1, 1),
    (4, 0xB, false, 0, 2),
    (5, 0x19, false, 2, 1),
    (5, 0x15, false, 1, 2),
    (6, 0x31, false, 3, 1),
    (6, 0x29, true, 0, 1), // last=1
    (6, 0x25, false, 0, 3), // last=0
    (6, 0x23, false, 2, 2),
    (7, 0x61, false, 4, 1),
    (7, 0x51, true, 1, 1), // last=1
    (7, 0x49, false, 1, 3), // last=0
    (7, 0x45, false, 3, 2),
    (7, 0x43, false, 5, 1),
    (8, 0xC1, true, 0, 2), // last=1
    (8, 0xA1, false, 0, 4), // last=0
    (8, 0x91, true, 2, 1), // last=1
    (8, 0x89, false, 2, 3), // last=0
    (8, 0x85, false, 4, 2),
    (8, 0x83, false, 6, 1),
    (9, 0x181, true, 1, 2), // last=1
    (9, 0x141, false, 1, 4), // last=0
    (9, 0x121, true, 3, 1), // last=1
    (9, 0x111, false, 3, 3), // last=0
    (9, 0x109, false, 5, 2),
    (9, 0x105, false, 7, 1),
    (9, 0x103, true, 0, 3), // last=1
    (10, 0x301, false, 0, 5), // last=0
    (10, 0x281, false, 2, 4),
    (10, 0x241, true, 4, 1), // last=1
    (10, 0x221, false, 4, 3), // last=0
    (10, 0x211, false, 6, 2),
    (10, 0x209, false, 8, 1),
    (10, 0x205, false, 1, 5),
    (10, 0x203, true, 5, 1), // last=1
    (11, 0x601, false, 5, 3), // last=0
    (11, 0x501, false, 7, 2),
    (11, 0x481, false, 9, 1),
    (11, 0x441, false, 0, 6),
    (11, 0x421, true, 6, 1), // last=1
    (11, 0x411, false, 6, 3), // last=0
    (11, 0x409, false, 8, 2),
    (11, 0x405, false, 10, 1),
    (11, 0x403, false, 1, 6),
    (12, 0xC01, true, 7, 1), // last=1
    (12, 0xA01, false, 9, 2), // last=0
    (12, 0x901, false, 11, 1),
    (12, 0x881, false, 0, 7),
    (12, 0x841, true, 8, 1), // last=1
    (12, 0x821, false, 10, 2), // last=0
    (12, 0x811, false, 12, 1),
    (12, 0x809, true, 9, 1), // last=1
    (12, 0x805, false, 13, 1), // last=0
    (12, 0x803, false, 0, 8),
    (13, 0x1801, true, 10, 1), // last=1
    (13, 0x1401, false, 14, 1), // last=0
    (13, 0x1201, true, 11, 1), // last=1
    (13, 0x1101, false, 15, 1), // last=0
    (13, 0x1081, false, 0, 9),
    (13, 0x1041, true, 12, 1), // last=1
    (13, 0x1021, false, 16, 1), // last=0
    (13, 0x1011, true, 13, 1), // last=1
    (13, 0x1009, false, 17, 1), // last=0
    (13, 0x1005, false, 0, 10),
    (13, 0x1003, true, 14, 1), // last=1
    (14, 0x3001, false, 18, 1), // last=0
    (14, 0x2801, true, 15, 1), // last=1
    (14, 0x2401, false, 19, 1), // last=0
    (14, 0x2201, false, 0, 11),
    (14, 0x2101, true, 16, 1), // last=1
    (14, 0x2081, false, 20, 1), // last=0
    (14, 0x2041, true, 17, 1), // last=1
    (14, 0x2021, false, 21, 1), // last=0
    (14, 0x2011, false, 0, 12),
    (14, 0x2009, true, 18, 1), // last=1
    (14, 0x2005, false, 22, 1), // last=0
    (14, 0x2003, true, 19, 1), // last=1
    (15, 0x6001, false, 23, 1), // last=0
    (15, 0x5001, true, 20, 1), // last=1
    (15, 0x4801, false, 24, 1), // last=0
    (15, 0x4401, true, 21, 1), // last=1
    (15, 0x4201, false, 25, 1), // last=0
    (15, 0x4101, true, 22, 1), // last=1
    (15, 0x4081, false, 26, 1), // last=0
    (15, 0x4041, true, 23, 1), // last=1
    (15, 0x4021, true, 24, 1),
    (15, 0x4011, true, 25, 1),
    (15, 0x4009, true, 26, 1),
    (15, 0x4005, true, 27, 1),
    (15, 0x4003, true, 28, 1),
    (16, 0xC001, true, 29, 1),
    (16, 0xA001, true, 30, 1),
    (16, 0x9001, true, 31, 1),
    (16, 0x8801, true, 32, 1),
    (16, 0x8401, true, 33, 1),
    (16, 0x8201, true, 34, 1),
    (16, 0x8101, true, 35, 1),
    (16, 0x8081, true, 36, 1),
    (16, 0x8041, true, 37, 1),
    (16, 0x8021, true, 38, 1),
    (16, 0x8011, true, 39, 1),
    (16, 0x8009, true, 40, 1),
    (5, 0x13, false, 0, 0), // Escape
];

// ============================================================================
// 一次性构建的派生表 (快速查找 + 逃逸界限)
// ============================================================================

/// AC VLC 快速查找表条目
#[derive(Clone, Copy, Default)]
struct AcFastEntry {
    /// 码长 (0 = 无效条目)
    len: u8,
    escape: bool,
    last: bool,
    run: u8,
    /// 级别绝对值
    level: u8,
}

/// 快速查找表位宽 (12 bits 覆盖标准 AC 表的全部码字;
/// RVLC 表中超过 12 位的长码走逐条匹配慢路径)
const AC_FAST_BITS: u8 = 12;
const AC_FAST_SIZE: usize = 1 << AC_FAST_BITS;

/// 从码表推导出的逃逸偏置界限
///
/// `max_level[last][run]` 为该 (last, run) 下表内最大级别;
/// `max_run[last][level]` 为该 (last, level) 下表内最大游程.
struct RlLimits {
    max_level: [[u8; 64]; 2],
    max_run: [[u8; 64]; 2],
}

/// AC 表及其派生数据的集合
struct AcTables {
    fast: Box<[AcFastEntry]>,
    limits: RlLimits,
}

fn build_ac_fast(table: &[(u8, u16, bool, u8, i8)]) -> Box<[AcFastEntry]> {
    let mut entries = vec![AcFastEntry::default(); AC_FAST_SIZE];

    for &(len, code, last, run, level) in table {
        if len == 0 || len > AC_FAST_BITS {
            continue;
        }

        let escape = !last && run == 0 && level == 0;
        let padding = AC_FAST_BITS - len;
        let base = (code as usize) << padding;
        for extra in 0..(1usize << padding) {
            entries[base | extra] = AcFastEntry {
                len,
                escape,
                last,
                run,
                level: level.unsigned_abs(),
            };
        }
    }

    entries.into_boxed_slice()
}

fn build_limits(table: &[(u8, u16, bool, u8, i8)]) -> RlLimits {
    let mut limits = RlLimits {
        max_level: [[0; 64]; 2],
        max_run: [[0; 64]; 2],
    };
    for &(_, _, last, run, level) in table {
        if run == 0 && level == 0 {
            continue; // 逃逸哨兵行
        }
        let l = last as usize;
        let lev = level.unsigned_abs();
        if lev > limits.max_level[l][run as usize] {
            limits.max_level[l][run as usize] = lev;
        }
        if run > limits.max_run[l][lev as usize] {
            limits.max_run[l][lev as usize] = run;
        }
    }
    limits
}

static INTRA_AC_TABLES: OnceLock<AcTables> = OnceLock::new();
static INTER_AC_TABLES: OnceLock<AcTables> = OnceLock::new();
static RVLC_INTRA_AC_TABLES: OnceLock<AcTables> = OnceLock::new();
static RVLC_INTER_AC_TABLES: OnceLock<AcTables> = OnceLock::new();

fn ac_tables(is_intra: bool) -> &'static AcTables {
    let (cell, table) = if is_intra {
        (&INTRA_AC_TABLES, INTRA_AC_VLC)
    } else {
        (&INTER_AC_TABLES, INTER_AC_VLC)
    };
    cell.get_or_init(|| AcTables {
        fast: build_ac_fast(table),
        limits: build_limits(table),
    })
}

fn rvlc_ac_tables(is_intra: bool) -> &'static AcTables {
    let (cell, table) = if is_intra {
        (&RVLC_INTRA_AC_TABLES, RVLC_INTRA_AC_VLC)
    } else {
        (&RVLC_INTER_AC_TABLES, RVLC_INTER_AC_VLC)
    };
    cell.get_or_init(|| AcTables {
        fast: build_ac_fast(table),
        limits: build_limits(table),
    })
}

// ============================================================================
// VLC 解码函数
// ============================================================================

/// 解码 MCBPC (I-VOP)
///
/// stuffing code 以 [`MbType::Stuffing`] 返回, 由调用方丢弃后重解
/// (P-VOP 中 stuffing 之后要重新读取 not_coded 位).
pub(super) fn decode_mcbpc_i(reader: &mut BitReader) -> Option<(MbType, u8)> {
    for &(len, code, mb_type_val, cbpc) in MCBPC_I {
        let Some(bits) = reader.peek_bits(len) else {
            continue;
        };
        if bits as u16 == code {
            reader.read_bits(len)?;
            let mb_type = match mb_type_val {
                0 => MbType::Intra,
                255 => MbType::Stuffing,
                _ => MbType::IntraQ,
            };
            return Some((mb_type, cbpc));
        }
    }
    None
}

/// 解码 MCBPC (P-VOP)
pub(super) fn decode_mcbpc_p(reader: &mut BitReader) -> Option<(MbType, u8)> {
    for &(len, code, mb_type_val, cbpc) in MCBPC_P {
        let Some(bits) = reader.peek_bits(len) else {
            continue;
        };
        if bits as u16 == code {
            reader.read_bits(len)?;
            let mb_type = match mb_type_val {
                0 => MbType::Inter,
                1 => MbType::InterQ,
                2 => MbType::Inter4V,
                3 => MbType::Intra,
                4 => MbType::IntraQ,
                _ => MbType::Stuffing,
            };
            return Some((mb_type, cbpc));
        }
    }
    None
}

/// 解码 CBPY; Inter 块取反 (15 - cbpy)
pub(super) fn decode_cbpy(reader: &mut BitReader, is_intra: bool) -> Option<u8> {
    for &(len, code, cbpy_val) in CBPY {
        if let Some(bits) = reader.peek_bits(len)
            && bits as u16 == code
        {
            reader.read_bits(len)?;
            return Some(if is_intra { cbpy_val } else { 15 - cbpy_val });
        }
    }
    warn!("CBPY 解码失败: 字节位置 = {}", reader.byte_position());
    None
}

/// 解码 Intra DC 差分值
///
/// dc_size > 8 时码流携带强制 marker bit, 缺失视为数据损坏.
pub(super) fn decode_intra_dc(reader: &mut BitReader, is_luma: bool) -> Option<i16> {
    let table = if is_luma {
        INTRA_DC_VLC_Y
    } else {
        INTRA_DC_VLC_UV
    };
    for &(len, code, dc_size) in table {
        let Some(bits) = reader.peek_bits(len) else {
            continue;
        };
        if bits as u16 == code {
            reader.read_bits(len)?;
            if dc_size == 0 {
                return Some(0);
            }
            let diff = reader.read_bits(dc_size as u8)? as i16;
            if dc_size > 8 && !reader.read_bit()? {
                warn!("Intra DC marker bit 缺失");
                return None;
            }
            let dc_diff = if diff < (1 << (dc_size - 1)) {
                diff - (1 << dc_size) + 1
            } else {
                diff
            };
            return Some(dc_diff);
        }
    }
    None
}

/// 使用 VLC 表解码一个 AC 系数 (支持逃逸模式 1/2/3)
///
/// O(1) 快速路径 (peek 12 位直接命中) + 逐条匹配慢路径.
/// 块的终止由返回的 last 标志携带, 表中没有单独的 EOB 码.
pub(super) fn decode_ac_coeff(
    reader: &mut BitReader,
    is_intra: bool,
) -> Result<(bool, u8, i16), ()> {
    let tables = ac_tables(is_intra);

    if let Some(peek) = reader.peek_bits(AC_FAST_BITS) {
        let entry = &tables.fast[peek as usize];

        if entry.len > 0 {
            reader.read_bits(entry.len).ok_or(())?;
            if entry.escape {
                return decode_ac_escape(reader, is_intra);
            }
            let sign = reader.read_bit().ok_or(())?;
            let level = if sign {
                -(entry.level as i16)
            } else {
                entry.level as i16
            };
            return Ok((entry.last, entry.run, level));
        }
    }

    // 回退: 剩余位不足 12 bits 的边界情况, 逐条匹配
    let table = if is_intra { INTRA_AC_VLC } else { INTER_AC_VLC };
    for &(len, code, last, run, level) in table {
        let Some(bits) = reader.peek_bits(len) else {
            continue;
        };
        if bits as u16 == code {
            reader.read_bits(len).ok_or(())?;
            if run == 0 && level == 0 {
                return decode_ac_escape(reader, is_intra);
            }
            let sign = reader.read_bit().ok_or(())?;
            let actual_level = if sign { -(level as i16) } else { level as i16 };
            return Ok((last, run, actual_level));
        }
    }

    warn!("AC VLC 解码失败: 字节位置 = {}", reader.byte_position());
    Err(())
}

/// 逃逸模式分发 (模式 1/2/3), 在 7 位逃逸码已消耗后调用
///
/// - 模式 1 (`0`): 再解一个表内码字, 级别绝对值加 max_level 偏置
/// - 模式 2 (`10`): 再解一个表内码字, 游程加 max_run+1 偏置
/// - 模式 3 (`11`): 定长编码 last:1 + run:6 + marker + level:12 + marker
///
/// 偏置算术必须与编码端逐位一致, 级别与游程的偏置方向不可互换.
fn decode_ac_escape(reader: &mut BitReader, is_intra: bool) -> Result<(bool, u8, i16), ()> {
    let limits = &ac_tables(is_intra).limits;
    let mode_bit1 = reader.peek_bits(1).ok_or(())?;
    if mode_bit1 == 0 {
        // 模式 1: level 偏移
        reader.read_bits(1).ok_or(())?;
        let (last, run, level) = decode_table_entry(reader, is_intra).ok_or(())?;
        let bias = limits.max_level[last as usize][run as usize] as u16;
        let abs_level = level.unsigned_abs() + bias;
        let final_level = if level < 0 {
            -(abs_level as i16)
        } else {
            abs_level as i16
        };
        return Ok((last, run, final_level));
    }
    let mode_bit2 = reader.peek_bits(2).ok_or(())?;
    if mode_bit2 == 0b10 {
        // 模式 2: run 偏移
        reader.read_bits(2).ok_or(())?;
        let (last, run, level) = decode_table_entry(reader, is_intra).ok_or(())?;
        let lev_idx = level.unsigned_abs().min(63) as usize;
        let final_run = run + limits.max_run[last as usize][lev_idx] + 1;
        return Ok((last, final_run, level));
    }
    // 模式 3: FLC
    reader.read_bits(2).ok_or(())?;
    decode_ac_escape_flc(reader).ok_or(())
}

/// 从 AC 表解一个普通条目 (逃逸模式 1/2 的内层码字)
fn decode_table_entry(reader: &mut BitReader, is_intra: bool) -> Option<(bool, u8, i16)> {
    let table = if is_intra { INTRA_AC_VLC } else { INTER_AC_VLC };
    for &(len, code, last, run, level) in table {
        if run == 0 && level == 0 {
            continue; // 哨兵行不可作为内层码字
        }
        let bits = reader.peek_bits(len)?;
        if bits as u16 == code {
            reader.read_bits(len)?;
            let sign = reader.read_bit()?;
            let actual_level = if sign { -(level as i16) } else { level as i16 };
            return Some((last, run, actual_level));
        }
    }
    None
}

/// 逃逸模式 3: 定长解码 (last:1 + run:6 + marker + level:12 + marker)
fn decode_ac_escape_flc(reader: &mut BitReader) -> Option<(bool, u8, i16)> {
    let last = reader.read_bits(1)? != 0;
    let run = reader.read_bits(6)? as u8;
    reader.check_marker("逃逸模式 3 run 之后");
    let level_bits = reader.read_bits(12)? as i16;
    reader.check_marker("逃逸模式 3 level 之后");
    let level = if level_bits >= 2048 {
        level_bits - 4096
    } else {
        level_bits
    };
    Some((last, run, level))
}

/// 可逆 VLC 的 AC 系数解码 (数据分区流的分区 B)
///
/// 码表为 RVLC 专用的双向可解码字族, 与标准 AC 表不同. 快速路径
/// 覆盖 12 位以内的码字; 更长的码字和剩余位不足 12 bits 的边界
/// 情况走逐条匹配慢路径. 逃逸为 marker 保护的定长格式 (无模式 1/2
/// 偏置), 任一 marker 或尾部校验失败即判定数据损坏.
///
/// 后向 (从码流末尾反向) 解码路径暂未实现, resync 层以前向路径
/// 解码分区 B.
pub(super) fn decode_ac_coeff_rvlc(
    reader: &mut BitReader,
    is_intra: bool,
) -> Result<(bool, u8, i16), ()> {
    let tables = rvlc_ac_tables(is_intra);

    if let Some(peek) = reader.peek_bits(AC_FAST_BITS) {
        let entry = &tables.fast[peek as usize];
        if entry.len > 0 {
            reader.read_bits(entry.len).ok_or(())?;
            if entry.escape {
                return decode_rvlc_escape(reader).ok_or(());
            }
            let sign = reader.read_bit().ok_or(())?;
            let level = if sign {
                -(entry.level as i16)
            } else {
                entry.level as i16
            };
            return Ok((entry.last, entry.run, level));
        }
    }

    let table = if is_intra {
        RVLC_INTRA_AC_VLC
    } else {
        RVLC_INTER_AC_VLC
    };
    for &(len, code, last, run, level) in table {
        let Some(bits) = reader.peek_bits(len) else {
            continue;
        };
        if bits as u16 == code {
            reader.read_bits(len).ok_or(())?;
            if run == 0 && level == 0 {
                return decode_rvlc_escape(reader).ok_or(());
            }
            let sign = reader.read_bit().ok_or(())?;
            let actual_level = if sign { -(level as i16) } else { level as i16 };
            return Ok((last, run, actual_level));
        }
    }

    warn!("RVLC AC 解码失败: 字节位置 = {}", reader.byte_position());
    Err(())
}

/// RVLC 逃逸: marker 保护的定长格式
/// marker + last:1 + run:6 + marker + level:11 + 尾部 5 位 (10000) + 符号位
fn decode_rvlc_escape(reader: &mut BitReader) -> Option<(bool, u8, i16)> {
    if !reader.read_bit()? {
        warn!("RVLC 逃逸起始 marker 缺失");
        return None;
    }
    let last = reader.read_bits(1)? != 0;
    let run = reader.read_bits(6)? as u8;
    if !reader.read_bit()? {
        warn!("RVLC 逃逸 run 后 marker 缺失");
        return None;
    }
    let level_abs = reader.read_bits(11)? as i16;
    if reader.read_bits(5)? != 0b10000 {
        warn!("RVLC 逃逸尾部校验失败");
        return None;
    }
    let sign = reader.read_bit()?;
    let level = if sign { -level_abs } else { level_abs };
    Some((last, run, level))
}

// ============================================================================
// B 帧 VLC 解码函数
// ============================================================================

/// 解码 MODB (B-VOP 宏块类型标志)
///
/// 返回 `(mb_type_present, cbp_present)`:
/// - MODB = "1": 两者均不存在, 使用 Direct 模式, CBP=0
/// - MODB = "01": mb_type 存在, CBP=0
/// - MODB = "00": 两者均存在
pub(super) fn decode_modb(reader: &mut BitReader) -> (bool, bool) {
    match reader.read_bit() {
        Some(true) => (false, false),
        Some(false) => match reader.read_bit() {
            Some(true) => (true, false),
            Some(false) => (true, true),
            None => (false, false),
        },
        None => (false, false),
    }
}

/// 解码 B-VOP 宏块类型
///
/// - "1" → Direct
/// - "01" → Interpolate
/// - "001" → Backward
/// - "0001" → Forward
/// - "00001" → DirectNoneMv (回落)
pub(super) fn decode_b_mb_type(reader: &mut BitReader) -> BframeMbMode {
    for mode_idx in 0..4u8 {
        match reader.read_bit() {
            Some(true) => {
                return match mode_idx {
                    0 => BframeMbMode::Direct,
                    1 => BframeMbMode::Interpolate,
                    2 => BframeMbMode::Backward,
                    _ => BframeMbMode::Forward,
                };
            }
            Some(false) => continue,
            None => return BframeMbMode::Direct,
        }
    }
    BframeMbMode::DirectNoneMv
}

/// 解码 DBQUANT (B-VOP 量化变化): "0"→0, "10"→-2, "11"→+2
pub(super) fn decode_dbquant(reader: &mut BitReader) -> i32 {
    match reader.read_bit() {
        Some(false) => 0,
        Some(true) => match reader.read_bit() {
            Some(false) => -2,
            Some(true) => 2,
            None => 0,
        },
        None => 0,
    }
}

// ============================================================================
// studio 档 VLC
// ============================================================================

/// studio 亮度 DC 尺寸码 (len, code, dct_dc_size)
///
/// MPEG-2 风格的尺寸前缀码, 向高位深扩展到 15.
const STUDIO_DC_LUMA: [(u8, u16, u8); 16] = [
    (2, 0b00, 1),
    (2, 0b01, 2),
    (3, 0b100, 0),
    (3, 0b101, 3),
    (3, 0b110, 4),
    (4, 0b1110, 5),
    (5, 0b11110, 6),
    (6, 0b111110, 7),
    (7, 0b1111110, 8),
    (8, 0b11111110, 9),
    (9, 0b111111110, 10),
    (10, 0b1111111110, 11),
    (11, 0b11111111110, 12),
    (12, 0b111111111110, 13),
    (13, 0b1111111111110, 14),
    (13, 0b1111111111111, 15),
];

/// studio 色度 DC 尺寸码
const STUDIO_DC_CHROMA: [(u8, u16, u8); 16] = [
    (2, 0b00, 0),
    (2, 0b01, 1),
    (2, 0b10, 2),
    (3, 0b110, 3),
    (4, 0b1110, 4),
    (5, 0b11110, 5),
    (6, 0b111110, 6),
    (7, 0b1111110, 7),
    (8, 0b11111110, 8),
    (9, 0b111111110, 9),
    (10, 0b1111111110, 10),
    (11, 0b11111111110, 11),
    (12, 0b111111111110, 12),
    (13, 0b1111111111110, 13),
    (14, 0b11111111111110, 14),
    (14, 0b11111111111111, 15),
];

/// studio AC 类码的 22 个规范码字 (len, code), 按长度升序
///
/// 12 个上下文共用码字集, 符号排列按上下文不同 (见
/// [`STUDIO_AC_GROUP_ORDER`]); 短码分给该上下文中更可能的类.
const STUDIO_AC_CODEWORDS: [(u8, u16); 22] = [
    (2, 0b00),
    (3, 0b010),
    (3, 0b011),
    (4, 0b1000),
    (4, 0b1001),
    (4, 0b1010),
    (5, 0b10110),
    (5, 0b10111),
    (5, 0b11000),
    (5, 0b11001),
    (6, 0b110100),
    (6, 0b110101),
    (6, 0b110110),
    (6, 0b110111),
    (7, 0b1110000),
    (7, 0b1110001),
    (7, 0b1110010),
    (7, 0b1110011),
    (8, 0b11101000),
    (8, 0b11101001),
    (8, 0b11101010),
    (8, 0b11101011),
];

/// 每个上下文的码字序号到 AC 类 (0..=21) 的映射
///
/// 类语义: 0=EOB, 1..=6 零游程, 7..=12 游程加 ±1, 13..=20 电平,
/// 21 逃逸. 上下文 0 为块首, 1 在游程后, 2 在 ±1 系数后, 3..=10 在
/// 对应长度电平后, 11 在逃逸后.
const STUDIO_AC_GROUP_ORDER: [[u8; 22]; 12] = [
    [7, 0, 8, 13, 1, 9, 14, 2, 10, 15, 3, 11, 16, 4, 12, 17, 5, 18, 6, 19, 20, 21],
    [7, 13, 8, 14, 9, 1, 15, 2, 10, 16, 0, 11, 17, 3, 12, 18, 4, 19, 5, 20, 6, 21],
    [0, 7, 1, 8, 13, 2, 9, 14, 3, 10, 15, 4, 11, 16, 5, 12, 17, 6, 18, 19, 20, 21],
    [0, 13, 7, 14, 1, 8, 15, 2, 9, 16, 3, 10, 17, 4, 11, 18, 5, 12, 19, 6, 20, 21],
    [0, 14, 13, 15, 7, 1, 16, 8, 2, 9, 17, 3, 10, 18, 4, 11, 19, 5, 12, 20, 6, 21],
    [0, 15, 14, 16, 13, 7, 1, 17, 8, 2, 9, 18, 3, 10, 19, 4, 11, 20, 5, 12, 6, 21],
    [0, 16, 15, 17, 14, 7, 13, 1, 18, 8, 2, 9, 19, 3, 10, 20, 4, 11, 5, 12, 6, 21],
    [0, 17, 16, 18, 15, 7, 14, 1, 19, 8, 13, 2, 9, 20, 3, 10, 4, 11, 5, 12, 6, 21],
    [0, 18, 17, 19, 16, 7, 15, 1, 20, 8, 14, 2, 13, 9, 3, 10, 4, 11, 5, 12, 6, 21],
    [0, 19, 18, 20, 17, 7, 16, 1, 8, 15, 2, 14, 9, 13, 3, 10, 4, 11, 5, 12, 6, 21],
    [0, 20, 19, 21, 18, 7, 17, 1, 8, 16, 2, 15, 9, 14, 3, 13, 10, 4, 11, 5, 12, 6],
    [0, 21, 13, 14, 7, 15, 1, 16, 8, 17, 2, 18, 9, 19, 3, 20, 10, 4, 11, 5, 12, 6],
];

/// AC 类的状态转移: (附加码位宽, 下一个上下文)
pub(super) const STUDIO_AC_STATE: [(u8, u8); 22] = [
    (0, 0),
    (0, 1),
    (1, 1),
    (2, 1),
    (3, 1),
    (4, 1),
    (5, 1),
    (1, 2),
    (2, 2),
    (3, 2),
    (4, 2),
    (5, 2),
    (6, 2),
    (1, 3),
    (2, 4),
    (3, 5),
    (4, 6),
    (5, 7),
    (6, 8),
    (7, 9),
    (8, 10),
    (0, 11),
];

/// 解码 studio DC 尺寸码
pub(super) fn decode_studio_dc_size(reader: &mut BitReader, luma: bool) -> Option<u8> {
    let table: &[(u8, u16, u8)] = if luma {
        &STUDIO_DC_LUMA
    } else {
        &STUDIO_DC_CHROMA
    };
    for &(len, code, size) in table {
        if let Some(bits) = reader.peek_bits(len)
            && bits as u16 == code
        {
            reader.skip_bits(len as u32);
            return Some(size);
        }
    }
    None
}

/// 解码一个 studio AC 类, `context` 为上一个类的转移结果 (0..=11)
pub(super) fn decode_studio_ac_group(reader: &mut BitReader, context: usize) -> Option<u8> {
    for (idx, &(len, code)) in STUDIO_AC_CODEWORDS.iter().enumerate() {
        if let Some(bits) = reader.peek_bits(len)
            && bits as u16 == code
        {
            reader.skip_bits(len as u32);
            return Some(STUDIO_AC_GROUP_ORDER[context][idx]);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_derived_from_table() {
        let limits = build_limits(INTER_AC_VLC);
        // Inter 表中 (last=0, run=0) 的最大级别为 12
        assert_eq!(limits.max_level[0][0], 12);
        // (last=0, level=1) 的最大游程为 26
        assert_eq!(limits.max_run[0][1], 26);
        // (last=1, level=1) 的最大游程为 40
        assert_eq!(limits.max_run[1][1], 40);

        let limits = build_limits(INTRA_AC_VLC);
        // Intra 表中 (last=0, run=0) 的最大级别为 27
        assert_eq!(limits.max_level[0][0], 27);
        assert_eq!(limits.max_run[0][1], 14);
        assert_eq!(limits.max_level[1][0], 8);
        assert_eq!(limits.max_run[1][1], 20);
    }

    #[test]
    fn test_ac_tables_prefix_free() {
        // 每个 AC 表 (含逃逸码) 内任意两个码字不得互为前缀
        for table in [
            INTRA_AC_VLC,
            INTER_AC_VLC,
            RVLC_INTRA_AC_VLC,
            RVLC_INTER_AC_VLC,
        ] {
            let mut codes: Vec<(u8, u16)> =
                table.iter().map(|&(len, code, ..)| (len, code)).collect();
            codes.sort_unstable();
            for (i, &(la, ca)) in codes.iter().enumerate() {
                for &(lb, cb) in &codes[i + 1..] {
                    if la == lb {
                        assert_ne!(ca, cb, "重复码字: len={la} code={ca:#x}");
                    } else {
                        assert!(la < lb);
                        assert_ne!(
                            (cb >> (lb - la)),
                            ca,
                            "前缀冲突: ({la},{ca:#x}) / ({lb},{cb:#x})"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_intra_ac_mid_table_codeword() {
        // Intra 码 (5, 0xB) = (last=0, run=2, level=1), 符号 0
        let data = [0b0101_1000u8];
        let mut reader = BitReader::new(&data);
        let got = decode_ac_coeff(&mut reader, true).unwrap();
        assert_eq!(got, (false, 2, 1));

        // (9, 0x19) = (last=1, run=0, level=2), 符号 1
        let data = [0b0000_1100, 0b1100_0000];
        let mut reader = BitReader::new(&data);
        let got = decode_ac_coeff(&mut reader, true).unwrap();
        assert_eq!(got, (true, 0, -2));
    }

    #[test]
    fn test_escape_tier1_bias_matches_direct_decode() {
        // 直接路径: Inter 码 (2, 0x2) = (last=0, run=0, level=1), 符号 0
        let direct = [0b1000_0000u8];
        let mut reader = BitReader::new(&direct);
        let got = decode_ac_coeff(&mut reader, false).unwrap();
        assert_eq!(got, (false, 0, 1));

        // 逃逸模式 1: escape(0000011) + 模式位 0 + 同一码字 + 符号 0
        // 期望级别 = 1 + max_level[0][0] = 13
        let esc = [0b0000_0110, 0b1000_0000];
        let mut reader = BitReader::new(&esc);
        let got = decode_ac_coeff(&mut reader, false).unwrap();
        assert_eq!(got, (false, 0, 13));

        // Intra 同样构造, 期望级别 = 1 + max_level[0][0] = 28
        let mut reader = BitReader::new(&esc);
        let got = decode_ac_coeff(&mut reader, true).unwrap();
        assert_eq!(got, (false, 0, 28));
    }

    #[test]
    fn test_escape_tier2_run_bias() {
        // 逃逸模式 2: escape + "10" + (last=0,run=0,level=1) 码字 + 符号 0
        // 期望游程 = 0 + max_run[0][1] + 1 = 27
        let esc = [0b0000_0111, 0b0100_0000];
        let mut reader = BitReader::new(&esc);
        let got = decode_ac_coeff(&mut reader, false).unwrap();
        assert_eq!(got, (false, 27, 1));
    }

    #[test]
    fn test_escape_tier3_flc() {
        // escape(0000011) + "11" + last=1 + run=000011 + marker
        // + level=000000000101 + marker
        let mut bits = String::new();
        bits.push_str("0000011");
        bits.push_str("11");
        bits.push('1'); // last
        bits.push_str("000011"); // run = 3
        bits.push('1'); // marker
        bits.push_str("000000000101"); // level = 5
        bits.push('1'); // marker
        let data = bits_to_bytes(&bits);
        let mut reader = BitReader::new(&data);
        let got = decode_ac_coeff(&mut reader, false).unwrap();
        assert_eq!(got, (true, 3, 5));
    }

    #[test]
    fn test_rvlc_tables_differ_from_forward_tables() {
        // 同一段位串在 RVLC 路径与标准路径下给出不同的 (run, level):
        // RVLC Intra "1011" = (last=0,run=0,level=3), 标准 Intra
        // "10" = (last=0,run=0,level=1) 且后随符号位 1
        let data = [0b1011_0000u8];
        let mut reader = BitReader::new(&data);
        let rvlc = decode_ac_coeff_rvlc(&mut reader, true).unwrap();
        assert_eq!(rvlc, (false, 0, 3));

        let mut reader = BitReader::new(&data);
        let forward = decode_ac_coeff(&mut reader, true).unwrap();
        assert_eq!(forward, (false, 0, -1));
        assert_ne!(rvlc, forward);
    }

    #[test]
    fn test_rvlc_short_code_at_buffer_tail() {
        // 仅 8 位数据, peek 12 位失败, 必须由慢路径解出 3 位短码
        // "111" = (last=0, run=0, level=1) + 符号 0
        let data = [0b1110_0000u8];
        let mut reader = BitReader::new(&data);
        let got = decode_ac_coeff_rvlc(&mut reader, true).unwrap();
        assert_eq!(got, (false, 0, 1));
    }

    #[test]
    fn test_rvlc_escape_flc() {
        // escape(10011) + marker + last=0 + run=000010 + marker
        // + level=00000000101 + 尾部 10000 + 符号 0
        let mut bits = String::new();
        bits.push_str("10011");
        bits.push('1'); // marker
        bits.push('0'); // last
        bits.push_str("000010"); // run = 2
        bits.push('1'); // marker
        bits.push_str("00000000101"); // level = 5
        bits.push_str("10000");
        bits.push('0'); // 符号
        let data = bits_to_bytes(&bits);
        let mut reader = BitReader::new(&data);
        let got = decode_ac_coeff_rvlc(&mut reader, true).unwrap();
        assert_eq!(got, (false, 2, 5));

        // 尾部校验不是 10000 时判损
        let mut bad = bits[..bits.len() - 6].to_string();
        bad.push_str("01000");
        bad.push('0');
        let data = bits_to_bytes(&bad);
        let mut reader = BitReader::new(&data);
        assert!(decode_ac_coeff_rvlc(&mut reader, true).is_err());
    }

    #[test]
    fn test_truncated_escape_errors_out() {
        // 只有逃逸码本身, 后续数据截断
        let esc = [0b0000_0110];
        let mut reader = BitReader::new(&esc);
        assert!(decode_ac_coeff(&mut reader, false).is_err());
    }

    #[test]
    fn test_mcbpc_stuffing_returned() {
        // I-VOP stuffing (000000001, 9 位) 后接 mb_type=0/cbpc=0 码 "1"
        let data = [0b0000_0000, 0b1100_0000];
        let mut reader = BitReader::new(&data);
        let (mb_type, _) = decode_mcbpc_i(&mut reader).unwrap();
        assert_eq!(mb_type, MbType::Stuffing);
        let (mb_type, cbpc) = decode_mcbpc_i(&mut reader).unwrap();
        assert_eq!(mb_type, MbType::Intra);
        assert_eq!(cbpc, 0);
    }

    #[test]
    fn test_intra_dc_sign_extension() {
        // 亮度 dc_size=2 (码 "10") + 值 01 → 差分 = 01 - 3 = -2
        let data = [0b1001_0000];
        let mut reader = BitReader::new(&data);
        assert_eq!(decode_intra_dc(&mut reader, true), Some(-2));
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
