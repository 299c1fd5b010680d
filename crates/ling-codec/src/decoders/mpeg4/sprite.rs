//! sprite / GMC 轨迹解码与 warp 几何求解
//!
//! S-VOP 头携带 0..=3 个轨迹位移点. 求解器把参考点系统换算到 2 的幂
//! 尺寸的虚拟参考点上, 使每像素 warp 坐标可以用移位代替除法. 全程
//! 64 位中间算术, 提交前做显式溢出界检查; 越界时几何整体归零降级,
//! 不向下游传播未定义结果.

use ling_core::{LingError, LingResult};
use log::warn;

use super::bitreader::BitReader;
use super::tables::rounded_div;
use super::types::{SpriteGeometry, VolInfo};

/// 轨迹位移长度前缀 VLC: 下标即位长, 值为 (码字, 码长)
const TRAJECTORY_VLC: [(u16, u8); 15] = [
    (0x00, 2),
    (0x02, 3),
    (0x03, 3),
    (0x04, 3),
    (0x05, 3),
    (0x06, 3),
    (0x0E, 4),
    (0x1E, 5),
    (0x3E, 6),
    (0x7E, 7),
    (0xFE, 8),
    (0x1FE, 9),
    (0x3FE, 10),
    (0x7FE, 11),
    (0xFFE, 12),
];

/// 解一个轨迹长度前缀 (0..=14)
fn decode_trajectory_length(reader: &mut BitReader) -> Option<u8> {
    for (value, &(code, len)) in TRAJECTORY_VLC.iter().enumerate() {
        if reader.peek_bits(len) == Some(code as u32) {
            reader.skip_bits(len as u32);
            return Some(value as u8);
        }
    }
    None
}

/// 读取 n 位带符号值: 最高位为 0 表示负数 (偏置编码)
fn read_xbits(reader: &mut BitReader, n: u8) -> Option<i32> {
    let v = reader.read_bits(n)? as i32;
    if v >> (n - 1) == 0 {
        Some(v - ((1 << n) - 1))
    } else {
        Some(v)
    }
}

/// 解码 sprite 轨迹并求解 warp 几何
///
/// `divx500b413` 为 DivX 5.00 build 413 的两处码流偏差: 轨迹点间缺
/// marker bit, 且参考点累加不做半精度折算.
pub(super) fn decode_sprite_trajectory(
    reader: &mut BitReader,
    vol: &VolInfo,
    width: u32,
    height: u32,
    divx500b413: bool,
) -> LingResult<SpriteGeometry> {
    let a: i32 = 2 << vol.sprite_warping_accuracy;
    let rho: i32 = 3 - vol.sprite_warping_accuracy as i32;
    let r: i32 = 16 / a;
    let w = width as i32;
    let h = height as i32;

    if w <= 0 || h <= 0 {
        return Err(LingError::InvalidData("sprite 求解前未设置图像尺寸".into()));
    }

    let mut geometry = SpriteGeometry::default();
    let mut d = [[0i32; 2]; 4];

    for point in 0..vol.sprite_warping_points as usize {
        let err = || LingError::InvalidData("sprite 轨迹截断".into());
        let len_x = decode_trajectory_length(reader)
            .ok_or_else(|| LingError::InvalidData("sprite 轨迹长度码非法".into()))?;
        let x = if len_x > 0 {
            read_xbits(reader, len_x).ok_or_else(err)?
        } else {
            0
        };
        if !divx500b413 {
            reader.check_marker("sprite 轨迹 x 之后");
        }
        let len_y = decode_trajectory_length(reader)
            .ok_or_else(|| LingError::InvalidData("sprite 轨迹长度码非法".into()))?;
        let y = if len_y > 0 {
            read_xbits(reader, len_y).ok_or_else(err)?
        } else {
            0
        };
        reader.check_marker("sprite 轨迹 y 之后");
        d[point] = [x, y];
        geometry.trajectory[point] = [x, y];
    }

    // 矩形形状的 VOP 参考点: 四角
    let vop_ref = [[0, 0], [w, 0], [0, h], [w, h]];

    let mut alpha = 1i32;
    let mut beta = 0i32;
    while (1 << alpha) < w {
        alpha += 1;
    }
    while (1 << beta) < h {
        beta += 1;
    }
    let w2: i32 = 1 << alpha;
    let h2: i32 = 1 << beta;

    // 第 4 个轨迹点 GMC 不使用
    let mut sprite_ref = [[0i32; 2]; 3];
    if divx500b413 {
        for i in 0..3 {
            let (dx, dy) = match i {
                0 => (d[0][0], d[0][1]),
                1 => (d[0][0] + d[1][0], d[0][1] + d[1][1]),
                _ => (d[0][0] + d[2][0], d[0][1] + d[2][1]),
            };
            sprite_ref[i][0] = a * vop_ref[i][0] + dx;
            sprite_ref[i][1] = a * vop_ref[i][1] + dy;
        }
    } else {
        for i in 0..3 {
            let (dx, dy) = match i {
                0 => (d[0][0], d[0][1]),
                1 => (d[0][0] + d[1][0], d[0][1] + d[1][1]),
                _ => (d[0][0] + d[2][0], d[0][1] + d[2][1]),
            };
            sprite_ref[i][0] = (a >> 1) * (2 * vop_ref[i][0] + dx);
            sprite_ref[i][1] = (a >> 1) * (2 * vop_ref[i][1] + dy);
        }
    }

    // 把点间距从 w/h 域换算到 2 的幂的 w2/h2 域
    let vref = |i: usize, c: usize| vop_ref[i][c] as i64;
    let sref = |i: usize, c: usize| sprite_ref[i][c] as i64;
    let r64 = r as i64;
    let virtual_ref: [[i64; 2]; 2] = [
        [
            16 * (vref(0, 0) + w2 as i64)
                + rounded_div(
                    (w as i64 - w2 as i64) * (r64 * sref(0, 0) - 16 * vref(0, 0))
                        + w2 as i64 * (r64 * sref(1, 0) - 16 * vref(1, 0)),
                    w as i64,
                ),
            16 * vref(0, 1)
                + rounded_div(
                    (w as i64 - w2 as i64) * (r64 * sref(0, 1) - 16 * vref(0, 1))
                        + w2 as i64 * (r64 * sref(1, 1) - 16 * vref(1, 1)),
                    w as i64,
                ),
        ],
        [
            16 * vref(0, 0)
                + rounded_div(
                    (h as i64 - h2 as i64) * (r64 * sref(0, 0) - 16 * vref(0, 0))
                        + h2 as i64 * (r64 * sref(2, 0) - 16 * vref(2, 0)),
                    h as i64,
                ),
            16 * (vref(0, 1) + h2 as i64)
                + rounded_div(
                    (h as i64 - h2 as i64) * (r64 * sref(0, 1) - 16 * vref(0, 1))
                        + h2 as i64 * (r64 * sref(2, 1) - 16 * vref(2, 1)),
                    h as i64,
                ),
        ],
    ];

    let mut offset = [[0i64; 2]; 2];
    let mut delta = [[0i64; 2]; 2];
    let mut shift = [0u8; 2];

    match vol.sprite_warping_points {
        0 => {
            delta[0][0] = a as i64;
            delta[1][1] = a as i64;
        }
        1 => {
            // 纯平移 GMC
            offset[0][0] = sref(0, 0) - a as i64 * vref(0, 0);
            offset[0][1] = sref(0, 1) - a as i64 * vref(0, 1);
            offset[1][0] =
                ((sprite_ref[0][0] >> 1) | (sprite_ref[0][0] & 1)) as i64
                    - a as i64 * (vref(0, 0) / 2);
            offset[1][1] =
                ((sprite_ref[0][1] >> 1) | (sprite_ref[0][1] & 1)) as i64
                    - a as i64 * (vref(0, 1) / 2);
            delta[0][0] = a as i64;
            delta[1][1] = a as i64;
        }
        2 => {
            let sh = alpha + rho;
            offset[0][0] = sref(0, 0) * (1i64 << sh)
                + (-r64 * sref(0, 0) + virtual_ref[0][0]) * (-vref(0, 0))
                + (r64 * sref(0, 1) - virtual_ref[0][1]) * (-vref(0, 1))
                + (1i64 << (sh - 1));
            offset[0][1] = sref(0, 1) * (1i64 << sh)
                + (-r64 * sref(0, 1) + virtual_ref[0][1]) * (-vref(0, 0))
                + (-r64 * sref(0, 0) + virtual_ref[0][0]) * (-vref(0, 1))
                + (1i64 << (sh - 1));
            offset[1][0] = (-r64 * sref(0, 0) + virtual_ref[0][0]) * (-2 * vref(0, 0) + 1)
                + (r64 * sref(0, 1) - virtual_ref[0][1]) * (-2 * vref(0, 1) + 1)
                + 2 * w2 as i64 * r64 * sref(0, 0)
                - 16 * w2 as i64
                + (1i64 << (sh + 1));
            offset[1][1] = (-r64 * sref(0, 1) + virtual_ref[0][1]) * (-2 * vref(0, 0) + 1)
                + (-r64 * sref(0, 0) + virtual_ref[0][0]) * (-2 * vref(0, 1) + 1)
                + 2 * w2 as i64 * r64 * sref(0, 1)
                - 16 * w2 as i64
                + (1i64 << (sh + 1));
            delta[0][0] = -r64 * sref(0, 0) + virtual_ref[0][0];
            delta[0][1] = r64 * sref(0, 1) - virtual_ref[0][1];
            delta[1][0] = -r64 * sref(0, 1) + virtual_ref[0][1];
            delta[1][1] = -r64 * sref(0, 0) + virtual_ref[0][0];
            shift[0] = sh as u8;
            shift[1] = (sh + 2) as u8;
        }
        _ => {
            let min_ab = alpha.min(beta);
            let w3 = (w2 >> min_ab) as i64;
            let h3 = (h2 >> min_ab) as i64;
            let sh = alpha + beta + rho - min_ab;
            offset[0][0] = sref(0, 0) * (1i64 << sh)
                + (-r64 * sref(0, 0) + virtual_ref[0][0]) * h3 * (-vref(0, 0))
                + (-r64 * sref(0, 0) + virtual_ref[1][0]) * w3 * (-vref(0, 1))
                + (1i64 << (sh - 1));
            offset[0][1] = sref(0, 1) * (1i64 << sh)
                + (-r64 * sref(0, 1) + virtual_ref[0][1]) * h3 * (-vref(0, 0))
                + (-r64 * sref(0, 1) + virtual_ref[1][1]) * w3 * (-vref(0, 1))
                + (1i64 << (sh - 1));
            offset[1][0] = (-r64 * sref(0, 0) + virtual_ref[0][0]) * h3 * (-2 * vref(0, 0) + 1)
                + (-r64 * sref(0, 0) + virtual_ref[1][0]) * w3 * (-2 * vref(0, 1) + 1)
                + 2 * w2 as i64 * h3 * r64 * sref(0, 0)
                - 16 * w2 as i64 * h3
                + (1i64 << (sh + 1));
            offset[1][1] = (-r64 * sref(0, 1) + virtual_ref[0][1]) * h3 * (-2 * vref(0, 0) + 1)
                + (-r64 * sref(0, 1) + virtual_ref[1][1]) * w3 * (-2 * vref(0, 1) + 1)
                + 2 * w2 as i64 * h3 * r64 * sref(0, 1)
                - 16 * w2 as i64 * h3
                + (1i64 << (sh + 1));
            delta[0][0] = (-r64 * sref(0, 0) + virtual_ref[0][0]) * h3;
            delta[0][1] = (-r64 * sref(0, 0) + virtual_ref[1][0]) * w3;
            delta[1][0] = (-r64 * sref(0, 1) + virtual_ref[0][1]) * h3;
            delta[1][1] = (-r64 * sref(0, 1) + virtual_ref[1][1]) * w3;
            shift[0] = sh as u8;
            shift[1] = (sh + 2) as u8;
        }
    }

    // 退化判定: 变换矩阵等于纯缩放时化简为 1 点平移
    if delta[0][0] == (a as i64) << shift[0]
        && delta[0][1] == 0
        && delta[1][0] == 0
        && delta[1][1] == (a as i64) << shift[0]
    {
        offset[0][0] >>= shift[0];
        offset[0][1] >>= shift[0];
        offset[1][0] >>= shift[1];
        offset[1][1] >>= shift[1];
        delta[0][0] = a as i64;
        delta[0][1] = 0;
        delta[1][0] = 0;
        delta[1][1] = a as i64;
        shift = [0, 0];
        geometry.real_warping_points = 1;
    } else {
        let shift_y = 16 - shift[0] as i32;
        let shift_c = 16 - shift[1] as i32;
        let int_max = i32::MAX as i64;

        for i in 0..2 {
            if shift_c < 0
                || shift_y < 0
                || offset[0][i].abs() >= int_max >> shift_y
                || offset[1][i].abs() >= int_max >> shift_c
                || delta[0][i].abs() >= int_max >> shift_y
                || delta[1][i].abs() >= int_max >> shift_y
            {
                warn!("sprite 位移/偏移过大, warp 几何归零降级");
                return Ok(SpriteGeometry {
                    trajectory: geometry.trajectory,
                    ..SpriteGeometry::default()
                });
            }
        }

        for i in 0..2 {
            offset[0][i] <<= shift_y;
            offset[1][i] <<= shift_c;
            delta[0][i] <<= shift_y;
            delta[1][i] <<= shift_y;
        }
        shift = [16, 16];

        for i in 0..2 {
            let sd = [
                delta[i][0] - a as i64 * (1i64 << 16),
                delta[i][1] - a as i64 * (1i64 << 16),
            ];
            let w16 = w as i64 + 16;
            let h16 = h as i64 + 16;
            if (offset[0][i] + delta[i][0] * w16).abs() >= int_max
                || (offset[0][i] + delta[i][1] * h16).abs() >= int_max
                || (offset[0][i] + delta[i][0] * w16 + delta[i][1] * h16).abs() >= int_max
                || (delta[i][0] * w16).abs() >= int_max
                || (delta[i][1] * h16).abs() >= int_max
                || sd[0].abs() >= int_max
                || sd[1].abs() >= int_max
                || (offset[0][i] + sd[0] * w16).abs() >= int_max
                || (offset[0][i] + sd[1] * h16).abs() >= int_max
                || (offset[0][i] + sd[0] * w16 + sd[1] * h16).abs() >= int_max
            {
                warn!("sprite 点求解溢出, warp 几何归零降级");
                return Ok(SpriteGeometry {
                    trajectory: geometry.trajectory,
                    ..SpriteGeometry::default()
                });
            }
        }
        geometry.real_warping_points = vol.sprite_warping_points;
    }

    for i in 0..2 {
        for c in 0..2 {
            geometry.offset[i][c] = offset[i][c] as i32;
            geometry.delta[i][c] = delta[i][c] as i32;
        }
    }
    geometry.shift = shift;
    Ok(geometry)
}

/// GMC 宏块的平均运动向量 (mcsel=1 时宏块不携带 MVD)
///
/// 1 点 warp 为纯平移, 直接由偏移换算; 0 点无位移. 多点 warp 对宏块
/// 16x16 区域的 warp 坐标取平均并按精度折算.
pub(super) fn gmc_motion_vector(
    geometry: &SpriteGeometry,
    accuracy: u8,
    quarter_sample: bool,
    mb_x: usize,
    mb_y: usize,
) -> (i16, i16) {
    let a = 2i32 << accuracy;
    match geometry.real_warping_points {
        0 => (0, 0),
        1 => {
            // 偏移在精度域, 折算到半像素 (或 1/4 像素) 域
            let scale = if quarter_sample { 4 } else { 2 };
            let mx = geometry.offset[0][0] * scale / a;
            let my = geometry.offset[0][1] * scale / a;
            (mx as i16, my as i16)
        }
        _ => {
            // 宏块中心的 warp 位移
            let x = (mb_x as i64 * 16 + 8) << 16;
            let y = (mb_y as i64 * 16 + 8) << 16;
            let cx = x >> 16;
            let cy = y >> 16;
            let wx = (geometry.offset[0][0] as i64
                + geometry.delta[0][0] as i64 * cx
                + geometry.delta[0][1] as i64 * cy)
                >> geometry.shift[0];
            let wy = (geometry.offset[0][1] as i64
                + geometry.delta[1][0] as i64 * cx
                + geometry.delta[1][1] as i64 * cy)
                >> geometry.shift[0];
            let scale = if quarter_sample { 4i64 } else { 2 };
            let mx = (wx - (cx << 4)) * scale / 16;
            let my = (wy - (cy << 4)) * scale / 16;
            (
                mx.clamp(i16::MIN as i64, i16::MAX as i64) as i16,
                my.clamp(i16::MIN as i64, i16::MAX as i64) as i16,
            )
        }
    }
}
