//! 数学工具 - 约束求解用到的小型矩阵/向量运算
//!
//! 雅可比矩阵按"行"存储：每一行是一个受约束方向，
//! 超出约束自由度的行保持为零。

use glam::{Mat3, Quat, Vec3};

// ============================================================================
// 常量
// ============================================================================

/// 平方长度判定阈值（小于此值视为零向量）
pub const EPSILON: f32 = 1e-7;

/// 退化轴回退时优先尝试的参考方向
pub const UP: Vec3 = Vec3::Y;

/// 上方向不可用时的第二参考方向
pub const RIGHT: Vec3 = Vec3::X;

// ============================================================================
// 矩阵构造
// ============================================================================

/// 由三行构造矩阵
#[inline]
pub fn from_rows(r0: Vec3, r1: Vec3, r2: Vec3) -> Mat3 {
    Mat3::from_cols(r0, r1, r2).transpose()
}

/// 叉乘矩阵 `[v]×`，满足 `[v]× * u == v.cross(u)`
#[inline]
pub fn cross_matrix(v: Vec3) -> Mat3 {
    Mat3::from_cols(
        Vec3::new(0.0, v.z, -v.y),
        Vec3::new(-v.z, 0.0, v.x),
        Vec3::new(v.y, -v.x, 0.0),
    )
}

/// 自适应求逆
///
/// 依次尝试：完整 3x3 → 左上/右下/四角 2x2 子块 → 单个对角元素 → 零矩阵。
/// 秩亏矩阵（平行轴、未使用的约束行）退化为子块的逆，而不是产生 Inf/NaN。
pub fn adaptive_invert(m: Mat3) -> Mat3 {
    let determinant = m.determinant();
    if determinant != 0.0 {
        let inverse = m.inverse();
        if inverse.is_finite() {
            return inverse;
        }
    }

    let (m11, m12, m13) = (m.x_axis.x, m.y_axis.x, m.z_axis.x);
    let (m21, m22, m23) = (m.x_axis.y, m.y_axis.y, m.z_axis.y);
    let (m31, m32, m33) = (m.x_axis.z, m.y_axis.z, m.z_axis.z);

    // (行, 列) 索引对的 2x2 子块
    let blocks = [
        ((0usize, 1usize), (m11, m12, m21, m22)),
        ((1, 2), (m22, m23, m32, m33)),
        ((0, 2), (m11, m13, m31, m33)),
    ];
    for ((i, j), (a, b, c, d)) in blocks {
        let det = a * d - b * c;
        if det == 0.0 {
            continue;
        }
        let inv = 1.0 / det;
        if !inv.is_finite() {
            continue;
        }
        let mut cols = [Vec3::ZERO; 3];
        cols[i][i] = d * inv;
        cols[j][i] = -b * inv;
        cols[i][j] = -c * inv;
        cols[j][j] = a * inv;
        return Mat3::from_cols(cols[0], cols[1], cols[2]);
    }

    for (i, value) in [m11, m22, m33].into_iter().enumerate() {
        if value != 0.0 && (1.0 / value).is_finite() {
            let mut diagonal = Vec3::ZERO;
            diagonal[i] = 1.0 / value;
            return Mat3::from_diagonal(diagonal);
        }
    }

    Mat3::ZERO
}

// ============================================================================
// 向量工具
// ============================================================================

/// 反余弦（先钳制到 [-1, 1]，防止浮点越界产生 NaN）
#[inline]
pub fn safe_acos(dot: f32) -> f32 {
    dot.clamp(-1.0, 1.0).acos()
}

/// 两向量夹角，取值 [0, π]
///
/// 用 atan2(|a × b|, a · b)：接近 0 和 π 时 acos 在 f32 下只能分辨到约 5e-4 rad，
/// atan2 在整个区间内都保持精度；点积越界时同样返回 0 或 π。
#[inline]
pub fn angle_between(a: Vec3, b: Vec3) -> f32 {
    a.cross(b).length().atan2(a.dot(b))
}

/// 归一化；平方长度不足 EPSILON 时返回 None
#[inline]
pub fn try_normalize(v: Vec3) -> Option<Vec3> {
    let length_squared = v.length_squared();
    if length_squared > EPSILON {
        Some(v / length_squared.sqrt())
    } else {
        None
    }
}

/// 与 `axis` 垂直的单位向量：先用 `axis × UP`，退化时改用 `axis × RIGHT`
pub fn perpendicular(axis: Vec3) -> Vec3 {
    try_normalize(axis.cross(UP)).unwrap_or_else(|| axis.cross(RIGHT).normalize_or_zero())
}

/// 把 `from` 转到 `to` 的最短旋转（两者均为单位向量）
#[inline]
pub fn rotation_between(from: Vec3, to: Vec3) -> Quat {
    Quat::from_rotation_arc(from, to)
}

/// 旋转四元数的"旋转向量"（轴 * 角度），取最短路径
pub fn rotation_vector(q: Quat) -> Vec3 {
    let q = if q.w < 0.0 { -q } else { q };
    let (axis, angle) = q.normalize().to_axis_angle();
    if angle.is_finite() && axis.is_finite() {
        axis * angle
    } else {
        Vec3::ZERO
    }
}
