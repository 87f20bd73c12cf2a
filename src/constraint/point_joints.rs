//! 锚点类关节：球窝、距离、距离限位、点在线上、点在平面上
//!
//! 锚点和轴都以骨骼本地坐标存储；世界坐标访问器需要传入对应骨骼。

use glam::{Mat3, Vec3};

use crate::math::{cross_matrix, from_rows, perpendicular, try_normalize};
use crate::skeleton::Bone;

use super::joint::JointJacobians;
use super::BoneJacobian;

// ============================================================================
// 公共几何
// ============================================================================

/// 两锚点之间的分离量
struct Separation {
    offset_a: Vec3,
    offset_b: Vec3,
    /// 从 A 指向 B 的单位方向；两锚点重合时为零
    direction: Vec3,
    distance: f32,
}

impl Separation {
    fn measure(a: &Bone, b: &Bone, local_anchor_a: Vec3, local_anchor_b: Vec3) -> Self {
        let offset_a = a.local_to_world_vector(local_anchor_a);
        let offset_b = b.local_to_world_vector(local_anchor_b);
        let separation = (b.position + offset_b) - (a.position + offset_a);
        let distance = separation.length();
        let direction = try_normalize(separation).unwrap_or(Vec3::ZERO);
        Self {
            offset_a,
            offset_b,
            direction,
            distance,
        }
    }

    /// 单行雅可比；`direction` 为 A 侧的方向（B 侧取反）
    fn jacobians(&self, direction: Vec3, bias: f32) -> JointJacobians {
        JointJacobians {
            a: BoneJacobian::new(
                from_rows(direction, Vec3::ZERO, Vec3::ZERO),
                from_rows(self.offset_a.cross(direction), Vec3::ZERO, Vec3::ZERO),
            ),
            // linear_b = -linear_a，交换叉乘顺序即可
            b: BoneJacobian::new(
                from_rows(-direction, Vec3::ZERO, Vec3::ZERO),
                from_rows(direction.cross(self.offset_b), Vec3::ZERO, Vec3::ZERO),
            ),
            velocity_bias: Vec3::new(bias, 0.0, 0.0),
        }
    }
}

// ============================================================================
// 球窝关节
// ============================================================================

/// 球窝关节：两骨骼上的锚点重合（3 个线性自由度）
#[derive(Clone, Debug)]
pub struct BallSocketJoint {
    /// A 质心到锚点的本地偏移
    pub local_offset_a: Vec3,
    /// B 质心到锚点的本地偏移
    pub local_offset_b: Vec3,
}

impl BallSocketJoint {
    /// 以世界锚点创建
    pub fn new(a: &Bone, b: &Bone, anchor: Vec3) -> Self {
        Self {
            local_offset_a: a.world_to_local_vector(anchor - a.position),
            local_offset_b: b.world_to_local_vector(anchor - b.position),
        }
    }

    pub fn offset_a(&self, a: &Bone) -> Vec3 {
        a.local_to_world_vector(self.local_offset_a)
    }

    pub fn set_offset_a(&mut self, a: &Bone, offset: Vec3) {
        self.local_offset_a = a.world_to_local_vector(offset);
    }

    pub fn offset_b(&self, b: &Bone) -> Vec3 {
        b.local_to_world_vector(self.local_offset_b)
    }

    pub fn set_offset_b(&mut self, b: &Bone, offset: Vec3) {
        self.local_offset_b = b.world_to_local_vector(offset);
    }

    pub(crate) fn jacobians(&self, a: &Bone, b: &Bone, error_correction_factor: f32) -> JointJacobians {
        let r_a = a.local_to_world_vector(self.local_offset_a);
        let r_b = b.local_to_world_vector(self.local_offset_b);

        // 相对速度按 A - B 计算，B 的雅可比取反
        let linear_error = (b.position + r_b) - (a.position + r_a);
        JointJacobians {
            a: BoneJacobian::new(Mat3::IDENTITY, cross_matrix(r_a).transpose()),
            b: BoneJacobian::new(-Mat3::IDENTITY, cross_matrix(r_b)),
            velocity_bias: linear_error * error_correction_factor,
        }
    }
}

// ============================================================================
// 距离关节
// ============================================================================

/// 距离关节：两锚点保持固定距离（1 个自由度）
#[derive(Clone, Debug)]
pub struct DistanceJoint {
    pub local_anchor_a: Vec3,
    pub local_anchor_b: Vec3,
    distance: f32,
}

impl DistanceJoint {
    /// 以世界锚点创建，目标距离取当前锚点距离
    pub fn new(a: &Bone, b: &Bone, anchor_a: Vec3, anchor_b: Vec3) -> Self {
        Self {
            local_anchor_a: a.world_to_local_point(anchor_a),
            local_anchor_b: b.world_to_local_point(anchor_b),
            distance: anchor_a.distance(anchor_b),
        }
    }

    pub fn anchor_a(&self, a: &Bone) -> Vec3 {
        a.local_to_world_point(self.local_anchor_a)
    }

    pub fn set_anchor_a(&mut self, a: &Bone, anchor: Vec3) {
        self.local_anchor_a = a.world_to_local_point(anchor);
    }

    pub fn anchor_b(&self, b: &Bone) -> Vec3 {
        b.local_to_world_point(self.local_anchor_b)
    }

    pub fn set_anchor_b(&mut self, b: &Bone, anchor: Vec3) {
        self.local_anchor_b = b.world_to_local_point(anchor);
    }

    #[inline]
    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// 设置目标距离（负值钳制为 0）
    pub fn set_distance(&mut self, distance: f32) {
        self.distance = distance.max(0.0);
    }

    pub(crate) fn jacobians(&self, a: &Bone, b: &Bone, error_correction_factor: f32) -> JointJacobians {
        let separation = Separation::measure(a, b, self.local_anchor_a, self.local_anchor_b);
        if separation.direction == Vec3::ZERO {
            // 锚点重合：方向未定义，本步不施加约束
            return separation.jacobians(Vec3::ZERO, 0.0);
        }
        let bias = error_correction_factor * (separation.distance - self.distance);
        separation.jacobians(separation.direction, bias)
    }
}

// ============================================================================
// 距离限位
// ============================================================================

/// 距离限位：锚点距离保持在 [minimum, maximum] 内（单向）
#[derive(Clone, Debug)]
pub struct DistanceLimit {
    pub local_anchor_a: Vec3,
    pub local_anchor_b: Vec3,
    minimum_distance: f32,
    maximum_distance: f32,
}

impl DistanceLimit {
    pub fn new(
        a: &Bone,
        b: &Bone,
        anchor_a: Vec3,
        anchor_b: Vec3,
        minimum_distance: f32,
        maximum_distance: f32,
    ) -> Self {
        Self {
            local_anchor_a: a.world_to_local_point(anchor_a),
            local_anchor_b: b.world_to_local_point(anchor_b),
            minimum_distance: minimum_distance.max(0.0),
            maximum_distance: maximum_distance.max(0.0),
        }
    }

    pub fn anchor_a(&self, a: &Bone) -> Vec3 {
        a.local_to_world_point(self.local_anchor_a)
    }

    pub fn set_anchor_a(&mut self, a: &Bone, anchor: Vec3) {
        self.local_anchor_a = a.world_to_local_point(anchor);
    }

    pub fn anchor_b(&self, b: &Bone) -> Vec3 {
        b.local_to_world_point(self.local_anchor_b)
    }

    pub fn set_anchor_b(&mut self, b: &Bone, anchor: Vec3) {
        self.local_anchor_b = b.world_to_local_point(anchor);
    }

    #[inline]
    pub fn minimum_distance(&self) -> f32 {
        self.minimum_distance
    }

    pub fn set_minimum_distance(&mut self, distance: f32) {
        self.minimum_distance = distance.max(0.0);
    }

    #[inline]
    pub fn maximum_distance(&self) -> f32 {
        self.maximum_distance
    }

    pub fn set_maximum_distance(&mut self, distance: f32) {
        self.maximum_distance = distance.max(0.0);
    }

    pub(crate) fn jacobians(&self, a: &Bone, b: &Bone, error_correction_factor: f32) -> JointJacobians {
        let separation = Separation::measure(a, b, self.local_anchor_a, self.local_anchor_b);
        let direction = separation.direction;
        if direction == Vec3::ZERO {
            return separation.jacobians(Vec3::ZERO, 0.0);
        }

        let distance = separation.distance;
        let (min, max) = (self.minimum_distance, self.maximum_distance);
        if distance > max {
            // 超过最大距离：拉近
            separation.jacobians(direction, error_correction_factor * (distance - max))
        } else if distance < min {
            // 小于最小距离：推开，雅可比取反保证只朝合法方向推
            separation.jacobians(-direction, error_correction_factor * (min - distance))
        } else if distance - min > (max - min) * 0.5 {
            // 区间内、更靠近最大值：投机偏置，允许一直运动到边界
            separation.jacobians(direction, distance - max)
        } else {
            // 区间内、更靠近最小值
            separation.jacobians(-direction, min - distance)
        }
    }
}

// ============================================================================
// 点在线上
// ============================================================================

/// 点在线上：B 上的点被约束在 A 上的一条直线内（2 个自由度）
#[derive(Clone, Debug)]
pub struct PointOnLineJoint {
    pub local_line_anchor: Vec3,
    pub local_anchor_b: Vec3,
    local_line_direction: Vec3,
    local_restricted_axis_1: Vec3,
    local_restricted_axis_2: Vec3,
}

impl PointOnLineJoint {
    pub fn new(a: &Bone, b: &Bone, line_anchor: Vec3, line_direction: Vec3, anchor_b: Vec3) -> Self {
        let mut joint = Self {
            local_line_anchor: a.world_to_local_point(line_anchor),
            local_anchor_b: b.world_to_local_point(anchor_b),
            local_line_direction: Vec3::Y,
            local_restricted_axis_1: Vec3::X,
            local_restricted_axis_2: Vec3::Z,
        };
        joint.set_line_direction(a, line_direction);
        joint
    }

    pub fn line_anchor(&self, a: &Bone) -> Vec3 {
        a.local_to_world_point(self.local_line_anchor)
    }

    pub fn set_line_anchor(&mut self, a: &Bone, anchor: Vec3) {
        self.local_line_anchor = a.world_to_local_point(anchor);
    }

    pub fn line_direction(&self, a: &Bone) -> Vec3 {
        a.local_to_world_vector(self.local_line_direction)
    }

    pub fn set_line_direction(&mut self, a: &Bone, direction: Vec3) {
        self.set_local_line_direction(a.world_to_local_vector(direction));
    }

    #[inline]
    pub fn local_line_direction(&self) -> Vec3 {
        self.local_line_direction
    }

    /// 设置本地直线方向并重新计算两条受限轴
    pub fn set_local_line_direction(&mut self, direction: Vec3) {
        self.local_line_direction = direction.normalize_or_zero();
        self.local_restricted_axis_1 = perpendicular(self.local_line_direction);
        // 两个互相垂直的单位向量叉乘，无需归一化
        self.local_restricted_axis_2 = self.local_restricted_axis_1.cross(self.local_line_direction);
    }

    pub fn anchor_b(&self, b: &Bone) -> Vec3 {
        b.local_to_world_point(self.local_anchor_b)
    }

    pub fn set_anchor_b(&mut self, b: &Bone, anchor: Vec3) {
        self.local_anchor_b = b.world_to_local_point(anchor);
    }

    pub(crate) fn jacobians(&self, a: &Bone, b: &Bone, error_correction_factor: f32) -> JointJacobians {
        let axis_1 = a.local_to_world_vector(self.local_restricted_axis_1);
        let axis_2 = a.local_to_world_vector(self.local_restricted_axis_2);
        let line_anchor = a.local_to_world_point(self.local_line_anchor);
        let line_direction = a.local_to_world_vector(self.local_line_direction);

        let r_b = b.local_to_world_vector(self.local_anchor_b);
        let point = b.position + r_b;

        // 直线上离 B 点最近的点
        let along = (point - line_anchor).dot(line_direction);
        let near_point = line_anchor + line_direction * along;
        let r_a = near_point - a.position;

        let error = point - near_point;
        let velocity_bias = Vec3::new(error.dot(axis_1), error.dot(axis_2), 0.0) * error_correction_factor;

        JointJacobians {
            a: BoneJacobian::new(
                from_rows(axis_1, axis_2, Vec3::ZERO),
                from_rows(r_a.cross(axis_1), r_a.cross(axis_2), Vec3::ZERO),
            ),
            b: BoneJacobian::new(
                from_rows(-axis_1, -axis_2, Vec3::ZERO),
                from_rows(axis_1.cross(r_b), axis_2.cross(r_b), Vec3::ZERO),
            ),
            velocity_bias,
        }
    }
}

// ============================================================================
// 点在平面上
// ============================================================================

/// 点在平面上：B 上的点被约束在 A 上的平面内（1 个自由度）
#[derive(Clone, Debug)]
pub struct PointOnPlaneJoint {
    pub local_plane_anchor: Vec3,
    pub local_anchor_b: Vec3,
    local_plane_normal: Vec3,
}

impl PointOnPlaneJoint {
    pub fn new(a: &Bone, b: &Bone, plane_anchor: Vec3, plane_normal: Vec3, anchor_b: Vec3) -> Self {
        Self {
            local_plane_anchor: a.world_to_local_point(plane_anchor),
            local_anchor_b: b.world_to_local_point(anchor_b),
            local_plane_normal: a.world_to_local_vector(plane_normal.normalize_or_zero()),
        }
    }

    pub fn plane_anchor(&self, a: &Bone) -> Vec3 {
        a.local_to_world_point(self.local_plane_anchor)
    }

    pub fn set_plane_anchor(&mut self, a: &Bone, anchor: Vec3) {
        self.local_plane_anchor = a.world_to_local_point(anchor);
    }

    pub fn plane_normal(&self, a: &Bone) -> Vec3 {
        a.local_to_world_vector(self.local_plane_normal)
    }

    pub fn set_plane_normal(&mut self, a: &Bone, normal: Vec3) {
        self.local_plane_normal = a.world_to_local_vector(normal.normalize_or_zero());
    }

    #[inline]
    pub fn local_plane_normal(&self) -> Vec3 {
        self.local_plane_normal
    }

    pub fn set_local_plane_normal(&mut self, normal: Vec3) {
        self.local_plane_normal = normal.normalize_or_zero();
    }

    pub fn anchor_b(&self, b: &Bone) -> Vec3 {
        b.local_to_world_point(self.local_anchor_b)
    }

    pub fn set_anchor_b(&mut self, b: &Bone, anchor: Vec3) {
        self.local_anchor_b = b.world_to_local_point(anchor);
    }

    pub(crate) fn jacobians(&self, a: &Bone, b: &Bone, error_correction_factor: f32) -> JointJacobians {
        let plane_anchor = a.local_to_world_point(self.local_plane_anchor);
        let normal = a.local_to_world_vector(self.local_plane_normal);

        let r_b = b.local_to_world_vector(self.local_anchor_b);
        let point = b.position + r_b;
        // A 上的作用点取 B 点本身
        let r_a = point - a.position;

        let error = (point - plane_anchor).dot(normal);
        JointJacobians {
            a: BoneJacobian::new(
                from_rows(normal, Vec3::ZERO, Vec3::ZERO),
                from_rows(r_a.cross(normal), Vec3::ZERO, Vec3::ZERO),
            ),
            b: BoneJacobian::new(
                from_rows(-normal, Vec3::ZERO, Vec3::ZERO),
                from_rows(normal.cross(r_b), Vec3::ZERO, Vec3::ZERO),
            ),
            velocity_bias: Vec3::new(error * error_correction_factor, 0.0, 0.0),
        }
    }
}
