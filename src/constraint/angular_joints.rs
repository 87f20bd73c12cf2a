//! 角度类关节：旋转铰链、摆动限位、旋转铰链（swivel）、扭转限位
//!
//! 只约束角速度，雅可比的线性块恒为零。

use std::f32::consts::{FRAC_PI_2, PI};

use glam::Vec3;

use crate::math::{angle_between, from_rows, perpendicular, rotation_between, safe_acos, try_normalize};
use crate::skeleton::Bone;

use super::joint::JointJacobians;
use super::BoneJacobian;

/// 单行角度约束：A 侧行为 `axis`，B 侧取反
fn single_row(axis: Vec3, bias: f32) -> JointJacobians {
    JointJacobians {
        a: BoneJacobian::angular(from_rows(axis, Vec3::ZERO, Vec3::ZERO)),
        b: BoneJacobian::angular(from_rows(-axis, Vec3::ZERO, Vec3::ZERO)),
        velocity_bias: Vec3::new(bias, 0.0, 0.0),
    }
}

/// 限位偏置：越界时按误差修正系数修正；未越界时为投机偏置（负值），允许运动到边界
#[inline]
fn limit_bias(error: f32, error_correction_factor: f32) -> f32 {
    if error > 0.0 {
        error * error_correction_factor
    } else {
        error
    }
}

// ============================================================================
// 旋转铰链
// ============================================================================

/// 旋转铰链：两骨骼只能绕自由轴相对转动（约束 2 个角自由度）
#[derive(Clone, Debug)]
pub struct RevoluteJoint {
    local_free_axis_a: Vec3,
    local_free_axis_b: Vec3,
    local_constrained_axis_1: Vec3,
    local_constrained_axis_2: Vec3,
}

impl RevoluteJoint {
    /// 以世界自由轴创建（两骨骼共用同一轴）
    pub fn new(a: &Bone, b: &Bone, free_axis: Vec3) -> Self {
        let free_axis = free_axis.normalize_or_zero();
        let mut joint = Self {
            local_free_axis_a: a.world_to_local_vector(free_axis),
            local_free_axis_b: b.world_to_local_vector(free_axis),
            local_constrained_axis_1: Vec3::ZERO,
            local_constrained_axis_2: Vec3::ZERO,
        };
        joint.compute_constrained_axes(a, b);
        joint
    }

    pub fn free_axis_a(&self, a: &Bone) -> Vec3 {
        a.local_to_world_vector(self.local_free_axis_a)
    }

    pub fn set_free_axis_a(&mut self, a: &Bone, b: &Bone, axis: Vec3) {
        self.local_free_axis_a = a.world_to_local_vector(axis.normalize_or_zero());
        self.compute_constrained_axes(a, b);
    }

    pub fn free_axis_b(&self, b: &Bone) -> Vec3 {
        b.local_to_world_vector(self.local_free_axis_b)
    }

    pub fn set_free_axis_b(&mut self, a: &Bone, b: &Bone, axis: Vec3) {
        self.local_free_axis_b = b.world_to_local_vector(axis.normalize_or_zero());
        self.compute_constrained_axes(a, b);
    }

    #[inline]
    pub fn local_free_axis_a(&self) -> Vec3 {
        self.local_free_axis_a
    }

    /// 设置 A 的本地自由轴并重新计算受约束轴
    pub fn set_local_free_axis_a(&mut self, a: &Bone, b: &Bone, axis: Vec3) {
        self.local_free_axis_a = axis.normalize_or_zero();
        self.compute_constrained_axes(a, b);
    }

    #[inline]
    pub fn local_free_axis_b(&self) -> Vec3 {
        self.local_free_axis_b
    }

    pub fn set_local_free_axis_b(&mut self, a: &Bone, b: &Bone, axis: Vec3) {
        self.local_free_axis_b = axis.normalize_or_zero();
        self.compute_constrained_axes(a, b);
    }

    /// 两条受约束轴（A 本地坐标）
    #[inline]
    pub fn local_constrained_axes(&self) -> (Vec3, Vec3) {
        (self.local_constrained_axis_1, self.local_constrained_axis_2)
    }

    /// 两条受约束轴（A 空间，世界坐标）
    pub fn constrained_axes(&self, a: &Bone) -> (Vec3, Vec3) {
        (
            a.local_to_world_vector(self.local_constrained_axis_1),
            a.local_to_world_vector(self.local_constrained_axis_2),
        )
    }

    /// 受约束轴与自由轴 A 垂直；两自由轴平行时借助参考方向构造
    fn compute_constrained_axes(&mut self, a: &Bone, b: &Bone) {
        let free_a = self.free_axis_a(a);
        let free_b = self.free_axis_b(b);
        let axis_1 = try_normalize(free_a.cross(free_b)).unwrap_or_else(|| perpendicular(free_a));
        let axis_2 = free_a.cross(axis_1);
        self.local_constrained_axis_1 = a.world_to_local_vector(axis_1);
        self.local_constrained_axis_2 = a.world_to_local_vector(axis_2);
    }

    pub(crate) fn jacobians(&self, a: &Bone, b: &Bone, error_correction_factor: f32) -> JointJacobians {
        let (axis_1, axis_2) = self.constrained_axes(a);
        let free_a = self.free_axis_a(a);
        let free_b = self.free_axis_b(b);

        let error = free_a.cross(free_b);
        let velocity_bias =
            Vec3::new(error.dot(axis_1), error.dot(axis_2), 0.0) * error_correction_factor;

        JointJacobians {
            a: BoneJacobian::angular(from_rows(axis_1, axis_2, Vec3::ZERO)),
            b: BoneJacobian::angular(from_rows(-axis_1, -axis_2, Vec3::ZERO)),
            velocity_bias,
        }
    }
}

// ============================================================================
// 摆动限位
// ============================================================================

/// 摆动限位：A 轴与 B 轴的夹角不超过最大角度（单向）
#[derive(Clone, Debug)]
pub struct SwingLimit {
    pub local_axis_a: Vec3,
    pub local_axis_b: Vec3,
    maximum_angle: f32,
}

impl SwingLimit {
    pub fn new(a: &Bone, b: &Bone, axis_a: Vec3, axis_b: Vec3, maximum_angle: f32) -> Self {
        Self {
            local_axis_a: a.world_to_local_vector(axis_a.normalize_or_zero()),
            local_axis_b: b.world_to_local_vector(axis_b.normalize_or_zero()),
            maximum_angle: maximum_angle.clamp(0.0, PI),
        }
    }

    pub fn axis_a(&self, a: &Bone) -> Vec3 {
        a.local_to_world_vector(self.local_axis_a)
    }

    pub fn set_axis_a(&mut self, a: &Bone, axis: Vec3) {
        self.local_axis_a = a.world_to_local_vector(axis.normalize_or_zero());
    }

    pub fn axis_b(&self, b: &Bone) -> Vec3 {
        b.local_to_world_vector(self.local_axis_b)
    }

    pub fn set_axis_b(&mut self, b: &Bone, axis: Vec3) {
        self.local_axis_b = b.world_to_local_vector(axis.normalize_or_zero());
    }

    #[inline]
    pub fn maximum_angle(&self) -> f32 {
        self.maximum_angle
    }

    /// 设置最大角度（钳制到 [0, π]）
    pub fn set_maximum_angle(&mut self, angle: f32) {
        self.maximum_angle = angle.clamp(0.0, PI);
    }

    /// 当前两轴夹角
    pub fn angle(&self, a: &Bone, b: &Bone) -> f32 {
        angle_between(self.axis_a(a), self.axis_b(b))
    }

    pub(crate) fn jacobians(&self, a: &Bone, b: &Bone, error_correction_factor: f32) -> JointJacobians {
        let axis_a = self.axis_a(a);
        let axis_b = self.axis_b(b);
        let error = angle_between(axis_a, axis_b) - self.maximum_angle;

        // 绕 a × b 转动 A 会让 a 靠向 b
        let swing_axis =
            try_normalize(axis_a.cross(axis_b)).unwrap_or_else(|| perpendicular(axis_a));
        single_row(swing_axis, limit_bias(error, error_correction_factor))
    }
}

// ============================================================================
// 旋转铰链（swivel）
// ============================================================================

/// Swivel 铰链：保持 A 的铰链轴与 B 的扭转轴垂直（约束 1 个角自由度）
#[derive(Clone, Debug)]
pub struct SwivelHingeJoint {
    pub local_hinge_axis: Vec3,
    pub local_twist_axis: Vec3,
}

impl SwivelHingeJoint {
    pub fn new(a: &Bone, b: &Bone, hinge_axis: Vec3, twist_axis: Vec3) -> Self {
        Self {
            local_hinge_axis: a.world_to_local_vector(hinge_axis.normalize_or_zero()),
            local_twist_axis: b.world_to_local_vector(twist_axis.normalize_or_zero()),
        }
    }

    pub fn hinge_axis(&self, a: &Bone) -> Vec3 {
        a.local_to_world_vector(self.local_hinge_axis)
    }

    pub fn set_hinge_axis(&mut self, a: &Bone, axis: Vec3) {
        self.local_hinge_axis = a.world_to_local_vector(axis.normalize_or_zero());
    }

    pub fn twist_axis(&self, b: &Bone) -> Vec3 {
        b.local_to_world_vector(self.local_twist_axis)
    }

    pub fn set_twist_axis(&mut self, b: &Bone, axis: Vec3) {
        self.local_twist_axis = b.world_to_local_vector(axis.normalize_or_zero());
    }

    pub(crate) fn jacobians(&self, a: &Bone, b: &Bone, error_correction_factor: f32) -> JointJacobians {
        let hinge = self.hinge_axis(a);
        let twist = self.twist_axis(b);

        let Some(row) = try_normalize(hinge.cross(twist)) else {
            // 两轴平行：误差方向未定义
            return single_row(Vec3::ZERO, 0.0);
        };
        let error = safe_acos(hinge.dot(twist)) - FRAC_PI_2;
        single_row(row, error * error_correction_factor)
    }
}

// ============================================================================
// 扭转限位
// ============================================================================

/// 扭转限位：绕两骨骼扭转轴的相对扭转角不超过最大角度（单向）
///
/// 扭转角通过测量轴比较：把 B 的扭转轴对齐到 A 的扭转轴后，
/// 两测量轴之间的夹角即为扭转角。
#[derive(Clone, Debug)]
pub struct TwistLimit {
    local_axis_a: Vec3,
    local_axis_b: Vec3,
    local_measurement_axis_a: Vec3,
    local_measurement_axis_b: Vec3,
    maximum_angle: f32,
}

impl TwistLimit {
    pub fn new(
        a: &Bone,
        b: &Bone,
        axis_a: Vec3,
        axis_b: Vec3,
        measurement_axis_a: Vec3,
        maximum_angle: f32,
    ) -> Self {
        let mut limit = Self {
            local_axis_a: a.world_to_local_vector(axis_a.normalize_or_zero()),
            local_axis_b: b.world_to_local_vector(axis_b.normalize_or_zero()),
            local_measurement_axis_a: Vec3::ZERO,
            local_measurement_axis_b: Vec3::ZERO,
            maximum_angle: maximum_angle.clamp(0.0, PI),
        };
        limit.set_measurement_axis_a(a, b, measurement_axis_a);
        limit
    }

    pub fn axis_a(&self, a: &Bone) -> Vec3 {
        a.local_to_world_vector(self.local_axis_a)
    }

    pub fn axis_b(&self, b: &Bone) -> Vec3 {
        b.local_to_world_vector(self.local_axis_b)
    }

    /// 修改扭转轴后测量轴 B 会重新计算
    pub fn set_axis_a(&mut self, a: &Bone, b: &Bone, axis: Vec3) {
        self.local_axis_a = a.world_to_local_vector(axis.normalize_or_zero());
        let measurement = self.measurement_axis_a(a);
        self.set_measurement_axis_a(a, b, measurement);
    }

    pub fn set_axis_b(&mut self, a: &Bone, b: &Bone, axis: Vec3) {
        self.local_axis_b = b.world_to_local_vector(axis.normalize_or_zero());
        let measurement = self.measurement_axis_a(a);
        self.set_measurement_axis_a(a, b, measurement);
    }

    #[inline]
    pub fn local_axis_a(&self) -> Vec3 {
        self.local_axis_a
    }

    pub fn set_local_axis_a(&mut self, a: &Bone, b: &Bone, axis: Vec3) {
        self.local_axis_a = axis.normalize_or_zero();
        let measurement = self.measurement_axis_a(a);
        self.set_measurement_axis_a(a, b, measurement);
    }

    #[inline]
    pub fn local_axis_b(&self) -> Vec3 {
        self.local_axis_b
    }

    pub fn set_local_axis_b(&mut self, a: &Bone, b: &Bone, axis: Vec3) {
        self.local_axis_b = axis.normalize_or_zero();
        let measurement = self.measurement_axis_a(a);
        self.set_measurement_axis_a(a, b, measurement);
    }

    #[inline]
    pub fn local_measurement_axis_a(&self) -> Vec3 {
        self.local_measurement_axis_a
    }

    /// 以 A 本地坐标设置测量轴 A，测量轴 B 随之重新推出
    pub fn set_local_measurement_axis_a(&mut self, a: &Bone, b: &Bone, axis: Vec3) {
        let world = a.local_to_world_vector(axis);
        self.set_measurement_axis_a(a, b, world);
    }

    #[inline]
    pub fn local_measurement_axis_b(&self) -> Vec3 {
        self.local_measurement_axis_b
    }

    pub fn measurement_axis_a(&self, a: &Bone) -> Vec3 {
        a.local_to_world_vector(self.local_measurement_axis_a)
    }

    pub fn measurement_axis_b(&self, b: &Bone) -> Vec3 {
        b.local_to_world_vector(self.local_measurement_axis_b)
    }

    /// 设置测量轴 A（投影到扭转轴 A 的垂直平面），并由当前位姿推出测量轴 B
    pub fn set_measurement_axis_a(&mut self, a: &Bone, b: &Bone, axis: Vec3) {
        let axis_a = self.axis_a(a);
        let axis_b = self.axis_b(b);

        let projected = axis - axis_a * axis.dot(axis_a);
        let measurement_a = try_normalize(projected).unwrap_or_else(|| perpendicular(axis_a));
        let measurement_b = rotation_between(axis_a, axis_b) * measurement_a;

        self.local_measurement_axis_a = a.world_to_local_vector(measurement_a);
        self.local_measurement_axis_b = b.world_to_local_vector(measurement_b);
    }

    #[inline]
    pub fn maximum_angle(&self) -> f32 {
        self.maximum_angle
    }

    /// 设置最大角度（钳制到 [0, π]）
    pub fn set_maximum_angle(&mut self, angle: f32) {
        self.maximum_angle = angle.clamp(0.0, PI);
    }

    /// 测量轴 A 与对齐后的测量轴 B
    fn measurement_axes(&self, a: &Bone, b: &Bone) -> (Vec3, Vec3) {
        let axis_a = self.axis_a(a);
        let axis_b = self.axis_b(b);
        let aligned_b = rotation_between(axis_b, axis_a) * self.measurement_axis_b(b);
        (self.measurement_axis_a(a), aligned_b)
    }

    /// 当前扭转角
    pub fn angle(&self, a: &Bone, b: &Bone) -> f32 {
        let (measurement_a, measurement_b) = self.measurement_axes(a, b);
        angle_between(measurement_a, measurement_b)
    }

    pub(crate) fn jacobians(&self, a: &Bone, b: &Bone, error_correction_factor: f32) -> JointJacobians {
        let axis_a = self.axis_a(a);
        let axis_b = self.axis_b(b);
        let (measurement_a, measurement_b) = self.measurement_axes(a, b);
        let error = angle_between(measurement_a, measurement_b) - self.maximum_angle;

        // 两扭转轴反向时取 A 轴
        let mut twist_axis = try_normalize(axis_a + axis_b).unwrap_or(axis_a);
        if measurement_a.cross(measurement_b).dot(twist_axis) < 0.0 {
            twist_axis = -twist_axis;
        }
        single_row(twist_axis, limit_bias(error, error_correction_factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{ConstraintBase, IkJoint, JointKind};
    use approx::assert_relative_eq;
    use glam::Quat;

    fn pair() -> Vec<Bone> {
        vec![
            Bone::new(Vec3::ZERO, Quat::IDENTITY, 0.2, 1.0),
            Bone::new(Vec3::Y, Quat::IDENTITY, 0.2, 1.0),
        ]
    }

    fn prepare(joint: &mut IkJoint, bones: &mut [Bone]) {
        joint.update_jacobians_and_velocity_bias(bones);
        joint.compute_effective_mass(bones);
        joint.warm_start(bones);
    }

    #[test]
    fn test_revolute_keeps_free_axis_rotation() {
        let mut bones = pair();
        bones[1].angular_velocity = Vec3::new(1.0, -2.0, 3.0);
        let kind = JointKind::Revolute(RevoluteJoint::new(&bones[0], &bones[1], Vec3::Z));
        let mut joint = IkJoint::new(0, 1, kind).with_base(ConstraintBase::fixed(0.0, 0.0, f32::MAX));
        prepare(&mut joint, &mut bones);
        for _ in 0..10 {
            joint.solve_velocity_iteration(&mut bones);
        }
        // 只剩绕 Z 的相对转动
        let relative = bones[1].angular_velocity - bones[0].angular_velocity;
        assert_relative_eq!(relative.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(relative.y, 0.0, epsilon = 1e-4);
        assert_relative_eq!(relative.z, 3.0, epsilon = 1e-4);
    }

    #[test]
    fn test_revolute_bias_from_misalignment() {
        let mut bones = pair();
        let revolute = RevoluteJoint::new(&bones[0], &bones[1], Vec3::Z);
        bones[1].orientation = Quat::from_rotation_x(0.3);

        let jacobians = revolute.jacobians(&bones[0], &bones[1], 1.0);
        // 误差大小为 sin(0.3)
        assert_relative_eq!(jacobians.velocity_bias.length(), 0.3f32.sin(), epsilon = 1e-5);
        assert_eq!(jacobians.a.linear, glam::Mat3::ZERO);
    }

    #[test]
    fn test_revolute_axes_fallback_on_up() {
        let bones = pair();
        let revolute = RevoluteJoint::new(&bones[0], &bones[1], Vec3::Y);
        let (axis_1, axis_2) = revolute.constrained_axes(&bones[0]);
        assert_relative_eq!(axis_1.length(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(axis_2.length(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(axis_1.dot(Vec3::Y), 0.0, epsilon = 1e-6);
        assert_relative_eq!(axis_2.dot(Vec3::Y), 0.0, epsilon = 1e-6);
        assert_relative_eq!(axis_1.dot(axis_2), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_revolute_local_axes() {
        let mut bones = pair();
        bones[0].orientation = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let mut revolute = RevoluteJoint::new(&bones[0], &bones[1], Vec3::Z);
        // A 绕 Y 转 90 度：世界 Z 对应 A 本地 -X
        assert!(revolute.local_free_axis_a().abs_diff_eq(-Vec3::X, 1e-6));
        assert!(revolute.local_free_axis_b().abs_diff_eq(Vec3::Z, 1e-6));

        revolute.set_local_free_axis_a(&bones[0], &bones[1], Vec3::Z * 2.0);
        assert!(revolute.local_free_axis_a().abs_diff_eq(Vec3::Z, 1e-6));
        assert!(revolute.free_axis_a(&bones[0]).abs_diff_eq(Vec3::X, 1e-6));
        let (axis_1, axis_2) = revolute.local_constrained_axes();
        assert_relative_eq!(axis_1.dot(Vec3::Z), 0.0, epsilon = 1e-6);
        assert_relative_eq!(axis_2.dot(Vec3::Z), 0.0, epsilon = 1e-6);

        revolute.set_local_free_axis_b(&bones[0], &bones[1], Vec3::X);
        assert!(revolute.free_axis_b(&bones[1]).abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn test_twist_limit_local_axes() {
        let mut bones = pair();
        bones[1].orientation = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let mut limit = TwistLimit::new(&bones[0], &bones[1], Vec3::X, Vec3::X, Vec3::Y, 0.2);
        assert!(limit.local_axis_a().abs_diff_eq(Vec3::X, 1e-6));
        // B 绕 Z 转 90 度：世界 X 对应 B 本地 -Y
        assert!(limit.local_axis_b().abs_diff_eq(-Vec3::Y, 1e-6));
        assert!(limit.local_measurement_axis_a().abs_diff_eq(Vec3::Y, 1e-6));

        limit.set_local_measurement_axis_a(&bones[0], &bones[1], Vec3::Z);
        assert!(limit.local_measurement_axis_a().abs_diff_eq(Vec3::Z, 1e-6));
        assert!(limit.measurement_axis_b(&bones[1]).abs_diff_eq(Vec3::Z, 1e-6));
        assert_relative_eq!(limit.angle(&bones[0], &bones[1]), 0.0, epsilon = 1e-5);

        limit.set_local_axis_b(&bones[0], &bones[1], Vec3::Y * 3.0);
        assert!(limit.local_axis_b().abs_diff_eq(Vec3::Y, 1e-6));
        assert!(limit.axis_b(&bones[1]).abs_diff_eq(-Vec3::X, 1e-6));
        assert_relative_eq!(limit.local_measurement_axis_b().length(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(limit.angle(&bones[0], &bones[1]), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_twist_angle_resolves_small_twist() {
        let mut bones = pair();
        let limit = TwistLimit::new(&bones[0], &bones[1], Vec3::X, Vec3::X, Vec3::Y, 0.2);
        bones[1].orientation = Quat::from_rotation_x(1e-4);
        assert_relative_eq!(limit.angle(&bones[0], &bones[1]), 1e-4, epsilon = 1e-6);
    }

    #[test]
    fn test_swing_limit_parallel_axes() {
        let bones = pair();
        let limit = SwingLimit::new(&bones[0], &bones[1], Vec3::Y, Vec3::Y, 0.5);
        assert_eq!(limit.angle(&bones[0], &bones[1]), 0.0);

        let jacobians = limit.jacobians(&bones[0], &bones[1], 0.2);
        assert!(jacobians.a.is_finite());
        // 未越界：投机偏置
        assert_relative_eq!(jacobians.velocity_bias.x, -0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_limits_dot_overshoot() {
        let bones = pair();
        let overshoot = Vec3::new(0.0, 1.000_000_1, 0.0);

        let mut swing = SwingLimit::new(&bones[0], &bones[1], Vec3::Y, Vec3::Y, 0.5);
        swing.local_axis_a = overshoot;
        swing.local_axis_b = overshoot;
        assert!(swing.axis_a(&bones[0]).dot(swing.axis_b(&bones[1])) > 1.0);
        assert_eq!(swing.angle(&bones[0], &bones[1]), 0.0);
        assert!(swing.jacobians(&bones[0], &bones[1], 0.2).velocity_bias.is_finite());

        let mut twist = TwistLimit::new(&bones[0], &bones[1], Vec3::X, Vec3::X, Vec3::Y, 0.5);
        twist.local_measurement_axis_a = overshoot;
        twist.local_measurement_axis_b = overshoot;
        assert_eq!(twist.angle(&bones[0], &bones[1]), 0.0);
        assert!(twist.jacobians(&bones[0], &bones[1], 0.2).velocity_bias.is_finite());
    }

    #[test]
    fn test_swing_limit_antiparallel_axes() {
        let bones = pair();
        let limit = SwingLimit::new(&bones[0], &bones[1], Vec3::Y, -Vec3::Y, 1.0);
        assert_relative_eq!(limit.angle(&bones[0], &bones[1]), PI, epsilon = 1e-5);

        let jacobians = limit.jacobians(&bones[0], &bones[1], 0.2);
        assert!(jacobians.a.is_finite());
        assert_relative_eq!(jacobians.a.angular.row(0).length(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(jacobians.velocity_bias.x, 0.2 * (PI - 1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_swing_limit_maximum_angle_clamped() {
        let bones = pair();
        let mut limit = SwingLimit::new(&bones[0], &bones[1], Vec3::Y, Vec3::Y, 5.0);
        assert_eq!(limit.maximum_angle(), PI);
        limit.set_maximum_angle(-1.0);
        assert_eq!(limit.maximum_angle(), 0.0);
    }

    #[test]
    fn test_swing_limit_pulls_axes_together() {
        let mut bones = pair();
        let limit = SwingLimit::new(&bones[0], &bones[1], Vec3::X, Vec3::Y, 0.3);
        let mut joint = IkJoint::new(0, 1, JointKind::SwingLimit(limit));
        prepare(&mut joint, &mut bones);
        joint.solve_velocity_iteration(&mut bones);

        // a = X 绕 X × Y = Z 正向转动靠近 Y
        assert!(bones[0].angular_velocity.z > 0.0);
        assert!(bones[1].angular_velocity.z < 0.0);
        assert!(joint.accumulated_impulse().x > 0.0);
    }

    #[test]
    fn test_swivel_hinge_error() {
        let bones = pair();
        let perpendicular = SwivelHingeJoint::new(&bones[0], &bones[1], Vec3::X, Vec3::Y);
        let jacobians = perpendicular.jacobians(&bones[0], &bones[1], 0.2);
        assert_relative_eq!(jacobians.velocity_bias.x, 0.0, epsilon = 1e-6);

        let tilted = SwivelHingeJoint::new(&bones[0], &bones[1], Vec3::X, Vec3::new(1.0, 1.0, 0.0));
        let jacobians = tilted.jacobians(&bones[0], &bones[1], 1.0);
        assert_relative_eq!(jacobians.velocity_bias.x, -std::f32::consts::FRAC_PI_4, epsilon = 1e-5);
    }

    #[test]
    fn test_swivel_hinge_parallel_axes() {
        let bones = pair();
        let hinge = SwivelHingeJoint::new(&bones[0], &bones[1], Vec3::X, Vec3::X);
        let jacobians = hinge.jacobians(&bones[0], &bones[1], 0.2);
        assert_eq!(jacobians.velocity_bias, Vec3::ZERO);
        assert_eq!(jacobians.a, BoneJacobian::ZERO);
    }

    #[test]
    fn test_twist_limit_measures_twist() {
        let mut bones = pair();
        let limit = TwistLimit::new(&bones[0], &bones[1], Vec3::X, Vec3::X, Vec3::Y, 0.2);
        assert_relative_eq!(limit.angle(&bones[0], &bones[1]), 0.0, epsilon = 1e-5);

        bones[1].orientation = Quat::from_rotation_x(0.5);
        bones[1].update_inertia_tensor();
        assert_relative_eq!(limit.angle(&bones[0], &bones[1]), 0.5, epsilon = 1e-4);

        let mut joint = IkJoint::new(0, 1, JointKind::TwistLimit(limit));
        prepare(&mut joint, &mut bones);
        assert_relative_eq!(joint.velocity_bias().x, 0.2 * 0.3, epsilon = 1e-4);

        joint.solve_velocity_iteration(&mut bones);
        // A 跟随 B 的扭转方向，B 被拉回
        assert!(bones[0].angular_velocity.x > 0.0);
        assert!(bones[1].angular_velocity.x < 0.0);
    }

    #[test]
    fn test_twist_limit_ignores_swing() {
        let mut bones = pair();
        let limit = TwistLimit::new(&bones[0], &bones[1], Vec3::X, Vec3::X, Vec3::Z, 0.2);
        // 绕 Z 摆动不产生扭转
        bones[1].orientation = Quat::from_rotation_z(0.7);
        assert_relative_eq!(limit.angle(&bones[0], &bones[1]), 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_twist_limit_measurement_projected() {
        let bones = pair();
        let limit = TwistLimit::new(&bones[0], &bones[1], Vec3::X, Vec3::Y, Vec3::new(1.0, 0.0, 1.0), 0.2);
        let measurement = limit.measurement_axis_a(&bones[0]);
        assert!(measurement.abs_diff_eq(Vec3::Z, 1e-6));
        // 测量轴 B 随扭转轴对齐而来，初始扭转角为零
        assert_relative_eq!(limit.angle(&bones[0], &bones[1]), 0.0, epsilon = 1e-5);
    }
}
