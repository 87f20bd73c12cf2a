//! 约束 - 顺序冲量（投影 Gauss-Seidel）求解
//!
//! 每个约束按四个阶段被驱动：
//! 1. `compute_effective_mass`：有效质量 (J * M^-1 * J^T)^-1
//! 2. `warm_start`：重新施加累积冲量
//! 3. `solve_velocity_iteration`：迭代 N 次
//! 4. `clear_accumulated_impulses`：按调用方策略清除
//!
//! 雅可比/速度偏置在阶段 1 之前由 `update_jacobians_and_velocity_bias` 从骨骼位姿计算。

mod jacobian;
mod joint;
mod point_joints;
mod angular_joints;
mod single_bone;
mod motors;

pub use jacobian::BoneJacobian;
pub use joint::{IkJoint, JointKind};
pub use point_joints::{
    BallSocketJoint, DistanceJoint, DistanceLimit, PointOnLineJoint, PointOnPlaneJoint,
};
pub use angular_joints::{RevoluteJoint, SwingLimit, SwivelHingeJoint, TwistLimit};
pub use single_bone::{ControlKind, SingleBoneConstraint};
pub use motors::{AngularMotor, AngularPlaneConstraint, LinearMotor, RevoluteConstraint};

use glam::{Mat3, Vec3};

use crate::math::adaptive_invert;

// ============================================================================
// 弹簧参数
// ============================================================================

/// 约束弹簧参数（刚性 + 刚度阻尼比）
///
/// `preupdate` 根据时间步长把它们换算为 softness / 误差修正系数 / 最大冲量。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpringSettings {
    /// 刚性，默认 16
    pub rigidity: f32,
    /// 刚度与阻尼之比，默认 0.25
    pub stiffness_over_damping: f32,
    /// 最大力，默认 f32::MAX
    pub maximum_force: f32,
}

impl Default for SpringSettings {
    fn default() -> Self {
        Self {
            rigidity: 16.0,
            stiffness_over_damping: 0.25,
            maximum_force: f32::MAX,
        }
    }
}

// ============================================================================
// 约束公共参数
// ============================================================================

/// 冲量钳制方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImpulseClamp {
    /// 双向（关节、马达）：只限制模长
    TwoSided,
    /// 单向（限位）：先逐分量钳制到 >= 0，再限制模长
    OneSided,
}

/// 约束公共参数
#[derive(Clone, Debug)]
pub struct ConstraintBase {
    /// 约束力混合项（加到有效质量对角线上）
    pub softness: f32,
    /// Baumgarte 误差修正系数
    pub error_correction_factor: f32,
    /// 弹簧参数；为 None 时 `preupdate` 不覆盖手动设置的值
    pub spring: Option<SpringSettings>,
    maximum_impulse: f32,
    maximum_impulse_squared: f32,
}

impl ConstraintBase {
    /// 以默认弹簧参数、单位时间步创建
    pub fn new() -> Self {
        let mut base = Self {
            softness: 0.0,
            error_correction_factor: 0.0,
            spring: Some(SpringSettings::default()),
            maximum_impulse: f32::MAX,
            maximum_impulse_squared: f32::MAX,
        };
        base.preupdate(1.0, 1.0);
        base
    }

    /// 以固定参数创建（不受 `preupdate` 影响）
    pub fn fixed(softness: f32, error_correction_factor: f32, maximum_impulse: f32) -> Self {
        let mut base = Self {
            softness,
            error_correction_factor,
            spring: None,
            maximum_impulse: f32::MAX,
            maximum_impulse_squared: f32::MAX,
        };
        base.set_maximum_impulse(maximum_impulse);
        base
    }

    #[inline]
    pub fn maximum_impulse(&self) -> f32 {
        self.maximum_impulse
    }

    #[inline]
    pub fn maximum_impulse_squared(&self) -> f32 {
        self.maximum_impulse_squared
    }

    /// 设置最大冲量（负值钳制为 0，平方值同步更新）
    pub fn set_maximum_impulse(&mut self, maximum_impulse: f32) {
        self.maximum_impulse = maximum_impulse.max(0.0);
        self.maximum_impulse_squared = (self.maximum_impulse * self.maximum_impulse).min(f32::MAX);
    }

    /// 由弹簧参数换算求解参数
    ///
    /// - stiffness = stiffness_over_damping * rigidity
    /// - damping = rigidity
    /// - k = 1 / (dt * stiffness + damping)
    /// - error_correction_factor = stiffness * k, softness = update_rate * k
    pub fn preupdate(&mut self, dt: f32, update_rate: f32) {
        let Some(spring) = self.spring else {
            return;
        };
        let stiffness = spring.stiffness_over_damping * spring.rigidity;
        let damping = spring.rigidity;
        let multiplier = 1.0 / (dt * stiffness + damping);
        self.error_correction_factor = stiffness * multiplier;
        self.softness = update_rate * multiplier;
        self.set_maximum_impulse(spring.maximum_force * dt);
    }
}

impl Default for ConstraintBase {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// 求解状态
// ============================================================================

/// 单个约束的求解暂存量
#[derive(Clone, Copy, Debug)]
pub struct ConstraintState {
    /// 目标相对速度（Baumgarte 偏置）
    pub velocity_bias: Vec3,
    /// 有效质量（已求逆）
    pub effective_mass: Mat3,
    /// 累积冲量（约束空间）
    pub accumulated_impulse: Vec3,
}

impl Default for ConstraintState {
    fn default() -> Self {
        Self {
            velocity_bias: Vec3::ZERO,
            effective_mass: Mat3::ZERO,
            accumulated_impulse: Vec3::ZERO,
        }
    }
}

impl ConstraintState {
    /// 由 J * M^-1 * J^T 计算有效质量
    ///
    /// softness 只加到非零对角元素上：未使用的约束行保持为零，不会被"软化"成可逆。
    pub fn compute_effective_mass(&mut self, mut denominator: Mat3, softness: f32) {
        if denominator.x_axis.x != 0.0 {
            denominator.x_axis.x += softness;
        }
        if denominator.y_axis.y != 0.0 {
            denominator.y_axis.y += softness;
        }
        if denominator.z_axis.z != 0.0 {
            denominator.z_axis.z += softness;
        }
        self.effective_mass = adaptive_invert(denominator);
    }

    /// 由约束空间速度求出本次迭代要施加的冲量增量（已钳制）
    pub fn solve(&mut self, velocity: Vec3, base: &ConstraintBase, clamp: ImpulseClamp) -> Vec3 {
        // 要消除的速度 = 偏置 - 当前速度 - softness * 累积冲量
        let velocity_error =
            self.velocity_bias - velocity - self.accumulated_impulse * base.softness;
        let impulse = self.effective_mass * velocity_error;

        let previous = self.accumulated_impulse;
        let mut accumulated = previous + impulse;

        if clamp == ImpulseClamp::OneSided {
            // 限位只能推，不能拉
            accumulated = accumulated.max(Vec3::ZERO);
        }

        let impulse_squared = accumulated.length_squared();
        if impulse_squared > base.maximum_impulse_squared() {
            accumulated *= base.maximum_impulse() / impulse_squared.sqrt();
        }

        self.accumulated_impulse = accumulated;
        accumulated - previous
    }

    #[inline]
    pub fn clear_accumulated_impulse(&mut self) {
        self.accumulated_impulse = Vec3::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_spring_derivation() {
        let base = ConstraintBase::new();
        // stiffness = 4, damping = 16, k = 1/20
        assert_relative_eq!(base.error_correction_factor, 0.2, epsilon = 1e-6);
        assert_relative_eq!(base.softness, 0.05, epsilon = 1e-6);
        assert_eq!(base.maximum_impulse_squared(), f32::MAX);
    }

    #[test]
    fn test_preupdate_without_spring_keeps_values() {
        let mut base = ConstraintBase::fixed(0.0, 0.3, 10.0);
        base.preupdate(0.5, 2.0);
        assert_eq!(base.softness, 0.0);
        assert_eq!(base.error_correction_factor, 0.3);
        assert_eq!(base.maximum_impulse(), 10.0);
    }

    #[test]
    fn test_preupdate_scales_maximum_force() {
        let mut base = ConstraintBase::new();
        base.spring = Some(SpringSettings {
            maximum_force: 100.0,
            ..SpringSettings::default()
        });
        base.preupdate(0.5, 2.0);
        assert_relative_eq!(base.maximum_impulse(), 50.0);
        assert_relative_eq!(base.maximum_impulse_squared(), 2500.0);
    }

    #[test]
    fn test_negative_maximum_impulse_clamped() {
        let mut base = ConstraintBase::new();
        base.set_maximum_impulse(-1.0);
        assert_eq!(base.maximum_impulse(), 0.0);
        assert_eq!(base.maximum_impulse_squared(), 0.0);
    }

    #[test]
    fn test_softness_only_on_used_rows() {
        let mut state = ConstraintState::default();
        state.compute_effective_mass(Mat3::from_diagonal(Vec3::new(2.0, 0.0, 0.0)), 2.0);
        assert_relative_eq!(state.effective_mass.x_axis.x, 0.25);
        assert_eq!(state.effective_mass.y_axis.y, 0.0);
        assert_eq!(state.effective_mass.z_axis.z, 0.0);
    }

    #[test]
    fn test_one_sided_clamp() {
        let base = ConstraintBase::fixed(0.0, 0.2, f32::MAX);
        let mut state = ConstraintState {
            effective_mass: Mat3::IDENTITY,
            ..ConstraintState::default()
        };
        // 速度误差要求负冲量，限位不允许
        let delta = state.solve(Vec3::new(1.0, 0.0, 0.0), &base, ImpulseClamp::OneSided);
        assert_eq!(delta, Vec3::ZERO);
        assert_eq!(state.accumulated_impulse, Vec3::ZERO);

        let delta = state.solve(Vec3::new(1.0, 0.0, 0.0), &base, ImpulseClamp::TwoSided);
        assert_relative_eq!(delta.x, -1.0);
    }

    #[test]
    fn test_magnitude_clamp() {
        let base = ConstraintBase::fixed(0.0, 0.2, 0.5);
        let mut state = ConstraintState {
            effective_mass: Mat3::IDENTITY,
            velocity_bias: Vec3::new(3.0, 4.0, 0.0),
            ..ConstraintState::default()
        };
        let delta = state.solve(Vec3::ZERO, &base, ImpulseClamp::TwoSided);
        assert_relative_eq!(state.accumulated_impulse.length(), 0.5, epsilon = 1e-6);
        assert!(delta.abs_diff_eq(state.accumulated_impulse, 1e-6));
    }
}
