//! 双骨骼关节
//!
//! IkJoint 持有两个骨骼索引和公共求解状态，具体几何由 JointKind 决定。
//! 变体集合固定，按 match 分派，不使用虚调用。

use glam::{Mat3, Vec3};

use crate::skeleton::Bone;

use super::angular_joints::{RevoluteJoint, SwingLimit, SwivelHingeJoint, TwistLimit};
use super::point_joints::{
    BallSocketJoint, DistanceJoint, DistanceLimit, PointOnLineJoint, PointOnPlaneJoint,
};
use super::{BoneJacobian, ConstraintBase, ConstraintState, ImpulseClamp};

/// 双骨骼约束的雅可比与速度偏置
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct JointJacobians {
    pub a: BoneJacobian,
    pub b: BoneJacobian,
    pub velocity_bias: Vec3,
}

// ============================================================================
// 关节类型
// ============================================================================

/// 关节几何
#[derive(Clone, Debug)]
pub enum JointKind {
    BallSocket(BallSocketJoint),
    Distance(DistanceJoint),
    DistanceLimit(DistanceLimit),
    PointOnLine(PointOnLineJoint),
    PointOnPlane(PointOnPlaneJoint),
    Revolute(RevoluteJoint),
    SwingLimit(SwingLimit),
    SwivelHinge(SwivelHingeJoint),
    TwistLimit(TwistLimit),
}

impl JointKind {
    /// 类型名（日志用）
    pub fn name(&self) -> &'static str {
        match self {
            JointKind::BallSocket(_) => "ball_socket",
            JointKind::Distance(_) => "distance",
            JointKind::DistanceLimit(_) => "distance_limit",
            JointKind::PointOnLine(_) => "point_on_line",
            JointKind::PointOnPlane(_) => "point_on_plane",
            JointKind::Revolute(_) => "revolute",
            JointKind::SwingLimit(_) => "swing_limit",
            JointKind::SwivelHinge(_) => "swivel_hinge",
            JointKind::TwistLimit(_) => "twist_limit",
        }
    }

    /// 是否为限位（单向约束）
    #[inline]
    pub fn is_limit(&self) -> bool {
        matches!(
            self,
            JointKind::DistanceLimit(_) | JointKind::SwingLimit(_) | JointKind::TwistLimit(_)
        )
    }

    #[inline]
    pub fn impulse_clamp(&self) -> ImpulseClamp {
        if self.is_limit() {
            ImpulseClamp::OneSided
        } else {
            ImpulseClamp::TwoSided
        }
    }

    fn jacobians(&self, a: &Bone, b: &Bone, error_correction_factor: f32) -> JointJacobians {
        match self {
            JointKind::BallSocket(j) => j.jacobians(a, b, error_correction_factor),
            JointKind::Distance(j) => j.jacobians(a, b, error_correction_factor),
            JointKind::DistanceLimit(j) => j.jacobians(a, b, error_correction_factor),
            JointKind::PointOnLine(j) => j.jacobians(a, b, error_correction_factor),
            JointKind::PointOnPlane(j) => j.jacobians(a, b, error_correction_factor),
            JointKind::Revolute(j) => j.jacobians(a, b, error_correction_factor),
            JointKind::SwingLimit(j) => j.jacobians(a, b, error_correction_factor),
            JointKind::SwivelHinge(j) => j.jacobians(a, b, error_correction_factor),
            JointKind::TwistLimit(j) => j.jacobians(a, b, error_correction_factor),
        }
    }
}

// ============================================================================
// 关节
// ============================================================================

/// 双骨骼关节
///
/// 所有阶段方法都按索引访问骨骼数组；索引越界会 panic，
/// 由 `IkSolver` 在添加关节时校验。
#[derive(Clone, Debug)]
pub struct IkJoint {
    /// 是否参与本次求解（开启链遍历时由遍历写入，否则由调用方维护）
    pub is_active: bool,
    /// 公共参数
    pub base: ConstraintBase,
    /// 几何
    pub kind: JointKind,

    connection_a: usize,
    connection_b: usize,
    enabled: bool,
    jacobian_a: BoneJacobian,
    jacobian_b: BoneJacobian,
    state: ConstraintState,
}

impl IkJoint {
    /// 创建关节（尚未注册到骨骼邻接集合，见 `set_enabled`）
    pub fn new(connection_a: usize, connection_b: usize, kind: JointKind) -> Self {
        Self {
            connection_a,
            connection_b,
            is_active: false,
            base: ConstraintBase::new(),
            kind,
            enabled: false,
            jacobian_a: BoneJacobian::ZERO,
            jacobian_b: BoneJacobian::ZERO,
            state: ConstraintState::default(),
        }
    }

    /// 指定公共参数
    pub fn with_base(mut self, base: ConstraintBase) -> Self {
        self.base = base;
        self
    }

    /// 骨骼 A 索引（创建后不可修改，邻接记录依赖它）
    #[inline]
    pub fn connection_a(&self) -> usize {
        self.connection_a
    }

    /// 骨骼 B 索引
    #[inline]
    pub fn connection_b(&self) -> usize {
        self.connection_b
    }

    // ========================================
    // 启用 / 邻接
    // ========================================

    #[inline]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// 启用/禁用关节，同时登记/撤销两端骨骼的邻接记录
    ///
    /// 这是骨骼-关节邻接图唯一的修改入口；`joint_index` 为本关节在关节数组中的索引。
    pub fn set_enabled(&mut self, bones: &mut [Bone], joint_index: usize, enabled: bool) {
        if enabled == self.enabled {
            return;
        }
        for bone_idx in [self.connection_a, self.connection_b] {
            let bone = &mut bones[bone_idx];
            if enabled {
                bone.joints.insert(joint_index);
            } else {
                bone.joints.remove(&joint_index);
            }
        }
        self.enabled = enabled;
    }

    /// 另一端骨骼
    #[inline]
    pub fn other(&self, bone_idx: usize) -> usize {
        if bone_idx == self.connection_a {
            self.connection_b
        } else {
            self.connection_a
        }
    }

    // ========================================
    // 求解阶段
    // ========================================

    /// 由弹簧参数换算 softness / 误差修正系数 / 最大冲量
    #[inline]
    pub fn preupdate(&mut self, dt: f32, update_rate: f32) {
        self.base.preupdate(dt, update_rate);
    }

    /// 由当前位姿计算雅可比和速度偏置
    pub fn update_jacobians_and_velocity_bias(&mut self, bones: &[Bone]) {
        let a = &bones[self.connection_a];
        let b = &bones[self.connection_b];
        let jacobians = self.kind.jacobians(a, b, self.base.error_correction_factor);
        self.jacobian_a = jacobians.a;
        self.jacobian_b = jacobians.b;
        self.state.velocity_bias = jacobians.velocity_bias;
    }

    /// 有效质量 = (J * M^-1 * J^T)^-1
    pub fn compute_effective_mass(&mut self, bones: &[Bone]) {
        let denominator = self.jacobian_a.mass_contribution(&bones[self.connection_a])
            + self.jacobian_b.mass_contribution(&bones[self.connection_b]);
        self.state.compute_effective_mass(denominator, self.base.softness);
    }

    /// 重新施加累积冲量
    pub fn warm_start(&self, bones: &mut [Bone]) {
        let impulse = self.state.accumulated_impulse;
        self.jacobian_a.apply_impulse(&mut bones[self.connection_a], impulse);
        self.jacobian_b.apply_impulse(&mut bones[self.connection_b], impulse);
    }

    /// 单次速度迭代
    pub fn solve_velocity_iteration(&mut self, bones: &mut [Bone]) {
        let velocity = self.jacobian_a.velocity_contribution(&bones[self.connection_a])
            + self.jacobian_b.velocity_contribution(&bones[self.connection_b]);
        let impulse = self.state.solve(velocity, &self.base, self.kind.impulse_clamp());
        self.jacobian_a.apply_impulse(&mut bones[self.connection_a], impulse);
        self.jacobian_b.apply_impulse(&mut bones[self.connection_b], impulse);
    }

    #[inline]
    pub fn clear_accumulated_impulses(&mut self) {
        self.state.clear_accumulated_impulse();
    }

    // ========================================
    // 访问器
    // ========================================

    /// 当前约束空间速度误差（未计偏置）
    pub fn constraint_velocity(&self, bones: &[Bone]) -> Vec3 {
        self.jacobian_a.velocity_contribution(&bones[self.connection_a])
            + self.jacobian_b.velocity_contribution(&bones[self.connection_b])
    }

    #[inline]
    pub fn velocity_bias(&self) -> Vec3 {
        self.state.velocity_bias
    }

    #[inline]
    pub fn effective_mass(&self) -> Mat3 {
        self.state.effective_mass
    }

    #[inline]
    pub fn accumulated_impulse(&self) -> Vec3 {
        self.state.accumulated_impulse
    }

    #[inline]
    pub fn jacobian_a(&self) -> &BoneJacobian {
        &self.jacobian_a
    }

    #[inline]
    pub fn jacobian_b(&self) -> &BoneJacobian {
        &self.jacobian_b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Quat;

    fn pair(a: Vec3, b: Vec3) -> Vec<Bone> {
        vec![
            Bone::new(a, Quat::IDENTITY, 0.2, 1.0),
            Bone::new(b, Quat::IDENTITY, 0.2, 1.0),
        ]
    }

    fn prepare(joint: &mut IkJoint, bones: &mut [Bone]) {
        joint.update_jacobians_and_velocity_bias(bones);
        joint.compute_effective_mass(bones);
        joint.warm_start(bones);
    }

    /// 每种关节一个实例，几何都处于非零误差状态
    fn all_kinds(bones: &[Bone]) -> Vec<JointKind> {
        let (a, b) = (&bones[0], &bones[1]);
        vec![
            JointKind::BallSocket(BallSocketJoint::new(a, b, Vec3::new(0.4, 0.1, 0.0))),
            JointKind::Distance({
                let mut j = DistanceJoint::new(a, b, a.position, b.position);
                j.set_distance(2.0);
                j
            }),
            JointKind::DistanceLimit(DistanceLimit::new(a, b, a.position, b.position, 1.5, 2.0)),
            JointKind::PointOnLine(PointOnLineJoint::new(
                a,
                b,
                a.position,
                Vec3::new(0.0, 1.0, 0.0),
                b.position,
            )),
            JointKind::PointOnPlane(PointOnPlaneJoint::new(a, b, a.position, Vec3::X, b.position)),
            JointKind::Revolute(RevoluteJoint::new(a, b, Vec3::Z)),
            JointKind::SwingLimit(SwingLimit::new(a, b, Vec3::X, Vec3::Y, 0.3)),
            JointKind::SwivelHinge(SwivelHingeJoint::new(a, b, Vec3::X, Vec3::new(1.0, 1.0, 0.0))),
            JointKind::TwistLimit(TwistLimit::new(a, b, Vec3::X, Vec3::X, Vec3::Y, 0.1)),
        ]
    }

    #[test]
    fn test_enable_registers_adjacency() {
        let mut bones = pair(Vec3::ZERO, Vec3::X);
        let kind = JointKind::BallSocket(BallSocketJoint::new(&bones[0], &bones[1], Vec3::X * 0.5));
        let mut joint = IkJoint::new(0, 1, kind);
        assert!(!joint.enabled());

        joint.set_enabled(&mut bones, 7, true);
        assert!(bones[0].joints().eq([7]));
        assert!(bones[1].joints().eq([7]));

        joint.set_enabled(&mut bones, 7, false);
        assert_eq!(bones[0].joint_count(), 0);
        assert_eq!(bones[1].joint_count(), 0);
    }

    #[test]
    fn test_pinned_bone_untouched_by_every_kind() {
        let mut bones = pair(Vec3::ZERO, Vec3::new(1.0, 0.2, 0.1));
        bones[0].set_pinned(true);
        bones[0].linear_velocity = Vec3::new(0.3, -0.2, 0.1);
        bones[0].angular_velocity = Vec3::new(-0.1, 0.4, 0.2);
        bones[1].linear_velocity = Vec3::new(-1.0, 0.5, 0.0);
        bones[1].angular_velocity = Vec3::new(0.0, 0.0, 2.0);

        for kind in all_kinds(&bones) {
            let name = kind.name();
            let mut joint = IkJoint::new(0, 1, kind);
            let mut local = bones.clone();
            prepare(&mut joint, &mut local);
            for _ in 0..10 {
                joint.solve_velocity_iteration(&mut local);
            }
            assert_eq!(local[0].linear_velocity, bones[0].linear_velocity, "{name}");
            assert_eq!(local[0].angular_velocity, bones[0].angular_velocity, "{name}");
        }
    }

    #[test]
    fn test_impulse_bound_for_every_kind() {
        let bones = pair(Vec3::ZERO, Vec3::new(1.0, 0.2, 0.1));
        let maximum = 0.05;

        for kind in all_kinds(&bones) {
            let name = kind.name();
            let mut joint = IkJoint::new(0, 1, kind).with_base(ConstraintBase::fixed(0.0, 1.0, maximum));
            let mut local = bones.clone();
            local[1].linear_velocity = Vec3::new(5.0, -3.0, 2.0);
            local[1].angular_velocity = Vec3::new(1.0, 4.0, -2.0);
            prepare(&mut joint, &mut local);
            for _ in 0..20 {
                joint.solve_velocity_iteration(&mut local);
                assert!(
                    joint.accumulated_impulse().length() <= maximum + 1e-5,
                    "{name}: {}",
                    joint.accumulated_impulse().length()
                );
            }
        }
    }

    #[test]
    fn test_limits_accumulate_non_negative() {
        let bones = pair(Vec3::ZERO, Vec3::new(1.0, 0.2, 0.1));
        for kind in all_kinds(&bones).into_iter().filter(|k| k.is_limit()) {
            let name = kind.name();
            let mut joint = IkJoint::new(0, 1, kind);
            let mut local = bones.clone();
            local[1].linear_velocity = Vec3::new(-3.0, 1.0, 0.5);
            local[1].angular_velocity = Vec3::new(2.0, -1.0, 3.0);
            prepare(&mut joint, &mut local);
            for _ in 0..10 {
                joint.solve_velocity_iteration(&mut local);
                let impulse = joint.accumulated_impulse();
                assert!(impulse.min_element() >= 0.0, "{name}: {impulse}");
            }
        }
    }

    #[test]
    fn test_momentum_conserved_between_free_bones() {
        let mut bones = pair(Vec3::ZERO, Vec3::new(1.0, 0.2, 0.1));
        bones[1].linear_velocity = Vec3::new(2.0, -1.0, 0.5);
        let before = bones[0].linear_velocity + bones[1].linear_velocity;

        let kind = JointKind::BallSocket(BallSocketJoint::new(&bones[0], &bones[1], Vec3::new(0.5, 0.1, 0.0)));
        let mut joint = IkJoint::new(0, 1, kind);
        prepare(&mut joint, &mut bones);
        for _ in 0..5 {
            joint.solve_velocity_iteration(&mut bones);
        }
        // 两骨骼质量相同，线动量守恒
        let after = bones[0].linear_velocity + bones[1].linear_velocity;
        assert!(after.abs_diff_eq(before, 1e-4));
    }

    #[test]
    fn test_clear_accumulated_impulses() {
        let mut bones = pair(Vec3::ZERO, Vec3::X * 3.0);
        let mut distance = DistanceJoint::new(&bones[0], &bones[1], Vec3::ZERO, Vec3::X);
        distance.set_distance(2.0);
        let mut joint = IkJoint::new(0, 1, JointKind::Distance(distance));
        prepare(&mut joint, &mut bones);
        joint.solve_velocity_iteration(&mut bones);
        assert!(joint.accumulated_impulse().length() > 0.0);
        joint.clear_accumulated_impulses();
        assert_eq!(joint.accumulated_impulse(), Vec3::ZERO);
    }

    #[test]
    fn test_other() {
        let bones = pair(Vec3::ZERO, Vec3::X);
        let kind = JointKind::BallSocket(BallSocketJoint::new(&bones[0], &bones[1], Vec3::ZERO));
        let joint = IkJoint::new(0, 1, kind);
        assert_eq!(joint.other(0), 1);
        assert_eq!(joint.other(1), 0);
        assert_relative_eq!(joint.base.error_correction_factor, 0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_connections_fixed_across_enable() {
        let mut bones = pair(Vec3::ZERO, Vec3::X);
        let kind = JointKind::BallSocket(BallSocketJoint::new(&bones[0], &bones[1], Vec3::ZERO));
        let mut joint = IkJoint::new(1, 0, kind);
        assert_eq!((joint.connection_a(), joint.connection_b()), (1, 0));

        joint.set_enabled(&mut bones, 4, true);
        assert!(bones.iter().all(|b| b.joints().eq([4])));
        joint.set_enabled(&mut bones, 4, false);
        assert!(bones.iter().all(|b| b.joint_count() == 0));
        assert_eq!((joint.connection_a(), joint.connection_b()), (1, 0));
    }
}
