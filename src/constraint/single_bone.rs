//! 单骨骼约束（控制）
//!
//! 与 IkJoint 使用相同的四阶段求解流程，但只作用于一根目标骨骼。
//! 所有控制都是双向约束。

use glam::{Mat3, Vec3};

use crate::skeleton::Bone;

use super::motors::{AngularMotor, AngularPlaneConstraint, LinearMotor, RevoluteConstraint};
use super::{BoneJacobian, ConstraintBase, ConstraintState, ImpulseClamp};

/// 控制类型
#[derive(Clone, Debug)]
pub enum ControlKind {
    AngularMotor(AngularMotor),
    LinearMotor(LinearMotor),
    AngularPlane(AngularPlaneConstraint),
    Revolute(RevoluteConstraint),
}

impl ControlKind {
    /// 类型名（日志用）
    pub fn name(&self) -> &'static str {
        match self {
            ControlKind::AngularMotor(_) => "angular_motor",
            ControlKind::LinearMotor(_) => "linear_motor",
            ControlKind::AngularPlane(_) => "angular_plane",
            ControlKind::Revolute(_) => "revolute",
        }
    }

    fn jacobian(&self, bone: &Bone, error_correction_factor: f32) -> (BoneJacobian, Vec3) {
        match self {
            ControlKind::AngularMotor(c) => c.jacobian(bone, error_correction_factor),
            ControlKind::LinearMotor(c) => c.jacobian(bone, error_correction_factor),
            ControlKind::AngularPlane(c) => c.jacobian(bone, error_correction_factor),
            ControlKind::Revolute(c) => c.jacobian(bone, error_correction_factor),
        }
    }
}

/// 单骨骼约束
#[derive(Clone, Debug)]
pub struct SingleBoneConstraint {
    /// 目标骨骼索引
    pub target_bone: usize,
    pub base: ConstraintBase,
    pub kind: ControlKind,

    jacobian: BoneJacobian,
    state: ConstraintState,
}

impl SingleBoneConstraint {
    pub fn new(target_bone: usize, kind: ControlKind) -> Self {
        Self {
            target_bone,
            base: ConstraintBase::new(),
            kind,
            jacobian: BoneJacobian::ZERO,
            state: ConstraintState::default(),
        }
    }

    pub fn with_base(mut self, base: ConstraintBase) -> Self {
        self.base = base;
        self
    }

    #[inline]
    pub fn preupdate(&mut self, dt: f32, update_rate: f32) {
        self.base.preupdate(dt, update_rate);
    }

    pub fn update_jacobians_and_velocity_bias(&mut self, bones: &[Bone]) {
        let bone = &bones[self.target_bone];
        let (jacobian, velocity_bias) = self.kind.jacobian(bone, self.base.error_correction_factor);
        self.jacobian = jacobian;
        self.state.velocity_bias = velocity_bias;
    }

    /// 固定骨骼的贡献为零，有效质量随之为零，控制不产生冲量
    pub fn compute_effective_mass(&mut self, bones: &[Bone]) {
        let denominator = self.jacobian.mass_contribution(&bones[self.target_bone]);
        self.state.compute_effective_mass(denominator, self.base.softness);
    }

    pub fn warm_start(&self, bones: &mut [Bone]) {
        self.jacobian
            .apply_impulse(&mut bones[self.target_bone], self.state.accumulated_impulse);
    }

    pub fn solve_velocity_iteration(&mut self, bones: &mut [Bone]) {
        let bone = &mut bones[self.target_bone];
        let velocity = self.jacobian.velocity_contribution(bone);
        let impulse = self.state.solve(velocity, &self.base, ImpulseClamp::TwoSided);
        self.jacobian.apply_impulse(bone, impulse);
    }

    #[inline]
    pub fn clear_accumulated_impulses(&mut self) {
        self.state.clear_accumulated_impulse();
    }

    pub fn constraint_velocity(&self, bones: &[Bone]) -> Vec3 {
        self.jacobian.velocity_contribution(&bones[self.target_bone])
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
    pub fn jacobian(&self) -> &BoneJacobian {
        &self.jacobian
    }
}
