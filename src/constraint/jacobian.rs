//! 单骨骼雅可比块
//!
//! 线性/角度两个 3x3 块，按行存储受约束方向。
//! 正向（世界 → 约束空间）：`linear * v + angular * ω`；
//! 反向（约束空间 → 世界冲量）：`linear^T * λ`、`angular^T * λ`。

use glam::{Mat3, Vec3};

use crate::skeleton::Bone;

/// 单骨骼雅可比块
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneJacobian {
    pub linear: Mat3,
    pub angular: Mat3,
}

impl Default for BoneJacobian {
    fn default() -> Self {
        Self::ZERO
    }
}

impl BoneJacobian {
    pub const ZERO: Self = Self {
        linear: Mat3::ZERO,
        angular: Mat3::ZERO,
    };

    #[inline]
    pub fn new(linear: Mat3, angular: Mat3) -> Self {
        Self { linear, angular }
    }

    /// 仅角度行
    #[inline]
    pub fn angular(angular: Mat3) -> Self {
        Self {
            linear: Mat3::ZERO,
            angular,
        }
    }

    /// 对 J * M^-1 * J^T 的贡献；固定骨骼视为无穷质量，贡献为零
    pub fn mass_contribution(&self, bone: &Bone) -> Mat3 {
        if bone.is_pinned() {
            return Mat3::ZERO;
        }
        let linear_w = Mat3::from_diagonal(Vec3::splat(bone.inverse_mass()));
        let linear = self.linear * linear_w * self.linear.transpose();
        let angular = self.angular * bone.inertia_tensor_inverse() * self.angular.transpose();
        linear + angular
    }

    /// 骨骼速度在约束空间中的分量
    #[inline]
    pub fn velocity_contribution(&self, bone: &Bone) -> Vec3 {
        self.linear * bone.linear_velocity + self.angular * bone.angular_velocity
    }

    /// 把约束空间冲量转换到世界空间并施加；固定骨骼不接收冲量
    #[inline]
    pub fn apply_impulse(&self, bone: &mut Bone, impulse: Vec3) {
        if bone.is_pinned() {
            return;
        }
        bone.apply_linear_impulse(self.linear.transpose() * impulse);
        bone.apply_angular_impulse(self.angular.transpose() * impulse);
    }

    pub fn is_finite(&self) -> bool {
        self.linear.is_finite() && self.angular.is_finite()
    }
}
