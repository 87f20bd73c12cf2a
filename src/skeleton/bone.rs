//! 骨骼刚体代理
//!
//! Bone 是约束图中的单个刚体节点：位姿由外部写入，速度只通过冲量修改。
//! 每个 Bone 记录与之相连的已启用关节索引，用于链遍历。

use std::collections::BTreeSet;

use bitflags::bitflags;
use glam::{Mat3, Quat, Vec3};

use crate::math::EPSILON;

// ============================================================================
// 骨骼标志
// ============================================================================

bitflags! {
    /// 骨骼标志位
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct BoneFlags: u32 {
        /// 固定（视为无穷质量，不接收冲量）
        const PINNED = 1 << 0;
        /// 参与本次求解（由链遍历写入）
        const ACTIVE = 1 << 1;
    }
}

/// 惯性张量缩放，放大转动惯量让链条更"稳"
pub const INERTIA_TENSOR_SCALING: f32 = 2.5;

// ============================================================================
// 骨骼
// ============================================================================

/// 骨骼刚体代理
///
/// - 静态数据：尺寸、质量、标志
/// - 动态数据：位姿和速度，每步由外部写入或由约束冲量修改
#[derive(Clone, Debug)]
pub struct Bone {
    /// 骨骼名称（仅用于日志）
    pub name: String,

    /// 世界位置（质心）
    pub position: Vec3,

    /// 世界旋转
    pub orientation: Quat,

    /// 线速度
    pub linear_velocity: Vec3,

    /// 角速度
    pub angular_velocity: Vec3,

    /// 骨骼标志
    pub flags: BoneFlags,

    /// 质量倒数
    inverse_mass: f32,

    /// 半径
    radius: f32,

    /// 长度
    height: f32,

    /// 本地空间惯性张量的逆
    local_inertia_tensor_inverse: Mat3,

    /// 世界空间惯性张量的逆（由 update_inertia_tensor 刷新）
    pub(crate) inertia_tensor_inverse: Mat3,

    /// 已启用的相连关节索引
    pub(crate) joints: BTreeSet<usize>,
}

impl Bone {
    /// 创建新骨骼（质量 1）
    pub fn new(position: Vec3, orientation: Quat, radius: f32, height: f32) -> Self {
        let mut bone = Self {
            name: String::new(),
            position,
            orientation,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            flags: BoneFlags::empty(),
            inverse_mass: 1.0,
            radius: radius.max(0.0),
            height: height.max(0.0),
            local_inertia_tensor_inverse: Mat3::IDENTITY,
            inertia_tensor_inverse: Mat3::IDENTITY,
            joints: BTreeSet::new(),
        };
        bone.compute_local_inertia_tensor();
        bone.update_inertia_tensor();
        bone
    }

    /// 设置名称
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 设置质量
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.set_mass(mass);
        self
    }

    /// 设置固定
    pub fn with_pinned(mut self, pinned: bool) -> Self {
        self.set_pinned(pinned);
        self
    }

    // ========================================
    // 质量属性
    // ========================================

    #[inline]
    pub fn mass(&self) -> f32 {
        1.0 / self.inverse_mass
    }

    /// 设置质量
    ///
    /// 正无穷表示无穷质量（质量倒数为 0）；小于 EPSILON 的值和 NaN 会被抬升到 EPSILON。
    pub fn set_mass(&mut self, mass: f32) {
        self.inverse_mass = if mass == f32::INFINITY {
            0.0
        } else {
            1.0 / mass.max(EPSILON)
        };
        self.compute_local_inertia_tensor();
        self.update_inertia_tensor();
    }

    #[inline]
    pub fn inverse_mass(&self) -> f32 {
        self.inverse_mass
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius.max(0.0);
        self.compute_local_inertia_tensor();
        self.update_inertia_tensor();
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn set_height(&mut self, height: f32) {
        self.height = height.max(0.0);
        self.compute_local_inertia_tensor();
        self.update_inertia_tensor();
    }

    /// 世界空间惯性张量的逆
    #[inline]
    pub fn inertia_tensor_inverse(&self) -> Mat3 {
        self.inertia_tensor_inverse
    }

    /// 本地空间惯性张量的逆
    #[inline]
    pub fn local_inertia_tensor_inverse(&self) -> Mat3 {
        self.local_inertia_tensor_inverse
    }

    /// 以圆柱近似计算本地惯性张量（长轴为本地 Y）
    fn compute_local_inertia_tensor(&mut self) {
        let multiplier = self.mass() * INERTIA_TENSOR_SCALING;
        let r2 = self.radius * self.radius;
        let h2 = self.height * self.height;
        let side = (h2 / 12.0 + r2 * 0.25) * multiplier;
        let axial = r2 * 0.5 * multiplier;
        let tensor = Vec3::new(side, axial, side);

        // 零尺寸的骨骼没有转动惯量可言，退化为不可转动
        self.local_inertia_tensor_inverse = Mat3::from_diagonal(Vec3::new(
            if tensor.x > 0.0 { 1.0 / tensor.x } else { 0.0 },
            if tensor.y > 0.0 { 1.0 / tensor.y } else { 0.0 },
            if tensor.z > 0.0 { 1.0 / tensor.z } else { 0.0 },
        ));
    }

    /// 由当前旋转刷新世界惯性张量：I_world^-1 = R * I_local^-1 * R^T
    ///
    /// 旋转可能在求解循环外被修改，因此每步开始前必须调用。
    pub fn update_inertia_tensor(&mut self) {
        let rotation = Mat3::from_quat(self.orientation);
        self.inertia_tensor_inverse =
            rotation * self.local_inertia_tensor_inverse * rotation.transpose();
    }

    // ========================================
    // 冲量
    // ========================================

    /// 施加线冲量
    #[inline]
    pub fn apply_linear_impulse(&mut self, impulse: Vec3) {
        self.linear_velocity += impulse * self.inverse_mass;
    }

    /// 施加角冲量
    #[inline]
    pub fn apply_angular_impulse(&mut self, impulse: Vec3) {
        self.angular_velocity += self.inertia_tensor_inverse * impulse;
    }

    /// 清空速度
    #[inline]
    pub fn reset_velocity(&mut self) {
        self.linear_velocity = Vec3::ZERO;
        self.angular_velocity = Vec3::ZERO;
    }

    // ========================================
    // 坐标变换
    // ========================================

    /// 本地点 → 世界点
    #[inline]
    pub fn local_to_world_point(&self, local: Vec3) -> Vec3 {
        self.position + self.orientation * local
    }

    /// 世界点 → 本地点
    #[inline]
    pub fn world_to_local_point(&self, world: Vec3) -> Vec3 {
        self.orientation.conjugate() * (world - self.position)
    }

    /// 本地方向 → 世界方向
    #[inline]
    pub fn local_to_world_vector(&self, local: Vec3) -> Vec3 {
        self.orientation * local
    }

    /// 世界方向 → 本地方向
    #[inline]
    pub fn world_to_local_vector(&self, world: Vec3) -> Vec3 {
        self.orientation.conjugate() * world
    }

    // ========================================
    // 标志检查方法
    // ========================================

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.flags.contains(BoneFlags::PINNED)
    }

    #[inline]
    pub fn set_pinned(&mut self, pinned: bool) {
        self.flags.set(BoneFlags::PINNED, pinned);
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.flags.contains(BoneFlags::ACTIVE)
    }

    #[inline]
    pub(crate) fn set_active(&mut self, active: bool) {
        self.flags.set(BoneFlags::ACTIVE, active);
    }

    /// 已启用的相连关节
    pub fn joints(&self) -> impl Iterator<Item = usize> + '_ {
        self.joints.iter().copied()
    }

    #[inline]
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }
}

impl Default for Bone {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Quat::IDENTITY, 0.5, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mass_clamped() {
        let mut bone = Bone::default();
        bone.set_mass(0.0);
        assert!(bone.inverse_mass().is_finite());
        bone.set_mass(2.0);
        assert_relative_eq!(bone.inverse_mass(), 0.5);
        bone.set_mass(f32::NAN);
        assert!(bone.inverse_mass().is_finite());
    }

    #[test]
    fn test_infinite_mass() {
        let mut bone = Bone::default();
        bone.set_mass(f32::INFINITY);
        assert_eq!(bone.inverse_mass(), 0.0);
        assert_eq!(bone.mass(), f32::INFINITY);
        assert_eq!(bone.local_inertia_tensor_inverse(), Mat3::ZERO);
        assert!(bone.inertia_tensor_inverse().is_finite());

        bone.apply_linear_impulse(Vec3::new(5.0, 0.0, 0.0));
        bone.apply_angular_impulse(Vec3::ONE);
        assert_eq!(bone.linear_velocity, Vec3::ZERO);
        assert_eq!(bone.angular_velocity, Vec3::ZERO);
    }

    #[test]
    fn test_inertia_follows_orientation() {
        let mut bone = Bone::new(Vec3::ZERO, Quat::IDENTITY, 0.2, 2.0);
        let local = bone.inertia_tensor_inverse();

        // 绕 Z 旋转 90 度后，本地 Y 轴对应世界 X 轴
        bone.orientation = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        bone.update_inertia_tensor();
        let world = bone.inertia_tensor_inverse();
        assert_relative_eq!(world.x_axis.x, local.y_axis.y, epsilon = 1e-3);
        assert_relative_eq!(world.y_axis.y, local.x_axis.x, epsilon = 1e-3);
    }

    #[test]
    fn test_apply_impulse() {
        let mut bone = Bone::default().with_mass(2.0);
        bone.apply_linear_impulse(Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(bone.linear_velocity.x, 0.5);

        bone.apply_angular_impulse(Vec3::Y);
        let expected = bone.inertia_tensor_inverse() * Vec3::Y;
        assert!(bone.angular_velocity.abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn test_point_round_trip() {
        let bone = Bone::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_y(0.7),
            0.5,
            1.0,
        );
        let world = Vec3::new(-1.0, 0.5, 4.0);
        let local = bone.world_to_local_point(world);
        assert!(bone.local_to_world_point(local).abs_diff_eq(world, 1e-5));
    }

    #[test]
    fn test_pinned_flag() {
        let mut bone = Bone::default();
        assert!(!bone.is_pinned());
        bone.set_pinned(true);
        assert!(bone.is_pinned());
        assert!(!bone.is_active());
    }
}
