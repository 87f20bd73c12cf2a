//! 单骨骼控制：角度马达、线性马达、角度平面、单骨骼旋转铰链
//!
//! 目标是世界空间中的固定量（位置、朝向、平面、轴），只作用于一根骨骼。

use std::f32::consts::FRAC_PI_2;

use glam::{Mat3, Quat, Vec3};

use crate::math::{cross_matrix, from_rows, perpendicular, rotation_vector, safe_acos, try_normalize};
use crate::skeleton::Bone;

use super::BoneJacobian;

// ============================================================================
// 角度马达
// ============================================================================

/// 角度马达：把骨骼朝向拉向目标朝向
#[derive(Clone, Debug)]
pub struct AngularMotor {
    pub target_orientation: Quat,
}

impl AngularMotor {
    pub fn new(target_orientation: Quat) -> Self {
        Self {
            target_orientation: target_orientation.normalize(),
        }
    }

    pub(crate) fn jacobian(&self, bone: &Bone, error_correction_factor: f32) -> (BoneJacobian, Vec3) {
        // 从当前朝向到目标朝向的世界空间旋转
        let error = self.target_orientation * bone.orientation.inverse();
        let bias = rotation_vector(error) * error_correction_factor;
        (BoneJacobian::angular(Mat3::IDENTITY), bias)
    }
}

// ============================================================================
// 线性马达
// ============================================================================

/// 线性马达：把骨骼上的锚点拉向世界目标位置
#[derive(Clone, Debug)]
pub struct LinearMotor {
    /// 质心到锚点的本地偏移
    pub local_offset: Vec3,
    pub target_position: Vec3,
}

impl LinearMotor {
    /// 以世界锚点创建
    pub fn new(bone: &Bone, anchor: Vec3, target_position: Vec3) -> Self {
        Self {
            local_offset: bone.world_to_local_vector(anchor - bone.position),
            target_position,
        }
    }

    pub fn offset(&self, bone: &Bone) -> Vec3 {
        bone.local_to_world_vector(self.local_offset)
    }

    pub fn set_offset(&mut self, bone: &Bone, offset: Vec3) {
        self.local_offset = bone.world_to_local_vector(offset);
    }

    /// 锚点当前世界位置
    pub fn anchor(&self, bone: &Bone) -> Vec3 {
        bone.position + self.offset(bone)
    }

    pub(crate) fn jacobian(&self, bone: &Bone, error_correction_factor: f32) -> (BoneJacobian, Vec3) {
        let r = self.offset(bone);
        let bias = (self.target_position - (bone.position + r)) * error_correction_factor;
        (BoneJacobian::new(Mat3::IDENTITY, cross_matrix(r).transpose()), bias)
    }
}

// ============================================================================
// 角度平面
// ============================================================================

/// 角度平面：骨骼上的轴被约束在以世界法线定义的平面内
#[derive(Clone, Debug)]
pub struct AngularPlaneConstraint {
    /// 世界平面法线
    plane_normal: Vec3,
    /// 骨骼本地轴
    pub local_bone_axis: Vec3,
}

impl AngularPlaneConstraint {
    pub fn new(bone: &Bone, plane_normal: Vec3, bone_axis: Vec3) -> Self {
        Self {
            plane_normal: plane_normal.normalize_or_zero(),
            local_bone_axis: bone.world_to_local_vector(bone_axis.normalize_or_zero()),
        }
    }

    #[inline]
    pub fn plane_normal(&self) -> Vec3 {
        self.plane_normal
    }

    pub fn set_plane_normal(&mut self, normal: Vec3) {
        self.plane_normal = normal.normalize_or_zero();
    }

    pub fn bone_axis(&self, bone: &Bone) -> Vec3 {
        bone.local_to_world_vector(self.local_bone_axis)
    }

    pub fn set_bone_axis(&mut self, bone: &Bone, axis: Vec3) {
        self.local_bone_axis = bone.world_to_local_vector(axis.normalize_or_zero());
    }

    pub(crate) fn jacobian(&self, bone: &Bone, error_correction_factor: f32) -> (BoneJacobian, Vec3) {
        let axis = self.bone_axis(bone);
        let Some(row) = try_normalize(axis.cross(self.plane_normal)) else {
            return (BoneJacobian::ZERO, Vec3::ZERO);
        };
        let error = safe_acos(self.plane_normal.dot(axis)) - FRAC_PI_2;
        (
            BoneJacobian::angular(from_rows(row, Vec3::ZERO, Vec3::ZERO)),
            Vec3::new(error * error_correction_factor, 0.0, 0.0),
        )
    }
}

// ============================================================================
// 单骨骼旋转铰链
// ============================================================================

/// 单骨骼旋转铰链：骨骼上的轴与世界自由轴对齐，只能绕自由轴转动
#[derive(Clone, Debug)]
pub struct RevoluteConstraint {
    free_axis: Vec3,
    constrained_axis_1: Vec3,
    constrained_axis_2: Vec3,
    pub local_bone_axis: Vec3,
}

impl RevoluteConstraint {
    pub fn new(bone: &Bone, free_axis: Vec3, bone_axis: Vec3) -> Self {
        let mut constraint = Self {
            free_axis: Vec3::ZERO,
            constrained_axis_1: Vec3::ZERO,
            constrained_axis_2: Vec3::ZERO,
            local_bone_axis: bone.world_to_local_vector(bone_axis.normalize_or_zero()),
        };
        constraint.set_free_axis(free_axis);
        constraint
    }

    #[inline]
    pub fn free_axis(&self) -> Vec3 {
        self.free_axis
    }

    /// 设置世界自由轴并重新计算两条受约束轴
    pub fn set_free_axis(&mut self, axis: Vec3) {
        self.free_axis = axis.normalize_or_zero();
        self.constrained_axis_1 = perpendicular(self.free_axis);
        self.constrained_axis_2 = self.free_axis.cross(self.constrained_axis_1);
    }

    #[inline]
    pub fn constrained_axes(&self) -> (Vec3, Vec3) {
        (self.constrained_axis_1, self.constrained_axis_2)
    }

    pub fn bone_axis(&self, bone: &Bone) -> Vec3 {
        bone.local_to_world_vector(self.local_bone_axis)
    }

    pub fn set_bone_axis(&mut self, bone: &Bone, axis: Vec3) {
        self.local_bone_axis = bone.world_to_local_vector(axis.normalize_or_zero());
    }

    pub(crate) fn jacobian(&self, bone: &Bone, error_correction_factor: f32) -> (BoneJacobian, Vec3) {
        let (axis_1, axis_2) = self.constrained_axes();
        let error = self.bone_axis(bone).cross(self.free_axis);
        let bias = Vec3::new(error.dot(axis_1), error.dot(axis_2), 0.0) * error_correction_factor;
        (
            BoneJacobian::angular(from_rows(axis_1, axis_2, Vec3::ZERO)),
            bias,
        )
    }
}
