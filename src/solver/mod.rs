//! IK 求解器
//!
//! 持有骨骼、关节、控制三个数组，按固定阶段顺序驱动约束：
//! preupdate → 雅可比/有效质量 → 热启动 → N 次速度迭代 → 按策略清除冲量。
//! 只修改骨骼速度，位姿积分由调用方负责。

mod config;

pub use config::{get_config, reset_config, set_config, ImpulsePolicy, SolverConfig};

use crate::constraint::{IkJoint, SingleBoneConstraint};
use crate::error::{IkError, Result};
use crate::skeleton::{ActiveSet, Bone};

/// IK 求解器
///
/// 流程：add_bone / add_joint / add_control → 每帧 [写入骨骼位姿 → step → 读取骨骼速度]
pub struct IkSolver {
    bones: Vec<Bone>,
    joints: Vec<IkJoint>,
    controls: Vec<SingleBoneConstraint>,
    active_set: ActiveSet,
    config: SolverConfig,

    /// 本步参与求解的关节索引（按数组顺序，复用内存）
    joint_order: Vec<usize>,
}

impl Default for IkSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl IkSolver {
    /// 以全局配置创建
    pub fn new() -> Self {
        Self::with_config(get_config())
    }

    pub fn with_config(config: SolverConfig) -> Self {
        if config.debug_log {
            log::info!(
                "[IK] 求解器创建: 迭代={}, 步长={}, 冲量策略={:?}, 链遍历={}",
                config.velocity_iterations,
                config.time_step_duration,
                config.impulse_policy,
                config.use_active_set
            );
        }

        Self {
            bones: Vec::new(),
            joints: Vec::new(),
            controls: Vec::new(),
            active_set: ActiveSet::new(),
            config,
            joint_order: Vec::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    #[inline]
    pub fn config_mut(&mut self) -> &mut SolverConfig {
        &mut self.config
    }

    // ========================================
    // 骨骼
    // ========================================

    /// 添加骨骼，返回索引
    pub fn add_bone(&mut self, mut bone: Bone) -> usize {
        // 邻接集合只能由 add_joint / set_joint_enabled 写入
        bone.joints.clear();
        self.bones.push(bone);
        self.bones.len() - 1
    }

    pub fn bone(&self, index: usize) -> Result<&Bone> {
        let count = self.bones.len();
        self.bones.get(index).ok_or(IkError::BoneOutOfBounds { index, count })
    }

    pub fn bone_mut(&mut self, index: usize) -> Result<&mut Bone> {
        let count = self.bones.len();
        self.bones.get_mut(index).ok_or(IkError::BoneOutOfBounds { index, count })
    }

    #[inline]
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    #[inline]
    pub fn bones_mut(&mut self) -> &mut [Bone] {
        &mut self.bones
    }

    // ========================================
    // 关节
    // ========================================

    /// 添加关节并启用，返回索引
    pub fn add_joint(&mut self, mut joint: IkJoint) -> Result<usize> {
        let (index_a, index_b) = (joint.connection_a(), joint.connection_b());
        self.check_bone(index_a)?;
        self.check_bone(index_b)?;
        if index_a == index_b {
            return Err(IkError::SelfConnection { bone: index_a });
        }

        let a = &self.bones[index_a];
        let b = &self.bones[index_b];
        if a.is_pinned() && b.is_pinned() {
            log::warn!(
                "[IK] 关节 {} 连接的骨骼 '{}' 和 '{}' 都是固定的，不会产生任何效果",
                joint.kind.name(),
                a.name,
                b.name
            );
        }

        let index = self.joints.len();
        joint.is_active = true;
        joint.set_enabled(&mut self.bones, index, true);
        self.joints.push(joint);
        Ok(index)
    }

    /// 启用/禁用关节（骨骼邻接记录随之更新，`is_active` 跟随）
    pub fn set_joint_enabled(&mut self, index: usize, enabled: bool) -> Result<()> {
        let count = self.joints.len();
        let joint = self
            .joints
            .get_mut(index)
            .ok_or(IkError::JointOutOfBounds { index, count })?;
        joint.set_enabled(&mut self.bones, index, enabled);
        joint.is_active = enabled;
        Ok(())
    }

    pub fn joint(&self, index: usize) -> Result<&IkJoint> {
        let count = self.joints.len();
        self.joints.get(index).ok_or(IkError::JointOutOfBounds { index, count })
    }

    /// 可变访问关节参数
    pub fn joint_mut(&mut self, index: usize) -> Result<&mut IkJoint> {
        let count = self.joints.len();
        self.joints.get_mut(index).ok_or(IkError::JointOutOfBounds { index, count })
    }

    #[inline]
    pub fn joints(&self) -> &[IkJoint] {
        &self.joints
    }

    // ========================================
    // 控制
    // ========================================

    /// 添加单骨骼约束，返回索引
    pub fn add_control(&mut self, control: SingleBoneConstraint) -> Result<usize> {
        self.check_bone(control.target_bone)?;
        let target = &self.bones[control.target_bone];
        if target.is_pinned() {
            log::warn!(
                "[IK] 控制 {} 的目标骨骼 '{}' 是固定的，不会产生任何效果",
                control.kind.name(),
                target.name
            );
        }
        self.controls.push(control);
        Ok(self.controls.len() - 1)
    }

    pub fn control(&self, index: usize) -> Result<&SingleBoneConstraint> {
        let count = self.controls.len();
        self.controls.get(index).ok_or(IkError::ControlOutOfBounds { index, count })
    }

    pub fn control_mut(&mut self, index: usize) -> Result<&mut SingleBoneConstraint> {
        let count = self.controls.len();
        self.controls.get_mut(index).ok_or(IkError::ControlOutOfBounds { index, count })
    }

    #[inline]
    pub fn controls(&self) -> &[SingleBoneConstraint] {
        &self.controls
    }

    /// 移除全部控制
    pub fn clear_controls(&mut self) {
        self.controls.clear();
    }

    #[inline]
    pub fn active_set(&self) -> &ActiveSet {
        &self.active_set
    }

    fn check_bone(&self, index: usize) -> Result<()> {
        if index < self.bones.len() {
            Ok(())
        } else {
            Err(IkError::BoneOutOfBounds { index, count: self.bones.len() })
        }
    }

    // ========================================
    // 求解
    // ========================================

    /// 执行一步求解
    ///
    /// 只写骨骼速度；关节先于控制、各自按数组顺序求解。
    /// 默认求解所有启用且 `is_active` 的关节；开启 `use_active_set` 时
    /// `is_active` 由链遍历从控制目标重新计算。
    pub fn step(&mut self) -> Result<()> {
        let dt = self.config.time_step_duration;
        if !dt.is_finite() || dt <= 0.0 {
            return Err(IkError::InvalidTimeStep(dt));
        }
        let update_rate = 1.0 / dt;

        // 旋转可能在步与步之间被外部修改
        for bone in &mut self.bones {
            bone.update_inertia_tensor();
        }

        self.joint_order.clear();
        if self.config.use_active_set {
            if self.controls.is_empty() && !self.joints.is_empty() {
                log::warn!("[IK] 已开启链遍历但没有控制目标，{} 个关节全部跳过", self.joints.len());
            }
            let roots = self.controls.iter().map(|c| c.target_bone);
            self.active_set.update(&mut self.bones, &mut self.joints, roots);
            self.joint_order.extend_from_slice(self.active_set.joints());
            self.joint_order.sort_unstable();
        } else {
            self.joint_order.extend(
                self.joints
                    .iter()
                    .enumerate()
                    .filter(|(_, joint)| joint.enabled() && joint.is_active)
                    .map(|(index, _)| index),
            );
        }

        // 1. 雅可比与有效质量
        for &index in &self.joint_order {
            let joint = &mut self.joints[index];
            joint.preupdate(dt, update_rate);
            joint.update_jacobians_and_velocity_bias(&self.bones);
            joint.compute_effective_mass(&self.bones);
        }
        for control in &mut self.controls {
            control.preupdate(dt, update_rate);
            control.update_jacobians_and_velocity_bias(&self.bones);
            control.compute_effective_mass(&self.bones);
        }

        // 2. 热启动
        for &index in &self.joint_order {
            self.joints[index].warm_start(&mut self.bones);
        }
        for control in &self.controls {
            control.warm_start(&mut self.bones);
        }

        // 3. 速度迭代
        for _ in 0..self.config.velocity_iterations {
            for &index in &self.joint_order {
                self.joints[index].solve_velocity_iteration(&mut self.bones);
            }
            for control in &mut self.controls {
                control.solve_velocity_iteration(&mut self.bones);
            }
        }

        // 4. 冲量策略
        if self.config.impulse_policy == ImpulsePolicy::ClearEachStep {
            self.clear_accumulated_impulses();
        }

        if self.config.debug_log {
            log::debug!(
                "[IK] 求解完成: {} 骨骼, {}/{} 关节参与, {} 控制, {} 次迭代",
                self.bones.len(),
                self.joint_order.len(),
                self.joints.len(),
                self.controls.len(),
                self.config.velocity_iterations
            );
        }
        Ok(())
    }

    /// 清除所有关节和控制的累积冲量
    pub fn clear_accumulated_impulses(&mut self) {
        for joint in &mut self.joints {
            joint.clear_accumulated_impulses();
        }
        for control in &mut self.controls {
            control.clear_accumulated_impulses();
        }
    }

    /// 清空所有骨骼、关节和控制
    pub fn reset(&mut self) {
        log::info!(
            "[IK] 求解器重置: 移除 {} 骨骼, {} 关节, {} 控制",
            self.bones.len(),
            self.joints.len(),
            self.controls.len()
        );
        self.bones.clear();
        self.joints.clear();
        self.controls.clear();
        self.active_set.clear();
        self.joint_order.clear();
    }
}
