//! 活动集 - 链遍历
//!
//! 从被单骨骼约束驱动的骨骼出发，沿已启用关节向外扩散，
//! 遇到固定骨骼即停止。被触达的关节标记为活动，只有活动关节参与求解。

use std::collections::VecDeque;

use crate::constraint::IkJoint;

use super::bone::Bone;

/// 活动集
#[derive(Clone, Debug, Default)]
pub struct ActiveSet {
    /// 活动骨骼索引（不含固定骨骼）
    bones: Vec<usize>,
    /// 活动关节索引（按发现顺序）
    joints: Vec<usize>,
    /// 遍历标记缓冲区（复用内存）
    visited: Vec<bool>,
    queue: VecDeque<usize>,
}

impl ActiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 重新计算活动集
    ///
    /// `roots` 为遍历起点（通常是单骨骼约束的目标骨骼）。
    /// 所有骨骼/关节的活动标志会先被清除再重新写入。
    pub fn update<I>(&mut self, bones: &mut [Bone], joints: &mut [IkJoint], roots: I)
    where
        I: IntoIterator<Item = usize>,
    {
        self.bones.clear();
        self.joints.clear();
        self.queue.clear();
        self.visited.clear();
        self.visited.resize(bones.len(), false);

        for bone in bones.iter_mut() {
            bone.set_active(false);
        }
        for joint in joints.iter_mut() {
            joint.is_active = false;
        }

        for root in roots {
            if root < bones.len() && !self.visited[root] && !bones[root].is_pinned() {
                self.visited[root] = true;
                self.queue.push_back(root);
            }
        }

        while let Some(bone_idx) = self.queue.pop_front() {
            bones[bone_idx].set_active(true);
            self.bones.push(bone_idx);

            // 邻接集合只包含已启用关节
            for joint_idx in bones[bone_idx].joints() {
                let Some(joint) = joints.get_mut(joint_idx) else {
                    continue;
                };
                if joint.is_active {
                    continue;
                }
                joint.is_active = true;
                self.joints.push(joint_idx);

                let other = joint.other(bone_idx);
                if other < bones.len() && !self.visited[other] {
                    self.visited[other] = true;
                    // 固定骨骼是遍历的边界：关节参与求解，但不再向外扩散
                    if !bones[other].is_pinned() {
                        self.queue.push_back(other);
                    }
                }
            }
        }
    }

    /// 活动骨骼
    pub fn bones(&self) -> &[usize] {
        &self.bones
    }

    /// 活动关节
    pub fn joints(&self) -> &[usize] {
        &self.joints
    }

    pub fn clear(&mut self) {
        self.bones.clear();
        self.joints.clear();
    }
}
