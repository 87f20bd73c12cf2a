//! 骨骼系统
//!
//! 核心设计思想：
//! - Bone: 单个刚体代理，位姿由外部写入，速度由约束冲量修改
//! - ActiveSet: 从被驱动的骨骼出发的链遍历，决定哪些关节参与求解
//!
//! 骨骼与关节分别存放在两个数组中，相互之间只通过索引引用。

mod bone;
mod active_set;

pub use bone::{Bone, BoneFlags, INERTIA_TENSOR_SCALING};
pub use active_set::ActiveSet;
