//! 错误类型
//!
//! 数值退化在约束内部就地处理（零行、钳制、自适应求逆），不会产生错误；
//! 这里只覆盖求解器入口处的索引/配置错误。

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IkError {
    #[error("bone index {index} out of bounds (bone count {count})")]
    BoneOutOfBounds { index: usize, count: usize },

    #[error("joint index {index} out of bounds (joint count {count})")]
    JointOutOfBounds { index: usize, count: usize },

    #[error("control index {index} out of bounds (control count {count})")]
    ControlOutOfBounds { index: usize, count: usize },

    #[error("joint connects bone {bone} to itself")]
    SelfConnection { bone: usize },

    #[error("invalid time step duration: {0}")]
    InvalidTimeStep(f32),
}

pub type Result<T> = std::result::Result<T, IkError>;
