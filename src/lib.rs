//! 骨骼链 IK 约束求解器
//!
//! 以顺序冲量（投影 Gauss-Seidel）求解骨骼之间的关节、限位和马达，
//! 带热启动、Baumgarte 位置修正和 softness 正则化。
//!
//! 模块：
//! - `skeleton`: 骨骼刚体代理与链遍历
//! - `constraint`: 双骨骼关节与单骨骼控制
//! - `solver`: 求解器驱动与配置
//! - `math`: 小型矩阵/向量工具

pub mod constraint;
pub mod error;
pub mod math;
pub mod skeleton;
pub mod solver;

pub use constraint::{
    AngularMotor, AngularPlaneConstraint, BallSocketJoint, BoneJacobian, ConstraintBase,
    ConstraintState, ControlKind, DistanceJoint, DistanceLimit, IkJoint, ImpulseClamp, JointKind,
    LinearMotor, PointOnLineJoint, PointOnPlaneJoint, RevoluteConstraint, RevoluteJoint,
    SingleBoneConstraint, SpringSettings, SwingLimit, SwivelHingeJoint, TwistLimit,
};
pub use error::{IkError, Result};
pub use skeleton::{ActiveSet, Bone, BoneFlags};
pub use solver::{ImpulsePolicy, IkSolver, SolverConfig};
