//! IK 求解器配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。

use once_cell::sync::Lazy;
use std::sync::RwLock;

/// 累积冲量在步与步之间的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImpulsePolicy {
    /// 每步结束时清除（IK 目标每帧都在变，旧冲量没有参考价值）
    #[default]
    ClearEachStep,
    /// 保留到下一步用于热启动
    Persist,
}

/// 求解器配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct SolverConfig {
    // ========== 迭代 ==========
    /// 每步速度迭代次数，默认 8
    pub velocity_iterations: usize,

    // ========== 时间 ==========
    /// 时间步长，默认 1.0
    /// 弹簧参数按此换算为 softness / 误差修正系数
    pub time_step_duration: f32,

    // ========== 冲量 ==========
    /// 累积冲量策略，默认每步清除
    pub impulse_policy: ImpulsePolicy,

    // ========== 链遍历 ==========
    /// 是否只求解从控制目标可达的关节，默认 false
    /// 关闭时所有已启用且 `is_active` 的关节都参与求解；
    /// 开启时 `is_active` 每步由链遍历重写，没有控制就没有关节参与
    pub use_active_set: bool,

    // ========== 调试 ==========
    /// 是否输出每步调试日志，默认 false
    pub debug_log: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            // ====== 迭代 ======
            // 越大 → 长链收敛越好，但更慢
            // 建议范围: 4~16
            velocity_iterations: 8,

            // ====== 时间 ======
            // IK 不做积分，单位步长即可
            time_step_duration: 1.0,

            // ====== 冲量 ======
            impulse_policy: ImpulsePolicy::ClearEachStep,

            // ====== 链遍历 ======
            // 只有控制驱动的骨架才适合开启
            use_active_set: false,

            // ====== 调试 ======
            debug_log: false,
        }
    }
}

/// 全局配置实例
static SOLVER_CONFIG: Lazy<RwLock<SolverConfig>> = Lazy::new(|| {
    RwLock::new(SolverConfig::default())
});

/// 获取当前配置（只读）
pub fn get_config() -> SolverConfig {
    SOLVER_CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: SolverConfig) {
    *SOLVER_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *SOLVER_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = SolverConfig::default();
}
