//! 物理配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。
//! PhysicsWorld 在创建时读取一次快照。

use once_cell::sync::Lazy;
use std::sync::RwLock;

/// MMD 单位下的重力加速度（经验值，骨骼长度单位不是米）
pub const MMD_GRAVITY: f32 = 9.806_65 * 20.0 / 1.58;

/// 物理配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct PhysicsConfig {
    // ========== 重力 ==========
    /// 重力 Y 分量（负数向下）
    pub gravity_y: f32,

    // ========== 模拟参数 ==========
    /// 固定子步频率，默认 120（子步长 1/120s）
    pub physics_fps: f32,
    /// 每帧最大子步数，默认 10；超出的时间直接丢弃
    pub max_substep_count: u32,
    /// 约束求解器迭代次数，默认 8
    pub solver_iterations: usize,

    // ========== 刚体参数缩放 ==========
    /// 线性阻尼缩放（乘以 PMX 原值）
    pub linear_damping_scale: f32,
    /// 角阻尼缩放（乘以 PMX 原值）
    pub angular_damping_scale: f32,
    /// 质量缩放（乘以 PMX 原值）
    pub mass_scale: f32,

    // ========== 速度限制 ==========
    /// 最大线速度，默认 100.0
    pub max_linear_velocity: f32,
    /// 最大角速度 (rad/s)，默认 50.0
    pub max_angular_velocity: f32,

    // ========== 调试 ==========
    /// 是否输出调试日志
    pub debug_log: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity_y: -MMD_GRAVITY,

            physics_fps: 120.0,
            max_substep_count: 10,
            solver_iterations: 8,

            linear_damping_scale: 1.0,
            angular_damping_scale: 1.0,
            mass_scale: 1.0,

            // 卡顿帧或穿模时防止刚体爆飞
            max_linear_velocity: 100.0,
            max_angular_velocity: 50.0,

            debug_log: false,
        }
    }
}

impl PhysicsConfig {
    /// 固定子步长（秒）
    #[inline]
    pub fn fixed_time_step(&self) -> f32 {
        1.0 / self.physics_fps
    }
}

/// 全局配置实例
static PHYSICS_CONFIG: Lazy<RwLock<PhysicsConfig>> = Lazy::new(|| {
    RwLock::new(PhysicsConfig::default())
});

/// 获取当前配置（只读快照）
pub fn get_config() -> PhysicsConfig {
    PHYSICS_CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: PhysicsConfig) {
    *PHYSICS_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *PHYSICS_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = PhysicsConfig::default();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_step_budget() {
        let config = PhysicsConfig::default();
        assert!((config.fixed_time_step() - 1.0 / 120.0).abs() < 1e-9);
        assert_eq!(config.max_substep_count, 10);
        assert!(config.gravity_y < -100.0 && config.gravity_y > -150.0);
    }
}
