//! 物理世界
//!
//! Bullet3 → Rapier 映射：
//! | Bullet3 | Rapier |
//! |---------|--------|
//! | btDefaultCollisionConfiguration + btCollisionDispatcher | NarrowPhase |
//! | btDbvtBroadphase | DefaultBroadPhase |
//! | btSequentialImpulseConstraintSolver | PhysicsPipeline + IntegrationParameters |
//! | btDiscreteDynamicsWorld | RigidBodySet + ColliderSet + IslandManager + 关节集合 |
//!
//! 世界随 Body 创建、随 Body 销毁，与模型的加载/卸载无关。

use std::num::NonZeroUsize;

use glam::Vec3;
use rapier3d::prelude::*;

use super::config::{get_config, PhysicsConfig};

pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    gravity: Vector<f32>,
    /// 固定子步长
    fixed_time_step: f32,
    max_substep_count: u32,
    max_linear_velocity: f32,
    max_angular_velocity: f32,
    /// 未消耗的累计时间（不足一个子步）
    local_time: f32,
}

impl PhysicsWorld {
    /// 按全局配置创建
    pub fn new() -> Self {
        Self::with_config(&get_config())
    }

    pub fn with_config(config: &PhysicsConfig) -> Self {
        let fixed_time_step = config.fixed_time_step();

        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = fixed_time_step;
        if let Some(iterations) = NonZeroUsize::new(config.solver_iterations) {
            integration_parameters.num_solver_iterations = iterations;
        }

        if config.debug_log {
            log::info!(
                "物理世界创建: 子步={:.5}s, 最大子步={}, 重力Y={}",
                fixed_time_step, config.max_substep_count, config.gravity_y
            );
        }

        Self {
            pipeline: PhysicsPipeline::new(),
            integration_parameters,
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity: vector![0.0, config.gravity_y, 0.0],
            fixed_time_step,
            max_substep_count: config.max_substep_count,
            max_linear_velocity: config.max_linear_velocity,
            max_angular_velocity: config.max_angular_velocity,
            local_time: 0.0,
        }
    }

    /// 加入刚体及其碰撞体
    ///
    /// `group` 为碰撞组编号（成员位 = 1 << group），`mask` 为可碰撞组掩码。
    pub fn add_rigid_body(
        &mut self,
        body: RigidBody,
        mut collider: Collider,
        group: u8,
        mask: u16,
    ) -> (RigidBodyHandle, ColliderHandle) {
        collider.set_collision_groups(collision_groups(group, mask));
        let body_handle = self.bodies.insert(body);
        let collider_handle =
            self.colliders.insert_with_parent(collider, body_handle, &mut self.bodies);
        (body_handle, collider_handle)
    }

    /// 移除刚体（附属碰撞体一并移除）
    pub fn remove_rigid_body(&mut self, handle: RigidBodyHandle) {
        self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    /// 推进模拟
    ///
    /// 固定子步长，子步数上限为 `max_substep_count`。超出上限的整子步直接丢弃
    /// （时间膨胀），不足一个子步的余量保留到下一帧。返回实际执行的子步数。
    pub fn advance(&mut self, delta_time: f32) -> u32 {
        if !(delta_time > 0.0) {
            return 0;
        }

        self.local_time += delta_time;
        let whole = (self.local_time / self.fixed_time_step) as u32;
        self.local_time -= whole as f32 * self.fixed_time_step;
        let substeps = whole.min(self.max_substep_count);

        for _ in 0..substeps {
            self.step_once();
        }
        if substeps > 0 {
            self.clamp_velocities();
        }
        substeps
    }

    fn step_once(&mut self) {
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );
    }

    /// 限制动态刚体速度，防止卡顿帧或穿模导致爆炸
    fn clamp_velocities(&mut self) {
        let max_lin = self.max_linear_velocity;
        let max_ang = self.max_angular_velocity;

        for (_, rb) in self.bodies.iter_mut() {
            if !rb.is_dynamic() {
                continue;
            }

            let linvel = *rb.linvel();
            let lin = linvel.norm();
            if lin > max_lin {
                rb.set_linvel(linvel * (max_lin / lin), true);
            }

            let angvel = *rb.angvel();
            let ang = angvel.norm();
            if ang > max_ang {
                rb.set_angvel(angvel * (max_ang / ang), true);
            }
        }
    }

    #[inline]
    pub fn body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    #[inline]
    pub fn body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle)
    }

    #[inline]
    pub fn collider(&self, handle: ColliderHandle) -> Option<&Collider> {
        self.colliders.get(handle)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn gravity(&self) -> Vec3 {
        super::from_vector(&self.gravity)
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = super::to_vector(gravity);
    }

    pub fn fixed_time_step(&self) -> f32 {
        self.fixed_time_step
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// PMX 碰撞组 → Rapier 交互组
pub fn collision_groups(group: u8, mask: u16) -> InteractionGroups {
    let membership = 1u32 << u32::from(group.min(15));
    InteractionGroups::new(
        Group::from_bits_truncate(membership),
        Group::from_bits_truncate(u32::from(mask)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn falling_ball(world: &mut PhysicsWorld) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(vector![0.0, 10.0, 0.0])
            .can_sleep(false)
            .build();
        let collider = ColliderBuilder::ball(0.5).mass(1.0).build();
        world.add_rigid_body(body, collider, 0, u16::MAX).0
    }

    #[test]
    fn test_advance_uses_fixed_substeps() {
        let mut world = PhysicsWorld::with_config(&PhysicsConfig::default());
        let dt = world.fixed_time_step();
        assert_eq!(world.advance(dt), 1);
        assert_eq!(world.advance(dt * 3.0), 3);
    }

    #[test]
    fn test_advance_accumulates_partial_steps() {
        let mut world = PhysicsWorld::with_config(&PhysicsConfig::default());
        let dt = world.fixed_time_step();
        assert_eq!(world.advance(dt * 0.5), 0);
        assert_eq!(world.advance(dt * 0.75), 1);
    }

    #[test]
    fn test_advance_drops_time_beyond_budget() {
        let mut world = PhysicsWorld::with_config(&PhysicsConfig::default());
        let dt = world.fixed_time_step();
        assert_eq!(world.advance(dt * 11.5), 10);
        // 丢弃多出的整子步，余下的半个子步保留
        assert_eq!(world.advance(dt * 0.5), 1);
    }

    #[test]
    fn test_set_gravity() {
        let mut world = PhysicsWorld::with_config(&PhysicsConfig::default());
        assert!((world.gravity().y + crate::physics::config::MMD_GRAVITY).abs() < 1e-4);

        world.set_gravity(Vec3::ZERO);
        let handle = falling_ball(&mut world);
        world.advance(world.fixed_time_step() * 10.0);
        let y = world.body(handle).map(|b| b.translation().y).unwrap_or(0.0);
        assert!((y - 10.0).abs() < 1e-6);
        assert_eq!(world.gravity(), Vec3::ZERO);
    }

    #[test]
    fn test_advance_ignores_non_positive_delta() {
        let mut world = PhysicsWorld::with_config(&PhysicsConfig::default());
        assert_eq!(world.advance(0.0), 0);
        assert_eq!(world.advance(-1.0), 0);
        assert_eq!(world.advance(f32::NAN), 0);
    }

    #[test]
    fn test_dynamic_body_falls_under_gravity() {
        let mut world = PhysicsWorld::with_config(&PhysicsConfig::default());
        let handle = falling_ball(&mut world);
        let dt = world.fixed_time_step();
        world.advance(dt * 10.0);
        let y = world.body(handle).map(|b| b.translation().y).unwrap_or(10.0);
        assert!(y < 10.0);
    }

    #[test]
    fn test_remove_rigid_body() {
        let mut world = PhysicsWorld::with_config(&PhysicsConfig::default());
        let handle = falling_ball(&mut world);
        assert_eq!(world.body_count(), 1);
        world.remove_rigid_body(handle);
        assert_eq!(world.body_count(), 0);
        assert!(world.body(handle).is_none());
    }

    #[test]
    fn test_velocity_clamp() {
        let config = PhysicsConfig {
            max_linear_velocity: 5.0,
            ..Default::default()
        };
        let mut world = PhysicsWorld::with_config(&config);
        let handle = falling_ball(&mut world);
        if let Some(body) = world.body_mut(handle) {
            body.set_linvel(vector![0.0, 0.0, 500.0], true);
        }
        world.advance(world.fixed_time_step());
        let speed = world.body(handle).map(|b| b.linvel().norm()).unwrap_or(f32::MAX);
        assert!(speed <= 5.0 + 1e-3);
    }

    #[test]
    fn test_collision_groups() {
        let groups = collision_groups(3, 0b1010);
        assert_eq!(groups.memberships.bits(), 1 << 3);
        assert_eq!(groups.filter.bits(), 0b1010);
        assert_eq!(collision_groups(40, 0).memberships.bits(), 1 << 15);
    }
}
