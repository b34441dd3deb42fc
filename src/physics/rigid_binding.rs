//! 刚体绑定
//!
//! 每个 PMX 刚体描述对应一个 RigidBinding：持有求解器中的刚体 + 碰撞体句柄、
//! 一个运动状态代理，以及加载时一次性算出的绑定姿态矩阵：
//! - `W0`: 刚体绑定姿态世界变换
//! - `S0i`: inverse(W0) * translate(骨骼绑定位置)
//! - `Ti`: translate(父骨骼位置 - 骨骼位置)
//!
//! 三个矩阵加载后不再重算。

use glam::Mat4;
use rapier3d::prelude::*;

use crate::error::{MmdError, Result};
use crate::model::{Model, RigidDesc, RigidMode, RigidShape};

use super::config::PhysicsConfig;
use super::world::PhysicsWorld;
use super::{from_isometry, to_isometry};

/// 运动状态代理（对应 btDefaultMotionState）
///
/// 运动学刚体由 applyBone 写入；动态刚体在每次步进后从求解器同步。
#[derive(Debug, Clone, Copy)]
pub struct MotionState {
    world_transform: Mat4,
}

impl MotionState {
    pub fn new(world_transform: Mat4) -> Self {
        Self { world_transform }
    }

    #[inline]
    pub fn world_transform(&self) -> Mat4 {
        self.world_transform
    }

    #[inline]
    pub fn set_world_transform(&mut self, m: Mat4) {
        self.world_transform = m;
    }
}

#[derive(Debug)]
pub struct RigidBinding {
    base: RigidDesc,
    index: usize,
    body: RigidBodyHandle,
    shape: ColliderHandle,
    motion: MotionState,
    w0: Mat4,
    s0i: Mat4,
    ti: Mat4,
}

impl RigidBinding {
    /// 从模型的第 `index` 个刚体描述创建绑定并加入物理世界
    ///
    /// 描述数据先整体校验，校验失败时世界中不会留下任何对象。
    pub fn load(
        model: &Model,
        index: usize,
        world: &mut PhysicsWorld,
        config: &PhysicsConfig,
    ) -> Result<Self> {
        let base = model.rigids[index].clone();
        validate(model, index, &base)?;

        let w0 = base.bind_transform();
        let (ti, s0i) = match base.bone {
            Some(bone_index) => {
                let bone = &model.bones[bone_index];
                (
                    Mat4::from_translation(-model.bone_offset(bone_index)),
                    w0.inverse() * Mat4::from_translation(bone.position),
                )
            }
            None => (Mat4::IDENTITY, w0.inverse()),
        };

        let collider = build_collider(&base, config);
        let body = build_body(&base, w0, config);
        let (body, shape) = world.add_rigid_body(body, collider, base.group, base.mask);

        Ok(Self {
            base,
            index,
            body,
            shape,
            motion: MotionState::new(w0),
            w0,
            s0i,
            ti,
        })
    }

    /// 从世界中移除刚体、碰撞体，并释放运动状态
    pub fn reset(self, world: &mut PhysicsWorld) {
        world.remove_rigid_body(self.body);
    }

    // ========================================
    // 访问器
    // ========================================

    #[inline]
    pub fn base(&self) -> &RigidDesc {
        &self.base
    }

    /// 对应的刚体描述索引
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn bone(&self) -> Option<usize> {
        self.base.bone
    }

    #[inline]
    pub fn is_kinematic(&self) -> bool {
        self.base.mode.is_kinematic()
    }

    #[inline]
    pub fn handle(&self) -> RigidBodyHandle {
        self.body
    }

    #[inline]
    pub fn collider_handle(&self) -> ColliderHandle {
        self.shape
    }

    /// W0
    #[inline]
    pub fn bind_transform(&self) -> Mat4 {
        self.w0
    }

    /// S0i
    #[inline]
    pub fn inverse_bind_to_bone(&self) -> Mat4 {
        self.s0i
    }

    /// Ti
    #[inline]
    pub fn bone_origin_offset(&self) -> Mat4 {
        self.ti
    }

    /// 运动状态代理中的世界变换
    #[inline]
    pub fn world_transform(&self) -> Mat4 {
        self.motion.world_transform()
    }

    // ========================================
    // 同步
    // ========================================

    /// 写入运动学目标（下一子步生效，代理立即更新）
    pub fn push_kinematic(&mut self, world: &mut PhysicsWorld, transform: Mat4) {
        self.motion.set_world_transform(transform);
        if let Some(rb) = world.body_mut(self.body) {
            rb.set_next_kinematic_position(to_isometry(transform));
        }
    }

    /// 从求解器读取模拟结果写入代理（仅动态刚体）
    pub fn pull_simulated(&mut self, world: &PhysicsWorld) {
        if self.is_kinematic() {
            return;
        }
        if let Some(rb) = world.body(self.body) {
            self.motion.set_world_transform(from_isometry(rb.position()));
        }
    }

    /// 瞬移到指定变换，保留速度
    pub fn teleport(&mut self, world: &mut PhysicsWorld, transform: Mat4) {
        self.motion.set_world_transform(transform);
        if let Some(rb) = world.body_mut(self.body) {
            let iso = to_isometry(transform);
            rb.set_position(iso, true);
            if rb.is_kinematic() {
                rb.set_next_kinematic_position(iso);
            }
        }
    }

    /// 清除累计力和速度并瞬移到指定变换
    pub fn snap_to(&mut self, world: &mut PhysicsWorld, transform: Mat4) {
        if let Some(rb) = world.body_mut(self.body) {
            rb.reset_forces(true);
            rb.reset_torques(true);
            rb.set_linvel(vector![0.0, 0.0, 0.0], true);
            rb.set_angvel(vector![0.0, 0.0, 0.0], true);
        }
        self.teleport(world, transform);
    }

    /// 模拟世界变换 → 骨骼本地变换
    ///
    /// L = Ti * Pi * W * S0i，`parent_inverse` 为父骨骼当前世界变换的逆（无父骨骼为单位矩阵）。
    #[inline]
    pub fn bone_local(&self, parent_inverse: Mat4, world_transform: Mat4) -> Mat4 {
        self.ti * parent_inverse * world_transform * self.s0i
    }
}

fn validate(model: &Model, index: usize, base: &RigidDesc) -> Result<()> {
    if let Some(bone) = base.bone {
        if bone >= model.bones.len() {
            return Err(MmdError::InvalidBoneIndex {
                rigid: index,
                name: base.name.clone(),
                bone,
                bone_count: model.bones.len(),
            });
        }
        if let Some(parent) = model.bones[bone].parent {
            if parent >= model.bones.len() {
                return Err(MmdError::InvalidParentIndex {
                    bone,
                    parent,
                    bone_count: model.bones.len(),
                });
            }
        }
    }

    let size = base.size;
    let positive = |v: f32| v.is_finite() && v > 0.0;
    let size_ok = match base.shape {
        RigidShape::Box => positive(size.x) && positive(size.y) && positive(size.z),
        RigidShape::Sphere => positive(size.x),
        // 高度为 0 的胶囊退化为球
        RigidShape::Capsule => positive(size.x) && size.y.is_finite() && size.y >= 0.0,
    };
    if !size_ok {
        return Err(MmdError::InvalidShapeSize {
            rigid: index,
            name: base.name.clone(),
            shape: base.shape,
            size: size.to_array(),
        });
    }

    if base.mode != RigidMode::Kinematic && !(base.mass.is_finite() && base.mass > 0.0) {
        return Err(MmdError::NonPositiveMass {
            rigid: index,
            name: base.name.clone(),
            mass: base.mass,
        });
    }

    Ok(())
}

/// 碰撞形状：盒 = size/2 半长；球半径 = size.x/2；胶囊 (半径, 高) = (size.x, size.y)
fn build_collider(base: &RigidDesc, config: &PhysicsConfig) -> Collider {
    let half = base.size / 2.0;
    let builder = match base.shape {
        RigidShape::Box => ColliderBuilder::cuboid(half.x, half.y, half.z),
        RigidShape::Sphere => ColliderBuilder::ball(half.x),
        RigidShape::Capsule => ColliderBuilder::capsule_y(half.y, base.size.x),
    };
    let builder = builder.friction(base.friction).restitution(base.repulsion);

    // 运动学刚体质量为 0，惯量由形状与质量推导
    if base.mode.is_kinematic() {
        builder.density(0.0).build()
    } else {
        builder.mass(base.mass * config.mass_scale).build()
    }
}

fn build_body(base: &RigidDesc, w0: Mat4, config: &PhysicsConfig) -> RigidBody {
    let builder = if base.mode.is_kinematic() {
        RigidBodyBuilder::kinematic_position_based()
    } else {
        RigidBodyBuilder::dynamic()
    };

    // 运动学刚体即使静止也必须每帧响应外部推送，所有刚体禁用休眠
    builder
        .position(to_isometry(w0))
        .linear_damping(base.move_damping * config.linear_damping_scale)
        .angular_damping(base.rotate_damping * config.angular_damping_scale)
        .can_sleep(false)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoneDesc;
    use glam::Vec3;

    fn model_with(rigid: RigidDesc) -> Model {
        Model {
            name: "test".into(),
            bones: vec![
                BoneDesc::new("センター", Vec3::new(0.0, 8.0, 0.0), None),
                BoneDesc::new("髪", Vec3::new(0.0, 15.0, 1.0), Some(0)),
            ],
            rigids: vec![rigid],
            morphs: Vec::new(),
        }
    }

    fn load(model: &Model) -> (PhysicsWorld, Result<RigidBinding>) {
        let config = PhysicsConfig::default();
        let mut world = PhysicsWorld::with_config(&config);
        let binding = RigidBinding::load(model, 0, &mut world, &config);
        (world, binding)
    }

    #[test]
    fn test_bonded_correction_matrices() {
        let model = model_with(RigidDesc {
            position: Vec3::new(0.0, 14.0, 1.0),
            rotation: Vec3::new(0.0, 0.0, 0.5),
            bone: Some(1),
            mode: RigidMode::Dynamic,
            ..Default::default()
        });
        let (_world, binding) = load(&model);
        let binding = binding.expect("load");

        let w0 = model.rigids[0].bind_transform();
        assert!(binding.bind_transform().abs_diff_eq(w0, 1e-6));
        let expected_ti = Mat4::from_translation(Vec3::new(0.0, 8.0, 0.0) - Vec3::new(0.0, 15.0, 1.0));
        assert!(binding.bone_origin_offset().abs_diff_eq(expected_ti, 1e-6));
        let expected_s0i = w0.inverse() * Mat4::from_translation(Vec3::new(0.0, 15.0, 1.0));
        assert!(binding.inverse_bind_to_bone().abs_diff_eq(expected_s0i, 1e-5));
    }

    #[test]
    fn test_unbonded_correction_matrices() {
        let model = model_with(RigidDesc {
            position: Vec3::new(1.0, 2.0, 3.0),
            ..Default::default()
        });
        let (_world, binding) = load(&model);
        let binding = binding.expect("load");
        assert_eq!(binding.bone_origin_offset(), Mat4::IDENTITY);
        let expected = model.rigids[0].bind_transform().inverse();
        assert!(binding.inverse_bind_to_bone().abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn test_bone_local_at_bind_pose_is_offset_from_parent() {
        let model = model_with(RigidDesc {
            position: Vec3::new(0.0, 14.0, 1.0),
            bone: Some(1),
            mode: RigidMode::Dynamic,
            ..Default::default()
        });
        let (_world, binding) = load(&model);
        let binding = binding.expect("load");

        // 父骨骼处于绑定姿态时，回写的本地变换应为单位矩阵（无物理偏移）
        let parent_inverse = Mat4::from_translation(Vec3::new(0.0, 8.0, 0.0)).inverse();
        let local = binding.bone_local(parent_inverse, binding.bind_transform());
        assert!(local.abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn test_kinematic_body_is_flagged() {
        let model = model_with(RigidDesc::default());
        let (world, binding) = load(&model);
        let binding = binding.expect("load");
        let rb = world.body(binding.handle()).expect("body");
        assert!(rb.is_kinematic());
        assert!(binding.is_kinematic());
    }

    #[test]
    fn test_kinematic_body_never_sleeps() {
        let model = model_with(RigidDesc::default());
        let (mut world, binding) = load(&model);
        let mut binding = binding.expect("load");
        let target = binding.bind_transform();

        // 静止推送约 3 秒（超过默认休眠时间）
        for _ in 0..40 {
            binding.push_kinematic(&mut world, target);
            world.advance(1.0);
        }
        let rb = world.body(binding.handle()).expect("body");
        assert!(rb.activation().normalized_linear_threshold < 0.0);
        assert!(rb.activation().angular_threshold < 0.0);
        assert!(!rb.is_sleeping());
    }

    #[test]
    fn test_dynamic_body_mass() {
        let model = model_with(RigidDesc {
            mode: RigidMode::Dynamic,
            mass: 2.5,
            ..Default::default()
        });
        let (world, binding) = load(&model);
        let binding = binding.expect("load");
        assert!(world.body(binding.handle()).map(|b| b.is_dynamic()).unwrap_or(false));
        let mass = world.collider(binding.collider_handle()).map(|c| c.mass()).unwrap_or(0.0);
        assert!((mass - 2.5).abs() < 1e-4);
    }

    #[test]
    fn test_shape_dimensions() {
        let size = Vec3::new(2.0, 4.0, 6.0);

        let model = model_with(RigidDesc { shape: RigidShape::Box, size, ..Default::default() });
        let (world, binding) = load(&model);
        let c = world.collider(binding.expect("box").collider_handle()).expect("collider");
        let cuboid = c.shape().as_cuboid().expect("cuboid");
        assert!((cuboid.half_extents.z - 3.0).abs() < 1e-6);

        let model = model_with(RigidDesc { shape: RigidShape::Sphere, size, ..Default::default() });
        let (world, binding) = load(&model);
        let c = world.collider(binding.expect("sphere").collider_handle()).expect("collider");
        assert!((c.shape().as_ball().expect("ball").radius - 1.0).abs() < 1e-6);

        let model = model_with(RigidDesc { shape: RigidShape::Capsule, size, ..Default::default() });
        let (world, binding) = load(&model);
        let c = world.collider(binding.expect("capsule").collider_handle()).expect("collider");
        let capsule = c.shape().as_capsule().expect("capsule");
        assert!((capsule.radius - 2.0).abs() < 1e-6);
        assert!((capsule.half_height() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_descriptor_creates_nothing() {
        let model = model_with(RigidDesc {
            shape: RigidShape::Box,
            size: Vec3::new(1.0, 0.0, 1.0),
            ..Default::default()
        });
        let (world, binding) = load(&model);
        assert!(matches!(binding, Err(MmdError::InvalidShapeSize { .. })));
        assert_eq!(world.body_count(), 0);

        let model = model_with(RigidDesc {
            mode: RigidMode::DynamicAnchored,
            mass: 0.0,
            ..Default::default()
        });
        let (world, binding) = load(&model);
        assert!(matches!(binding, Err(MmdError::NonPositiveMass { .. })));
        assert_eq!(world.body_count(), 0);

        let model = model_with(RigidDesc { bone: Some(7), ..Default::default() });
        let (world, binding) = load(&model);
        assert!(matches!(binding, Err(MmdError::InvalidBoneIndex { bone: 7, .. })));
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn test_reset_removes_body() {
        let model = model_with(RigidDesc::default());
        let (mut world, binding) = load(&model);
        let binding = binding.expect("load");
        let handle = binding.handle();
        binding.reset(&mut world);
        assert!(world.body(handle).is_none());
        assert_eq!(world.body_count(), 0);
    }
}
