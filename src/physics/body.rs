//! Body 耦合引擎
//!
//! 每帧流程固定为：applyBone（骨骼 → 运动学刚体）→ stepSimulation → updateBone
//! （动态刚体 → 骨骼本地变换）。一帧内两套表示只对齐一次，不存在帧内回路。
//!
//! 状态：未加载 --load_model--> 已加载(绑定姿态) --update*--> 已加载(模拟中)；
//! reset 回到未加载，reset_pose 保持已加载并回到绑定姿态。

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::error::{MmdError, Result};
use crate::model::{Model, RigidMode};
use crate::skeleton::Armature;

use super::config::{get_config, PhysicsConfig};
use super::debug::DebugBody;
use super::rigid_binding::RigidBinding;
use super::world::PhysicsWorld;

/// 骨骼 ↔ 刚体耦合接口
pub trait Body {
    /// 为每个刚体描述创建绑定并注册到物理世界
    ///
    /// 已有模型时返回 `ModelAlreadyLoaded`，需先 `reset`。
    fn load_model(&mut self, model: Arc<Model>) -> Result<()>;

    /// 绑定骨骼（不持有所有权），`update` 之前必须调用
    fn bind_armature(&mut self, armature: &Rc<RefCell<dyn Armature>>);

    /// 注销并销毁全部刚体绑定
    fn reset(&mut self);

    /// 清除累计力，所有刚体回到绑定姿态
    fn reset_pose(&mut self);

    /// 骨骼 → 运动学刚体
    fn apply_bone(&mut self);

    /// 整体放置变换（角色在世界中的根变换）
    fn apply_global(&mut self, m: Mat4);

    fn step_simulation(&mut self, tick: f32);

    /// 动态刚体 → 骨骼本地变换
    fn update_bone(&mut self);

    /// applyBone → stepSimulation → updateBone，顺序固定
    fn update(&mut self, tick: f32) {
        self.apply_bone();
        self.step_simulation(tick);
        self.update_bone();
    }

    /// 碰撞形状线框，两点一组
    fn debug_lines(&mut self) -> &[Vec3];

    fn is_loaded(&self) -> bool;

    /// 刚体绑定数
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 第 `index` 个刚体当前的世界变换
    fn rigid_transform(&self, index: usize) -> Option<Mat4>;
}

/// Body 实现选择
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BodyKind {
    #[default]
    Plain,
    /// 输出碰撞形状线框 + 每帧阶段日志
    Debug,
}

/// 创建 Body（物理世界随之创建）
pub fn create_body(kind: BodyKind) -> Box<dyn Body> {
    match kind {
        BodyKind::Plain => Box::new(PlainBody::new()),
        BodyKind::Debug => Box::new(DebugBody::new()),
    }
}

pub struct PlainBody {
    model: Option<Arc<Model>>,
    rigids: Vec<RigidBinding>,
    armature: Option<Weak<RefCell<dyn Armature>>>,
    /// 整体放置变换
    global: Mat4,
    config: PhysicsConfig,
    unbound_warned: bool,
    world: PhysicsWorld,
}

impl PlainBody {
    pub fn new() -> Self {
        Self::with_config(get_config())
    }

    pub fn with_config(config: PhysicsConfig) -> Self {
        Self {
            model: None,
            rigids: Vec::new(),
            armature: None,
            global: Mat4::IDENTITY,
            world: PhysicsWorld::with_config(&config),
            config,
            unbound_warned: false,
        }
    }

    pub fn bindings(&self) -> &[RigidBinding] {
        &self.rigids
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub fn global(&self) -> Mat4 {
        self.global
    }

    fn armature(&mut self) -> Option<Rc<RefCell<dyn Armature>>> {
        let armature = self.armature.as_ref().and_then(Weak::upgrade);
        if armature.is_none() && !self.rigids.is_empty() && !self.unbound_warned {
            log::warn!("Body 未绑定骨骼（或骨骼已释放），跳过骨骼同步");
            self.unbound_warned = true;
        }
        armature
    }
}

impl Default for PlainBody {
    fn default() -> Self {
        Self::new()
    }
}

impl Body for PlainBody {
    fn load_model(&mut self, model: Arc<Model>) -> Result<()> {
        if self.model.is_some() {
            log::warn!("模型 '{}' 加载前未 reset", model.name);
            return Err(MmdError::ModelAlreadyLoaded);
        }

        let mut rigids = Vec::with_capacity(model.rigids.len());
        for index in 0..model.rigids.len() {
            match RigidBinding::load(&model, index, &mut self.world, &self.config) {
                Ok(binding) => rigids.push(binding),
                Err(e) => {
                    // 已创建的刚体全部回收，不留半加载状态
                    for binding in rigids {
                        binding.reset(&mut self.world);
                    }
                    return Err(e);
                }
            }
        }

        let count = |mode: RigidMode| rigids.iter().filter(|r| r.base().mode == mode).count();
        log::info!(
            "物理构建完成 '{}': {} 刚体 ({}跟骨 + {}物理 + {}物理跟骨)",
            model.name,
            rigids.len(),
            count(RigidMode::Kinematic),
            count(RigidMode::Dynamic),
            count(RigidMode::DynamicAnchored),
        );

        self.rigids = rigids;
        self.model = Some(model);
        Ok(())
    }

    fn bind_armature(&mut self, armature: &Rc<RefCell<dyn Armature>>) {
        self.armature = Some(Rc::downgrade(armature));
        self.unbound_warned = false;
    }

    fn reset(&mut self) {
        for binding in self.rigids.drain(..) {
            binding.reset(&mut self.world);
        }
        if let Some(model) = self.model.take() {
            log::debug!("物理卸载 '{}'", model.name);
        }
        self.global = Mat4::IDENTITY;
    }

    fn reset_pose(&mut self) {
        for rigid in &mut self.rigids {
            let target = self.global * rigid.bind_transform();
            rigid.snap_to(&mut self.world, target);
        }
    }

    fn apply_bone(&mut self) {
        let Some(armature) = self.armature() else {
            return;
        };
        let armature = armature.borrow();
        for rigid in &mut self.rigids {
            let Some(bone) = rigid.bone() else {
                continue;
            };
            if rigid.is_kinematic() {
                let w = self.global * armature.skin(bone) * rigid.bind_transform();
                rigid.push_kinematic(&mut self.world, w);
            }
        }
    }

    fn apply_global(&mut self, m: Mat4) {
        let delta = m * self.global.inverse();
        for rigid in &mut self.rigids {
            let target = delta * rigid.world_transform();
            rigid.teleport(&mut self.world, target);
        }
        self.global = m;
    }

    fn step_simulation(&mut self, tick: f32) {
        if self.rigids.is_empty() {
            return;
        }
        self.world.advance(tick);
        for rigid in &mut self.rigids {
            rigid.pull_simulated(&self.world);
        }
    }

    fn update_bone(&mut self) {
        let Some(armature) = self.armature() else {
            return;
        };
        let Some(model) = self.model.as_ref() else {
            return;
        };

        let global_inverse = self.global.inverse();
        let mut armature = armature.borrow_mut();
        for rigid in &self.rigids {
            let Some(bone) = rigid.bone() else {
                continue;
            };
            if rigid.is_kinematic() {
                continue;
            }
            let parent_inverse = model.bones[bone]
                .parent
                .map(|p| armature.global(p).inverse())
                .unwrap_or(Mat4::IDENTITY);
            let w = global_inverse * rigid.world_transform();
            armature.apply_local(bone, rigid.bone_local(parent_inverse, w));
        }
    }

    fn debug_lines(&mut self) -> &[Vec3] {
        &[]
    }

    fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    fn len(&self) -> usize {
        self.rigids.len()
    }

    fn rigid_transform(&self, index: usize) -> Option<Mat4> {
        self.rigids.get(index).map(RigidBinding::world_transform)
    }
}
