//! Motion 调度器
//!
//! 持有骨骼与 Body，按名称把动作通道映射到模型骨骼 / Morph 序号。
//! 每帧调用顺序：`update_key(frame)`（采样 → applyLocal → IK → Morph）
//! 然后 `update_physics(tick)`。

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::animation::{KeyframeSampler, MotionData};
use crate::error::Result;
use crate::model::Model;
use crate::physics::{create_body, Body, BodyKind};
use crate::skeleton::{Armature, Skeleton};

/// 通道映射：`names[i]` 在 `channels` 中的轨道序号，未命中为 `None`
pub fn remap<'a, I>(names: I, channels: &HashMap<String, usize>) -> Vec<Option<usize>>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .map(|name| channels.get(name).copied())
        .collect()
}

pub struct Motion<A: Armature + 'static = Skeleton> {
    armature: Rc<RefCell<A>>,
    body: Box<dyn Body>,
    model: Option<Arc<Model>>,
    motion: Option<Arc<MotionData>>,
    /// 模型骨骼序号 → 骨骼轨道序号
    bone_map: Vec<Option<usize>>,
    /// 模型 Morph 序号 → Morph 轨道序号
    morph_map: Vec<Option<usize>>,
    morphs: Vec<f32>,
    sampler: KeyframeSampler,
}

impl Motion<Skeleton> {
    /// 使用内置骨骼层级
    pub fn create(kind: BodyKind) -> Self {
        Self::new(Skeleton::new(), kind)
    }
}

impl<A: Armature + 'static> Motion<A> {
    pub fn new(armature: A, kind: BodyKind) -> Self {
        Self::with_body(armature, create_body(kind))
    }

    pub fn with_body(armature: A, mut body: Box<dyn Body>) -> Self {
        let armature = Rc::new(RefCell::new(armature));
        let shared: Rc<RefCell<dyn Armature>> = armature.clone();
        body.bind_armature(&shared);
        Self {
            armature,
            body,
            model: None,
            motion: None,
            bone_map: Vec::new(),
            morph_map: Vec::new(),
            morphs: Vec::new(),
            sampler: KeyframeSampler::new(),
        }
    }

    pub fn armature(&self) -> Ref<'_, A> {
        self.armature.borrow()
    }

    pub fn armature_mut(&self) -> RefMut<'_, A> {
        self.armature.borrow_mut()
    }

    pub fn body(&self) -> &dyn Body {
        self.body.as_ref()
    }

    pub fn model(&self) -> Option<&Arc<Model>> {
        self.model.as_ref()
    }

    pub fn motion(&self) -> Option<&Arc<MotionData>> {
        self.motion.as_ref()
    }

    /// 已有模型时先整体卸载
    pub fn load_model(&mut self, model: Arc<Model>) -> Result<()> {
        if self.model.is_some() {
            self.reset_model();
        }

        self.armature.borrow_mut().load_model(&model)?;
        if let Err(e) = self.body.load_model(model.clone()) {
            self.armature.borrow_mut().reset();
            return Err(e);
        }
        self.morphs = vec![0.0; model.morphs.len()];

        log::info!(
            "模型加载完成 '{}': {} 骨骼, {} Morph, {} 刚体",
            model.name,
            model.bones.len(),
            model.morphs.len(),
            model.rigids.len()
        );
        self.model = Some(model);
        self.remap_channels();
        Ok(())
    }

    pub fn load_motion(&mut self, motion: Arc<MotionData>) {
        if self.motion.is_some() {
            self.reset_motion();
        }
        log::info!("动作加载 '{}': 最大帧 {}", motion.name, motion.duration());
        self.motion = Some(motion);
        self.remap_channels();
    }

    /// 模型与动作都就绪时重建映射
    fn remap_channels(&mut self) {
        let (Some(model), Some(motion)) = (&self.model, &self.motion) else {
            return;
        };

        self.bone_map = remap(model.bone_names(), motion.bone_channels());
        self.morph_map = remap(model.morph_names(), motion.morph_channels());

        for (i, channel) in self.bone_map.iter().enumerate() {
            let keys = channel
                .and_then(|c| motion.bone_track_at(c))
                .map_or(0, |t| t.len());
            log::debug!("映射骨骼 {} '{}': {} 关键帧", i, model.bones[i].name, keys);
        }
        log::info!(
            "通道映射 '{}' → '{}': 骨骼 {}/{}, Morph {}/{}",
            motion.name,
            model.name,
            self.bone_map.iter().flatten().count(),
            self.bone_map.len(),
            self.morph_map.iter().flatten().count(),
            self.morph_map.len()
        );
    }

    fn unmap(&mut self) {
        self.bone_map.clear();
        self.morph_map.clear();
    }

    /// 采样全部骨骼通道 → IK → 采样 Morph
    ///
    /// 未映射的骨骼每次都写入单位变换；未加载模型时为空操作。
    pub fn update_key(&mut self, frame: f32) {
        if self.model.is_none() {
            return;
        }
        let motion = self.motion.as_deref();

        {
            let mut armature = self.armature.borrow_mut();
            if let Some(motion) = motion {
                for (bone, channel) in self.bone_map.iter().enumerate() {
                    let track = channel.and_then(|c| motion.bone_track_at(c));
                    let pose = self.sampler.sample_bone(track, frame);
                    armature.apply_local(bone, pose.to_local());
                }
            }
            armature.solve_ik();
        }

        if let Some(motion) = motion {
            for (weight, channel) in self.morphs.iter_mut().zip(&self.morph_map) {
                let track = channel.and_then(|c| motion.morph_track_at(c));
                *weight = self.sampler.sample_morph(track, frame);
            }
        }
    }

    pub fn update_physics(&mut self, tick: f32) {
        self.body.update(tick);
    }

    /// 角色整体放置变换
    pub fn update_global(&mut self, m: Mat4) {
        self.body.apply_global(m);
    }

    /// 只让刚体回到绑定姿态
    pub fn reset_physics(&mut self) {
        self.body.reset_pose();
    }

    pub fn reset_pose(&mut self) {
        if self.model.is_none() {
            return;
        }
        self.armature.borrow_mut().reset_pose();
        self.body.reset_pose();
        self.morphs.fill(0.0);
    }

    /// 卸载动作，保留模型与刚体
    pub fn reset_motion(&mut self) {
        self.unmap();
        self.reset_pose();
        self.motion = None;
    }

    pub fn reset_model(&mut self) {
        self.unmap();
        self.armature.borrow_mut().reset();
        self.body.reset();
        self.morphs.clear();
        self.model = None;
    }

    pub fn reset(&mut self) {
        self.reset_model();
        self.motion = None;
    }

    pub fn skin(&self, bone: usize) -> Mat4 {
        self.armature.borrow().skin(bone)
    }

    /// Morph 权重，越界为 0
    pub fn face(&self, morph: usize) -> f32 {
        self.morphs.get(morph).copied().unwrap_or(0.0)
    }

    pub fn morph_weights(&self) -> &[f32] {
        &self.morphs
    }

    pub fn debug_lines(&mut self) -> &[Vec3] {
        self.body.debug_lines()
    }
}
