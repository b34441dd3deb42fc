//! 骨骼集合 - 参考 nphysics Multibody 设计
//!
//! 管理骨骼层级，按父骨骼在前的顺序求值世界变换。

use std::collections::HashMap;

use glam::Mat4;

use crate::error::{MmdError, Result};
use crate::model::Model;

use super::{Armature, BoneLink};

/// 骨骼集合
#[derive(Clone, Debug, Default)]
pub struct BoneSet {
    bones: Vec<BoneLink>,
    /// 子骨骼缓存
    children: Vec<Vec<usize>>,
    /// 求值顺序（父骨骼总在子骨骼之前）
    order: Vec<usize>,
    name_to_index: HashMap<String, usize>,
}

impl BoneSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bone(&self, index: usize) -> Option<&BoneLink> {
        self.bones.get(index)
    }

    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// 骨骼当前的本地变换（动画/物理写入值）
    pub fn local(&self, index: usize) -> Mat4 {
        self.bones
            .get(index)
            .map(|b| b.local_transform)
            .unwrap_or(Mat4::IDENTITY)
    }

    /// 全部骨骼按求值顺序重算世界变换
    pub fn update_global_transforms(&mut self) {
        for i in 0..self.order.len() {
            let index = self.order[i];
            self.update_bone(index);
        }
    }

    /// 重算单个骨骼及其全部子孙
    fn update_subtree(&mut self, root: usize) {
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            self.update_bone(index);
            stack.extend(self.children[index].iter().copied());
        }
    }

    fn update_bone(&mut self, index: usize) {
        let parent_world = self.bones[index]
            .parent_id()
            .map(|p| self.bones[p].local_to_world)
            .unwrap_or(Mat4::IDENTITY);
        let bone = &mut self.bones[index];
        bone.compute_local_transform();
        bone.local_to_world = parent_world * bone.local_to_parent;
    }
}

/// 父骨骼在前的拓扑序；父索引越界或成环时报错
fn evaluation_order(model: &Model, children: &[Vec<usize>]) -> Result<Vec<usize>> {
    let count = model.bones.len();
    let mut order = Vec::with_capacity(count);
    let mut stack: Vec<usize> = (0..count)
        .filter(|&i| model.bones[i].parent.is_none())
        .collect();
    stack.reverse();

    while let Some(index) = stack.pop() {
        order.push(index);
        stack.extend(children[index].iter().rev().copied());
    }

    if order.len() != count {
        let mut visited = vec![false; count];
        for &i in &order {
            visited[i] = true;
        }
        let bone = visited.iter().position(|v| !v).unwrap_or(0);
        return Err(MmdError::BoneCycle { bone });
    }
    Ok(order)
}

impl Armature for BoneSet {
    fn load_model(&mut self, model: &Model) -> Result<()> {
        let count = model.bones.len();
        let mut children = vec![Vec::new(); count];
        for (i, desc) in model.bones.iter().enumerate() {
            if let Some(parent) = desc.parent {
                if parent >= count {
                    return Err(MmdError::InvalidParentIndex {
                        bone: i,
                        parent,
                        bone_count: count,
                    });
                }
                children[parent].push(i);
            }
        }
        let order = evaluation_order(model, &children)?;

        self.bones = model
            .bones
            .iter()
            .map(|desc| {
                let parent_position = desc.parent.map(|p| model.bones[p].position);
                BoneLink::from_desc(desc, parent_position)
            })
            .collect();
        self.name_to_index = model
            .bones
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.clone(), i))
            .collect();
        self.children = children;
        self.order = order;
        self.update_global_transforms();

        log::debug!("骨骼加载完成: {} 骨骼", self.bones.len());
        Ok(())
    }

    fn reset(&mut self) {
        self.bones.clear();
        self.children.clear();
        self.order.clear();
        self.name_to_index.clear();
    }

    fn reset_pose(&mut self) {
        for bone in &mut self.bones {
            bone.reset_animation();
        }
        self.update_global_transforms();
    }

    fn apply_local(&mut self, bone: usize, local: Mat4) {
        if bone >= self.bones.len() {
            return;
        }
        self.bones[bone].local_transform = local;
        self.update_subtree(bone);
    }

    /// 内置骨骼集合不带 IK 链，这里只重新求值整个层级
    fn solve_ik(&mut self) {
        self.update_global_transforms();
    }

    fn skin(&self, bone: usize) -> Mat4 {
        self.bones
            .get(bone)
            .map(|b| b.get_skinning_matrix())
            .unwrap_or(Mat4::IDENTITY)
    }

    fn global(&self, bone: usize) -> Mat4 {
        self.bones
            .get(bone)
            .map(|b| b.local_to_world)
            .unwrap_or(Mat4::IDENTITY)
    }
}
