//! 骨骼节点 - 参考 nphysics MultibodyLink 设计
//!
//! BoneLink 是骨骼层级的单个节点：
//! local_to_world = parent.local_to_world * translate(body_shift) * local_transform

use glam::{Mat4, Quat, Vec3};

use crate::model::BoneDesc;

/// 骨骼节点
#[derive(Clone, Debug)]
pub struct BoneLink {
    // ========================================
    // 静态数据（初始化后不变）
    // ========================================

    pub name: String,

    /// 父骨骼索引
    pub parent_index: Option<usize>,

    /// 初始位置（模型空间）
    pub initial_position: Vec3,

    /// 相对于父骨骼的偏移（在 build 时计算）
    pub body_shift: Vec3,

    /// 逆绑定矩阵（用于蒙皮）
    pub inverse_init: Mat4,

    // ========================================
    // 动态数据（每帧更新）
    // ========================================

    /// 动画或物理写入的本地变换
    pub local_transform: Mat4,

    /// local_to_parent = translate(body_shift) * local_transform
    pub local_to_parent: Mat4,

    pub local_to_world: Mat4,
}

impl BoneLink {
    pub fn new(name: String) -> Self {
        Self {
            name,
            parent_index: None,
            initial_position: Vec3::ZERO,
            body_shift: Vec3::ZERO,
            inverse_init: Mat4::IDENTITY,
            local_transform: Mat4::IDENTITY,
            local_to_parent: Mat4::IDENTITY,
            local_to_world: Mat4::IDENTITY,
        }
    }

    /// 从模型骨骼描述创建
    pub fn from_desc(desc: &BoneDesc, parent_position: Option<Vec3>) -> Self {
        let mut bone = Self::new(desc.name.clone());
        bone.parent_index = desc.parent;
        bone.initial_position = desc.position;
        bone.body_shift = desc.position - parent_position.unwrap_or(Vec3::ZERO);
        bone.inverse_init = Mat4::from_translation(-desc.position);
        bone.compute_local_transform();
        bone.local_to_world = Mat4::from_translation(desc.position);
        bone
    }

    #[inline]
    pub fn parent_id(&self) -> Option<usize> {
        self.parent_index
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent_index.is_none()
    }

    /// 世界位置
    #[inline]
    pub fn position(&self) -> Vec3 {
        self.local_to_world.col(3).truncate()
    }

    /// 世界旋转
    #[inline]
    pub fn rotation(&self) -> Quat {
        let (_, rotation, _) = self.local_to_world.to_scale_rotation_translation();
        rotation
    }

    /// 重置动画状态
    #[inline]
    pub fn reset_animation(&mut self) {
        self.local_transform = Mat4::IDENTITY;
    }

    #[inline]
    pub fn compute_local_transform(&mut self) {
        self.local_to_parent = Mat4::from_translation(self.body_shift) * self.local_transform;
    }

    /// skinning_matrix = local_to_world * inverse_init
    #[inline]
    pub fn get_skinning_matrix(&self) -> Mat4 {
        self.local_to_world * self.inverse_init
    }
}

impl Default for BoneLink {
    fn default() -> Self {
        Self::new(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_desc_bind_pose() {
        let desc = BoneDesc::new("左腕", Vec3::new(2.0, 10.0, 0.5), Some(0));
        let bone = BoneLink::from_desc(&desc, Some(Vec3::new(1.0, 9.0, 0.0)));
        assert_eq!(bone.body_shift, Vec3::new(1.0, 1.0, 0.5));
        assert_eq!(bone.position(), desc.position);
        // 绑定姿态下蒙皮矩阵为单位矩阵
        assert!(bone.get_skinning_matrix().abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn test_local_to_parent_composition() {
        let desc = BoneDesc::new("首", Vec3::new(0.0, 5.0, 0.0), None);
        let mut bone = BoneLink::from_desc(&desc, None);
        bone.local_transform = Mat4::from_rotation_x(0.5);
        bone.compute_local_transform();
        let expected = Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0)) * Mat4::from_rotation_x(0.5);
        assert!(bone.local_to_parent.abs_diff_eq(expected, 1e-6));
        assert!(bone.parent_id().is_none());
        assert!(bone.is_root());

        bone.local_to_world = bone.local_to_parent;
        assert!(bone.rotation().abs_diff_eq(Quat::from_rotation_x(0.5), 1e-6));
        assert!(bone.position().abs_diff_eq(Vec3::new(0.0, 5.0, 0.0), 1e-6));
    }
}
