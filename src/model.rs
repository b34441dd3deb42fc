//! 模型数据（只读）
//!
//! 由外部解析层（PMX 读取器等）填充，耦合引擎只读取不修改。
//! 坐标和 PMX 一致：骨骼位置为绑定姿态下的模型空间坐标。

use glam::{EulerRot, Mat4, Quat, Vec3};

/// 骨骼
#[derive(Debug, Clone)]
pub struct BoneDesc {
    pub name: String,
    /// 绑定姿态位置（模型空间）
    pub position: Vec3,
    /// 父骨骼索引，根骨骼为 None
    pub parent: Option<usize>,
}

impl BoneDesc {
    pub fn new(name: impl Into<String>, position: Vec3, parent: Option<usize>) -> Self {
        Self {
            name: name.into(),
            position,
            parent,
        }
    }
}

/// Morph 目标（重映射只需要名称）
#[derive(Debug, Clone)]
pub struct MorphDesc {
    pub name: String,
}

impl MorphDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// 刚体形状
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigidShape {
    Sphere,
    Box,
    Capsule,
}

/// 刚体物理模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigidMode {
    /// 跟随骨骼（运动学），质量视为 0
    Kinematic,
    /// 物理驱动
    Dynamic,
    /// 物理驱动 + 骨骼位置对齐
    DynamicAnchored,
}

impl RigidMode {
    #[inline]
    pub fn is_kinematic(self) -> bool {
        self == RigidMode::Kinematic
    }
}

/// 刚体描述
#[derive(Debug, Clone)]
pub struct RigidDesc {
    pub name: String,
    pub shape: RigidShape,
    /// 形状尺寸（PMX 原值）
    pub size: Vec3,
    /// 绑定姿态位置
    pub position: Vec3,
    /// 绑定姿态旋转（欧拉角，弧度）
    pub rotation: Vec3,
    /// 关联骨骼
    pub bone: Option<usize>,
    pub mode: RigidMode,
    pub mass: f32,
    /// 线性阻尼
    pub move_damping: f32,
    /// 角阻尼
    pub rotate_damping: f32,
    /// 反弹系数
    pub repulsion: f32,
    pub friction: f32,
    /// 碰撞组（0..=15）
    pub group: u8,
    /// 碰撞掩码
    pub mask: u16,
}

impl RigidDesc {
    /// 绑定姿态世界变换 W0 = translate(position) * rotate(rotation)
    ///
    /// 欧拉角按 Z·Y·X 组合。
    pub fn bind_transform(&self) -> Mat4 {
        let q = Quat::from_euler(
            EulerRot::ZYX,
            self.rotation.z,
            self.rotation.y,
            self.rotation.x,
        );
        Mat4::from_rotation_translation(q, self.position)
    }
}

impl Default for RigidDesc {
    fn default() -> Self {
        Self {
            name: String::new(),
            shape: RigidShape::Sphere,
            size: Vec3::ONE,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            bone: None,
            mode: RigidMode::Kinematic,
            mass: 1.0,
            move_damping: 0.0,
            rotate_damping: 0.0,
            repulsion: 0.0,
            friction: 0.5,
            group: 0,
            mask: u16::MAX,
        }
    }
}

/// 角色模型
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub name: String,
    pub bones: Vec<BoneDesc>,
    pub rigids: Vec<RigidDesc>,
    pub morphs: Vec<MorphDesc>,
}

impl Model {
    /// 骨骼相对父骨骼的偏移（根骨骼为绝对位置）
    pub fn bone_offset(&self, index: usize) -> Vec3 {
        let bone = &self.bones[index];
        match bone.parent {
            Some(p) => bone.position - self.bones[p].position,
            None => bone.position,
        }
    }

    pub fn bone_names(&self) -> impl Iterator<Item = &str> {
        self.bones.iter().map(|b| b.name.as_str())
    }

    pub fn morph_names(&self) -> impl Iterator<Item = &str> {
        self.morphs.iter().map(|m| m.name.as_str())
    }
}
