//! 错误类型
//!
//! 只有加载阶段会失败；每帧更新路径全部使用默认值兜底，不返回错误。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MmdError {
    /// 已有模型加载，未先 reset
    #[error("a model is already loaded; call reset() before loading another")]
    ModelAlreadyLoaded,

    #[error("rigid body {rigid} '{name}' references bone {bone}, but the model has {bone_count} bones")]
    InvalidBoneIndex {
        rigid: usize,
        name: String,
        bone: usize,
        bone_count: usize,
    },

    #[error("bone {bone} references parent {parent}, but the model has {bone_count} bones")]
    InvalidParentIndex {
        bone: usize,
        parent: usize,
        bone_count: usize,
    },

    /// 骨骼父子关系成环
    #[error("bone {bone} is part of a parent cycle")]
    BoneCycle { bone: usize },

    /// 形状尺寸非正或非有限值
    #[error("rigid body {rigid} '{name}' has an invalid {shape:?} size {size:?}")]
    InvalidShapeSize {
        rigid: usize,
        name: String,
        shape: crate::model::RigidShape,
        size: [f32; 3],
    },

    /// 动态刚体质量必须 > 0
    #[error("rigid body {rigid} '{name}' is dynamic but has mass {mass}")]
    NonPositiveMass {
        rigid: usize,
        name: String,
        mass: f32,
    },
}

pub type Result<T> = std::result::Result<T, MmdError>;
