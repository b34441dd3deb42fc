//! 骨骼系统 - 参考 nphysics Multibody 设计
//!
//! - `Armature`: 耦合引擎消费的骨骼接口（层级与世界变换以它为准）
//! - BoneLink: 单个骨骼节点
//! - BoneSet: 内置的层级实现

mod bone_link;
mod bone_set;

pub use bone_link::BoneLink;
pub use bone_set::BoneSet;

use glam::Mat4;

use crate::error::Result;
use crate::model::Model;

/// 骨骼接口
///
/// Body 只查询变换、写入本地变换，从不修改父子关系。
/// 越界索引的查询返回单位矩阵，写入被忽略。
pub trait Armature {
    fn load_model(&mut self, model: &Model) -> Result<()>;

    /// 卸载模型
    fn reset(&mut self);

    /// 所有骨骼回到绑定姿态
    fn reset_pose(&mut self);

    /// 写入骨骼本地变换，由骨骼层级组合进世界变换
    fn apply_local(&mut self, bone: usize, local: Mat4);

    fn solve_ik(&mut self);

    /// 蒙皮矩阵：绑定空间 → 当前世界空间
    fn skin(&self, bone: usize) -> Mat4;

    /// 骨骼世界变换
    fn global(&self, bone: usize) -> Mat4;
}

// ============================================================================
// 类型别名
// ============================================================================

pub type Bone = BoneLink;

pub type Skeleton = BoneSet;
