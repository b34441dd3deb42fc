//! MMD 物理耦合引擎
//!
//! 骨骼 ↔ 刚体双向同步 + 关键帧求值：
//! - `physics`: 刚体绑定、物理世界（Rapier3D）、Body 耦合引擎
//! - `animation`: 关键帧轨道与采样器
//! - `skeleton`: Armature 接口与内置骨骼层级
//! - `motion`: Motion 调度器（采样 → IK → 物理 → 回写骨骼）

pub mod animation;
pub mod error;
pub mod model;
pub mod motion;
pub mod physics;
pub mod skeleton;

pub use error::{MmdError, Result};
pub use model::{BoneDesc, Model, MorphDesc, RigidDesc, RigidMode, RigidShape};
pub use motion::Motion;
pub use physics::{create_body, Body, BodyKind};
pub use skeleton::{Armature, Skeleton};
