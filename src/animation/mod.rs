//! 动画系统
//!
//! - keyframe: 骨骼 / Morph 关键帧
//! - motion_track: 有序关键帧轨道与动作数据
//! - bezier_curve: VMD 插值曲线
//! - sampler: 关键帧采样

pub mod bezier_curve;
pub mod keyframe;
pub mod motion_track;
pub mod sampler;

pub use bezier_curve::{BezierCurve, BezierCurveCache, BezierCurveFactory, Curve};
pub use keyframe::{BoneInterpolation, BoneKeyframe, Keyframe, MorphKeyframe};
pub use motion_track::{BoneMotionTrack, MorphMotionTrack, MotionData, MotionTrack};
pub use sampler::{BonePose, KeyframeSampler};
