//! 关键帧采样
//!
//! 二分查找包围区间 `(l, r)`，满足 `keys[l].frame <= frame < keys[r].frame`；
//! 区间外截断到首尾关键帧，不外推。

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};

use super::bezier_curve::{BezierCurve, BezierCurveCache, BezierCurveFactory, Curve};
use super::keyframe::{is_linear, BoneInterpolation, Keyframe};
use super::motion_track::{BoneMotionTrack, MorphMotionTrack};

/// 曲线采样段数
const CURVE_SAMPLES: u32 = 128;

/// 骨骼通道采样结果（本地变换）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BonePose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl BonePose {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    /// translate(position) * rotate(rotation)
    pub fn to_local(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }
}

impl Default for BonePose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// 包围区间；`l == r` 表示直接取该关键帧
pub fn bracket<K: Keyframe>(keys: &[K], frame: f32) -> Option<(usize, usize)> {
    if keys.is_empty() {
        return None;
    }
    let next = keys.partition_point(|k| k.frame() as f32 <= frame);
    Some(if next == 0 {
        (0, 0)
    } else if next == keys.len() {
        (next - 1, next - 1)
    } else {
        (next - 1, next)
    })
}

#[derive(Debug, Clone, Default)]
pub struct KeyframeSampler {
    curves: BezierCurveCache,
}

impl KeyframeSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 无轨道或空轨道返回单位变换
    pub fn sample_bone(&self, track: Option<&BoneMotionTrack>, frame: f32) -> BonePose {
        let Some(keys) = track.map(BoneMotionTrack::keyframes) else {
            return BonePose::IDENTITY;
        };
        let Some((l, r)) = bracket(keys, frame) else {
            return BonePose::IDENTITY;
        };

        let left = &keys[l];
        let s = blend_factor(left.frame, keys[r].frame, frame);
        if l == r || s == 0.0 {
            return BonePose {
                position: left.position,
                rotation: left.rotation,
            };
        }

        let right = &keys[r];
        let [ax, ay, az, ar] = match &right.interpolation {
            Some(curves) if !curves.is_linear() => self.eased(curves, s),
            _ => [s; 4],
        };
        let (p0, p1) = (left.position, right.position);
        BonePose {
            position: Vec3::new(
                p0.x + (p1.x - p0.x) * ax,
                p0.y + (p1.y - p0.y) * ay,
                p0.z + (p1.z - p0.z) * az,
            ),
            rotation: left.rotation.slerp(right.rotation, ar).normalize(),
        }
    }

    /// 无轨道或空轨道返回 0
    pub fn sample_morph(&self, track: Option<&MorphMotionTrack>, frame: f32) -> f32 {
        let Some(keys) = track.map(MorphMotionTrack::keyframes) else {
            return 0.0;
        };
        let Some((l, r)) = bracket(keys, frame) else {
            return 0.0;
        };

        let left = keys[l].weight;
        if l == r {
            return left;
        }
        let s = blend_factor(keys[l].frame, keys[r].frame, frame);
        left + (keys[r].weight - left) * s
    }

    fn eased(&self, curves: &BoneInterpolation, s: f32) -> [f32; 4] {
        [curves.x, curves.y, curves.z, curves.r].map(|p| {
            if is_linear(p) {
                s
            } else {
                self.curve(p).value(s)
            }
        })
    }

    fn curve(&self, p: [u8; 4]) -> Arc<BezierCurve> {
        self.curves.get_or_new([p[0], p[1]], [p[2], p[3]], CURVE_SAMPLES)
    }
}

#[inline]
fn blend_factor(l: u32, r: u32, frame: f32) -> f32 {
    if r <= l {
        return 0.0;
    }
    (frame - l as f32) / (r as f32 - l as f32)
}
