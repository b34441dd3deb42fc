//! 关键帧数据

use glam::{Quat, Vec3};

/// VMD 线性插值参数（控制点位于对角线上）
pub const LINEAR_INTERPOLATION: [u8; 4] = [20, 20, 107, 107];

/// 带帧号的关键帧
pub trait Keyframe {
    fn frame(&self) -> u32;
}

/// 骨骼关键帧插值参数
///
/// 每个分量为 `[x1, y1, x2, y2]`，取值范围 [0, 127]。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoneInterpolation {
    pub x: [u8; 4],
    pub y: [u8; 4],
    pub z: [u8; 4],
    pub r: [u8; 4],
}

impl BoneInterpolation {
    pub fn uniform(parameters: [u8; 4]) -> Self {
        Self {
            x: parameters,
            y: parameters,
            z: parameters,
            r: parameters,
        }
    }

    /// 四条曲线是否都退化为直线
    pub fn is_linear(&self) -> bool {
        [self.x, self.y, self.z, self.r].iter().all(|p| is_linear(*p))
    }
}

impl Default for BoneInterpolation {
    fn default() -> Self {
        Self::uniform(LINEAR_INTERPOLATION)
    }
}

/// 两个控制点都在对角线上时曲线即 y = x
#[inline]
pub fn is_linear(parameters: [u8; 4]) -> bool {
    parameters[0] == parameters[1] && parameters[2] == parameters[3]
}

/// 骨骼关键帧
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneKeyframe {
    pub frame: u32,
    /// 相对绑定姿态的本地平移
    pub position: Vec3,
    pub rotation: Quat,
    /// 进入本帧的插值曲线，`None` 为线性
    pub interpolation: Option<BoneInterpolation>,
}

impl BoneKeyframe {
    pub fn new(frame: u32, position: Vec3, rotation: Quat) -> Self {
        Self {
            frame,
            position,
            rotation,
            interpolation: None,
        }
    }

    pub fn with_interpolation(mut self, interpolation: BoneInterpolation) -> Self {
        self.interpolation = Some(interpolation);
        self
    }
}

impl Keyframe for BoneKeyframe {
    #[inline]
    fn frame(&self) -> u32 {
        self.frame
    }
}

/// Morph 关键帧
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorphKeyframe {
    pub frame: u32,
    pub weight: f32,
}

impl MorphKeyframe {
    pub fn new(frame: u32, weight: f32) -> Self {
        Self { frame, weight }
    }
}

impl Keyframe for MorphKeyframe {
    #[inline]
    fn frame(&self) -> u32 {
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_detection() {
        assert!(BoneInterpolation::default().is_linear());
        assert!(is_linear([0, 0, 127, 127]));

        let mut ease = BoneInterpolation::default();
        ease.r = [127, 0, 127, 127];
        assert!(!ease.is_linear());
    }
}
