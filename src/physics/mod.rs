//! 物理模块
//!
//! - `world`: Rapier3D 物理世界（固定子步 1/120s，最多 10 子步）
//! - `rigid_binding`: 单个刚体的绑定姿态与求解器资源
//! - `body`: Body 耦合引擎（applyBone → stepSimulation → updateBone）
//! - `debug`: 带线框输出的 Body 变体
//!
//! 本文件提供 glam 列主序仿射矩阵与 Rapier 变换之间的互转。

pub mod body;
pub mod config;
pub mod debug;
pub mod rigid_binding;
pub mod world;

pub use body::{create_body, Body, BodyKind, PlainBody};
pub use config::{get_config, reset_config, set_config, PhysicsConfig};
pub use debug::DebugBody;
pub use rigid_binding::{MotionState, RigidBinding};
pub use world::PhysicsWorld;

use glam::{Mat4, Quat, Vec3};
use rapier3d::na::{Quaternion, UnitQuaternion};
use rapier3d::prelude::{Isometry, Translation, Vector};

/// glam 向量 → Rapier 向量
#[inline]
pub fn to_vector(v: Vec3) -> Vector<f32> {
    Vector::new(v.x, v.y, v.z)
}

/// Rapier 向量 → glam 向量
#[inline]
pub fn from_vector(v: &Vector<f32>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

/// 刚性仿射矩阵 → Rapier Isometry
///
/// 缩放分量会被丢弃（刚体只有旋转 + 平移）。
pub fn to_isometry(m: Mat4) -> Isometry<f32> {
    let (_, rotation, translation) = m.to_scale_rotation_translation();
    let rotation = rotation.normalize();
    Isometry::from_parts(
        Translation::new(translation.x, translation.y, translation.z),
        UnitQuaternion::from_quaternion(Quaternion::new(
            rotation.w, rotation.x, rotation.y, rotation.z,
        )),
    )
}

/// Rapier Isometry → 仿射矩阵
pub fn from_isometry(iso: &Isometry<f32>) -> Mat4 {
    let r = iso.rotation;
    let t = iso.translation.vector;
    Mat4::from_rotation_translation(
        Quat::from_xyzw(r.i, r.j, r.k, r.w),
        Vec3::new(t.x, t.y, t.z),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isometry_conversion_preserves_rigid_transform() {
        let m = Mat4::from_rotation_translation(
            Quat::from_euler(glam::EulerRot::ZYX, 0.4, -1.1, 0.25),
            Vec3::new(3.0, -2.0, 0.5),
        );
        let back = from_isometry(&to_isometry(m));
        assert!(back.abs_diff_eq(m, 1e-5));
    }

    #[test]
    fn test_isometry_drops_scale() {
        let m = Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            Quat::from_rotation_y(0.5),
            Vec3::new(1.0, 2.0, 3.0),
        );
        let back = from_isometry(&to_isometry(m));
        let expected = Mat4::from_rotation_translation(Quat::from_rotation_y(0.5), Vec3::new(1.0, 2.0, 3.0));
        assert!(back.abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn test_vector_conversion() {
        let v = Vec3::new(1.5, -2.0, 7.25);
        assert_eq!(from_vector(&to_vector(v)), v);
    }
}
