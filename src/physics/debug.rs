//! 调试用 Body
//!
//! 与 PlainBody 行为一致，额外输出碰撞形状线框和每帧各阶段耗时（trace 级日志）。

use std::cell::RefCell;
use std::f32::consts::{PI, TAU};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use glam::{Mat4, Vec3};

use crate::error::Result;
use crate::model::{Model, RigidDesc, RigidShape};
use crate::skeleton::Armature;

use super::body::{Body, PlainBody};
use super::config::PhysicsConfig;

/// 每个整圆的线段数
const CIRCLE_SEGMENTS: usize = 16;

pub struct DebugBody {
    inner: PlainBody,
    lines: Vec<Vec3>,
    frame: u64,
}

impl DebugBody {
    pub fn new() -> Self {
        Self::from_plain(PlainBody::new())
    }

    pub fn with_config(config: PhysicsConfig) -> Self {
        Self::from_plain(PlainBody::with_config(config))
    }

    fn from_plain(inner: PlainBody) -> Self {
        Self {
            inner,
            lines: Vec::new(),
            frame: 0,
        }
    }

    pub fn inner(&self) -> &PlainBody {
        &self.inner
    }
}

impl Default for DebugBody {
    fn default() -> Self {
        Self::new()
    }
}

impl Body for DebugBody {
    fn load_model(&mut self, model: Arc<Model>) -> Result<()> {
        self.frame = 0;
        self.inner.load_model(model)
    }

    fn bind_armature(&mut self, armature: &Rc<RefCell<dyn Armature>>) {
        self.inner.bind_armature(armature);
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.lines.clear();
    }

    fn reset_pose(&mut self) {
        log::trace!("物理姿态重置 (帧 {})", self.frame);
        self.inner.reset_pose();
    }

    fn apply_bone(&mut self) {
        self.inner.apply_bone();
    }

    fn apply_global(&mut self, m: Mat4) {
        self.inner.apply_global(m);
    }

    fn step_simulation(&mut self, tick: f32) {
        self.inner.step_simulation(tick);
    }

    fn update_bone(&mut self) {
        self.inner.update_bone();
    }

    fn update(&mut self, tick: f32) {
        let start = Instant::now();
        self.inner.apply_bone();
        let pushed = Instant::now();
        self.inner.step_simulation(tick);
        let stepped = Instant::now();
        self.inner.update_bone();

        log::trace!(
            "物理帧 {} tick={:.4}: applyBone {:?}, step {:?}, updateBone {:?}",
            self.frame,
            tick,
            pushed - start,
            stepped - pushed,
            stepped.elapsed()
        );
        self.frame += 1;
    }

    fn debug_lines(&mut self) -> &[Vec3] {
        self.lines.clear();
        for binding in self.inner.bindings() {
            shape_wireframe(binding.base(), binding.world_transform(), &mut self.lines);
        }
        &self.lines
    }

    fn is_loaded(&self) -> bool {
        self.inner.is_loaded()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn rigid_transform(&self, index: usize) -> Option<Mat4> {
        self.inner.rigid_transform(index)
    }
}

/// 生成刚体形状线框（世界空间，两点一组）
///
/// 尺寸换算与求解器中的碰撞形状一致。
pub fn shape_wireframe(desc: &RigidDesc, transform: Mat4, lines: &mut Vec<Vec3>) {
    match desc.shape {
        RigidShape::Box => {
            let h = desc.size / 2.0;
            let corners = [
                Vec3::new(-h.x, -h.y, -h.z),
                Vec3::new(h.x, -h.y, -h.z),
                Vec3::new(h.x, h.y, -h.z),
                Vec3::new(-h.x, h.y, -h.z),
                Vec3::new(-h.x, -h.y, h.z),
                Vec3::new(h.x, -h.y, h.z),
                Vec3::new(h.x, h.y, h.z),
                Vec3::new(-h.x, h.y, h.z),
            ];
            let edges = [
                (0, 1), (1, 2), (2, 3), (3, 0),
                (4, 5), (5, 6), (6, 7), (7, 4),
                (0, 4), (1, 5), (2, 6), (3, 7),
            ];
            for (a, b) in edges {
                lines.push(transform.transform_point3(corners[a]));
                lines.push(transform.transform_point3(corners[b]));
            }
        }
        RigidShape::Sphere => {
            let r = desc.size.x / 2.0;
            push_arc(lines, transform, Vec3::ZERO, r, Vec3::X, Vec3::Y, (0.0, TAU));
            push_arc(lines, transform, Vec3::ZERO, r, Vec3::Y, Vec3::Z, (0.0, TAU));
            push_arc(lines, transform, Vec3::ZERO, r, Vec3::Z, Vec3::X, (0.0, TAU));
        }
        RigidShape::Capsule => {
            let r = desc.size.x;
            let top = Vec3::new(0.0, desc.size.y / 2.0, 0.0);
            let bottom = -top;

            push_arc(lines, transform, top, r, Vec3::Z, Vec3::X, (0.0, TAU));
            push_arc(lines, transform, bottom, r, Vec3::Z, Vec3::X, (0.0, TAU));
            for side in [Vec3::X, -Vec3::X, Vec3::Z, -Vec3::Z] {
                lines.push(transform.transform_point3(top + side * r));
                lines.push(transform.transform_point3(bottom + side * r));
            }

            // 两端半球
            for axis in [Vec3::X, Vec3::Z] {
                push_arc(lines, transform, top, r, axis, Vec3::Y, (0.0, PI));
                push_arc(lines, transform, bottom, r, axis, Vec3::Y, (PI, TAU));
            }
        }
    }
}

fn push_arc(
    lines: &mut Vec<Vec3>,
    transform: Mat4,
    center: Vec3,
    radius: f32,
    axis_a: Vec3,
    axis_b: Vec3,
    (start, end): (f32, f32),
) {
    let segments = ((end - start) / TAU * CIRCLE_SEGMENTS as f32).round().max(1.0) as usize;
    let point = |angle: f32| {
        let local = center + (axis_a * angle.cos() + axis_b * angle.sin()) * radius;
        transform.transform_point3(local)
    };
    let step = (end - start) / segments as f32;
    for i in 0..segments {
        lines.push(point(start + step * i as f32));
        lines.push(point(start + step * (i + 1) as f32));
    }
}
