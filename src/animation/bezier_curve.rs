//! 贝塞尔曲线
//!
//! VMD 关键帧的非线性插值。曲线固定端点 (0,0)、(1,1)，
//! 控制点来自关键帧参数，按 X 预采样后分段线性查找。

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use glam::Vec2;

/// 曲线 trait
pub trait Curve {
    fn value(&self, v: f32) -> f32;
}

/// 三次贝塞尔曲线
#[derive(Debug, Clone, PartialEq)]
pub struct BezierCurve {
    /// 预计算的曲线采样点（按 X 升序）
    points: Vec<Vec2>,
    interval: u32,
}

impl BezierCurve {
    const P0: Vec2 = Vec2::ZERO;
    const P1: Vec2 = Vec2::ONE;

    /// `c0`/`c1` 为归一化到 [0, 1] 的控制点，`interval` 为采样段数
    pub fn new(c0: Vec2, c1: Vec2, interval: u32) -> Self {
        let interval = interval.max(1);
        let mut points: Vec<Vec2> = (0..=interval)
            .map(|i| {
                let t = i as f32 / interval as f32;
                let it = 1.0 - t;
                Self::P0 * it.powi(3)
                    + c0 * 3.0 * it.powi(2) * t
                    + c1 * 3.0 * it * t.powi(2)
                    + Self::P1 * t.powi(3)
            })
            .collect();
        points.sort_unstable_by(|a, b| a.x.total_cmp(&b.x));

        Self { points, interval }
    }

    /// 从 VMD 参数 `[x1, y1, x2, y2]`（[0, 127]）创建
    pub fn from_parameters(parameters: [u8; 4], interval: u32) -> Self {
        let (c0, c1) = control_points([parameters[0], parameters[1]], [parameters[2], parameters[3]]);
        Self::new(c0, c1, interval)
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }
}

fn control_points(c0: [u8; 2], c1: [u8; 2]) -> (Vec2, Vec2) {
    (
        Vec2::new(c0[0] as f32 / 127.0, c0[1] as f32 / 127.0),
        Vec2::new(c1[0] as f32 / 127.0, c1[1] as f32 / 127.0),
    )
}

impl Curve for BezierCurve {
    fn value(&self, v: f32) -> f32 {
        let v = v.clamp(0.0, 1.0);
        let next = self.points.partition_point(|p| p.x <= v).clamp(1, self.points.len() - 1);
        let (a, b) = (self.points[next - 1], self.points[next]);
        if a.x == b.x {
            a.y
        } else {
            a.y + (v - a.x) * (b.y - a.y) / (b.x - a.x)
        }
    }
}

/// 贝塞尔曲线工厂 trait
pub trait BezierCurveFactory {
    fn get_or_new(&self, c0: [u8; 2], c1: [u8; 2], interval: u32) -> Arc<BezierCurve>;
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
struct CurveCacheKey {
    c0: [u8; 2],
    c1: [u8; 2],
}

/// 贝塞尔曲线缓存
///
/// 同一组控制点只构建一次；缓存曲线精度不足时临时构建新曲线。
#[derive(Debug, Default)]
pub struct BezierCurveCache(RwLock<HashMap<CurveCacheKey, Arc<BezierCurve>>>);

impl BezierCurveCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BezierCurveFactory for BezierCurveCache {
    fn get_or_new(&self, c0: [u8; 2], c1: [u8; 2], interval: u32) -> Arc<BezierCurve> {
        let key = CurveCacheKey { c0, c1 };
        let build = || {
            let (p0, p1) = control_points(c0, c1);
            Arc::new(BezierCurve::new(p0, p1, interval))
        };

        match self.0.read() {
            Ok(map) => {
                if let Some(curve) = map.get(&key) {
                    return if curve.interval < interval {
                        build()
                    } else {
                        curve.clone()
                    };
                }
            }
            Err(_) => return build(),
        }

        match self.0.write() {
            Ok(mut map) => map.entry(key).or_insert_with(build).clone(),
            Err(_) => build(),
        }
    }
}

impl Clone for BezierCurveCache {
    /// 克隆得到空缓存
    fn clone(&self) -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_curve() {
        let curve = BezierCurve::new(Vec2::new(0.25, 0.25), Vec2::new(0.75, 0.75), 100);
        assert!(curve.value(0.0).abs() < 0.01);
        assert!((curve.value(0.5) - 0.5).abs() < 0.01);
        assert!((curve.value(1.0) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_ease_in_curve() {
        let curve = BezierCurve::from_parameters([127, 0, 127, 127], 100);
        assert!(curve.value(0.25) < 0.25);
        assert!(curve.value(0.5) < 0.5);
        // 输入越界时截断到端点
        assert!((curve.value(2.0) - 1.0).abs() < 1e-6);
        assert!(curve.value(-1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cache() {
        let cache = BezierCurveCache::new();
        let curve1 = cache.get_or_new([32, 32], [96, 96], 100);
        let curve2 = cache.get_or_new([32, 32], [96, 96], 100);
        assert!(Arc::ptr_eq(&curve1, &curve2));
        assert_eq!(cache.len(), 1);

        // 请求更高精度时不复用缓存
        let finer = cache.get_or_new([32, 32], [96, 96], 200);
        assert!(!Arc::ptr_eq(&curve1, &finer));
        assert_eq!(finer.interval(), 200);
    }
}
