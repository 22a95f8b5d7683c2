//! Curves that a [`PathJoint`][crate::PathJoint] can bind a body to.
//!
//! A [`ParametricPath`][self::ParametricPath] is any curve given as a
//! function of some parameter `t`. Before use it is converted into a
//! [`NumericalPath`][self::NumericalPath], a table of samples parameterised
//! by arc length `p`, which is what nearest-point searches and slope
//! queries run against.

use crate::math::{self as m, Vec2};
use std::f64::consts::TAU;

/// Newton iterations used when refining a nearest point.
const NEWTON_ITERS: usize = 12;
/// Number of samples searched on each side of the previous point in a local search.
const LOCAL_WINDOW: usize = 20;

/// A location on a path along with the local frame there.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathPoint {
    /// Arc length from the start of the path.
    pub p: f64,
    pub position: Vec2,
    /// Unit tangent in the direction of increasing `p`.
    pub slope: Vec2,
    /// Unit normal, the tangent rotated a quarter turn counterclockwise.
    pub normal: Vec2,
    /// Derivative of the normal with respect to `p`.
    pub normal_dp: Vec2,
    /// Signed radius of curvature, infinite where the path is straight.
    pub radius: f64,
    /// Index of the sample segment `p` falls into.
    pub idx: usize,
}

impl Default for PathPoint {
    fn default() -> Self {
        PathPoint {
            p: 0.0,
            position: Vec2::zero(),
            slope: Vec2::unit_x(),
            normal: Vec2::unit_y(),
            normal_dp: Vec2::zero(),
            radius: f64::INFINITY,
            idx: 0,
        }
    }
}

impl PathPoint {
    pub fn new(p: f64) -> Self {
        PathPoint {
            p,
            ..Default::default()
        }
    }

    /// Distance from a point to the line through this path point along its normal.
    ///
    /// This is zero when this is the nearest point on the path to `point`,
    /// unless the nearest point is clamped to an end of an open path.
    pub fn distance_to_normal_line(&self, point: Vec2) -> f64 {
        (point - self.position).dot(self.slope).abs()
    }
}

/// Nearest-point and slope queries on a path.
pub trait Path {
    /// Search the whole path for the point nearest to `point`.
    fn find_nearest_global(&self, point: Vec2) -> PathPoint;

    /// Search near `ppt` for the point nearest to `point`, updating `ppt` in place.
    /// Cheaper than a global search when the point moves only a little.
    fn find_nearest_local(&self, point: Vec2, ppt: &mut PathPoint);

    /// Fill in position, slope and normal data for the `p` value of `ppt`.
    fn map_p_to_slope(&self, ppt: &mut PathPoint);

    fn is_closed_loop(&self) -> bool;
}

/// A curve given as a function of a parameter.
pub trait ParametricPath {
    fn position(&self, t: f64) -> Vec2;
    fn start_t(&self) -> f64;
    fn finish_t(&self) -> f64;
    /// Whether the curve returns to its starting point at `finish_t`.
    fn is_closed_loop(&self) -> bool;
}

/// A full circle traversed counterclockwise starting from the positive x axis.
#[derive(Clone, Copy, Debug)]
pub struct CirclePath {
    pub center: Vec2,
    pub radius: f64,
}

impl ParametricPath for CirclePath {
    fn position(&self, t: f64) -> Vec2 {
        self.center + self.radius * Vec2::new(t.cos(), t.sin())
    }

    fn start_t(&self) -> f64 {
        0.0
    }

    fn finish_t(&self) -> f64 {
        TAU
    }

    fn is_closed_loop(&self) -> bool {
        true
    }
}

/// Part of a circle, counterclockwise from `start_angle` to `end_angle` (radians).
#[derive(Clone, Copy, Debug)]
pub struct ArcPath {
    pub center: Vec2,
    pub radius: f64,
    pub start_angle: f64,
    pub end_angle: f64,
}

impl ParametricPath for ArcPath {
    fn position(&self, t: f64) -> Vec2 {
        self.center + self.radius * Vec2::new(t.cos(), t.sin())
    }

    fn start_t(&self) -> f64 {
        self.start_angle
    }

    fn finish_t(&self) -> f64 {
        self.end_angle
    }

    fn is_closed_loop(&self) -> bool {
        false
    }
}

/// A straight line segment.
#[derive(Clone, Copy, Debug)]
pub struct FlatPath {
    pub start: Vec2,
    pub end: Vec2,
}

impl ParametricPath for FlatPath {
    fn position(&self, t: f64) -> Vec2 {
        self.start + t * (self.end - self.start)
    }

    fn start_t(&self) -> f64 {
        0.0
    }

    fn finish_t(&self) -> f64 {
        1.0
    }

    fn is_closed_loop(&self) -> bool {
        false
    }
}

/// A path sampled into a table parameterised by arc length.
///
/// Between samples the position is a cubic Hermite interpolation using the
/// sampled unit tangents, so position and slope stay consistent with each
/// other and curvature is available from the second derivative.
#[derive(Clone, Debug)]
pub struct NumericalPath {
    p: Vec<f64>,
    pos: Vec<Vec2>,
    tangent: Vec<Vec2>,
    closed: bool,
}

impl NumericalPath {
    pub const DEFAULT_SAMPLES: usize = 1000;

    pub fn new(path: &impl ParametricPath) -> Self {
        Self::with_samples(path, Self::DEFAULT_SAMPLES)
    }

    /// Sample a parametric path at `samples` evenly spaced parameter values.
    pub fn with_samples(path: &impl ParametricPath, samples: usize) -> Self {
        let samples = samples.max(2);
        let (t0, t1) = (path.start_t(), path.finish_t());
        let dt = (t1 - t0) / (samples - 1) as f64;
        let closed = path.is_closed_loop();

        let mut pos: Vec<Vec2> = (0..samples).map(|i| path.position(t0 + i as f64 * dt)).collect();
        if closed {
            // make the seam exact
            pos[samples - 1] = pos[0];
        }

        let mut p = Vec::with_capacity(samples);
        let mut len = 0.0;
        p.push(0.0);
        for w in pos.windows(2) {
            len += (w[1] - w[0]).mag();
            p.push(len);
        }

        // central differences of the parametric curve, second order one-sided at open ends
        let h = dt * 1e-3;
        let tangent = (0..samples)
            .map(|i| {
                let t = t0 + i as f64 * dt;
                let d = if closed || (i > 0 && i < samples - 1) {
                    path.position(t + h) - path.position(t - h)
                } else if i == 0 {
                    4.0 * path.position(t + h) - 3.0 * path.position(t) - path.position(t + 2.0 * h)
                } else {
                    3.0 * path.position(t) - 4.0 * path.position(t - h) + path.position(t - 2.0 * h)
                };
                d.normalized()
            })
            .collect();

        NumericalPath {
            p,
            pos,
            tangent,
            closed,
        }
    }

    #[inline]
    pub fn start_p(&self) -> f64 {
        self.p[0]
    }

    #[inline]
    pub fn finish_p(&self) -> f64 {
        self.p[self.p.len() - 1]
    }

    /// Total arc length.
    #[inline]
    pub fn length(&self) -> f64 {
        self.finish_p() - self.start_p()
    }

    /// Position at arc length `p`.
    pub fn position(&self, p: f64) -> Vec2 {
        let mut ppt = PathPoint::new(p);
        self.map_p_to_slope(&mut ppt);
        ppt.position
    }

    /// Bring `p` into the valid range: wrapped for closed loops, clamped otherwise.
    fn normalize_p(&self, p: f64) -> f64 {
        if self.closed {
            let len = self.length();
            self.start_p() + (p - self.start_p()).rem_euclid(len)
        } else {
            p.clamp(self.start_p(), self.finish_p())
        }
    }

    fn segment(&self, p: f64) -> usize {
        match self.p.binary_search_by(|x| x.total_cmp(&p)) {
            Ok(i) => i.min(self.p.len() - 2),
            Err(i) => i.saturating_sub(1).min(self.p.len() - 2),
        }
    }

    /// Position and its first two derivatives with respect to `p` in segment `i`.
    fn hermite(&self, i: usize, p: f64) -> (Vec2, Vec2, Vec2) {
        let h = self.p[i + 1] - self.p[i];
        let s = (p - self.p[i]) / h;
        let (p0, p1) = (self.pos[i], self.pos[i + 1]);
        let (m0, m1) = (self.tangent[i] * h, self.tangent[i + 1] * h);
        let (s2, s3) = (s * s, s * s * s);

        let pos = (2.0 * s3 - 3.0 * s2 + 1.0) * p0
            + (s3 - 2.0 * s2 + s) * m0
            + (-2.0 * s3 + 3.0 * s2) * p1
            + (s3 - s2) * m1;
        let d1 = (6.0 * s2 - 6.0 * s) * p0
            + (3.0 * s2 - 4.0 * s + 1.0) * m0
            + (-6.0 * s2 + 6.0 * s) * p1
            + (3.0 * s2 - 2.0 * s) * m1;
        let d2 = (12.0 * s - 6.0) * p0
            + (6.0 * s - 4.0) * m0
            + (-12.0 * s + 6.0) * p1
            + (6.0 * s - 2.0) * m1;
        (pos, d1 / h, d2 / (h * h))
    }

    fn nearest_sample(&self, point: Vec2, range: impl Iterator<Item = usize>) -> usize {
        let mut best = (0, f64::INFINITY);
        for i in range {
            let d = (self.pos[i] - point).mag_sq();
            if d < best.1 {
                best = (i, d);
            }
        }
        best.0
    }

    /// Newton iteration on `(position(p) - point) . slope(p) = 0`.
    fn refine(&self, point: Vec2, ppt: &mut PathPoint) {
        for _ in 0..NEWTON_ITERS {
            self.map_p_to_slope(ppt);
            let offset = ppt.position - point;
            let f = offset.dot(ppt.slope);
            // derivative of f: |slope|^2 plus offset . dslope/dp, where dslope/dp = normal / radius
            let curv = if ppt.radius.is_finite() { 1.0 / ppt.radius } else { 0.0 };
            let df = 1.0 + curv * offset.dot(ppt.normal);
            let step = if df > 1e-6 { f / df } else { f };
            let next = self.normalize_p(ppt.p - step);
            let moved = (next - ppt.p).abs();
            ppt.p = next;
            if moved < 1e-13 {
                break;
            }
        }
        self.map_p_to_slope(ppt);
    }
}

impl Path for NumericalPath {
    fn find_nearest_global(&self, point: Vec2) -> PathPoint {
        let i = self.nearest_sample(point, 0..self.p.len());
        let mut ppt = PathPoint::new(self.p[i]);
        self.refine(point, &mut ppt);
        ppt
    }

    fn find_nearest_local(&self, point: Vec2, ppt: &mut PathPoint) {
        let n = self.p.len();
        let center = self.segment(self.normalize_p(ppt.p));
        let i = if self.closed {
            // the last sample duplicates the first, so wrap over n - 1 samples
            let m = (n - 1) as isize;
            let range = (0..=2 * LOCAL_WINDOW as isize)
                .map(|k| (center as isize + k - LOCAL_WINDOW as isize).rem_euclid(m) as usize);
            self.nearest_sample(point, range)
        } else {
            let lo = center.saturating_sub(LOCAL_WINDOW);
            let hi = (center + LOCAL_WINDOW + 1).min(n);
            self.nearest_sample(point, lo..hi)
        };
        ppt.p = self.p[i];
        self.refine(point, ppt);
    }

    fn map_p_to_slope(&self, ppt: &mut PathPoint) {
        let p = self.normalize_p(ppt.p);
        let i = self.segment(p);
        let (pos, d1, d2) = self.hermite(i, p);
        let speed = d1.mag();
        let slope = d1 / speed;
        // signed curvature of a curve whose parameter is not exactly arc length
        let curv = (d1.x * d2.y - d1.y * d2.x) / (speed * speed * speed);
        ppt.p = p;
        ppt.idx = i;
        ppt.position = pos;
        ppt.slope = slope;
        ppt.normal = m::left_normal(slope);
        ppt.normal_dp = -curv * slope;
        ppt.radius = if curv.abs() > 1e-12 { 1.0 / curv } else { f64::INFINITY };
    }

    fn is_closed_loop(&self) -> bool {
        self.closed
    }
}
