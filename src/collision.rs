//! Collisions and contacts between pairs of bodies.
//!
//! A [`Collision`][self::Collision] describes one candidate interaction:
//! which bodies are involved, where they touch, the gap between them along
//! the normal (negative means interpenetration) and how fast that gap is
//! changing. Collisions are created fresh on every detection pass, either by
//! geometry checks or by [`Connector`][crate::Connector]s, and are thrown
//! away once the step's collision handling is done.
//!
//! Distance zones used by the classification methods, from far to near:
//!
//! ```text
//! 0. out of range
//!    ---- distance_tol
//! 1. not yet in the target accuracy zone
//!    ---- target_gap + accuracy
//! 2. in the target accuracy zone
//!    ---- target_gap - accuracy
//! 3. past the target accuracy zone but not penetrating
//!    ---- zero distance
//! 4. penetrating (illegal)
//! ```
//!
//! - `contact`: zones 1, 2, 3 with small normal velocity
//! - `is_touching`: zones 1, 2, 3 with any velocity
//! - `close_enough(false)`: zone 2; `close_enough(true)`: zones 2 and 3
//! - `is_colliding`: zone 3 when approaching fast, zone 4 always
//! - `illegal_state`: zone 4

pub mod detect;

use crate::{
    body::{vars, BodyHandle, RigidBody},
    body_set::BodySet,
    connector::ConnectorId,
    error::{Error, Result},
    math::{self as m, Vec2},
};
use std::{cell::Cell, fmt};

/// Tolerance on the length of the normal vector.
const UNIT_NORMAL_TOL: f64 = 1e-10;
/// Approach speed needed before a detected collision gets a time estimate.
const MIN_ESTIMATE_VELOCITY: f64 = 0.001;
/// Smallest time interval and acceleration the quadratic estimate works with.
const ESTIMATE_EPSILON: f64 = 1e-12;

/// Where a collision came from, which determines how its geometry is refreshed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollisionSource {
    /// Generated by the connector with this id.
    Connector(ConnectorId),
    /// Found by [`detect::circle_circle`][self::detect::circle_circle].
    CircleCircle,
    /// Created by geometry code outside this crate, which is responsible
    /// for refreshing it with [`Collision::set_geometry`][Collision::set_geometry].
    External,
}

/// The geometric part of a collision, written by whoever detected it.
///
/// This is the only data outside code may set directly;
/// everything else on a [`Collision`][self::Collision] is derived.
#[derive(Clone, Copy, Debug)]
pub struct ContactGeometry {
    /// Point of impact on the primary body, in world coordinates.
    pub impact1: Vec2,
    /// Point of impact on the normal body, when it differs from `impact1`.
    pub impact2: Option<Vec2>,
    /// Unit normal pointing from the normal body towards the primary body.
    pub normal: Vec2,
    /// Time derivative of the normal, for curved normals of unknown radius.
    pub normal_dt: Option<Vec2>,
    /// Gap between the bodies along the normal, negative when penetrating.
    pub distance: f64,
    /// Signed radius of curvature at the primary body's impact point.
    pub radius1: Option<f64>,
    /// Signed radius of curvature at the normal body's impact point.
    pub radius2: Option<f64>,
    /// The primary body's edge at the impact is curved.
    pub ball_object: bool,
    /// The normal body's edge at the impact is curved.
    pub ball_normal: bool,
    /// The normal does not rotate with either body.
    pub normal_fixed: bool,
    /// Center of the primary body's curved edge, in world coordinates.
    pub u1_center: Option<Vec2>,
    /// Center of the normal body's curved edge, in world coordinates.
    pub u2_center: Option<Vec2>,
}

impl Default for ContactGeometry {
    fn default() -> Self {
        ContactGeometry {
            impact1: Vec2::zero(),
            impact2: None,
            normal: Vec2::unit_y(),
            normal_dt: None,
            distance: f64::NAN,
            radius1: None,
            radius2: None,
            ball_object: false,
            ball_normal: false,
            normal_fixed: false,
            u1_center: None,
            u2_center: None,
        }
    }
}

/// Snapshot taken when a collision is first detected.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub time: f64,
    pub distance: f64,
    pub velocity: f64,
}

/// One collision or contact candidate between two bodies.
#[derive(Clone, Debug)]
pub struct Collision {
    primary: BodyHandle,
    normal_body: BodyHandle,
    joint: bool,
    source: CollisionSource,
    geom: ContactGeometry,
    distance_tol: f64,
    target_gap: f64,
    accuracy: f64,
    velocity_tol: f64,
    elasticity: f64,
    must_handle: bool,
    normal_velocity: Cell<Option<f64>>,
    detection: Option<Detection>,
    estimate: Option<f64>,
    update_time: Option<f64>,
    /// Impulse applied by the collision solver, if any.
    pub impulse: Option<f64>,
    /// Contact force applied by the contact solver, if any.
    pub force: Option<f64>,
}

impl Collision {
    /// Create a collision between two bodies, taking tolerances from both.
    ///
    /// The geometry starts out invalid and must be filled in with
    /// [`set_geometry`][Self::set_geometry] before the collision is used.
    ///
    /// # Errors
    /// Fails if either body is missing or if the larger of the two accuracy
    /// fractions is not in (0, 1].
    pub fn new(
        primary: BodyHandle,
        normal_body: BodyHandle,
        joint: bool,
        source: CollisionSource,
        bodies: &BodySet,
    ) -> Result<Self> {
        let b1 = bodies.get(primary)?;
        let b2 = bodies.get(normal_body)?;
        let distance_tol = b1.distance_tol().max(b2.distance_tol());
        let acc = b1.accuracy().max(b2.accuracy());
        crate::body::check_accuracy(acc)?;
        Ok(Collision {
            primary,
            normal_body,
            joint,
            source,
            geom: ContactGeometry::default(),
            distance_tol,
            target_gap: if joint { 0.0 } else { distance_tol / 2.0 },
            accuracy: acc * distance_tol / 2.0,
            velocity_tol: b1.velocity_tol().max(b2.velocity_tol()),
            elasticity: b1.elasticity().min(b2.elasticity()),
            must_handle: false,
            normal_velocity: Cell::new(None),
            detection: None,
            estimate: None,
            update_time: None,
            impulse: None,
            force: None,
        })
    }

    //
    // accessors
    //

    #[inline]
    pub fn primary_body(&self) -> BodyHandle {
        self.primary
    }

    #[inline]
    pub fn normal_body(&self) -> BodyHandle {
        self.normal_body
    }

    pub fn has_body(&self, body: BodyHandle) -> bool {
        self.primary == body || self.normal_body == body
    }

    /// Whether this is a bilateral constraint that can both push and pull.
    #[inline]
    pub fn bilateral(&self) -> bool {
        self.joint
    }

    #[inline]
    pub fn source(&self) -> CollisionSource {
        self.source
    }

    #[inline]
    pub fn geometry(&self) -> &ContactGeometry {
        &self.geom
    }

    /// Replace the geometry, e.g. after the bodies have moved.
    /// Invalidates the cached normal velocity.
    pub fn set_geometry(&mut self, geom: ContactGeometry) {
        self.geom = geom;
        self.invalidate_normal_velocity();
    }

    #[inline]
    pub fn distance(&self) -> f64 {
        self.geom.distance
    }

    #[inline]
    pub fn normal(&self) -> Vec2 {
        self.geom.normal
    }

    /// The normal rotated a quarter turn counterclockwise.
    pub fn perp_normal(&self) -> Vec2 {
        m::left_normal(self.geom.normal)
    }

    #[inline]
    pub fn impact1(&self) -> Vec2 {
        self.geom.impact1
    }

    #[inline]
    pub fn impact2(&self) -> Option<Vec2> {
        self.geom.impact2
    }

    #[inline]
    pub fn normal_dt(&self) -> Option<Vec2> {
        self.geom.normal_dt
    }

    #[inline]
    pub fn elasticity(&self) -> f64 {
        self.elasticity
    }

    #[inline]
    pub fn distance_tol(&self) -> f64 {
        self.distance_tol
    }

    #[inline]
    pub fn velocity_tol(&self) -> f64 {
        self.velocity_tol
    }

    /// Gap the collision handling aims to leave between the bodies.
    #[inline]
    pub fn target_gap(&self) -> f64 {
        self.target_gap
    }

    /// How close to the target gap is close enough, as a distance.
    #[inline]
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    #[inline]
    pub fn detection(&self) -> Option<Detection> {
        self.detection
    }

    #[inline]
    pub fn detected_time(&self) -> Option<f64> {
        self.detection.map(|d| d.time)
    }

    /// Estimated time at which the distance equals the target gap.
    #[inline]
    pub fn estimated_time(&self) -> Option<f64> {
        self.estimate
    }

    #[inline]
    pub fn update_time(&self) -> Option<f64> {
        self.update_time
    }

    /// Marks collisions that were penetrating before a backup in time.
    /// They must be handled even if they no longer look like collisions.
    #[inline]
    pub fn needs_handling(&self) -> bool {
        self.must_handle
    }

    #[inline]
    pub fn set_needs_handling(&mut self, needs_handling: bool) {
        self.must_handle = needs_handling;
    }

    /// Forget the cached normal velocity. Must be called whenever the
    /// velocity of either body changes.
    #[inline]
    pub fn invalidate_normal_velocity(&self) {
        self.normal_velocity.set(None);
    }

    //
    // kinematics
    //

    /// Vector from the primary body's center of mass to the impact point.
    pub fn r1(&self, bodies: &BodySet) -> Result<Vec2> {
        Ok(self.geom.impact1 - bodies.get(self.primary)?.position())
    }

    /// Vector from the normal body's center of mass to its impact point.
    pub fn r2(&self, bodies: &BodySet) -> Result<Vec2> {
        let impact = self.geom.impact2.unwrap_or(self.geom.impact1);
        Ok(impact - bodies.get(self.normal_body)?.position())
    }

    /// Like [`r1`][Self::r1] but to the center of a curved edge when there is one,
    /// since rotating a circle about its own center does not change the gap.
    pub fn u1(&self, bodies: &BodySet) -> Result<Vec2> {
        match self.geom.u1_center {
            Some(c) => Ok(c - bodies.get(self.primary)?.position()),
            None => self.r1(bodies),
        }
    }

    pub fn u2(&self, bodies: &BodySet) -> Result<Vec2> {
        match self.geom.u2_center {
            Some(c) => Ok(c - bodies.get(self.normal_body)?.position()),
            None => self.r2(bodies),
        }
    }

    /// Velocity of the primary body's contact point relative to the normal body's.
    /// Bodies with infinite mass do not move and contribute nothing.
    pub fn relative_velocity(&self, bodies: &BodySet) -> Result<Vec2> {
        let b1 = bodies.get(self.primary)?;
        let b2 = bodies.get(self.normal_body)?;
        let mut v = Vec2::zero();
        if b1.mass().is_finite() {
            let u1 = self.u1(bodies)?;
            if !m::is_finite(u1) {
                return Err(Error::Inconsistent(format!("non-finite U1 vector {:?}", u1)));
            }
            v += b1.velocity().point_velocity(u1);
        }
        if b2.mass().is_finite() {
            let u2 = self.u2(bodies)?;
            if !m::is_finite(u2) {
                return Err(Error::Inconsistent(format!("non-finite U2 vector {:?}", u2)));
            }
            v -= b2.velocity().point_velocity(u2);
        }
        Ok(v)
    }

    /// Relative velocity along the normal. Negative means the bodies are approaching.
    ///
    /// Cached until the geometry changes or
    /// [`invalidate_normal_velocity`][Self::invalidate_normal_velocity] is called.
    pub fn normal_velocity(&self, bodies: &BodySet) -> Result<f64> {
        if let Some(nv) = self.normal_velocity.get() {
            return Ok(nv);
        }
        let nv = self.geom.normal.dot(self.relative_velocity(bodies)?);
        if nv.is_nan() {
            return Err(Error::Inconsistent("normal velocity is NaN".to_string()));
        }
        self.normal_velocity.set(Some(nv));
        Ok(nv)
    }

    /// Relative velocity perpendicular to the normal.
    pub fn lateral_velocity(&self, bodies: &BodySet) -> Result<f64> {
        Ok(self.perp_normal().dot(self.relative_velocity(bodies)?))
    }

    /// Relative acceleration of the two contact points, given the time derivative
    /// of the simulation variables. Includes the centripetal term.
    pub fn acceleration(&self, change: &[f64], bodies: &BodySet) -> Result<Vec2> {
        fn point_accel(body: &dyn RigidBody, u: Vec2, change: &[f64]) -> Result<Vec2> {
            let idx = vars::offset(body, change.len())?;
            let w = body.velocity().angular;
            let alpha = change[idx + vars::VW];
            Ok(Vec2::new(
                change[idx + vars::VX] - alpha * u.y - w * w * u.x,
                change[idx + vars::VY] + alpha * u.x - w * w * u.y,
            ))
        }

        let b1 = bodies.get(self.primary)?;
        let b2 = bodies.get(self.normal_body)?;
        let mut acc = Vec2::zero();
        if b1.mass().is_finite() {
            acc += point_accel(b1, self.u1(bodies)?, change)?;
        }
        if b2.mass().is_finite() {
            acc -= point_accel(b2, self.u2(bodies)?, change)?;
        }
        Ok(acc)
    }

    //
    // classification
    //

    /// Touching with small normal velocity, a candidate for contact forces.
    /// Joints are always contacts.
    pub fn contact(&self, bodies: &BodySet) -> Result<bool> {
        if self.joint {
            return Ok(true);
        }
        Ok(self.normal_velocity(bodies)?.abs() < self.velocity_tol
            && self.geom.distance > 0.0
            && self.geom.distance < self.distance_tol)
    }

    pub fn is_touching(&self) -> bool {
        self.joint || self.geom.distance < self.distance_tol
    }

    /// Whether the distance is near enough to the target gap to handle the collision.
    ///
    /// With `allow_tiny` anything between zero and the upper end of the
    /// accuracy band is accepted, for when backing up in time cannot reach
    /// the ideal gap.
    pub fn close_enough(&self, allow_tiny: bool, bodies: &BodySet) -> Result<bool> {
        if self.contact(bodies)? {
            return Ok(true);
        }
        let d = self.geom.distance;
        let upper = self.target_gap + self.accuracy;
        if allow_tiny {
            if d > 0.0 && d < self.target_gap - self.accuracy {
                log::debug!("tiny distance {:e} accepted: {}", d, self);
            }
            Ok(d > 0.0 && d < upper)
        } else {
            Ok(d > self.target_gap - self.accuracy && d < upper)
        }
    }

    /// Penetrating, or approaching fast and already past the target gap.
    pub fn is_colliding(&self, bodies: &BodySet) -> Result<bool> {
        if self.joint {
            return Ok(false);
        }
        if self.geom.distance < 0.0 {
            return Ok(true);
        }
        Ok(self.normal_velocity(bodies)? < -self.velocity_tol
            && self.geom.distance < self.target_gap - self.accuracy)
    }

    /// Bodies are interpenetrating, which the simulation must never be left in.
    pub fn illegal_state(&self) -> bool {
        !self.joint && self.geom.distance < 0.0
    }

    /// Zero when the gap is exactly the target gap.
    pub fn distance_to_half_gap(&self) -> f64 {
        self.geom.distance - self.target_gap
    }

    //
    // detection and estimation
    //

    /// Record the time of detection along with the current distance and velocity,
    /// and make a linear estimate of when the target gap was (or will be) reached.
    ///
    /// # Errors
    /// Fails if the detection time was already set, or if a non-joint collision
    /// has a non-finite distance or normal velocity. A failed call leaves the
    /// detection unset.
    pub fn set_detected_time(&mut self, time: f64, bodies: &BodySet) -> Result<()> {
        if let Some(det) = self.detection {
            return Err(Error::DetectedTimeAlreadySet(det.time));
        }
        let nv = self.normal_velocity(bodies)?;
        if !self.joint && (!self.geom.distance.is_finite() || !nv.is_finite()) {
            return Err(Error::Inconsistent(format!(
                "distance {} and normal velocity {} must be finite",
                self.geom.distance, nv
            )));
        }
        self.detection = Some(Detection {
            time,
            distance: self.geom.distance,
            velocity: nv,
        });
        self.estimate = None;
        if !self.joint && nv < -MIN_ESTIMATE_VELOCITY {
            self.estimate = Some(time + (self.target_gap - self.geom.distance) / nv);
        }
        Ok(())
    }

    /// Check the invariants every collision must satisfy after detection.
    pub fn check_consistent(&self, bodies: &BodySet) -> Result<()> {
        fn require(cond: bool, what: &str) -> Result<()> {
            if cond {
                Ok(())
            } else {
                Err(Error::Inconsistent(what.to_string()))
            }
        }

        require(self.accuracy.is_finite(), "accuracy is not finite")?;
        let det = self
            .detection
            .ok_or_else(|| Error::Inconsistent("detected time not set".to_string()))?;
        require(det.time.is_finite(), "detected time is not finite")?;
        require(det.distance.is_finite(), "detected distance is not finite")?;
        require(det.velocity.is_finite(), "detected velocity is not finite")?;
        require(self.geom.distance.is_finite(), "distance is not finite")?;
        bodies.get(self.primary)?;
        bodies.get(self.normal_body)?;
        require(self.normal_velocity(bodies)?.is_finite(), "normal velocity is not finite")?;
        require(m::is_finite(self.geom.normal), "normal is not finite")?;
        require(m::is_finite(self.geom.impact1), "impact point is not finite")?;
        let len = self.geom.normal.mag();
        if (len - 1.0).abs() >= UNIT_NORMAL_TOL {
            return Err(Error::NonUnitNormal(len * len));
        }
        if self.geom.ball_normal {
            require(
                self.geom.radius2.is_some() || self.geom.normal_dt.is_some(),
                "curved normal needs a radius or a normal derivative",
            )?;
        }
        Ok(())
    }

    /// Refresh derived data after the bodies have moved, typically after backing
    /// up in time from the post-collision state where this collision was found.
    /// The geometry must already have been refreshed for the current body state.
    pub fn update_collision(&mut self, time: f64, bodies: &BodySet) -> Result<()> {
        if !self.geom.distance.is_finite() {
            return Err(Error::Inconsistent(format!(
                "distance is {}",
                self.geom.distance
            )));
        }
        self.invalidate_normal_velocity();
        self.check_consistent(bodies)?;
        self.update_time = Some(time);
        if (self.must_handle || !self.contact(bodies)?) && self.normal_velocity(bodies)? < 0.0 {
            self.update_estimated_time(time, bodies)?;
        } else {
            self.estimate = None;
        }
        Ok(())
    }

    /// Refine the estimate of when the target gap occurs, using the current
    /// state at `time` together with the state at detection.
    ///
    /// Assuming constant acceleration between the two samples, the distance
    /// `t` after the current time is `d1 + v1 t + a t^2 / 2`. The root of
    /// `d(t) = target_gap` that lies strictly between the two sample times
    /// (the earlier one if both do) becomes the new estimate. If the interval
    /// is empty, the acceleration is negligible or no root is in range,
    /// the previous estimate is kept.
    pub fn update_estimated_time(&mut self, time: f64, bodies: &BodySet) -> Result<()> {
        let Some(det) = self.detection else {
            return Ok(());
        };
        let t1 = time;
        let t2 = det.time;
        let d1 = self.geom.distance;
        let v1 = self.normal_velocity(bodies)?;
        let v2 = det.velocity;
        let h = t2 - t1;
        if !(h > ESTIMATE_EPSILON) {
            log::trace!("cannot update estimate, t1={} t2={}", t1, t2);
            return Ok(());
        }
        let a = (v2 - v1) / h;
        if !(a.abs() >= ESTIMATE_EPSILON) {
            return Ok(());
        }
        let disc = v1 * v1 - 2.0 * a * (d1 - self.target_gap);
        if !(disc >= 0.0) {
            return Ok(());
        }
        let sq = disc.sqrt();
        let e1 = t1 + (-v1 + sq) / a;
        let e2 = t1 + (-v1 - sq) / a;
        let in_range = |e: f64| e > t1 && e < t2;
        let mut best = None;
        if in_range(e1) {
            best = Some(e1);
        }
        if in_range(e2) && best.map_or(true, |b| e2 < b) {
            best = Some(e2);
        }
        log::trace!(
            "update estimate {:?} -> {:?} (e1={} e2={})",
            self.estimate,
            best,
            e1,
            e2
        );
        if best.is_some() {
            self.estimate = best;
        }
        Ok(())
    }
}

impl fmt::Display for Collision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Collision{{source: {:?}, distance: {:.5e}, normal_velocity: {:?}, \
             impact1: ({}, {}), normal: ({}, {}), joint: {}, target_gap: {:.5e}, \
             accuracy: {:.7}, must_handle: {}, detected: {:?}, estimate: {:?}}}",
            self.source,
            self.geom.distance,
            self.normal_velocity.get(),
            self.geom.impact1.x,
            self.geom.impact1.y,
            self.geom.normal.x,
            self.geom.normal.y,
            self.joint,
            self.target_gap,
            self.accuracy,
            self.must_handle,
            self.detection,
            self.estimate,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{Body, BodyParams, Velocity};
    use rand::{Rng, SeedableRng};

    fn ball(params: BodyParams) -> Body {
        Body::new_circle("ball", 0.5, 1.0).with_params(params).unwrap()
    }

    /// A body falling onto the fixed anchor with the normal pointing up,
    /// so the normal velocity is the body's vertical velocity.
    fn falling(set: &mut BodySet, vy: f64) -> BodyHandle {
        let b = ball(BodyParams::default()).with_velocity(Velocity::new(Vec2::new(0.0, vy), 0.0));
        set.insert(b).into()
    }

    fn geometry(distance: f64) -> ContactGeometry {
        ContactGeometry {
            distance,
            normal: Vec2::unit_y(),
            ..Default::default()
        }
    }

    fn set_vy(set: &mut BodySet, h: BodyHandle, vy: f64) {
        set.get_mut(h)
            .unwrap()
            .set_velocity(Velocity::new(Vec2::new(0.0, vy), 0.0))
            .unwrap();
    }

    #[test]
    fn tolerances_combine_both_bodies() {
        let mut set = BodySet::new();
        let a = set.insert(ball(BodyParams {
            distance_tol: 0.02,
            velocity_tol: 0.1,
            accuracy: 0.3,
            elasticity: 0.8,
        }));
        let b = set.insert(ball(BodyParams {
            distance_tol: 0.01,
            velocity_tol: 0.4,
            accuracy: 0.5,
            elasticity: 0.2,
        }));
        let c = Collision::new(a.into(), b.into(), false, CollisionSource::External, &set).unwrap();
        assert_eq!(c.distance_tol(), 0.02);
        assert_eq!(c.target_gap(), 0.01);
        assert!((c.accuracy() - 0.5 * 0.01).abs() < 1e-15);
        assert_eq!(c.velocity_tol(), 0.4);
        assert_eq!(c.elasticity(), 0.2);

        let j = Collision::new(a.into(), b.into(), true, CollisionSource::External, &set).unwrap();
        assert_eq!(j.target_gap(), 0.0);
    }

    #[test]
    fn invalid_accuracy_fails_construction() {
        let mut set = BodySet::new();
        let a = set.insert(Body::new_circle("ball", 0.5, 1.0));
        // the anchor reports zero accuracy so the body's value wins
        assert!(Collision::new(a.into(), BodyHandle::Scrim, false, CollisionSource::External, &set).is_ok());
        assert_eq!(
            Collision::new(BodyHandle::Scrim, BodyHandle::Scrim, false, CollisionSource::External, &set)
                .err(),
            Some(Error::InvalidAccuracy(0.0))
        );
    }

    #[test]
    fn close_enough_boundaries() {
        let mut set = BodySet::new();
        // approaching fast so that it is never a resting contact
        let a = falling(&mut set, -1.0);
        let mut c = Collision::new(a, BodyHandle::Scrim, false, CollisionSource::External, &set).unwrap();
        let gap = c.target_gap();
        let acc = c.accuracy();

        c.set_geometry(geometry(gap));
        assert!(c.close_enough(false, &set).unwrap());
        c.set_geometry(geometry(gap + acc));
        assert!(!c.close_enough(false, &set).unwrap());
        c.set_geometry(geometry(gap - acc));
        assert!(!c.close_enough(false, &set).unwrap());
        // below the band but not penetrating is fine when tiny distances are allowed
        assert!(c.close_enough(true, &set).unwrap());
        c.set_geometry(geometry(0.0));
        assert!(!c.close_enough(true, &set).unwrap());
    }

    #[test]
    fn classification_zones() {
        let mut set = BodySet::new();
        let a = falling(&mut set, 0.0);
        let mut c = Collision::new(a, BodyHandle::Scrim, false, CollisionSource::External, &set).unwrap();
        let tol = c.distance_tol();

        // slow and within tolerance: contact
        c.set_geometry(geometry(tol / 10.0));
        assert!(c.contact(&set).unwrap());
        assert!(c.is_touching());
        assert!(c.close_enough(false, &set).unwrap());
        assert!(!c.is_colliding(&set).unwrap());

        // fast approach inside the target gap: colliding
        set_vy(&mut set, a, -1.0);
        c.invalidate_normal_velocity();
        assert!(!c.contact(&set).unwrap());
        assert!(c.is_colliding(&set).unwrap());
        assert!(!c.illegal_state());

        // penetration is always colliding and illegal
        set_vy(&mut set, a, 1.0);
        c.set_geometry(geometry(-0.001));
        assert!(c.is_colliding(&set).unwrap());
        assert!(c.illegal_state());
        assert!((c.distance_to_half_gap() - (-0.001 - c.target_gap())).abs() < 1e-15);

        // far away: nothing
        c.set_geometry(geometry(2.0 * tol));
        assert!(!c.is_touching());
        assert!(!c.contact(&set).unwrap());
    }

    #[test]
    fn joints_are_always_contacts() {
        let mut set = BodySet::new();
        let a = falling(&mut set, -5.0);
        let mut c = Collision::new(a, BodyHandle::Scrim, true, CollisionSource::External, &set).unwrap();
        c.set_geometry(geometry(-1.0));
        assert!(c.contact(&set).unwrap());
        assert!(c.is_touching());
        assert!(!c.is_colliding(&set).unwrap());
        assert!(!c.illegal_state());
        assert!(c.bilateral());
    }

    #[test]
    fn detected_time_is_write_once() {
        let mut set = BodySet::new();
        let a = falling(&mut set, -2.0);
        let mut c = Collision::new(a, BodyHandle::Scrim, false, CollisionSource::External, &set).unwrap();
        c.set_geometry(geometry(0.01));
        c.set_detected_time(1.0, &set).unwrap();
        assert_eq!(c.detected_time(), Some(1.0));
        assert_eq!(
            c.set_detected_time(2.0, &set),
            Err(Error::DetectedTimeAlreadySet(1.0))
        );
        assert_eq!(c.detected_time(), Some(1.0));
    }

    #[test]
    fn failed_detection_can_be_retried() {
        let mut set = BodySet::new();
        let a = falling(&mut set, -2.0);
        let mut c = Collision::new(a, BodyHandle::Scrim, false, CollisionSource::External, &set).unwrap();
        // default geometry has no distance yet
        assert!(matches!(
            c.set_detected_time(1.0, &set),
            Err(Error::Inconsistent(_))
        ));
        assert_eq!(c.detected_time(), None);

        c.set_geometry(geometry(0.02));
        c.set_detected_time(1.0, &set).unwrap();
        assert_eq!(c.detected_time(), Some(1.0));
    }

    #[test]
    fn linear_estimate_needs_approach() {
        let mut set = BodySet::new();
        let a = falling(&mut set, -2.0);
        let mut c = Collision::new(a, BodyHandle::Scrim, false, CollisionSource::External, &set).unwrap();
        c.set_geometry(geometry(0.015));
        c.set_detected_time(3.0, &set).unwrap();
        let expected = 3.0 + (c.target_gap() - 0.015) / -2.0;
        assert!((c.estimated_time().unwrap() - expected).abs() < 1e-12);

        set_vy(&mut set, a, -0.0005);
        let mut slow = Collision::new(a, BodyHandle::Scrim, false, CollisionSource::External, &set).unwrap();
        slow.set_geometry(geometry(0.015));
        slow.set_detected_time(3.0, &set).unwrap();
        assert_eq!(slow.estimated_time(), None);
    }

    #[test]
    fn quadratic_estimate_recovers_root() {
        let mut set = BodySet::new();
        // d(t) = 0.02 - 0.1 t - t^2, so the acceleration is -2
        let (t1, t2) = (0.0, 0.1);
        let (d1, v1, a) = (0.02, -0.1, -2.0);
        let d2 = d1 + v1 * t2 + 0.5 * a * t2 * t2;
        let v2 = v1 + a * t2;

        let body = falling(&mut set, v2);
        let mut c = Collision::new(body, BodyHandle::Scrim, false, CollisionSource::External, &set).unwrap();
        c.set_geometry(geometry(d2));
        c.set_detected_time(t2, &set).unwrap();

        // back up in time to t1
        set_vy(&mut set, body, v1);
        c.set_geometry(geometry(d1));
        c.update_collision(t1, &set).unwrap();

        // solve d1 + v1 t + a t^2 / 2 = target_gap
        let gap = c.target_gap();
        let expected = (-v1 - (v1 * v1 - 2.0 * a * (d1 - gap)).sqrt()) / a;
        assert!(expected > t1 && expected < t2);
        let est = c.estimated_time().unwrap();
        assert!((est - expected).abs() < 1e-9, "{} vs {}", est, expected);
        assert_eq!(c.update_time(), Some(t1));
    }

    #[test]
    fn quadratic_estimate_prefers_earlier_root() {
        let mut set = BodySet::new();
        // d(t) = 0.02 - t + 10 t^2 reaches the target gap 0.005 twice in (0, 0.1)
        let body = falling(&mut set, 1.0);
        let mut c = Collision::new(body, BodyHandle::Scrim, false, CollisionSource::External, &set).unwrap();
        assert_eq!(c.target_gap(), 0.005);
        c.set_geometry(geometry(0.02));
        c.set_detected_time(0.1, &set).unwrap();
        // separating at detection, so no linear estimate
        assert_eq!(c.estimated_time(), None);

        set_vy(&mut set, body, -1.0);
        c.set_geometry(geometry(0.02));
        c.update_collision(0.0, &set).unwrap();
        let earlier = (1.0 - 0.4_f64.sqrt()) / 20.0;
        let est = c.estimated_time().unwrap();
        assert!((est - earlier).abs() < 1e-9, "{} vs {}", est, earlier);
    }

    #[test]
    fn estimate_kept_when_not_backing_up() {
        let mut set = BodySet::new();
        let body = falling(&mut set, -2.0);
        let mut c = Collision::new(body, BodyHandle::Scrim, false, CollisionSource::External, &set).unwrap();
        c.set_geometry(geometry(0.02));
        c.set_detected_time(1.0, &set).unwrap();
        let linear = c.estimated_time().unwrap();
        assert!((linear - 1.0075).abs() < 1e-12);

        // later than detection, then at the same time: no interval to work with
        set_vy(&mut set, body, -1.0);
        c.set_geometry(geometry(0.01));
        c.update_collision(1.5, &set).unwrap();
        assert_eq!(c.estimated_time(), Some(linear));
        c.update_collision(1.0, &set).unwrap();
        assert_eq!(c.estimated_time(), Some(linear));
    }

    #[test]
    fn estimate_kept_without_acceleration() {
        // two unit circles closing at 2 m/s with a target gap of 0.05
        let params = BodyParams {
            distance_tol: 0.1,
            ..Default::default()
        };
        let mut set = BodySet::new();
        let a = set.insert(
            ball(params)
                .with_pose([-0.53, 0.0])
                .with_velocity(Velocity::new(Vec2::new(1.0, 0.0), 0.0)),
        );
        let b = set.insert(
            ball(params)
                .with_pose([0.53, 0.0])
                .with_velocity(Velocity::new(Vec2::new(-1.0, 0.0), 0.0)),
        );
        let mut c = detect::circle_circle(&set, a, b).unwrap().expect("in range");
        assert_eq!(c.target_gap(), 0.05);
        assert!((c.distance() - 0.06).abs() < 1e-12);
        assert!((c.normal_velocity(&set).unwrap() + 2.0).abs() < 1e-12);

        let t_detect = 1.0;
        c.set_detected_time(t_detect, &set).unwrap();
        let linear = c.estimated_time().unwrap();
        assert!((linear - (t_detect + 0.005)).abs() < 1e-12);

        // second sample: penetrating but still closing at the same speed
        set.get_body_mut(a)
            .unwrap()
            .set_pose(crate::math::PoseBuilder::from([-0.495, 0.0]).build())
            .unwrap();
        set.get_body_mut(b)
            .unwrap()
            .set_pose(crate::math::PoseBuilder::from([0.495, 0.0]).build())
            .unwrap();
        detect::refresh_circle_circle(&mut c, &set).unwrap();
        assert!((c.distance() + 0.01).abs() < 1e-12);
        c.update_collision(t_detect - 0.02, &set).unwrap();
        assert_eq!(c.estimated_time(), Some(linear));
    }

    #[test]
    fn consistency_violations() {
        let mut set = BodySet::new();
        let a = falling(&mut set, -1.0);
        let mut c = Collision::new(a, BodyHandle::Scrim, false, CollisionSource::External, &set).unwrap();
        // geometry never set
        assert!(c.update_collision(0.0, &set).is_err());

        c.set_geometry(geometry(0.1));
        // not detected yet
        assert!(matches!(
            c.update_collision(0.0, &set),
            Err(Error::Inconsistent(_))
        ));
        c.set_detected_time(0.0, &set).unwrap();
        c.update_collision(0.0, &set).unwrap();

        c.set_geometry(ContactGeometry {
            normal: Vec2::new(0.0, 1.001),
            ..geometry(0.1)
        });
        assert!(matches!(
            c.update_collision(0.0, &set),
            Err(Error::NonUnitNormal(_))
        ));

        c.set_geometry(ContactGeometry {
            ball_normal: true,
            ..geometry(0.1)
        });
        assert!(c.update_collision(0.0, &set).is_err());
        c.set_geometry(ContactGeometry {
            ball_normal: true,
            radius2: Some(2.0),
            ..geometry(0.1)
        });
        c.update_collision(0.0, &set).unwrap();
    }

    #[test]
    fn normal_stays_unit_after_update() {
        let mut set = BodySet::new();
        let a = falling(&mut set, -1.0);
        let mut c = Collision::new(a, BodyHandle::Scrim, false, CollisionSource::External, &set).unwrap();
        c.set_geometry(ContactGeometry {
            normal: Vec2::new(3.0, 4.0).normalized(),
            ..geometry(0.2)
        });
        c.set_detected_time(0.0, &set).unwrap();
        c.update_collision(0.0, &set).unwrap();
        assert!((c.normal().mag() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn relative_velocity_is_antisymmetric() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let mut set = BodySet::new();
            let mut rand_vec = || Vec2::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0));
            let (pa, pb, va, vb, p, q) = (
                rand_vec(),
                rand_vec(),
                rand_vec(),
                rand_vec(),
                rand_vec(),
                rand_vec(),
            );
            let (wa, wb) = (rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0));
            let a: BodyHandle = set
                .insert(
                    Body::new_circle("a", 1.0, 1.0)
                        .with_pose(pa)
                        .with_velocity(Velocity::new(va, wa)),
                )
                .into();
            let b: BodyHandle = set
                .insert(
                    Body::new_circle("b", 1.0, 1.0)
                        .with_pose(pb)
                        .with_velocity(Velocity::new(vb, wb)),
                )
                .into();
            let normal = Vec2::new(0.6, 0.8);

            let mut ab = Collision::new(a, b, false, CollisionSource::External, &set).unwrap();
            ab.set_geometry(ContactGeometry {
                impact1: p,
                impact2: Some(q),
                normal,
                distance: 0.0,
                ..Default::default()
            });
            let mut ba = Collision::new(b, a, false, CollisionSource::External, &set).unwrap();
            ba.set_geometry(ContactGeometry {
                impact1: q,
                impact2: Some(p),
                normal: -normal,
                distance: 0.0,
                ..Default::default()
            });
            let v_ab = ab.relative_velocity(&set).unwrap();
            let v_ba = ba.relative_velocity(&set).unwrap();
            assert!((v_ab + v_ba).mag() < 1e-12);
            assert!((ab.normal_velocity(&set).unwrap() - ba.normal_velocity(&set).unwrap()).abs() < 1e-12);
        }
    }

    #[test]
    fn fixed_normal_body_contributes_nothing() {
        let mut set = BodySet::new();
        let a: BodyHandle = set
            .insert(
                Body::new_circle("a", 1.0, 1.0)
                    .with_velocity(Velocity::new(Vec2::new(1.0, -2.0), 0.5)),
            )
            .into();
        let wall: BodyHandle = set
            .insert(
                Body::new_fixed("wall", crate::body::Shape::Circle { radius: 1.0 })
                    .with_pose([0.0, -3.0])
                    .with_velocity(Velocity::new(Vec2::new(10.0, 10.0), 10.0)),
            )
            .into();
        let mut c = Collision::new(a, wall, false, CollisionSource::External, &set).unwrap();
        c.set_geometry(ContactGeometry {
            impact1: Vec2::new(0.0, -1.0),
            ..geometry(0.0)
        });
        // only the primary body's point velocity: (1, -2) + 0.5 x (0, -1) = (1.5, -2)
        let v = c.relative_velocity(&set).unwrap();
        assert!((v - Vec2::new(1.5, -2.0)).mag() < 1e-12);
        // perpendicular to the upward normal is the negative x axis
        assert!((c.lateral_velocity(&set).unwrap() + 1.5).abs() < 1e-12);
    }

    #[test]
    fn acceleration_from_change_rates() {
        let mut set = BodySet::new();
        let a = set.insert(
            Body::new_circle("a", 1.0, 1.0).with_velocity(Velocity::new(Vec2::zero(), 2.0)),
        );
        let n = set.assign_vars_indices();
        let mut change = vec![0.0; n];
        change[vars::VX] = 1.0;
        change[vars::VY] = -3.0;
        change[vars::VW] = 0.5;
        let mut c = Collision::new(a.into(), BodyHandle::Scrim, false, CollisionSource::External, &set).unwrap();
        c.set_geometry(ContactGeometry {
            impact1: Vec2::new(1.0, 0.0),
            ..geometry(0.0)
        });
        // (1 - 0.5*0 - 4*1, -3 + 0.5*1 - 4*0)
        let acc = c.acceleration(&change, &set).unwrap();
        assert!((acc - Vec2::new(-3.0, -2.5)).mag() < 1e-12);
        assert!(matches!(
            c.acceleration(&change[..4], &set),
            Err(Error::VarsOutOfRange { index: 0, len: 4, .. })
        ));

        // an untracked body cannot be looked up
        let b = set.insert(Body::new_circle("b", 1.0, 1.0));
        let mut c = Collision::new(b.into(), BodyHandle::Scrim, false, CollisionSource::External, &set).unwrap();
        c.set_geometry(geometry(0.0));
        assert!(matches!(
            c.acceleration(&change, &set),
            Err(Error::NotInVarsList(_))
        ));
    }
}
