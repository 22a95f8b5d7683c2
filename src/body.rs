//! Rigid bodies and the capabilities the collision core needs from them.

use crate::{
    body_set::BodyKey,
    error::{Error, Result},
    math::{self as m, Pose, PoseBuilder, Vec2},
    vertex::Polygon,
};

/// Offsets of a body's six state variables from its vars index.
pub mod vars {
    use super::RigidBody;
    use crate::error::{Error, Result};

    pub const X: usize = 0;
    pub const VX: usize = 1;
    pub const Y: usize = 2;
    pub const VY: usize = 3;
    pub const W: usize = 4;
    pub const VW: usize = 5;
    /// Number of variables each body occupies.
    pub const COUNT: usize = 6;

    /// Index of a body's first variable in a variables array of length `len`.
    pub fn offset(body: &dyn RigidBody, len: usize) -> Result<usize> {
        let index = body
            .vars_index()
            .ok_or_else(|| Error::NotInVarsList(body.name().to_string()))?;
        if index + COUNT > len {
            return Err(Error::VarsOutOfRange {
                body: body.name().to_string(),
                index,
                len,
            });
        }
        Ok(index)
    }
}

/// Velocity of an object.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Velocity {
    /// Linear velocity in metres per second.
    pub linear: Vec2,
    /// Angular velocity in radians per second.
    pub angular: f64,
}

impl Default for Velocity {
    fn default() -> Self {
        Velocity {
            linear: Vec2::zero(),
            angular: 0.0,
        }
    }
}

impl Velocity {
    pub fn new(linear: Vec2, angular: f64) -> Self {
        Velocity { linear, angular }
    }

    /// Get the linear velocity of a point offset from the center of mass.
    /// The offset is in world orientation.
    pub fn point_velocity(&self, offset: Vec2) -> Vec2 {
        self.linear + m::cross_scalar(self.angular, offset)
    }
}

/// Mass or moment of inertia of a body, which can be infinite.
///
/// This stores both a mass value and its inverse, because calculating inverse mass
/// is expensive and needed a lot in physics calculations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mass {
    Finite { mass: f64, inverse: f64 },
    Infinite,
}

impl From<f64> for Mass {
    #[inline]
    fn from(mass: f64) -> Self {
        if mass.is_finite() {
            Mass::Finite {
                mass,
                inverse: 1.0 / mass,
            }
        } else {
            Mass::Infinite
        }
    }
}

impl Mass {
    /// Get the inverse of the mass, which is zero if the mass is infinite.
    #[inline]
    pub fn inv(&self) -> f64 {
        match self {
            Mass::Finite { inverse, .. } => *inverse,
            Mass::Infinite => 0.0,
        }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        matches!(self, Mass::Finite { .. })
    }

    /// The mass value, infinity for immovable bodies.
    #[inline]
    pub fn value(&self) -> f64 {
        match self {
            Mass::Finite { mass, .. } => *mass,
            Mass::Infinite => f64::INFINITY,
        }
    }
}

/// Tolerances and material settings of a body used when judging collisions.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct BodyParams {
    /// Gap under which two bodies are considered in contact.
    pub distance_tol: f64,
    /// Normal speed under which a touching pair counts as resting contact.
    pub velocity_tol: f64,
    /// Fraction of the target gap within which a collision is close enough
    /// to handle. Must be in (0, 1].
    pub accuracy: f64,
    /// 1 is perfectly bouncy, 0 is not bouncy at all.
    pub elasticity: f64,
}

impl Default for BodyParams {
    fn default() -> Self {
        BodyParams {
            distance_tol: 0.01,
            velocity_tol: 0.5,
            accuracy: 0.6,
            elasticity: 1.0,
        }
    }
}

impl BodyParams {
    pub fn validate(&self) -> Result<()> {
        check_accuracy(self.accuracy)
    }
}

pub(crate) fn check_accuracy(accuracy: f64) -> Result<()> {
    // written so that NaN fails too
    if accuracy > 0.0 && accuracy <= 1.0 {
        Ok(())
    } else {
        Err(Error::InvalidAccuracy(accuracy))
    }
}

/// Identifies a participant in a collision or connector.
///
/// `Scrim` is the fixed world anchor, every other body lives in a
/// [`BodySet`][crate::BodySet].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyHandle {
    Scrim,
    Body(BodyKey),
}

impl From<BodyKey> for BodyHandle {
    fn from(key: BodyKey) -> Self {
        BodyHandle::Body(key)
    }
}

/// Everything the collision and connector code needs to know about a body.
///
/// Body coordinates have their origin at the center of mass.
pub trait RigidBody {
    fn name(&self) -> &str;
    fn mass(&self) -> Mass;
    fn moment_of_inertia(&self) -> Mass;
    fn pose(&self) -> Pose;
    fn velocity(&self) -> Velocity;

    /// World position of the center of mass.
    fn position(&self) -> Vec2 {
        self.pose().translation
    }

    /// Counterclockwise rotation from body orientation, in radians.
    fn angle(&self) -> f64 {
        m::Angle::from(self.pose().rotation).rad()
    }

    fn body_to_world(&self, p_body: Vec2) -> Vec2 {
        self.pose() * p_body
    }

    fn world_to_body(&self, p_world: Vec2) -> Vec2 {
        self.pose().inversed() * p_world
    }

    fn rotate_body_to_world(&self, v_body: Vec2) -> Vec2 {
        self.pose().rotation * v_body
    }

    fn rotate_world_to_body(&self, v_world: Vec2) -> Vec2 {
        self.pose().rotation.reversed() * v_world
    }

    /// World velocity of a point given in body coordinates.
    fn point_velocity(&self, p_body: Vec2) -> Vec2 {
        self.velocity()
            .point_velocity(self.rotate_body_to_world(p_body))
    }

    fn accuracy(&self) -> f64;
    fn distance_tol(&self) -> f64;
    fn velocity_tol(&self) -> f64;
    fn elasticity(&self) -> f64;

    /// # Errors
    /// Fails if the value is not in (0, 1].
    fn set_accuracy(&mut self, value: f64) -> Result<()>;
    fn set_distance_tol(&mut self, value: f64) -> Result<()>;
    fn set_velocity_tol(&mut self, value: f64) -> Result<()>;
    fn set_elasticity(&mut self, value: f64) -> Result<()>;

    /// Stop generating collisions between this body and the given ones.
    /// Callers are responsible for keeping the relation symmetric.
    fn add_non_collide(&mut self, bodies: &[BodyHandle]);
    fn remove_non_collide(&mut self, bodies: &[BodyHandle]);
    fn does_not_collide(&self, body: BodyHandle) -> bool;

    /// Index of this body's x position in the simulation variables,
    /// or `None` if the body is not part of them.
    fn vars_index(&self) -> Option<usize>;

    fn set_pose(&mut self, pose: Pose) -> Result<()>;
    fn set_velocity(&mut self, velocity: Velocity) -> Result<()>;

    /// Move the body, without rotating it, so that `p_body` lands on `p_world`.
    fn align_to(&mut self, p_body: Vec2, p_world: Vec2) -> Result<()> {
        let mut pose = self.pose();
        pose.translation = p_world - pose.rotation * p_body;
        self.set_pose(pose)
    }

    /// Remember the current pose so that the next collision check can see
    /// how far the body moved during the step.
    fn save_old_coords(&mut self);
    fn old_coords(&self) -> Option<Pose>;
    fn erase_old_coords(&mut self);
}

/// The geometric shape of a [`Body`][self::Body].
#[derive(Clone, Debug)]
pub enum Shape {
    Circle { radius: f64 },
    Polygon(Polygon),
}

impl Shape {
    /// Moment of inertia per unit mass about the center of mass.
    pub fn moment_of_inertia_coef(&self) -> f64 {
        // from https://en.wikipedia.org/wiki/List_of_moments_of_inertia
        match self {
            Shape::Circle { radius } => radius * radius / 2.0,
            Shape::Polygon(poly) => poly.moment_of_inertia_coef(),
        }
    }
}

/// A concrete rigid body: a circle or polygon with mass.
#[derive(Clone, Debug)]
pub struct Body {
    name: String,
    shape: Shape,
    pose: Pose,
    velocity: Velocity,
    mass: Mass,
    moment_of_inertia: Mass,
    params: BodyParams,
    non_collide: Vec<BodyHandle>,
    pub(crate) vars_index: Option<usize>,
    old_coords: Option<Pose>,
}

impl Body {
    /// Create a body with the given mass, computing its moment of inertia from the shape.
    pub fn new(name: impl Into<String>, shape: Shape, mass: f64) -> Self {
        let moment = Mass::from(shape.moment_of_inertia_coef() * mass);
        Body {
            name: name.into(),
            shape,
            pose: Pose::identity(),
            velocity: Velocity::default(),
            mass: Mass::from(mass),
            moment_of_inertia: moment,
            params: BodyParams::default(),
            non_collide: Vec::new(),
            vars_index: None,
            old_coords: None,
        }
    }

    pub fn new_circle(name: impl Into<String>, radius: f64, mass: f64) -> Self {
        Self::new(name, Shape::Circle { radius }, mass)
    }

    pub fn new_polygon(name: impl Into<String>, polygon: Polygon, mass: f64) -> Self {
        Self::new(name, Shape::Polygon(polygon), mass)
    }

    /// An immovable body with infinite mass and moment of inertia.
    pub fn new_fixed(name: impl Into<String>, shape: Shape) -> Self {
        Self::new(name, shape, f64::INFINITY)
    }

    pub fn with_pose(mut self, pose: impl Into<PoseBuilder>) -> Self {
        self.pose = pose.into().build();
        self
    }

    pub fn with_velocity(mut self, velocity: Velocity) -> Self {
        self.velocity = velocity;
        self
    }

    /// Replace the collision parameters.
    ///
    /// # Errors
    /// Fails if the accuracy is out of range.
    pub fn with_params(mut self, params: BodyParams) -> Result<Self> {
        params.validate()?;
        self.params = params;
        Ok(self)
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn params(&self) -> &BodyParams {
        &self.params
    }
}

impl RigidBody for Body {
    fn name(&self) -> &str {
        &self.name
    }

    fn mass(&self) -> Mass {
        self.mass
    }

    fn moment_of_inertia(&self) -> Mass {
        self.moment_of_inertia
    }

    fn pose(&self) -> Pose {
        self.pose
    }

    fn velocity(&self) -> Velocity {
        self.velocity
    }

    fn accuracy(&self) -> f64 {
        self.params.accuracy
    }

    fn distance_tol(&self) -> f64 {
        self.params.distance_tol
    }

    fn velocity_tol(&self) -> f64 {
        self.params.velocity_tol
    }

    fn elasticity(&self) -> f64 {
        self.params.elasticity
    }

    fn set_accuracy(&mut self, value: f64) -> Result<()> {
        check_accuracy(value)?;
        self.params.accuracy = value;
        Ok(())
    }

    fn set_distance_tol(&mut self, value: f64) -> Result<()> {
        self.params.distance_tol = value;
        Ok(())
    }

    fn set_velocity_tol(&mut self, value: f64) -> Result<()> {
        self.params.velocity_tol = value;
        Ok(())
    }

    fn set_elasticity(&mut self, value: f64) -> Result<()> {
        self.params.elasticity = value;
        Ok(())
    }

    fn add_non_collide(&mut self, bodies: &[BodyHandle]) {
        for b in bodies {
            if !self.non_collide.contains(b) {
                self.non_collide.push(*b);
            }
        }
    }

    fn remove_non_collide(&mut self, bodies: &[BodyHandle]) {
        self.non_collide.retain(|b| !bodies.contains(b));
    }

    fn does_not_collide(&self, body: BodyHandle) -> bool {
        self.non_collide.contains(&body)
    }

    fn vars_index(&self) -> Option<usize> {
        self.vars_index
    }

    fn set_pose(&mut self, pose: Pose) -> Result<()> {
        self.pose = pose;
        Ok(())
    }

    fn set_velocity(&mut self, velocity: Velocity) -> Result<()> {
        self.velocity = velocity;
        Ok(())
    }

    fn save_old_coords(&mut self) {
        self.old_coords = Some(self.pose);
    }

    fn old_coords(&self) -> Option<Pose> {
        self.old_coords
    }

    fn erase_old_coords(&mut self) {
        self.old_coords = None;
    }
}

/// The fixed world anchor that connectors attach to when they are not
/// attached to a second body.
///
/// It has infinite mass, sits at the origin and never collides with anything.
/// There is a single shared instance, [`SCRIM`][self::SCRIM].
#[derive(Clone, Copy, Debug)]
pub struct Scrim;

pub static SCRIM: Scrim = Scrim;

impl Scrim {
    fn immutable<T>(&self) -> Result<T> {
        Err(Error::ImmutableBody(self.name().to_string()))
    }
}

impl RigidBody for Scrim {
    fn name(&self) -> &str {
        "SCRIM"
    }

    fn mass(&self) -> Mass {
        Mass::Infinite
    }

    fn moment_of_inertia(&self) -> Mass {
        Mass::Infinite
    }

    fn pose(&self) -> Pose {
        Pose::identity()
    }

    fn velocity(&self) -> Velocity {
        Velocity::default()
    }

    // tolerances of zero defer to the other body of a collision
    fn accuracy(&self) -> f64 {
        0.0
    }

    fn distance_tol(&self) -> f64 {
        0.0
    }

    fn velocity_tol(&self) -> f64 {
        0.0
    }

    fn elasticity(&self) -> f64 {
        1.0
    }

    fn set_accuracy(&mut self, _value: f64) -> Result<()> {
        self.immutable()
    }

    fn set_distance_tol(&mut self, _value: f64) -> Result<()> {
        self.immutable()
    }

    fn set_velocity_tol(&mut self, _value: f64) -> Result<()> {
        self.immutable()
    }

    fn set_elasticity(&mut self, _value: f64) -> Result<()> {
        self.immutable()
    }

    fn add_non_collide(&mut self, _bodies: &[BodyHandle]) {}

    fn remove_non_collide(&mut self, _bodies: &[BodyHandle]) {}

    fn does_not_collide(&self, _body: BodyHandle) -> bool {
        true
    }

    fn vars_index(&self) -> Option<usize> {
        None
    }

    fn set_pose(&mut self, _pose: Pose) -> Result<()> {
        self.immutable()
    }

    fn set_velocity(&mut self, _velocity: Velocity) -> Result<()> {
        self.immutable()
    }

    fn save_old_coords(&mut self) {}

    fn old_coords(&self) -> Option<Pose> {
        None
    }

    fn erase_old_coords(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Angle, PoseBuilder};

    #[test]
    fn accuracy_must_be_in_range() {
        let mut b = Body::new_circle("ball", 0.5, 1.0);
        assert_eq!(b.set_accuracy(0.0), Err(Error::InvalidAccuracy(0.0)));
        assert_eq!(b.set_accuracy(1.5), Err(Error::InvalidAccuracy(1.5)));
        assert!(b.set_accuracy(f64::NAN).is_err());
        b.set_accuracy(1.0).unwrap();
        assert_eq!(b.accuracy(), 1.0);
    }

    #[cfg(feature = "serde-types")]
    #[test]
    fn params_from_ron() {
        let params: BodyParams =
            ron::from_str("(distance_tol: 0.02, accuracy: 0.3)").expect("valid ron");
        assert_eq!(params.distance_tol, 0.02);
        assert_eq!(params.accuracy, 0.3);
        // unspecified fields keep their defaults
        assert_eq!(params.velocity_tol, 0.5);
        assert_eq!(params.elasticity, 1.0);

        let bad: BodyParams = ron::from_str("(accuracy: 0.0)").expect("valid ron");
        assert!(Body::new_circle("b", 1.0, 1.0).with_params(bad).is_err());
    }

    #[test]
    fn transforms_and_alignment() {
        let mut b = Body::new_circle("ball", 1.0, 2.0).with_pose(
            PoseBuilder::new()
                .with_position([1.0, 2.0])
                .with_rotation(Angle::Deg(90.0)),
        );
        let w = b.body_to_world(Vec2::new(1.0, 0.0));
        assert!((w - Vec2::new(1.0, 3.0)).mag() < 1e-12);
        assert!((b.world_to_body(w) - Vec2::new(1.0, 0.0)).mag() < 1e-12);
        assert!((b.angle() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);

        b.align_to(Vec2::new(1.0, 0.0), Vec2::new(5.0, 5.0)).unwrap();
        assert!((b.body_to_world(Vec2::new(1.0, 0.0)) - Vec2::new(5.0, 5.0)).mag() < 1e-12);
        assert!((b.angle() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn align_replaces_translation() {
        let mut b = Body::new_circle("ball", 1.0, 1.0).with_pose([1.0, 2.0]);
        b.align_to(Vec2::new(1.0, 0.0), Vec2::new(5.0, 5.0)).unwrap();
        assert!((b.position() - Vec2::new(4.0, 5.0)).mag() < 1e-12);
        assert!((b.body_to_world(Vec2::new(1.0, 0.0)) - Vec2::new(5.0, 5.0)).mag() < 1e-12);
    }

    #[test]
    fn point_velocity_includes_rotation() {
        let b = Body::new_circle("ball", 1.0, 1.0)
            .with_velocity(Velocity::new(Vec2::new(1.0, 0.0), 2.0));
        // w x r with r = (0, 1) is (-2, 0)
        let v = b.point_velocity(Vec2::new(0.0, 1.0));
        assert!((v - Vec2::new(-1.0, 0.0)).mag() < 1e-12);
    }

    #[test]
    fn scrim_is_immutable() {
        let mut s = SCRIM;
        assert!(!s.mass().is_finite());
        assert!(s.set_pose(Pose::identity()).is_err());
        assert!(s.align_to(Vec2::zero(), Vec2::new(1.0, 0.0)).is_err());
        assert!(s.does_not_collide(BodyHandle::Scrim));
    }

    #[test]
    fn old_coords_roundtrip() {
        let mut b = Body::new_circle("ball", 1.0, 1.0);
        assert!(b.old_coords().is_none());
        b.save_old_coords();
        b.set_pose(PoseBuilder::new().with_position([3.0, 0.0]).build())
            .unwrap();
        assert_eq!(b.old_coords().map(|p| p.translation), Some(Vec2::zero()));
        b.erase_old_coords();
        assert!(b.old_coords().is_none());
    }

    #[test]
    fn fixed_body_has_infinite_mass() {
        let b = Body::new_fixed("wall", Shape::Circle { radius: 1.0 });
        assert_eq!(b.mass(), Mass::Infinite);
        assert_eq!(b.moment_of_inertia(), Mass::Infinite);
        assert_eq!(b.mass().inv(), 0.0);
    }
}
