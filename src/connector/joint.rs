use super::{check_owner, Connector, ConnectorId};
use crate::{
    body::{BodyHandle, RigidBody},
    body_set::BodySet,
    collision::{Collision, CollisionSource, ContactGeometry},
    error::{Error, Result},
    math::{Unit, Vec2},
};

/// Tolerance on the length of a rotated joint normal.
const UNIT_TOL: f64 = 1e-10;

/// Direction a [`Joint`][self::Joint] constrains motion along.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize)
)]
pub enum JointNormal {
    /// Fixed direction in world coordinates.
    World(Unit<Vec2>),
    /// Direction in the second body's coordinates, rotating with it.
    /// Always refers to the second body, never the first.
    Body(Unit<Vec2>),
}

/// Rigid connection between attachment points on two bodies,
/// along a single direction.
///
/// A single joint acts like a sliding track: the attachment points are free to
/// move apart perpendicular to the normal. Two joints at the same points with
/// perpendicular normals pin the points together.
#[derive(Clone, Debug)]
pub struct Joint {
    id: ConnectorId,
    name: String,
    body1: BodyHandle,
    attach1: Vec2,
    body2: BodyHandle,
    attach2: Vec2,
    normal: JointNormal,
}

impl Joint {
    /// Create a joint and mark the two bodies as non-colliding.
    /// Attachment points are in body coordinates.
    pub(crate) fn new(
        id: ConnectorId,
        body1: BodyHandle,
        attach1: Vec2,
        body2: BodyHandle,
        attach2: Vec2,
        normal: JointNormal,
        bodies: &mut BodySet,
    ) -> Result<Self> {
        bodies.get(body1)?;
        bodies.get(body2)?;
        bodies.add_non_collide(body1, body2)?;
        Ok(Joint {
            id,
            name: format!("JOINT{}", id),
            body1,
            attach1,
            body2,
            attach2,
            normal,
        })
    }

    #[inline]
    pub fn attach1(&self) -> Vec2 {
        self.attach1
    }

    #[inline]
    pub fn attach2(&self) -> Vec2 {
        self.attach2
    }

    #[inline]
    pub fn normal_type(&self) -> JointNormal {
        self.normal
    }

    /// The joint normal in world coordinates.
    pub fn normal_world(&self, bodies: &BodySet) -> Result<Vec2> {
        let n = match self.normal {
            JointNormal::World(n) => n.into_inner(),
            JointNormal::Body(n) => bodies.get(self.body2)?.rotate_body_to_world(*n),
        };
        let len = n.mag();
        if (len - 1.0).abs() > UNIT_TOL {
            return Err(Error::NonUnitNormal(len * len));
        }
        Ok(n)
    }
}

impl Connector for Joint {
    fn id(&self) -> ConnectorId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn body1(&self) -> BodyHandle {
        self.body1
    }

    fn body2(&self) -> BodyHandle {
        self.body2
    }

    fn position1(&self, bodies: &BodySet) -> Result<Vec2> {
        Ok(bodies.get(self.body1)?.body_to_world(self.attach1))
    }

    fn position2(&self, bodies: &BodySet) -> Result<Vec2> {
        Ok(bodies.get(self.body2)?.body_to_world(self.attach2))
    }

    fn add_collision(
        &self,
        collisions: &mut Vec<Collision>,
        time: f64,
        bodies: &BodySet,
    ) -> Result<()> {
        let mut coll = Collision::new(
            self.body1,
            self.body2,
            true,
            CollisionSource::Connector(self.id),
            bodies,
        )?;
        self.update_collision(&mut coll, bodies)?;
        coll.set_detected_time(time, bodies)?;
        if coll.distance().abs() > 1e-12 {
            log::debug!("{} has gap {:e}", self.name, coll.distance());
        }
        collisions.insert(0, coll);
        Ok(())
    }

    fn update_collision(&self, coll: &mut Collision, bodies: &BodySet) -> Result<()> {
        check_owner(self, coll)?;
        let impact1 = self.position1(bodies)?;
        let impact2 = self.position2(bodies)?;
        let normal = self.normal_world(bodies)?;
        coll.set_geometry(ContactGeometry {
            impact1,
            impact2: Some(impact2),
            normal,
            distance: normal.dot(impact1 - impact2),
            normal_fixed: matches!(self.normal, JointNormal::World(_)),
            ..Default::default()
        });
        Ok(())
    }

    fn align(&self, bodies: &mut BodySet) -> Result<()> {
        let finite = |h: BodyHandle, bodies: &BodySet| -> Result<bool> {
            Ok(bodies.get(h)?.mass().is_finite())
        };
        if finite(self.body2, bodies)? {
            let target = self.position1(bodies)?;
            bodies.get_mut(self.body2)?.align_to(self.attach2, target)
        } else if finite(self.body1, bodies)? {
            let target = self.position2(bodies)?;
            bodies.get_mut(self.body1)?.align_to(self.attach1, target)
        } else {
            Ok(())
        }
    }
}
