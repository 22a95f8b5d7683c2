//! Bilateral connectors that keep points of bodies together.
//!
//! A connector does not apply forces itself. Every step it generates
//! joint [`Collision`][crate::Collision]s that the collision solver then
//! treats like any other contact, except that they can pull as well as push.

mod joint;
mod path_joint;

pub use joint::{Joint, JointNormal};
pub use path_joint::PathJoint;

use crate::{
    body::BodyHandle,
    body_set::BodySet,
    collision::{Collision, CollisionSource},
    error::{Error, Result},
    math::Vec2,
    path::Path,
};
use std::{fmt, rc::Rc};
use thunderdome as td;

/// Identifies the connector that generated a collision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectorId(u64);

impl fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Something that ties bodies together by generating joint collisions.
pub trait Connector {
    fn id(&self) -> ConnectorId;
    fn name(&self) -> &str;
    fn body1(&self) -> BodyHandle;
    fn body2(&self) -> BodyHandle;

    /// World position of the attachment point on the first body.
    fn position1(&self, bodies: &BodySet) -> Result<Vec2>;
    /// World position of the attachment point on the second body.
    fn position2(&self, bodies: &BodySet) -> Result<Vec2>;

    /// Create a joint collision for the current state, timestamp it and put it
    /// at the front of `collisions` so it is handled before natural collisions.
    fn add_collision(
        &self,
        collisions: &mut Vec<Collision>,
        time: f64,
        bodies: &BodySet,
    ) -> Result<()>;

    /// Recompute the geometry of a collision this connector created.
    ///
    /// # Errors
    /// Fails with [`Error::ConnectorMismatch`][crate::Error::ConnectorMismatch]
    /// if the collision belongs to another connector or other bodies.
    fn update_collision(&self, coll: &mut Collision, bodies: &BodySet) -> Result<()>;

    /// Move bodies so the attachment points coincide, without rotating them.
    fn align(&self, bodies: &mut BodySet) -> Result<()>;

    /// Current gap along the connector normal. Diagnostic, not used by the solver.
    fn normal_distance(&self, bodies: &BodySet) -> Result<f64> {
        let mut colls = Vec::with_capacity(1);
        self.add_collision(&mut colls, f64::NAN, bodies)?;
        colls
            .first()
            .map(|c| c.distance())
            .ok_or_else(|| Error::ConnectorMismatch(self.name().to_string()))
    }
}

/// Check that a collision was made by this connector between its bodies.
pub(crate) fn check_owner(conn: &dyn Connector, coll: &Collision) -> Result<()> {
    if coll.source() == CollisionSource::Connector(conn.id())
        && coll.primary_body() == conn.body1()
        && coll.normal_body() == conn.body2()
    {
        Ok(())
    } else {
        Err(Error::ConnectorMismatch(conn.name().to_string()))
    }
}

/// Key type to look up a connector stored in a [`ConnectorSet`][self::ConnectorSet].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectorKey(td::Index);

/// Owner of all the connectors in a simulation.
#[derive(Default)]
pub struct ConnectorSet {
    connectors: td::Arena<Box<dyn Connector>>,
    next_id: u64,
}

impl ConnectorSet {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> ConnectorId {
        self.next_id += 1;
        ConnectorId(self.next_id)
    }

    /// Connect two bodies with a [`Joint`][self::Joint].
    /// The bodies stop colliding with each other.
    pub fn add_joint(
        &mut self,
        bodies: &mut BodySet,
        body1: BodyHandle,
        attach1: Vec2,
        body2: BodyHandle,
        attach2: Vec2,
        normal: JointNormal,
    ) -> Result<ConnectorKey> {
        let id = self.next_id();
        let joint = Joint::new(id, body1, attach1, body2, attach2, normal, bodies)?;
        log::debug!("added {}", joint.name());
        Ok(self.insert(Box::new(joint)))
    }

    /// Connect a body to a path with a [`PathJoint`][self::PathJoint].
    pub fn add_path_joint(
        &mut self,
        bodies: &BodySet,
        body: BodyHandle,
        attach: Vec2,
        path: Rc<dyn Path>,
    ) -> Result<ConnectorKey> {
        let id = self.next_id();
        let joint = PathJoint::new(id, body, attach, path, bodies)?;
        log::debug!("added {}", joint.name());
        Ok(self.insert(Box::new(joint)))
    }

    /// Insert a connector created elsewhere.
    pub fn insert(&mut self, conn: Box<dyn Connector>) -> ConnectorKey {
        ConnectorKey(self.connectors.insert(conn))
    }

    #[inline]
    pub fn get(&self, key: ConnectorKey) -> Option<&dyn Connector> {
        self.connectors.get(key.0).map(|c| c.as_ref())
    }

    /// Find a connector by the id stored in its collisions.
    pub fn find(&self, id: ConnectorId) -> Option<&dyn Connector> {
        self.connectors
            .iter()
            .map(|(_, c)| c.as_ref())
            .find(|c| c.id() == id)
    }

    /// Remove a connector, returning it if it still existed.
    /// The bodies it connected stay marked as non-colliding.
    pub fn remove(&mut self, key: ConnectorKey) -> Option<Box<dyn Connector>> {
        self.connectors.remove(key.0)
    }

    /// Let every connector add its joint collision, in insertion order.
    pub fn add_collisions(
        &self,
        collisions: &mut Vec<Collision>,
        time: f64,
        bodies: &BodySet,
    ) -> Result<()> {
        for (_, conn) in self.connectors.iter() {
            conn.add_collision(collisions, time, bodies)?;
        }
        Ok(())
    }

    /// Refresh the geometry of a collision generated by one of these connectors.
    pub fn update_collision(&self, coll: &mut Collision, bodies: &BodySet) -> Result<()> {
        let CollisionSource::Connector(id) = coll.source() else {
            return Err(Error::ConnectorMismatch(format!("{:?}", coll.source())));
        };
        let conn = self
            .find(id)
            .ok_or_else(|| Error::ConnectorMismatch(format!("connector {} not found", id)))?;
        conn.update_collision(coll, bodies)
    }

    pub fn align_all(&self, bodies: &mut BodySet) -> Result<()> {
        for (_, conn) in self.connectors.iter() {
            conn.align(bodies)?;
        }
        Ok(())
    }

    pub fn iter(&self) -> impl '_ + Iterator<Item = (ConnectorKey, &dyn Connector)> {
        self.connectors
            .iter()
            .map(|(k, c)| (ConnectorKey(k), c.as_ref()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}

