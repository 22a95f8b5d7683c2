use crate::{
    body::{vars, Body, BodyHandle, RigidBody, SCRIM},
    error::{Error, Result},
    vertex::VertexIds,
};

use thunderdome as td;

/// Key type to look up a body stored in a [`BodySet`][self::BodySet].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BodyKey(pub(crate) td::Index);

impl BodyKey {
    /// Get the underlying [`thunderdome::Index`][thunderdome::Index] of this key.
    /// Useful for creating your own mappings from bodies to other things.
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

/// Owner of all the bodies in a simulation.
///
/// Collisions and connectors refer to bodies by [`BodyHandle`][crate::BodyHandle]
/// and look them up here whenever they need the current state.
/// The fixed world anchor is not stored but every lookup of
/// `BodyHandle::Scrim` resolves to the shared [`SCRIM`][crate::SCRIM].
#[derive(Default)]
pub struct BodySet {
    bodies: td::Arena<Body>,
    vertex_ids: VertexIds,
}

impl BodySet {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Vertex id counter for building polygons that go into this set.
    #[inline]
    pub fn vertex_ids(&mut self) -> &mut VertexIds {
        &mut self.vertex_ids
    }

    /// Insert a body, returning the key to access it with.
    pub fn insert(&mut self, body: Body) -> BodyKey {
        BodyKey(self.bodies.insert(body))
    }

    /// Remove a body, returning it if it still existed.
    ///
    /// Connectors attached to the body are not removed automatically
    /// and will report [`Error::MissingBody`][crate::Error::MissingBody] from then on.
    pub fn remove(&mut self, key: BodyKey) -> Option<Body> {
        let removed = self.bodies.remove(key.0)?;
        let handle = BodyHandle::Body(key);
        for (_, b) in self.bodies.iter_mut() {
            b.remove_non_collide(&[handle]);
        }
        Some(removed)
    }

    #[inline]
    pub fn get_body(&self, key: BodyKey) -> Option<&Body> {
        self.bodies.get(key.0)
    }

    #[inline]
    pub fn get_body_mut(&mut self, key: BodyKey) -> Option<&mut Body> {
        self.bodies.get_mut(key.0)
    }

    /// Access any collision participant, including the world anchor.
    pub fn get(&self, handle: BodyHandle) -> Result<&dyn RigidBody> {
        match handle {
            BodyHandle::Scrim => Ok(&SCRIM),
            BodyHandle::Body(key) => self
                .bodies
                .get(key.0)
                .map(|b| b as &dyn RigidBody)
                .ok_or(Error::MissingBody),
        }
    }

    /// Mutably access a body. The world anchor cannot be modified.
    pub fn get_mut(&mut self, handle: BodyHandle) -> Result<&mut Body> {
        match handle {
            BodyHandle::Scrim => Err(Error::ImmutableBody(SCRIM.name().to_string())),
            BodyHandle::Body(key) => self.bodies.get_mut(key.0).ok_or(Error::MissingBody),
        }
    }

    /// Mark two bodies as not colliding with each other, in both directions.
    pub fn add_non_collide(&mut self, a: BodyHandle, b: BodyHandle) -> Result<()> {
        for (this, other) in [(a, b), (b, a)] {
            match self.get_mut(this) {
                Ok(body) => body.add_non_collide(&[other]),
                // the anchor never collides anyway
                Err(Error::ImmutableBody(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn remove_non_collide(&mut self, a: BodyHandle, b: BodyHandle) -> Result<()> {
        for (this, other) in [(a, b), (b, a)] {
            match self.get_mut(this) {
                Ok(body) => body.remove_non_collide(&[other]),
                Err(Error::ImmutableBody(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Whether collisions between two bodies should be skipped.
    pub fn does_not_collide(&self, a: BodyHandle, b: BodyHandle) -> Result<bool> {
        Ok(a == b || self.get(a)?.does_not_collide(b) || self.get(b)?.does_not_collide(a))
    }

    /// Give every finite-mass body a slot of six consecutive variables,
    /// in arena order. Infinite-mass bodies get no slot.
    /// Returns the total number of variables.
    pub fn assign_vars_indices(&mut self) -> usize {
        let mut next = 0;
        for (_, body) in self.bodies.iter_mut() {
            if body.mass().is_finite() {
                body.vars_index = Some(next);
                next += vars::COUNT;
            } else {
                body.vars_index = None;
            }
        }
        next
    }

    /// Write the position and velocity of every tracked body into a state vector
    /// laid out by [`assign_vars_indices`][Self::assign_vars_indices].
    pub fn write_vars(&self, state: &mut [f64]) {
        for (_, body) in self.bodies.iter() {
            if let Some(idx) = body.vars_index {
                let pos = body.position();
                let vel = body.velocity();
                state[idx + vars::X] = pos.x;
                state[idx + vars::VX] = vel.linear.x;
                state[idx + vars::Y] = pos.y;
                state[idx + vars::VY] = vel.linear.y;
                state[idx + vars::W] = body.angle();
                state[idx + vars::VW] = vel.angular;
            }
        }
    }

    pub fn iter(&self) -> impl '_ + Iterator<Item = (BodyKey, &Body)> {
        self.bodies.iter().map(|(k, b)| (BodyKey(k), b))
    }

    pub fn iter_mut(&mut self) -> impl '_ + Iterator<Item = (BodyKey, &mut Body)> {
        self.bodies.iter_mut().map(|(k, b)| (BodyKey(k), b))
    }

    /// Save the current pose of every body, see
    /// [`RigidBody::save_old_coords`][crate::RigidBody::save_old_coords].
    pub fn save_old_coords(&mut self) {
        for (_, b) in self.bodies.iter_mut() {
            b.save_old_coords();
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn clear(&mut self) {
        self.bodies.clear();
    }
}
