//! Forces acting on bodies and the laws that produce them each step.

use crate::{
    body::{vars, BodyHandle, RigidBody},
    body_set::BodySet,
    error::Result,
    math::Vec2,
};

/// A force applied at a point of a body, in world coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Force {
    /// Label for display and debugging.
    pub name: String,
    pub body: BodyHandle,
    /// Point of application.
    pub location: Vec2,
    pub direction: Vec2,
    /// Extra torque on top of what the force produces about the center of mass.
    pub torque: f64,
}

impl Force {
    pub fn new(name: impl Into<String>, body: BodyHandle, location: Vec2, direction: Vec2) -> Self {
        Force {
            name: name.into(),
            body,
            location,
            direction,
            torque: 0.0,
        }
    }

    #[inline]
    pub fn start_point(&self) -> Vec2 {
        self.location
    }

    /// Tip of the force vector drawn from its point of application.
    #[inline]
    pub fn end_point(&self) -> Vec2 {
        self.location + self.direction
    }
}

/// Something that produces forces on bodies every step.
pub trait ForceLaw {
    fn calculate_forces(&self, bodies: &BodySet) -> Result<Vec<Force>>;
    /// Bodies this law acts on.
    fn bodies(&self) -> Vec<BodyHandle>;
    fn potential_energy(&self, bodies: &BodySet) -> Result<f64>;
}

/// Constant gravity over all of space.
#[derive(Clone, Debug)]
pub struct Gravity {
    pub accel: Vec2,
    bodies: Vec<BodyHandle>,
}

impl Gravity {
    pub fn new(accel: Vec2) -> Self {
        Gravity {
            accel,
            bodies: Vec::new(),
        }
    }

    /// Gravity acting on every finite-mass body currently in the set.
    pub fn for_all(accel: Vec2, bodies: &BodySet) -> Self {
        let mut g = Self::new(accel);
        for (key, body) in bodies.iter() {
            if body.mass().is_finite() {
                g.add_body(key.into());
            }
        }
        g
    }

    pub fn add_body(&mut self, body: BodyHandle) {
        if !self.bodies.contains(&body) {
            self.bodies.push(body);
        }
    }

    pub fn remove_body(&mut self, body: BodyHandle) {
        self.bodies.retain(|b| *b != body);
    }
}

impl ForceLaw for Gravity {
    fn calculate_forces(&self, bodies: &BodySet) -> Result<Vec<Force>> {
        let mut forces = Vec::with_capacity(self.bodies.len());
        for &handle in &self.bodies {
            let body = bodies.get(handle)?;
            let mass = body.mass();
            if mass.is_finite() {
                forces.push(Force::new(
                    "gravity",
                    handle,
                    body.position(),
                    self.accel * mass.value(),
                ));
            }
        }
        Ok(forces)
    }

    fn bodies(&self) -> Vec<BodyHandle> {
        self.bodies.clone()
    }

    fn potential_energy(&self, bodies: &BodySet) -> Result<f64> {
        let mut pe = 0.0;
        for &handle in &self.bodies {
            let body = bodies.get(handle)?;
            if body.mass().is_finite() {
                pe -= body.mass().value() * self.accel.dot(body.position());
            }
        }
        Ok(pe)
    }
}

/// Add the accelerations caused by `forces` into the change rates of the
/// simulation variables. Forces on infinite-mass bodies are ignored.
pub fn accumulate(forces: &[Force], bodies: &BodySet, change: &mut [f64]) -> Result<()> {
    for f in forces {
        let body = bodies.get(f.body)?;
        if !body.mass().is_finite() {
            continue;
        }
        let idx = vars::offset(body, change.len())?;
        let inv_mass = body.mass().inv();
        change[idx + vars::VX] += f.direction.x * inv_mass;
        change[idx + vars::VY] += f.direction.y * inv_mass;
        let r = f.location - body.position();
        let torque = r.x * f.direction.y - r.y * f.direction.x + f.torque;
        change[idx + vars::VW] += torque * body.moment_of_inertia().inv();
    }
    Ok(())
}
