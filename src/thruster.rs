//! Switchable thrusters fixed to a body.

use crate::{
    body::{BodyHandle, RigidBody},
    body_set::BodySet,
    error::{Error, Result},
    force::{Force, ForceLaw},
    math::Vec2,
};
use itertools::izip;

/// A set of thrusters on one body, each at a fixed location and pointing in a
/// fixed direction in body coordinates, that can be turned on and off.
/// All thrusters share one magnitude multiplier.
#[derive(Clone, Debug)]
pub struct ThrusterSet {
    body: BodyHandle,
    magnitude: f64,
    locations: Vec<Vec2>,
    directions: Vec<Vec2>,
    active: Vec<bool>,
}

impl ThrusterSet {
    /// Create `count` inactive thrusters at the center of mass with zero direction.
    pub fn new(count: usize, body: BodyHandle, magnitude: f64) -> Self {
        ThrusterSet {
            body,
            magnitude,
            locations: vec![Vec2::zero(); count],
            directions: vec![Vec2::zero(); count],
            active: vec![false; count],
        }
    }

    fn check(&self, index: usize) -> Result<()> {
        if index < self.active.len() {
            Ok(())
        } else {
            Err(Error::ThrusterIndex {
                index,
                count: self.active.len(),
            })
        }
    }

    #[inline]
    pub fn body(&self) -> BodyHandle {
        self.body
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.active.len()
    }

    #[inline]
    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    pub fn set_magnitude(&mut self, magnitude: f64) {
        self.magnitude = magnitude;
    }

    /// Place a thruster. Location and direction are in body coordinates;
    /// the direction is scaled by the magnitude when forces are calculated.
    pub fn set_thruster(&mut self, index: usize, location: Vec2, direction: Vec2) -> Result<()> {
        self.check(index)?;
        self.locations[index] = location;
        self.directions[index] = direction;
        Ok(())
    }

    pub fn location_body(&self, index: usize) -> Result<Vec2> {
        self.check(index)?;
        Ok(self.locations[index])
    }

    /// Thrust of a thruster in body coordinates, including the magnitude.
    pub fn direction_body(&self, index: usize) -> Result<Vec2> {
        self.check(index)?;
        Ok(self.directions[index] * self.magnitude)
    }

    pub fn is_active(&self, index: usize) -> Result<bool> {
        self.check(index)?;
        Ok(self.active[index])
    }

    pub fn set_active(&mut self, index: usize, active: bool) -> Result<()> {
        self.check(index)?;
        self.active[index] = active;
        Ok(())
    }

    pub fn any_active(&self) -> bool {
        self.active.iter().any(|a| *a)
    }
}

impl ForceLaw for ThrusterSet {
    fn calculate_forces(&self, bodies: &BodySet) -> Result<Vec<Force>> {
        let body = bodies.get(self.body)?;
        let forces = izip!(&self.locations, &self.directions, &self.active)
            .enumerate()
            .filter(|(_, (_, _, active))| **active)
            .map(|(k, (loc, dir, _))| {
                Force::new(
                    format!("thruster{}", k),
                    self.body,
                    body.body_to_world(*loc),
                    body.rotate_body_to_world(*dir * self.magnitude),
                )
            })
            .collect();
        Ok(forces)
    }

    fn bodies(&self) -> Vec<BodyHandle> {
        vec![self.body]
    }

    fn potential_energy(&self, _bodies: &BodySet) -> Result<f64> {
        Ok(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        body::Body,
        math::{Angle, PoseBuilder},
    };

    fn ship(set: &mut BodySet) -> BodyHandle {
        set.insert(Body::new_circle("ship", 1.0, 1.0).with_pose(
            PoseBuilder::new()
                .with_position([1.0, 1.0])
                .with_rotation(Angle::Deg(90.0)),
        ))
        .into()
    }

    #[test]
    fn only_active_thrusters_push() {
        let mut set = BodySet::new();
        let body = ship(&mut set);
        let mut ts = ThrusterSet::new(3, body, 2.0);
        ts.set_thruster(0, Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0)).unwrap();
        ts.set_thruster(2, Vec2::new(0.0, 1.0), Vec2::new(0.0, -1.0)).unwrap();
        assert!(!ts.any_active());
        assert!(ts.calculate_forces(&set).unwrap().is_empty());

        ts.set_active(0, true).unwrap();
        ts.set_active(2, true).unwrap();
        assert!(ts.any_active());
        let forces = ts.calculate_forces(&set).unwrap();
        itertools::assert_equal(forces.iter().map(|f| f.name.as_str()), ["thruster0", "thruster2"]);

        // the body is rotated a quarter turn
        assert!((forces[0].location - Vec2::new(1.0, 0.0)).mag() < 1e-12);
        assert!((forces[0].direction - Vec2::new(0.0, 2.0)).mag() < 1e-12);
        assert!((forces[1].location - Vec2::new(0.0, 1.0)).mag() < 1e-12);
        assert!((forces[1].direction - Vec2::new(2.0, 0.0)).mag() < 1e-12);
    }

    #[test]
    fn magnitude_scales_direction() {
        let mut ts = ThrusterSet::new(1, BodyHandle::Scrim, 1.0);
        ts.set_thruster(0, Vec2::zero(), Vec2::new(0.5, 0.0)).unwrap();
        ts.set_magnitude(4.0);
        assert_eq!(ts.direction_body(0).unwrap(), Vec2::new(2.0, 0.0));
    }

    #[test]
    fn index_out_of_range() {
        let mut ts = ThrusterSet::new(2, BodyHandle::Scrim, 1.0);
        assert_eq!(
            ts.direction_body(2),
            Err(Error::ThrusterIndex { index: 2, count: 2 })
        );
        assert!(ts.set_active(5, true).is_err());
        assert!(ts.location_body(1).is_ok());
    }
}
