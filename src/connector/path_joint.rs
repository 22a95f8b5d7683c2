use super::{check_owner, Connector, ConnectorId};
use crate::{
    body::{BodyHandle, RigidBody},
    body_set::BodySet,
    collision::{Collision, CollisionSource, ContactGeometry},
    error::Result,
    math::Vec2,
    path::{Path, PathPoint},
};
use std::{cell::Cell, fmt, rc::Rc};

/// How far off the normal line at the nearest path point the attachment point
/// may be before an open path counts as having been slid off.
const OFF_END_TOL: f64 = 1e-4;

/// Connection between a point on a body and the nearest point of a path.
///
/// The path point is tracked between steps so that each update only needs
/// a local search around where the attachment point was last time.
pub struct PathJoint {
    id: ConnectorId,
    name: String,
    body: BodyHandle,
    attach: Vec2,
    path: Rc<dyn Path>,
    ppt: Cell<PathPoint>,
}

impl PathJoint {
    pub(crate) fn new(
        id: ConnectorId,
        body: BodyHandle,
        attach: Vec2,
        path: Rc<dyn Path>,
        bodies: &BodySet,
    ) -> Result<Self> {
        let point = bodies.get(body)?.body_to_world(attach);
        let ppt = path.find_nearest_global(point);
        Ok(PathJoint {
            id,
            name: format!("PATH_JOINT{}", id),
            body,
            attach,
            path,
            ppt: Cell::new(ppt),
        })
    }

    #[inline]
    pub fn attach(&self) -> Vec2 {
        self.attach
    }

    /// The path point found by the latest update or alignment.
    #[inline]
    pub fn path_point(&self) -> PathPoint {
        self.ppt.get()
    }
}

impl fmt::Debug for PathJoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathJoint")
            .field("name", &self.name)
            .field("body", &self.body)
            .field("attach", &self.attach)
            .field("ppt", &self.ppt.get())
            .finish()
    }
}

impl Connector for PathJoint {
    fn id(&self) -> ConnectorId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn body1(&self) -> BodyHandle {
        self.body
    }

    /// Paths are anchored to the world.
    fn body2(&self) -> BodyHandle {
        BodyHandle::Scrim
    }

    fn position1(&self, bodies: &BodySet) -> Result<Vec2> {
        Ok(bodies.get(self.body)?.body_to_world(self.attach))
    }

    fn position2(&self, _bodies: &BodySet) -> Result<Vec2> {
        Ok(self.ppt.get().position)
    }

    fn add_collision(
        &self,
        collisions: &mut Vec<Collision>,
        time: f64,
        bodies: &BodySet,
    ) -> Result<()> {
        let mut coll = Collision::new(
            self.body,
            BodyHandle::Scrim,
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
        let body = bodies.get(self.body)?;
        let point = body.body_to_world(self.attach);

        let mut ppt = self.ppt.get();
        self.path.find_nearest_local(point, &mut ppt);
        self.path.map_p_to_slope(&mut ppt);
        if !self.path.is_closed_loop() && ppt.distance_to_normal_line(point) > OFF_END_TOL {
            // off the end of the path, which continues as a straight line
            ppt.normal_dp = Vec2::zero();
        }
        self.ppt.set(ppt);

        let path_velocity = body.point_velocity(self.attach).dot(ppt.slope);
        coll.set_geometry(ContactGeometry {
            impact1: point,
            impact2: Some(ppt.position),
            normal: ppt.normal,
            // curvature is not needed since the normal derivative is known
            normal_dt: Some(ppt.normal_dp * path_velocity),
            distance: ppt.normal.dot(point - ppt.position),
            radius2: None,
            ball_normal: true,
            ..Default::default()
        });
        Ok(())
    }

    fn align(&self, bodies: &mut BodySet) -> Result<()> {
        let point = self.position1(bodies)?;
        let ppt = self.path.find_nearest_global(point);
        self.ppt.set(ppt);
        bodies.get_mut(self.body)?.align_to(self.attach, ppt.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        body::{Body, Velocity},
        connector::ConnectorSet,
        path::{ArcPath, CirclePath, NumericalPath},
    };

    fn quarter_arc() -> Rc<dyn Path> {
        Rc::new(NumericalPath::new(&ArcPath {
            center: Vec2::zero(),
            radius: 2.0,
            start_angle: 0.0,
            end_angle: std::f64::consts::FRAC_PI_2,
        }))
    }

    fn joint_collision(pos: [f64; 2], vel: Vec2) -> Collision {
        let mut set = BodySet::new();
        let body = set.insert(
            Body::new_circle("bead", 0.1, 1.0)
                .with_pose(pos)
                .with_velocity(Velocity::new(vel, 0.0)),
        );
        let mut conns = ConnectorSet::new();
        conns
            .add_path_joint(&set, body.into(), Vec2::zero(), quarter_arc())
            .unwrap();
        let mut colls = Vec::new();
        conns.add_collisions(&mut colls, 0.0, &set).unwrap();
        colls.remove(0)
    }

    #[test]
    fn normal_derivative_follows_curve() {
        let angle = 0.2_f64;
        let on_path = 2.0 * Vec2::new(angle.cos(), angle.sin());
        // moving along the tangent
        let c = joint_collision([on_path.x, on_path.y], Vec2::new(-angle.sin(), angle.cos()));
        assert!(c.distance().abs() < 1e-6);
        assert_eq!(c.normal_body(), BodyHandle::Scrim);
        assert!(c.geometry().ball_normal);
        assert_eq!(c.geometry().radius2, None);
        // unit speed on a radius 2 circle turns the normal at half a radian per second
        let ndt = c.normal_dt().unwrap();
        assert!((ndt.mag() - 0.5).abs() < 1e-3);
    }

    #[test]
    fn past_open_end_is_straight() {
        // below the start of the arc, moving up along the extension line
        let c = joint_collision([2.5, -1.0], Vec2::new(0.0, 1.0));
        assert_eq!(c.normal_dt(), Some(Vec2::zero()));
        // distance is measured along the end normal
        assert!((c.distance().abs() - 0.5).abs() < 1e-7);
    }

    #[test]
    fn align_moves_body_onto_path() {
        let mut set = BodySet::new();
        let body = set.insert(Body::new_circle("bead", 0.1, 1.0).with_pose([3.0, 4.0]));
        let path: Rc<dyn Path> = Rc::new(NumericalPath::new(&CirclePath {
            center: Vec2::zero(),
            radius: 1.0,
        }));
        let mut conns = ConnectorSet::new();
        let key = conns
            .add_path_joint(&set, body.into(), Vec2::new(0.1, 0.0), path)
            .unwrap();
        conns.align_all(&mut set).unwrap();
        let joint = conns.get(key).unwrap();
        let attach_world = joint.position1(&set).unwrap();
        assert!((attach_world.mag() - 1.0).abs() < 1e-6);
        assert!((attach_world - joint.position2(&set).unwrap()).mag() < 1e-9);
        assert!(joint.normal_distance(&set).unwrap().abs() < 1e-6);
    }
}
