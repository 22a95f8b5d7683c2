//! Geometry checks that produce [`Collision`][super::Collision]s between body shapes.
//!
//! Only circle pairs are handled here. Polygon contact generation lives with
//! the caller, which feeds its results in through
//! [`Collision::set_geometry`][super::Collision::set_geometry].

use super::{Collision, CollisionSource, ContactGeometry};
use crate::{
    body::{BodyHandle, RigidBody, Shape},
    body_set::{BodyKey, BodySet},
    error::{Error, Result},
    math::Vec2,
};

/// Check two circular bodies against each other.
///
/// Returns a collision with the first body as the primary body when the gap
/// between the circles is under the combined distance tolerance, which
/// includes interpenetration. Non-circular bodies and pairs that are marked
/// as non-colliding never produce a collision.
pub fn circle_circle(bodies: &BodySet, a: BodyKey, b: BodyKey) -> Result<Option<Collision>> {
    let (h1, h2) = (BodyHandle::Body(a), BodyHandle::Body(b));
    if bodies.does_not_collide(h1, h2)? {
        return Ok(None);
    }
    let (Some((p1, r1)), Some((p2, r2))) = (circle(bodies, a)?, circle(bodies, b)?) else {
        return Ok(None);
    };
    let geom = circle_geometry(p1, r1, p2, r2);

    let mut coll = Collision::new(h1, h2, false, CollisionSource::CircleCircle, bodies)?;
    if geom.distance >= coll.distance_tol() {
        return Ok(None);
    }
    coll.set_geometry(geom);
    Ok(Some(coll))
}

/// Recompute the geometry of a collision made by [`circle_circle`]
/// from the current body poses.
pub fn refresh_circle_circle(coll: &mut Collision, bodies: &BodySet) -> Result<()> {
    let key = |h: BodyHandle| match h {
        BodyHandle::Body(k) => Ok(k),
        BodyHandle::Scrim => Err(Error::Inconsistent(
            "circle collision with the world anchor".to_string(),
        )),
    };
    let circle_of = |h: BodyHandle| -> Result<(Vec2, f64)> {
        circle(bodies, key(h)?)?
            .ok_or_else(|| Error::Inconsistent("circle collision with a non-circle".to_string()))
    };
    let (p1, r1) = circle_of(coll.primary_body())?;
    let (p2, r2) = circle_of(coll.normal_body())?;
    coll.set_geometry(circle_geometry(p1, r1, p2, r2));
    Ok(())
}

fn circle(bodies: &BodySet, key: BodyKey) -> Result<Option<(Vec2, f64)>> {
    let body = bodies.get_body(key).ok_or(Error::MissingBody)?;
    Ok(match body.shape() {
        Shape::Circle { radius } => Some((body.position(), *radius)),
        Shape::Polygon(_) => None,
    })
}

fn circle_geometry(p1: Vec2, r1: f64, p2: Vec2, r2: f64) -> ContactGeometry {
    let between = p1 - p2;
    let len = between.mag();
    let normal = if len < 1e-12 {
        // same position, consider the normal to be on the x axis
        Vec2::unit_x()
    } else {
        between / len
    };
    ContactGeometry {
        impact1: p1 - r1 * normal,
        impact2: Some(p2 + r2 * normal),
        normal,
        normal_dt: None,
        distance: len - r1 - r2,
        radius1: Some(r1),
        radius2: Some(r2),
        ball_object: true,
        ball_normal: true,
        normal_fixed: false,
        u1_center: Some(p1),
        u2_center: Some(p2),
    }
}
