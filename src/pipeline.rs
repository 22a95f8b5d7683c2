//! The per-step collision pass: gathering collisions, refreshing them after
//! a backup in time, and sorting out which ones need handling.
//!
//! A step driver typically goes through these in order:
//!
//! 1. move bodies forward, then [`detect_circles`] and
//!    [`add_connector_collisions`] with the post-step time
//! 2. if anything is [`illegal`][CollisionSummary::illegal], back up to
//!    around [`earliest_estimate`], [`mark_needs_handling`] and
//!    [`update_collisions`] for the new time
//! 3. hand the collisions over to the impulse and contact solvers
//!
//! Step 2 must complete for every collision before any impulse is applied.

use crate::{
    body_set::BodySet,
    collision::{detect, Collision, CollisionSource},
    connector::ConnectorSet,
    error::Result,
};
use itertools::Itertools;

/// Find collisions between every pair of circular bodies and timestamp them.
pub fn detect_circles(bodies: &BodySet, time: f64) -> Result<Vec<Collision>> {
    let _span = tracy_span!("detect circles");

    let keys: Vec<_> = bodies.iter().map(|(k, _)| k).collect();
    let mut colls = Vec::new();
    for (a, b) in keys.into_iter().tuple_combinations() {
        if let Some(mut c) = detect::circle_circle(bodies, a, b)? {
            c.set_detected_time(time, bodies)?;
            colls.push(c);
        }
    }
    Ok(colls)
}

/// Add every connector's joint collision to the front of `collisions`.
pub fn add_connector_collisions(
    connectors: &ConnectorSet,
    collisions: &mut Vec<Collision>,
    time: f64,
    bodies: &BodySet,
) -> Result<()> {
    let _span = tracy_span!("connector collisions");
    connectors.add_collisions(collisions, time, bodies)
}

/// Refresh every collision for the current body state at `time`.
///
/// Geometry is recomputed by whatever produced each collision, then the
/// derived data and time estimates are updated. Collisions from outside
/// sources keep the geometry they were last given.
pub fn update_collisions(
    collisions: &mut [Collision],
    time: f64,
    connectors: &ConnectorSet,
    bodies: &BodySet,
) -> Result<()> {
    let _span = tracy_span!("update collisions");

    for c in collisions.iter_mut() {
        match c.source() {
            CollisionSource::Connector(_) => connectors.update_collision(c, bodies)?,
            CollisionSource::CircleCircle => detect::refresh_circle_circle(c, bodies)?,
            CollisionSource::External => {}
        }
        c.update_collision(time, bodies)?;
    }
    Ok(())
}

/// Flag collisions that are currently penetrating so they are still handled
/// after backing up to a time where they may no longer be.
pub fn mark_needs_handling(collisions: &mut [Collision]) {
    for c in collisions.iter_mut().filter(|c| c.illegal_state()) {
        c.set_needs_handling(true);
    }
}

/// Earliest estimated time of any collision that still needs handling.
pub fn earliest_estimate(collisions: &[Collision]) -> Option<f64> {
    collisions
        .iter()
        .filter(|c| c.illegal_state() || c.needs_handling())
        .filter_map(|c| c.estimated_time())
        .min_by(|a, b| a.total_cmp(b))
}

/// Indices of collisions by classification. A collision can be in several lists.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollisionSummary {
    /// Need an impulse: penetrating or approaching fast.
    pub colliding: Vec<usize>,
    /// Resting contacts, including every joint.
    pub contacts: Vec<usize>,
    /// Penetrating, which must be resolved before the step can finish.
    pub illegal: Vec<usize>,
    /// Near enough to the target gap to be handled right now.
    pub close_enough: Vec<usize>,
}

impl CollisionSummary {
    /// Whether every colliding collision can be handled at the current time,
    /// i.e. no further backing up is needed.
    pub fn ready_to_handle(&self) -> bool {
        self.illegal.is_empty()
            && self
                .colliding
                .iter()
                .all(|i| self.close_enough.contains(i))
    }
}

/// Classify every collision. See [`Collision::close_enough`] for `allow_tiny`.
pub fn classify(
    collisions: &[Collision],
    allow_tiny: bool,
    bodies: &BodySet,
) -> Result<CollisionSummary> {
    let _span = tracy_span!("classify collisions");

    let mut summary = CollisionSummary::default();
    for (i, c) in collisions.iter().enumerate() {
        if c.is_colliding(bodies)? {
            summary.colliding.push(i);
        }
        if c.contact(bodies)? {
            summary.contacts.push(i);
        }
        if c.illegal_state() {
            summary.illegal.push(i);
        }
        if c.close_enough(allow_tiny, bodies)? {
            summary.close_enough.push(i);
        }
    }
    log::trace!(
        "{} collisions: {} colliding, {} contacts, {} illegal",
        collisions.len(),
        summary.colliding.len(),
        summary.contacts.len(),
        summary.illegal.len()
    );
    Ok(summary)
}
