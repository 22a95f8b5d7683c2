//! Collision and constraint core of a 2D rigid body simulation.
//!
//! Bodies live in a [`BodySet`] and are referred to by [`BodyHandle`].
//! Each step, collisions between bodies are detected after the fact,
//! joined by the synthetic collisions that [`Connector`]s generate to keep
//! attachment points together, then refreshed as the step driver backs up in
//! time to find the moment each collision really happened. The [`pipeline`]
//! module strings these stages together.

/// Open a profiling span for the rest of the enclosing scope
/// when the `tracy` feature is enabled.
#[cfg(feature = "tracy")]
macro_rules! tracy_span {
    ($name:literal) => {
        tracy_client::span!($name)
    };
}
#[cfg(not(feature = "tracy"))]
macro_rules! tracy_span {
    ($name:literal) => {
        ()
    };
}

pub mod body;
pub use body::{Body, BodyHandle, BodyParams, Mass, RigidBody, Scrim, Shape, Velocity, SCRIM};

pub mod body_set;
pub use body_set::{BodyKey, BodySet};

pub mod collision;
pub use collision::{Collision, CollisionSource, ContactGeometry, Detection};

pub mod connector;
pub use connector::{
    Connector, ConnectorId, ConnectorKey, ConnectorSet, Joint, JointNormal, PathJoint,
};

pub mod error;
pub use error::{Error, Result};

pub mod force;
pub use force::{Force, ForceLaw, Gravity};

pub mod math;
pub use math::{uv, Angle, Pose, PoseBuilder, Rotor2, Unit, Vec2};

pub mod path;
pub use path::{ArcPath, CirclePath, FlatPath, NumericalPath, ParametricPath, Path, PathPoint};

pub mod pipeline;
pub use pipeline::CollisionSummary;

pub mod thruster;
pub use thruster::ThrusterSet;

pub mod vertex;
pub use vertex::{Edge, EdgeIndex, Polygon, PolygonBuilder, Vertex, VertexIds};
