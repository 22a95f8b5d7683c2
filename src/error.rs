//! Errors raised by the collision and constraint core.
//!
//! None of these are retried internally. They indicate a contract violation
//! by the caller (or a corrupted state) and the per-step driver is expected
//! to abort or roll back the step that produced them.

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("accuracy must be between 0 (exclusive) and 1 (inclusive), is {0}")]
    InvalidAccuracy(f64),
    #[error("detected time already set to {0}")]
    DetectedTimeAlreadySet(f64),
    #[error("collision was not generated by connector {0}")]
    ConnectorMismatch(String),
    #[error("inconsistent collision state: {0}")]
    Inconsistent(String),
    #[error("body {0} cannot be modified")]
    ImmutableBody(String),
    #[error("body does not exist in the body set")]
    MissingBody,
    #[error("body {0} is not in the variables list")]
    NotInVarsList(String),
    #[error("variables of body {body} at index {index} do not fit in {len} slots")]
    VarsOutOfRange {
        body: String,
        index: usize,
        len: usize,
    },
    #[error("thruster index {index} out of range for {count} thrusters")]
    ThrusterIndex { index: usize, count: usize },
    #[error("edge {slot} of vertex {vertex} was already set")]
    EdgeAlreadySet { vertex: u64, slot: u8 },
    #[error("vertex {vertex} has no edge")]
    MissingEdge { vertex: u64 },
    #[error("normal vector is not unit length, length squared is {0}")]
    NonUnitNormal(f64),
}

pub type Result<T> = std::result::Result<T, Error>;
