//! Validation and precondition errors

use crate::float_types::Real;
use crate::tools::ToolKind;
use crate::tools::lathe::LatheOutcome;
use nalgebra::Point3;

/// Reasons a polygon fails [`Polygon::validate`](crate::polygon::Polygon::validate).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// A closed loop needs three points, an open one two
    #[error("(TooFewPoints) loop has fewer than the minimal number of points near {0}")]
    TooFewPoints(Point3<Real>),
    /// Two consecutive coords are identical within tolerance
    #[error("(RepeatedPoint) two consecutive coords are identical at {0}")]
    RepeatedPoint(Point3<Real>),
    /// Two non-adjacent edges of the same loop cross
    #[error("(SelfIntersection) loop self-intersects at {0}")]
    SelfIntersection(Point3<Real>),
    /// The coordinate has a NaN or infinite component
    #[error("(InvalidCoordinate) coordinate {0} has a NaN or infinite component")]
    InvalidCoordinate(Point3<Real>),
    /// The outer loop winds clockwise against the plane normal
    #[error("(InvertedWinding) outer loop winds against its plane normal near {0}")]
    InvertedWinding(Point3<Real>),
    /// No plane can be fitted through the loop
    #[error("(DegeneratePlane) vertices do not define a plane")]
    DegeneratePlane,
}

/// Failures reported to the user before a transaction mutates anything.
#[derive(Debug, thiserror::Error)]
pub enum DesignerError {
    #[error("{tool:?} needs at least {required} selected {what}, found {found}")]
    NotEnoughSelection {
        tool: ToolKind,
        what: &'static str,
        required: usize,
        found: usize,
    },

    #[error("lathe failed: {0}")]
    Lathe(LatheOutcome),

    #[error("clip plane does not separate the model")]
    ClipFailed,

    #[error("model is empty")]
    EmptyModel,

    #[error("no tool is active")]
    NoActiveTool,

    #[error("tool parameters could not be read: {0}")]
    Params(#[from] serde_json::Error),

    #[error("invalid polygon: {0}")]
    InvalidPolygon(#[from] ValidationError),
}
