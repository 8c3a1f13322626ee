//! A polygonal **brush editing** kernel: planar polygons with holes, a
//! two-shelf [`Model`] with a mirror plane and a spatial query index,
//! element selection, and transactional editing tools.
//!
//! # Layers
//! - [`polygon`]: the planar polygon, its validity rules, boolean and split operations
//! - [`model`]: arena of polygons on a committed and a scratch shelf, [`Model::clip`],
//!   mirroring and smoothing groups
//! - [`selection`]: vertex/edge/face elements, ray and marquee picking
//! - [`tools`]: the tool state machine, transactions with undo, and the
//!   editing algorithms (bevel, lathe, slice/mirror, weld/merge/remove doubles,
//!   smoothing groups)
//!
//! # Features
//! #### Default
//! - **f64**: use f64 as Real
//!
//! #### Optional
//! - **f32**: use f32 as Real, this conflicts with f64
//!
//! # Example
//! ```
//! use brushedit::model::{Model, ShelfId};
//! use brushedit::tools::bevel::{BevelSetup, build_bevel};
//! use nalgebra::Point3;
//!
//! let cube = Model::cube(1.0);
//! let edge = (Point3::new(0.0, 0.0, 1.0), Point3::new(1.0, 0.0, 1.0));
//! let setup = BevelSetup::new(&cube, &[edge]);
//! let result = build_bevel(&cube, &setup, 0.2, 0).unwrap();
//! assert_eq!(result.report.bridges, 1);
//! assert_eq!(cube.polygon_count(ShelfId::Committed) - result.replaced.len() + result.polygons.len(), 7);
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::missing_const_for_fn, clippy::approx_constant, clippy::all)]

pub mod compiler;
pub mod config;
pub mod errors;
pub mod float_types;
pub mod model;
pub mod plane;
pub mod polygon;
pub mod selection;
pub mod shapes;
pub mod tools;

#[cfg(any(all(feature = "f64", feature = "f32"), not(any(feature = "f64", feature = "f32"))))]
compile_error!("Either 'f64' or 'f32' feature must be specified, but not both");

pub use config::DesignerConfig;
pub use errors::{DesignerError, ValidationError};
pub use model::{Model, PolygonId, ShelfId};
pub use plane::Plane;
pub use polygon::Polygon;
pub use selection::{Element, ElementKind, ElementManager};
pub use tools::{Designer, MainContext, Tool, ToolKind, ToolResponse};
