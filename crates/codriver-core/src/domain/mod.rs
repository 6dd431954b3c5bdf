//! Pure domain logic: spatial types and pointer-path planning.
//!
//! Nothing in this module performs I/O; everything is testable without a
//! connection to an agent.

pub mod geometry;

pub use geometry::{pointer_path, Color, CoordinateConversion, CoordinateSpace, Position};
