//! Geometry workflows: footprint cleanup of image tiles, segment
//! polygonization and LAS to vector conversion

pub mod footprint;
#[cfg(feature = "las")]
pub mod lidar;
pub mod segments;

pub use footprint::{remove_borders, DEFAULT_BORDER_DISTANCE};
#[cfg(feature = "las")]
pub use lidar::{convert_all, las_to_vector};
pub use segments::{export_segments_vector, segment_polygons, SegmentPolygon};
