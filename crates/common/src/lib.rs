//! Shared sizing, indexing, and coordinate conversion for voxelspace grids.
//!
//! # Invariants
//! - `GridSizes` is validated at construction and immutable afterwards.
//! - Cell centers run symmetrically about zero along each axis.
//! - `index_from_location(location_from_index(i)) == i` for every in-bounds index.

mod error;
mod index;
mod sizes;

pub use error::GridError;
pub use index::GridIndex;
pub use sizes::GridSizes;
