//! Dense and dynamically spatially hashed voxel grids over generic cell values.
//!
//! # Invariants
//! - A dense grid's flat array length always equals its derived cell count.
//! - Every chunk of a dynamic grid is fully initialized at the shared chunk sizing.
//! - Dynamic-grid reads never allocate chunks.
//! - Failed mutations leave the grid unchanged.

mod dense;
mod dynamic;

pub use dense::VoxelGrid;
pub use dynamic::{DynamicSpatialHashedVoxelGrid, FoundStatus, GridQuery, SetType};

pub use voxelspace_common::{GridError, GridIndex, GridSizes};
pub use voxelspace_serialize::{Deserialized, SerializeError, deserialize_pod, serialize_pod};
